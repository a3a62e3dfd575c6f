//! USB CDC ACM console plumbing.
//!
//! The rig exposes a single CDC ACM interface carrying the operator
//! console. A small builder wrapper owns the Embassy USB bookkeeping so the
//! runtime can request the port handle without spelling out descriptor
//! buffers everywhere.

#![allow(dead_code)]

#[cfg(target_os = "none")]
pub const MAX_PACKET_SIZE: u16 = 64;

#[cfg(target_os = "none")]
const CONTROL_BUFFER_LEN: usize = 64;
#[cfg(target_os = "none")]
const CONFIG_DESCRIPTOR_LEN: usize = 256;
#[cfg(target_os = "none")]
const BOS_DESCRIPTOR_LEN: usize = 256;
#[cfg(target_os = "none")]
const MSOS_DESCRIPTOR_LEN: usize = 256;

/// User-visible strings advertised in the USB descriptors.
#[derive(Clone, Copy, Debug)]
pub struct UsbDeviceStrings {
    /// Manufacturer string descriptor.
    pub manufacturer: &'static str,
    /// Product string descriptor.
    pub product: &'static str,
    /// Unique serial number string descriptor (optional).
    pub serial_number: Option<&'static str>,
}

impl Default for UsbDeviceStrings {
    fn default() -> Self {
        Self {
            manufacturer: "Power Cycler",
            product: "Power Cycle Test Rig",
            serial_number: None,
        }
    }
}

/// Backing storage for the Embassy USB builder and the CDC ACM class.
#[cfg(target_os = "none")]
pub struct UsbDeviceStorage {
    control_buf: [u8; CONTROL_BUFFER_LEN],
    config_descriptor: [u8; CONFIG_DESCRIPTOR_LEN],
    bos_descriptor: [u8; BOS_DESCRIPTOR_LEN],
    msos_descriptor: [u8; MSOS_DESCRIPTOR_LEN],
    console_state: embassy_usb::class::cdc_acm::State<'static>,
}

#[cfg(target_os = "none")]
impl UsbDeviceStorage {
    /// Creates a fresh storage bundle for the USB device.
    pub fn new() -> Self {
        Self {
            control_buf: [0; CONTROL_BUFFER_LEN],
            config_descriptor: [0; CONFIG_DESCRIPTOR_LEN],
            bos_descriptor: [0; BOS_DESCRIPTOR_LEN],
            msos_descriptor: [0; MSOS_DESCRIPTOR_LEN],
            console_state: embassy_usb::class::cdc_acm::State::new(),
        }
    }
}

/// Split handles for the console CDC ACM interface.
#[cfg(target_os = "none")]
pub struct CdcAcmHandle<D: embassy_usb::driver::Driver<'static>> {
    pub sender: embassy_usb::class::cdc_acm::Sender<'static, D>,
    pub receiver: embassy_usb::class::cdc_acm::Receiver<'static, D>,
    pub control: embassy_usb::class::cdc_acm::ControlChanged<'static>,
}

#[cfg(target_os = "none")]
impl<D> CdcAcmHandle<D>
where
    D: embassy_usb::driver::Driver<'static>,
{
    /// Waits until the host enables both IN and OUT endpoints.
    pub async fn wait_ready(&mut self) {
        embassy_futures::join::join(
            self.sender.wait_connection(),
            self.receiver.wait_connection(),
        )
        .await;
    }

    /// Returns `true` when the host has asserted DTR.
    pub fn dtr(&self) -> bool {
        self.sender.dtr()
    }
}

/// Wrapper that owns the console interface and the resulting USB device.
#[cfg(target_os = "none")]
pub struct UsbConsole<D>
where
    D: embassy_usb::driver::Driver<'static>,
{
    pub device: embassy_usb::UsbDevice<'static, D>,
    console: Option<CdcAcmHandle<D>>,
}

#[cfg(target_os = "none")]
impl<D> UsbConsole<D>
where
    D: embassy_usb::driver::Driver<'static>,
{
    /// Creates the USB device exposing the console CDC interface.
    pub fn new(
        driver: D,
        storage: &'static mut UsbDeviceStorage,
        strings: UsbDeviceStrings,
    ) -> Self {
        let mut config = embassy_usb::Config::new(0x1209, 0x0001);
        config.manufacturer = Some(strings.manufacturer);
        config.product = Some(strings.product);
        config.serial_number = strings.serial_number;
        config.max_packet_size_0 = MAX_PACKET_SIZE as u8;
        config.max_power = 250;
        config.device_class = 0xEF;
        config.device_sub_class = 0x02;
        config.device_protocol = 0x01;
        config.composite_with_iads = true;

        let mut builder = embassy_usb::Builder::new(
            driver,
            config,
            &mut storage.config_descriptor,
            &mut storage.bos_descriptor,
            &mut storage.msos_descriptor,
            &mut storage.control_buf,
        );

        let console = embassy_usb::class::cdc_acm::CdcAcmClass::new(
            &mut builder,
            &mut storage.console_state,
            MAX_PACKET_SIZE,
        );

        let (sender, receiver, control) = console.split_with_control();
        let device = builder.build();

        Self {
            device,
            console: Some(CdcAcmHandle {
                sender,
                receiver,
                control,
            }),
        }
    }

    /// Takes ownership of the console interface handles.
    pub fn take_console(&mut self) -> Option<CdcAcmHandle<D>> {
        self.console.take()
    }
}

/// Host-side stub so `cargo test` builds without pulling in Embassy USB.
#[cfg(not(target_os = "none"))]
pub struct UsbDeviceStorage;

#[cfg(not(target_os = "none"))]
impl UsbDeviceStorage {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

/// Host-side stub representing the USB console device.
#[cfg(not(target_os = "none"))]
pub struct UsbConsole<D> {
    pub device: (),
    _marker: core::marker::PhantomData<D>,
}

#[cfg(not(target_os = "none"))]
impl<D> UsbConsole<D> {
    pub fn new(_: D, _: &'static mut UsbDeviceStorage, _: UsbDeviceStrings) -> Self {
        Self {
            device: (),
            _marker: core::marker::PhantomData,
        }
    }

    pub fn take_console(&mut self) -> Option<CdcAcmHandle<D>> {
        None
    }
}

/// Host-side stub representing the console port handle.
#[cfg(not(target_os = "none"))]
pub struct CdcAcmHandle<D> {
    pub sender: (),
    pub receiver: (),
    pub control: (),
    _marker: core::marker::PhantomData<D>,
}
