//! USB console task: packet I/O on the CDC interface.

use embassy_futures::join::join;
use embassy_futures::select::{Either3, select3};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_usb::driver::EndpointError;
use heapless::Vec;
use static_cell::StaticCell;

use crate::console::LineAssembler;
use crate::rig::{LineSender, OutputReceiver, OUTPUT_LINE_LEN};
use crate::usb::{self, UsbDeviceStrings};

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
    lines: LineSender<'static>,
    output: OutputReceiver<'static>,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);

    let mut composite = usb::UsbConsole::new(driver, storage, UsbDeviceStrings::default());
    let handle = composite
        .take_console()
        .expect("console CDC interface unavailable");
    let usb::CdcAcmHandle {
        sender,
        receiver,
        control,
    } = handle;
    let mut device = composite.device;

    join(
        device.run(),
        run_console_interface(sender, receiver, control, lines, output),
    )
    .await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_console_interface<D>(
    mut sender: embassy_usb::class::cdc_acm::Sender<'static, D>,
    mut receiver: embassy_usb::class::cdc_acm::Receiver<'static, D>,
    control: embassy_usb::class::cdc_acm::ControlChanged<'static>,
    lines: LineSender<'static>,
    output: OutputReceiver<'static>,
) -> !
where
    D: embassy_usb::driver::Driver<'static>,
{
    let mut assembler = LineAssembler::new();
    let mut ingress = [0u8; usb::MAX_PACKET_SIZE as usize];

    loop {
        join(receiver.wait_connection(), sender.wait_connection()).await;
        wait_for_dtr(&control, &mut sender).await;

        defmt::info!("usb: console connected");

        loop {
            match select3(
                receiver.read_packet(&mut ingress),
                output.receive(),
                control.control_changed(),
            )
            .await
            {
                Either3::First(Ok(count)) => {
                    if count == 0 {
                        continue;
                    }

                    let mut completed: Vec<crate::console::ConsoleLine, 4> = Vec::new();
                    assembler.push_bytes(&ingress[..count], |line| {
                        if completed.push(line).is_err() {
                            defmt::warn!("usb: dropping command line (burst overflow)");
                        }
                    });
                    for line in completed {
                        if lines.try_send(line).is_err() {
                            defmt::warn!("usb: dropping command line (queue full)");
                        }
                    }
                }
                Either3::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console interface disabled");
                    break;
                }
                Either3::First(Err(_)) => {
                    defmt::warn!("usb: console read error");
                }
                Either3::Second(line) => {
                    if write_line(&mut sender, line.as_bytes()).await.is_err() {
                        defmt::warn!("usb: console write disabled");
                        break;
                    }
                }
                Either3::Third(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: console host dropped DTR");
                        break;
                    }
                }
            }
        }
    }
}

/// Writes one rendered line followed by CRLF, chunked to the packet size.
async fn write_line<D>(
    sender: &mut embassy_usb::class::cdc_acm::Sender<'static, D>,
    bytes: &[u8],
) -> Result<(), EndpointError>
where
    D: embassy_usb::driver::Driver<'static>,
{
    let mut frame: Vec<u8, { OUTPUT_LINE_LEN + 2 }> = Vec::new();
    let _ = frame.extend_from_slice(bytes);
    let _ = frame.extend_from_slice(b"\r\n");

    for chunk in frame.chunks(usb::MAX_PACKET_SIZE as usize) {
        sender.write_packet(chunk).await?;
    }

    Ok(())
}

async fn wait_for_dtr<D>(
    control: &embassy_usb::class::cdc_acm::ControlChanged<'static>,
    sender: &mut embassy_usb::class::cdc_acm::Sender<'static, D>,
) where
    D: embassy_usb::driver::Driver<'static>,
{
    if sender.dtr() {
        return;
    }

    while !sender.dtr() {
        control.control_changed().await;
    }
}
