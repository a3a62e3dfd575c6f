use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Level, OutputOpenDrain, Speed};
use embassy_sync::channel::Channel;

use crate::hw::{SenseAdc, SwitchOutput};
use crate::rig::{LineQueue, OutputQueue};

mod rig_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static LINE_QUEUE: LineQueue = Channel::new();
pub(super) static OUTPUT_QUEUE: OutputQueue = Channel::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA4,
        ADC1,
        USB,
        PA11,
        PA12,
        ..
    } = hal::init(config);

    let adc = SenseAdc::new(Adc::new(ADC1), PA0);
    let switch = SwitchOutput::new(OutputOpenDrain::new(PA4, Level::High, Speed::Low));

    spawner
        .spawn(rig_task::run(
            adc,
            switch,
            LINE_QUEUE.receiver(),
            OUTPUT_QUEUE.sender(),
        ))
        .expect("failed to spawn rig task");

    spawner
        .spawn(usb_task::run(
            USB,
            PA12,
            PA11,
            LINE_QUEUE.sender(),
            OUTPUT_QUEUE.receiver(),
        ))
        .expect("failed to spawn USB task");

    core::future::pending::<()>().await;
}
