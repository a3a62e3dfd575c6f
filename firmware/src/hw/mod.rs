//! Hardware bindings for the STM32G0 rig board.
//!
//! The analog sense line rides PA0 into ADC1; the switch output is an
//! open-drain line on PA4 through the same SN74LVC07 buffer arrangement as
//! the rest of the board. Both wrappers exist so the rig task stays free of
//! pin-level detail.

#![cfg(target_os = "none")]
#![allow(dead_code)]

use cycler_core::actuator::{SwitchAction, SwitchDriver};
use embassy_stm32::Peri;
use embassy_stm32::adc::{Adc, SampleTime};
use embassy_stm32::gpio::OutputOpenDrain;
use embassy_stm32::peripherals::{ADC1, PA0};

/// Embassy ADC wrapper sampling the power sense line.
pub struct SenseAdc<'d> {
    adc: Adc<'d, ADC1>,
    pin: Peri<'d, PA0>,
    discard_next: bool,
}

impl<'d> SenseAdc<'d> {
    /// Constructs the helper and configures a conservative sample time.
    pub fn new(mut adc: Adc<'d, ADC1>, pin: Peri<'d, PA0>) -> Self {
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            adc,
            pin,
            discard_next: true,
        }
    }

    /// Performs one blocking conversion of the sense line.
    pub fn read(&mut self) -> u16 {
        if self.discard_next {
            // First conversion after power-up reads stale charge.
            let _ = self.adc.blocking_read(&mut self.pin);
            self.discard_next = false;
        }

        self.adc.blocking_read(&mut self.pin)
    }
}

/// Open-drain switch output implementing the core driver seam.
pub struct SwitchOutput<'d> {
    line: OutputOpenDrain<'d>,
}

impl<'d> SwitchOutput<'d> {
    /// Wraps the configured open-drain output.
    pub fn new(line: OutputOpenDrain<'d>) -> Self {
        Self { line }
    }
}

impl SwitchDriver for SwitchOutput<'_> {
    fn apply(&mut self, action: SwitchAction) {
        match action {
            SwitchAction::AssertLow => self.line.set_low(),
            SwitchAction::ReleaseHigh => self.line.set_high(),
        }
    }
}
