//! Simulated monitored device.
//!
//! Stands in for the board under test: it exposes a noisy analog sense
//! level (low while powered, high while off) and reacts to switch pulses
//! the way real hardware does, with a boot latency between the pulse and
//! the sense line dropping. The `faulty` profile ignores pulses entirely,
//! which is the cheapest way to watch the rig report failed power-on
//! attempts.

use std::time::{Duration, Instant};

/// Mean sense level while the device is powered.
const ON_LEVEL: u16 = 40;
/// Mean sense level while the device is off.
const OFF_LEVEL: u16 = 760;
/// Peak-to-peak noise folded onto the sense level.
const NOISE_SPAN: u16 = 48;

/// Behavioral profile for the simulated device.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceProfile {
    /// Boots a moment after a switch pulse.
    Normal,
    /// Ignores switch pulses; the rig's attempts always fail.
    Faulty,
}

impl DeviceProfile {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("normal") {
            Ok(Self::Normal)
        } else if tag.eq_ignore_ascii_case("faulty") {
            Ok(Self::Faulty)
        } else {
            Err(format!("Unknown device profile `{tag}`"))
        }
    }
}

/// The device on the other end of the sense and switch lines.
pub struct SimulatedDevice {
    profile: DeviceProfile,
    boot_delay: Duration,
    powered: bool,
    press_started: Option<Instant>,
    boot_finished_at: Option<Instant>,
    noise_state: u32,
}

impl SimulatedDevice {
    /// Creates a powered-off device with a two second boot latency.
    pub fn new(profile: DeviceProfile) -> Self {
        Self::with_boot_delay(profile, Duration::from_secs(2))
    }

    /// Creates a device with an explicit boot latency.
    pub fn with_boot_delay(profile: DeviceProfile, boot_delay: Duration) -> Self {
        Self {
            profile,
            boot_delay,
            powered: false,
            press_started: None,
            boot_finished_at: None,
            noise_state: 0x2545_F491,
        }
    }

    /// Returns `true` once the device reports power.
    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Forces the power state, bypassing the switch (an operator reaching
    /// over and pressing the front-panel button).
    pub fn force_power(&mut self, powered: bool) {
        self.powered = powered;
        self.boot_finished_at = None;
    }

    /// The switch output was asserted.
    pub fn press(&mut self, now: Instant) {
        self.press_started = Some(now);
    }

    /// The switch output was released; a completed pulse acts on the device.
    pub fn release(&mut self, now: Instant) {
        if self.press_started.take().is_none() {
            return;
        }

        if self.profile == DeviceProfile::Faulty {
            return;
        }

        if self.powered {
            self.powered = false;
            self.boot_finished_at = None;
        } else {
            self.boot_finished_at = Some(now + self.boot_delay);
        }
    }

    /// Samples the analog sense line.
    pub fn read_level(&mut self, now: Instant) -> u16 {
        if let Some(deadline) = self.boot_finished_at
            && now >= deadline
        {
            self.boot_finished_at = None;
            self.powered = true;
        }

        let base = if self.powered { ON_LEVEL } else { OFF_LEVEL };
        base + self.noise()
    }

    /// Bounded xorshift noise so transcripts replay identically.
    fn noise(&mut self) -> u16 {
        let mut state = self.noise_state;
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        self.noise_state = state;
        #[allow(clippy::cast_possible_truncation)]
        let low = state as u16;
        low % NOISE_SPAN
    }
}
