//! Debounced power-state sampling.
//!
//! Raw ADC readings arrive once per tick and are folded into a fixed
//! five-slot window. Every fifth reading the window commits: the mean is
//! compared against the configured threshold and a single debounced
//! [`PowerState`] is produced. The window is non-overlapping on purpose; a
//! sliding average would smear the edges the sequencer keys off, and no
//! further filtering (median, outlier rejection) is applied.

/// Number of raw readings folded into one debounced observation.
pub const SAMPLE_WINDOW_LEN: usize = 5;

/// Default classification threshold in raw ADC counts.
///
/// The sense line is pulled low while the monitored device is powered, so a
/// window average *below* the threshold reads as on. The value is
/// scale-dependent and recalibrated per board through [`SamplerConfig`].
pub const DEFAULT_ON_THRESHOLD: u16 = 100;

/// Number of committed states retained by [`PowerHistory`].
pub const POWER_HISTORY_LEN: usize = 3;

/// Debounced power state of the monitored device.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PowerState {
    On,
    #[default]
    Off,
}

impl PowerState {
    /// Returns `true` when the state is [`PowerState::On`].
    #[must_use]
    pub const fn is_on(self) -> bool {
        matches!(self, PowerState::On)
    }

    /// Classifies a completed window average against the threshold.
    #[must_use]
    pub const fn from_average(average: u16, threshold: u16) -> Self {
        if average < threshold {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

/// Calibration for the analog sense input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SamplerConfig {
    threshold: u16,
}

impl SamplerConfig {
    /// Creates a configuration with an explicit threshold.
    #[must_use]
    pub const fn new(threshold: u16) -> Self {
        Self { threshold }
    }

    /// Returns the configured classification threshold.
    #[must_use]
    pub const fn threshold(&self) -> u16 {
        self.threshold
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ON_THRESHOLD)
    }
}

/// Round-robin buffer of the most recent raw readings.
#[derive(Copy, Clone, Debug, Default)]
struct SampleWindow {
    slots: [u16; SAMPLE_WINDOW_LEN],
    index: usize,
}

impl SampleWindow {
    /// Stores a reading; returns the window mean when the fifth slot fills.
    fn push(&mut self, raw: u16) -> Option<u16> {
        self.slots[self.index] = raw;
        if self.index + 1 == SAMPLE_WINDOW_LEN {
            self.index = 0;
            let sum: u32 = self.slots.iter().map(|slot| u32::from(*slot)).sum();
            #[allow(clippy::cast_possible_truncation)]
            let average = (sum / SAMPLE_WINDOW_LEN as u32) as u16;
            Some(average)
        } else {
            self.index += 1;
            None
        }
    }

    fn reset(&mut self) {
        self.slots = [0; SAMPLE_WINDOW_LEN];
        self.index = 0;
    }
}

/// Converts a stream of raw analog readings into debounced power states.
#[derive(Copy, Clone, Debug, Default)]
pub struct Sampler {
    window: SampleWindow,
    config: SamplerConfig,
}

impl Sampler {
    /// Creates a sampler with the provided calibration.
    #[must_use]
    pub const fn new(config: SamplerConfig) -> Self {
        Self {
            window: SampleWindow {
                slots: [0; SAMPLE_WINDOW_LEN],
                index: 0,
            },
            config,
        }
    }

    /// Folds one raw reading into the window.
    ///
    /// Returns a committed state on every fifth call and `None` on the four
    /// intermediate calls.
    pub fn observe(&mut self, raw: u16) -> Option<PowerState> {
        self.window
            .push(raw)
            .map(|average| PowerState::from_average(average, self.config.threshold()))
    }

    /// Discards any partially filled window.
    pub fn reset(&mut self) {
        self.window.reset();
    }

    /// Returns the active classification threshold.
    #[must_use]
    pub const fn threshold(&self) -> u16 {
        self.config.threshold()
    }
}

/// Record of the three most recent committed states, most recent first.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PowerHistory {
    states: [PowerState; POWER_HISTORY_LEN],
}

impl PowerHistory {
    /// Creates a history with every slot off.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            states: [PowerState::Off; POWER_HISTORY_LEN],
        }
    }

    /// Shifts the record back one slot and stores the newest state in front.
    pub fn push(&mut self, state: PowerState) {
        self.states[2] = self.states[1];
        self.states[1] = self.states[0];
        self.states[0] = state;
    }

    /// The latest committed state.
    #[must_use]
    pub const fn current(&self) -> PowerState {
        self.states[0]
    }

    /// The state committed one debounce cycle ago.
    #[must_use]
    pub const fn previous(&self) -> PowerState {
        self.states[1]
    }

    /// The state committed two debounce cycles ago.
    #[must_use]
    pub const fn previous_previous(&self) -> PowerState {
        self.states[2]
    }

    /// Returns every slot to off.
    pub fn reset(&mut self) {
        self.states = [PowerState::Off; POWER_HISTORY_LEN];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_one_state_per_five_readings() {
        let mut sampler = Sampler::new(SamplerConfig::default());

        for raw in [50, 60, 70, 80] {
            assert_eq!(sampler.observe(raw), None);
        }
        assert_eq!(sampler.observe(90), Some(PowerState::On));

        for raw in [1_000, 1_000, 1_000, 1_000] {
            assert_eq!(sampler.observe(raw), None);
        }
        assert_eq!(sampler.observe(1_000), Some(PowerState::Off));
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut sampler = Sampler::new(SamplerConfig::new(100));
        for _ in 0..4 {
            assert_eq!(sampler.observe(100), None);
        }
        // Average exactly at the threshold still reads as off.
        assert_eq!(sampler.observe(100), Some(PowerState::Off));

        for _ in 0..4 {
            assert_eq!(sampler.observe(99), None);
        }
        assert_eq!(sampler.observe(99), Some(PowerState::On));
    }

    #[test]
    fn reset_discards_partial_window() {
        let mut sampler = Sampler::new(SamplerConfig::default());
        assert_eq!(sampler.observe(0), None);
        assert_eq!(sampler.observe(0), None);
        sampler.reset();

        for _ in 0..4 {
            assert_eq!(sampler.observe(1_000), None);
        }
        assert_eq!(sampler.observe(1_000), Some(PowerState::Off));
    }

    #[test]
    fn custom_threshold_applies() {
        let mut sampler = Sampler::new(SamplerConfig::new(600));
        assert_eq!(sampler.threshold(), 600);
        for _ in 0..4 {
            assert_eq!(sampler.observe(500), None);
        }
        assert_eq!(sampler.observe(500), Some(PowerState::On));
    }

    #[test]
    fn history_shifts_most_recent_first() {
        let mut history = PowerHistory::new();
        history.push(PowerState::On);
        history.push(PowerState::Off);
        history.push(PowerState::On);

        assert_eq!(history.current(), PowerState::On);
        assert_eq!(history.previous(), PowerState::Off);
        assert_eq!(history.previous_previous(), PowerState::On);
    }

    #[test]
    fn history_reset_returns_all_slots_to_off() {
        let mut history = PowerHistory::new();
        history.push(PowerState::On);
        history.push(PowerState::On);
        history.reset();

        assert_eq!(history.current(), PowerState::Off);
        assert_eq!(history.previous(), PowerState::Off);
        assert_eq!(history.previous_previous(), PowerState::Off);
    }
}
