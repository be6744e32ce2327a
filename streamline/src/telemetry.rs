//! State shared between the command dispatcher and the sampler.
//!
//! Everything both tasks touch lives in one [`Telemetry`] value behind one
//! lock, so there is no lock ordering to get wrong. The lock is only held for
//! the field updates themselves, never across a hardware call or a write to
//! the link.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};

use crate::config::{
    MULTIPLIER_DEFAULT, MULTIPLIER_MAX, MULTIPLIER_MIN, NUM_AI, PERIOD_DEFAULT_US, PERIOD_MAX_US,
    PERIOD_MIN_US,
};
use crate::error::ErrorCode;

/// Per analog channel accumulation state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelState {
    pub watched: bool,
    /// Sum of raw readings in the current window. Saturates instead of wrapping.
    pub accumulator: u64,
    /// Mean of the last completed window, before the multiplier.
    pub mean: f32,
}

impl ChannelState {
    /// Turn watching on or off. Either way the window restarts from zero.
    pub fn watch(&mut self, enable: bool) {
        self.watched = enable;
        self.accumulator = 0;
        self.mean = 0.0;
    }

    pub fn accumulate(&mut self, raw: u16) {
        self.accumulator = self.accumulator.saturating_add(u64::from(raw));
    }

    /// Close the window: publish the mean and start a fresh accumulation.
    ///
    /// `window_ticks` is every sampler tick of the window, watched or not,
    /// so a channel enabled late averages in the ticks it missed as zeros.
    pub fn roll_over(&mut self, window_ticks: u64) {
        let denominator = window_ticks.max(1);
        self.mean = (self.accumulator as f64 / denominator as f64) as f32;
        self.accumulator = 0;
    }
}

/// Sampling period and report multiplier, always inside their bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    period_us: i64,
    multiplier: i64,
}

impl Settings {
    pub const fn new() -> Self {
        Self {
            period_us: PERIOD_DEFAULT_US,
            multiplier: MULTIPLIER_DEFAULT,
        }
    }

    pub fn period_us(&self) -> i64 {
        self.period_us
    }

    pub fn multiplier(&self) -> i64 {
        self.multiplier
    }

    pub fn set_period_us(&mut self, period_us: i64) -> Result<(), ErrorCode> {
        if !(PERIOD_MIN_US..=PERIOD_MAX_US).contains(&period_us) {
            return Err(ErrorCode::InvalidArgument);
        }
        self.period_us = period_us;
        Ok(())
    }

    pub fn set_multiplier(&mut self, multiplier: i64) -> Result<(), ErrorCode> {
        if !(MULTIPLIER_MIN..=MULTIPLIER_MAX).contains(&multiplier) {
            return Err(ErrorCode::MultiplierRange);
        }
        self.multiplier = multiplier;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub channels: [ChannelState; NUM_AI],
    pub settings: Settings,
    /// Sampler ticks per second over the last completed window.
    pub rate: i64,
}

impl Telemetry {
    pub const fn new() -> Self {
        Self {
            channels: [ChannelState {
                watched: false,
                accumulator: 0,
                mean: 0.0,
            }; NUM_AI],
            settings: Settings::new(),
            rate: 0,
        }
    }

    pub fn watched(&self) -> [bool; NUM_AI] {
        core::array::from_fn(|i| self.channels[i].watched)
    }

    pub fn any_watched(&self) -> bool {
        self.channels.iter().any(|channel| channel.watched)
    }

    pub fn roll_over_watched(&mut self, window_ticks: u64) {
        for channel in self.channels.iter_mut().filter(|channel| channel.watched) {
            channel.roll_over(window_ticks);
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Telemetry`] behind a blocking critical-section mutex.
pub struct TelemetryStore {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Telemetry>>,
}

impl TelemetryStore {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Telemetry::new())),
        }
    }

    /// Run `f` with exclusive access. Keep `f` short: no I/O, no hardware.
    pub fn with<R>(&self, f: impl FnOnce(&mut Telemetry) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn snapshot(&self) -> Telemetry {
        self.with(|telemetry| telemetry.clone())
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_reject_out_of_range_and_keep_value() {
        let mut settings = Settings::new();
        assert_eq!(settings.set_period_us(PERIOD_MIN_US), Ok(()));
        assert_eq!(settings.set_period_us(PERIOD_MAX_US + 1), Err(ErrorCode::InvalidArgument));
        assert_eq!(settings.period_us(), PERIOD_MIN_US);

        assert_eq!(settings.set_multiplier(MULTIPLIER_MAX), Ok(()));
        assert_eq!(settings.set_multiplier(0), Err(ErrorCode::MultiplierRange));
        assert_eq!(settings.multiplier(), MULTIPLIER_MAX);
    }

    #[test]
    fn roll_over_averages_and_resets() {
        let mut channel = ChannelState::default();
        channel.watch(true);
        channel.accumulate(100);
        channel.accumulate(200);
        channel.roll_over(2);
        assert_eq!(channel.mean, 150.0);
        assert_eq!(channel.accumulator, 0);
    }

    #[test]
    fn roll_over_without_samples_divides_by_one() {
        let mut channel = ChannelState::default();
        channel.watch(true);
        channel.roll_over(0);
        assert_eq!(channel.mean, 0.0);

        channel.accumulate(40);
        channel.roll_over(0);
        assert_eq!(channel.mean, 40.0);
    }

    #[test]
    fn late_watch_counts_missed_ticks_as_zero() {
        let mut channel = ChannelState::default();
        channel.watch(true);
        for _ in 0..10 {
            channel.accumulate(1000);
        }
        channel.roll_over(20);
        assert_eq!(channel.mean, 500.0);
    }

    #[test]
    fn accumulator_saturates_instead_of_wrapping() {
        let mut channel = ChannelState::default();
        channel.watch(true);
        channel.accumulator = u64::MAX - 10;
        channel.accumulate(4095);
        assert_eq!(channel.accumulator, u64::MAX);
    }

    #[test]
    fn rewatch_clears_previous_window() {
        let mut channel = ChannelState::default();
        channel.watch(true);
        channel.accumulate(512);
        channel.roll_over(1);
        channel.accumulate(7);
        channel.watch(true);
        assert_eq!(channel, ChannelState { watched: true, ..ChannelState::default() });
    }

    #[test]
    fn store_rolls_over_only_watched_channels() {
        let store = TelemetryStore::new();
        store.with(|t| {
            t.channels[0].watch(true);
            t.channels[0].accumulate(10);
            t.channels[1].accumulator = 99;
            t.roll_over_watched(1);
        });
        let snapshot = store.snapshot();
        assert_eq!(snapshot.channels[0].mean, 10.0);
        assert_eq!(snapshot.channels[1].accumulator, 99);
        assert_eq!(snapshot.watched(), [true, false, false, false]);
    }
}
