use embassy_time::{Duration, Instant, Ticker};

use crate::Runtime;
use crate::config::{NUM_AI, SAMPLE_TICK_ACTIVE, SAMPLE_TICK_IDLE};
use crate::ports::AnalogInput;

/// Window boundaries on a monotonic clock.
///
/// Each boundary is the previous one plus the period, unless
/// [`reanchor`](Self::reanchor) pulls it back to "now".
#[derive(Debug, Clone, Copy)]
pub struct WindowTimer {
    started: Instant,
    deadline: Instant,
    ticks: u64,
}

impl WindowTimer {
    pub fn new(now: Instant, period: Duration) -> Self {
        Self {
            started: now,
            deadline: now + period,
            ticks: 0,
        }
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Make the current window end at `now`.
    pub fn reanchor(&mut self, now: Instant) {
        self.deadline = now;
    }

    /// Ticks per second since the window started; 0 if no time has passed.
    pub fn rate(&self, now: Instant) -> i64 {
        let elapsed_us = now.saturating_duration_since(self.started).as_micros();
        if elapsed_us == 0 {
            return 0;
        }
        let rate = self.ticks.saturating_mul(1_000_000) / elapsed_us;
        i64::try_from(rate).unwrap_or(i64::MAX)
    }

    /// Start the next window, ending one `period` after the old deadline.
    ///
    /// If the sampler fell more than a whole period behind, the next window
    /// is measured from `now` instead.
    pub fn advance(&mut self, now: Instant, period: Duration) {
        self.started = now;
        self.deadline += period;
        if self.deadline <= now {
            self.deadline = now + period;
        }
        self.ticks = 0;
    }
}

/// Periodic analog sampling into the shared telemetry.
pub struct Sampler<'r, A> {
    runtime: &'r Runtime,
    adc: A,
    window: WindowTimer,
}

impl<'r, A: AnalogInput> Sampler<'r, A> {
    pub fn new(runtime: &'r Runtime, adc: A, now: Instant) -> Self {
        let period_us = runtime
            .telemetry
            .with(|telemetry| telemetry.settings.period_us());
        Self {
            runtime,
            adc,
            window: WindowTimer::new(now, period(period_us)),
        }
    }

    pub fn window(&self) -> &WindowTimer {
        &self.window
    }

    /// One sampling pass at time `now`. Returns whether any channel is watched.
    ///
    /// The watched set is copied out of the store, the ADC is read with the
    /// lock released, and readings are folded back only into channels that
    /// are still watched.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.runtime.reanchor.try_take().is_some() {
            log::debug!("sampler window re-anchored");
            self.window.reanchor(now);
        }

        let watched = self.runtime.telemetry.with(|telemetry| telemetry.watched());
        let mut readings: [Option<u16>; NUM_AI] = [None; NUM_AI];
        for (index, reading) in readings.iter_mut().enumerate() {
            if !watched[index] {
                continue;
            }
            match self.adc.read(index) {
                Ok(raw) => *reading = Some(raw),
                Err(e) => log::warn!("AI {} read failed: {}", index, e),
            }
        }

        if readings.iter().any(Option::is_some) {
            self.runtime.telemetry.with(|telemetry| {
                for (channel, reading) in telemetry.channels.iter_mut().zip(readings) {
                    if let Some(raw) = reading {
                        if channel.watched {
                            channel.accumulate(raw);
                        }
                    }
                }
            });
        }

        self.window.tick();
        if self.window.is_due(now) {
            let rate = self.window.rate(now);
            let ticks = self.window.ticks();
            let period_us = self.runtime.telemetry.with(|telemetry| {
                telemetry.rate = rate;
                telemetry.roll_over_watched(ticks);
                telemetry.settings.period_us()
            });
            self.window.advance(now, period(period_us));
        }

        watched.iter().any(|&w| w)
    }

    /// Tick forever: every `SAMPLE_TICK_ACTIVE` while something is watched,
    /// every `SAMPLE_TICK_IDLE` otherwise.
    pub async fn run(mut self) -> ! {
        log::info!("sampler task starting");
        let mut busy = false;
        let mut ticker = Ticker::every(SAMPLE_TICK_IDLE);
        loop {
            let now_busy = self.tick(Instant::now());
            if now_busy != busy {
                busy = now_busy;
                ticker = Ticker::every(if busy {
                    SAMPLE_TICK_ACTIVE
                } else {
                    SAMPLE_TICK_IDLE
                });
            }
            ticker.next().await;
        }
    }
}

fn period(period_us: i64) -> Duration {
    Duration::from_micros(u64::try_from(period_us).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HardwareError;

    struct FixedAdc([u16; NUM_AI]);

    impl AnalogInput for FixedAdc {
        fn read(&mut self, index: usize) -> Result<u16, HardwareError> {
            Ok(self.0[index])
        }
    }

    struct BrokenAdc;

    impl AnalogInput for BrokenAdc {
        fn read(&mut self, _index: usize) -> Result<u16, HardwareError> {
            Err(HardwareError)
        }
    }

    fn at(us: u64) -> Instant {
        Instant::from_micros(us)
    }

    #[test]
    fn window_rate_counts_ticks_per_second() {
        let mut window = WindowTimer::new(at(0), Duration::from_micros(20_000));
        for _ in 0..20 {
            window.tick();
        }
        assert!(window.is_due(at(20_000)));
        assert_eq!(window.rate(at(20_000)), 1_000);
        assert_eq!(window.rate(at(0)), 0);

        window.advance(at(20_000), Duration::from_micros(20_000));
        assert_eq!(window.ticks(), 0);
        assert_eq!(window.deadline(), at(40_000));
    }

    #[test]
    fn late_window_restarts_from_now() {
        let mut window = WindowTimer::new(at(0), Duration::from_micros(20_000));
        window.advance(at(75_000), Duration::from_micros(20_000));
        assert_eq!(window.deadline(), at(95_000));
    }

    #[test]
    fn idle_ticks_still_drive_the_window() {
        let runtime = Runtime::new();
        let mut sampler = Sampler::new(&runtime, FixedAdc([0; NUM_AI]), at(0));
        assert!(!sampler.tick(at(10_000)));
        assert!(!sampler.tick(at(20_000)));
        assert_eq!(runtime.telemetry.with(|t| t.rate), 100);
        assert_eq!(sampler.window().deadline(), at(40_000));
    }

    #[test]
    fn watched_channels_accumulate_and_publish_mean() {
        let runtime = Runtime::new();
        runtime.telemetry.with(|t| t.channels[1].watch(true));
        let mut sampler = Sampler::new(&runtime, FixedAdc([5, 300, 7, 9]), at(0));

        assert!(sampler.tick(at(5_000)));
        let mid = runtime.telemetry.snapshot();
        assert_eq!(mid.channels[1].accumulator, 300);
        assert_eq!(mid.channels[0].accumulator, 0);

        sampler.tick(at(20_000));
        let done = runtime.telemetry.snapshot();
        assert_eq!(done.channels[1].mean, 300.0);
        assert_eq!(done.channels[1].accumulator, 0);
        assert_eq!(done.channels[0].mean, 0.0);
    }

    #[test]
    fn channel_watched_mid_window_averages_over_all_ticks() {
        let runtime = Runtime::new();
        let mut sampler = Sampler::new(&runtime, FixedAdc([1000; NUM_AI]), at(0));
        for step in 1..=10u64 {
            sampler.tick(at(step * 1_000));
        }
        runtime.telemetry.with(|t| t.channels[2].watch(true));
        for step in 11..=20u64 {
            sampler.tick(at(step * 1_000));
        }
        assert_eq!(runtime.telemetry.with(|t| t.channels[2].mean), 500.0);
    }

    #[test]
    fn period_change_reanchors_immediately() {
        let runtime = Runtime::new();
        runtime.telemetry.with(|t| t.settings.set_period_us(1_000_000).unwrap());
        let mut sampler = Sampler::new(&runtime, FixedAdc([0; NUM_AI]), at(0));
        sampler.tick(at(1_000));
        assert_eq!(sampler.window().deadline(), at(1_000_000));

        runtime.telemetry.with(|t| t.settings.set_period_us(10_000).unwrap());
        runtime.reanchor.signal(());
        sampler.tick(at(2_000));

        assert_eq!(sampler.window().deadline(), at(12_000));
        assert_eq!(sampler.window().ticks(), 0);
        assert_eq!(runtime.telemetry.with(|t| t.rate), 1_000);
    }

    #[test]
    fn failed_reads_are_skipped() {
        let runtime = Runtime::new();
        runtime.telemetry.with(|t| t.channels[0].watch(true));
        let mut sampler = Sampler::new(&runtime, BrokenAdc, at(0));
        assert!(sampler.tick(at(20_000)));
        let snapshot = runtime.telemetry.snapshot();
        assert!(snapshot.channels[0].watched);
        assert_eq!(snapshot.channels[0].mean, 0.0);
    }
}
