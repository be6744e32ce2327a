//! PWM over the LEDC low-speed block.

use esp_hal::gpio::AnyPin;
use esp_hal::ledc::channel::{self, ChannelHW, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::peripherals::LEDC;
use esp_hal::time::Rate;
use static_cell::StaticCell;
use streamline::config::PWM_SLOTS;
use streamline::{HardwareError, PwmOutput};

/// Timer resolution. An 8-bit command duty is scaled up to this.
const DUTY_BITS: u32 = 14;

static LEDC_CELL: StaticCell<Ledc<'static>> = StaticCell::new();
static TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();

enum TimerState {
    Stopped(&'static mut timer::Timer<'static, LowSpeed>),
    Running(&'static timer::Timer<'static, LowSpeed>),
}

/// One shared timer (Timer0) and up to `PWM_SLOTS` channels bound to it.
pub struct LedcPwm {
    ledc: &'static Ledc<'static>,
    timer: Option<TimerState>,
    channels: [Option<channel::Channel<'static, LowSpeed>>; PWM_SLOTS],
}

impl LedcPwm {
    /// Panics if called twice.
    pub fn new(ledc: LEDC<'static>) -> Self {
        let ledc = LEDC_CELL.init(Ledc::new(ledc));
        ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
        let ledc: &'static Ledc<'static> = ledc;
        let timer = TIMER.init(ledc.timer::<LowSpeed>(timer::Number::Timer0));
        Self {
            ledc,
            timer: Some(TimerState::Stopped(timer)),
            channels: [const { None }; PWM_SLOTS],
        }
    }
}

fn channel_number(channel: u8) -> Result<channel::Number, HardwareError> {
    Ok(match channel {
        0 => channel::Number::Channel0,
        1 => channel::Number::Channel1,
        2 => channel::Number::Channel2,
        3 => channel::Number::Channel3,
        4 => channel::Number::Channel4,
        5 => channel::Number::Channel5,
        _ => return Err(HardwareError),
    })
}

fn scale_duty(duty: u8) -> u32 {
    u32::from(duty) * ((1 << DUTY_BITS) - 1) / u32::from(u8::MAX)
}

impl PwmOutput for LedcPwm {
    fn configure_timer(&mut self, frequency_hz: u32) -> Result<(), HardwareError> {
        if frequency_hz == 0 {
            return Err(HardwareError);
        }
        let state = match self.timer.take() {
            Some(TimerState::Stopped(timer)) => {
                let result = timer.configure(timer::config::Config {
                    duty: timer::config::Duty::Duty14Bit,
                    clock_source: timer::LSClockSource::APBClk,
                    frequency: Rate::from_hz(frequency_hz),
                });
                match result {
                    Ok(()) => TimerState::Running(timer),
                    Err(e) => {
                        log::warn!("LEDC timer at {} Hz: {:?}", frequency_hz, e);
                        self.timer = Some(TimerState::Stopped(timer));
                        return Err(HardwareError);
                    }
                }
            }
            other => other.ok_or(HardwareError)?,
        };
        self.timer = Some(state);
        Ok(())
    }

    fn configure_channel(&mut self, channel: u8, pin: u8) -> Result<(), HardwareError> {
        let Some(TimerState::Running(timer)) = self.timer else {
            return Err(HardwareError);
        };
        let slot = self
            .channels
            .get_mut(usize::from(channel))
            .ok_or(HardwareError)?;
        // SAFETY: the pin number was range checked by the dispatcher, and
        // the allocator hands each GPIO at most one channel.
        let output = unsafe { AnyPin::steal(pin) };
        let mut pwm = self.ledc.channel(channel_number(channel)?, output);
        pwm.configure(channel::config::Config {
            timer,
            duty_pct: 0,
            pin_config: channel::config::PinConfig::PushPull,
        })
        .map_err(|e| {
            log::warn!("LEDC channel {} on GPIO{}: {:?}", channel, pin, e);
            HardwareError
        })?;
        *slot = Some(pwm);
        Ok(())
    }

    fn set_duty(&mut self, channel: u8, duty: u8) -> Result<(), HardwareError> {
        match self.channels.get(usize::from(channel)) {
            Some(Some(pwm)) => {
                pwm.set_duty_hw(scale_duty(duty));
                Ok(())
            }
            _ => Err(HardwareError),
        }
    }
}
