use core::fmt::Write;

use heapless::String;

use crate::Runtime;
use crate::config::{
    MULTIPLIER_MAX, MULTIPLIER_MIN, NUM_AI, NUM_DIGITAL_PINS, PERIOD_MAX_US, PERIOD_MIN_US,
    PWM_MAX_VALUE, PWM_MIN_VALUE, PWM_SLOTS, RESPONSE_CAPACITY, SOFTWARE_ID, SOFTWARE_VERSION,
    is_valid_digital_pin,
};
use crate::error::{ErrorCode, PinKind};
use crate::parser::CommandLine;
use crate::ports::{AnalogInput, DigitalIo, PinMode, PwmOutput};
use crate::pwm::PwmAllocator;

/// One response line, without its terminator.
pub type Reply = String<RESPONSE_CAPACITY>;

type Handler<'r, D, A, P> =
    fn(&mut Dispatcher<'r, D, A, P>, &CommandLine<'_>) -> Result<Reply, ErrorCode>;

const COMMAND_COUNT: usize = 20;

/// Turns command lines into reply lines.
///
/// Owns the hardware ports it drives and the PWM pool; shares only the
/// [`Runtime`] with the sampler.
pub struct Dispatcher<'r, D, A, P> {
    runtime: &'r Runtime,
    gpio: D,
    adc: A,
    pwm_out: P,
    pwm: PwmAllocator<PWM_SLOTS>,
    pwm_timer_ready: bool,
    commands: [(&'static str, Handler<'r, D, A, P>); COMMAND_COUNT],
}

impl<'r, D, A, P> Dispatcher<'r, D, A, P>
where
    D: DigitalIo,
    A: AnalogInput,
    P: PwmOutput,
{
    pub fn new(runtime: &'r Runtime, gpio: D, adc: A, pwm_out: P) -> Self {
        Self {
            runtime,
            gpio,
            adc,
            pwm_out,
            pwm: PwmAllocator::new(),
            pwm_timer_ready: false,
            commands: [
                ("?ai", Self::read_ai),
                ("?#ai", Self::num_ai),
                ("!ai:watch", Self::watch_ai),
                ("?ai:mean", Self::read_ai_mean),
                ("!bo", Self::write_bo),
                ("!pin", Self::set_pin_mode),
                ("!pwm", Self::write_pwm),
                ("?#bi", Self::num_bin),
                ("?bi", Self::read_bi),
                ("?v", Self::version),
                ("?id", Self::id),
                ("?rate", Self::rate),
                ("!t", Self::set_period),
                ("?t", Self::period),
                ("?t:min", Self::period_min),
                ("?t:max", Self::period_max),
                ("!k", Self::set_multiplier),
                ("?k", Self::multiplier),
                ("?k:min", Self::multiplier_min),
                ("?k:max", Self::multiplier_max),
            ],
        }
    }

    /// Handle one complete line. Always yields exactly one reply line.
    pub fn execute(&mut self, raw: &str) -> Reply {
        let result = CommandLine::parse(raw).and_then(|line| self.dispatch(&line));
        match result {
            Ok(reply) => reply,
            Err(code) => {
                log::debug!("{}: {}", code, raw);
                error_reply(code, raw)
            }
        }
    }

    pub fn pwm(&self) -> &PwmAllocator<PWM_SLOTS> {
        &self.pwm
    }

    fn dispatch(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let handler = self
            .commands
            .iter()
            .find(|(opcode, _)| *opcode == line.opcode.as_str())
            .map(|&(_, handler)| handler)
            .ok_or(ErrorCode::UnknownCommand)?;
        handler(self, line)
    }

    fn read_ai(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let index = channel_index(line)?;
        let raw = self.adc.read(index).map_err(|_| ErrorCode::ReadingAdc)?;
        Ok(reply(format_args!("AI {} {}", index, raw)))
    }

    fn num_ai(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        Ok(reply(format_args!("NUM_AI {}", NUM_AI)))
    }

    fn watch_ai(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let index = channel_index(line)?;
        let enable = match line.arg2 {
            None | Some(1) => true,
            Some(0) => false,
            Some(_) => return Err(ErrorCode::InvalidArgument),
        };
        self.runtime
            .telemetry
            .with(|telemetry| telemetry.channels[index].watch(enable));
        log::debug!("AI {} watched={}", index, enable);
        Ok(ok())
    }

    fn read_ai_mean(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let index = channel_index(line)?;
        let scaled = self.runtime.telemetry.with(|telemetry| {
            let channel = &telemetry.channels[index];
            if !channel.watched {
                return Err(ErrorCode::AiNotWatched);
            }
            Ok(f64::from(channel.mean) * telemetry.settings.multiplier() as f64)
        })?;
        Ok(reply(format_args!("AI_MEAN {} {:.2}", index, scaled)))
    }

    fn write_bo(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let (pin, level) = both_args(line)?;
        let pin = digital_pin(pin, PinKind::BinaryOut)?;
        let high = binary_level(level)?;
        self.gpio
            .set_mode(pin, PinMode::Output)
            .map_err(|_| ErrorCode::SettingPinMode)?;
        self.gpio
            .set_level(pin, high)
            .map_err(|_| ErrorCode::SettingBoLevel)?;
        Ok(ok())
    }

    fn set_pin_mode(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let (pin, mode) = both_args(line)?;
        let pin = digital_pin(pin, PinKind::PinMode)?;
        let mode = if binary_level(mode)? {
            PinMode::Output
        } else {
            PinMode::Input
        };
        self.gpio
            .set_mode(pin, mode)
            .map_err(|_| ErrorCode::SettingPinMode)?;
        Ok(ok())
    }

    fn write_pwm(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let (pin, duty) = both_args(line)?;
        let pin = digital_pin(pin, PinKind::Pwm)?;
        if !(PWM_MIN_VALUE..=PWM_MAX_VALUE).contains(&duty) {
            return Err(ErrorCode::PwmValueOutOfRange);
        }
        let grant = self.pwm.reserve(pin)?;
        self.ensure_pwm_timer()?;
        if grant.fresh {
            self.pwm_out
                .configure_channel(grant.channel, pin)
                .map_err(|_| ErrorCode::ConfiguringLedcChannel)?;
            // The channel now drives the pin, so the slot is taken even if
            // the duty write below fails.
            self.pwm.bind(grant);
        }
        self.pwm_out
            .set_duty(grant.channel, duty as u8)
            .map_err(|_| ErrorCode::SettingPwmDuty)?;
        Ok(ok())
    }

    /// The PWM timer is shared by every channel and started on first use,
    /// at the frequency matching the period configured at that moment.
    fn ensure_pwm_timer(&mut self) -> Result<(), ErrorCode> {
        if self.pwm_timer_ready {
            return Ok(());
        }
        let period_us = self
            .runtime
            .telemetry
            .with(|telemetry| telemetry.settings.period_us());
        let frequency_hz = u32::try_from(1_000_000 / period_us).unwrap_or(0);
        self.pwm_out
            .configure_timer(frequency_hz)
            .map_err(|_| ErrorCode::ConfiguringLedcTimer)?;
        log::info!("PWM timer running at {} Hz", frequency_hz);
        self.pwm_timer_ready = true;
        Ok(())
    }

    fn num_bin(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        Ok(reply(format_args!("NUM_BIN {}", NUM_DIGITAL_PINS)))
    }

    fn read_bi(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let pin = line.arg1.ok_or(ErrorCode::MissingArgument)?;
        let pin = digital_pin(pin, PinKind::BinaryIn)?;
        let level = self.gpio.level(pin);
        Ok(reply(format_args!("BI {} {}", pin, u8::from(level))))
    }

    fn version(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        Ok(reply(format_args!("VERSION {}", SOFTWARE_VERSION)))
    }

    fn id(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        Ok(reply(format_args!("ID {}", SOFTWARE_ID)))
    }

    fn rate(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let rate = self.runtime.telemetry.with(|telemetry| telemetry.rate);
        Ok(reply(format_args!("RATE {}", rate)))
    }

    fn set_period(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let period_us = line.arg1.ok_or(ErrorCode::MissingArgument)?;
        self.runtime
            .telemetry
            .with(|telemetry| telemetry.settings.set_period_us(period_us))?;
        self.runtime.reanchor.signal(());
        log::info!("period set to {} us", period_us);
        Ok(ok())
    }

    fn period(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let period_us = self
            .runtime
            .telemetry
            .with(|telemetry| telemetry.settings.period_us());
        Ok(reply(format_args!("PERIOD {}", period_us)))
    }

    fn period_min(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        Ok(reply(format_args!("{}", PERIOD_MIN_US)))
    }

    fn period_max(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        Ok(reply(format_args!("{}", PERIOD_MAX_US)))
    }

    fn set_multiplier(&mut self, line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let multiplier = line.arg1.ok_or(ErrorCode::MissingArgument)?;
        self.runtime
            .telemetry
            .with(|telemetry| telemetry.settings.set_multiplier(multiplier))?;
        Ok(ok())
    }

    fn multiplier(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        let multiplier = self
            .runtime
            .telemetry
            .with(|telemetry| telemetry.settings.multiplier());
        Ok(reply(format_args!("MULTIPLIER {}", multiplier)))
    }

    fn multiplier_min(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        Ok(reply(format_args!("{}", MULTIPLIER_MIN)))
    }

    fn multiplier_max(&mut self, _line: &CommandLine<'_>) -> Result<Reply, ErrorCode> {
        Ok(reply(format_args!("{}", MULTIPLIER_MAX)))
    }
}

/// `ERROR_<CODE>: <raw>`, with `raw` cut short if it does not fit.
pub fn error_reply(code: ErrorCode, raw: &str) -> Reply {
    let mut line = Reply::new();
    let _ = line.push_str(code.token());
    let _ = line.push_str(": ");
    for c in raw.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
    line
}

fn reply(args: core::fmt::Arguments<'_>) -> Reply {
    let mut line = Reply::new();
    let _ = line.write_fmt(args);
    line
}

fn ok() -> Reply {
    reply(format_args!("Ok"))
}

fn channel_index(line: &CommandLine<'_>) -> Result<usize, ErrorCode> {
    let index = line.arg1.ok_or(ErrorCode::MissingArgument)?;
    if NUM_AI == 0 {
        return Err(ErrorCode::NoAdcChannelsAvailable);
    }
    usize::try_from(index)
        .ok()
        .filter(|&index| index < NUM_AI)
        .ok_or(ErrorCode::AiIndexOutOfRange)
}

fn both_args(line: &CommandLine<'_>) -> Result<(i64, i64), ErrorCode> {
    match (line.arg1, line.arg2) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(ErrorCode::MissingArgument),
    }
}

fn digital_pin(pin: i64, kind: PinKind) -> Result<u8, ErrorCode> {
    if !is_valid_digital_pin(pin) {
        return Err(ErrorCode::PinNotAvailable(kind));
    }
    u8::try_from(pin).map_err(|_| ErrorCode::PinNotAvailable(kind))
}

fn binary_level(value: i64) -> Result<bool, ErrorCode> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ErrorCode::InvalidArgument),
    }
}
