//! Hardware ports the dispatcher and sampler drive.
//!
//! The firmware implements these over esp-hal; tests implement them with
//! in-memory fakes. All calls are synchronous and may fail.

use crate::error::HardwareError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

pub trait DigitalIo {
    /// Current logic level of `pin`, whatever its mode.
    ///
    /// Must not change what the pin is doing: a pin driven by PWM keeps
    /// its PWM output after being read.
    fn level(&mut self, pin: u8) -> bool;

    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), HardwareError>;

    fn set_level(&mut self, pin: u8, high: bool) -> Result<(), HardwareError>;
}

pub trait AnalogInput {
    /// One-shot conversion on analog channel `index` (`0..NUM_AI`).
    fn read(&mut self, index: usize) -> Result<u16, HardwareError>;
}

pub trait PwmOutput {
    /// Start the shared PWM timer. Called at most once successfully.
    fn configure_timer(&mut self, frequency_hz: u32) -> Result<(), HardwareError>;

    /// Route hardware `channel` to `pin` on the shared timer, duty 0.
    fn configure_channel(&mut self, channel: u8, pin: u8) -> Result<(), HardwareError>;

    /// 8-bit duty on an already configured channel.
    fn set_duty(&mut self, channel: u8, duty: u8) -> Result<(), HardwareError>;
}

impl<T: AnalogInput + ?Sized> AnalogInput for &mut T {
    fn read(&mut self, index: usize) -> Result<u16, HardwareError> {
        (**self).read(index)
    }
}
