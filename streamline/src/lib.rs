#![no_std]

#[cfg(test)]
extern crate std;

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod framer;
pub mod link;
pub mod parser;
pub mod ports;
pub mod pwm;
pub mod sampler;
pub mod telemetry;

pub use dispatcher::{Dispatcher, Reply};
pub use error::{ErrorCode, HardwareError, PinKind};
pub use link::CommandLink;
pub use ports::{AnalogInput, DigitalIo, PinMode, PwmOutput};
pub use sampler::Sampler;
pub use telemetry::TelemetryStore;

/// Everything the command link and the sampler share.
///
/// Created once at boot and handed to both tasks by reference.
pub struct Runtime {
    pub telemetry: TelemetryStore,
    /// Raised by `!t`; the sampler ends its current window on the next tick.
    pub reanchor: Signal<CriticalSectionRawMutex, ()>,
}

impl Runtime {
    pub const fn new() -> Self {
        Self {
            telemetry: TelemetryStore::new(),
            reanchor: Signal::new(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
