//! Protocol and board constants shared by the firmware and the host tests.

use embassy_time::Duration;

pub const SOFTWARE_VERSION: &str = "2025-12-18";
pub const SOFTWARE_ID: &str = "ESP32-EPICS Streamline";

/// Longest command line accepted by the framer, terminator excluded.
pub const BUFFER_LENGTH: usize = 40;
/// Opcodes are truncated to this many bytes before lookup.
pub const COMMAND_LENGTH: usize = 16;
/// Room for the longest error code plus an echoed full input line.
pub const RESPONSE_CAPACITY: usize = 112;

pub const PERIOD_DEFAULT_US: i64 = 20_000;
pub const PERIOD_MIN_US: i64 = 5_000;
pub const PERIOD_MAX_US: i64 = 3_600_000;

pub const MULTIPLIER_DEFAULT: i64 = 1_000;
pub const MULTIPLIER_MIN: i64 = 1;
pub const MULTIPLIER_MAX: i64 = 1_000_000;

pub const PWM_MIN_VALUE: i64 = 0;
pub const PWM_MAX_VALUE: i64 = 255;
/// One slot per LEDC channel on the ESP32-C6.
pub const PWM_SLOTS: usize = 6;

/// ADC1 channels 0..=3, wired to GPIO1..=GPIO4.
pub const NUM_AI: usize = 4;

/// GPIO0 up to (not including) this number are candidates for digital I/O.
pub const NUM_DIGITAL_PINS: u8 = 22;
/// USB D+/D- belong to the host link.
pub const RESERVED_PINS: [u8; 2] = [18, 19];

// Sampler pacing: tight while something is watched, relaxed otherwise.
pub const SAMPLE_TICK_ACTIVE: Duration = Duration::from_millis(1);
pub const SAMPLE_TICK_IDLE: Duration = Duration::from_millis(10);

/// Digital pin availability: inside the board range and not owned by the link.
pub fn is_valid_digital_pin(pin: i64) -> bool {
    if pin < 0 || pin >= i64::from(NUM_DIGITAL_PINS) {
        return false;
    }
    if RESERVED_PINS.iter().any(|&reserved| i64::from(reserved) == pin) {
        log::warn!("GPIO {} is used for USB D+/D-", pin);
        return false;
    }
    true
}
