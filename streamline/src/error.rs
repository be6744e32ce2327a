use core::fmt::Display;

/// Which command family a pin check failed for; each has its own error token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinKind {
    BinaryIn,
    BinaryOut,
    PinMode,
    Pwm,
}

/// Every per-line failure the protocol can report.
///
/// `Display` prints the wire token (`ERROR_MISSING_ARGUMENT`, ...); the link
/// appends `": "` and the raw input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    MissingArgument,
    InvalidArgument,
    TooManyArguments,
    UnknownCommand,
    InvalidCommand,
    InputBufferOverflow,
    PinNotAvailable(PinKind),
    AiIndexOutOfRange,
    NoAdcChannelsAvailable,
    AiNotWatched,
    MultiplierRange,
    PwmValueOutOfRange,
    NoPwmSlotsAvailable,
    SettingPinMode,
    SettingBoLevel,
    ConfiguringLedcTimer,
    ConfiguringLedcChannel,
    SettingPwmDuty,
    ReadingAdc,
}

impl ErrorCode {
    pub fn token(&self) -> &'static str {
        match self {
            ErrorCode::MissingArgument => "ERROR_MISSING_ARGUMENT",
            ErrorCode::InvalidArgument => "ERROR_INVALID_ARGUMENT",
            ErrorCode::TooManyArguments => "ERROR_TOO_MANY_ARGUMENTS",
            ErrorCode::UnknownCommand => "ERROR_UNKNOWN_COMMAND",
            ErrorCode::InvalidCommand => "ERROR_INVALID_COMMAND",
            ErrorCode::InputBufferOverflow => "ERROR_INPUT_BUFFER_OVERFLOW",
            ErrorCode::PinNotAvailable(PinKind::BinaryIn) => "ERROR_BI_PIN_NOT_AVAILABLE",
            ErrorCode::PinNotAvailable(PinKind::BinaryOut) => "ERROR_BO_PIN_NOT_AVAILABLE",
            ErrorCode::PinNotAvailable(PinKind::PinMode) => "ERROR_PIN_NOT_AVAILABLE",
            ErrorCode::PinNotAvailable(PinKind::Pwm) => "ERROR_PWM_PIN_NOT_AVAILABLE",
            ErrorCode::AiIndexOutOfRange => "ERROR_AI_INDEX_OUT_OF_RANGE",
            ErrorCode::NoAdcChannelsAvailable => "ERROR_NO_ADC_CHANNELS_AVAILABLE",
            ErrorCode::AiNotWatched => "ERROR_AI_NOT_WATCHED",
            ErrorCode::MultiplierRange => "ERROR_MULTIPLIER_RANGE",
            ErrorCode::PwmValueOutOfRange => "ERROR_PWM_VALUE_OUT_OF_RANGE",
            ErrorCode::NoPwmSlotsAvailable => "ERROR_NO_PWM_SLOTS_AVAILABLE",
            ErrorCode::SettingPinMode => "ERROR_SETTING_PINMODE",
            ErrorCode::SettingBoLevel => "ERROR_SETTING_BO_LEVEL",
            ErrorCode::ConfiguringLedcTimer => "ERROR_CONFIGURING_LEDC_TIMER",
            ErrorCode::ConfiguringLedcChannel => "ERROR_CONFIGURING_LEDC_CHANNEL",
            ErrorCode::SettingPwmDuty => "ERROR_SETTING_PWM_DUTY",
            ErrorCode::ReadingAdc => "ERROR_READING_ADC",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.token())
    }
}

impl core::error::Error for ErrorCode {}

/// A hardware port call failed. The caller decides which `ErrorCode` it becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareError;

impl Display for HardwareError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("HardwareError")
    }
}

impl core::error::Error for HardwareError {}
