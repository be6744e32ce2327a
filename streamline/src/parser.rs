use heapless::String;

use crate::config::COMMAND_LENGTH;
use crate::error::ErrorCode;

/// One tokenized input line: `opcode [arg1] [arg2]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine<'a> {
    pub opcode: String<COMMAND_LENGTH>,
    pub arg1: Option<i64>,
    pub arg2: Option<i64>,
    /// The line as received, echoed back in error responses.
    pub raw: &'a str,
}

impl<'a> CommandLine<'a> {
    /// Splits `raw` on spaces. Runs of spaces count as one separator.
    ///
    /// The opcode is truncated to [`COMMAND_LENGTH`]. Argument tokens go
    /// through [`parse_integer`], so a malformed number reads as its valid
    /// prefix (or 0) rather than failing.
    pub fn parse(raw: &'a str) -> Result<Self, ErrorCode> {
        let mut tokens = raw.split(' ').filter(|token| !token.is_empty());

        let Some(first) = tokens.next() else {
            return Err(ErrorCode::InvalidCommand);
        };
        let mut opcode = String::new();
        for c in first.chars() {
            if opcode.push(c).is_err() {
                break;
            }
        }

        let arg1 = tokens.next().map(parse_integer);
        let arg2 = tokens.next().map(parse_integer);
        if tokens.next().is_some() {
            return Err(ErrorCode::TooManyArguments);
        }

        Ok(Self {
            opcode,
            arg1,
            arg2,
            raw,
        })
    }
}

/// Integer literal with C `strtol(s, NULL, 0)` rules.
///
/// Leading whitespace and a sign are accepted, `0x`/`0X` selects hex and a
/// leading `0` selects octal. Parsing stops at the first invalid digit; no
/// digits at all gives 0. Values beyond `i64` saturate.
pub fn parse_integer(token: &str) -> i64 {
    let bytes = token.trim_start().as_bytes();
    let mut pos = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            pos = 1;
            true
        }
        Some(b'+') => {
            pos = 1;
            false
        }
        _ => false,
    };

    let rest = &bytes[pos..];
    let has_hex_digit = |at: usize| rest.get(at).is_some_and(|b| b.is_ascii_hexdigit());
    let hex_prefix = rest.starts_with(b"0x") || rest.starts_with(b"0X");
    let (radix, digits) = if hex_prefix && has_hex_digit(2) {
        (16, &rest[2..])
    } else if rest.first() == Some(&b'0') {
        (8, rest)
    } else {
        (10, rest)
    };

    let mut magnitude: i64 = 0;
    let mut saturated = false;
    for &b in digits {
        let Some(digit) = (b as char).to_digit(radix) else {
            break;
        };
        match magnitude
            .checked_mul(i64::from(radix))
            .and_then(|m| m.checked_add(i64::from(digit)))
        {
            Some(next) => magnitude = next,
            None => {
                saturated = true;
                break;
            }
        }
    }

    match (negative, saturated) {
        (false, false) => magnitude,
        (false, true) => i64::MAX,
        (true, false) => -magnitude,
        (true, true) => i64::MIN,
    }
}
