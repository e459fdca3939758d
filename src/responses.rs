//! Classification of raw command responses
use heapless::String;

/// Max. length of an address reported by CIFSR command
pub const ADDRESS_SIZE: usize = 64;

/// Suffix of an error response carrying a numeric failure cause, e.g. `+CWJAP:3\r\n\r\nERROR\r\n`
const ERROR_SUFFIX: &[u8] = b"\r\n\r\nERROR\r\n";

/// Suffixes of a successful response
const SUCCESS_SUFFIXES: [&[u8]; 3] = [b"OK\r\n", b"no change\r\n", b"SEND OK\r\n"];

/// Outcome of a command, derived from the tail of the raw response
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResponseCode {
    /// Command was successful
    Success,

    /// CWJAP: connection timeout (code 1)
    JoinTimeout,

    /// CWJAP: wrong password (code 2)
    WrongPassword,

    /// CWJAP: cannot find the target access point (code 3)
    ApNotFound,

    /// CWJAP: connection failed (code 4)
    JoinFailed,

    /// Something went wrong, hard to say what. Also used for empty responses.
    Unknown,
}

impl ResponseCode {
    /// Maps a numeric failure cause
    fn from_failure_code(code: u8) -> Self {
        match code {
            1 => Self::JoinTimeout,
            2 => Self::WrongPassword,
            3 => Self::ApNotFound,
            4 => Self::JoinFailed,
            _ => Self::Unknown,
        }
    }

    /// Numeric failure cause, None for [ResponseCode::Success] and [ResponseCode::Unknown]
    pub fn failure_code(&self) -> Option<u8> {
        match self {
            Self::JoinTimeout => Some(1),
            Self::WrongPassword => Some(2),
            Self::ApNotFound => Some(3),
            Self::JoinFailed => Some(4),
            Self::Success | Self::Unknown => None,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == Self::Success
    }
}

/// Maps a raw response to a [ResponseCode]. Every input maps to a defined code.
pub fn classify(response: &[u8]) -> ResponseCode {
    if SUCCESS_SUFFIXES.iter().any(|suffix| response.ends_with(suffix)) {
        return ResponseCode::Success;
    }

    if !response.ends_with(ERROR_SUFFIX) {
        return ResponseCode::Unknown;
    }

    let prefix = &response[..response.len() - ERROR_SUFFIX.len()];
    match prefix.last() {
        Some(digit) if digit.is_ascii_digit() => ResponseCode::from_failure_code(digit - b'0'),
        _ => ResponseCode::Unknown,
    }
}

/// Extracts the station address of a CIFSR response
///
/// The first line holds the soft-AP address, the second one the station address. Both plain
/// (`10.0.0.181`) and tagged (`+CIFSR:STAIP,"10.0.0.181"`) lines are supported.
pub(crate) fn parse_station_address(response: &[u8]) -> Option<String<ADDRESS_SIZE>> {
    let text = core::str::from_utf8(response).ok()?;
    let line = text.split("\r\n").map(str::trim).filter(|line| !line.is_empty()).nth(1)?;

    let address = match line.split_once('"') {
        Some((_, quoted)) => quoted.split('"').next()?,
        None => line,
    };

    if address.is_empty() || address == "OK" {
        return None;
    }

    String::try_from(address).ok()
}
