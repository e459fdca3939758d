//! Decoding of the `+IPD` data indication
//!
//! Data written by a connected client is forwarded by ESP-AT as `\r\n+IPD,<len>:<payload>\r\nOK\r\n`.
//! The length field is located by scanning backwards from the first colon, so the prefix may vary
//! (`+IPD,11:`, `+IPD,0,11:` or any other leading noise without a colon).
use heapless::Vec;

/// Terminator of a data indication
pub const DATA_TERMINATOR: &[u8] = b"\r\nOK\r\n";

/// Payload of a single data indication
pub type InboundFrame<const RX_SIZE: usize> = Vec<u8, RX_SIZE>;

/// Errors while decoding a data indication
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// No colon separating header and payload was found
    MissingHeader,

    /// Length field in front of the colon is missing or not a valid number
    InvalidLength,

    /// Fewer payload bytes were received than declared by the header
    Truncated,

    /// Declared payload does not fit into the frame buffer
    Overflow,
}

/// Extracts the payload of a data indication. Bytes behind the declared length are ignored.
pub fn decode_frame<const RX_SIZE: usize>(response: &[u8]) -> Result<InboundFrame<RX_SIZE>, FrameError> {
    let colon = response
        .iter()
        .position(|byte| *byte == b':')
        .ok_or(FrameError::MissingHeader)?;

    let length = parse_length(&response[..colon])?;
    let payload_start = colon + 1;
    let payload_end = payload_start.checked_add(length).ok_or(FrameError::InvalidLength)?;

    if payload_end > response.len() {
        return Err(FrameError::Truncated);
    }

    Vec::from_slice(&response[payload_start..payload_end]).map_err(|_| FrameError::Overflow)
}

/// Parses the decimal digits at the end of the given header
fn parse_length(header: &[u8]) -> Result<usize, FrameError> {
    let digit_count = header.iter().rev().take_while(|byte| byte.is_ascii_digit()).count();
    if digit_count == 0 {
        return Err(FrameError::InvalidLength);
    }

    let digits = &header[header.len() - digit_count..];
    core::str::from_utf8(digits)
        .ok()
        .and_then(|digits| digits.parse::<usize>().ok())
        .ok_or(FrameError::InvalidLength)
}
