//! # AT transaction engine
//!
//! A transaction writes a single command line and afterwards accumulates the modem output byte per
//! byte, until either a known terminator suffix was received or the timeout is reached.
//!
//! The engine never peeks: every byte read is consumed, so output received before a timeout is lost.
use crate::fmt::printable;
use embedded_io::{Error as IoError, ErrorKind, Read, ReadReady, Write};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::Vec;

/// Line terminator appended to every command
pub(crate) const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Suffixes ending a regular command response
pub const DEFAULT_TERMINATORS: [&[u8]; 5] = [b"OK\r\n", b"SEND OK\r\n", b"no change\r\n", b"ready\r\n", b"ERROR\r\n"];

/// Raw accumulated modem output of a single transaction
pub type Response<const RX_SIZE: usize> = Vec<u8, RX_SIZE>;

/// Errors of a single transaction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// No terminator was received within the given timeout
    TransportTimeout,

    /// Response did not fit into the receive buffer before a terminator was received
    ResponseOverflow,

    /// Underlying serial transport failed
    Transport(ErrorKind),
}

impl IoError for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::TransportTimeout => ErrorKind::TimedOut,
            Error::ResponseOverflow => ErrorKind::OutOfMemory,
            Error::Transport(kind) => *kind,
        }
    }
}

/// Defines which suffix ends a transaction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Terminator<'a> {
    /// Any of [DEFAULT_TERMINATORS]
    Default,

    /// Just the given literal suffix
    Exact(&'a [u8]),
}

impl Terminator<'_> {
    /// Returns true if the given response ends with the terminator
    pub fn matches(&self, response: &[u8]) -> bool {
        match self {
            Terminator::Default => DEFAULT_TERMINATORS.iter().any(|suffix| response.ends_with(suffix)),
            Terminator::Exact(suffix) => response.ends_with(suffix),
        }
    }
}

/// Number of trailing bytes checked for the terminator once the response buffer is full
const OVERFLOW_WINDOW: usize = 16;

/// Collects the bytes of a single transaction
///
/// Once the buffer is full, further bytes are dropped but still checked for the terminator, so the
/// remainder of an oversized response does not leak into the next transaction.
pub(crate) struct Accumulator<'a, const RX_SIZE: usize> {
    buffer: Response<RX_SIZE>,

    /// Tail of the dropped bytes, None until the buffer overflowed
    overflow: Option<Vec<u8, OVERFLOW_WINDOW>>,

    terminator: Terminator<'a>,
}

impl<'a, const RX_SIZE: usize> Accumulator<'a, RX_SIZE> {
    pub(crate) fn new(terminator: Terminator<'a>) -> Self {
        Self {
            buffer: Vec::new(),
            overflow: None,
            terminator,
        }
    }

    /// Appends a byte. Returns true as soon as the terminator was received.
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        if let Some(window) = &mut self.overflow {
            push_window(window, byte);
            return self.terminator.matches(window);
        }

        if self.buffer.push(byte).is_ok() {
            return self.terminator.matches(&self.buffer);
        }

        // Terminator may span the end of the buffer
        let tail_start = self.buffer.len().saturating_sub(OVERFLOW_WINDOW - 1);
        let mut window = Vec::new();
        let _ = window.extend_from_slice(&self.buffer[tail_start..]);
        push_window(&mut window, byte);

        let matched = self.terminator.matches(&window);
        self.overflow = Some(window);
        matched
    }

    /// Error once the deadline is reached without a terminator
    pub(crate) fn timeout_error(&self) -> Error {
        match self.overflow {
            Some(_) => Error::ResponseOverflow,
            None => Error::TransportTimeout,
        }
    }

    /// Returns the response, or [Error::ResponseOverflow] if bytes were dropped
    pub(crate) fn finish(self) -> Result<Response<RX_SIZE>, Error> {
        match self.overflow {
            Some(_) => Err(Error::ResponseOverflow),
            None => Ok(self.buffer),
        }
    }
}

fn push_window(window: &mut Vec<u8, OVERFLOW_WINDOW>, byte: u8) {
    if window.is_full() {
        window.copy_within(1.., 0);
        window.truncate(OVERFLOW_WINDOW - 1);
    }
    let _ = window.push(byte);
}

/// Point in time at which a transaction is given up
pub(crate) struct Deadline<const TIMER_HZ: u32> {
    start: TimerInstantU32<TIMER_HZ>,
    timeout: TimerDurationU32<TIMER_HZ>,
}

impl<const TIMER_HZ: u32> Deadline<TIMER_HZ> {
    pub(crate) fn new(start: TimerInstantU32<TIMER_HZ>, timeout: TimerDurationU32<TIMER_HZ>) -> Self {
        Self { start, timeout }
    }

    /// True if at least the timeout has elapsed since start
    pub(crate) fn is_reached(&self, now: TimerInstantU32<TIMER_HZ>) -> bool {
        let elapsed = now
            .checked_duration_since(self.start)
            .unwrap_or(TimerDurationU32::from_ticks(0));

        elapsed >= self.timeout
    }
}

/// Blocking AT transaction engine
///
/// Owns the serial transport and the timer used for measuring elapsed time.
pub struct Transceiver<S, T, const TIMER_HZ: u32, const RX_SIZE: usize>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    /// Serial transport
    pub(crate) serial: S,

    /// Clock source
    pub(crate) timer: T,
}

impl<S, T, const TIMER_HZ: u32, const RX_SIZE: usize> Transceiver<S, T, TIMER_HZ, RX_SIZE>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    pub fn new(serial: S, timer: T) -> Self {
        Self { serial, timer }
    }

    /// Sends the command line and waits for the response
    pub fn execute(
        &mut self,
        command: &[u8],
        timeout: TimerDurationU32<TIMER_HZ>,
        terminator: Terminator,
    ) -> Result<Response<RX_SIZE>, Error> {
        debug!("[AT] >> {}", printable(command));
        self.write_line(command)?;

        let response = self.consume(timeout, terminator);
        match &response {
            Ok(data) => trace!("[AT] << {}", printable(data)),
            Err(error) => debug!("[AT] {} failed: {:?}", printable(command), error),
        }

        response
    }

    /// Writes the given command followed by CRLF
    pub fn write_line(&mut self, command: &[u8]) -> Result<(), Error> {
        self.serial.write_all(command).map_err(transport_error)?;
        self.serial.write_all(LINE_TERMINATOR).map_err(transport_error)?;
        self.serial.flush().map_err(transport_error)
    }

    /// Writes the given data as is
    pub fn write_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        self.serial.write_all(data).map_err(transport_error)?;
        self.serial.flush().map_err(transport_error)
    }

    /// Accumulates received bytes until the terminator matches or the timeout is reached
    ///
    /// An oversized response is read up to its terminator and dropped as [Error::ResponseOverflow].
    pub fn consume(
        &mut self,
        timeout: TimerDurationU32<TIMER_HZ>,
        terminator: Terminator,
    ) -> Result<Response<RX_SIZE>, Error> {
        let deadline = Deadline::new(self.timer.now(), timeout);
        let mut accumulator: Accumulator<RX_SIZE> = Accumulator::new(terminator);

        loop {
            if let Some(byte) = self.read_byte()? {
                if accumulator.push(byte) {
                    return accumulator.finish();
                }
            }

            if deadline.is_reached(self.timer.now()) {
                return Err(accumulator.timeout_error());
            }
        }
    }

    /// True if at least one byte is waiting to be read
    pub fn data_available(&mut self) -> Result<bool, Error> {
        self.serial.read_ready().map_err(transport_error)
    }

    /// Reads a single byte, if one is available
    fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        if !self.data_available()? {
            return Ok(None);
        }

        let mut buffer = [0x0; 1];
        match self.serial.read(&mut buffer).map_err(transport_error)? {
            0 => Ok(None),
            _ => Ok(Some(buffer[0])),
        }
    }

    /// Returns the serial transport and the timer
    pub fn release(self) -> (S, T) {
        (self.serial, self.timer)
    }
}

/// Maps an error of the serial transport
pub(crate) fn transport_error<E: IoError>(error: E) -> Error {
    Error::Transport(error.kind())
}

/// Drops the result of a fire-and-forget transaction. Just transport errors are kept.
pub(crate) fn discard_response<const RX_SIZE: usize>(result: Result<Response<RX_SIZE>, Error>) -> Result<(), Error> {
    match result {
        Ok(_) => Ok(()),
        Err(Error::Transport(kind)) => Err(Error::Transport(kind)),
        Err(error) => {
            debug!("Ignoring failed transaction: {:?}", error);
            Ok(())
        }
    }
}
