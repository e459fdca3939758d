//! # Single client TCP server
//!
//! Once joined, the module listens on port 333 for a single client. Data written by the client is
//! polled as [InboundFrame], the answer is sent by `send_response()` which closes the link afterwards.
//!
//! ## Example
//!
//! ````
//! # use esp_at_server::example::{ExampleSerial, ExampleTimer};
//! # use esp_at_server::server::ServerAdapter;
//! # use esp_at_server::wifi::{Adapter, WifiAdapter};
//! #
//! let mut adapter: Adapter<_, _, 1_000_000, 256> = Adapter::new(ExampleSerial::default(), ExampleTimer::default());
//! adapter.join("test_wifi", "secret").unwrap();
//!
//! // Listening for a client
//! adapter.start_server().unwrap();
//!
//! // Polling for a request
//! let request = adapter.poll_incoming().unwrap();
//! assert_eq!(b"Hello world", request.as_slice());
//!
//! // Answering, link to the client gets closed
//! adapter.send_response(b"nice to see you!").unwrap();
//! ````
use crate::commands::{CloseLinkCommand, ProbeCommand, ServerTimeoutCommand, StartServerCommand, TransmissionPrepareCommand};
use crate::fmt::printable;
use crate::responses::{classify, ResponseCode};
use crate::transaction::{Error as TransactionError, Terminator};
use crate::urc::{decode_frame, InboundFrame, DATA_TERMINATOR};
use crate::wifi::{Adapter, SessionState};
use core::fmt::Debug;
use embedded_io::{Read, ReadReady, Write};
use fugit::TimerDurationU32;
use fugit_timer::Timer;

/// Port used by ESP-AT when starting a server without explicit port
pub const DEFAULT_SERVER_PORT: u16 = 333;

/// Max. byte count of a single CIPSEND transmission
pub const MAX_SEND_LENGTH: usize = 2048;

/// Prompt signaling that the module is ready to receive the payload
pub(crate) const SEND_PROMPT: &[u8] = b"> ";

/// Single client TCP server trait
pub trait ServerAdapter {
    /// Error of server operations
    type Error: Debug;

    /// Request received from the client
    type Frame;

    /// Starts listening for a client
    fn start_server(&mut self) -> Result<(), Self::Error>;

    /// Returns a pending request, None if there is none or it could not be received completely
    fn poll_incoming(&mut self) -> Option<Self::Frame>;

    /// Sends the response to the connected client and closes the link on success
    fn send_response(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Closes the link to the connected client
    fn unlink_client(&mut self) -> Result<(), Self::Error>;
}

/// Server related errors
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Error while sending the AT startup command
    ProbeFailed(TransactionError),

    /// Error while sending CIPSERVER command
    StartServerFailed(TransactionError),

    /// Error while sending CIPSTO command
    ServerTimeoutFailed(TransactionError),

    /// Preparing the transmission failed (CIPSEND command)
    TransmissionStartFailed(TransactionError),

    /// Transmission of the payload failed or was not confirmed in time
    SendFailed(TransactionError),

    /// Transmission was not confirmed by SEND OK. Link is left open.
    Rejected(ResponseCode),

    /// Error while sending CIPCLOSE command
    CloseError(TransactionError),

    /// Frame is empty or exceeds [MAX_SEND_LENGTH]
    InvalidFrameLength,

    /// Operation is not possible in the current session state
    InvalidState(SessionState),

    /// Command line exceeded the command buffer
    EncodingFailed,
}

/// Checks if the frame fits into a single transmission
pub(crate) fn assert_frame_length(frame: &[u8]) -> Result<(), Error> {
    if frame.is_empty() || frame.len() > MAX_SEND_LENGTH {
        return Err(Error::InvalidFrameLength);
    }

    Ok(())
}

/// Classifies the transmission confirmation
pub(crate) fn assert_send_confirmed(response: &[u8]) -> Result<(), Error> {
    let code = classify(response);
    if !code.is_success() {
        warn!("Transmission not confirmed: {:?}", code);
        return Err(Error::Rejected(code));
    }

    Ok(())
}

impl<S, T, const TIMER_HZ: u32, const RX_SIZE: usize> ServerAdapter for Adapter<S, T, TIMER_HZ, RX_SIZE>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    type Error = Error;
    type Frame = InboundFrame<RX_SIZE>;

    fn start_server(&mut self) -> Result<(), Error> {
        if self.session.state != SessionState::Joined {
            return Err(Error::InvalidState(self.session.state));
        }

        let timeout = self.session.timeouts.command_ms;
        self.send_command_discarding(StartServerCommand, timeout, Terminator::Default)?;

        let command = ServerTimeoutCommand::new(self.session.client_timeout_s);
        self.send_command_discarding(command, timeout, Terminator::Default)?;

        self.session.state = SessionState::Serving;
        Ok(())
    }

    /// Returns None without consuming any byte, if no data is waiting
    fn poll_incoming(&mut self) -> Option<InboundFrame<RX_SIZE>> {
        self.session.assert_serving().ok()?;

        match self.transceiver.data_available() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(error) => {
                warn!("Checking for incoming data failed: {:?}", error);
                return None;
            }
        }

        let timeout = TimerDurationU32::millis(self.session.timeouts.receive_ms);
        let response = match self.transceiver.consume(timeout, Terminator::Exact(DATA_TERMINATOR)) {
            Ok(response) => response,
            Err(error) => {
                debug!("Incomplete data indication dropped: {:?}", error);
                return None;
            }
        };

        match decode_frame(&response) {
            Ok(frame) => Some(frame),
            Err(error) => {
                debug!("Malformed data indication {} dropped: {:?}", printable(&response), error);
                None
            }
        }
    }

    /// Failed transmissions are neither retried nor is the link closed
    fn send_response(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.session.assert_serving().map_err(Error::InvalidState)?;
        assert_frame_length(frame)?;

        let timeout = self.session.timeouts.command_ms;
        let command = TransmissionPrepareCommand::new(frame.len());
        self.send_command_discarding(command, timeout, Terminator::Exact(SEND_PROMPT))?;

        self.transceiver.write_raw(frame).map_err(Error::SendFailed)?;
        let timeout = TimerDurationU32::millis(self.session.timeouts.send_ms);
        let response = self
            .transceiver
            .consume(timeout, Terminator::Default)
            .map_err(Error::SendFailed)?;

        assert_send_confirmed(&response)?;
        self.unlink_client()
    }

    fn unlink_client(&mut self) -> Result<(), Error> {
        let timeout = self.session.timeouts.command_ms;
        self.send_command_discarding(CloseLinkCommand, timeout, Terminator::Default)
    }
}

impl<S, T, const TIMER_HZ: u32, const RX_SIZE: usize> Adapter<S, T, TIMER_HZ, RX_SIZE>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    /// Sends the `AT` startup command. The answer is ignored.
    pub fn probe(&mut self) -> Result<(), Error> {
        let timeout = self.session.timeouts.command_ms;
        self.send_command_discarding(ProbeCommand, timeout, Terminator::Default)
    }
}
