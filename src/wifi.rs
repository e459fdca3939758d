//! # WIFI access point client
//!
//! Joining a network and obtaining the assigned station address is supported.
//!
//! The adapter walks through the states [SessionState::Idle] -> [SessionState::Joining] ->
//! [SessionState::Joined] -> [SessionState::Serving]. Operations called in the wrong state are
//! rejected without touching the serial transport.
//!
//! ## Example
//!
//! ````
//! # use esp_at_server::example::{ExampleSerial, ExampleTimer};
//! # use esp_at_server::wifi::{Adapter, SessionState, WifiAdapter};
//! #
//! let mut adapter: Adapter<_, _, 1_000_000, 256> = Adapter::new(ExampleSerial::default(), ExampleTimer::default());
//!
//! // Joining the WIFI access point, address gets fetched on success
//! adapter.join("test_wifi", "secret").unwrap();
//!
//! assert_eq!(SessionState::Joined, adapter.get_session_state());
//! assert_eq!(Some("10.0.0.181"), adapter.get_acquired_address());
//! ````
use crate::commands::{AccessPointConnectCommand, AtCommand, CommandErrorHandler, ObtainLocalAddressCommand, WifiModeCommand};
use crate::fmt::printable;
use crate::responses::{classify, parse_station_address, ResponseCode, ADDRESS_SIZE};
use crate::transaction::{discard_response, Error as TransactionError, Response, Terminator, Transceiver};
use core::fmt::Debug;
use core::net::Ipv4Addr;
use core::str::FromStr;
use embedded_io::{Read, ReadReady, Write};
use fugit::TimerDurationU32;
use fugit_timer::Timer;
use heapless::String;

/// Wifi network adapter trait
pub trait WifiAdapter {
    /// Error when joining a WIFI network
    type JoinError: Debug;

    /// Error when receiving local address information
    type AddressError: Debug;

    /// Joins the given access point. Returns Ok only if the module confirmed the connection.
    fn join(&mut self, ssid: &str, password: &str) -> Result<(), Self::JoinError>;

    /// Returns the current session state
    fn get_session_state(&self) -> SessionState;

    /// Queries the station address assigned by the access point
    fn get_address(&mut self) -> Result<String<ADDRESS_SIZE>, Self::AddressError>;
}

/// Lifecycle of a session
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Not joined to any network
    Idle,

    /// Join command is in flight
    Joining,

    /// Joined to the network, TCP server not started yet
    Joined,

    /// TCP server is running and accepting a client
    Serving,
}

/// Transaction timeouts in milliseconds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// Regular commands
    pub command_ms: u32,

    /// Joining an access point
    pub join_ms: u32,

    /// Waiting for a complete data indication once the first byte arrived
    pub receive_ms: u32,

    /// Waiting for the transmission confirmation
    pub send_ms: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            command_ms: 1_000,
            join_ms: 12_000,
            receive_ms: 1_500,
            send_ms: 1_500,
        }
    }
}

/// Possible errors when joining an access point
#[derive(Clone, Debug, PartialEq)]
pub enum JoinError {
    /// Error while setting WIFI mode to station
    ModeError(TransactionError),

    /// Error while sending WIFI credentials
    ConnectError(TransactionError),

    /// Module responded with a failure, e.g. [ResponseCode::WrongPassword]
    Rejected(ResponseCode),

    /// Given SSD is longer then the max. size of 32 bytes
    InvalidSSDLength,

    /// Given password is longer then the max. size of 64 bytes
    InvalidPasswordLength,

    /// Joining is just possible when idle
    InvalidState(SessionState),

    /// Command line exceeded the command buffer
    EncodingFailed,
}

/// Errors when receiving local address information
#[derive(Clone, Debug, PartialEq)]
pub enum AddressError {
    /// CIFSR command failed
    CommandError(TransactionError),

    /// CIFSR command was not confirmed by OK
    Rejected(ResponseCode),

    /// No station address found in response
    AddressParseError,

    /// Address is just available once joined
    InvalidState(SessionState),

    /// Command line exceeded the command buffer
    EncodingFailed,
}

/// Session state shared by the blocking and async adapter
#[derive(Clone, Debug)]
pub(crate) struct Session {
    pub(crate) state: SessionState,

    /// Station address, set once after a successful join
    pub(crate) address: Option<String<ADDRESS_SIZE>>,

    pub(crate) timeouts: Timeouts,

    /// Idle timeout of client connections in seconds
    pub(crate) client_timeout_s: u16,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            address: None,
            timeouts: Timeouts::default(),
            client_timeout_s: 10,
        }
    }
}

impl Session {
    /// Enters joining state and drops any previous address
    pub(crate) fn begin_join(&mut self) -> Result<(), JoinError> {
        if self.state != SessionState::Idle {
            return Err(JoinError::InvalidState(self.state));
        }

        self.address = None;
        self.state = SessionState::Joining;
        Ok(())
    }

    /// Classifies the join response and updates the state accordingly
    pub(crate) fn finish_join<const N: usize>(&mut self, result: Result<Response<N>, JoinError>) -> Result<(), JoinError> {
        let code = match result {
            Ok(response) => classify(&response),
            Err(error) => {
                self.state = SessionState::Idle;
                return Err(error);
            }
        };

        if !code.is_success() {
            warn!("Joining access point failed: {:?}", code);
            self.state = SessionState::Idle;
            return Err(JoinError::Rejected(code));
        }

        self.state = SessionState::Joined;
        Ok(())
    }

    /// Stores the station address of the given CIFSR response
    pub(crate) fn store_address(&mut self, response: &[u8]) -> Result<String<ADDRESS_SIZE>, AddressError> {
        let code = classify(response);
        if !code.is_success() {
            return Err(AddressError::Rejected(code));
        }

        let address = parse_station_address(response).ok_or(AddressError::AddressParseError)?;
        debug!("Acquired station address {}", address.as_str());
        self.address = Some(address.clone());
        Ok(address)
    }

    pub(crate) fn assert_joined(&self) -> Result<(), SessionState> {
        match self.state {
            SessionState::Joined | SessionState::Serving => Ok(()),
            state => Err(state),
        }
    }

    pub(crate) fn assert_serving(&self) -> Result<(), SessionState> {
        match self.state {
            SessionState::Serving => Ok(()),
            state => Err(state),
        }
    }

    pub(crate) fn acquired_ipv4(&self) -> Option<Ipv4Addr> {
        Ipv4Addr::from_str(self.address.as_ref()?.as_str()).ok()
    }
}

/// Central client for the single client TCP server
///
/// TIMER_HZ: Frequency of the timer used for timeout measurement
///
/// RX_SIZE: Capacity in bytes of a single response. Limits also the size of inbound frames.
pub struct Adapter<S, T, const TIMER_HZ: u32, const RX_SIZE: usize>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    /// AT transaction engine
    pub(crate) transceiver: Transceiver<S, T, TIMER_HZ, RX_SIZE>,

    /// Network state
    pub(crate) session: Session,
}

impl<S, T, const TIMER_HZ: u32, const RX_SIZE: usize> WifiAdapter for Adapter<S, T, TIMER_HZ, RX_SIZE>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    type JoinError = JoinError;
    type AddressError = AddressError;

    /// Joins the given access point and fetches the assigned station address on success
    ///
    /// Note: The address stays empty if CIFSR fails after a successful join. It may be queried
    /// again using `get_address()`.
    fn join(&mut self, ssid: &str, password: &str) -> Result<(), JoinError> {
        self.session.begin_join()?;

        let response = self.connect_access_point(ssid, password);
        self.session.finish_join(response)?;

        if let Err(error) = self.get_address() {
            warn!("Joined, but station address is unknown: {:?}", error);
        }

        Ok(())
    }

    fn get_session_state(&self) -> SessionState {
        self.session.state
    }

    fn get_address(&mut self) -> Result<String<ADDRESS_SIZE>, AddressError> {
        self.session.assert_joined().map_err(AddressError::InvalidState)?;

        let timeout = self.session.timeouts.command_ms;
        let response = self.send_command(ObtainLocalAddressCommand, timeout, Terminator::Default)?;
        self.session.store_address(&response)
    }
}

impl<S, T, const TIMER_HZ: u32, const RX_SIZE: usize> Adapter<S, T, TIMER_HZ, RX_SIZE>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    /// Creates a new adapter. No data is sent until the first operation is called.
    pub fn new(serial: S, timer: T) -> Self {
        Self {
            transceiver: Transceiver::new(serial, timer),
            session: Session::default(),
        }
    }

    /// Address assigned by the access point, None until joined
    pub fn get_acquired_address(&self) -> Option<&str> {
        self.session.address.as_ref().map(|address| address.as_str())
    }

    /// Assigned address parsed as IPv4 address
    pub fn get_acquired_ipv4(&self) -> Option<Ipv4Addr> {
        self.session.acquired_ipv4()
    }

    /// Sets station mode and sends the credentials. Returns the raw join response.
    fn connect_access_point(&mut self, ssid: &str, password: &str) -> Result<Response<RX_SIZE>, JoinError> {
        let command = AccessPointConnectCommand::new(ssid, password)?;

        let timeout = self.session.timeouts.command_ms;
        self.send_command_discarding(WifiModeCommand::station_mode(), timeout, Terminator::Default)?;

        let timeout = self.session.timeouts.join_ms;
        self.send_command(command, timeout, Terminator::Default)
    }

    /// Sends a command and maps the error if the transaction failed
    pub(crate) fn send_command<Cmd: AtCommand + CommandErrorHandler>(
        &mut self,
        command: Cmd,
        timeout_ms: u32,
        terminator: Terminator,
    ) -> Result<Response<RX_SIZE>, Cmd::Error> {
        let line = command.encode().map_err(|_| Cmd::ENCODING_ERROR)?;
        self.transceiver
            .execute(line.as_bytes(), TimerDurationU32::millis(timeout_ms), terminator)
            .map_err(|error| command.command_error(error))
    }

    /// Sends a command and ignores the response. Just transport errors are returned.
    pub(crate) fn send_command_discarding<Cmd: AtCommand + CommandErrorHandler>(
        &mut self,
        command: Cmd,
        timeout_ms: u32,
        terminator: Terminator,
    ) -> Result<(), Cmd::Error> {
        let line = command.encode().map_err(|_| Cmd::ENCODING_ERROR)?;
        let result = self
            .transceiver
            .execute(line.as_bytes(), TimerDurationU32::millis(timeout_ms), terminator);

        if let Ok(response) = &result {
            trace!("Discarding response {}", printable(response));
        }

        discard_response(result).map_err(|error| command.command_error(error))
    }

    /// Replaces all transaction timeouts
    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.session.timeouts = timeouts;
    }

    /// Sets the timeout for regular commands in ms
    pub fn set_command_timeout_ms(&mut self, timeout: u32) {
        self.session.timeouts.command_ms = timeout;
    }

    /// Sets the timeout for joining an access point in ms
    pub fn set_join_timeout_ms(&mut self, timeout: u32) {
        self.session.timeouts.join_ms = timeout;
    }

    /// Sets the timeout for receiving a single data indication in ms
    pub fn set_receive_timeout_ms(&mut self, timeout: u32) {
        self.session.timeouts.receive_ms = timeout;
    }

    /// Sets the timeout for the transmission confirmation in ms
    pub fn set_send_timeout_ms(&mut self, timeout: u32) {
        self.session.timeouts.send_ms = timeout;
    }

    /// Sets the client idle timeout in seconds, applied by `start_server()`
    pub fn set_client_timeout_s(&mut self, timeout: u16) {
        self.session.client_timeout_s = timeout;
    }

    /// Current transaction timeouts
    pub fn get_timeouts(&self) -> Timeouts {
        self.session.timeouts
    }

    /// Returns the serial transport and the timer
    pub fn release(self) -> (S, T) {
        self.transceiver.release()
    }
}
