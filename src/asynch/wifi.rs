use crate::asynch::transaction::Transceiver;
use crate::commands::{
    AccessPointConnectCommand, AtCommand, CloseLinkCommand, CommandErrorHandler, ObtainLocalAddressCommand,
    ProbeCommand, ServerTimeoutCommand, StartServerCommand, TransmissionPrepareCommand, WifiModeCommand,
};
use crate::fmt::printable;
use crate::responses::ADDRESS_SIZE;
use crate::server::{assert_frame_length, assert_send_confirmed, Error, SEND_PROMPT};
use crate::transaction::{discard_response, Response, Terminator};
use crate::urc::{decode_frame, InboundFrame, DATA_TERMINATOR};
use crate::wifi::{AddressError, JoinError, Session, SessionState, Timeouts};
use core::net::Ipv4Addr;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use fugit::TimerDurationU32;
use fugit_timer::Timer;
use heapless::String;

/// Async client for the single client TCP server
///
/// Offers the same operations as the blocking [Adapter](crate::wifi::Adapter). Waiting for modem
/// output yields to the executor, so other tasks keep running during a transaction.
pub struct Adapter<S, T, const TIMER_HZ: u32, const RX_SIZE: usize>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    pub(crate) transceiver: Transceiver<S, T, TIMER_HZ, RX_SIZE>,
    pub(crate) session: Session,
}

impl<S, T, const TIMER_HZ: u32, const RX_SIZE: usize> Adapter<S, T, TIMER_HZ, RX_SIZE>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    pub fn new(serial: S, timer: T) -> Self {
        Self {
            transceiver: Transceiver::new(serial, timer),
            session: Session::default(),
        }
    }

    /// Joins the given access point and fetches the assigned station address on success
    pub async fn join(&mut self, ssid: &str, password: &str) -> Result<(), JoinError> {
        self.session.begin_join()?;

        let response = self.connect_access_point(ssid, password).await;
        self.session.finish_join(response)?;

        if let Err(error) = self.get_address().await {
            warn!("Joined, but station address is unknown: {:?}", error);
        }

        Ok(())
    }

    /// Queries the station address assigned by the access point
    pub async fn get_address(&mut self) -> Result<String<ADDRESS_SIZE>, AddressError> {
        self.session.assert_joined().map_err(AddressError::InvalidState)?;

        let timeout = self.session.timeouts.command_ms;
        let response = self.send_command(ObtainLocalAddressCommand, timeout, Terminator::Default).await?;
        self.session.store_address(&response)
    }

    /// Sends the `AT` startup command. The answer is ignored.
    pub async fn probe(&mut self) -> Result<(), Error> {
        let timeout = self.session.timeouts.command_ms;
        self.send_command_discarding(ProbeCommand, timeout, Terminator::Default).await
    }

    /// Starts listening for a client
    pub async fn start_server(&mut self) -> Result<(), Error> {
        if self.session.state != SessionState::Joined {
            return Err(Error::InvalidState(self.session.state));
        }

        let timeout = self.session.timeouts.command_ms;
        self.send_command_discarding(StartServerCommand, timeout, Terminator::Default).await?;

        let command = ServerTimeoutCommand::new(self.session.client_timeout_s);
        self.send_command_discarding(command, timeout, Terminator::Default).await?;

        self.session.state = SessionState::Serving;
        Ok(())
    }

    /// Returns a pending request. Returns None without consuming any byte, if no data is waiting.
    pub async fn poll_incoming(&mut self) -> Option<InboundFrame<RX_SIZE>> {
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
        let response = match self.transceiver.consume(timeout, Terminator::Exact(DATA_TERMINATOR)).await {
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

    /// Sends the response and closes the link on success. Failed transmissions are not retried.
    pub async fn send_response(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.session.assert_serving().map_err(Error::InvalidState)?;
        assert_frame_length(frame)?;

        let timeout = self.session.timeouts.command_ms;
        let command = TransmissionPrepareCommand::new(frame.len());
        self.send_command_discarding(command, timeout, Terminator::Exact(SEND_PROMPT)).await?;

        self.transceiver.write_raw(frame).await.map_err(Error::SendFailed)?;
        let timeout = TimerDurationU32::millis(self.session.timeouts.send_ms);
        let response = self
            .transceiver
            .consume(timeout, Terminator::Default)
            .await
            .map_err(Error::SendFailed)?;

        assert_send_confirmed(&response)?;
        self.unlink_client().await
    }

    /// Closes the link to the connected client
    pub async fn unlink_client(&mut self) -> Result<(), Error> {
        let timeout = self.session.timeouts.command_ms;
        self.send_command_discarding(CloseLinkCommand, timeout, Terminator::Default).await
    }

    pub fn get_session_state(&self) -> SessionState {
        self.session.state
    }

    pub fn get_acquired_address(&self) -> Option<&str> {
        self.session.address.as_ref().map(|address| address.as_str())
    }

    pub fn get_acquired_ipv4(&self) -> Option<Ipv4Addr> {
        self.session.acquired_ipv4()
    }

    /// Replaces all transaction timeouts
    pub fn set_timeouts(&mut self, timeouts: Timeouts) {
        self.session.timeouts = timeouts;
    }

    pub fn set_command_timeout_ms(&mut self, timeout: u32) {
        self.session.timeouts.command_ms = timeout;
    }

    pub fn set_join_timeout_ms(&mut self, timeout: u32) {
        self.session.timeouts.join_ms = timeout;
    }

    pub fn set_receive_timeout_ms(&mut self, timeout: u32) {
        self.session.timeouts.receive_ms = timeout;
    }

    pub fn set_send_timeout_ms(&mut self, timeout: u32) {
        self.session.timeouts.send_ms = timeout;
    }

    pub fn get_timeouts(&self) -> Timeouts {
        self.session.timeouts
    }

    /// Sets the client idle timeout in seconds, applied by `start_server()`
    pub fn set_client_timeout_s(&mut self, timeout: u16) {
        self.session.client_timeout_s = timeout;
    }

    pub fn release(self) -> (S, T) {
        self.transceiver.release()
    }

    async fn connect_access_point(&mut self, ssid: &str, password: &str) -> Result<Response<RX_SIZE>, JoinError> {
        let command = AccessPointConnectCommand::new(ssid, password)?;

        let timeout = self.session.timeouts.command_ms;
        self.send_command_discarding(WifiModeCommand::station_mode(), timeout, Terminator::Default)
            .await?;

        let timeout = self.session.timeouts.join_ms;
        self.send_command(command, timeout, Terminator::Default).await
    }

    async fn send_command<Cmd: AtCommand + CommandErrorHandler>(
        &mut self,
        command: Cmd,
        timeout_ms: u32,
        terminator: Terminator<'_>,
    ) -> Result<Response<RX_SIZE>, Cmd::Error> {
        let line = command.encode().map_err(|_| Cmd::ENCODING_ERROR)?;
        self.transceiver
            .execute(line.as_bytes(), TimerDurationU32::millis(timeout_ms), terminator)
            .await
            .map_err(|error| command.command_error(error))
    }

    async fn send_command_discarding<Cmd: AtCommand + CommandErrorHandler>(
        &mut self,
        command: Cmd,
        timeout_ms: u32,
        terminator: Terminator<'_>,
    ) -> Result<(), Cmd::Error> {
        let line = command.encode().map_err(|_| Cmd::ENCODING_ERROR)?;
        let result = self
            .transceiver
            .execute(line.as_bytes(), TimerDurationU32::millis(timeout_ms), terminator)
            .await;

        discard_response(result).map_err(|error| command.command_error(error))
    }
}
