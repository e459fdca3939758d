use crate::server::Error as ServerError;
use crate::transaction::Error as TransactionError;
use crate::wifi::{AddressError, JoinError};
use heapless::String;
use numtoa::NumToA;

/// Max. length of an encoded command line
pub(crate) const COMMAND_SIZE: usize = 256;

/// Encoded command line, without CRLF
pub(crate) type CommandLine = String<COMMAND_SIZE>;

/// Command line exceeded [COMMAND_SIZE]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct CapacityError;

/// Encoding of a single AT command
pub(crate) trait AtCommand {
    /// Returns the command line without line terminator
    fn encode(&self) -> Result<CommandLine, CapacityError>;
}

/// Trait for mapping command errors
pub(crate) trait CommandErrorHandler {
    type Error;

    /// Maps a command line exceeding the command buffer
    const ENCODING_ERROR: Self::Error;

    /// Maps regular errors
    fn command_error(&self, error: TransactionError) -> Self::Error;
}

fn push(line: &mut CommandLine, value: &str) -> Result<(), CapacityError> {
    line.push_str(value).map_err(|_| CapacityError)
}

/// Pushes a double quoted argument. `"`, `,` and `\` get escaped by a backslash.
fn push_quoted(line: &mut CommandLine, value: &str) -> Result<(), CapacityError> {
    push(line, "\"")?;
    for character in value.chars() {
        if matches!(character, '"' | ',' | '\\') {
            line.push('\\').map_err(|_| CapacityError)?;
        }
        line.push(character).map_err(|_| CapacityError)?;
    }
    push(line, "\"")
}

fn literal(command: &str) -> Result<CommandLine, CapacityError> {
    let mut line = CommandLine::new();
    push(&mut line, command)?;
    Ok(line)
}

/// Plain `AT`, used as startup handshake
#[derive(Clone, Default)]
pub(crate) struct ProbeCommand;

impl AtCommand for ProbeCommand {
    fn encode(&self) -> Result<CommandLine, CapacityError> {
        literal("AT")
    }
}

impl CommandErrorHandler for ProbeCommand {
    type Error = ServerError;
    const ENCODING_ERROR: Self::Error = ServerError::EncodingFailed;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        ServerError::ProbeFailed(error)
    }
}

/// Sets the current WIFI mode, not stored in flash
#[derive(Clone)]
pub(crate) struct WifiModeCommand {
    /// WIFI mode:
    ///     1: Station mode.
    ///     2: SoftAP mode.
    ///     3: SoftAP+Station mode.
    mode: u8,
}

impl WifiModeCommand {
    pub fn station_mode() -> Self {
        Self { mode: 1 }
    }
}

impl AtCommand for WifiModeCommand {
    fn encode(&self) -> Result<CommandLine, CapacityError> {
        let mut line = literal("AT+CWMODE_CUR=")?;
        let mut buffer = [0x0; 4];
        push(&mut line, self.mode.numtoa_str(10, &mut buffer))?;
        Ok(line)
    }
}

impl CommandErrorHandler for WifiModeCommand {
    type Error = JoinError;
    const ENCODING_ERROR: Self::Error = JoinError::EncodingFailed;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        JoinError::ModeError(error)
    }
}

/// Connects to the given access point, not stored in flash
#[derive(Clone)]
pub(crate) struct AccessPointConnectCommand {
    /// The SSID of the target access point
    ssid: String<32>,

    /// The password/key of the target access point
    password: String<64>,
}

impl AccessPointConnectCommand {
    pub fn new(ssid: &str, password: &str) -> Result<Self, JoinError> {
        Ok(Self {
            ssid: String::try_from(ssid).map_err(|_| JoinError::InvalidSSDLength)?,
            password: String::try_from(password).map_err(|_| JoinError::InvalidPasswordLength)?,
        })
    }
}

impl AtCommand for AccessPointConnectCommand {
    fn encode(&self) -> Result<CommandLine, CapacityError> {
        let mut line = literal("AT+CWJAP_CUR=")?;
        push_quoted(&mut line, &self.ssid)?;
        push(&mut line, ",")?;
        push_quoted(&mut line, &self.password)?;
        Ok(line)
    }
}

impl CommandErrorHandler for AccessPointConnectCommand {
    type Error = JoinError;
    const ENCODING_ERROR: Self::Error = JoinError::EncodingFailed;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        JoinError::ConnectError(error)
    }
}

/// Queries the local soft-AP and station addresses
#[derive(Clone, Default)]
pub(crate) struct ObtainLocalAddressCommand;

impl AtCommand for ObtainLocalAddressCommand {
    fn encode(&self) -> Result<CommandLine, CapacityError> {
        literal("AT+CIFSR")
    }
}

impl CommandErrorHandler for ObtainLocalAddressCommand {
    type Error = AddressError;
    const ENCODING_ERROR: Self::Error = AddressError::EncodingFailed;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        AddressError::CommandError(error)
    }
}

/// Creates a TCP server on the default port (333)
#[derive(Clone, Default)]
pub(crate) struct StartServerCommand;

impl AtCommand for StartServerCommand {
    fn encode(&self) -> Result<CommandLine, CapacityError> {
        literal("AT+CIPSERVER=1")
    }
}

impl CommandErrorHandler for StartServerCommand {
    type Error = ServerError;
    const ENCODING_ERROR: Self::Error = ServerError::EncodingFailed;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        ServerError::StartServerFailed(error)
    }
}

/// Sets the idle timeout of client connections
#[derive(Clone)]
pub(crate) struct ServerTimeoutCommand {
    /// Timeout in seconds, 0..=7200
    seconds: u16,
}

impl ServerTimeoutCommand {
    pub fn new(seconds: u16) -> Self {
        Self { seconds }
    }
}

impl AtCommand for ServerTimeoutCommand {
    fn encode(&self) -> Result<CommandLine, CapacityError> {
        let mut line = literal("AT+CIPSTO=")?;
        let mut buffer = [0x0; 6];
        push(&mut line, self.seconds.numtoa_str(10, &mut buffer))?;
        Ok(line)
    }
}

impl CommandErrorHandler for ServerTimeoutCommand {
    type Error = ServerError;
    const ENCODING_ERROR: Self::Error = ServerError::EncodingFailed;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        ServerError::ServerTimeoutFailed(error)
    }
}

/// Announces the byte count of the following transmission
#[derive(Clone)]
pub(crate) struct TransmissionPrepareCommand {
    length: usize,
}

impl TransmissionPrepareCommand {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl AtCommand for TransmissionPrepareCommand {
    fn encode(&self) -> Result<CommandLine, CapacityError> {
        let mut line = literal("AT+CIPSEND=")?;
        let mut buffer = [0x0; 20];
        push(&mut line, self.length.numtoa_str(10, &mut buffer))?;
        Ok(line)
    }
}

impl CommandErrorHandler for TransmissionPrepareCommand {
    type Error = ServerError;
    const ENCODING_ERROR: Self::Error = ServerError::EncodingFailed;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        ServerError::TransmissionStartFailed(error)
    }
}

/// Closes the link to the current client
#[derive(Clone, Default)]
pub(crate) struct CloseLinkCommand;

impl AtCommand for CloseLinkCommand {
    fn encode(&self) -> Result<CommandLine, CapacityError> {
        literal("AT+CIPCLOSE;")
    }
}

impl CommandErrorHandler for CloseLinkCommand {
    type Error = ServerError;
    const ENCODING_ERROR: Self::Error = ServerError::EncodingFailed;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        ServerError::CloseError(error)
    }
}
