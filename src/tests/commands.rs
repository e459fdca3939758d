use crate::commands::{
    AccessPointConnectCommand, AtCommand, CloseLinkCommand, ObtainLocalAddressCommand, ProbeCommand,
    ServerTimeoutCommand, StartServerCommand, TransmissionPrepareCommand, WifiModeCommand,
};
use crate::wifi::JoinError;

fn encode<Cmd: AtCommand>(command: Cmd) -> String {
    command.encode().unwrap().as_str().to_string()
}

#[test]
fn test_plain_commands() {
    assert_eq!("AT", encode(ProbeCommand));
    assert_eq!("AT+CWMODE_CUR=1", encode(WifiModeCommand::station_mode()));
    assert_eq!("AT+CIFSR", encode(ObtainLocalAddressCommand));
    assert_eq!("AT+CIPSERVER=1", encode(StartServerCommand));
    assert_eq!("AT+CIPCLOSE;", encode(CloseLinkCommand));
}

#[test]
fn test_numeric_arguments() {
    assert_eq!("AT+CIPSTO=10", encode(ServerTimeoutCommand::new(10)));
    assert_eq!("AT+CIPSTO=7200", encode(ServerTimeoutCommand::new(7200)));
    assert_eq!("AT+CIPSEND=1", encode(TransmissionPrepareCommand::new(1)));
    assert_eq!("AT+CIPSEND=2048", encode(TransmissionPrepareCommand::new(2048)));
}

#[test]
fn test_access_point_connect_plain() {
    let command = AccessPointConnectCommand::new("test_wifi", "secret").unwrap();
    assert_eq!("AT+CWJAP_CUR=\"test_wifi\",\"secret\"", encode(command));
}

#[test]
fn test_access_point_connect_escaping() {
    let command = AccessPointConnectCommand::new("My,SSID", "p@ss\"w\\ord").unwrap();
    assert_eq!("AT+CWJAP_CUR=\"My\\,SSID\",\"p@ss\\\"w\\\\ord\"", encode(command));
}

#[test]
fn test_access_point_connect_max_length_escaped() {
    let ssid = "\"".repeat(32);
    let password = "\\".repeat(64);
    let line = encode(AccessPointConnectCommand::new(&ssid, &password).unwrap());

    assert_eq!(13 + (2 + 2 * 32) + 1 + (2 + 2 * 64), line.len());
}

#[test]
fn test_access_point_connect_invalid_length() {
    let error = AccessPointConnectCommand::new(&"a".repeat(33), "secret").err().unwrap();
    assert_eq!(JoinError::InvalidSSDLength, error);

    let error = AccessPointConnectCommand::new("test_wifi", &"a".repeat(65)).err().unwrap();
    assert_eq!(JoinError::InvalidPasswordLength, error);
}
