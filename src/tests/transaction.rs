use crate::tests::mock::{MockSerial, MockTimer};
use crate::transaction::{Error, Terminator, Transceiver, DEFAULT_TERMINATORS};
use crate::urc::DATA_TERMINATOR;
use embedded_io::ErrorKind;
use fugit::TimerInstantU32;

type TransceiverType = Transceiver<MockSerial, MockTimer, 1_000_000, 256>;

fn transceiver(serial: MockSerial) -> TransceiverType {
    Transceiver::new(serial, MockTimer::ticking(1))
}

#[test]
fn test_execute_correct_command_line() {
    let mut serial = MockSerial::new();
    serial.add_ok_response();

    let mut transceiver = transceiver(serial);
    let response = transceiver
        .execute(b"AT", MockTimer::duration_ms(1_000), Terminator::Default)
        .unwrap();

    assert_eq!(b"\r\nOK\r\n", response.as_slice());
    assert_eq!(vec!["AT\r\n".to_string()], transceiver.serial.get_commands_as_strings());
}

#[test]
fn test_execute_all_default_terminators() {
    for terminator in DEFAULT_TERMINATORS {
        let mut expected = b"+CWMODE_CUR:1\r\n".to_vec();
        expected.extend_from_slice(terminator);

        let mut serial = MockSerial::new();
        serial.add_response(&expected);

        let mut transceiver = transceiver(serial);
        let response = transceiver
            .execute(b"AT+CWMODE_CUR?", MockTimer::duration_ms(1_000), Terminator::Default)
            .unwrap();

        assert_eq!(expected.as_slice(), response.as_slice());
    }
}

#[test]
fn test_execute_stops_reading_at_terminator() {
    let mut serial = MockSerial::new();
    serial.add_response(b"\r\nOK\r\n0,CONNECT\r\n");

    let mut transceiver = transceiver(serial);
    let response = transceiver
        .execute(b"AT", MockTimer::duration_ms(1_000), Terminator::Default)
        .unwrap();

    assert_eq!(b"\r\nOK\r\n", response.as_slice());
    assert_eq!(b"0,CONNECT\r\n".to_vec(), transceiver.serial.get_remaining());
    assert_eq!(6, transceiver.serial.get_read_count());
}

#[test]
fn test_execute_exact_terminator_ignores_default_terminators() {
    let mut serial = MockSerial::new();
    serial.add_response(b"\r\nOK\r\n> ");

    let mut transceiver = transceiver(serial);
    let response = transceiver
        .execute(b"AT+CIPSEND=5", MockTimer::duration_ms(1_000), Terminator::Exact(b"> "))
        .unwrap();

    assert_eq!(b"\r\nOK\r\n> ", response.as_slice());
}

#[test]
fn test_consume_data_indication() {
    let mut serial = MockSerial::new();
    serial.add_incoming(b"ready\r\n\r\n+IPD,2:ab\r\nOK\r\n+IPD");

    let mut transceiver = transceiver(serial);
    let response = transceiver
        .consume(MockTimer::duration_ms(1_500), Terminator::Exact(DATA_TERMINATOR))
        .unwrap();

    assert_eq!(b"ready\r\n\r\n+IPD,2:ab\r\nOK\r\n", response.as_slice());
    assert_eq!(b"+IPD".to_vec(), transceiver.serial.get_remaining());
}

#[test]
fn test_execute_timeout() {
    let mut timer = MockTimer::new();
    let mut ticks = 0;
    // Start + 10 polls, the last one reaching exactly 1000 ms
    timer.expect_now().times(11).returning(move || {
        let now = TimerInstantU32::from_ticks(ticks);
        ticks += 100_000;
        now
    });

    let mut serial = MockSerial::new();
    serial.add_no_response();

    let mut transceiver: TransceiverType = Transceiver::new(serial, timer);
    let error = transceiver
        .execute(b"AT", MockTimer::duration_ms(1_000), Terminator::Default)
        .unwrap_err();

    assert_eq!(Error::TransportTimeout, error);
}

#[test]
fn test_execute_timeout_timer_wraparound() {
    let mut timer = MockTimer::new();
    let mut ticks = u32::MAX - 250_000;
    // Start + 10 polls, timer overflows after the 2nd poll
    timer.expect_now().times(11).returning(move || {
        let now = TimerInstantU32::from_ticks(ticks);
        ticks = ticks.wrapping_add(100_000);
        now
    });

    let mut serial = MockSerial::new();
    serial.add_no_response();

    let mut transceiver: TransceiverType = Transceiver::new(serial, timer);
    let error = transceiver
        .execute(b"AT", MockTimer::duration_ms(1_000), Terminator::Default)
        .unwrap_err();

    assert_eq!(Error::TransportTimeout, error);
}

#[test]
fn test_execute_timeout_discards_partial_response() {
    let mut serial = MockSerial::new();
    serial.add_response(b"\r\nbusy p...\r\nO");

    let mut transceiver = transceiver(serial);
    let error = transceiver
        .execute(b"AT", MockTimer::duration_ms(100), Terminator::Default)
        .unwrap_err();

    assert_eq!(Error::TransportTimeout, error);
    assert!(transceiver.serial.get_remaining().is_empty());

    // Next transaction starts from scratch
    transceiver.serial.add_ok_response();
    let response = transceiver
        .execute(b"AT", MockTimer::duration_ms(100), Terminator::Default)
        .unwrap();
    assert_eq!(b"\r\nOK\r\n", response.as_slice());
}

#[test]
fn test_execute_response_overflow() {
    let mut serial = MockSerial::new();
    serial.add_response(b"+CIFSR:STAIP,\"10.0.0.181\"\r\n\r\nOK\r\n");

    let mut transceiver: Transceiver<MockSerial, MockTimer, 1_000_000, 8> =
        Transceiver::new(serial, MockTimer::ticking(1));
    let error = transceiver
        .execute(b"AT+CIFSR", MockTimer::duration_ms(1_000), Terminator::Default)
        .unwrap_err();

    assert_eq!(Error::ResponseOverflow, error);

    // Remainder of the oversized response is dropped as well
    assert!(transceiver.serial.get_remaining().is_empty());

    transceiver.serial.add_ok_response();
    let response = transceiver
        .execute(b"AT", MockTimer::duration_ms(1_000), Terminator::Default)
        .unwrap();
    assert_eq!(b"\r\nOK\r\n", response.as_slice());
}

#[test]
fn test_execute_response_overflow_terminator_at_buffer_end() {
    let mut serial = MockSerial::new();
    serial.add_response(b"ready\r\nOK\r\n0,CONNECT\r\n");

    let mut transceiver: Transceiver<MockSerial, MockTimer, 1_000_000, 8> =
        Transceiver::new(serial, MockTimer::ticking(1));
    let error = transceiver
        .execute(b"AT", MockTimer::duration_ms(1_000), Terminator::Exact(b"\r\nOK\r\n"))
        .unwrap_err();

    assert_eq!(Error::ResponseOverflow, error);
    assert_eq!(b"0,CONNECT\r\n".to_vec(), transceiver.serial.get_remaining());
}

#[test]
fn test_execute_response_overflow_without_terminator() {
    let mut serial = MockSerial::new();
    serial.add_response(b"+CIFSR:STAIP,\"10.0.0.181\"");

    let mut transceiver: Transceiver<MockSerial, MockTimer, 1_000_000, 8> =
        Transceiver::new(serial, MockTimer::ticking(1));
    let error = transceiver
        .execute(b"AT+CIFSR", MockTimer::duration_ms(100), Terminator::Default)
        .unwrap_err();

    assert_eq!(Error::ResponseOverflow, error);
    assert!(transceiver.serial.get_remaining().is_empty());
}

#[test]
fn test_execute_write_error() {
    let mut serial = MockSerial::new();
    serial.fail_writes(ErrorKind::BrokenPipe);

    let mut transceiver = transceiver(serial);
    let error = transceiver
        .execute(b"AT", MockTimer::duration_ms(1_000), Terminator::Default)
        .unwrap_err();

    assert_eq!(Error::Transport(ErrorKind::BrokenPipe), error);
}

#[test]
fn test_consume_read_ready_error() {
    let mut serial = MockSerial::new();
    serial.fail_read_ready(ErrorKind::Other);

    let mut transceiver = transceiver(serial);
    let error = transceiver
        .consume(MockTimer::duration_ms(1_000), Terminator::Default)
        .unwrap_err();

    assert_eq!(Error::Transport(ErrorKind::Other), error);
}

#[test]
fn test_write_raw_no_line_terminator() {
    let mut transceiver = transceiver(MockSerial::new());
    transceiver.write_raw(b"Hello world").unwrap();

    assert_eq!(vec!["Hello world".to_string()], transceiver.serial.get_commands_as_strings());
}

#[test]
fn test_data_available() {
    let mut transceiver = transceiver(MockSerial::new());
    assert!(!transceiver.data_available().unwrap());

    transceiver.serial.add_incoming(b"\r\n");
    assert!(transceiver.data_available().unwrap());
    assert_eq!(0, transceiver.serial.get_read_count());
}

#[test]
fn test_terminator_matches() {
    assert!(Terminator::Default.matches(b"\r\nSEND OK\r\n"));
    assert!(Terminator::Default.matches(b"\r\nno change\r\n"));
    assert!(!Terminator::Default.matches(b"\r\nOK\r"));
    assert!(!Terminator::Default.matches(b""));
    assert!(Terminator::Exact(b"> ").matches(b"OK\r\n> "));
    assert!(!Terminator::Exact(b"> ").matches(b"\r\nOK\r\n"));
}
