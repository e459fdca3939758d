//! Mocks for doc examples
use core::convert::Infallible;
use embedded_io::{ErrorType, Read, ReadReady, Write};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::{Deque, Vec};

/// Serial mock, answering the commands used in doc examples
#[derive(Default)]
pub struct ExampleSerial {
    /// Bytes written since the last flush
    pending: Vec<u8, 256>,

    /// Bytes waiting to be read
    rx: Deque<u8, 512>,
}

impl ExampleSerial {
    /// Queues the mocked modem output for the pending command
    fn respond(&mut self) {
        let response: &[u8] = match self.pending.as_slice() {
            b"AT+CWJAP_CUR=\"test_wifi\",\"secret\"\r\n" => b"WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n",
            b"AT+CIFSR\r\n" => b"+CIFSR:APIP,\"192.168.4.1\"\r\n+CIFSR:STAIP,\"10.0.0.181\"\r\n\r\nOK\r\n",
            b"AT+CIPSTO=10\r\n" => b"\r\nOK\r\n0,CONNECT\r\n\r\n+IPD,0,11:Hello world\r\nOK\r\n",
            b"AT+CIPCLOSE;\r\n" => b"0,CLOSED\r\n\r\nOK\r\n",
            command if command.starts_with(b"AT+CIPSEND=") => b"\r\nOK\r\n> ",
            command if command.starts_with(b"AT") => b"\r\nOK\r\n",
            _ => b"\r\nRecv 16 bytes\r\n\r\nSEND OK\r\n",
        };

        for byte in response {
            let _ = self.rx.push_back(*byte);
        }
        self.pending.clear();
    }
}

impl ErrorType for ExampleSerial {
    type Error = Infallible;
}

impl Read for ExampleSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        while count < buf.len() {
            match self.rx.pop_front() {
                Some(byte) => buf[count] = byte,
                None => break,
            }
            count += 1;
        }

        Ok(count)
    }
}

impl ReadReady for ExampleSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl Write for ExampleSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        // Payload beyond the buffer capacity is not relevant for matching
        let length = buf.len().min(self.pending.capacity() - self.pending.len());
        let _ = self.pending.extend_from_slice(&buf[..length]);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if !self.pending.is_empty() {
            self.respond();
        }
        Ok(())
    }
}

/// Timer mock, advancing one millisecond on every call of `now()`
#[derive(Default)]
pub struct ExampleTimer {
    ticks: u32,
}

impl Timer<1_000_000> for ExampleTimer {
    type Error = u32;

    fn now(&mut self) -> TimerInstantU32<1000000> {
        self.ticks = self.ticks.wrapping_add(1_000);
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, _duration: TimerDurationU32<1000000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        nb::Result::Err(nb::Error::WouldBlock)
    }
}
