//! Echo server that runs on Linux using a serial-USB-adapter.
use std::{env, time::Duration};

use esp_at_server::{
    server::ServerAdapter,
    wifi::{Adapter, WifiAdapter},
};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

// Max. size of a single response or request in bytes
const RX_SIZE: usize = 2048;

// Timer frequency in Hz
const TIMER_HZ: u32 = 1000;

fn main() {
    env_logger::init();

    // Parse args
    let args: Vec<String> = env::args().collect();
    if args.len() != 5 {
        println!("Usage: {} <path-to-serial> <baudrate> <ssid> <psk>", args[0]);
        println!("Example: {} /dev/ttyUSB0 9600 mywifi hellopasswd123", args[0]);
        println!("\nNote: To run the example with debug logging, run it like this:");
        println!("\n  RUST_LOG=trace cargo run --example linux --features \"log\" -- /dev/ttyUSB0 9600 mywifi hellopasswd123");
        std::process::exit(1);
    }
    let dev = &args[1];
    let baud_rate: u32 = args[2].parse().unwrap();
    let ssid = &args[3];
    let psk = &args[4];

    println!("Starting (dev={}, baud={:?})...", dev, baud_rate);

    // Open serial port
    let port = serialport::new(dev, baud_rate)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_millis(500))
        .open()
        .expect("Could not open serial port");
    let mut serial = serial::Serial::new(port);

    // Flush serial RX buffer, to ensure that there isn't any remaining left
    // form previous sessions.
    serial.flush_input();

    // ESP AT adapter
    let mut adapter: Adapter<_, _, TIMER_HZ, RX_SIZE> = Adapter::new(serial, timer::SysTimer::new());
    adapter.probe().expect("Module does not respond");

    // Join WIFI access point
    println!("Join WiFi \"{}\"...", ssid);
    adapter.join(ssid, psk).expect("Joining access point failed");

    match adapter.get_acquired_address() {
        Some(address) => println!("Joined, listening on {}:{}", address, esp_at_server::server::DEFAULT_SERVER_PORT),
        None => println!("Joined, but station address is unknown"),
    }

    adapter.start_server().expect("Starting server failed");

    // Echo every request back to the client
    loop {
        match adapter.poll_incoming() {
            Some(request) => {
                println!("Received {} bytes", request.len());
                if let Err(error) = adapter.send_response(&request) {
                    println!("Sending response failed: {:?}", error);
                }
            }
            None => std::thread::sleep(Duration::from_millis(10)),
        }
    }
}

mod serial {
    use std::io::{self, Read, Write};

    use embedded_io::{ErrorKind, ErrorType};
    use serialport::SerialPort;

    /// Transport error of the serial port
    #[derive(Debug)]
    pub struct SerialError(io::ErrorKind);

    impl embedded_io::Error for SerialError {
        fn kind(&self) -> ErrorKind {
            match self.0 {
                io::ErrorKind::TimedOut => ErrorKind::TimedOut,
                io::ErrorKind::Interrupted => ErrorKind::Interrupted,
                io::ErrorKind::BrokenPipe => ErrorKind::BrokenPipe,
                _ => ErrorKind::Other,
            }
        }
    }

    impl From<io::Error> for SerialError {
        fn from(error: io::Error) -> Self {
            Self(error.kind())
        }
    }

    impl From<serialport::Error> for SerialError {
        fn from(error: serialport::Error) -> Self {
            Self(io::Error::from(error).kind())
        }
    }

    /// Blocking serial port exposed as [embedded_io] transport
    pub struct Serial {
        port: Box<dyn SerialPort>,
    }

    impl Serial {
        pub fn new(port: Box<dyn SerialPort>) -> Self {
            Self { port }
        }

        /// Drops any pending input
        pub fn flush_input(&mut self) {
            let mut buf = [0; 32];
            loop {
                match self.port.read(&mut buf[..]) {
                    Ok(0) => break,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => break,
                    Ok(_) => continue,
                    Err(e) => panic!("Error while flushing serial: {}", e),
                }
            }
        }
    }

    impl ErrorType for Serial {
        type Error = SerialError;
    }

    impl embedded_io::Read for Serial {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            match self.port.read(buf) {
                Ok(count) => Ok(count),
                Err(e) if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock => Ok(0),
                Err(e) => Err(e.into()),
            }
        }
    }

    impl embedded_io::ReadReady for Serial {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(self.port.bytes_to_read()? > 0)
        }
    }

    impl embedded_io::Write for Serial {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            Ok(self.port.write(buf)?)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(self.port.flush()?)
        }
    }
}

mod timer {
    use std::time::Instant as StdInstant;

    use fugit::Instant;
    use fugit_timer::Timer;

    /// A timer with millisecond precision.
    pub struct SysTimer {
        origin: StdInstant,
        start: StdInstant,
        duration_ms: u32,
        started: bool,
    }

    impl SysTimer {
        pub fn new() -> SysTimer {
            SysTimer {
                origin: StdInstant::now(),
                start: StdInstant::now(),
                duration_ms: 0,
                started: false,
            }
        }
    }

    impl Timer<1000> for SysTimer {
        type Error = &'static str;

        /// Milliseconds since creation of the timer
        fn now(&mut self) -> fugit::TimerInstantU32<1000> {
            // Wraps after ~49 days, instants are compared wrapping-aware
            let ticks = (StdInstant::now() - self.origin).as_millis() as u32;
            Instant::<u32, 1, 1000>::from_ticks(ticks)
        }

        fn start(&mut self, duration: fugit::TimerDurationU32<1000>) -> Result<(), Self::Error> {
            self.start = StdInstant::now();
            self.duration_ms = duration.ticks();
            self.started = true;

            Ok(())
        }

        fn cancel(&mut self) -> Result<(), Self::Error> {
            if !self.started {
                Err("cannot cancel stopped timer")
            } else {
                self.started = false;
                Ok(())
            }
        }

        /// Must return `nb::Error::WouldBlock` if timer `duration` is not yet over.
        fn wait(&mut self) -> nb::Result<(), Self::Error> {
            let now = StdInstant::now();
            if (now - self.start).as_millis() > self.duration_ms.into() {
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        }
    }
}
