use crate::fmt::printable;
use crate::transaction::{transport_error, Accumulator, Deadline, Error, Response, Terminator, LINE_TERMINATOR};
use embassy_futures::yield_now;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use fugit::TimerDurationU32;
use fugit_timer::Timer;

/// Async AT transaction engine
///
/// Same semantics as the blocking [Transceiver](crate::transaction::Transceiver), but yields to the
/// executor whenever no byte is ready.
pub struct Transceiver<S, T, const TIMER_HZ: u32, const RX_SIZE: usize>
where
    S: Read + Write + ReadReady,
    T: Timer<TIMER_HZ>,
{
    pub(crate) serial: S,
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
    pub async fn execute(
        &mut self,
        command: &[u8],
        timeout: TimerDurationU32<TIMER_HZ>,
        terminator: Terminator<'_>,
    ) -> Result<Response<RX_SIZE>, Error> {
        debug!("[AT] >> {}", printable(command));
        self.write_line(command).await?;

        let response = self.consume(timeout, terminator).await;
        match &response {
            Ok(data) => trace!("[AT] << {}", printable(data)),
            Err(error) => debug!("[AT] {} failed: {:?}", printable(command), error),
        }

        response
    }

    pub async fn write_line(&mut self, command: &[u8]) -> Result<(), Error> {
        self.serial.write_all(command).await.map_err(transport_error)?;
        self.serial.write_all(LINE_TERMINATOR).await.map_err(transport_error)?;
        self.serial.flush().await.map_err(transport_error)
    }

    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), Error> {
        self.serial.write_all(data).await.map_err(transport_error)?;
        self.serial.flush().await.map_err(transport_error)
    }

    /// Accumulates received bytes until the terminator matches or the timeout is reached
    pub async fn consume(
        &mut self,
        timeout: TimerDurationU32<TIMER_HZ>,
        terminator: Terminator<'_>,
    ) -> Result<Response<RX_SIZE>, Error> {
        let deadline = Deadline::new(self.timer.now(), timeout);
        let mut accumulator: Accumulator<RX_SIZE> = Accumulator::new(terminator);

        loop {
            match self.read_byte().await? {
                Some(byte) => {
                    if accumulator.push(byte) {
                        return accumulator.finish();
                    }
                }
                None => yield_now().await,
            }

            if deadline.is_reached(self.timer.now()) {
                return Err(accumulator.timeout_error());
            }
        }
    }

    pub fn data_available(&mut self) -> Result<bool, Error> {
        self.serial.read_ready().map_err(transport_error)
    }

    async fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        if !self.data_available()? {
            return Ok(None);
        }

        let mut buffer = [0x0; 1];
        match self.serial.read(&mut buffer).await.map_err(transport_error)? {
            0 => Ok(None),
            _ => Ok(Some(buffer[0])),
        }
    }

    pub fn release(self) -> (S, T) {
        (self.serial, self.timer)
    }
}
