use embedded_io_async::{Read, Write};

use crate::config::BUFFER_LENGTH;
use crate::dispatcher::{Dispatcher, error_reply};
use crate::error::ErrorCode;
use crate::framer::{Frame, LineFramer};
use crate::ports::{AnalogInput, DigitalIo, PwmOutput};

/// Write `line` followed by the newline terminator.
pub async fn write_line<W: Write>(io: &mut W, line: &str) -> Result<(), W::Error> {
    io.write_all(line.as_bytes()).await?;
    io.write_all(b"\n").await?;
    io.flush().await
}

/// The command side of the firmware: bytes in, one reply line per command out.
///
/// Strictly sequential: a command is fully handled and answered before the
/// next chunk is read.
pub struct CommandLink<'r, D, A, P> {
    framer: LineFramer<BUFFER_LENGTH>,
    dispatcher: Dispatcher<'r, D, A, P>,
}

impl<'r, D, A, P> CommandLink<'r, D, A, P>
where
    D: DigitalIo,
    A: AnalogInput,
    P: PwmOutput,
{
    pub fn new(dispatcher: Dispatcher<'r, D, A, P>) -> Self {
        Self {
            framer: LineFramer::new(),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<'r, D, A, P> {
        &self.dispatcher
    }

    /// Read one chunk from `io` and answer every line it completes.
    pub async fn poll<T: Read + Write>(&mut self, io: &mut T) -> Result<(), T::Error> {
        let mut chunk = [0u8; BUFFER_LENGTH];
        let len = io.read(&mut chunk).await?;
        for &byte in &chunk[..len] {
            match self.framer.push(byte) {
                Some(Frame::Line(line)) => {
                    let reply = self.dispatcher.execute(&line);
                    write_line(io, &reply).await?;
                }
                Some(Frame::Overflow(partial)) => {
                    log::warn!("input line longer than {} bytes", BUFFER_LENGTH);
                    let reply = error_reply(ErrorCode::InputBufferOverflow, &partial);
                    write_line(io, &reply).await?;
                }
                None => {}
            }
        }
        Ok(())
    }

    pub async fn run<T: Read + Write>(mut self, mut io: T) -> ! {
        log::info!("command link task starting");
        loop {
            if let Err(e) = self.poll(&mut io).await {
                log::warn!("command link error: {:?}", e);
                self.framer.reset();
            }
        }
    }
}
