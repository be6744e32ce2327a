use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embassy_futures::block_on;
use embassy_time::Instant;
use embedded_io_async::{ErrorType, Read, Write};
use streamline::{
    AnalogInput, CommandLink, DigitalIo, Dispatcher, HardwareError, PinMode, PwmOutput, Runtime,
    Sampler,
};

const RAW: u16 = 1234;

#[derive(Clone, Default)]
struct Board {
    adc_reads: Rc<RefCell<usize>>,
}

impl DigitalIo for Board {
    fn level(&mut self, _pin: u8) -> bool {
        true
    }
    fn set_mode(&mut self, _pin: u8, _mode: PinMode) -> Result<(), HardwareError> {
        Ok(())
    }
    fn set_level(&mut self, _pin: u8, _high: bool) -> Result<(), HardwareError> {
        Ok(())
    }
}

impl AnalogInput for Board {
    fn read(&mut self, index: usize) -> Result<u16, HardwareError> {
        *self.adc_reads.borrow_mut() += 1;
        if index == 0 { Ok(RAW) } else { Ok(0) }
    }
}

impl PwmOutput for Board {
    fn configure_timer(&mut self, _frequency_hz: u32) -> Result<(), HardwareError> {
        Ok(())
    }
    fn configure_channel(&mut self, _channel: u8, _pin: u8) -> Result<(), HardwareError> {
        Ok(())
    }
    fn set_duty(&mut self, _channel: u8, _duty: u8) -> Result<(), HardwareError> {
        Ok(())
    }
}

#[derive(Default)]
struct Serial {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl Serial {
    fn send(&mut self, line: &str) {
        self.rx.extend(line.bytes());
        self.rx.push_back(b'\n');
    }

    fn take_lines(&mut self) -> Vec<String> {
        let text = String::from_utf8(std::mem::take(&mut self.tx)).unwrap();
        text.lines().map(String::from).collect()
    }
}

impl ErrorType for Serial {
    type Error = Infallible;
}

impl Read for Serial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut len = 0;
        while len < buf.len() {
            let Some(byte) = self.rx.pop_front() else {
                break;
            };
            buf[len] = byte;
            len += 1;
        }
        Ok(len)
    }
}

impl Write for Serial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn command<D, A, P>(link: &mut CommandLink<'_, D, A, P>, serial: &mut Serial, line: &str) -> String
where
    D: DigitalIo,
    A: AnalogInput,
    P: PwmOutput,
{
    serial.send(line);
    while !serial.rx.is_empty() {
        block_on(link.poll(serial)).unwrap();
    }
    let mut lines = serial.take_lines();
    assert_eq!(lines.len(), 1, "expected exactly one reply to {line:?}");
    lines.remove(0)
}

fn at(us: u64) -> Instant {
    Instant::from_micros(us)
}

#[test]
fn watch_sample_and_report() {
    let runtime = Runtime::new();
    let board = Board::default();
    let mut serial = Serial::default();
    let mut link = CommandLink::new(Dispatcher::new(
        &runtime,
        board.clone(),
        board.clone(),
        board.clone(),
    ));
    let mut sampler = Sampler::new(&runtime, board.clone(), at(0));

    assert_eq!(command(&mut link, &mut serial, "?#ai"), "NUM_AI 4");
    assert_eq!(command(&mut link, &mut serial, "?t"), "PERIOD 20000");

    // Nothing watched: the sampler only keeps time.
    sampler.tick(at(1_000));
    assert_eq!(*board.adc_reads.borrow(), 0);

    assert_eq!(command(&mut link, &mut serial, "!ai:watch 0 1"), "Ok");
    assert_eq!(command(&mut link, &mut serial, "?ai:mean 0"), "AI_MEAN 0 0.00");

    // A bit more than one full window at a 1 ms cadence.
    for step in 2..=45u64 {
        sampler.tick(at(step * 1_000));
    }
    assert!(*board.adc_reads.borrow() > 0);

    assert_eq!(
        command(&mut link, &mut serial, "?ai:mean 0"),
        format!("AI_MEAN 0 {:.2}", f64::from(RAW) * 1000.0)
    );
    assert_eq!(command(&mut link, &mut serial, "?rate"), "RATE 1000");

    assert_eq!(
        command(&mut link, &mut serial, "!t 9999999999"),
        "ERROR_INVALID_ARGUMENT: !t 9999999999"
    );
    assert_eq!(command(&mut link, &mut serial, "?t"), "PERIOD 20000");
    assert_eq!(
        command(&mut link, &mut serial, "?bi 18"),
        "ERROR_BI_PIN_NOT_AVAILABLE: ?bi 18"
    );
    assert_eq!(command(&mut link, &mut serial, "?ai:mean 1"), "ERROR_AI_NOT_WATCHED: ?ai:mean 1");
}

#[test]
fn multiplier_scales_only_the_report() {
    let runtime = Runtime::new();
    let board = Board::default();
    let mut serial = Serial::default();
    let mut link = CommandLink::new(Dispatcher::new(
        &runtime,
        board.clone(),
        board.clone(),
        board.clone(),
    ));
    let mut sampler = Sampler::new(&runtime, board.clone(), at(0));

    assert_eq!(command(&mut link, &mut serial, "!ai:watch 0"), "Ok");
    for step in 1..=20u64 {
        sampler.tick(at(step * 1_000));
    }
    assert_eq!(command(&mut link, &mut serial, "!k 2"), "Ok");
    assert_eq!(command(&mut link, &mut serial, "?ai:mean 0"), "AI_MEAN 0 2468.00");
    assert_eq!(command(&mut link, &mut serial, "!k 5"), "Ok");
    assert_eq!(command(&mut link, &mut serial, "?ai:mean 0"), "AI_MEAN 0 6170.00");
    assert_eq!(runtime.telemetry.snapshot().channels[0].mean, f32::from(RAW));
}

#[test]
fn period_change_closes_the_running_window() {
    let runtime = Runtime::new();
    let board = Board::default();
    let mut serial = Serial::default();
    let mut link = CommandLink::new(Dispatcher::new(
        &runtime,
        board.clone(),
        board.clone(),
        board.clone(),
    ));
    let mut sampler = Sampler::new(&runtime, board.clone(), at(0));

    assert_eq!(command(&mut link, &mut serial, "!t 3600000"), "Ok");
    // The first tick after `!t` closes the default-period window.
    sampler.tick(at(0));
    assert_eq!(sampler.window().deadline(), at(3_600_000));
    assert_eq!(command(&mut link, &mut serial, "!ai:watch 0 1"), "Ok");
    for step in 1..=4u64 {
        sampler.tick(at(step * 1_000));
    }
    assert_eq!(command(&mut link, &mut serial, "?ai:mean 0"), "AI_MEAN 0 0.00");

    assert_eq!(command(&mut link, &mut serial, "!t 5000"), "Ok");
    sampler.tick(at(5_000));
    assert_eq!(
        command(&mut link, &mut serial, "?ai:mean 0"),
        format!("AI_MEAN 0 {:.2}", f64::from(RAW) * 1000.0)
    );
    assert_eq!(sampler.window().deadline(), at(10_000));
}
