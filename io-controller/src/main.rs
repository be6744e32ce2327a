#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use embassy_executor::Spawner;
use embassy_time::Instant;
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::usb_serial_jtag::UsbSerialJtag;
use static_cell::StaticCell;
use streamline::{CommandLink, Dispatcher, Runtime, Sampler};
use {esp_backtrace as _, esp_println as _};

use crate::board::{AdcHandle, AnalogPins, Gpio};
use crate::ledc::LedcPwm;
use crate::sampling::sampler_task;
use crate::serial::command_task;

mod board;
mod ledc;
mod sampling;
mod serial;

static RUNTIME: StaticCell<Runtime> = StaticCell::new();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let p = esp_hal::init(config);

    let timer0 = TimerGroup::new(p.TIMG1);
    esp_hal_embassy::init(timer0.timer0);

    let runtime: &'static Runtime = RUNTIME.init(Runtime::new());

    let adc = AdcHandle::new(AnalogPins::new(p.ADC1, p.GPIO1, p.GPIO2, p.GPIO3, p.GPIO4));
    let pwm = LedcPwm::new(p.LEDC);
    let serial = UsbSerialJtag::new(p.USB_DEVICE).into_async();

    let dispatcher = Dispatcher::new(runtime, Gpio::new(), adc, pwm);

    spawner
        .spawn(sampler_task(Sampler::new(runtime, adc, Instant::now())))
        .unwrap();

    spawner
        .spawn(command_task(CommandLink::new(dispatcher), serial))
        .unwrap();
}
