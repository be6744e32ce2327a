use esp_hal::Async;
use esp_hal::usb_serial_jtag::UsbSerialJtag;
use streamline::config::{SOFTWARE_ID, SOFTWARE_VERSION};
use streamline::link::write_line;
use streamline::{CommandLink, Reply};

use crate::board::{AdcHandle, Gpio};
use crate::ledc::LedcPwm;

pub type Link = CommandLink<'static, Gpio, AdcHandle, LedcPwm>;

/// Announce the firmware on the host port, then serve commands forever.
#[embassy_executor::task]
pub async fn command_task(link: Link, mut serial: UsbSerialJtag<'static, Async>) {
    let mut banner = Reply::new();
    if core::fmt::write(
        &mut banner,
        format_args!("{} starting. Version: {}.", SOFTWARE_ID, SOFTWARE_VERSION),
    )
    .is_ok()
    {
        log::info!("{}", banner);
        if let Err(e) = write_line(&mut serial, &banner).await {
            log::warn!("boot banner not sent: {:?}", e);
        }
    }
    link.run(serial).await
}
