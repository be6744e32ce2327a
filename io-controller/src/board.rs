//! GPIO and ADC ports over esp-hal.

use core::cell::RefCell;

use critical_section::Mutex;
use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::gpio::{AnyPin, Flex, InputConfig, Level, OutputConfig, Pull};
use esp_hal::peripherals::{ADC1, GPIO1, GPIO2, GPIO3, GPIO4};
use static_cell::StaticCell;
use streamline::config::NUM_DIGITAL_PINS;
use streamline::{AnalogInput, DigitalIo, HardwareError, PinMode};

struct PinSlot {
    flex: Flex<'static>,
    mode: Option<PinMode>,
}

/// Digital pins addressed by number at runtime.
///
/// A pin gets a `Flex` driver the first time a command touches it. Creating
/// one leaves the pin's function alone, so reading a pin that LEDC or ADC1
/// is using does not disturb it. Only `!pin` and `!bo` change the pad setup.
pub struct Gpio {
    pins: [Option<PinSlot>; NUM_DIGITAL_PINS as usize],
}

impl Gpio {
    pub fn new() -> Self {
        Self {
            pins: [const { None }; NUM_DIGITAL_PINS as usize],
        }
    }

    fn slot(&mut self, pin: u8) -> Result<&mut PinSlot, HardwareError> {
        let entry = self.pins.get_mut(usize::from(pin)).ok_or(HardwareError)?;
        Ok(entry.get_or_insert_with(|| {
            // SAFETY: `pin` is inside the digital range and this table keeps
            // at most one driver per pin. LEDC and ADC1 may drive the same pad;
            // the protocol allows that and `Flex::new` does not reconfigure it.
            let any = unsafe { AnyPin::steal(pin) };
            PinSlot {
                flex: Flex::new(any),
                mode: None,
            }
        }))
    }
}

impl DigitalIo for Gpio {
    fn level(&mut self, pin: u8) -> bool {
        match self.slot(pin) {
            Ok(slot) => {
                slot.flex.set_input_enable(true);
                slot.flex.is_high()
            }
            Err(_) => false,
        }
    }

    fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), HardwareError> {
        let slot = self.slot(pin)?;
        if slot.mode == Some(mode) {
            return Ok(());
        }
        match mode {
            PinMode::Input => {
                slot.flex
                    .apply_input_config(&InputConfig::default().with_pull(Pull::None));
                slot.flex.set_output_enable(false);
                slot.flex.set_input_enable(true);
            }
            PinMode::Output => {
                slot.flex.apply_output_config(&OutputConfig::default());
                slot.flex.set_level(Level::Low);
                slot.flex.set_input_enable(true);
                slot.flex.set_output_enable(true);
            }
        }
        slot.mode = Some(mode);
        Ok(())
    }

    fn set_level(&mut self, pin: u8, high: bool) -> Result<(), HardwareError> {
        let slot = self.slot(pin)?;
        if slot.mode != Some(PinMode::Output) {
            return Err(HardwareError);
        }
        slot.flex.set_level(Level::from(high));
        Ok(())
    }
}

/// ADC1 with the four analog inputs: index n is ADC1 channel n on GPIO(n + 1).
pub struct AnalogPins {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    ai0: AdcPin<GPIO1<'static>, ADC1<'static>>,
    ai1: AdcPin<GPIO2<'static>, ADC1<'static>>,
    ai2: AdcPin<GPIO3<'static>, ADC1<'static>>,
    ai3: AdcPin<GPIO4<'static>, ADC1<'static>>,
}

impl AnalogPins {
    pub fn new(
        adc1: ADC1<'static>,
        gpio1: GPIO1<'static>,
        gpio2: GPIO2<'static>,
        gpio3: GPIO3<'static>,
        gpio4: GPIO4<'static>,
    ) -> Self {
        let mut config = AdcConfig::new();
        let ai0 = config.enable_pin(gpio1, Attenuation::_11dB);
        let ai1 = config.enable_pin(gpio2, Attenuation::_11dB);
        let ai2 = config.enable_pin(gpio3, Attenuation::_11dB);
        let ai3 = config.enable_pin(gpio4, Attenuation::_11dB);
        Self {
            adc: Adc::new(adc1, config),
            ai0,
            ai1,
            ai2,
            ai3,
        }
    }

    fn read(&mut self, index: usize) -> Result<u16, HardwareError> {
        let result = match index {
            0 => nb::block!(self.adc.read_oneshot(&mut self.ai0)),
            1 => nb::block!(self.adc.read_oneshot(&mut self.ai1)),
            2 => nb::block!(self.adc.read_oneshot(&mut self.ai2)),
            3 => nb::block!(self.adc.read_oneshot(&mut self.ai3)),
            _ => return Err(HardwareError),
        };
        result.map_err(|_| HardwareError)
    }
}

static ANALOG: StaticCell<Mutex<RefCell<AnalogPins>>> = StaticCell::new();

/// Handle to the one ADC, shared by the command link and the sampler.
#[derive(Clone, Copy)]
pub struct AdcHandle(&'static Mutex<RefCell<AnalogPins>>);

impl AdcHandle {
    /// Panics if called twice.
    pub fn new(pins: AnalogPins) -> Self {
        Self(ANALOG.init(Mutex::new(RefCell::new(pins))))
    }
}

impl AnalogInput for AdcHandle {
    fn read(&mut self, index: usize) -> Result<u16, HardwareError> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).read(index))
    }
}
