pub mod lcd;
pub mod probe_adc;

use esp_idf_svc::hal::{
    adc::ADC1,
    delay::Delay,
    gpio::*,
    i2c::{I2cConfig, I2cDriver, I2C0},
    units::Hertz,
};
use log::warn;

use crate::sensors::{
    mux::MuxController,
    resistance_sampler::{ResistanceSampler, SamplerConfig},
};

use self::{lcd::Lcd, probe_adc::ProbeAdc};

const I2C_HZ: u32 = 100_000;
const LCD_ADDRESS: u8 = 0x27;

pub type Probes<'a> =
    ResistanceSampler<PinDriver<'a, AnyOutputPin, Output>, ProbeAdc<'a, ADC1, Gpio34>, Delay>;

///  - Mux S0/S1/S2: GPIO25/26/27, common output on GPIO34 (ADC1)
///  - LCD: PCF8574 at 0x27, SDA=GPIO21, SCL=GPIO22
pub struct Board<'a> {
    pub probes: Probes<'a>,
    pub lcd: Option<Lcd<'a>>,
}

impl<'a> Board<'a> {
    pub fn new(adc_1: ADC1, pins: Pins, i2c0: I2C0) -> anyhow::Result<Self> {
        let mux = MuxController::new(
            PinDriver::output(pins.gpio25.downgrade_output())?,
            PinDriver::output(pins.gpio26.downgrade_output())?,
            PinDriver::output(pins.gpio27.downgrade_output())?,
        );

        let probes = ResistanceSampler::new(
            mux,
            ProbeAdc::new(adc_1, pins.gpio34)?,
            Delay::new_default(),
            SamplerConfig::default(),
        );

        let i2c = I2cDriver::new(
            i2c0,
            pins.gpio21,
            pins.gpio22,
            &I2cConfig::new().baudrate(Hertz(I2C_HZ)),
        )?;

        let lcd = match Lcd::new(i2c, LCD_ADDRESS) {
            Ok(lcd) => Some(lcd),
            Err(e) => {
                warn!("LCD not found: {:?}", e);
                None
            }
        };

        Ok(Self { probes, lcd })
    }
}
