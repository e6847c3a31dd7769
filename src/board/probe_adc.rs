use esp_idf_svc::hal::{
    adc::{attenuation, config::Config, Adc, AdcChannelDriver, AdcDriver},
    gpio::ADCPin,
    peripheral::Peripheral,
};
use log::debug;

use crate::sensors::resistance_sampler::AnalogInput;

/// Uncalibrated 12 bit reads of the multiplexer output.
pub struct ProbeAdc<'a, ADC: Adc, PADC: ADCPin<Adc = ADC>> {
    adc: AdcDriver<'a, ADC>,
    pin_adc: AdcChannelDriver<'a, { attenuation::DB_11 }, PADC>,
}

impl<'a, ADC: Adc, PADC: ADCPin<Adc = ADC>> ProbeAdc<'a, ADC, PADC> {
    pub fn new(
        adc: impl Peripheral<P = ADC> + 'a,
        pin_adc: impl Peripheral<P = PADC> + 'a,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            adc: AdcDriver::new(adc, &Config::new().calibration(false))?,
            pin_adc: AdcChannelDriver::new(pin_adc)?,
        })
    }
}

impl<'a, ADC: Adc, PADC: ADCPin<Adc = ADC>> AnalogInput for ProbeAdc<'a, ADC, PADC> {
    fn read_raw(&mut self) -> u16 {
        match self.adc.read_raw(&mut self.pin_adc) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("ADC read failed: {}", e);
                0
            }
        }
    }
}
