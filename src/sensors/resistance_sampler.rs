use embedded_hal::{delay::DelayNs, digital::OutputPin};
use log::debug;

use super::{
    mux::MuxController,
    sensor::{ResistanceSource, Sample},
};
use crate::channel::Channel;

/// Reported when the divider output is near 0 V (probe open or bone dry).
pub const OPEN_CIRCUIT_OHMS: f32 = 1e9;

const MIN_VOLTAGE: f32 = 0.0001;

/// Raw ADC input shared by every probe.
pub trait AnalogInput {
    fn read_raw(&mut self) -> u16;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    pub series_resistor_ohms: f32,
    pub supply_voltage: f32,
    pub adc_full_scale: f32,
    pub samples: u8,
    /// RC settling time after switching the multiplexer.
    pub settle_ms: u32,
    pub sample_gap_ms: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            series_resistor_ohms: 100_000.0,
            supply_voltage: 3.3,
            adc_full_scale: 4095.0,
            samples: 8,
            settle_ms: 30,
            sample_gap_ms: 2,
        }
    }
}

impl SamplerConfig {
    pub fn voltage_from_raw(&self, adc_raw: f32) -> f32 {
        adc_raw / self.adc_full_scale * self.supply_voltage
    }

    /// Inverts the divider `Vout = Vcc * Rs / (Rs + Rprobe)`.
    pub fn resistance_from_voltage(&self, voltage: f32) -> f32 {
        if voltage <= MIN_VOLTAGE {
            return OPEN_CIRCUIT_OHMS;
        }

        self.series_resistor_ohms * (self.supply_voltage / voltage - 1.0)
    }
}

pub struct ResistanceSampler<P: OutputPin, A: AnalogInput, D: DelayNs> {
    mux: MuxController<P>,
    adc: A,
    delay: D,
    config: SamplerConfig,
}

impl<P: OutputPin, A: AnalogInput, D: DelayNs> ResistanceSampler<P, A, D> {
    pub fn new(mux: MuxController<P>, adc: A, delay: D, config: SamplerConfig) -> Self {
        Self {
            mux,
            adc,
            delay,
            config,
        }
    }

    fn read_average(&mut self) -> f32 {
        let samples = self.config.samples.max(1);
        let mut sum: u32 = 0;

        for _ in 0..samples {
            sum += self.adc.read_raw() as u32;
            self.delay.delay_ms(self.config.sample_gap_ms);
        }

        sum as f32 / samples as f32
    }
}

impl<P: OutputPin, A: AnalogInput, D: DelayNs> ResistanceSource for ResistanceSampler<P, A, D> {
    fn sample(&mut self, channel: Channel) -> Sample {
        self.mux.select(channel);
        self.delay.delay_ms(self.config.settle_ms);

        let adc_raw = self.read_average();
        let voltage = self.config.voltage_from_raw(adc_raw);
        let resistance = self.config.resistance_from_voltage(voltage);

        debug!(
            "CH{}: ADC={:.1}, Vout={:.3}V, R={:.0} Ohm",
            channel, adc_raw, voltage, resistance
        );

        Sample {
            adc_raw,
            voltage,
            resistance,
        }
    }

    fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::sensors::mux::tests::{fake_pins, selected, FakePin};

    /// Returns the count of the selected channel, plus `jitter` on every
    /// second read.
    struct FakeAdc {
        pins: [FakePin; 3],
        counts: [u16; 8],
        jitter: u16,
        reads: Rc<Cell<u32>>,
    }

    impl AnalogInput for FakeAdc {
        fn read_raw(&mut self) -> u16 {
            self.reads.set(self.reads.get() + 1);
            let extra = if self.reads.get() % 2 == 0 { self.jitter } else { 0 };
            self.counts[selected(&self.pins) as usize] + extra
        }
    }

    #[derive(Clone, Default)]
    struct FakeDelay(Rc<Cell<u64>>);

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.0.set(self.0.get() + ns as u64);
        }
    }

    fn sampler(
        counts: [u16; 8],
        jitter: u16,
    ) -> (
        ResistanceSampler<FakePin, FakeAdc, FakeDelay>,
        Rc<Cell<u32>>,
        FakeDelay,
    ) {
        let pins = fake_pins();
        let [s0, s1, s2] = pins.clone();
        let reads = Rc::new(Cell::new(0));
        let delay = FakeDelay::default();
        let adc = FakeAdc {
            pins,
            counts,
            jitter,
            reads: reads.clone(),
        };

        (
            ResistanceSampler::new(
                MuxController::new(s0, s1, s2),
                adc,
                delay.clone(),
                SamplerConfig::default(),
            ),
            reads,
            delay,
        )
    }

    #[test]
    fn mid_scale_reading_is_close_to_series_resistor() {
        let config = SamplerConfig::default();

        let voltage = config.voltage_from_raw(2048.0);
        assert!((voltage - 1.6504).abs() < 1e-3, "{voltage}");

        let resistance = config.resistance_from_voltage(1.651);
        assert!((resistance - 99_879.0).abs() < 2.0, "{resistance}");
    }

    #[test]
    fn near_zero_voltage_reports_open_circuit() {
        let config = SamplerConfig::default();

        assert_eq!(config.resistance_from_voltage(0.0), OPEN_CIRCUIT_OHMS);
        assert_eq!(config.resistance_from_voltage(0.0001), OPEN_CIRCUIT_OHMS);
        assert!(config.resistance_from_voltage(0.01).is_finite());
    }

    #[test]
    fn samples_the_selected_channel() {
        let mut counts = [0u16; 8];
        counts[3] = 2048;
        counts[6] = 4095;
        let (mut sampler, _, _) = sampler(counts, 0);

        let ch3 = sampler.sample(Channel::new(3).unwrap());
        assert_eq!(ch3.adc_raw, 2048.0);
        assert!((ch3.resistance - 99_951.0).abs() < 5.0, "{}", ch3.resistance);

        let ch6 = sampler.sample(Channel::new(6).unwrap());
        assert!(ch6.resistance.abs() < 1.0);

        let ch0 = sampler.sample(Channel::new(0).unwrap());
        assert_eq!(ch0.resistance, OPEN_CIRCUIT_OHMS);
    }

    #[test]
    fn averages_k_reads_after_settling() {
        let (mut sampler, reads, delay) = sampler([1000; 8], 1000);

        let sample = sampler.sample(Channel::new(1).unwrap());

        assert_eq!(reads.get(), 8);
        // 1000, 2000, 1000, ... averages to 1500
        assert_eq!(sample.adc_raw, 1500.0);
        assert!((sample.resistance - 173_000.0).abs() < 1.0, "{}", sample.resistance);
        // 30 ms settle + 8 * 2 ms gaps
        assert_eq!(delay.0.get(), 46 * 1_000_000);
    }
}
