//! Prometheus text exposition of the last readings.

use std::fmt::Write;

use crate::{channel::CHANNEL_COUNT, device::Reading};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

struct Gauge {
    name: &'static str,
    help: &'static str,
    value: fn(&Reading) -> String,
}

const GAUGES: &[Gauge] = &[
    Gauge {
        name: "hygrometer_resistance_ohms",
        help: "Resistance measured at probe",
        value: |r| format!("{:.2}", r.resistance),
    },
    Gauge {
        name: "hygrometer_adc_raw",
        help: "Averaged raw ADC count",
        value: |r| format!("{:.1}", r.adc_raw),
    },
    Gauge {
        name: "hygrometer_voltage_volts",
        help: "Divider output voltage",
        value: |r| format!("{:.4}", r.voltage),
    },
    Gauge {
        name: "hygrometer_dry_limit_ohms",
        help: "Effective dry limit used for the index",
        value: |r| format!("{:.2}", r.limits.dry),
    },
    Gauge {
        name: "hygrometer_wet_limit_ohms",
        help: "Effective wet limit used for the index",
        value: |r| format!("{:.2}", r.limits.wet),
    },
    Gauge {
        name: "hygrometer_index_percent",
        help: "Moisture index, 0 dry to 100 wet",
        value: |r| format!("{:.2}", r.index),
    },
];

pub fn render(readings: &[Reading]) -> String {
    let mut body = String::new();

    for gauge in GAUGES {
        let _ = writeln!(body, "# HELP {} {}", gauge.name, gauge.help);
        let _ = writeln!(body, "# TYPE {} gauge", gauge.name);
        for reading in readings {
            let _ = writeln!(
                body,
                "{}{{channel=\"{}\"}} {}",
                gauge.name,
                reading.channel,
                (gauge.value)(reading)
            );
        }
    }

    body
}

/// Latest reading of every channel, updated by each pass.
#[derive(Debug, Default, Clone)]
pub struct MetricsCache {
    readings: [Option<Reading>; CHANNEL_COUNT],
}

impl MetricsCache {
    pub fn update(&mut self, reading: &Reading) {
        self.readings[reading.channel.index()] = Some(*reading);
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.readings.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{calibration::Limits, channel::Channel};

    fn reading(channel: u8, resistance: f32) -> Reading {
        Reading {
            channel: Channel::new(channel).unwrap(),
            adc_raw: 2048.0,
            voltage: 1.6504,
            resistance,
            limits: Limits {
                dry: 5_000_000.0,
                wet: 20_000.0,
            },
            index: 50.0,
        }
    }

    #[test]
    fn one_gauge_line_per_metric_and_channel() {
        let body = render(&[reading(0, 100_000.0), reading(1, 250_000.0)]);

        assert_eq!(body.matches("# TYPE").count(), GAUGES.len());
        assert_eq!(body.lines().filter(|l| !l.starts_with('#')).count(), 2 * GAUGES.len());
        assert!(body.contains("hygrometer_resistance_ohms{channel=\"1\"} 250000.00\n"));
        assert!(body.contains("hygrometer_adc_raw{channel=\"0\"} 2048.0\n"));
        assert!(body.contains("hygrometer_voltage_volts{channel=\"0\"} 1.6504\n"));
        assert!(body.contains("hygrometer_dry_limit_ohms{channel=\"0\"} 5000000.00\n"));
        assert!(body.contains("hygrometer_wet_limit_ohms{channel=\"1\"} 20000.00\n"));
        assert!(body.contains("hygrometer_index_percent{channel=\"1\"} 50.00\n"));
    }

    #[test]
    fn cache_keeps_latest_per_channel() {
        let mut cache = MetricsCache::default();
        cache.update(&reading(3, 1.0));
        cache.update(&reading(3, 2.0));
        cache.update(&reading(1, 3.0));

        let readings = cache.readings();

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].channel.number(), 1);
        assert_eq!(readings[1].resistance, 2.0);
    }
}
