//! Owns the device state and drives it from the scheduler and from the
//! commands forwarded by the web server and the console.

use log::{info, warn};
use serde_json::json;

use crate::{
    calibration::CalibrationKind,
    configuration::key_value_store::KeyValueStore,
    device::{DeviceState, Hygrometer, Reading},
    display::{format_line, TextDisplay},
    metrics::{self, MetricsCache},
    post_data::PostData,
    publish::{publish_reading, Publisher},
    scheduler::{Clock, Scheduler, Task},
    sensors::sensor::ResistanceSource,
    template,
};

pub const DISPLAY_INTERVAL_MS: u64 = 5_000;

const HTML: &str = "text/html";
const JSON: &str = "application/json";

#[derive(Debug, Clone)]
pub enum Command {
    Calibrate(CalibrationKind),
    SaveConfig(PostData),
    SettingsPage,
    Metrics,
    Status,
}

impl Command {
    /// Console shortcuts: `D` calibrates dry, `W` calibrates wet.
    pub fn from_console_byte(byte: u8) -> Option<Self> {
        match byte {
            b'D' | b'd' => Some(Command::Calibrate(CalibrationKind::Dry)),
            b'W' | b'w' => Some(Command::Calibrate(CalibrationKind::Wet)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub content_type: &'static str,
    pub body: String,
}

pub struct Runtime<R: ResistanceSource, C: Clock> {
    hygrometer: Hygrometer<R>,
    scheduler: Scheduler,
    clock: C,
    store: Box<dyn KeyValueStore>,
    publisher: Box<dyn Publisher>,
    display: Box<dyn TextDisplay>,
    metrics: MetricsCache,
}

impl<R: ResistanceSource, C: Clock> Runtime<R, C> {
    pub fn new(
        source: R,
        clock: C,
        store: Box<dyn KeyValueStore>,
        publisher: Box<dyn Publisher>,
        display: Box<dyn TextDisplay>,
    ) -> Self {
        let state = DeviceState::load(store.as_ref());
        info!("Loaded configuration: {:?}", state.config);

        let mut scheduler = Scheduler::new();
        scheduler.add(Task::Scan, state.config.scan_interval.as_millis());
        scheduler.add(Task::Display, DISPLAY_INTERVAL_MS);

        Self {
            hygrometer: Hygrometer::new(source, state),
            scheduler,
            clock,
            store,
            publisher,
            display,
            metrics: MetricsCache::default(),
        }
    }

    pub fn state(&self) -> &DeviceState {
        self.hygrometer.state()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn metrics(&self) -> &MetricsCache {
        &self.metrics
    }

    /// Runs whatever the scheduler says is due.
    pub fn tick(&mut self) {
        for task in self.scheduler.poll(self.clock.now_ms()) {
            match task {
                Task::Scan => self.scan_task(),
                Task::Display => self.display_task(),
            }
        }
    }

    fn scan_task(&mut self) {
        let readings = self.hygrometer.scan();
        let config = &self.hygrometer.state().config;
        let publish = config.mqtt_enabled && self.publisher.is_connected();

        if config.mqtt_enabled && !publish {
            warn!("MQTT not connected, readings not published");
        }

        for reading in &readings {
            info!(
                "CH{}: raw={:.1} v={:.4} r={:.1} dry={:.1} wet={:.1} index={:.2}%",
                reading.channel,
                reading.adc_raw,
                reading.voltage,
                reading.resistance,
                reading.limits.dry,
                reading.limits.wet,
                reading.index
            );

            self.metrics.update(reading);
            if publish {
                publish_reading(self.publisher.as_mut(), reading);
            }
        }
    }

    fn display_task(&mut self) {
        if !self.hygrometer.state().config.display_enabled {
            return;
        }

        let readings = self.hygrometer.display_pass();
        for (row, reading) in (0u8..).zip(readings.iter()) {
            if let Err(e) = self.display.write_line(row, &format_line(reading)) {
                warn!("Display write failed: {:?}", e);
            }
        }
    }

    pub fn handle(&mut self, command: Command) -> Response {
        match command {
            Command::Calibrate(kind) => {
                let message = self.calibrate(kind);
                self.settings_page(Some(&message))
            }
            Command::SaveConfig(post_data) => {
                let message = self.save_config(&post_data);
                self.settings_page(Some(&message))
            }
            Command::SettingsPage => self.settings_page(None),
            Command::Metrics => {
                let readings = self.hygrometer.scan();
                for reading in &readings {
                    self.metrics.update(reading);
                }

                Response {
                    content_type: metrics::CONTENT_TYPE,
                    body: metrics::render(&readings),
                }
            }
            Command::Status => Response {
                content_type: JSON,
                body: self.status().to_string(),
            },
        }
    }

    /// Returns the message shown to the requester.
    pub fn calibrate(&mut self, kind: CalibrationKind) -> String {
        match self.hygrometer.calibrate(kind, self.store.as_mut()) {
            Ok(_) => format!("Calibrated {} for all channels", kind),
            Err(e) => {
                warn!("Unable to persist {} calibration: {:?}", kind, e);
                format!("Calibrated {} but could not save it: {}", kind, e)
            }
        }
    }

    /// Applies and persists a submitted settings form. Returns the message
    /// shown to the requester.
    pub fn save_config(&mut self, post_data: &PostData) -> String {
        let updated = match self.state().config.with_form(post_data) {
            Ok(updated) => updated,
            Err(e) => {
                warn!("Rejected configuration: {}", e);
                return e.to_string();
            }
        };

        self.scheduler
            .set_interval(Task::Scan, updated.scan_interval.as_millis());
        self.hygrometer.state_mut().apply_config(updated);

        match self.hygrometer.state().config.save(self.store.as_mut()) {
            Ok(()) => {
                info!("Configuration saved");
                "Configuration saved".to_string()
            }
            Err(e) => {
                warn!("Unable to persist configuration: {:?}", e);
                format!("Configuration applied but not saved: {}", e)
            }
        }
    }

    fn settings_page(&self, message: Option<&str>) -> Response {
        Response {
            content_type: HTML,
            body: template::to_html(&self.state().config, &self.metrics.readings(), message),
        }
    }

    fn status(&self) -> serde_json::Value {
        let state = self.state();
        let config = &state.config;

        json!({
            "config": {
                "mqtt_enabled": config.mqtt_enabled,
                "mqtt_server": config.mqtt_server,
                "mqtt_port": config.mqtt_port,
                "mqtt_connected": self.publisher.is_connected(),
                "display_enabled": config.display_enabled,
                "auto_refresh": config.auto_refresh,
                "interval_ms": config.scan_interval.as_millis(),
                "ref_channel": config.reference_channel.map(|c| c.number()),
                "global_wet": config.global_wet,
                "dry_calibrated": state.calibration.is_calibrated(CalibrationKind::Dry),
                "wet_calibrated": state.calibration.is_calibrated(CalibrationKind::Wet),
            },
            "readings": self.metrics.readings().iter().map(reading_to_json).collect::<Vec<_>>(),
        })
    }
}

fn reading_to_json(reading: &Reading) -> serde_json::Value {
    json!({
        "channel": reading.channel.number(),
        "adc_raw": reading.adc_raw,
        "voltage": reading.voltage,
        "resistance": reading.resistance,
        "dry": reading.limits.dry,
        "wet": reading.limits.wet,
        "index": reading.index,
    })
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        channel::{Channel, CHANNEL_COUNT},
        configuration::{key_value_store::MemoryStore, main_configuration::GlobalConfig},
        device::tests::FakeProbes,
        publish::tests::FakePublisher,
        scheduler::tests::ManualClock,
    };

    #[derive(Clone, Default)]
    struct FakeDisplay {
        lines: Rc<RefCell<Vec<(u8, String)>>>,
    }

    impl TextDisplay for FakeDisplay {
        fn write_line(&mut self, row: u8, text: &str) -> anyhow::Result<()> {
            self.lines.borrow_mut().push((row, text.to_string()));
            Ok(())
        }
    }

    struct Harness {
        runtime: Runtime<FakeProbes, ManualClock>,
        probes: FakeProbes,
        clock: ManualClock,
        publisher: FakePublisher,
        display: FakeDisplay,
    }

    fn harness_with(store: MemoryStore) -> Harness {
        let probes = FakeProbes::new([100_000.0; CHANNEL_COUNT]);
        let clock = ManualClock::default();
        let publisher = FakePublisher::default();
        *publisher.connected.borrow_mut() = true;
        let display = FakeDisplay::default();

        let runtime = Runtime::new(
            probes.clone(),
            clock.clone(),
            Box::new(store),
            Box::new(publisher.clone()),
            Box::new(display.clone()),
        );

        Harness {
            runtime,
            probes,
            clock,
            publisher,
            display,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryStore::new())
    }

    fn store_with(config: GlobalConfig) -> MemoryStore {
        let mut store = MemoryStore::new();
        config.save(&mut store).unwrap();
        store
    }

    #[test]
    fn console_bytes() {
        assert!(matches!(
            Command::from_console_byte(b'd'),
            Some(Command::Calibrate(CalibrationKind::Dry))
        ));
        assert!(matches!(
            Command::from_console_byte(b'W'),
            Some(Command::Calibrate(CalibrationKind::Wet))
        ));
        assert!(Command::from_console_byte(b'x').is_none());
        assert!(Command::from_console_byte(b'\n').is_none());
    }

    #[test]
    fn first_tick_scans_publishes_and_displays() {
        let mut h = harness();

        h.runtime.tick();

        let sent = h.publisher.sent.borrow();
        assert_eq!(sent.len(), 2 * CHANNEL_COUNT);
        assert_eq!(sent[0], ("hygrometer/channel0/state".into(), "70.85".into()));
        assert_eq!(
            sent[1],
            ("hygrometer/channel0/resistance".into(), "100000.0".into())
        );
        assert_eq!(h.runtime.metrics().readings().len(), CHANNEL_COUNT);

        let lines = h.display.lines.borrow();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, 0);
        assert!(lines[0].1.starts_with("CH0"));
        assert_eq!(lines[1].0, 1);
        assert!(lines[1].1.starts_with("CH1"));
    }

    #[test]
    fn publishing_skipped_while_disconnected() {
        let mut h = harness();
        *h.publisher.connected.borrow_mut() = false;

        h.runtime.tick();

        assert!(h.publisher.sent.borrow().is_empty());
        assert_eq!(h.runtime.metrics().readings().len(), CHANNEL_COUNT);

        *h.publisher.connected.borrow_mut() = true;
        h.clock.advance(10_000);
        h.runtime.tick();

        assert_eq!(h.publisher.sent.borrow().len(), 2 * CHANNEL_COUNT);
    }

    #[test]
    fn publishing_skipped_when_mqtt_disabled() {
        let mut h = harness_with(store_with(GlobalConfig {
            mqtt_enabled: false,
            ..Default::default()
        }));

        h.runtime.tick();

        assert!(h.publisher.sent.borrow().is_empty());
    }

    #[test]
    fn display_disabled_writes_nothing() {
        let mut h = harness_with(store_with(GlobalConfig {
            display_enabled: false,
            ..Default::default()
        }));

        h.runtime.tick();

        assert!(h.display.lines.borrow().is_empty());
        assert_eq!(*h.probes.sampled.borrow(), (0..8).collect::<Vec<u8>>());
    }

    #[test]
    fn display_rotates_every_five_seconds() {
        let mut h = harness();
        h.runtime.tick();

        h.clock.advance(4_999);
        h.runtime.tick();
        assert_eq!(h.display.lines.borrow().len(), 2);

        h.clock.advance(1);
        h.runtime.tick();

        let lines = h.display.lines.borrow();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].1.starts_with("CH2"));
        assert!(lines[3].1.starts_with("CH3"));
        // only the display ran, no second scan yet
        assert_eq!(h.publisher.sent.borrow().len(), 2 * CHANNEL_COUNT);
    }

    #[test]
    fn save_updates_interval_and_persists() {
        let mut h = harness();
        h.runtime.tick();

        let response = h.runtime.handle(Command::SaveConfig(PostData::from_string(
            "mqtt_server=10.0.0.2&mqtt_port=1883&mqtt_enabled=on&display_enabled=on\
             &interval=1&interval_unit=min&ref_channel=none&global_wet=0"
                .into(),
        )));

        assert_eq!(response.content_type, "text/html");
        assert!(response.body.contains("Configuration saved"));
        assert_eq!(h.runtime.scheduler().interval(Task::Scan), Some(60_000));
        assert_eq!(GlobalConfig::load(h.runtime.store()).mqtt_server, "10.0.0.2");
        assert_eq!(h.runtime.state().config.mqtt_server, "10.0.0.2");

        h.clock.advance(10_000);
        h.runtime.tick();
        assert_eq!(h.publisher.sent.borrow().len(), 2 * CHANNEL_COUNT);

        h.clock.advance(50_000);
        h.runtime.tick();
        assert_eq!(h.publisher.sent.borrow().len(), 4 * CHANNEL_COUNT);
    }

    #[test]
    fn invalid_save_leaves_config_untouched() {
        let mut h = harness();

        let response = h.runtime.handle(Command::SaveConfig(PostData::from_string(
            "mqtt_server=other&mqtt_port=notaport&interval=5&interval_unit=s".into(),
        )));

        assert!(response.body.contains("Invalid MQTT port"));
        assert_eq!(h.runtime.state().config, GlobalConfig::default());
        assert_eq!(h.runtime.scheduler().interval(Task::Scan), Some(10_000));
    }

    #[test]
    fn calibrate_command_updates_limits() {
        let mut h = harness();
        h.probes.resistances.borrow_mut()[3] = 800_000.0;

        let response = h.runtime.handle(Command::Calibrate(CalibrationKind::Dry));

        assert!(response.body.contains("Calibrated dry for all channels"));
        let channel = Channel::new(3).unwrap();
        assert_eq!(h.runtime.state().effective_limits(channel).dry, 800_000.0);
        assert_eq!(h.runtime.store().read_float("dry_3", 0.0), 800_000.0);
    }

    #[test]
    fn metrics_runs_a_fresh_scan() {
        let mut h = harness();

        let response = h.runtime.handle(Command::Metrics);

        assert_eq!(response.content_type, metrics::CONTENT_TYPE);
        assert!(response
            .body
            .contains("hygrometer_resistance_ohms{channel=\"7\"} 100000.00"));
        assert_eq!(h.probes.sampled.borrow().len(), CHANNEL_COUNT);
        assert!(h.publisher.sent.borrow().is_empty());
    }

    #[test]
    fn status_is_json() {
        let mut h = harness();
        h.runtime.tick();

        let response = h.runtime.handle(Command::Status);
        let status: serde_json::Value = serde_json::from_str(&response.body).unwrap();

        assert_eq!(response.content_type, "application/json");
        assert_eq!(status["config"]["interval_ms"], 10_000);
        assert_eq!(status["config"]["ref_channel"], serde_json::Value::Null);
        assert_eq!(status["config"]["mqtt_connected"], true);
        assert_eq!(status["readings"].as_array().unwrap().len(), CHANNEL_COUNT);
        assert_eq!(status["readings"][2]["channel"], 2);
    }
}
