use log::info;

use crate::{
    calibration::{CalibrationKind, CalibrationStore, Limits},
    channel::{Channel, CHANNEL_COUNT},
    configuration::{key_value_store::KeyValueStore, main_configuration::GlobalConfig},
    moisture_index::compute_index,
    sensors::sensor::ResistanceSource,
};

/// The display shows two channels per batch.
pub const DISPLAY_BATCHES: u8 = (CHANNEL_COUNT / 2) as u8;

const CHANNEL_GAP_MS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub channel: Channel,
    pub adc_raw: f32,
    pub voltage: f32,
    pub resistance: f32,
    pub limits: Limits,
    pub index: f32,
}

/// Everything the device remembers between two loop iterations.
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    pub config: GlobalConfig,
    pub calibration: CalibrationStore,
    reference_live: Option<f32>,
    display_batch: u8,
}

impl DeviceState {
    pub fn new(config: GlobalConfig, calibration: CalibrationStore) -> Self {
        Self {
            config,
            calibration,
            reference_live: None,
            display_batch: 0,
        }
    }

    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self::new(GlobalConfig::load(store), CalibrationStore::load(store))
    }

    /// Reference reading cached for the current pass.
    pub fn reference_live(&self) -> Option<f32> {
        self.reference_live
    }

    /// Replaces the configuration. The cached reference reading is dropped
    /// when the reference channel changes.
    pub fn apply_config(&mut self, config: GlobalConfig) {
        if config.reference_channel != self.config.reference_channel {
            self.reference_live = None;
        }
        self.config = config;
    }

    pub fn effective_limits(&self, channel: Channel) -> Limits {
        self.calibration
            .effective_limits(channel, &self.config, self.reference_live)
    }

    pub fn compute_index(&self, resistance: f32, channel: Channel) -> f32 {
        compute_index(resistance, self.effective_limits(channel))
    }
}

/// Sampling front-end bound to the device state.
pub struct Hygrometer<R: ResistanceSource> {
    source: R,
    state: DeviceState,
}

impl<R: ResistanceSource> Hygrometer<R> {
    pub fn new(source: R, state: DeviceState) -> Self {
        Self { source, state }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    fn refresh_reference(&mut self) {
        let reference = self.state.config.reference_channel;
        self.state.reference_live = reference.map(|channel| self.source.sample(channel).resistance);
    }

    fn read(&mut self, channel: Channel) -> Reading {
        let sample = self.source.sample(channel);
        let limits = self.state.effective_limits(channel);

        Reading {
            channel,
            adc_raw: sample.adc_raw,
            voltage: sample.voltage,
            resistance: sample.resistance,
            limits,
            index: compute_index(sample.resistance, limits),
        }
    }

    /// Full pass over every channel in ascending order.
    pub fn scan(&mut self) -> Vec<Reading> {
        self.refresh_reference();

        let mut readings = Vec::with_capacity(CHANNEL_COUNT);
        for channel in Channel::all() {
            if !readings.is_empty() {
                self.source.pause_ms(CHANNEL_GAP_MS);
            }
            readings.push(self.read(channel));
        }

        readings
    }

    /// Reads the two channels of the current display batch and moves on to
    /// the next batch. Reuses the reference reading of the last scan.
    pub fn display_pass(&mut self) -> Vec<Reading> {
        if self.state.reference_live.is_none() {
            self.refresh_reference();
        }

        let first = self.state.display_batch as usize * 2;
        let mut readings = Vec::with_capacity(2);
        for channel in Channel::all().skip(first).take(2) {
            readings.push(self.read(channel));
        }

        self.state.display_batch = (self.state.display_batch + 1) % DISPLAY_BATCHES;
        readings
    }

    /// Captures a baseline for every channel, then persists the whole batch.
    /// The in-memory baselines stay updated when persisting fails.
    pub fn calibrate(
        &mut self,
        kind: CalibrationKind,
        store: &mut dyn KeyValueStore,
    ) -> anyhow::Result<[f32; CHANNEL_COUNT]> {
        let mut captured = [0.0; CHANNEL_COUNT];
        for channel in Channel::all() {
            captured[channel.index()] = self.source.sample(channel).resistance;
        }

        self.state.calibration.set_all(kind, &captured);
        info!("Captured {} baseline: {:?}", kind, captured);

        self.state.calibration.save(kind, store)?;
        info!("Saved {} baseline", kind);

        Ok(captured)
    }
}
