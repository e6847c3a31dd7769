//! Per-channel dry/wet baselines and the resolution of the limits actually
//! used to compute a moisture index.

use std::fmt;

use crate::{
    channel::{Channel, CHANNEL_COUNT},
    configuration::{key_value_store::KeyValueStore, main_configuration::GlobalConfig},
};

/// Dry limit used until a dry baseline has been captured.
pub const DEFAULT_DRY_OHMS: f32 = 5_000_000.0;
/// Wet limit used until a wet baseline has been captured.
pub const DEFAULT_WET_OHMS: f32 = 20_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationKind {
    Dry,
    Wet,
}

impl CalibrationKind {
    fn key(self, channel: Channel) -> String {
        match self {
            CalibrationKind::Dry => format!("dry_{}", channel),
            CalibrationKind::Wet => format!("wet_{}", channel),
        }
    }

    fn flag_key(self) -> &'static str {
        match self {
            CalibrationKind::Dry => "hasDry",
            CalibrationKind::Wet => "hasWet",
        }
    }
}

impl fmt::Display for CalibrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationKind::Dry => f.write_str("dry"),
            CalibrationKind::Wet => f.write_str("wet"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub dry: f32,
    pub wet: f32,
}

fn usable(resistance: f32) -> Option<f32> {
    (resistance.is_finite() && resistance > 0.0).then_some(resistance)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationStore {
    dry: [Option<f32>; CHANNEL_COUNT],
    wet: [Option<f32>; CHANNEL_COUNT],
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn baselines(&self, kind: CalibrationKind) -> &[Option<f32>; CHANNEL_COUNT] {
        match kind {
            CalibrationKind::Dry => &self.dry,
            CalibrationKind::Wet => &self.wet,
        }
    }

    fn baselines_mut(&mut self, kind: CalibrationKind) -> &mut [Option<f32>; CHANNEL_COUNT] {
        match kind {
            CalibrationKind::Dry => &mut self.dry,
            CalibrationKind::Wet => &mut self.wet,
        }
    }

    /// Stored baseline, `None` while unset.
    pub fn baseline(&self, kind: CalibrationKind, channel: Channel) -> Option<f32> {
        self.baselines(kind)[channel.index()]
    }

    /// A non-positive resistance clears the baseline.
    pub fn set_baseline(&mut self, kind: CalibrationKind, channel: Channel, resistance: f32) {
        self.baselines_mut(kind)[channel.index()] = usable(resistance);
    }

    pub fn set_dry_baseline(&mut self, channel: Channel, resistance: f32) {
        self.set_baseline(CalibrationKind::Dry, channel, resistance);
    }

    pub fn set_wet_baseline(&mut self, channel: Channel, resistance: f32) {
        self.set_baseline(CalibrationKind::Wet, channel, resistance);
    }

    /// Replaces the baselines of every channel at once.
    pub fn set_all(&mut self, kind: CalibrationKind, resistances: &[f32; CHANNEL_COUNT]) {
        let baselines = self.baselines_mut(kind);
        for (baseline, &resistance) in baselines.iter_mut().zip(resistances) {
            *baseline = usable(resistance);
        }
    }

    pub fn is_calibrated(&self, kind: CalibrationKind) -> bool {
        self.baselines(kind).iter().any(Option::is_some)
    }

    /// Resolves the limits for `channel`:
    /// - dry is the live reading of the reference channel when one is
    ///   configured, differs from `channel` and reads positive, else the
    ///   stored dry baseline;
    /// - wet is the global wet limit when set, else the stored wet baseline;
    /// - anything still unset falls back to the defaults.
    pub fn effective_limits(
        &self,
        channel: Channel,
        config: &GlobalConfig,
        live_reference: Option<f32>,
    ) -> Limits {
        let reference = config
            .reference_channel
            .filter(|&reference| reference != channel)
            .and(live_reference)
            .and_then(usable);

        let dry = reference.or(self.dry[channel.index()]);
        let wet = config
            .global_wet
            .and_then(usable)
            .or(self.wet[channel.index()]);

        Limits {
            dry: dry.unwrap_or(DEFAULT_DRY_OHMS),
            wet: wet.unwrap_or(DEFAULT_WET_OHMS),
        }
    }

    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut calibration = Self::new();

        for kind in [CalibrationKind::Dry, CalibrationKind::Wet] {
            if !store.read_bool(kind.flag_key(), false) {
                continue;
            }

            for channel in Channel::all() {
                let resistance = store.read_float(&kind.key(channel), 0.0);
                calibration.set_baseline(kind, channel, resistance);
            }
        }

        calibration
    }

    /// Writes every baseline of `kind`. The `has*` flag is cleared first and
    /// only set again once all channels are written, so an interrupted save
    /// never loads as a mix of old and new baselines.
    pub fn save(&self, kind: CalibrationKind, store: &mut dyn KeyValueStore) -> anyhow::Result<()> {
        store.store_bool(kind.flag_key(), false)?;

        for channel in Channel::all() {
            let resistance = self.baseline(kind, channel).unwrap_or(0.0);
            store.store_float(&kind.key(channel), resistance)?;
        }

        store.store_bool(kind.flag_key(), true)
    }
}
