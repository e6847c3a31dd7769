use std::str::FromStr;

use super::key_value_store::KeyValueStore;
use crate::{channel::Channel, post_data::PostData, string_error::StringError};

pub const KEY_MQTT_SERVER: &str = "mqttServer";
pub const KEY_MQTT_PORT: &str = "mqttPort";
pub const KEY_MQTT_USER: &str = "mqttUser";
pub const KEY_MQTT_PASS: &str = "mqttPass";
pub const KEY_MQTT_ENABLED: &str = "mqttEnabled";
pub const KEY_DISPLAY_ENABLED: &str = "displayEnabled";
pub const KEY_AUTO_REFRESH: &str = "autoRefresh";
pub const KEY_INTERVAL_VALUE: &str = "intervalValue";
pub const KEY_INTERVAL_UNIT: &str = "intervalUnit";
pub const KEY_REF_CHANNEL: &str = "refChannel";
pub const KEY_GLOBAL_WET: &str = "globalWet";

const DEFAULT_MQTT_SERVER: &str = "192.168.1.10";
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_INTERVAL_SECS: u32 = 10;

const NO_REF_CHANNEL: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Seconds,
    Minutes,
}

impl IntervalUnit {
    pub fn form_value(self) -> &'static str {
        match self {
            IntervalUnit::Seconds => "s",
            IntervalUnit::Minutes => "min",
        }
    }

    fn millis(self) -> u64 {
        match self {
            IntervalUnit::Seconds => 1_000,
            IntervalUnit::Minutes => 60_000,
        }
    }

    fn to_stored(self) -> u32 {
        match self {
            IntervalUnit::Seconds => 0,
            IntervalUnit::Minutes => 1,
        }
    }

    fn from_stored(value: u32) -> Self {
        match value {
            1 => IntervalUnit::Minutes,
            _ => IntervalUnit::Seconds,
        }
    }
}

impl FromStr for IntervalUnit {
    type Err = StringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "s" | "sec" | "seconds" => Ok(IntervalUnit::Seconds),
            "min" | "minutes" => Ok(IntervalUnit::Minutes),
            _ => Err(StringError("Unknown interval unit")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanInterval {
    pub value: u32,
    pub unit: IntervalUnit,
}

impl ScanInterval {
    pub fn new(value: u32, unit: IntervalUnit) -> Self {
        Self {
            value: value.max(1),
            unit,
        }
    }

    pub fn as_millis(&self) -> u64 {
        self.value as u64 * self.unit.millis()
    }
}

impl Default for ScanInterval {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_SECS, IntervalUnit::Seconds)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalConfig {
    pub mqtt_server: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_password: String,
    pub mqtt_enabled: bool,
    pub display_enabled: bool,
    pub auto_refresh: bool,
    pub scan_interval: ScanInterval,
    /// Channel whose live reading replaces every other channel's dry baseline.
    pub reference_channel: Option<Channel>,
    /// Wet limit shared by all channels.
    pub global_wet: Option<f32>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            mqtt_server: DEFAULT_MQTT_SERVER.to_string(),
            mqtt_port: DEFAULT_MQTT_PORT,
            mqtt_user: String::new(),
            mqtt_password: String::new(),
            mqtt_enabled: true,
            display_enabled: true,
            auto_refresh: false,
            scan_interval: ScanInterval::default(),
            reference_channel: None,
            global_wet: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    MqttServer,
    MqttPort,
    MqttUser,
    MqttPassword,
    MqttEnabled,
    DisplayEnabled,
    AutoRefresh,
    IntervalValue,
    IntervalUnit,
    ReferenceChannel,
    GlobalWet,
}

impl ConfigField {
    pub fn is_checkbox(self) -> bool {
        matches!(
            self,
            ConfigField::MqttEnabled | ConfigField::DisplayEnabled | ConfigField::AutoRefresh
        )
    }
}

#[derive(Debug)]
pub struct MapFormElement {
    pub nvs_key: &'static str,
    pub form_name: &'static str,
    pub template_id: &'static str,
    pub field: ConfigField,
}

pub const MAP_NVS_FORM: &[MapFormElement] = &[
    MapFormElement {
        nvs_key: KEY_MQTT_SERVER,
        form_name: "mqtt_server",
        template_id: "{MQTT_SERVER}",
        field: ConfigField::MqttServer,
    },
    MapFormElement {
        nvs_key: KEY_MQTT_PORT,
        form_name: "mqtt_port",
        template_id: "{MQTT_PORT}",
        field: ConfigField::MqttPort,
    },
    MapFormElement {
        nvs_key: KEY_MQTT_USER,
        form_name: "mqtt_user",
        template_id: "{MQTT_USER}",
        field: ConfigField::MqttUser,
    },
    MapFormElement {
        nvs_key: KEY_MQTT_PASS,
        form_name: "mqtt_pass",
        template_id: "{MQTT_PASS}",
        field: ConfigField::MqttPassword,
    },
    MapFormElement {
        nvs_key: KEY_MQTT_ENABLED,
        form_name: "mqtt_enabled",
        template_id: "{MQTT_ENABLED}",
        field: ConfigField::MqttEnabled,
    },
    MapFormElement {
        nvs_key: KEY_DISPLAY_ENABLED,
        form_name: "display_enabled",
        template_id: "{DISPLAY_ENABLED}",
        field: ConfigField::DisplayEnabled,
    },
    MapFormElement {
        nvs_key: KEY_AUTO_REFRESH,
        form_name: "auto_refresh",
        template_id: "{AUTO_REFRESH}",
        field: ConfigField::AutoRefresh,
    },
    MapFormElement {
        nvs_key: KEY_INTERVAL_VALUE,
        form_name: "interval",
        template_id: "{INTERVAL}",
        field: ConfigField::IntervalValue,
    },
    MapFormElement {
        nvs_key: KEY_INTERVAL_UNIT,
        form_name: "interval_unit",
        template_id: "{INTERVAL_UNIT_OPTIONS}",
        field: ConfigField::IntervalUnit,
    },
    MapFormElement {
        nvs_key: KEY_REF_CHANNEL,
        form_name: "ref_channel",
        template_id: "{REF_CHANNEL_OPTIONS}",
        field: ConfigField::ReferenceChannel,
    },
    MapFormElement {
        nvs_key: KEY_GLOBAL_WET,
        form_name: "global_wet",
        template_id: "{GLOBAL_WET}",
        field: ConfigField::GlobalWet,
    },
];

const MAX_SERVER_LEN: usize = 64;
const MAX_CREDENTIAL_LEN: usize = 32;

fn parse<T: FromStr>(raw: &str, error: &'static str) -> Result<T, StringError> {
    raw.trim().parse::<T>().map_err(|_| StringError(error))
}

fn positive(value: f32) -> Option<f32> {
    (value.is_finite() && value > 0.0).then_some(value)
}

impl GlobalConfig {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::default();

        let reference_channel = match store.read_i32(KEY_REF_CHANNEL, NO_REF_CHANNEL) {
            n if n >= 0 => u8::try_from(n).ok().and_then(Channel::new),
            _ => None,
        };

        Self {
            mqtt_server: store.read_string(KEY_MQTT_SERVER, &defaults.mqtt_server),
            mqtt_port: u16::try_from(store.read_u32(KEY_MQTT_PORT, defaults.mqtt_port as u32))
                .unwrap_or(DEFAULT_MQTT_PORT),
            mqtt_user: store.read_string(KEY_MQTT_USER, ""),
            mqtt_password: store.read_string(KEY_MQTT_PASS, ""),
            mqtt_enabled: store.read_bool(KEY_MQTT_ENABLED, defaults.mqtt_enabled),
            display_enabled: store.read_bool(KEY_DISPLAY_ENABLED, defaults.display_enabled),
            auto_refresh: store.read_bool(KEY_AUTO_REFRESH, defaults.auto_refresh),
            scan_interval: ScanInterval::new(
                store.read_u32(KEY_INTERVAL_VALUE, defaults.scan_interval.value),
                IntervalUnit::from_stored(
                    store.read_u32(KEY_INTERVAL_UNIT, defaults.scan_interval.unit.to_stored()),
                ),
            ),
            reference_channel,
            global_wet: positive(store.read_float(KEY_GLOBAL_WET, 0.0)),
        }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> anyhow::Result<()> {
        store.store_string(KEY_MQTT_SERVER, &self.mqtt_server, MAX_SERVER_LEN)?;
        store.store_u32(KEY_MQTT_PORT, self.mqtt_port as u32)?;
        store.store_string(KEY_MQTT_USER, &self.mqtt_user, MAX_CREDENTIAL_LEN)?;
        store.store_string(KEY_MQTT_PASS, &self.mqtt_password, MAX_CREDENTIAL_LEN)?;
        store.store_bool(KEY_MQTT_ENABLED, self.mqtt_enabled)?;
        store.store_bool(KEY_DISPLAY_ENABLED, self.display_enabled)?;
        store.store_bool(KEY_AUTO_REFRESH, self.auto_refresh)?;
        store.store_u32(KEY_INTERVAL_VALUE, self.scan_interval.value)?;
        store.store_u32(KEY_INTERVAL_UNIT, self.scan_interval.unit.to_stored())?;
        store.store_i32(
            KEY_REF_CHANNEL,
            self.reference_channel
                .map_or(NO_REF_CHANNEL, |c| c.number() as i32),
        )?;
        store.store_float(KEY_GLOBAL_WET, self.global_wet.unwrap_or(0.0))?;
        Ok(())
    }

    /// Current value as shown in the settings form.
    pub fn form_value(&self, field: ConfigField) -> String {
        let checkbox = |on: bool| if on { "checked" } else { "" }.to_string();

        match field {
            ConfigField::MqttServer => self.mqtt_server.clone(),
            ConfigField::MqttPort => self.mqtt_port.to_string(),
            ConfigField::MqttUser => self.mqtt_user.clone(),
            ConfigField::MqttPassword => self.mqtt_password.clone(),
            ConfigField::MqttEnabled => checkbox(self.mqtt_enabled),
            ConfigField::DisplayEnabled => checkbox(self.display_enabled),
            ConfigField::AutoRefresh => checkbox(self.auto_refresh),
            ConfigField::IntervalValue => self.scan_interval.value.to_string(),
            ConfigField::IntervalUnit => self.scan_interval.unit.form_value().to_string(),
            ConfigField::ReferenceChannel => self
                .reference_channel
                .map_or("none".to_string(), |c| c.to_string()),
            ConfigField::GlobalWet => self
                .global_wet
                .map_or("0".to_string(), |w| format!("{w}")),
        }
    }

    /// Applies one submitted form value. `None` means the field was absent,
    /// which only matters for checkboxes.
    fn set_form_value(&mut self, field: ConfigField, raw: Option<&str>) -> Result<(), StringError> {
        if field.is_checkbox() {
            let on = matches!(raw.map(str::trim), Some("on" | "1" | "true"));
            match field {
                ConfigField::MqttEnabled => self.mqtt_enabled = on,
                ConfigField::DisplayEnabled => self.display_enabled = on,
                _ => self.auto_refresh = on,
            }
            return Ok(());
        }

        let Some(raw) = raw else {
            return Ok(());
        };

        match field {
            ConfigField::MqttServer => self.mqtt_server = raw.trim().to_string(),
            ConfigField::MqttPort => self.mqtt_port = parse(raw, "Invalid MQTT port")?,
            ConfigField::MqttUser => self.mqtt_user = raw.to_string(),
            ConfigField::MqttPassword => self.mqtt_password = raw.to_string(),
            ConfigField::IntervalValue => {
                let value: u32 = parse(raw, "Invalid scan interval")?;
                self.scan_interval = ScanInterval::new(value, self.scan_interval.unit);
            }
            ConfigField::IntervalUnit => {
                self.scan_interval = ScanInterval::new(self.scan_interval.value, raw.parse()?);
            }
            ConfigField::ReferenceChannel => {
                self.reference_channel = match raw.trim() {
                    "" | "none" | "-1" => None,
                    n => Some(
                        parse::<u8>(n, "Invalid reference channel")
                            .ok()
                            .and_then(Channel::new)
                            .ok_or(StringError("Invalid reference channel"))?,
                    ),
                }
            }
            ConfigField::GlobalWet => {
                self.global_wet = match raw.trim() {
                    "" => None,
                    n => positive(parse(n, "Invalid global wet limit")?),
                }
            }
            ConfigField::MqttEnabled | ConfigField::DisplayEnabled | ConfigField::AutoRefresh => {}
        }

        Ok(())
    }

    /// Returns the configuration with the submitted form applied. Nothing is
    /// changed when any field is invalid.
    pub fn with_form(&self, post_data: &PostData) -> Result<Self, StringError> {
        let mut updated = self.clone();

        for elem in MAP_NVS_FORM {
            updated.set_form_value(elem.field, post_data.read_value(elem.form_name).as_deref())?;
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::key_value_store::MemoryStore;

    #[test]
    fn defaults_when_store_is_empty() {
        let config = GlobalConfig::load(&MemoryStore::new());

        assert_eq!(config, GlobalConfig::default());
        assert_eq!(config.scan_interval.as_millis(), 10_000);
        assert!(config.reference_channel.is_none());
        assert!(config.global_wet.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = MemoryStore::new();
        let config = GlobalConfig {
            mqtt_server: "broker.lan".into(),
            mqtt_port: 8883,
            mqtt_user: "hygro".into(),
            mqtt_password: "secret".into(),
            mqtt_enabled: false,
            display_enabled: false,
            auto_refresh: true,
            scan_interval: ScanInterval::new(2, IntervalUnit::Minutes),
            reference_channel: Channel::new(7),
            global_wet: Some(15_000.0),
        };

        config.save(&mut store).unwrap();

        assert_eq!(GlobalConfig::load(&store), config);
    }

    #[test]
    fn form_applies_every_field() {
        let post = PostData::from_string(
            "mqtt_server=10.0.0.2&mqtt_port=1884&mqtt_user=u&mqtt_pass=p\
             &display_enabled=on&interval=3&interval_unit=min&ref_channel=2&global_wet=12000"
                .into(),
        );

        let config = GlobalConfig::default().with_form(&post).unwrap();

        assert_eq!(config.mqtt_server, "10.0.0.2");
        assert_eq!(config.mqtt_port, 1884);
        assert_eq!(config.mqtt_user, "u");
        assert_eq!(config.mqtt_password, "p");
        assert!(!config.mqtt_enabled);
        assert!(config.display_enabled);
        assert!(!config.auto_refresh);
        assert_eq!(config.scan_interval.as_millis(), 180_000);
        assert_eq!(config.reference_channel, Channel::new(2));
        assert_eq!(config.global_wet, Some(12_000.0));
    }

    #[test]
    fn zero_or_none_disables_optional_fields() {
        let config = GlobalConfig {
            reference_channel: Channel::new(1),
            global_wet: Some(1.0),
            ..Default::default()
        };
        let post = PostData::from_string("ref_channel=none&global_wet=0".into());

        let config = config.with_form(&post).unwrap();

        assert!(config.reference_channel.is_none());
        assert!(config.global_wet.is_none());
    }

    #[test]
    fn invalid_value_rejects_whole_form() {
        let post = PostData::from_string("mqtt_server=new&mqtt_port=abc".into());

        assert_eq!(
            GlobalConfig::default().with_form(&post),
            Err(StringError("Invalid MQTT port"))
        );
        assert!(GlobalConfig::default()
            .with_form(&PostData::from_string("ref_channel=8".into()))
            .is_err());
    }

    #[test]
    fn zero_interval_is_coerced_to_one() {
        let post = PostData::from_string("interval=0&interval_unit=s".into());
        let config = GlobalConfig::default().with_form(&post).unwrap();

        assert_eq!(config.scan_interval.as_millis(), 1_000);
    }
}
