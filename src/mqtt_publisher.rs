use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use embedded_svc::mqtt::client::EventPayload;
use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration, QoS};
use log::{info, warn};

use crate::{
    configuration::main_configuration::GlobalConfig, publish::Publisher,
    string_error::StringEspError,
};

const CLIENT_ID: &str = "esp-mux-hygrometer";

/// Broker connection owned by esp-idf. The poll thread only tracks whether
/// the session is up.
pub struct MqttPublisher {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
}

impl MqttPublisher {
    pub fn new(config: &GlobalConfig) -> anyhow::Result<Self> {
        let url = format!("mqtt://{}:{}", config.mqtt_server, config.mqtt_port);

        let conf = MqttClientConfiguration {
            client_id: Some(CLIENT_ID),
            username: (!config.mqtt_user.is_empty()).then_some(config.mqtt_user.as_str()),
            password: (!config.mqtt_password.is_empty()).then_some(config.mqtt_password.as_str()),
            ..Default::default()
        };

        info!("Connecting to MQTT broker {}", url);
        let (client, mut connection) = EspMqttClient::new(&url, &conf)?;

        let connected = Arc::new(AtomicBool::new(false));
        let flag = connected.clone();

        thread::Builder::new()
            .name("mqtt-poll".to_string())
            .stack_size(6144)
            .spawn(move || {
                while let Ok(event) = connection.next() {
                    match event.payload() {
                        EventPayload::Connected(_) => {
                            info!("MQTT connected");
                            flag.store(true, Ordering::Relaxed);
                        }
                        EventPayload::Disconnected => {
                            warn!("MQTT disconnected");
                            flag.store(false, Ordering::Relaxed);
                        }
                        EventPayload::Error(e) => warn!("MQTT error: {:?}", e),
                        _ => (),
                    }
                }

                flag.store(false, Ordering::Relaxed);
                info!("MQTT connection closed");
            })?;

        Ok(Self { client, connected })
    }
}

impl Publisher for MqttPublisher {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn publish(&mut self, topic: &str, payload: &str) -> anyhow::Result<()> {
        self.client
            .enqueue(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .map_err(|e| StringEspError("MQTT publish failed", e))?;
        Ok(())
    }
}
