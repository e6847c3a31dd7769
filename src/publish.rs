//! MQTT projection of a reading, decoupled from a specific client.

use log::{info, warn};

use crate::{channel::Channel, device::Reading};

pub const TOPIC_PREFIX: &str = "hygrometer";

/// Fire-and-forget publishing. Delivery is not confirmed.
pub trait Publisher {
    fn is_connected(&self) -> bool;
    fn publish(&mut self, topic: &str, payload: &str) -> anyhow::Result<()>;
}

/// Log-only publisher for boards running without a broker.
pub struct LoggerPublisher;

impl Publisher for LoggerPublisher {
    fn is_connected(&self) -> bool {
        true
    }

    fn publish(&mut self, topic: &str, payload: &str) -> anyhow::Result<()> {
        info!("mqtt(LOG): {} <- {}", topic, payload);
        Ok(())
    }
}

pub fn state_topic(channel: Channel) -> String {
    format!("{}/channel{}/state", TOPIC_PREFIX, channel)
}

pub fn resistance_topic(channel: Channel) -> String {
    format!("{}/channel{}/resistance", TOPIC_PREFIX, channel)
}

/// `(topic, payload)` pairs published for one reading.
pub fn messages(reading: &Reading) -> [(String, String); 2] {
    [
        (state_topic(reading.channel), format!("{:.2}", reading.index)),
        (
            resistance_topic(reading.channel),
            format!("{:.1}", reading.resistance),
        ),
    ]
}

/// Publishes one reading. Failures are logged and the reading is dropped.
pub fn publish_reading(publisher: &mut dyn Publisher, reading: &Reading) {
    for (topic, payload) in messages(reading) {
        if let Err(e) = publisher.publish(&topic, &payload) {
            warn!("failed to publish {}: {:?}", topic, e);
            return;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::calibration::Limits;

    #[derive(Clone, Default)]
    pub(crate) struct FakePublisher {
        pub connected: Rc<RefCell<bool>>,
        pub fail: Rc<RefCell<bool>>,
        pub sent: Rc<RefCell<Vec<(String, String)>>>,
    }

    impl Publisher for FakePublisher {
        fn is_connected(&self) -> bool {
            *self.connected.borrow()
        }

        fn publish(&mut self, topic: &str, payload: &str) -> anyhow::Result<()> {
            if *self.fail.borrow() {
                anyhow::bail!("broker went away");
            }
            self.sent
                .borrow_mut()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    fn reading() -> Reading {
        Reading {
            channel: Channel::new(4).unwrap(),
            adc_raw: 2048.0,
            voltage: 1.65,
            resistance: 99_951.17,
            limits: Limits {
                dry: 5e6,
                wet: 2e4,
            },
            index: 70.8612,
        }
    }

    #[test]
    fn topics_and_payloads() {
        let [state, resistance] = messages(&reading());

        assert_eq!(state, ("hygrometer/channel4/state".into(), "70.86".into()));
        assert_eq!(
            resistance,
            ("hygrometer/channel4/resistance".into(), "99951.2".into())
        );
    }

    #[test]
    fn failed_publish_is_swallowed() {
        let publisher = FakePublisher::default();
        *publisher.fail.borrow_mut() = true;

        publish_reading(&mut publisher.clone(), &reading());

        assert!(publisher.sent.borrow().is_empty());
    }
}
