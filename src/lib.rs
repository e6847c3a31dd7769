pub mod calibration;
pub mod channel;
pub mod configuration;
pub mod device;
pub mod display;
pub mod metrics;
pub mod moisture_index;
pub mod post_data;
pub mod publish;
pub mod runtime;
pub mod scheduler;
pub mod sensors;
pub mod string_error;
pub mod template;

#[cfg(target_os = "espidf")]
pub mod app;
#[cfg(target_os = "espidf")]
pub mod board;
#[cfg(target_os = "espidf")]
pub mod console;
#[cfg(target_os = "espidf")]
pub mod mqtt_publisher;
#[cfg(target_os = "espidf")]
pub mod web_server;
#[cfg(target_os = "espidf")]
pub mod wifi_helper;
