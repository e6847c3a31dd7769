use std::sync::mpsc::{self, Sender};

use esp_idf_svc::{
    eventloop::EspSystemEventLoop, hal::delay::FreeRtos, hal::peripherals::Peripherals,
    nvs::EspDefaultNvsPartition,
};
use log::{info, warn};

use crate::{
    board::Board,
    configuration::{main_configuration::GlobalConfig, nvs_configuration::NvsConfiguration},
    console,
    display::{LogDisplay, TextDisplay},
    mqtt_publisher::MqttPublisher,
    publish::{LoggerPublisher, Publisher},
    runtime::{Command, Response, Runtime},
    scheduler::SystemClock,
    web_server, wifi_helper,
};

/// A command and the channel its answer goes back on.
pub type Job = (Command, Sender<Response>);

const LOOP_DELAY_MS: u32 = 10;

pub fn run() -> anyhow::Result<()> {
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let store = NvsConfiguration::new(nvs_partition.clone())?;
    let config = GlobalConfig::load(&store);

    let _wifi = wifi_helper::connect_wifi(peripherals.modem, sys_loop, nvs_partition)?;

    let board = Board::new(peripherals.adc1, peripherals.pins, peripherals.i2c0)?;

    let publisher: Box<dyn Publisher> = if config.mqtt_enabled {
        match MqttPublisher::new(&config) {
            Ok(publisher) => Box::new(publisher),
            Err(e) => {
                warn!("MQTT unavailable, logging readings instead: {:?}", e);
                Box::new(LoggerPublisher)
            }
        }
    } else {
        Box::new(LoggerPublisher)
    };

    let display: Box<dyn TextDisplay> = match board.lcd {
        Some(lcd) => Box::new(lcd),
        None => Box::new(LogDisplay),
    };

    let (jobs_tx, jobs_rx) = mpsc::channel::<Job>();
    let _server = web_server::start(jobs_tx.clone())?;
    console::spawn(jobs_tx)?;

    let mut runtime = Runtime::new(
        board.probes,
        SystemClock::new(),
        Box::new(store),
        publisher,
        display,
    );

    info!("Hygrometer ready");

    loop {
        while let Ok((command, reply)) = jobs_rx.try_recv() {
            let response = runtime.handle(command);
            let _ = reply.send(response);
        }

        runtime.tick();
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}
