#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    hygrometer::app::run()
}

/// Host build: eight simulated probes drying out behind a simulated
/// multiplexer, with logs standing in for the LCD and the broker.
#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    sim::run()
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use std::{cell::Cell, convert::Infallible, rc::Rc};

    use embedded_hal::{
        delay::DelayNs,
        digital::{ErrorType, OutputPin},
    };
    use hygrometer::{
        calibration::CalibrationKind,
        channel::{Channel, CHANNEL_COUNT},
        configuration::key_value_store::MemoryStore,
        display::LogDisplay,
        post_data::PostData,
        publish::LoggerPublisher,
        runtime::{Command, Runtime},
        scheduler::Clock,
        sensors::{
            mux::MuxController,
            resistance_sampler::{AnalogInput, ResistanceSampler, SamplerConfig},
        },
    };
    use log::info;

    const STEP_MS: u64 = 1_000;
    const SIMULATED_MS: u64 = 30_000;

    #[derive(Clone)]
    struct Bench {
        address: Rc<Cell<u8>>,
        resistances: Rc<Cell<[f32; CHANNEL_COUNT]>>,
    }

    struct AddressPin {
        bench: Bench,
        bit: u8,
    }

    impl ErrorType for AddressPin {
        type Error = Infallible;
    }

    impl OutputPin for AddressPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            let address = self.bench.address.get() & !(1 << self.bit);
            self.bench.address.set(address);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            let address = self.bench.address.get() | (1 << self.bit);
            self.bench.address.set(address);
            Ok(())
        }
    }

    /// Divider output for whichever probe the multiplexer selects.
    struct BenchAdc {
        bench: Bench,
        config: SamplerConfig,
    }

    impl AnalogInput for BenchAdc {
        fn read_raw(&mut self) -> u16 {
            let probe = self.bench.resistances.get()[self.bench.address.get() as usize];
            let series = self.config.series_resistor_ohms;
            let voltage = self.config.supply_voltage * series / (series + probe);
            (voltage / self.config.supply_voltage * self.config.adc_full_scale).round() as u16
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    #[derive(Clone, Default)]
    struct SimClock(Rc<Cell<u64>>);

    impl Clock for SimClock {
        fn now_ms(&self) -> u64 {
            self.0.get()
        }
    }

    pub fn run() -> anyhow::Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let bench = Bench {
            address: Rc::default(),
            resistances: Rc::new(Cell::new([
                15_000.0, 40_000.0, 90_000.0, 150_000.0, 400_000.0, 1_200_000.0, 3_000_000.0,
                4_000_000.0,
            ])),
        };

        let pin = |bit| AddressPin {
            bench: bench.clone(),
            bit,
        };
        let config = SamplerConfig::default();
        let sampler = ResistanceSampler::new(
            MuxController::new(pin(0), pin(1), pin(2)),
            BenchAdc {
                bench: bench.clone(),
                config,
            },
            NoDelay,
            config,
        );

        let clock = SimClock::default();
        let mut runtime = Runtime::new(
            sampler,
            clock.clone(),
            Box::new(MemoryStore::new()),
            Box::new(LoggerPublisher),
            Box::new(LogDisplay),
        );

        runtime.handle(Command::SaveConfig(PostData::from_string(
            "mqtt_server=localhost&mqtt_port=1883&mqtt_enabled=on&display_enabled=on\
             &interval=5&interval_unit=s&ref_channel=none&global_wet=0"
                .to_string(),
        )));

        info!("Capturing dry baseline");
        runtime.handle(Command::Calibrate(CalibrationKind::Dry));

        while clock.now_ms() <= SIMULATED_MS {
            runtime.tick();

            // every probe dries out a little
            let mut resistances = bench.resistances.get();
            for r in resistances.iter_mut() {
                *r *= 1.02;
            }
            bench.resistances.set(resistances);

            clock.0.set(clock.now_ms() + STEP_MS);
        }

        for channel in Channel::all() {
            info!(
                "CH{} index {:.2}%",
                channel,
                runtime.state().compute_index(
                    bench.resistances.get()[channel.index()],
                    channel
                )
            );
        }

        println!("{}", runtime.handle(Command::Metrics).body);
        println!("{}", runtime.handle(Command::Status).body);

        Ok(())
    }
}
