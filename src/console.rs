use std::{
    io::Read,
    sync::mpsc::Sender,
    thread,
    time::Duration,
};

use log::{info, warn};

use crate::{app::Job, runtime::Command, web_server::dispatch};

/// Reads single byte commands from the UART console.
pub fn spawn(jobs: Sender<Job>) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("console".to_string())
        .stack_size(6144)
        .spawn(move || {
            let mut stdin = std::io::stdin();
            let mut byte = [0u8; 1];

            loop {
                match stdin.read(&mut byte) {
                    Ok(1) => {
                        let Some(command) = Command::from_console_byte(byte[0]) else {
                            continue;
                        };

                        info!("Console: {:?}", command);
                        if let Err(e) = dispatch(&jobs, command) {
                            warn!("Console command failed: {}", e);
                        }
                    }
                    _ => thread::sleep(Duration::from_millis(50)),
                }
            }
        })?;

    Ok(())
}
