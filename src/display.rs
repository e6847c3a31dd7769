use log::info;
use pad::{Alignment, PadStr};

use crate::{device::Reading, moisture_index::DISCONNECTED_OHMS};

pub const DISPLAY_COLUMNS: usize = 16;
pub const DISPLAY_ROWS: u8 = 2;

/// Two line character display.
pub trait TextDisplay {
    fn write_line(&mut self, row: u8, text: &str) -> anyhow::Result<()>;
}

/// Mirrors the display on the log, for boards without a screen.
pub struct LogDisplay;

impl TextDisplay for LogDisplay {
    fn write_line(&mut self, row: u8, text: &str) -> anyhow::Result<()> {
        info!("display[{}]: {}", row, text);
        Ok(())
    }
}

fn short_ohms(resistance: f32) -> String {
    if resistance > DISCONNECTED_OHMS {
        "open".to_string()
    } else if resistance >= 999_500.0 {
        format!("{:.1}M", resistance / 1_000_000.0)
    } else if resistance >= 99_950.0 {
        format!("{:.0}k", resistance / 1_000.0)
    } else if resistance >= 999.5 {
        format!("{:.1}k", resistance / 1_000.0)
    } else {
        format!("{:.0}", resistance)
    }
}

/// `CH3  70.9% 99.9k`, padded or cut to the display width.
pub fn format_line(reading: &Reading) -> String {
    let line = format!(
        "CH{} {:>5.1}% {:>5}",
        reading.channel,
        reading.index,
        short_ohms(reading.resistance)
    );

    line.pad(DISPLAY_COLUMNS, ' ', Alignment::Left, true)
}
