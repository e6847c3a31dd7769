use crate::channel::Channel;

/// One averaged measurement of a probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub adc_raw: f32,
    pub voltage: f32,
    pub resistance: f32,
}

/// Anything able to measure the resistance of a probe.
pub trait ResistanceSource {
    fn sample(&mut self, channel: Channel) -> Sample;

    /// Blocking pause between two channels of a full pass.
    fn pause_ms(&mut self, _ms: u32) {}
}
