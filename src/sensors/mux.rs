use embedded_hal::digital::{OutputPin, PinState};

use crate::channel::Channel;

pub const ADDRESS_LINES: usize = 3;

/// 74HC4051 style analog multiplexer, EN tied to GND.
pub struct MuxController<P: OutputPin> {
    address: [P; ADDRESS_LINES],
}

impl<P: OutputPin> MuxController<P> {
    pub fn new(s0: P, s1: P, s2: P) -> Self {
        Self {
            address: [s0, s1, s2],
        }
    }

    /// Routes `channel` to the shared analog line. The output still needs to
    /// settle before it is sampled.
    pub fn select(&mut self, channel: Channel) {
        for (bit, pin) in self.address.iter_mut().enumerate() {
            let high = (channel.number() >> bit) & 1 == 1;
            let _ = pin.set_state(PinState::from(high));
        }
    }
}
