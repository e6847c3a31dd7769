use std::fmt;

/// Number of probes behind the multiplexer.
pub const CHANNEL_COUNT: usize = 8;

/// One multiplexer input, always in `0..CHANNEL_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub fn new(index: u8) -> Option<Self> {
        if (index as usize) < CHANNEL_COUNT {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// All channels in ascending order.
    pub fn all() -> impl Iterator<Item = Channel> {
        (0..CHANNEL_COUNT as u8).map(Channel)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
