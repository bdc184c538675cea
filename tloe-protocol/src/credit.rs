//! Per-channel flow-control credits
//!
//! Credits are returned to the sending side when the peer confirms delivery of
//! a frame, i.e. when the retransmission buffer slides past it. Consumption of
//! credits belongs to the transmit path and is not modelled here.

use crate::frame::{Channel, CHANNEL_COUNT};

/// Credit counters indexed by channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditTracker {
    credits: [u32; CHANNEL_COUNT],
}

impl CreditTracker {
    /// Create a tracker with every channel starting at `initial_grant`
    pub fn new(initial_grant: u32) -> Self {
        CreditTracker {
            credits: [initial_grant; CHANNEL_COUNT],
        }
    }

    /// Add `n` credits to a channel
    pub fn increment(&mut self, channel: Channel, n: u32) {
        let slot = &mut self.credits[channel.as_index()];
        *slot = slot.saturating_add(n);
    }

    /// Current credit count of a channel
    pub fn get(&self, channel: Channel) -> u32 {
        self.credits[channel.as_index()]
    }

    /// `(channel, credits)` pairs for every channel
    pub fn iter(&self) -> impl Iterator<Item = (Channel, u32)> + '_ {
        self.credits
            .iter()
            .enumerate()
            .map(|(idx, &credit)| (Channel::new_unchecked(idx as u8), credit))
    }
}

impl Default for CreditTracker {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_is_per_channel() {
        let mut credits = CreditTracker::default();
        let a = Channel::new(1).unwrap();
        let d = Channel::new(4).unwrap();

        credits.increment(a, 1);
        credits.increment(a, 1);
        credits.increment(d, 3);

        assert_eq!(credits.get(a), 2);
        assert_eq!(credits.get(d), 3);
        assert_eq!(credits.get(Channel::new(2).unwrap()), 0);
    }

    #[test]
    fn test_initial_grant() {
        let credits = CreditTracker::new(16);
        assert!(credits.iter().all(|(_, c)| c == 16));
        assert_eq!(credits.iter().count(), CHANNEL_COUNT);
    }
}
