//! Named signals delivered to workflow instances.
//!
//! Delivery is at-least-once; the engine tolerates duplicates and signals
//! arriving after their window closed.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named event addressed to one workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A driver accepted the order (`order-dispatched`).
    Dispatched,
    /// The order was delivered (`order-delivered`).
    Delivered,
    /// The order was cancelled (`order-canceled`).
    Canceled,
}

impl Signal {
    /// Wire name of the signal.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dispatched => "order-dispatched",
            Self::Delivered => "order-delivered",
            Self::Canceled => "order-canceled",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error parsing an unknown signal name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown signal name: {0}")]
pub struct UnknownSignal(pub String);

impl FromStr for Signal {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order-dispatched" => Ok(Self::Dispatched),
            "order-delivered" => Ok(Self::Delivered),
            "order-canceled" => Ok(Self::Canceled),
            other => Err(UnknownSignal(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for signal in [Signal::Dispatched, Signal::Delivered, Signal::Canceled] {
            assert_eq!(signal.name().parse::<Signal>(), Ok(signal));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!("order-exploded".parse::<Signal>().is_err());
    }
}
