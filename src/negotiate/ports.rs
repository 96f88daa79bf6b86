//! Port domain values: the three-way constraint a firewall places on one
//! direction of traffic for a node.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::NegotiationError;

/// Closed interval of TCP ports, `[min, max]`.
///
/// Intervals built through [`PortInterval::new`] always satisfy `min <= max`.
/// Intersection is allowed to produce an inverted interval; such a value
/// means no port works in that direction and is reported by
/// [`PortInterval::is_empty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortInterval {
    min: u16,
    max: u16,
}

impl PortInterval {
    pub fn new(min: u16, max: u16) -> Result<Self, NegotiationError> {
        if min > max {
            return Err(NegotiationError::InvertedInterval { min, max });
        }
        Ok(Self { min, max })
    }

    /// Build an interval without checking the bounds. Only intersection
    /// results go through here.
    pub(crate) const fn unchecked(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    /// True when the interval is inverted and contains no port.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }
}

impl fmt::Display for PortInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.min, self.max)
    }
}

/// Ports a node accepts for one direction of traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortRange {
    /// Any port is permitted.
    #[default]
    Unrestricted,
    /// No port is permitted.
    Forbidden,
    /// Only ports inside the interval are permitted.
    Bounded(PortInterval),
}

impl PortRange {
    /// Convenience constructor for a validated bounded range.
    pub fn bounded(min: u16, max: u16) -> Result<Self, NegotiationError> {
        PortInterval::new(min, max).map(PortRange::Bounded)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, PortRange::Forbidden)
    }

    pub fn interval(&self) -> Option<PortInterval> {
        match self {
            PortRange::Bounded(interval) => Some(*interval),
            _ => None,
        }
    }
}

/// Combine two constraints on the same connection.
///
/// Forbidden absorbs everything, unrestricted is the identity, and two
/// intervals meet at `[max(min), min(max)]`. The bounded result is not
/// validated and may be inverted.
pub fn intersect(a: PortRange, b: PortRange) -> PortRange {
    match (a, b) {
        (PortRange::Forbidden, _) | (_, PortRange::Forbidden) => PortRange::Forbidden,
        (PortRange::Unrestricted, other) | (other, PortRange::Unrestricted) => other,
        (PortRange::Bounded(x), PortRange::Bounded(y)) => PortRange::Bounded(
            PortInterval::unchecked(x.min.max(y.min), x.max.min(y.max)),
        ),
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortRange::Unrestricted => write!(f, "any"),
            PortRange::Forbidden => write!(f, "none"),
            PortRange::Bounded(interval) => write!(f, "{}", interval),
        }
    }
}

impl FromStr for PortRange {
    type Err = NegotiationError;

    /// Accepts `any`, `none`, `MIN-MAX` or `MIN:MAX`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        match text.to_ascii_lowercase().as_str() {
            "any" | "*" => return Ok(PortRange::Unrestricted),
            "none" | "-" => return Ok(PortRange::Forbidden),
            _ => {}
        }

        let invalid = || NegotiationError::InvalidPortRange {
            input: s.to_string(),
        };

        let (lo, hi) = text
            .split_once(['-', ':'])
            .ok_or_else(invalid)?;
        let min: u16 = lo.trim().parse().map_err(|_| invalid())?;
        let max: u16 = hi.trim().parse().map_err(|_| invalid())?;
        PortRange::bounded(min, max)
    }
}

impl TryFrom<String> for PortRange {
    type Error = NegotiationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PortRange> for String {
    fn from(value: PortRange) -> Self {
        value.to_string()
    }
}
