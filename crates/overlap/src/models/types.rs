//! Core records, keys and errors.

use std::fmt;
use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;

// ============================================================================
// Enums
// ============================================================================

/// Bus service direction (LTA publishes 1 and 2)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Direction {
    Outbound = 1,
    Inbound = 2,
}

impl Direction {
    pub fn from_code(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Outbound),
            2 => Some(Self::Inbound),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Serialized as the LTA code, matching table and GeoJSON output
#[cfg(feature = "serde")]
impl serde::Serialize for Direction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

// ============================================================================
// Keys and records
// ============================================================================

/// One bus route: a service travelling in one direction
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RouteKey {
    pub service: ServiceIdentifier,
    pub direction: Direction,
}

impl RouteKey {
    pub fn new(service: impl Into<ServiceIdentifier>, direction: Direction) -> Self {
        Self {
            service: service.into(),
            direction,
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (direction {})", self.service, self.direction)
    }
}

/// A bus stop visited by a route
#[derive(Clone, Debug, PartialEq)]
pub struct StopRecord {
    pub service: ServiceIdentifier,
    pub direction: Direction,
    pub sequence: u32,
    /// Longitude / latitude
    pub location: Point,
    pub stop_code: Option<StopCode>,
    pub description: Option<Arc<str>>,
    /// Service category (`TRUNK`, `FEEDER`, ...) when the source provides it
    pub category: Option<Arc<str>>,
}

impl StopRecord {
    pub fn new(
        service: impl Into<ServiceIdentifier>,
        direction: Direction,
        sequence: u32,
        location: Point,
    ) -> Self {
        Self {
            service: service.into(),
            direction,
            sequence,
            location,
            stop_code: None,
            description: None,
            category: None,
        }
    }

    pub fn route_key(&self) -> RouteKey {
        RouteKey::new(self.service.clone(), self.direction)
    }
}

/// An MRT/LRT station, positioned on its line by the ordinal in its code
#[derive(Clone, Debug, PartialEq)]
pub struct StationRecord {
    pub code: Arc<str>,
    pub line: LineCode,
    pub ordinal: u32,
    /// Longitude / latitude
    pub location: Point,
    pub name: Option<Arc<str>>,
}

impl StationRecord {
    /// Build a station from its code (`TE12` -> line `TE`, ordinal 12)
    pub fn from_code(code: &str, location: Point) -> Result<Self> {
        let (line, ordinal) = parse_station_code(code)?;
        Ok(Self {
            code: code.trim().into(),
            line,
            ordinal,
            location,
            name: None,
        })
    }
}

/// Split a station code into its line prefix and ordinal.
///
/// The prefix is the leading run of non-digit characters and the ordinal the
/// first run of digits, so `NS3A` parses as (`NS`, 3).
pub fn parse_station_code(code: &str) -> Result<(LineCode, u32)> {
    let code = code.trim();
    let prefix_len = code
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| AnalysisError::InvalidData(format!("Station code {code:?} has no ordinal")))?;

    if prefix_len == 0 {
        return Err(AnalysisError::InvalidData(format!(
            "Station code {code:?} has no line prefix"
        )));
    }

    let digits: String = code[prefix_len..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let ordinal = digits.parse::<u32>().map_err(|e| {
        AnalysisError::InvalidData(format!("Station code {code:?} has an invalid ordinal: {e}"))
    })?;

    Ok((LineCode::new(&code[..prefix_len]), ordinal))
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Route not found: {0}")]
    RouteNotFound(RouteKey),

    #[error("Service not found: {0}")]
    ServiceNotFound(ServiceIdentifier),

    #[error("Line not found: {0}")]
    LineNotFound(LineCode),

    #[error("{what} is not plottable: {points} point(s), need at least 2")]
    NotPlottable { what: String, points: usize },

    #[error("Invalid {name} {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_station_code() {
        let (line, ordinal) = parse_station_code("TE12").unwrap();
        assert_eq!(line.as_str(), "TE");
        assert_eq!(ordinal, 12);

        let (line, ordinal) = parse_station_code(" NS3A ").unwrap();
        assert_eq!(line.as_str(), "NS");
        assert_eq!(ordinal, 3);

        assert!(matches!(parse_station_code("12"), Err(AnalysisError::InvalidData(_))));
        assert!(matches!(parse_station_code("CC"), Err(AnalysisError::InvalidData(_))));
    }

    #[test]
    fn test_direction_codes() {
        assert_eq!(Direction::from_code(1), Some(Direction::Outbound));
        assert_eq!(Direction::from_code(2), Some(Direction::Inbound));
        assert_eq!(Direction::from_code(3), None);
        assert_eq!(Direction::Inbound.to_string(), "2");
    }

    #[test]
    fn test_route_key_display() {
        let key = RouteKey::new("36", Direction::Outbound);
        assert_eq!(key.to_string(), "36 (direction 1)");
    }
}
