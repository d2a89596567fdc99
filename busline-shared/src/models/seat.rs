use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a physical seat on a bus: row letter plus column number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatCoord {
    pub r_number: String,
    pub column_number: i32,
}

impl SeatCoord {
    /// Validates and normalizes a seat position. Row labels are single ASCII
    /// letters stored upper case; columns start at 1.
    pub fn new(r_number: &str, column_number: i32) -> Result<Self, SeatParseError> {
        let row = r_number.trim();
        let mut chars = row.chars();
        let letter = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => c.to_ascii_uppercase(),
            _ => return Err(SeatParseError::InvalidRow(r_number.to_string())),
        };

        if column_number < 1 {
            return Err(SeatParseError::InvalidColumn(column_number));
        }

        Ok(Self {
            r_number: letter.to_string(),
            column_number,
        })
    }
}

impl fmt::Display for SeatCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.r_number, self.column_number)
    }
}

impl FromStr for SeatCoord {
    type Err = SeatParseError;

    /// Parses the compact form, e.g. `"B2"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let row = s.get(..1).ok_or_else(|| SeatParseError::InvalidRow(s.to_string()))?;
        let column = s
            .get(1..)
            .and_then(|c| c.parse::<i32>().ok())
            .ok_or_else(|| SeatParseError::InvalidColumn(0))?;
        Self::new(row, column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeatParseError {
    #[error("Invalid seat row: {0:?}")]
    InvalidRow(String),

    #[error("Invalid seat column: {0}")]
    InvalidColumn(i32),

    #[error("Invalid seat status: {0:?}")]
    InvalidStatus(String),
}

/// Cached availability of a bus-level seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Unavailable,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Unavailable => "unavailable",
        }
    }

    pub fn is_available(&self) -> bool {
        *self == SeatStatus::Available
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatStatus {
    type Err = SeatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(SeatStatus::Available),
            "unavailable" => Ok(SeatStatus::Unavailable),
            other => Err(SeatParseError::InvalidStatus(other.to_string())),
        }
    }
}

/// One entry of a bus seat map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub r_number: String,
    pub column_number: i32,
    pub status: SeatStatus,
}

impl Seat {
    pub fn coord(&self) -> SeatCoord {
        SeatCoord {
            r_number: self.r_number.clone(),
            column_number: self.column_number,
        }
    }
}

/// Seat grid generated once when a bus is provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatLayout {
    rows: Vec<char>,
    columns: i32,
}

impl SeatLayout {
    pub fn new(rows: impl IntoIterator<Item = char>, columns: i32) -> Self {
        Self {
            rows: rows.into_iter().map(|c| c.to_ascii_uppercase()).collect(),
            columns,
        }
    }

    /// Rows A through K, five seats each.
    pub fn standard() -> Self {
        Self::new('A'..='K', 5)
    }

    pub fn capacity(&self) -> usize {
        self.rows.len() * self.columns.max(0) as usize
    }

    /// Row-major iteration: A1, A2, ..., A5, B1, ...
    pub fn coords(&self) -> impl Iterator<Item = SeatCoord> + '_ {
        self.rows.iter().flat_map(move |row| {
            (1..=self.columns).map(move |column| SeatCoord {
                r_number: row.to_string(),
                column_number: column,
            })
        })
    }
}

impl Default for SeatLayout {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_coord_normalizes_row() {
        let seat = SeatCoord::new(" b ", 2).unwrap();
        assert_eq!(seat.r_number, "B");
        assert_eq!(seat.to_string(), "B2");
        assert_eq!("b2".parse::<SeatCoord>().unwrap(), seat);
    }

    #[test]
    fn test_seat_coord_rejects_bad_input() {
        assert_eq!(SeatCoord::new("AB", 1), Err(SeatParseError::InvalidRow("AB".into())));
        assert_eq!(SeatCoord::new("", 1), Err(SeatParseError::InvalidRow("".into())));
        assert_eq!(SeatCoord::new("7", 1), Err(SeatParseError::InvalidRow("7".into())));
        assert_eq!(SeatCoord::new("A", 0), Err(SeatParseError::InvalidColumn(0)));
        assert!("A".parse::<SeatCoord>().is_err());
    }

    #[test]
    fn test_standard_layout() {
        let layout = SeatLayout::standard();
        let coords: Vec<SeatCoord> = layout.coords().collect();

        assert_eq!(layout.capacity(), 55);
        assert_eq!(coords.len(), 55);
        assert_eq!(coords.first().unwrap().to_string(), "A1");
        assert_eq!(coords.last().unwrap().to_string(), "K5");
    }

    #[test]
    fn test_seat_wire_format() {
        let seat = Seat {
            r_number: "A".into(),
            column_number: 1,
            status: SeatStatus::Unavailable,
        };
        let json = serde_json::to_value(&seat).unwrap();
        assert_eq!(json, serde_json::json!({"rNumber": "A", "columnNumber": 1, "status": "unavailable"}));
    }
}
