use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Alternative trading venues an instrument code may be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Venue {
    Jnx,
    Cix,
}

impl Venue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jnx => "JNX",
            Self::Cix => "CIX",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "JNX" => Some(Self::Jnx),
            "CIX" => Some(Self::Cix),
            _ => None,
        }
    }
}

/// Validated instrument identifier: four ASCII digits with an optional venue suffix
/// (`7203`, `5721.JNX`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentCode {
    code: String,
    venue: Option<Venue>,
}

impl InstrumentCode {
    pub fn parse(input: &str) -> Result<Self, AppError> {
        let trimmed = input.trim();
        let (code, venue) = match trimmed.split_once('.') {
            Some((code, suffix)) => {
                let venue = Venue::parse(suffix)
                    .ok_or_else(|| AppError::InvalidInstrument(input.to_string()))?;
                (code, Some(venue))
            }
            None => (trimmed, None),
        };
        if code.len() != 4 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::InvalidInstrument(input.to_string()));
        }
        Ok(Self {
            code: code.to_string(),
            venue,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn venue(&self) -> Option<Venue> {
        self.venue
    }
}

impl FromStr for InstrumentCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for InstrumentCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.venue {
            Some(venue) => write!(f, "{}.{}", self.code, venue.as_str()),
            None => f.write_str(&self.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_venue_codes() {
        let plain = InstrumentCode::parse("3350").unwrap();
        assert_eq!(plain.to_string(), "3350");
        assert_eq!(plain.venue(), None);

        let venue = InstrumentCode::parse(" 5721.jnx ").unwrap();
        assert_eq!(venue.to_string(), "5721.JNX");
        assert_eq!(venue.venue(), Some(Venue::Jnx));
        assert_eq!(venue.code(), "5721");
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in ["", "123", "12345", "12a4", "1234.", "1234.TSE", "1234.JNX.CIX", ".JNX"] {
            assert!(InstrumentCode::parse(bad).is_err(), "{bad} should be rejected");
        }
    }
}
