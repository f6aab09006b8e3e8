use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

/// Confidentiality levels (vertrouwelijkheidaanduiding), ordered from least to
/// most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidentiality {
    #[serde(rename = "openbaar")]
    Openbaar,
    #[serde(rename = "beperkt_openbaar")]
    BeperktOpenbaar,
    #[serde(rename = "intern")]
    Intern,
    #[serde(rename = "zaakvertrouwelijk")]
    Zaakvertrouwelijk,
    #[serde(rename = "vertrouwelijk")]
    Vertrouwelijk,
    #[serde(rename = "geheim")]
    Geheim,
    #[serde(rename = "zeer_geheim")]
    ZeerGeheim,
}

impl Confidentiality {
    pub const ALL: [Confidentiality; 7] = [
        Confidentiality::Openbaar,
        Confidentiality::BeperktOpenbaar,
        Confidentiality::Intern,
        Confidentiality::Zaakvertrouwelijk,
        Confidentiality::Vertrouwelijk,
        Confidentiality::Geheim,
        Confidentiality::ZeerGeheim,
    ];

    pub fn order(&self) -> u8 {
        match self {
            Confidentiality::Openbaar => 1,
            Confidentiality::BeperktOpenbaar => 2,
            Confidentiality::Intern => 3,
            Confidentiality::Zaakvertrouwelijk => 4,
            Confidentiality::Vertrouwelijk => 5,
            Confidentiality::Geheim => 6,
            Confidentiality::ZeerGeheim => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidentiality::Openbaar => "openbaar",
            Confidentiality::BeperktOpenbaar => "beperkt_openbaar",
            Confidentiality::Intern => "intern",
            Confidentiality::Zaakvertrouwelijk => "zaakvertrouwelijk",
            Confidentiality::Vertrouwelijk => "vertrouwelijk",
            Confidentiality::Geheim => "geheim",
            Confidentiality::ZeerGeheim => "zeer_geheim",
        }
    }

    /// Whether an object at `level` may be accessed under this ceiling.
    pub fn permits(&self, level: Confidentiality) -> bool {
        level <= *self
    }
}

impl PartialOrd for Confidentiality {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Confidentiality {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order().cmp(&other.order())
    }
}

impl fmt::Display for Confidentiality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidentiality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for level in Self::ALL {
            if level.as_str() == s {
                return Ok(level);
            }
        }
        bail!("unknown confidentiality level '{s}'")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order() {
        for pair in Confidentiality::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} should be below {}", pair[0], pair[1]);
        }
        assert_eq!(Confidentiality::Openbaar.order(), 1);
        assert_eq!(Confidentiality::ZeerGeheim.order(), 7);
    }

    #[test]
    fn test_permits() {
        let ceiling = Confidentiality::Zaakvertrouwelijk;
        assert!(ceiling.permits(Confidentiality::Openbaar));
        assert!(ceiling.permits(Confidentiality::Zaakvertrouwelijk));
        assert!(!ceiling.permits(Confidentiality::Vertrouwelijk));
        assert!(!ceiling.permits(Confidentiality::Geheim));
    }

    #[test]
    fn test_parse() {
        for level in Confidentiality::ALL {
            assert_eq!(level.as_str().parse::<Confidentiality>().unwrap(), level);
            let json = serde_json::to_string(&level).unwrap();
            assert_eq!(json, format!("\"{}\"", level.as_str()));
        }
        assert!("secret".parse::<Confidentiality>().is_err());
    }
}
