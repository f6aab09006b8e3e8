use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Error};
use serde::{Deserialize, Serialize};

/// The API components a grant can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Component {
    /// Zaken API
    #[serde(rename = "zrc")]
    Zrc,
    /// Documenten API
    #[serde(rename = "drc")]
    Drc,
    /// Besluiten API
    #[serde(rename = "brc")]
    Brc,
    /// Catalogi API
    #[serde(rename = "ztc")]
    Ztc,
    /// Autorisaties API
    #[serde(rename = "ac")]
    Ac,
    /// Notificaties API
    #[serde(rename = "nrc")]
    Nrc,
}

impl Component {
    pub const ALL: [Component; 6] = [
        Component::Zrc,
        Component::Drc,
        Component::Brc,
        Component::Ztc,
        Component::Ac,
        Component::Nrc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Zrc => "zrc",
            Component::Drc => "drc",
            Component::Brc => "brc",
            Component::Ztc => "ztc",
            Component::Ac => "ac",
            Component::Nrc => "nrc",
        }
    }

    /// Name of the field that holds the type reference on grants and objects of
    /// this component. Components without typed objects return `None`.
    pub fn type_field(&self) -> Option<&'static str> {
        match self {
            Component::Zrc => Some("zaaktype"),
            Component::Drc => Some("informatieobjecttype"),
            Component::Brc => Some("besluittype"),
            _ => None,
        }
    }

    /// The component whose objects are typed by the type at `url`, read from
    /// the catalog collection the URL points into (`.../zaaktypen/<id>`).
    pub fn from_type_url(url: &str) -> Option<Component> {
        let parsed = url::Url::parse(url).ok()?;
        let segments: Vec<&str> = parsed.path_segments()?.filter(|s| !s.is_empty()).collect();
        let collection = segments.len().checked_sub(2).map(|i| segments[i])?;
        match collection {
            "zaaktypen" => Some(Component::Zrc),
            "informatieobjecttypen" => Some(Component::Drc),
            "besluittypen" => Some(Component::Brc),
            _ => None,
        }
    }

    /// Whether objects of this component carry a confidentiality level.
    pub fn has_confidentiality(&self) -> bool {
        matches!(self, Component::Zrc | Component::Drc)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "zrc" => Component::Zrc,
            "drc" => Component::Drc,
            "brc" => Component::Brc,
            "ztc" => Component::Ztc,
            "ac" => Component::Ac,
            "nrc" => Component::Nrc,
            _ => bail!("unknown component '{s}'"),
        })
    }
}
