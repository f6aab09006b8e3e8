use std::fmt;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

/// Reference to a type object (case-type, document-type, decision-type,
/// status-type, result-type) or a catalog.
///
/// Local references compare by identifier, remote references by exact URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeRef {
    Local(String),
    Remote(String),
}

impl TypeRef {
    pub fn local(id: impl Into<String>) -> Self {
        Self::Local(id.into())
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote(url.into())
    }

    /// The storage key: the identifier for local references, the URL for remote
    /// ones. Identifiers never contain a scheme separator so keys cannot clash.
    pub fn key(&self) -> &str {
        match self {
            Self::Local(id) => id,
            Self::Remote(url) => url,
        }
    }

    pub fn from_key(key: &str) -> Self {
        if key.contains("://") {
            Self::Remote(key.to_string())
        } else {
            Self::Local(key.to_string())
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for TypeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Self::from_key(&key))
    }
}

/// Turns the URLs found in payloads into [`TypeRef`]s. URLs under one of the
/// configured local base URLs point at objects held by this installation and
/// become local references.
#[derive(Debug, Clone, Default)]
pub struct RefParser {
    local_prefixes: Vec<String>,
}

impl RefParser {
    pub fn new(local_base_urls: &[String]) -> Result<Self> {
        let mut local_prefixes = Vec::with_capacity(local_base_urls.len());
        for raw in local_base_urls {
            let url = Url::parse(raw).with_context(|| format!("parse local base url '{raw}'"))?;
            let mut prefix = url.to_string();
            if !prefix.ends_with('/') {
                prefix.push('/');
            }
            local_prefixes.push(prefix);
        }
        Ok(Self { local_prefixes })
    }

    pub fn parse(&self, raw: &str) -> Result<TypeRef> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("reference cannot be empty");
        }
        if !raw.contains("://") {
            return Ok(TypeRef::Local(raw.to_string()));
        }

        let url = Url::parse(raw).with_context(|| format!("invalid url '{raw}'"))?;
        if url.cannot_be_a_base() {
            bail!("invalid url '{raw}'");
        }

        let normalized = url.as_str();
        for prefix in self.local_prefixes.iter() {
            if !normalized.starts_with(prefix.as_str()) {
                continue;
            }
            let id = url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last());
            match id {
                Some(id) => return Ok(TypeRef::Local(id.to_string())),
                None => bail!("url '{raw}' does not name an object"),
            }
        }

        Ok(TypeRef::Remote(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let parser =
            RefParser::new(&["https://zgw.example.nl/catalogi/api/v1".to_string()]).unwrap();

        // Test case 1: plain identifier
        assert_eq!(parser.parse("zt-1").unwrap(), TypeRef::local("zt-1"));

        // Test case 2: own catalog url becomes local
        let r = parser
            .parse("https://zgw.example.nl/catalogi/api/v1/zaaktypen/1f0c3e/")
            .unwrap();
        assert_eq!(r, TypeRef::local("1f0c3e"));

        // Test case 3: foreign url stays remote, verbatim
        let raw = "https://other.example.nl/catalogi/api/v1/zaaktypen/abc";
        assert_eq!(parser.parse(raw).unwrap(), TypeRef::remote(raw));

        // Test case 4: garbage
        assert!(parser.parse("").is_err());
        assert!(parser.parse("https://").is_err());
    }

    #[test]
    fn test_key_round_trip() {
        let local = TypeRef::local("abc");
        let remote = TypeRef::remote("https://x.example/zaaktypen/1");
        assert_eq!(TypeRef::from_key(local.key()), local);
        assert_eq!(TypeRef::from_key(remote.key()), remote);
        assert_ne!(
            TypeRef::remote("https://x.example/zaaktypen/1"),
            TypeRef::remote("https://x.example/zaaktypen/1/")
        );

        let json = serde_json::to_string(&remote).unwrap();
        assert_eq!(json, "\"https://x.example/zaaktypen/1\"");
        let back: TypeRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, remote);
    }
}
