//! Cluster identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Returned when a string is not a valid fsid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid fsid '{0}'")]
pub struct InvalidFsid(pub String);

/// A cluster's fsid. Always a UUID, displayed hyphenated lower-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fsid(Uuid);

impl Fsid {
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Fsid {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for Fsid {
    type Err = InvalidFsid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Uuid::parse_str also takes braced and urn forms; fsids never use them.
        let plain = trimmed.len() == 32 || trimmed.len() == 36;
        match Uuid::parse_str(trimmed) {
            Ok(id) if plain => Ok(Self(id)),
            _ => Err(InvalidFsid(s.to_string())),
        }
    }
}

impl fmt::Display for Fsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        let a: Fsid = "12FAD6A4-9F5B-4C2A-8C4E-3B2D1F0E9A11".parse().unwrap();
        let b: Fsid = "12fad6a49f5b4c2a8c4e3b2d1f0e9a11".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "12fad6a4-9f5b-4c2a-8c4e-3b2d1f0e9a11");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("ceph".parse::<Fsid>().is_err());
        assert!("".parse::<Fsid>().is_err());
        assert!("{12fad6a4-9f5b-4c2a-8c4e-3b2d1f0e9a11}".parse::<Fsid>().is_err());
        let err = "nope".parse::<Fsid>().unwrap_err();
        assert_eq!(err.to_string(), "invalid fsid 'nope'");
    }

    #[test]
    fn test_serializes_as_string() {
        let fsid: Fsid = "12fad6a4-9f5b-4c2a-8c4e-3b2d1f0e9a11".parse().unwrap();
        assert_eq!(
            serde_json::to_value(fsid).unwrap(),
            serde_json::json!("12fad6a4-9f5b-4c2a-8c4e-3b2d1f0e9a11")
        );
    }
}
