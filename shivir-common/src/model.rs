//! Curriculum session types and face embeddings

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Session type conducted at a shivir
///
/// The first five form the ordered curriculum; `Festival` is an open
/// session that anyone may attend and that never changes a person's level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionType {
    Ma,
    Ssp1,
    Ssp2,
    Hs1,
    Hs2,
    Festival,
}

impl SessionType {
    /// Every session type, curriculum order first
    pub const ALL: [SessionType; 6] = [
        SessionType::Ma,
        SessionType::Ssp1,
        SessionType::Ssp2,
        SessionType::Hs1,
        SessionType::Hs2,
        SessionType::Festival,
    ];

    /// Ordered progression curriculum
    pub const CURRICULUM: [SessionType; 5] = [
        SessionType::Ma,
        SessionType::Ssp1,
        SessionType::Ssp2,
        SessionType::Hs1,
        SessionType::Hs2,
    ];

    /// Storage/wire code ("MA", "SSP1", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Ma => "MA",
            SessionType::Ssp1 => "SSP1",
            SessionType::Ssp2 => "SSP2",
            SessionType::Hs1 => "HS1",
            SessionType::Hs2 => "HS2",
            SessionType::Festival => "FESTIVAL",
        }
    }

    /// Human-readable name shown to administrators
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionType::Ma => "MA Shivir (MA)",
            SessionType::Ssp1 => "SSP1 (MTS 1)",
            SessionType::Ssp2 => "SSP2 (MTS 2)",
            SessionType::Hs1 => "Higher Shivir 1",
            SessionType::Hs2 => "Higher Shivir 2",
            SessionType::Festival => "Festival/Open Session",
        }
    }

    /// Number of attended days needed to complete this type
    pub fn required_days(&self) -> u32 {
        match self {
            SessionType::Ma => 5,
            SessionType::Ssp1 | SessionType::Ssp2 | SessionType::Hs1 | SessionType::Hs2 => 2,
            SessionType::Festival => 1,
        }
    }

    /// Position in [`SessionType::CURRICULUM`], `None` for `Festival`
    pub fn curriculum_index(&self) -> Option<usize> {
        Self::CURRICULUM.iter().position(|t| t == self)
    }

    pub fn is_festival(&self) -> bool {
        matches!(self, SessionType::Festival)
    }

    /// Interpret free-text `current_level` from the identity store
    ///
    /// Empty, garbled or unknown text (and "FESTIVAL", which is not a level)
    /// degrades to `None`, i.e. a new user.
    pub fn parse_level(text: Option<&str>) -> Option<SessionType> {
        let text = text?.trim();
        if text.is_empty() {
            return None;
        }
        match text.parse::<SessionType>() {
            Ok(t) if t.curriculum_index().is_some() => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        SessionType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown session type: {:?}", s)))
    }
}

/// Fixed-length face embedding produced by an external encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(pub Vec<f64>);

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Decode a stored embedding (little-endian f64 values)
    ///
    /// Fails on empty blobs, truncated values and non-finite components.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() % 8 != 0 {
            return Err(Error::InvalidInput(format!(
                "Embedding blob length {} is not a positive multiple of 8",
                bytes.len()
            )));
        }

        let values: Vec<f64> = bytes
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_le_bytes(buf)
            })
            .collect();

        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(
                "Embedding contains non-finite values".to_string(),
            ));
        }

        Ok(Self(values))
    }

    /// Encode for storage (little-endian f64 values)
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Euclidean distance, `None` when dimensions differ
    pub fn euclidean_distance(&self, other: &Embedding) -> Option<f64> {
        if self.len() != other.len() {
            return None;
        }
        let sum: f64 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Some(sum.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_days_lookup() {
        assert_eq!(SessionType::Ma.required_days(), 5);
        for t in [SessionType::Ssp1, SessionType::Ssp2, SessionType::Hs1, SessionType::Hs2] {
            assert_eq!(t.required_days(), 2);
        }
        assert_eq!(SessionType::Festival.required_days(), 1);
    }

    #[test]
    fn test_parse_level_degrades_to_none() {
        assert_eq!(SessionType::parse_level(None), None);
        assert_eq!(SessionType::parse_level(Some("")), None);
        assert_eq!(SessionType::parse_level(Some("   ")), None);
        assert_eq!(SessionType::parse_level(Some("New User")), None);
        assert_eq!(SessionType::parse_level(Some("FESTIVAL")), None);
        assert_eq!(SessionType::parse_level(Some(" ssp1 ")), Some(SessionType::Ssp1));
        assert_eq!(SessionType::parse_level(Some("HS2")), Some(SessionType::Hs2));
    }

    #[test]
    fn test_serde_uses_uppercase_codes() {
        let json = serde_json::to_string(&SessionType::Ssp2).unwrap();
        assert_eq!(json, "\"SSP2\"");
        let parsed: SessionType = serde_json::from_str("\"FESTIVAL\"").unwrap();
        assert_eq!(parsed, SessionType::Festival);
    }

    #[test]
    fn test_embedding_blob_decoding() {
        let embedding = Embedding::new(vec![0.25, -1.5, 3.0]);
        let decoded = Embedding::from_le_bytes(&embedding.to_le_bytes()).unwrap();
        assert_eq!(decoded, embedding);

        assert!(Embedding::from_le_bytes(&[]).is_err());
        assert!(Embedding::from_le_bytes(&[0u8; 12]).is_err());
        assert!(Embedding::from_le_bytes(&f64::NAN.to_le_bytes()).is_err());
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert_eq!(a.euclidean_distance(&b), Some(5.0));
        assert_eq!(a.euclidean_distance(&Embedding::new(vec![1.0])), None);
    }
}
