//! Core types used throughout the scangate library.
//!
//! This module defines the document record tracked for every upload, its
//! analysis status, the verdicts produced by scan engines, and the views
//! handed back to callers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, content-and-tag derived document identifier.
///
/// Also used as the binary store key while the document is pending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Wraps an id string without validating it.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id has the shape produced by the identity deriver.
    pub fn is_valid(&self) -> bool {
        crate::core::identity::is_valid_id(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Analysis state of a document.
///
/// A document starts `Pending` and leaves it at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// No verdict yet; the bytes are still held by the binary store.
    #[default]
    Pending,
    /// The engine found nothing.
    Clean,
    /// The engine found a threat.
    Infected,
}

impl AnalysisStatus {
    /// Returns `true` while no verdict is known.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Human-readable status string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Clean => "clean",
            Self::Infected => "infected",
        }
    }

    /// Numeric code used by relational stores.
    pub fn code(&self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::Clean => 1,
            Self::Infected => 2,
        }
    }

    /// Inverse of [`code`](Self::code). Unknown codes map to `None`.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Clean),
            2 => Some(Self::Infected),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The definitive result of one successful engine analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Verdict {
    /// No threat detected.
    Clean,
    /// A threat was detected.
    Infected {
        /// Engine-specific threat name (e.g. "Eicar-Test-Signature").
        threat: String,
    },
}

impl Verdict {
    /// Creates an infected verdict.
    pub fn infected(threat: impl Into<String>) -> Self {
        Self::Infected {
            threat: threat.into(),
        }
    }

    /// Returns the document status this verdict resolves to.
    pub fn status(&self) -> AnalysisStatus {
        match self {
            Self::Clean => AnalysisStatus::Clean,
            Self::Infected { .. } => AnalysisStatus::Infected,
        }
    }

    /// Returns `true` if a threat was found.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected { .. })
    }

    /// Returns the threat name, if any.
    pub fn threat(&self) -> Option<&str> {
        match self {
            Self::Infected { threat } => Some(threat),
            Self::Clean => None,
        }
    }
}

/// Durable record tracking one upload and its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Derived from `(content, tag)`; unique within the metadata store.
    pub id: DocumentId,

    /// Hex SHA-256 of the content; shared by byte-identical uploads.
    pub hash: String,

    /// Sanitized caller tag.
    pub tag: String,

    /// Current analysis status.
    pub status: AnalysisStatus,

    /// When the status left `Pending`.
    pub analyzed_at: Option<DateTime<Utc>>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Creates a new pending document stamped with the current time.
    pub fn new_pending(id: DocumentId, hash: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id,
            hash: hash.into(),
            tag: tag.into(),
            status: AnalysisStatus::Pending,
            analyzed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Creates a document under a new id that inherits a known verdict.
    ///
    /// `created_at` is fresh; status and `analyzed_at` are copied.
    pub fn inheriting(id: DocumentId, tag: impl Into<String>, source: &Document) -> Self {
        Self {
            id,
            hash: source.hash.clone(),
            tag: tag.into(),
            status: source.status,
            analyzed_at: source.analyzed_at,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` while the document awaits a verdict.
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Returns `true` if the document is eligible for retention purge.
    pub fn is_purgeable(&self, cutoff: DateTime<Utc>) -> bool {
        !self.is_pending() && self.created_at < cutoff
    }
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// A new document was created for this upload.
    Created(DocumentId),
    /// The upload resolved to an already-known verdict or record.
    AlreadyExists(DocumentId),
}

impl UploadOutcome {
    /// Returns the document id, whichever the outcome.
    pub fn id(&self) -> &DocumentId {
        match self {
            Self::Created(id) | Self::AlreadyExists(id) => id,
        }
    }

    /// Returns `true` if a new record was created.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Consumes the outcome and returns the id.
    pub fn into_id(self) -> DocumentId {
        match self {
            Self::Created(id) | Self::AlreadyExists(id) => id,
        }
    }
}

/// Caller-facing rendering of a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentView {
    /// Document id.
    pub id: String,
    /// Content hash.
    pub hash: String,
    /// Name of the hash algorithm.
    pub hash_algo: String,
    /// Sanitized tag.
    pub tag: String,
    /// "pending", "clean" or "infected".
    #[serde(rename = "analyse_status")]
    pub status: String,
    /// RFC 3339 timestamp; absent while pending.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub analyzed_at: Option<String>,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<&Document> for DocumentView {
    fn from(doc: &Document) -> Self {
        let analyzed_at = if doc.is_pending() {
            None
        } else {
            doc.analyzed_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        };

        Self {
            id: doc.id.to_string(),
            hash: doc.hash.clone(),
            hash_algo: crate::core::identity::HASH_ALGORITHM.to_string(),
            tag: doc.tag.clone(),
            status: doc.status.as_str().to_string(),
            analyzed_at,
            created_at: doc.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Aggregated health of the service and its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Service version string.
    pub version: String,
    /// Free-text service information.
    pub information: String,
    /// `true` only if every dependency answered.
    pub healthy: bool,
    /// One entry per failing dependency.
    #[serde(default)]
    pub failures: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(status: AnalysisStatus) -> Document {
        Document {
            id: DocumentId::from("ITSzxj1mqz1gwFZ4iendeQ"),
            hash: "a".repeat(64),
            tag: "report.pdf".into(),
            status,
            analyzed_at: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap()),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_status_codes_roundtrip() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Clean,
            AnalysisStatus::Infected,
        ] {
            assert_eq!(AnalysisStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(AnalysisStatus::from_code(7), None);
    }

    #[test]
    fn test_verdict_status() {
        assert_eq!(Verdict::Clean.status(), AnalysisStatus::Clean);
        let infected = Verdict::infected("Eicar-Test-Signature");
        assert_eq!(infected.status(), AnalysisStatus::Infected);
        assert_eq!(infected.threat(), Some("Eicar-Test-Signature"));
    }

    #[test]
    fn test_view_formats_timestamps() {
        let view = DocumentView::from(&sample(AnalysisStatus::Infected));
        assert_eq!(view.status, "infected");
        assert_eq!(view.hash_algo, "SHA-256");
        assert_eq!(view.created_at, "2024-03-01T12:00:00Z");
        assert_eq!(view.analyzed_at.as_deref(), Some("2024-03-01T12:00:05Z"));
    }

    #[test]
    fn test_view_hides_analyzed_at_while_pending() {
        let view = DocumentView::from(&sample(AnalysisStatus::Pending));
        assert_eq!(view.status, "pending");
        assert!(view.analyzed_at.is_none());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("analyzed_at").is_none());
        assert_eq!(json["analyse_status"], "pending");
    }

    #[test]
    fn test_inheriting_copies_verdict() {
        let source = sample(AnalysisStatus::Clean);
        let copy = Document::inheriting(DocumentId::from("other"), "invoice", &source);
        assert_eq!(copy.status, AnalysisStatus::Clean);
        assert_eq!(copy.analyzed_at, source.analyzed_at);
        assert_eq!(copy.hash, source.hash);
        assert!(copy.created_at > source.created_at);
    }

    #[test]
    fn test_purgeable_excludes_pending() {
        let cutoff = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(sample(AnalysisStatus::Clean).is_purgeable(cutoff));
        assert!(!sample(AnalysisStatus::Pending).is_purgeable(cutoff));
    }
}
