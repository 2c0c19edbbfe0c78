//! Sanctions and export-control screening
//!
//! Normalizes the raw files of one list snapshot into an entity index and screens
//! company names against it with a token/sequence similarity score.

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod index;
pub mod report;
pub mod screening;
pub mod similarity;
pub mod snapshot;
pub mod sources;
pub mod types;

pub use config::ScreeningConfig;
pub use error::{Result, ScreeningError};
pub use index::{build_index, EntityIndex, IndexBuild, IndexBuilder};
pub use report::{render_text, AuditRecord};
pub use screening::{screen, Screener, ScreeningOutcome, ScreeningPolicy};
pub use snapshot::{DirectorySnapshot, RawContent, SnapshotContents, SnapshotProvider};
pub use sources::{normalize_source, Row, SourceFile, XmlNode};
pub use types::{
    Decision, Entity, EntityFragment, EntityHit, EntityKey, EvidenceField, FragmentAttribute,
    MatchEvidence, SourceParseFailure,
};
