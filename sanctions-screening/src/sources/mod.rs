//! Source normalizers
//!
//! Each known snapshot file maps to one catalog entry (`SourceFile`) that knows its
//! file name, its format, and the list it feeds. Normalizers turn the raw content of
//! one file into `EntityFragment`s; they never see other files.

pub mod markup;
pub mod spreadsheet;
pub mod tabular;

pub use markup::XmlNode;

use crate::error::{Result, ScreeningError};
use crate::similarity;
use crate::snapshot::RawContent;
use crate::types::{EntityFragment, FragmentAttribute};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Placeholder values some lists use for "unknown"
const SENTINELS: &[&str] = &["-0-", "nan"];

/// Hex digits of the name digest used for pseudo-identifiers
const PSEUDO_ID_DIGITS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    TabularWithHeader,
    TabularWithoutHeader,
    DelimitedWithPreamble,
    Markup,
    Spreadsheet,
}

/// Every file a snapshot may contain, in index fold order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceFile {
    OfacConsPrimary,
    OfacConsAlias,
    OfacConsAddress,
    OfacSdnPrimary,
    OfacSdnAlias,
    OfacSdnAddress,
    BisEntityList,
    BisDeniedPersons,
    BisUnverified,
    BisMilitaryEndUser,
    UnConsolidated,
    EuConsolidated,
    UkSanctions,
    CaSema,
    AuDfat,
    ChSeco,
    WbDebarred,
}

impl SourceFile {
    pub const ALL: [SourceFile; 17] = [
        SourceFile::OfacConsPrimary,
        SourceFile::OfacConsAlias,
        SourceFile::OfacConsAddress,
        SourceFile::OfacSdnPrimary,
        SourceFile::OfacSdnAlias,
        SourceFile::OfacSdnAddress,
        SourceFile::BisEntityList,
        SourceFile::BisDeniedPersons,
        SourceFile::BisUnverified,
        SourceFile::BisMilitaryEndUser,
        SourceFile::UnConsolidated,
        SourceFile::EuConsolidated,
        SourceFile::UkSanctions,
        SourceFile::CaSema,
        SourceFile::AuDfat,
        SourceFile::ChSeco,
        SourceFile::WbDebarred,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            SourceFile::OfacConsPrimary => "CONS_PRIM.CSV",
            SourceFile::OfacConsAlias => "CONS_ALT.CSV",
            SourceFile::OfacConsAddress => "CONS_ADD.CSV",
            SourceFile::OfacSdnPrimary => "SDN.CSV",
            SourceFile::OfacSdnAlias => "ALT.CSV",
            SourceFile::OfacSdnAddress => "ADD.CSV",
            SourceFile::BisEntityList => "bis_entity_list.csv",
            SourceFile::BisDeniedPersons => "bis_denied_persons.csv",
            SourceFile::BisUnverified => "bis_unverified.csv",
            SourceFile::BisMilitaryEndUser => "bis_meu.csv",
            SourceFile::UnConsolidated => "un_consolidated.xml",
            SourceFile::EuConsolidated => "eu_consolidated.csv",
            SourceFile::UkSanctions => "uk_sanctions.csv",
            SourceFile::CaSema => "sema_sanctions.xml",
            SourceFile::AuDfat => "au_sanctions.xlsx",
            SourceFile::ChSeco => "seco_sanctions.xml",
            SourceFile::WbDebarred => "wb_debarred.csv",
        }
    }

    pub fn from_file_name(name: &str) -> Option<SourceFile> {
        Self::ALL.into_iter().find(|file| file.file_name() == name)
    }

    /// List code the file feeds (BIS rows may override it per row).
    pub fn source_list(&self) -> &'static str {
        match self {
            SourceFile::OfacConsPrimary
            | SourceFile::OfacConsAlias
            | SourceFile::OfacConsAddress => "OFAC-CONS",
            SourceFile::OfacSdnPrimary | SourceFile::OfacSdnAlias | SourceFile::OfacSdnAddress => {
                "OFAC-SDN"
            }
            SourceFile::BisEntityList => "BIS-EL",
            SourceFile::BisDeniedPersons => "BIS-DPL",
            SourceFile::BisUnverified => "BIS-UVL",
            SourceFile::BisMilitaryEndUser => "BIS-MEU",
            SourceFile::UnConsolidated => "UN",
            SourceFile::EuConsolidated => "EU",
            SourceFile::UkSanctions => "UK",
            SourceFile::CaSema => "CA",
            SourceFile::AuDfat => "AU",
            SourceFile::ChSeco => "CH",
            SourceFile::WbDebarred => "WB",
        }
    }

    pub fn format(&self) -> SourceFormat {
        match self {
            SourceFile::OfacSdnPrimary | SourceFile::OfacSdnAlias | SourceFile::OfacSdnAddress => {
                SourceFormat::TabularWithoutHeader
            }
            SourceFile::UkSanctions => SourceFormat::DelimitedWithPreamble,
            SourceFile::UnConsolidated | SourceFile::CaSema | SourceFile::ChSeco => {
                SourceFormat::Markup
            }
            SourceFile::AuDfat => SourceFormat::Spreadsheet,
            _ => SourceFormat::TabularWithHeader,
        }
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// One decoded record of a tabular or spreadsheet source: header -> cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row(HashMap<String, String>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later values for a repeated header replace earlier ones.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.0.insert(field.into().trim().to_string(), value.into());
    }

    /// Trimmed value of `field`, absent when empty or a sentinel.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|value| present(value))
    }

    /// First present value among `fields`, tried in order
    pub fn first_of(&self, fields: &[&str]) -> Option<&str> {
        fields.iter().find_map(|field| self.get(field))
    }

    /// Present values of `fields` joined by `separator`
    pub fn joined(&self, fields: &[&str], separator: &str) -> Option<String> {
        join_present(fields.iter().map(|field| self.get(field)), separator)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (field, value) in iter {
            row.insert(field, value);
        }
        row
    }
}

/// Trim a raw value; empty strings and sentinel markers count as absent.
pub(crate) fn present(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || SENTINELS.contains(&trimmed) {
        None
    } else {
        Some(trimmed)
    }
}

pub(crate) fn join_present<'a>(
    parts: impl IntoIterator<Item = Option<&'a str>>,
    separator: &str,
) -> Option<String> {
    let parts: Vec<&str> = parts.into_iter().flatten().collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(separator))
    }
}

/// Deterministic identifier for records without a native one.
///
/// Two distinct parties whose names normalize identically under one source share
/// a pseudo-id and are merged.
pub fn pseudo_id(source_code: &str, name: &str) -> String {
    let digest = Sha256::digest(similarity::normalize(name).as_bytes());
    format!("{}-{}", source_code, &hex::encode(digest)[..PSEUDO_ID_DIGITS])
}

/// Collects fragments for one source file, dropping empty values.
#[derive(Debug, Default)]
pub(crate) struct FragmentSink {
    fragments: Vec<EntityFragment>,
}

impl FragmentSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, source_list: &str, entity_id: &str, attribute: FragmentAttribute) {
        self.fragments.push(EntityFragment {
            source_list: source_list.to_string(),
            entity_id: entity_id.to_string(),
            attribute,
        });
    }

    pub(crate) fn primary(&mut self, source_list: &str, entity_id: &str, name: &str) {
        if let Some(name) = present(name) {
            self.push(source_list, entity_id, FragmentAttribute::Primary(name.to_string()));
        }
    }

    pub(crate) fn alias(&mut self, source_list: &str, entity_id: &str, name: &str) {
        if let Some(name) = present(name) {
            self.push(source_list, entity_id, FragmentAttribute::Alias(name.to_string()));
        }
    }

    pub(crate) fn program(&mut self, source_list: &str, entity_id: &str, program: &str) {
        if let Some(program) = present(program) {
            self.push(source_list, entity_id, FragmentAttribute::Program(program.to_string()));
        }
    }

    pub(crate) fn address(&mut self, source_list: &str, entity_id: &str, address: &str) {
        if let Some(address) = present(address) {
            self.push(source_list, entity_id, FragmentAttribute::Address(address.to_string()));
        }
    }

    pub(crate) fn into_fragments(self) -> Vec<EntityFragment> {
        self.fragments
    }
}

/// Normalize the raw content of one source file into entity fragments.
///
/// Errors carry the file name; the index builder reports them as diagnostics.
pub fn normalize_source(file: SourceFile, content: &RawContent) -> Result<Vec<EntityFragment>> {
    normalize_content(file, content).map_err(|e| match e {
        ScreeningError::SourceParse { .. } => e,
        other => ScreeningError::SourceParse {
            file: file.file_name().to_string(),
            reason: other.to_string(),
        },
    })
}

fn normalize_content(file: SourceFile, content: &RawContent) -> Result<Vec<EntityFragment>> {
    if file.format() == SourceFormat::Markup {
        let document = match content {
            RawContent::Document(node) => Cow::Borrowed(node),
            RawContent::Bytes(bytes) => Cow::Owned(XmlNode::parse(bytes)?),
            RawContent::Rows(_) => {
                return Err(ScreeningError::Malformed(
                    "markup source supplied as rows".to_string(),
                ))
            }
        };
        return Ok(markup::normalize(file, &document));
    }

    let rows = match content {
        RawContent::Rows(rows) => Cow::Borrowed(rows),
        RawContent::Bytes(bytes) if file.format() == SourceFormat::Spreadsheet => {
            Cow::Owned(spreadsheet::decode_workbook(bytes)?)
        }
        RawContent::Bytes(bytes) => {
            Cow::Owned(tabular::decode_rows(bytes, &tabular::layout(file))?)
        }
        RawContent::Document(_) => {
            return Err(ScreeningError::Malformed(
                "tabular source supplied as a markup document".to_string(),
            ))
        }
    };

    Ok(match file.format() {
        SourceFormat::Spreadsheet => spreadsheet::normalize(file, &rows),
        _ => tabular::normalize(file, &rows),
    })
}
