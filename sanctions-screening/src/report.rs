//! Audit records and human-readable screening reports

use crate::error::Result;
use crate::screening::{ScreeningOutcome, ScreeningPolicy};
use crate::types::{Decision, EntityHit};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Report section order by regime prefix
const SOURCE_ORDER: &[&str] = &["OFAC", "BIS", "UN", "EU", "UK", "CA", "AU", "CH", "WB"];
const RULE_WIDTH: usize = 70;
const DETAIL_WIDTH: usize = 60;
const BAR_CELLS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditInput {
    pub company_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuditThresholds {
    pub review_threshold: f64,
    pub block_threshold: f64,
}

/// One JSON-lines audit entry per screening call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub screening_id: Uuid,
    pub timestamp_utc: String,
    pub snapshot_id: String,
    pub input: AuditInput,
    pub thresholds: AuditThresholds,
    pub decision: Decision,
    pub hits: Vec<EntityHit>,
}

impl AuditRecord {
    pub fn new(
        snapshot_id: impl Into<String>,
        company_name: impl Into<String>,
        policy: &ScreeningPolicy,
        outcome: ScreeningOutcome,
    ) -> Self {
        Self {
            screening_id: Uuid::new_v4(),
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            snapshot_id: snapshot_id.into(),
            input: AuditInput {
                company_name: company_name.into(),
            },
            thresholds: AuditThresholds {
                review_threshold: policy.review_threshold,
                block_threshold: policy.block_threshold,
            },
            decision: outcome.decision,
            hits: outcome.hits,
        }
    }

    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn write_line<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{}", self.to_json_line()?)?;
        Ok(())
    }

    /// Append to a JSON-lines file, creating it if needed
    pub fn append_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        self.write_line(&mut file)
    }

    pub fn text_report(&self) -> TextReport<'_> {
        TextReport { record: self }
    }
}

/// Plain-text rendering of an audit record, hits grouped by regime
pub struct TextReport<'a> {
    record: &'a AuditRecord,
}

pub fn render_text(record: &AuditRecord) -> String {
    record.text_report().to_string()
}

fn score_bar(score: f64) -> String {
    let filled = ((score / 10.0) as usize).min(BAR_CELLS);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

fn truncate_detail(text: &str) -> String {
    if text.chars().count() > DETAIL_WIDTH {
        let head: String = text.chars().take(DETAIL_WIDTH - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record;
        let rule = "=".repeat(RULE_WIDTH);

        writeln!(f, "{}", rule)?;
        writeln!(f, "SCREENING RESULT")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "  Query:       {}", record.input.company_name)?;
        writeln!(f, "  Snapshot:    {}", record.snapshot_id)?;
        writeln!(f, "  Screened:    {}", record.timestamp_utc)?;
        writeln!(f, "  Decision:    {}", record.decision)?;
        writeln!(f, "  Matches:     {}", record.hits.len())?;
        writeln!(f, "{}", rule)?;

        if record.hits.is_empty() {
            writeln!(f)?;
            writeln!(f, "  No matches found.")?;
        }

        let mut grouped: BTreeMap<&str, Vec<&EntityHit>> = BTreeMap::new();
        for hit in &record.hits {
            grouped.entry(hit.base_source()).or_default().push(hit);
        }

        for source in SOURCE_ORDER {
            let Some(hits) = grouped.get(source) else {
                continue;
            };
            writeln!(f)?;
            writeln!(f, "  {} MATCHES ({})", source, hits.len())?;
            writeln!(f, "  {}", "-".repeat(RULE_WIDTH - 4))?;
            for hit in hits {
                writeln!(f)?;
                writeln!(
                    f,
                    "  [{}] Score: {:5.1}% {}",
                    hit.source_list,
                    hit.best_score,
                    score_bar(hit.best_score)
                )?;
                writeln!(f, "  Name:    {}", hit.best_evidence.matched_value)?;
                writeln!(f, "  ID:      {}", hit.entity_id)?;
                if let Some(program) = hit.programs.first() {
                    writeln!(f, "  Program: {}", truncate_detail(program))?;
                }
                if let Some(address) = hit.addresses.first() {
                    writeln!(f, "  Address: {}", truncate_detail(address))?;
                }
            }
        }

        let thresholds = &record.thresholds;
        writeln!(f)?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "SCORING METHOD")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "  Score = 80% token overlap (Jaccard) + 20% character similarity")?;
        writeln!(f, "  - Tokens: words after lowercasing, removing punctuation")?;
        writeln!(f, "  - 100% = exact match | 50%+ = likely match | <30% = weak match")?;
        writeln!(
            f,
            "  - BLOCK >= {}% | REVIEW >= {}% | PASS < {}%",
            thresholds.block_threshold, thresholds.review_threshold, thresholds.review_threshold
        )?;
        writeln!(f, "{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvidenceField, MatchEvidence};

    fn hit(source_list: &str, id: &str, score: f64, program: &str) -> EntityHit {
        EntityHit {
            source_list: source_list.to_string(),
            entity_id: id.to_string(),
            best_score: score,
            best_evidence: MatchEvidence {
                field: EvidenceField::Primary,
                matched_value: format!("Name {}", id),
                score,
            },
            primary_names: vec![format!("Name {}", id)],
            alias_names: vec![],
            programs: vec![program.to_string()],
            addresses: vec![],
        }
    }

    fn record(hits: Vec<EntityHit>) -> AuditRecord {
        let decision = if hits.is_empty() { Decision::Pass } else { Decision::Review };
        AuditRecord::new(
            "20260101T000000_abc",
            "Acme Corporation",
            &ScreeningPolicy::default(),
            ScreeningOutcome { decision, hits },
        )
    }

    #[test]
    fn test_json_line_layout() {
        let line = record(vec![hit("UN", "QDe.1", 41.07, "UN: Al-Qaida")]).to_json_line().unwrap();
        assert!(!line.contains('\n'));

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["snapshot_id"], "20260101T000000_abc");
        assert_eq!(value["input"]["company_name"], "Acme Corporation");
        assert_eq!(value["thresholds"]["block_threshold"], 90.0);
        assert_eq!(value["decision"], "REVIEW");
        assert_eq!(value["hits"][0]["best_evidence"]["field"], "primary");
        assert!(value["timestamp_utc"].as_str().unwrap().ends_with("+00:00"));
    }

    #[test]
    fn test_append_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        record(vec![]).append_to(&path).unwrap();
        record(vec![]).append_to(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 2);
    }

    #[test]
    fn test_text_report_groups_by_source() {
        let long_program = "P".repeat(80);
        let text = render_text(&record(vec![
            hit("WB", "w1", 35.0, "WB: Debarred"),
            hit("OFAC-SDN", "306", 88.0, &long_program),
            hit("BIS-EL", "b1", 50.0, "BIS-EL"),
        ]));

        let ofac = text.find("OFAC MATCHES (1)").unwrap();
        let bis = text.find("BIS MATCHES (1)").unwrap();
        let wb = text.find("WB MATCHES (1)").unwrap();
        assert!(ofac < bis && bis < wb);
        assert!(text.contains(" 88.0% ████████░░"));
        assert!(text.contains(&format!("Program: {}...", "P".repeat(57))));
        assert!(text.contains("BLOCK >= 90% | REVIEW >= 20% | PASS < 20%"));
    }

    #[test]
    fn test_text_report_without_hits() {
        assert!(render_text(&record(vec![])).contains("No matches found."));
    }

    #[test]
    fn test_score_bar_bounds() {
        assert_eq!(score_bar(0.0), "░".repeat(10));
        assert_eq!(score_bar(100.0), "█".repeat(10));
    }
}
