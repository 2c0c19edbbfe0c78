use crate::sources::SourceFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Number of names/addresses carried on a hit for display.
pub const DISPLAY_LIMIT: usize = 5;

/// Identity of an entity: unique within its source list, never unified across lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub source_list: String,
    pub entity_id: String,
}

impl EntityKey {
    pub fn new(source_list: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            source_list: source_list.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_list, self.entity_id)
    }
}

/// Canonical party record from one sanctions or export-control list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub source_list: String,
    pub entity_id: String,
    /// The list's own designations, first-seen order
    pub primary_names: Vec<String>,
    /// "Also known as" names, first-seen order
    pub alias_names: Vec<String>,
    pub programs: BTreeSet<String>,
    pub addresses: BTreeSet<String>,
}

impl Entity {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.source_list.clone(), self.entity_id.clone())
    }
}

/// The single attribute a normalizer contributes to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentAttribute {
    Primary(String),
    Alias(String),
    Program(String),
    Address(String),
}

/// Partial entity emitted by a source normalizer, merged by the index builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFragment {
    pub source_list: String,
    pub entity_id: String,
    pub attribute: FragmentAttribute,
}

impl EntityFragment {
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.source_list.clone(), self.entity_id.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceField {
    Primary,
    Alias,
}

impl EvidenceField {
    pub fn as_str(&self) -> &str {
        match self {
            EvidenceField::Primary => "primary",
            EvidenceField::Alias => "alias",
        }
    }
}

/// Best supporting text for one entity against one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvidence {
    pub field: EvidenceField,
    pub matched_value: String,
    pub score: f64, // 0-100
}

/// Entity that passed the review floor, with truncated display views.
///
/// Field order is the audit record layout and must not be reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityHit {
    pub source_list: String,
    pub entity_id: String,
    pub best_score: f64,
    pub best_evidence: MatchEvidence,
    pub primary_names: Vec<String>,
    pub alias_names: Vec<String>,
    pub programs: Vec<String>,
    pub addresses: Vec<String>,
}

impl EntityHit {
    pub fn new(entity: &Entity, evidence: MatchEvidence) -> Self {
        Self {
            source_list: entity.source_list.clone(),
            entity_id: entity.entity_id.clone(),
            best_score: evidence.score,
            best_evidence: evidence,
            primary_names: entity.primary_names.iter().take(DISPLAY_LIMIT).cloned().collect(),
            alias_names: entity.alias_names.iter().take(DISPLAY_LIMIT).cloned().collect(),
            programs: entity.programs.iter().cloned().collect(),
            addresses: entity.addresses.iter().take(DISPLAY_LIMIT).cloned().collect(),
        }
    }

    /// Regime prefix of the source list ("OFAC" for "OFAC-SDN").
    pub fn base_source(&self) -> &str {
        self.source_list.split('-').next().unwrap_or(&self.source_list)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Pass,
    Review,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &str {
        match self {
            Decision::Pass => "PASS",
            Decision::Review => "REVIEW",
            Decision::Block => "BLOCK",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic for a source file that could not be normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceParseFailure {
    pub file: SourceFile,
    pub source_list: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entity() -> Entity {
        Entity {
            source_list: "OFAC-SDN".to_string(),
            entity_id: "306".to_string(),
            primary_names: (1..=7).map(|i| format!("Name {i}")).collect(),
            alias_names: vec!["Alias".to_string()],
            programs: ["SDGT".to_string(), "IRAN".to_string()].into_iter().collect(),
            addresses: (1..=7).map(|i| format!("Street {i}")).collect(),
        }
    }

    #[test]
    fn test_hit_truncates_display_views() {
        let evidence = MatchEvidence {
            field: EvidenceField::Primary,
            matched_value: "Name 1".to_string(),
            score: 100.0,
        };
        let hit = EntityHit::new(&sample_entity(), evidence);

        assert_eq!(hit.primary_names.len(), DISPLAY_LIMIT);
        assert_eq!(hit.primary_names[0], "Name 1");
        assert_eq!(hit.addresses.len(), DISPLAY_LIMIT);
        assert_eq!(hit.programs, vec!["IRAN", "SDGT"]);
        assert_eq!(hit.base_source(), "OFAC");
    }

    #[test]
    fn test_hit_serializes_in_audit_order() {
        let evidence = MatchEvidence {
            field: EvidenceField::Alias,
            matched_value: "Alias".to_string(),
            score: 55.5,
        };
        let json = serde_json::to_string(&EntityHit::new(&sample_entity(), evidence)).unwrap();

        let order = [
            "\"source_list\"",
            "\"entity_id\"",
            "\"best_score\"",
            "\"best_evidence\"",
            "\"primary_names\"",
            "\"alias_names\"",
            "\"programs\"",
            "\"addresses\"",
        ];
        let positions: Vec<usize> = order.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"field\":\"alias\""));
    }

    #[test]
    fn test_decision_serialization() {
        assert_eq!(serde_json::to_string(&Decision::Block).unwrap(), "\"BLOCK\"");
        assert_eq!(Decision::Review.to_string(), "REVIEW");
    }
}
