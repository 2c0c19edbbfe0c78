use crate::error::{Result, ScreeningError};
use crate::index::{EntityIndex, IndexedEntity};
use crate::similarity;
use crate::types::{Decision, EntityHit, EvidenceField, MatchEvidence};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Caller-supplied thresholds. `block_threshold >= review_threshold` is expected
/// but not checked; the two comparisons are independent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningPolicy {
    pub top_k: usize,
    pub review_threshold: f64,
    pub block_threshold: f64,
}

impl Default for ScreeningPolicy {
    fn default() -> Self {
        Self {
            top_k: 10,
            review_threshold: 20.0,
            block_threshold: 90.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    pub decision: Decision,
    pub hits: Vec<EntityHit>,
}

/// Best evidence for one entity. Primary names are tried first and an alias
/// only takes over on a strictly greater score.
fn best_evidence(query: &str, entry: &IndexedEntity) -> Option<MatchEvidence> {
    let primaries = entry
        .entity
        .primary_names
        .iter()
        .zip(&entry.primary_normalized)
        .map(|(raw, normalized)| (EvidenceField::Primary, raw, normalized));
    let aliases = entry
        .entity
        .alias_names
        .iter()
        .zip(&entry.alias_normalized)
        .map(|(raw, normalized)| (EvidenceField::Alias, raw, normalized));

    let mut best: Option<MatchEvidence> = None;
    for (field, raw, normalized) in primaries.chain(aliases) {
        let score = similarity::score_normalized(query, normalized);
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(MatchEvidence {
                field,
                matched_value: raw.clone(),
                score,
            });
        }
    }
    best
}

fn evaluate(query: &str, entry: &IndexedEntity, review_threshold: f64) -> Option<EntityHit> {
    let evidence = best_evidence(query, entry)?;
    if evidence.score < review_threshold {
        return None;
    }
    debug!(
        "{}:{} matched {} '{}' ({:.2})",
        entry.entity.source_list,
        entry.entity.entity_id,
        evidence.field.as_str(),
        evidence.matched_value,
        evidence.score
    );
    Some(EntityHit::new(&entry.entity, evidence))
}

#[cfg(feature = "parallel")]
fn collect_hits(query: &str, index: &EntityIndex, review_threshold: f64) -> Vec<EntityHit> {
    index
        .entries()
        .par_iter()
        .filter_map(|entry| evaluate(query, entry, review_threshold))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn collect_hits(query: &str, index: &EntityIndex, review_threshold: f64) -> Vec<EntityHit> {
    index
        .entries()
        .iter()
        .filter_map(|entry| evaluate(query, entry, review_threshold))
        .collect()
}

/// Screen one name against the index.
///
/// Hits come back best first; equal scores keep index order. Fails only when
/// the query normalizes to nothing.
pub fn screen(
    query: &str,
    index: &EntityIndex,
    policy: &ScreeningPolicy,
) -> Result<ScreeningOutcome> {
    let normalized = similarity::normalize(query);
    if normalized.is_empty() {
        return Err(ScreeningError::InvalidInput(format!(
            "query {:?} has no alphanumeric content",
            query
        )));
    }

    let mut hits = collect_hits(&normalized, index, policy.review_threshold);
    hits.sort_by(|a, b| b.best_score.total_cmp(&a.best_score));
    hits.truncate(policy.top_k);

    let decision = match hits.first() {
        Some(top) if top.best_score >= policy.block_threshold => Decision::Block,
        Some(_) => Decision::Review,
        None => Decision::Pass,
    };

    Ok(ScreeningOutcome { decision, hits })
}

/// Screens names against a shared, immutable index
#[derive(Debug, Clone)]
pub struct Screener {
    index: Arc<EntityIndex>,
    policy: ScreeningPolicy,
}

impl Screener {
    pub fn new(index: Arc<EntityIndex>, policy: ScreeningPolicy) -> Self {
        Self { index, policy }
    }

    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    pub fn policy(&self) -> &ScreeningPolicy {
        &self.policy
    }

    pub fn screen(&self, company_name: &str) -> Result<ScreeningOutcome> {
        let outcome = screen(company_name, &self.index, &self.policy)?;

        match (outcome.decision, outcome.hits.first()) {
            (Decision::Block, Some(top)) => info!(
                "Screening BLOCK for {} (score: {:.2}, hit: {}:{})",
                company_name, top.best_score, top.source_list, top.entity_id
            ),
            (Decision::Review, Some(top)) => info!(
                "Screening REVIEW for {} (score: {:.2}, {} hits)",
                company_name,
                top.best_score,
                outcome.hits.len()
            ),
            _ => {}
        }

        Ok(outcome)
    }

    /// Batch screening for multiple names
    pub fn screen_batch<S: AsRef<str>>(&self, names: &[S]) -> Vec<Result<ScreeningOutcome>> {
        names.iter().map(|name| self.screen(name.as_ref())).collect()
    }

    /// Whether the outcome lets the counterparty through without review
    pub fn is_clear(outcome: &ScreeningOutcome) -> bool {
        outcome.decision == Decision::Pass
    }
}
