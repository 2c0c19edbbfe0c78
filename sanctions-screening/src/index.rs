//! Entity index
//!
//! Fragments from every source are folded into per-key drafts held in an arena
//! (`IndexBuilder`), then frozen into an immutable `EntityIndex`. Names are
//! normalized once here so screening never re-normalizes candidates.

use crate::error::ScreeningError;
use crate::similarity;
use crate::snapshot::SnapshotProvider;
use crate::sources::{self, SourceFile};
use crate::types::{Entity, EntityFragment, EntityKey, FragmentAttribute, SourceParseFailure};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug)]
struct EntityDraft {
    key: EntityKey,
    primary_names: Vec<String>,
    alias_names: Vec<String>,
    programs: BTreeSet<String>,
    addresses: BTreeSet<String>,
}

impl EntityDraft {
    fn new(key: EntityKey) -> Self {
        Self {
            key,
            primary_names: Vec::new(),
            alias_names: Vec::new(),
            programs: BTreeSet::new(),
            addresses: BTreeSet::new(),
        }
    }

    fn absorb(&mut self, attribute: FragmentAttribute) {
        match attribute {
            FragmentAttribute::Primary(name) => push_unique(&mut self.primary_names, name),
            FragmentAttribute::Alias(name) => push_unique(&mut self.alias_names, name),
            FragmentAttribute::Program(program) => {
                self.programs.insert(program);
            }
            FragmentAttribute::Address(address) => {
                self.addresses.insert(address);
            }
        }
    }
}

fn push_unique(names: &mut Vec<String>, name: String) {
    if !names.contains(&name) {
        names.push(name);
    }
}

/// Accumulates fragments keyed by `(source_list, entity_id)`.
#[derive(Debug, Default)]
pub struct IndexBuilder {
    drafts: Vec<EntityDraft>,
    positions: HashMap<EntityKey, usize>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, fragment: EntityFragment) {
        let key = fragment.key();
        let slot = match self.positions.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.drafts.len();
                self.positions.insert(key.clone(), slot);
                self.drafts.push(EntityDraft::new(key));
                slot
            }
        };
        self.drafts[slot].absorb(fragment.attribute);
    }

    pub fn extend(&mut self, fragments: impl IntoIterator<Item = EntityFragment>) {
        for fragment in fragments {
            self.add(fragment);
        }
    }

    /// Freeze the drafts. Entities without a primary name are not indexed.
    pub fn finish(self) -> EntityIndex {
        let mut entries = Vec::with_capacity(self.drafts.len());
        let mut positions = HashMap::with_capacity(self.drafts.len());

        for draft in self.drafts {
            if draft.primary_names.is_empty() {
                debug!("Dropping {} (no primary name)", draft.key);
                continue;
            }
            positions.insert(draft.key.clone(), entries.len());
            entries.push(IndexedEntity::new(Entity {
                source_list: draft.key.source_list,
                entity_id: draft.key.entity_id,
                primary_names: draft.primary_names,
                alias_names: draft.alias_names,
                programs: draft.programs,
                addresses: draft.addresses,
            }));
        }

        EntityIndex { entries, positions }
    }
}

/// Entity with its names pre-normalized for scoring
#[derive(Debug, Clone)]
pub struct IndexedEntity {
    pub entity: Entity,
    pub(crate) primary_normalized: Vec<String>,
    pub(crate) alias_normalized: Vec<String>,
}

impl IndexedEntity {
    fn new(entity: Entity) -> Self {
        let primary_normalized = entity
            .primary_names
            .iter()
            .map(|n| similarity::normalize(n))
            .collect();
        let alias_normalized = entity
            .alias_names
            .iter()
            .map(|n| similarity::normalize(n))
            .collect();
        Self {
            entity,
            primary_normalized,
            alias_normalized,
        }
    }
}

/// Immutable index of entities in first-seen order
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    entries: Vec<IndexedEntity>,
    positions: HashMap<EntityKey, usize>,
}

impl EntityIndex {
    pub fn from_fragments(fragments: impl IntoIterator<Item = EntityFragment>) -> Self {
        let mut builder = IndexBuilder::new();
        builder.extend(fragments);
        builder.finish()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.positions.get(key).map(|&slot| &self.entries[slot].entity)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entries.iter().map(|entry| &entry.entity)
    }

    pub(crate) fn entries(&self) -> &[IndexedEntity] {
        &self.entries
    }
}

/// Result of building an index from one snapshot
#[derive(Debug, Clone)]
pub struct IndexBuild {
    pub snapshot_id: String,
    pub index: EntityIndex,
    /// Files that were present and normalized, in catalog order
    pub loaded: Vec<SourceFile>,
    pub failures: Vec<SourceParseFailure>,
}

enum FileOutcome {
    Missing,
    Loaded(Vec<EntityFragment>),
    Failed(String),
}

fn load_file(provider: &dyn SnapshotProvider, file: SourceFile) -> FileOutcome {
    let content = match provider.fetch(file) {
        Ok(Some(content)) => content,
        Ok(None) => return FileOutcome::Missing,
        Err(e) => return FileOutcome::Failed(e.to_string()),
    };

    match sources::normalize_source(file, &content) {
        Ok(fragments) => FileOutcome::Loaded(fragments),
        Err(ScreeningError::SourceParse { reason, .. }) => FileOutcome::Failed(reason),
        Err(e) => FileOutcome::Failed(e.to_string()),
    }
}

#[cfg(feature = "parallel")]
fn load_all(provider: &dyn SnapshotProvider) -> Vec<(SourceFile, FileOutcome)> {
    SourceFile::ALL
        .par_iter()
        .map(|&file| (file, load_file(provider, file)))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn load_all(provider: &dyn SnapshotProvider) -> Vec<(SourceFile, FileOutcome)> {
    SourceFile::ALL
        .iter()
        .map(|&file| (file, load_file(provider, file)))
        .collect()
}

/// Normalize every catalog file the snapshot holds and fold them into an index.
///
/// Absent files are skipped. A file that fails to read or normalize contributes
/// nothing and is reported in `IndexBuild::failures`.
pub fn build_index(provider: &dyn SnapshotProvider) -> IndexBuild {
    let mut builder = IndexBuilder::new();
    let mut loaded = Vec::new();
    let mut failures = Vec::new();

    for (file, outcome) in load_all(provider) {
        match outcome {
            FileOutcome::Missing => debug!("Source {} not in snapshot", file),
            FileOutcome::Loaded(fragments) => {
                debug!("Source {} produced {} fragments", file, fragments.len());
                builder.extend(fragments);
                loaded.push(file);
            }
            FileOutcome::Failed(reason) => {
                warn!("Failed to parse {}: {}", file, reason);
                failures.push(SourceParseFailure {
                    file,
                    source_list: file.source_list().to_string(),
                    reason,
                });
            }
        }
    }

    let index = builder.finish();
    info!(
        "Built index for snapshot {}: {} entities from {} sources ({} failed)",
        provider.snapshot_id(),
        index.len(),
        loaded.len(),
        failures.len()
    );

    IndexBuild {
        snapshot_id: provider.snapshot_id().to_string(),
        index,
        loaded,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotContents;

    fn fragment(list: &str, id: &str, attribute: FragmentAttribute) -> EntityFragment {
        EntityFragment {
            source_list: list.to_string(),
            entity_id: id.to_string(),
            attribute,
        }
    }

    #[test]
    fn test_merge_rules() {
        let index = EntityIndex::from_fragments(vec![
            fragment("UN", "QDe.1", FragmentAttribute::Primary("AL QAIDA".into())),
            fragment("UN", "QDe.1", FragmentAttribute::Alias("The Base".into())),
            fragment("UN", "QDe.1", FragmentAttribute::Primary("AL QAIDA".into())),
            fragment("UN", "QDe.1", FragmentAttribute::Primary("Al-Qaeda".into())),
            fragment("UN", "QDe.1", FragmentAttribute::Program("UN: Al-Qaida".into())),
            fragment("UN", "QDe.1", FragmentAttribute::Program("UN: Al-Qaida".into())),
            fragment("EU", "QDe.1", FragmentAttribute::Primary("AL QAIDA".into())),
        ]);

        assert_eq!(index.len(), 2);
        let un = index.get(&EntityKey::new("UN", "QDe.1")).unwrap();
        assert_eq!(un.primary_names, vec!["AL QAIDA", "Al-Qaeda"]);
        assert_eq!(un.alias_names, vec!["The Base"]);
        assert_eq!(un.programs.len(), 1);
        assert!(index.get(&EntityKey::new("EU", "QDe.1")).is_some());
    }

    #[test]
    fn test_entity_without_primary_is_hidden() {
        let index = EntityIndex::from_fragments(vec![
            fragment("OFAC-SDN", "7", FragmentAttribute::Alias("Orphan".into())),
            fragment("OFAC-SDN", "7", FragmentAttribute::Address("Havana".into())),
        ]);
        assert!(index.is_empty());
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let index = EntityIndex::from_fragments(vec![
            fragment("WB", "b", FragmentAttribute::Primary("Beta".into())),
            fragment("WB", "a", FragmentAttribute::Primary("Alpha".into())),
        ]);
        let ids: Vec<&str> = index.entities().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_build_isolates_failures() {
        let snapshot = SnapshotContents::new("snap")
            .with_bytes(SourceFile::OfacSdnPrimary, "306,\"BANCO NACIONAL DE CUBA\",-0-,\"CUBA\"\n")
            .with_bytes(SourceFile::UnConsolidated, "<CONSOLIDATED_LIST><INDIVIDUALS>");

        let build = build_index(&snapshot);

        assert_eq!(build.snapshot_id, "snap");
        assert_eq!(build.loaded, vec![SourceFile::OfacSdnPrimary]);
        assert_eq!(build.failures.len(), 1);
        assert_eq!(build.failures[0].file, SourceFile::UnConsolidated);
        assert_eq!(build.failures[0].source_list, "UN");
        assert!(build.index.get(&EntityKey::new("OFAC-SDN", "306")).is_some());
    }

    #[test]
    fn test_empty_snapshot() {
        let build = build_index(&SnapshotContents::new("empty"));
        assert!(build.index.is_empty());
        assert!(build.loaded.is_empty());
        assert!(build.failures.is_empty());
    }
}
