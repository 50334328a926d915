//! Counter snapshots and the diff engine.
//!
//! A [`Snapshot`] holds one family's monotonically increasing counters at one
//! instant. Two snapshots of the same family diff into per-key deltas, unless
//! some counter went backwards, in which case the whole diff is unavailable.
//! [`SnapshotSet`] extends the same rule to families with one snapshot per
//! device or interface.

use serde_json::Value;
use std::collections::BTreeMap;

/// Field map of one emitted record.
pub type Fields = BTreeMap<String, Value>;

/// A closed set of counter names for one metric family.
pub trait CounterName: Copy + Ord + Send + Sync + 'static {
    /// Name used as the field key in emitted records.
    fn as_str(&self) -> &'static str;
}

/// Counter values of one family at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<K: CounterName> {
    counters: BTreeMap<K, u64>,
}

impl<K: CounterName> Default for Snapshot<K> {
    fn default() -> Self {
        Self {
            counters: BTreeMap::new(),
        }
    }
}

impl<K: CounterName> FromIterator<(K, u64)> for Snapshot<K> {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        Self {
            counters: iter.into_iter().collect(),
        }
    }
}

impl<K: CounterName> Snapshot<K> {
    pub fn get(&self, key: K) -> Option<u64> {
        self.counters.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, u64)> + '_ {
        self.counters.iter().map(|(k, v)| (*k, *v))
    }

    /// Per-key `self - previous` over the keys of `self`.
    ///
    /// A missing previous (or a key missing from it) counts as zero. Returns
    /// `None` if any counter decreased: the source was reset or wrapped, and
    /// no part of this snapshot can be trusted as a delta.
    pub fn diff(&self, previous: Option<&Snapshot<K>>) -> Option<Snapshot<K>> {
        let mut out = BTreeMap::new();
        for (&key, &current) in &self.counters {
            let prev = previous.and_then(|p| p.get(key)).unwrap_or(0);
            out.insert(key, current.checked_sub(prev)?);
        }
        Some(Self { counters: out })
    }

    pub fn to_fields(&self) -> Fields {
        self.counters
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), Value::from(*v)))
            .collect()
    }
}

/// Snapshots keyed by entity (disk device, network interface).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSet<K: CounterName> {
    /// Field name the entity id is emitted under, e.g. `dev`.
    label: &'static str,
    entities: BTreeMap<String, Snapshot<K>>,
}

impl<K: CounterName> SnapshotSet<K> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entities: BTreeMap::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn insert(&mut self, entity: impl Into<String>, snapshot: Snapshot<K>) {
        self.entities.insert(entity.into(), snapshot);
    }

    pub fn get(&self, entity: &str) -> Option<&Snapshot<K>> {
        self.entities.get(entity)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Diff every entity that is present in both sets.
    ///
    /// New entities are skipped (nothing to diff against yet) and vanished
    /// ones are ignored. A reset on any counter of any entity makes the whole
    /// set unavailable, so a tick's multi-entity output is all-or-nothing.
    pub fn diff(&self, previous: Option<&SnapshotSet<K>>) -> Option<SnapshotSet<K>> {
        let mut out = SnapshotSet::new(self.label);
        let Some(previous) = previous else {
            return Some(out);
        };
        for (entity, current) in &self.entities {
            let Some(prev) = previous.entities.get(entity) else {
                continue;
            };
            out.entities.insert(entity.clone(), current.diff(Some(prev))?);
        }
        Some(out)
    }

    /// One field map per entity, with the entity id under `label`.
    pub fn to_fields(&self) -> Vec<Fields> {
        self.entities
            .iter()
            .map(|(entity, snapshot)| {
                let mut fields = snapshot.to_fields();
                fields.insert(self.label.to_string(), Value::from(entity.as_str()));
                fields
            })
            .collect()
    }
}

/// A sample that the scheduler diffs before emitting.
pub trait Diffable: Sized + Send + Sync + 'static {
    /// `None` means the delta is unavailable for this tick.
    fn diff_from(&self, previous: &Self) -> Option<Self>;

    fn records(&self) -> Vec<Fields>;
}

impl<K: CounterName> Diffable for Snapshot<K> {
    fn diff_from(&self, previous: &Self) -> Option<Self> {
        self.diff(Some(previous))
    }

    fn records(&self) -> Vec<Fields> {
        vec![self.to_fields()]
    }
}

impl<K: CounterName> Diffable for SnapshotSet<K> {
    fn diff_from(&self, previous: &Self) -> Option<Self> {
        self.diff(Some(previous))
    }

    fn records(&self) -> Vec<Fields> {
        self.to_fields()
    }
}
