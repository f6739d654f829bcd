//! In-memory assessment record store
//!
//! Records live behind one `Mutex` each so that verdict submission and
//! finalization on a record are serialized while different records proceed
//! in parallel. A secondary index keyed by escalation level tracks open
//! records for the `pending` queues. The whole store can be exported to and
//! restored from a versioned JSON snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::types::*;
use crate::error::{ResolutionError, ResolutionResult};
use crate::recommendation::SystemRecommendation;

/// Shared reference to AssessmentStore
pub type SharedAssessmentStore = Arc<AssessmentStore>;

type RecordCell = Arc<Mutex<AssessmentRecord>>;

/// Serialized form of the whole store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Schema version for forward compatibility.
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub records: Vec<AssessmentRecord>,
}

impl StoreSnapshot {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;
}

/// Outcome of a create call
#[derive(Debug, Clone)]
pub struct Created {
    pub record: AssessmentRecord,
    /// False when an open record for the same cycle already existed
    pub inserted: bool,
}

/// Per-record locked record store
#[derive(Default)]
pub struct AssessmentStore {
    records: RwLock<HashMap<RecordId, RecordCell>>,
    /// Latest record per cycle identity; only consulted while open
    cycles: Mutex<HashMap<CycleKey, RecordId>>,
    /// Open records by escalation level
    pending: RwLock<BTreeMap<EscalationLevel, BTreeSet<RecordId>>>,
}

impl AssessmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedAssessmentStore {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn cell(&self, record_id: &str) -> ResolutionResult<RecordCell> {
        let records = self
            .records
            .read()
            .map_err(|_| ResolutionError::LockPoisoned("records"))?;
        records
            .get(record_id)
            .cloned()
            .ok_or_else(|| ResolutionError::not_found(record_id))
    }

    fn read_cell(cell: &RecordCell) -> ResolutionResult<AssessmentRecord> {
        cell.lock()
            .map(|record| record.clone())
            .map_err(|_| ResolutionError::LockPoisoned("record"))
    }

    /// Snapshot of one record
    pub fn get(&self, record_id: &str) -> ResolutionResult<AssessmentRecord> {
        Self::read_cell(&self.cell(record_id)?)
    }

    /// The open record for a cycle, if one exists
    pub fn find_open(&self, key: &CycleKey) -> ResolutionResult<Option<AssessmentRecord>> {
        let cycles = self
            .cycles
            .lock()
            .map_err(|_| ResolutionError::LockPoisoned("cycles"))?;
        self.open_for_cycle(&cycles, key)
    }

    fn open_for_cycle(
        &self,
        cycles: &HashMap<CycleKey, RecordId>,
        key: &CycleKey,
    ) -> ResolutionResult<Option<AssessmentRecord>> {
        let Some(id) = cycles.get(key) else {
            return Ok(None);
        };
        let record = self.get(id)?;
        Ok((!record.is_finalized()).then_some(record))
    }

    /// All records, oldest first
    pub fn list(&self) -> ResolutionResult<Vec<AssessmentRecord>> {
        let cells: Vec<RecordCell> = self
            .records
            .read()
            .map_err(|_| ResolutionError::LockPoisoned("records"))?
            .values()
            .cloned()
            .collect();

        let mut records = cells
            .iter()
            .map(Self::read_cell)
            .collect::<ResolutionResult<Vec<_>>>()?;
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Open records currently waiting at `level`, oldest first
    pub fn pending(&self, level: EscalationLevel) -> ResolutionResult<Vec<AssessmentRecord>> {
        let ids: Vec<RecordId> = self
            .pending
            .read()
            .map_err(|_| ResolutionError::LockPoisoned("pending index"))?
            .get(&level)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            // The index is read before the records; a record that moved or
            // finalized between the two reads is skipped.
            let record = match self.get(&id) {
                Ok(record) => record,
                Err(ResolutionError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            };
            if !record.is_finalized() && record.escalation_level == level {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Create the record for a cycle, or return the open one if it exists.
    pub fn create(
        &self,
        key: CycleKey,
        recommendation: SystemRecommendation,
    ) -> ResolutionResult<Created> {
        let mut cycles = self
            .cycles
            .lock()
            .map_err(|_| ResolutionError::LockPoisoned("cycles"))?;

        if let Some(record) = self.open_for_cycle(&cycles, &key)? {
            debug!(record_id = %record.id, "Open record already exists for cycle");
            return Ok(Created {
                record,
                inserted: false,
            });
        }

        let record = AssessmentRecord::new(&key, &recommendation);
        self.insert(record.clone())?;
        cycles.insert(key, record.id.clone());

        Ok(Created {
            record,
            inserted: true,
        })
    }

    /// Records map first, then the pending index, so an indexed id always resolves
    fn insert(&self, record: AssessmentRecord) -> ResolutionResult<()> {
        let id = record.id.clone();
        let level = record.escalation_level;
        let open = !record.is_finalized();

        self.records
            .write()
            .map_err(|_| ResolutionError::LockPoisoned("records"))?
            .insert(id.clone(), Arc::new(Mutex::new(record)));

        if open {
            self.pending
                .write()
                .map_err(|_| ResolutionError::LockPoisoned("pending index"))?
                .entry(level)
                .or_default()
                .insert(id);
        }
        Ok(())
    }

    /// Atomic read-modify-write of one record.
    ///
    /// `apply` works on a copy. The copy is committed only if `apply`
    /// succeeds and the result passes [`AssessmentRecord::check_transition`];
    /// otherwise the stored record is left untouched.
    pub fn update<T, F>(&self, record_id: &str, apply: F) -> ResolutionResult<(T, AssessmentRecord)>
    where
        F: FnOnce(&mut AssessmentRecord) -> ResolutionResult<T>,
    {
        let cell = self.cell(record_id)?;
        let mut current = cell
            .lock()
            .map_err(|_| ResolutionError::LockPoisoned("record"))?;

        let mut next = current.clone();
        let output = apply(&mut next)?;

        if let Err(e) = current.check_transition(&next) {
            error!(
                record_id,
                error = %e,
                current = %current.summary(),
                attempted = %next.summary(),
                "Rejected invalid record mutation"
            );
            return Err(e);
        }

        if *current != next {
            self.reindex(&current, &next)?;
            *current = next;
        }

        Ok((output, current.clone()))
    }

    fn reindex(&self, before: &AssessmentRecord, after: &AssessmentRecord) -> ResolutionResult<()> {
        let was_open = !before.is_finalized();
        let is_open = !after.is_finalized();
        if was_open == is_open && before.escalation_level == after.escalation_level {
            return Ok(());
        }

        let mut pending = self
            .pending
            .write()
            .map_err(|_| ResolutionError::LockPoisoned("pending index"))?;
        if was_open {
            if let Some(ids) = pending.get_mut(&before.escalation_level) {
                ids.remove(&before.id);
            }
        }
        if is_open {
            pending
                .entry(after.escalation_level)
                .or_default()
                .insert(after.id.clone());
        }
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Export every record
    pub fn snapshot(&self) -> ResolutionResult<StoreSnapshot> {
        Ok(StoreSnapshot {
            version: StoreSnapshot::CURRENT_VERSION,
            exported_at: Utc::now(),
            records: self.list()?,
        })
    }

    /// Rebuild a store (including both indexes) from a snapshot
    pub fn from_snapshot(snapshot: StoreSnapshot) -> ResolutionResult<Self> {
        if snapshot.version > StoreSnapshot::CURRENT_VERSION {
            return Err(ResolutionError::SnapshotVersion {
                found: snapshot.version,
                supported: StoreSnapshot::CURRENT_VERSION,
            });
        }

        let store = Self::new();
        {
            let mut cycles = store
                .cycles
                .lock()
                .map_err(|_| ResolutionError::LockPoisoned("cycles"))?;
            // Records are oldest first, so the newest record wins the cycle slot
            let mut records = snapshot.records;
            records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            for record in records {
                cycles.insert(record.cycle_key(), record.id.clone());
                store.insert(record)?;
            }
        }
        Ok(store)
    }

    /// Write a pretty-printed JSON snapshot to `path`
    pub fn save_to(&self, path: impl AsRef<Path>) -> ResolutionResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot()?)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "Store snapshot saved");
        Ok(())
    }

    /// Load a snapshot from `path`; a missing file yields an empty store
    pub fn load_from(path: impl AsRef<Path>) -> ResolutionResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
        Self::from_snapshot(snapshot)
    }
}
