//! Reminder persistence: previously-successful bound configurations ranked
//! by historical acceptance, used to warm-start future searches.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hone_types::{BoundsSnapshot, HoneResult};

/// Absolute tolerance when matching a solved bound configuration against a
/// stored reminder.
pub const MATCH_TOLERANCE: f64 = 5.0;

/// One previously-successful bound configuration for a search identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Historical acceptance score: +1 per matching success, plus a
    /// fractional soft credit when the reminder seeded a successful search.
    #[serde(rename = "acceptCount")]
    pub accept_count: f64,
    /// Fewest iterations any successful search needed from these bounds.
    pub iteration: usize,
    pub values: Vec<BoundsSnapshot>,
}

/// Index of the first reminder whose stored bounds lie within
/// [`MATCH_TOLERANCE`] of the snapshot, on every dimension.
pub fn find_match(snapshot: &[BoundsSnapshot], reminders: &[Reminder]) -> Option<usize> {
    reminders.iter().position(|reminder| {
        snapshot.iter().all(|bound| {
            reminder.values.iter().any(|stored| {
                stored.name == bound.name
                    && (stored.min - bound.min).abs() <= MATCH_TOLERANCE
                    && (stored.max - bound.max).abs() <= MATCH_TOLERANCE
            })
        })
    })
}

/// Durable storage for per-identity reminder lists. Backends are swappable
/// without touching the search engine.
pub trait ReminderStore {
    /// The ranked reminder list for `identity`. Missing or unreadable
    /// storage is an empty list, never an error.
    fn load(&self, identity: &str) -> Vec<Reminder>;

    /// Persist the full list for `identity`, replacing what was there.
    fn save(&self, identity: &str, reminders: &[Reminder]) -> HoneResult<()>;

    /// Fold a successful search into the stored list: apply the soft credit
    /// first, then bump the matching reminder or insert a new one, re-rank,
    /// and persist.
    fn record_success(
        &self,
        identity: &str,
        snapshot: &[BoundsSnapshot],
        iteration_count: usize,
        credited: Option<usize>,
    ) -> HoneResult<()> {
        let mut reminders = self.load(identity);
        if let Some(index) = credited {
            if let Some(reminder) = reminders.get_mut(index) {
                reminder.accept_count += 1.0 / iteration_count as f64;
            }
        }
        match find_match(snapshot, &reminders) {
            Some(index) => {
                let reminder = &mut reminders[index];
                reminder.accept_count += 1.0;
                reminder.iteration = reminder.iteration.min(iteration_count);
            }
            None => reminders.push(Reminder {
                accept_count: 1.0,
                iteration: iteration_count,
                values: snapshot.to_vec(),
            }),
        }
        // Stable sort: reminders with equal scores keep their prior order.
        reminders.sort_by(|a, b| {
            b.accept_count
                .partial_cmp(&a.accept_count)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.save(identity, &reminders)
    }
}

impl<S: ReminderStore + ?Sized> ReminderStore for Arc<S> {
    fn load(&self, identity: &str) -> Vec<Reminder> {
        (**self).load(identity)
    }

    fn save(&self, identity: &str, reminders: &[Reminder]) -> HoneResult<()> {
        (**self).save(identity, reminders)
    }
}

/// File-backed store: one `<identity>.json` per identity under a root
/// directory, lazily cached in-process so repeated loads within one run
/// avoid re-reading the file.
pub struct FileReminderStore {
    root: PathBuf,
    cache: Mutex<HashMap<String, Vec<Reminder>>>,
}

impl FileReminderStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, identity: &str) -> PathBuf {
        self.root.join(format!("{identity}.json"))
    }

    fn read_file(&self, identity: &str) -> Vec<Reminder> {
        let path = self.path_for(identity);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("no reminder file at {}: {}", path.display(), err);
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(reminders) => reminders,
            Err(err) => {
                warn!("ignoring unreadable reminder file {}: {}", path.display(), err);
                Vec::new()
            }
        }
    }
}

impl ReminderStore for FileReminderStore {
    fn load(&self, identity: &str) -> Vec<Reminder> {
        let mut cache = self.cache.lock();
        if let Some(reminders) = cache.get(identity) {
            return reminders.clone();
        }
        let reminders = self.read_file(identity);
        cache.insert(identity.to_string(), reminders.clone());
        reminders
    }

    fn save(&self, identity: &str, reminders: &[Reminder]) -> HoneResult<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(
            self.path_for(identity),
            serde_json::to_string_pretty(reminders)?,
        )?;
        self.cache
            .lock()
            .insert(identity.to_string(), reminders.to_vec());
        Ok(())
    }
}

/// In-memory store for tests and embedding; contents die with the process.
#[derive(Debug, Default)]
pub struct MemoryReminderStore {
    entries: DashMap<String, Vec<Reminder>>,
}

impl MemoryReminderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReminderStore for MemoryReminderStore {
    fn load(&self, identity: &str) -> Vec<Reminder> {
        self.entries
            .get(identity)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn save(&self, identity: &str, reminders: &[Reminder]) -> HoneResult<()> {
        self.entries.insert(identity.to_string(), reminders.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bounds(name: &str, min: f64, max: f64) -> BoundsSnapshot {
        BoundsSnapshot {
            name: name.to_string(),
            min,
            max,
        }
    }

    fn reminder(accept: f64, iteration: usize, values: Vec<BoundsSnapshot>) -> Reminder {
        Reminder {
            accept_count: accept,
            iteration,
            values,
        }
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        let store = FileReminderStore::new(dir.path());
        assert!(store.load("dicer").is_empty());
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("dicer.json"), "not json {{").unwrap();
        let store = FileReminderStore::new(dir.path());
        assert!(store.load("dicer").is_empty());
    }

    #[test]
    fn save_load_round_trip_preserves_order() {
        let dir = tempdir().unwrap();
        let store = FileReminderStore::new(dir.path());
        let reminders = vec![
            reminder(3.0, 4, vec![bounds("x", 10.0, 20.0)]),
            reminder(1.5, 9, vec![bounds("x", 40.0, 60.0)]),
        ];
        store.save("dicer", &reminders).unwrap();

        // A fresh store instance reads from disk, not the cache.
        let reread = FileReminderStore::new(dir.path());
        let loaded = reread.load("dicer");
        assert_eq!(loaded, reminders);

        // save(load(id)) leaves the file content unchanged.
        let before = std::fs::read_to_string(dir.path().join("dicer.json")).unwrap();
        reread.save("dicer", &loaded).unwrap();
        let after = std::fs::read_to_string(dir.path().join("dicer.json")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn persisted_json_uses_accept_count_key() {
        let dir = tempdir().unwrap();
        let store = FileReminderStore::new(dir.path());
        store
            .save("dicer", &[reminder(2.0, 3, vec![bounds("blur", 3.0, 17.0)])])
            .unwrap();
        let raw = std::fs::read_to_string(dir.path().join("dicer.json")).unwrap();
        assert!(raw.contains("\"acceptCount\""));
        assert!(raw.contains("\"iteration\""));
    }

    #[test]
    fn match_tolerance_is_inclusive() {
        let reminders = vec![reminder(1.0, 2, vec![bounds("x", 10.0, 20.0)])];
        // Both edges off by exactly the tolerance still match.
        assert_eq!(
            find_match(&[bounds("x", 15.0, 25.0)], &reminders),
            Some(0)
        );
        // One edge past the tolerance does not.
        assert_eq!(find_match(&[bounds("x", 15.1, 20.0)], &reminders), None);
    }

    #[test]
    fn match_requires_every_dimension() {
        let reminders = vec![reminder(
            1.0,
            2,
            vec![bounds("x", 10.0, 20.0), bounds("y", 0.0, 5.0)],
        )];
        let solved = vec![bounds("x", 10.0, 20.0), bounds("z", 0.0, 5.0)];
        assert_eq!(find_match(&solved, &reminders), None);
    }

    #[test]
    fn record_success_inserts_new_configuration() {
        let store = MemoryReminderStore::new();
        store
            .record_success("dicer", &[bounds("x", 30.0, 40.0)], 7, None)
            .unwrap();
        let reminders = store.load("dicer");
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].accept_count, 1.0);
        assert_eq!(reminders[0].iteration, 7);
    }

    #[test]
    fn record_success_bumps_matching_configuration() {
        let store = MemoryReminderStore::new();
        store
            .save("dicer", &[reminder(1.0, 9, vec![bounds("x", 30.0, 40.0)])])
            .unwrap();
        // Within tolerance of the stored bounds, fewer iterations this time.
        store
            .record_success("dicer", &[bounds("x", 32.0, 38.0)], 4, None)
            .unwrap();
        let reminders = store.load("dicer");
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].accept_count, 2.0);
        assert_eq!(reminders[0].iteration, 4);
    }

    #[test]
    fn soft_credit_lands_before_matching() {
        let store = MemoryReminderStore::new();
        store
            .save(
                "dicer",
                &[
                    reminder(1.0, 9, vec![bounds("x", 0.0, 60.0)]),
                    reminder(1.0, 5, vec![bounds("x", 30.0, 40.0)]),
                ],
            )
            .unwrap();
        // Reminder 0 seeded the search; the solved bounds match reminder 1.
        store
            .record_success("dicer", &[bounds("x", 30.0, 40.0)], 4, Some(0))
            .unwrap();
        let reminders = store.load("dicer");
        assert_eq!(reminders.len(), 2);
        // Reminder 1 took the full +1 and now ranks first.
        assert_eq!(reminders[0].accept_count, 2.0);
        assert_eq!(reminders[0].values[0].min, 30.0);
        assert_eq!(reminders[1].accept_count, 1.25);
    }

    #[test]
    fn ranking_sorts_descending_and_keeps_ties_stable() {
        let store = MemoryReminderStore::new();
        store
            .save(
                "dicer",
                &[
                    reminder(2.0, 3, vec![bounds("x", 0.0, 10.0)]),
                    reminder(2.0, 5, vec![bounds("x", 40.0, 50.0)]),
                ],
            )
            .unwrap();
        store
            .record_success("dicer", &[bounds("x", 80.0, 90.0)], 2, None)
            .unwrap();
        let reminders = store.load("dicer");
        assert_eq!(reminders.len(), 3);
        // The tied pair keeps its order; the new entry sorts last.
        assert_eq!(reminders[0].iteration, 3);
        assert_eq!(reminders[1].iteration, 5);
        assert_eq!(reminders[2].accept_count, 1.0);
    }
}
