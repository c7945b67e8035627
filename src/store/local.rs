//! Durable partitioned key-value store backed by fjall.

use std::path::Path;

use fjall::{Keyspace, KeyspaceCreateOptions, PersistMode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::logging;

use super::error::StoreError;

/// Metadata keyspace holding the structural version and identity record.
const META_KEYSPACE: &str = "_meta";
const META_VERSION_KEY: &str = "version";

/// Current structural version of the store layout.
///
/// Version 2 switched the `submissions` partition from auto-assigned keys to
/// record-id keys, so records written under version 1 cannot be addressed
/// anymore and that partition is rebuilt on upgrade.
const STORE_VERSION: u32 = 2;

/// Partitions that changed key structure at a given version and must be
/// destroyed and recreated when upgrading past it. Unrelated partitions are
/// always preserved.
const REBUILT_AT: &[(u32, &[Partition])] = &[(2, &[Partition::Submissions])];

/// Named partitions of the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// Durable submission records, keyed by submission id.
    Submissions,
    /// Cached form schemas, keyed by form id.
    Schemas,
    /// Draft autosaves (`draft_{form_id}`) and the forms list cache.
    Forms,
}

impl Partition {
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Submissions => "submissions",
            Partition::Schemas => "schemas",
            Partition::Forms => "forms",
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable, partitioned key-value store.
///
/// All persisted bytes in the system live here. Other components never touch
/// partitions directly; they go through the typed accessors (submission
/// repository, draft manager, schema cache, identity provider).
pub struct LocalStore {
    db: fjall::Database,
    meta: Keyspace,
}

impl LocalStore {
    /// Open (or create) the store at the given path.
    ///
    /// Idempotent: opening an existing store re-attaches to its partitions.
    /// Runs the structural migration if the on-disk version is older than
    /// [`STORE_VERSION`]; fails with [`StoreError::VersionMismatch`] if it is
    /// newer.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = fjall::Database::builder(path).open()?;
        let meta = db.keyspace(META_KEYSPACE, KeyspaceCreateOptions::default)?;

        let store = Self { db, meta };
        store.migrate()?;

        // Ensure all partitions exist up front so a first read does not race
        // a first write on partition creation.
        for partition in [Partition::Submissions, Partition::Schemas, Partition::Forms] {
            store.keyspace(partition)?;
        }

        logging::info!(path = %path.display(), version = STORE_VERSION, "local store opened");
        Ok(store)
    }

    /// Read a record from a partition. Returns `None` when the key is absent.
    pub fn get<T: DeserializeOwned>(
        &self,
        partition: Partition,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let ks = self.keyspace(partition)?;
        let Some(bytes) = ks.get(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::CorruptRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    /// Upsert a record into a partition. Last write wins.
    pub fn put<T: Serialize>(
        &self,
        partition: Partition,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let ks = self.keyspace(partition)?;
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::CorruptRecord {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        ks.insert(key, bytes)?;
        self.db.persist(PersistMode::SyncAll)?;
        logging::debug!(partition = %partition, key = key, "record written");
        Ok(())
    }

    /// Delete a record from a partition. Deleting an absent key is a no-op.
    pub fn delete(&self, partition: Partition, key: &str) -> Result<(), StoreError> {
        let ks = self.keyspace(partition)?;
        ks.remove(key)?;
        self.db.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    /// Read every record in a partition, in unspecified order.
    ///
    /// Records that fail to decode are skipped with a warning rather than
    /// failing the whole scan; one corrupt entry must not hide the rest.
    pub fn get_all<T: DeserializeOwned>(&self, partition: Partition) -> Result<Vec<T>, StoreError> {
        let ks = self.keyspace(partition)?;
        let mut records = Vec::new();

        for kv in ks.iter() {
            let Ok(bytes) = kv.value() else {
                continue;
            };
            match serde_json::from_slice(&bytes) {
                Ok(record) => records.push(record),
                Err(_e) => {
                    logging::warn!(partition = %partition, error = %_e, "skipping undecodable record");
                }
            }
        }

        Ok(records)
    }

    /// Count the records in a partition.
    pub fn len(&self, partition: Partition) -> Result<usize, StoreError> {
        let ks = self.keyspace(partition)?;
        Ok(ks.iter().count())
    }

    /// Read a string value from the metadata keyspace.
    pub(crate) fn get_meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        let Some(bytes) = self.meta.get(key)? else {
            return Ok(None);
        };
        String::from_utf8(bytes.to_vec())
            .map(Some)
            .map_err(|e| StoreError::InvalidMetadata(e.to_string()))
    }

    /// Write a string value into the metadata keyspace.
    pub(crate) fn put_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.meta.insert(key, value.as_bytes())?;
        self.db.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn keyspace(&self, partition: Partition) -> Result<Keyspace, StoreError> {
        Ok(self.db.keyspace(partition.as_str(), KeyspaceCreateOptions::default)?)
    }

    /// Bring the on-disk layout up to [`STORE_VERSION`].
    ///
    /// Partitions whose key structure is unchanged are always preserved; only
    /// partitions listed in [`REBUILT_AT`] for a crossed version step are
    /// destroyed and recreated.
    fn migrate(&self) -> Result<(), StoreError> {
        let stored = match self.meta.get(META_VERSION_KEY)? {
            Some(bytes) => Some(u32::from_le_bytes(bytes.as_ref().try_into().map_err(
                |_| StoreError::InvalidMetadata("invalid version format".to_string()),
            )?)),
            None => None,
        };

        match stored {
            None => {
                // Fresh store: stamp the current version, nothing to migrate.
                self.meta
                    .insert(META_VERSION_KEY, STORE_VERSION.to_le_bytes())?;
                self.db.persist(PersistMode::SyncAll)?;
            }
            Some(v) if v == STORE_VERSION => {}
            Some(v) if v > STORE_VERSION => {
                return Err(StoreError::VersionMismatch {
                    stored: v,
                    current: STORE_VERSION,
                });
            }
            Some(v) => {
                for (step, partitions) in REBUILT_AT {
                    if *step > v && *step <= STORE_VERSION {
                        for partition in *partitions {
                            logging::warn!(
                                partition = %partition,
                                from = v,
                                to = *step,
                                "rebuilding partition for structural upgrade"
                            );
                            self.clear_partition(*partition)?;
                        }
                    }
                }
                self.meta
                    .insert(META_VERSION_KEY, STORE_VERSION.to_le_bytes())?;
                self.db.persist(PersistMode::SyncAll)?;
            }
        }

        Ok(())
    }

    fn clear_partition(&self, partition: Partition) -> Result<(), StoreError> {
        let ks = self.keyspace(partition)?;
        // Collect keys first - skip any entries that fail to read.
        let keys: Vec<Vec<u8>> = ks
            .iter()
            .filter_map(|kv| kv.key().ok().map(|k| k.to_vec()))
            .collect();
        for k in keys {
            ks.remove(&k)?;
        }
        self.db.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}
