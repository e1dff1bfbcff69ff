//! Versioned record containers
//!
//! Every persisted record lives in a [`Table`] (keyed rows) or a [`Slot`]
//! (a single shared record such as the auction). Each committed write bumps
//! the record's version; units of work compare these versions at commit
//! time to detect concurrent modification.
//!
//! # Thread Safety
//!
//! Tables use `DashMap` internally, so point reads of different rows never
//! block each other. Writes are only applied by the store while it holds its
//! commit latch.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::hash::Hash;

/// Version reported for a row that has never been written
pub const ABSENT: u64 = 0;

/// A committed value together with its version
#[derive(Debug, Clone)]
pub struct Versioned<V> {
    pub version: u64,
    pub value: V,
}

/// Keyed collection of versioned records
#[derive(Debug)]
pub struct Table<K, V>
where
    K: Eq + Hash,
{
    /// Name used in conflict reports
    name: &'static str,

    /// Committed rows
    rows: DashMap<K, Versioned<V>>,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create an empty table
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: DashMap::new(),
        }
    }

    /// Name of the table
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Committed value of a row
    pub fn get(&self, key: &K) -> Option<V> {
        self.rows.get(key).map(|row| row.value.clone())
    }

    /// Committed value and version of a row
    ///
    /// Absent rows report [`ABSENT`] so that a concurrent insert is detected
    /// as a conflict just like an update.
    pub fn read_versioned(&self, key: &K) -> (u64, Option<V>) {
        match self.rows.get(key) {
            Some(row) => (row.version, Some(row.value.clone())),
            None => (ABSENT, None),
        }
    }

    /// Current version of a row
    pub fn version(&self, key: &K) -> u64 {
        self.rows.get(key).map(|row| row.version).unwrap_or(ABSENT)
    }

    /// Install a new committed value, bumping the version
    pub(crate) fn apply(&self, key: K, value: V) {
        let mut row = self.rows.entry(key).or_insert(Versioned {
            version: ABSENT,
            value: value.clone(),
        });
        row.version += 1;
        row.value = value;
    }

    /// Keys of all committed rows
    pub fn keys(&self) -> Vec<K> {
        self.rows.iter().map(|row| row.key().clone()).collect()
    }

    /// Values of all committed rows
    pub fn values(&self) -> Vec<V> {
        self.rows.iter().map(|row| row.value.clone()).collect()
    }

    /// Keys of committed rows matching a predicate
    pub fn keys_where<F>(&self, predicate: F) -> Vec<K>
    where
        F: Fn(&V) -> bool,
    {
        self.rows
            .iter()
            .filter(|row| predicate(&row.value))
            .map(|row| row.key().clone())
            .collect()
    }

    /// Number of committed rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A single shared versioned record
#[derive(Debug)]
pub struct Slot<V> {
    name: &'static str,
    cell: RwLock<Versioned<V>>,
}

impl<V: Clone> Slot<V> {
    /// Create a slot holding an initial value at version [`ABSENT`]
    pub fn new(name: &'static str, initial: V) -> Self {
        Self {
            name,
            cell: RwLock::new(Versioned {
                version: ABSENT,
                value: initial,
            }),
        }
    }

    /// Name of the slot
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Committed value
    pub fn get(&self) -> V {
        self.cell.read().value.clone()
    }

    /// Committed value and version
    pub fn read_versioned(&self) -> (u64, V) {
        let cell = self.cell.read();
        (cell.version, cell.value.clone())
    }

    /// Current version
    pub fn version(&self) -> u64 {
        self.cell.read().version
    }

    /// Install a new committed value, bumping the version
    pub(crate) fn apply(&self, value: V) {
        let mut cell = self.cell.write();
        cell.version += 1;
        cell.value = value;
    }
}
