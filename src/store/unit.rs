//! Units of work
//!
//! A [`Unit`] groups the reads and writes of one operation. Reads go to the
//! committed tables the first time a record is touched and are cached, so a
//! unit always sees a stable value for every record it has read. Writes are
//! buffered in the unit and only become visible when the store commits it.
//!
//! # Conflict Detection
//!
//! For every record touched, the unit remembers the version it observed.
//! At commit the store re-checks those versions under its commit latch; any
//! difference means another unit committed in between, and the whole unit
//! is discarded with a retryable `StoreError::WriteConflict`.

use super::table::{Slot, Table};
use super::LedgerStore;
use crate::types::{
    Account, AccountId, AuctionState, ExchangeAsset, InsuranceOption, InsurancePolicy, ItemId,
    LedgerEntry, LedgerError, Loan, LoanConfig, LoanRequest, LoanRequestId, Notification,
    OptionId, ShopItem, StoreError, SubmissionId, Task, TaskId, TaskSubmission, Ticker,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Buffered view of one table inside a unit
#[derive(Debug)]
pub struct StagedTable<'s, K, V>
where
    K: Eq + Hash,
{
    table: &'s Table<K, V>,

    /// Version and value observed on first touch
    observed: HashMap<K, (u64, Option<V>)>,

    /// Pending writes
    writes: HashMap<K, V>,
}

impl<'s, K, V> StagedTable<'s, K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    fn new(table: &'s Table<K, V>) -> Self {
        Self {
            table,
            observed: HashMap::new(),
            writes: HashMap::new(),
        }
    }

    /// Read a record as this unit sees it
    pub fn get(&mut self, key: &K) -> Option<V> {
        if let Some(value) = self.writes.get(key) {
            return Some(value.clone());
        }
        self.observed
            .entry(key.clone())
            .or_insert_with(|| self.table.read_versioned(key))
            .1
            .clone()
    }

    /// Buffer a write
    ///
    /// Blind writes still record the version they replace, so two units
    /// inserting the same key cannot both commit.
    pub fn put(&mut self, key: K, value: V) {
        if !self.observed.contains_key(&key) {
            let observed = self.table.read_versioned(&key);
            self.observed.insert(key.clone(), observed);
        }
        self.writes.insert(key, value);
    }

    /// Committed keys matching a predicate
    ///
    /// The scan itself is not versioned; callers re-read each key through
    /// [`StagedTable::get`] so the records they act on are.
    pub fn scan(&self, predicate: impl Fn(&V) -> bool) -> Vec<K> {
        self.table.keys_where(predicate)
    }

    /// Keys of all committed rows
    pub fn keys(&self) -> Vec<K> {
        self.table.keys()
    }

    fn validate(&self) -> Result<(), StoreError> {
        for (key, (version, _)) in &self.observed {
            if self.table.version(key) != *version {
                return Err(StoreError::WriteConflict {
                    record: format!("{} {:?}", self.table.name(), key),
                });
            }
        }
        Ok(())
    }

    fn apply(self) {
        for (key, value) in self.writes {
            self.table.apply(key, value);
        }
    }
}

/// Buffered view of a single shared record inside a unit
#[derive(Debug)]
pub struct StagedSlot<'s, V> {
    slot: &'s Slot<V>,
    observed: Option<(u64, V)>,
    write: Option<V>,
}

impl<'s, V: Clone> StagedSlot<'s, V> {
    fn new(slot: &'s Slot<V>) -> Self {
        Self {
            slot,
            observed: None,
            write: None,
        }
    }

    /// Read the record as this unit sees it
    pub fn get(&mut self) -> V {
        if let Some(value) = &self.write {
            return value.clone();
        }
        self.observed
            .get_or_insert_with(|| self.slot.read_versioned())
            .1
            .clone()
    }

    /// Buffer a write
    pub fn put(&mut self, value: V) {
        if self.observed.is_none() {
            self.observed = Some(self.slot.read_versioned());
        }
        self.write = Some(value);
    }

    fn validate(&self) -> Result<(), StoreError> {
        match &self.observed {
            Some((version, _)) if self.slot.version() != *version => {
                Err(StoreError::WriteConflict {
                    record: self.slot.name().to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn apply(self) {
        if let Some(value) = self.write {
            self.slot.apply(value);
        }
    }
}

/// One atomic group of reads and writes against the [`LedgerStore`]
#[derive(Debug)]
pub struct Unit<'s> {
    store: &'s LedgerStore,

    /// Timestamp shared by everything this unit records
    now: DateTime<Utc>,

    pub accounts: StagedTable<'s, AccountId, Account>,
    pub handles: StagedTable<'s, String, AccountId>,
    pub loans: StagedTable<'s, AccountId, Loan>,
    pub loan_requests: StagedTable<'s, LoanRequestId, LoanRequest>,
    pub insurance: StagedTable<'s, AccountId, InsurancePolicy>,
    pub insurance_options: StagedTable<'s, OptionId, InsuranceOption>,
    pub positions: StagedTable<'s, (AccountId, Ticker), Decimal>,
    pub assets: StagedTable<'s, Ticker, ExchangeAsset>,
    pub shop: StagedTable<'s, ItemId, ShopItem>,
    pub tasks: StagedTable<'s, TaskId, Task>,
    pub submissions: StagedTable<'s, SubmissionId, TaskSubmission>,
    pub completed_tasks: StagedTable<'s, (AccountId, TaskId), DateTime<Utc>>,
    pub auction: StagedSlot<'s, AuctionState>,
    pub loan_config: StagedSlot<'s, LoanConfig>,

    entries: Vec<LedgerEntry>,
    notifications: Vec<Notification>,
}

impl<'s> Unit<'s> {
    pub(crate) fn new(store: &'s LedgerStore, now: DateTime<Utc>) -> Self {
        Self {
            store,
            now,
            accounts: StagedTable::new(&store.accounts),
            handles: StagedTable::new(&store.handles),
            loans: StagedTable::new(&store.loans),
            loan_requests: StagedTable::new(&store.loan_requests),
            insurance: StagedTable::new(&store.insurance),
            insurance_options: StagedTable::new(&store.insurance_options),
            positions: StagedTable::new(&store.positions),
            assets: StagedTable::new(&store.assets),
            shop: StagedTable::new(&store.shop),
            tasks: StagedTable::new(&store.tasks),
            submissions: StagedTable::new(&store.submissions),
            completed_tasks: StagedTable::new(&store.completed_tasks),
            auction: StagedSlot::new(&store.auction),
            loan_config: StagedSlot::new(&store.loan_config),
            entries: Vec::new(),
            notifications: Vec::new(),
        }
    }

    /// Timestamp of this unit
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Read an account that must exist
    pub fn account(&mut self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .get(&id)
            .ok_or_else(|| LedgerError::account_not_found(id))
    }

    /// Buffer an account write
    pub fn put_account(&mut self, account: Account) {
        self.accounts.put(account.id, account);
    }

    /// Queue a ledger entry for append on commit
    pub fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// Queue a notification for delivery after commit
    pub fn notify(&mut self, account: AccountId, text: impl Into<String>) {
        self.notifications.push(Notification::new(account, text));
    }

    /// Allocate a fresh account id
    ///
    /// Ids taken by aborted units are never reused.
    pub fn allocate_account_id(&self) -> AccountId {
        self.store.allocate_account_id()
    }

    /// Allocate a fresh loan request id
    pub fn allocate_request_id(&self) -> LoanRequestId {
        self.store.allocate_request_id()
    }

    /// Allocate a fresh task submission id
    pub fn allocate_submission_id(&self) -> SubmissionId {
        self.store.allocate_submission_id()
    }

    /// Check every observed version against the committed tables
    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        self.accounts.validate()?;
        self.handles.validate()?;
        self.loans.validate()?;
        self.loan_requests.validate()?;
        self.insurance.validate()?;
        self.insurance_options.validate()?;
        self.positions.validate()?;
        self.assets.validate()?;
        self.shop.validate()?;
        self.tasks.validate()?;
        self.submissions.validate()?;
        self.completed_tasks.validate()?;
        self.auction.validate()?;
        self.loan_config.validate()?;
        Ok(())
    }

    /// Install all buffered writes
    ///
    /// Returns the entries to append and the notifications to deliver.
    pub(crate) fn apply(self) -> (Vec<LedgerEntry>, Vec<Notification>) {
        self.accounts.apply();
        self.handles.apply();
        self.loans.apply();
        self.loan_requests.apply();
        self.insurance.apply();
        self.insurance_options.apply();
        self.positions.apply();
        self.assets.apply();
        self.shop.apply();
        self.tasks.apply();
        self.submissions.apply();
        self.completed_tasks.apply();
        self.auction.apply();
        self.loan_config.apply();
        (self.entries, self.notifications)
    }
}
