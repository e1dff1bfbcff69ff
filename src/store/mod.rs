//! Ledger store
//!
//! Authoritative in-process state of the economy: accounts, the append-only
//! ledger, loans, insurance, portfolios, shop inventory, tasks and the shared
//! auction and settings records.
//!
//! # Architecture
//!
//! ```text
//! LedgerStore
//!     ├── Table<K, V> per entity    (DashMap rows with versions)
//!     ├── Slot<V> per shared record (auction, loan settings)
//!     ├── journal                   (append-only ledger entries)
//!     └── commit latch              (serializes validate + apply)
//! ```
//!
//! # Atomicity
//!
//! All writes go through [`LedgerStore::run`], which executes a closure
//! against a fresh [`Unit`], then validates and applies it under the commit
//! latch. A closure error discards the unit; a version mismatch discards it
//! and retries the closure from scratch, up to the given attempt bound. No
//! partial effect of a discarded unit is ever visible.

pub mod table;
pub mod unit;

pub use table::{Slot, Table, Versioned};
pub use unit::{StagedSlot, StagedTable, Unit};

use crate::types::{
    Account, AccountId, AuctionState, ExchangeAsset, InsuranceOption, InsurancePolicy, ItemId,
    LedgerEntry, LedgerError, Loan, LoanConfig, LoanRequest, LoanRequestId, MarketSnapshot,
    Notification, OptionId, ShopItem, StoreError, SubmissionId, Task, TaskId, TaskSubmission,
    Ticker,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Result of a committed unit
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    /// Value returned by the unit's closure
    pub value: T,

    /// Notifications to hand to the sink now that the unit is durable
    pub notifications: Vec<Notification>,

    /// Number of ledger entries appended
    pub entries: usize,

    /// Attempts it took to commit (1 when there was no conflict)
    pub attempts: u32,
}

/// In-process versioned ledger store
#[derive(Debug)]
pub struct LedgerStore {
    pub(crate) accounts: Table<AccountId, Account>,
    pub(crate) handles: Table<String, AccountId>,
    pub(crate) loans: Table<AccountId, Loan>,
    pub(crate) loan_requests: Table<LoanRequestId, LoanRequest>,
    pub(crate) insurance: Table<AccountId, InsurancePolicy>,
    pub(crate) insurance_options: Table<OptionId, InsuranceOption>,
    pub(crate) positions: Table<(AccountId, Ticker), Decimal>,
    pub(crate) assets: Table<Ticker, ExchangeAsset>,
    pub(crate) shop: Table<ItemId, ShopItem>,
    pub(crate) tasks: Table<TaskId, Task>,
    pub(crate) submissions: Table<SubmissionId, TaskSubmission>,
    pub(crate) completed_tasks: Table<(AccountId, TaskId), DateTime<Utc>>,
    pub(crate) auction: Slot<AuctionState>,
    pub(crate) loan_config: Slot<LoanConfig>,

    /// Append-only ledger
    journal: RwLock<Vec<LedgerEntry>>,

    /// Held while a unit is validated and applied
    commit_latch: Mutex<()>,

    next_account_id: AtomicU64,
    next_request_id: AtomicU64,
    next_submission_id: AtomicU64,
}

impl LedgerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            accounts: Table::new("account"),
            handles: Table::new("handle"),
            loans: Table::new("loan"),
            loan_requests: Table::new("loan request"),
            insurance: Table::new("insurance policy"),
            insurance_options: Table::new("insurance option"),
            positions: Table::new("position"),
            assets: Table::new("asset"),
            shop: Table::new("shop item"),
            tasks: Table::new("task"),
            submissions: Table::new("task submission"),
            completed_tasks: Table::new("completed task"),
            auction: Slot::new("auction", AuctionState::default()),
            loan_config: Slot::new("loan settings", LoanConfig::default()),
            journal: RwLock::new(Vec::new()),
            commit_latch: Mutex::new(()),
            next_account_id: AtomicU64::new(1),
            next_request_id: AtomicU64::new(1),
            next_submission_id: AtomicU64::new(1),
        }
    }

    /// Run `work` as one atomic unit, retrying on write conflicts
    ///
    /// The closure may be invoked several times; it must derive everything
    /// from what it reads through the unit.
    ///
    /// # Arguments
    ///
    /// * `now` - Timestamp shared by every entry the unit records
    /// * `max_attempts` - Upper bound on attempts (at least one is made)
    /// * `work` - Reads and buffers writes through the unit
    ///
    /// # Returns
    ///
    /// * `Ok(Committed)` once the unit committed
    /// * `Err(LedgerError)` from the closure, with nothing applied
    /// * `Err(LedgerError::Store(RetriesExhausted))` if every attempt conflicted
    pub fn run<T, F>(
        &self,
        now: DateTime<Utc>,
        max_attempts: u32,
        mut work: F,
    ) -> Result<Committed<T>, LedgerError>
    where
        F: FnMut(&mut Unit<'_>) -> Result<T, LedgerError>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut unit = Unit::new(self, now);
            let value = work(&mut unit)?;

            match self.commit(unit) {
                Ok((entries, notifications)) => {
                    return Ok(Committed {
                        value,
                        notifications,
                        entries,
                        attempts: attempt,
                    })
                }
                Err(conflict) if attempt < max_attempts => {
                    debug!(attempt, %conflict, "unit aborted, retrying");
                }
                Err(conflict) => {
                    debug!(attempt, %conflict, "unit aborted, giving up");
                    return Err(StoreError::RetriesExhausted { attempts: attempt }.into());
                }
            }
        }
    }

    /// Validate and apply a unit under the commit latch
    fn commit(&self, unit: Unit<'_>) -> Result<(usize, Vec<Notification>), StoreError> {
        let _latch = self.commit_latch.lock();
        unit.validate()?;

        let (entries, notifications) = unit.apply();
        let appended = entries.len();
        self.journal.write().extend(entries);
        Ok((appended, notifications))
    }

    pub(crate) fn allocate_account_id(&self) -> AccountId {
        self.next_account_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn allocate_request_id(&self) -> LoanRequestId {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn allocate_submission_id(&self) -> SubmissionId {
        self.next_submission_id.fetch_add(1, Ordering::Relaxed)
    }

    // Point reads of committed state

    /// Committed state of an account
    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.accounts.get(&id)
    }

    /// Resolve a handle to an account id
    pub fn account_id_by_handle(&self, handle: &str) -> Option<AccountId> {
        self.handles.get(&handle.to_string())
    }

    /// All accounts, sorted by id
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts = self.accounts.values();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    /// Outstanding loan of an account
    pub fn loan(&self, account: AccountId) -> Option<Loan> {
        self.loans.get(&account)
    }

    /// Loan requests still waiting for review, oldest first
    pub fn pending_loan_requests(&self) -> Vec<LoanRequest> {
        let mut requests: Vec<_> = self
            .loan_requests
            .values()
            .into_iter()
            .filter(|request| request.status == crate::types::RequestStatus::Pending)
            .collect();
        requests.sort_by_key(|request| request.id);
        requests
    }

    /// Insurance policy of an account
    pub fn insurance(&self, account: AccountId) -> Option<InsurancePolicy> {
        self.insurance.get(&account)
    }

    /// Quantity of an asset held by an account
    pub fn position(&self, account: AccountId, ticker: &str) -> Decimal {
        self.positions
            .get(&(account, ticker.to_string()))
            .unwrap_or(Decimal::ZERO)
    }

    /// Non-empty positions of an account, sorted by ticker
    pub fn portfolio(&self, account: AccountId) -> Vec<(Ticker, Decimal)> {
        let mut holdings: Vec<_> = self
            .positions
            .keys_where(|quantity| !quantity.is_zero())
            .into_iter()
            .filter(|(owner, _)| *owner == account)
            .filter_map(|key| {
                let quantity = self.positions.get(&key)?;
                Some((key.1, quantity))
            })
            .collect();
        holdings.sort();
        holdings
    }

    /// Committed state of an exchange asset
    pub fn asset(&self, ticker: &str) -> Option<ExchangeAsset> {
        self.assets.get(&ticker.to_string())
    }

    /// Committed state of a shop item
    pub fn shop_item(&self, item: ItemId) -> Option<ShopItem> {
        self.shop.get(&item)
    }

    /// Task submission by id
    pub fn submission(&self, id: SubmissionId) -> Option<TaskSubmission> {
        self.submissions.get(&id)
    }

    /// Whether an account has completed a task
    pub fn has_completed(&self, account: AccountId, task: TaskId) -> bool {
        self.completed_tasks.get(&(account, task)).is_some()
    }

    /// Current auction record
    pub fn auction_snapshot(&self) -> AuctionState {
        self.auction.get()
    }

    /// Current loan settings
    pub fn loan_config(&self) -> LoanConfig {
        self.loan_config.get()
    }

    /// Consistent view of all assets and the auction
    ///
    /// Taken under the commit latch so it never straddles a commit.
    pub fn market_snapshot(&self, taken_at: DateTime<Utc>) -> MarketSnapshot {
        let _latch = self.commit_latch.lock();
        let mut assets = self.assets.values();
        assets.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        MarketSnapshot {
            assets,
            auction: self.auction.get(),
            taken_at,
        }
    }

    /// Ledger entries of one account, oldest first
    pub fn ledger_for(&self, account: AccountId) -> Vec<LedgerEntry> {
        self.journal
            .read()
            .iter()
            .filter(|entry| entry.account == account)
            .cloned()
            .collect()
    }

    /// Number of entries in the ledger
    pub fn ledger_len(&self) -> usize {
        self.journal.read().len()
    }

    /// Sum of all account balances, taken under the commit latch
    pub fn total_balance(&self) -> Decimal {
        let _latch = self.commit_latch.lock();
        self.accounts
            .values()
            .iter()
            .map(|account| account.balance)
            .sum()
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}
