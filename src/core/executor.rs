//! Money-movement executor
//!
//! This module provides the [`Executor`], which runs every player-initiated
//! money movement as one atomic unit against the [`LedgerStore`].
//!
//! Each operation follows the same shape:
//! - Input validation that needs no state (amounts, quantities, empty carts)
//!   happens before the store is touched
//! - Everything else runs inside [`LedgerStore::run`], which retries the
//!   closure on write conflicts and discards it on any error
//! - Notifications are buffered in the unit and only handed to the
//!   [`NotificationSink`] once the unit has committed

use super::clock::SystemClock;
use super::notify::{deliver, LogSink};
use super::receipts::{
    BidReceipt, CheckoutReceipt, LoanDecision, RepaymentReceipt, TradeReceipt, TransferReceipt,
};
use super::traits::{Clock, NotificationSink};
use crate::config::EngineConfig;
use crate::store::{LedgerStore, Unit};
use crate::types::{
    Account, AccountId, Bid, CartLine, Deposit, EntryKind, InsurancePolicy, ItemId, LedgerEntry,
    LedgerError, Loan, LoanConfig, LoanRequest, OptionId, PurchasedLine, RequestStatus,
    TradeDirection,
};
use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Atomic money-movement operations
///
/// Cheap to clone; clones share the same store, clock and sink.
#[derive(Clone)]
pub struct Executor {
    store: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    config: Arc<EngineConfig>,
}

impl Executor {
    /// Create an executor over an existing store
    ///
    /// # Arguments
    ///
    /// * `store` - Shared ledger store
    /// * `clock` - Source of timestamps for every unit
    /// * `sink` - Receives notifications after commit
    /// * `config` - Economic constants and retry bound
    pub fn new(
        store: Arc<LedgerStore>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        config: EngineConfig,
    ) -> Self {
        Executor {
            store,
            clock,
            sink,
            config: Arc::new(config),
        }
    }

    /// Executor over a fresh store, the wall clock and a logging sink
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(LedgerStore::new()),
            Arc::new(SystemClock),
            Arc::new(LogSink),
            EngineConfig::default(),
        )
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `work` as one unit, then deliver its notifications
    pub(crate) fn execute<T, F>(&self, operation: &'static str, work: F) -> Result<T, LedgerError>
    where
        F: FnMut(&mut Unit<'_>) -> Result<T, LedgerError>,
    {
        let now = self.clock.now();
        match self.store.run(now, self.config.retry.max_attempts, work) {
            Ok(committed) => {
                info!(
                    operation,
                    entries = committed.entries,
                    attempts = committed.attempts,
                    "committed"
                );
                deliver(self.sink.as_ref(), &committed.notifications);
                Ok(committed.value)
            }
            Err(error) => {
                debug!(operation, %error, "rejected");
                Err(error)
            }
        }
    }

    /// Loyalty points earned on `amount`
    pub(crate) fn loyalty_for(&self, amount: Decimal) -> u64 {
        amount
            .checked_div(self.config.rewards.loyalty_divisor)
            .and_then(|points| points.floor().to_u64())
            .unwrap_or(0)
    }

    /// Move money between two accounts
    ///
    /// The sender earns one loyalty point per full 100 transferred and the
    /// recipient is notified.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The amount is not positive
    /// - Sender and recipient are the same account
    /// - Either account does not exist
    /// - The sender is blocked or cannot cover the amount
    pub fn transfer(
        &self,
        sender: AccountId,
        recipient: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt, LedgerError> {
        ensure_positive(amount)?;
        if sender == recipient {
            return Err(LedgerError::SelfTransfer { account: sender });
        }
        let loyalty_earned = self.loyalty_for(amount);

        self.execute("transfer", |unit| {
            let mut from = active_account(unit, sender)?;
            let mut to = unit.account(recipient)?;

            debit(&mut from, amount)?;
            credit(&mut to, amount)?;
            add_loyalty(&mut from, loyalty_earned)?;

            let now = unit.now();
            unit.record(LedgerEntry::debit(
                from.id,
                EntryKind::TransferOut,
                amount,
                format!("to {}", to.handle),
                now,
            ));
            unit.record(LedgerEntry::credit(
                to.id,
                EntryKind::TransferIn,
                amount,
                format!("from {}", from.handle),
                now,
            ));
            unit.notify(
                to.id,
                format!("You received {} from {}", amount, from.handle),
            );

            let receipt = TransferReceipt {
                sender_balance: from.balance,
                recipient_balance: to.balance,
                loyalty_earned,
            };
            unit.put_account(from);
            unit.put_account(to);
            Ok(receipt)
        })
    }

    /// Buy the contents of a cart
    ///
    /// Lines naming the same item are merged. Loyalty points are spent one
    /// for one against the subtotal; points are earned on the subtotal.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The cart is empty or has a zero-quantity line
    /// - An item does not exist or lacks stock
    /// - The account lacks the loyalty points offered
    /// - More points are offered than the subtotal
    /// - The balance cannot cover the remainder
    pub fn checkout(
        &self,
        account: AccountId,
        cart: &[CartLine],
        loyalty_points: u64,
    ) -> Result<CheckoutReceipt, LedgerError> {
        if cart.is_empty() {
            return Err(LedgerError::EmptyCart);
        }
        let mut wanted: BTreeMap<ItemId, u32> = BTreeMap::new();
        for line in cart {
            if line.quantity == 0 {
                return Err(LedgerError::invalid_quantity(Decimal::ZERO));
            }
            let total = wanted.entry(line.item).or_insert(0);
            *total = total
                .checked_add(line.quantity)
                .ok_or_else(|| LedgerError::arithmetic_overflow("cart quantity"))?;
        }

        self.execute("checkout", |unit| {
            let mut buyer = active_account(unit, account)?;

            let mut subtotal = Decimal::ZERO;
            let mut lines = Vec::with_capacity(wanted.len());
            for (&item_id, &quantity) in &wanted {
                let mut item = unit
                    .shop
                    .get(&item_id)
                    .ok_or(LedgerError::ItemNotFound { item: item_id })?;
                if item.quantity < quantity {
                    return Err(LedgerError::insufficient_stock(
                        item_id,
                        item.quantity,
                        quantity,
                    ));
                }

                let unit_price = item.unit_price();
                let line_total = unit_price
                    .checked_mul(Decimal::from(quantity))
                    .ok_or_else(|| LedgerError::arithmetic_overflow("line total"))?;
                subtotal = subtotal
                    .checked_add(line_total)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("subtotal"))?;

                item.quantity -= quantity;
                item.popularity = item.popularity.saturating_add(u64::from(quantity));
                lines.push(PurchasedLine {
                    item: item_id,
                    name: item.name.clone(),
                    quantity,
                    unit_price,
                });
                unit.shop.put(item_id, item);
            }

            if buyer.loyalty_points < loyalty_points {
                return Err(LedgerError::InsufficientLoyaltyPoints {
                    account,
                    available: buyer.loyalty_points,
                    requested: loyalty_points,
                });
            }
            let points_value = Decimal::from(loyalty_points);
            if points_value > subtotal {
                return Err(LedgerError::LoyaltyExceedsSubtotal {
                    points: loyalty_points,
                    subtotal,
                });
            }

            let charged = subtotal - points_value;
            debit(&mut buyer, charged)?;
            let points_earned = self.loyalty_for(subtotal);
            buyer.loyalty_points -= loyalty_points;
            add_loyalty(&mut buyer, points_earned)?;

            unit.record(
                LedgerEntry::debit(
                    buyer.id,
                    EntryKind::ShopPurchase,
                    charged,
                    format!("{} item(s)", lines.len()),
                    unit.now(),
                )
                .with_details(json!({
                    "lines": lines,
                    "subtotal": subtotal,
                    "points_spent": loyalty_points,
                })),
            );
            unit.put_account(buyer);

            Ok(CheckoutReceipt {
                subtotal,
                charged,
                points_spent: loyalty_points,
                points_earned,
                lines,
            })
        })
    }

    /// Lock funds in a term deposit
    ///
    /// The deposit matures `deposit.term_hours` after opening and is paid
    /// out by the settlement batch.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The amount is not positive
    /// - The balance cannot cover the amount
    /// - A deposit is already running
    pub fn open_deposit(&self, account: AccountId, amount: Decimal) -> Result<Deposit, LedgerError> {
        ensure_positive(amount)?;
        let term = Duration::try_hours(self.config.deposit.term_hours)
            .ok_or_else(|| LedgerError::arithmetic_overflow("deposit term"))?;

        self.execute("deposit", |unit| {
            let mut holder = active_account(unit, account)?;
            debit(&mut holder, amount)?;
            if holder.has_active_deposit() {
                return Err(LedgerError::DepositAlreadyActive { account });
            }

            let matures_at = unit
                .now()
                .checked_add_signed(term)
                .ok_or_else(|| LedgerError::arithmetic_overflow("deposit term"))?;
            let deposit = Deposit { amount, matures_at };
            holder.deposit = Some(deposit.clone());
            unit.record(LedgerEntry::debit(
                account,
                EntryKind::DepositOpened,
                amount,
                format!("matures {}", deposit.matures_at.to_rfc3339()),
                unit.now(),
            ));
            unit.put_account(holder);
            Ok(deposit)
        })
    }

    /// Borrow money under the current loan settings
    ///
    /// With auto-approval the funds are credited at once; otherwise a
    /// pending request is queued for administrator review.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The amount is not positive
    /// - The account does not exist or is blocked
    /// - Existing debt plus the amount exceeds the configured maximum
    pub fn request_loan(
        &self,
        account: AccountId,
        amount: Decimal,
    ) -> Result<LoanDecision, LedgerError> {
        ensure_positive(amount)?;

        self.execute("loan", |unit| {
            active_account(unit, account)?;
            let settings = unit.loan_config.get();
            ensure_within_limit(unit, account, amount, &settings)?;

            if settings.auto_approve {
                let principal = issue_loan(unit, account, amount, &settings)?;
                unit.notify(account, format!("Your loan of {} was approved", amount));
                return Ok(LoanDecision::Approved { principal });
            }

            let request = LoanRequest {
                id: unit.allocate_request_id(),
                account,
                amount,
                requested_at: unit.now(),
                status: RequestStatus::Pending,
            };
            let id = request.id;
            unit.loan_requests.put(id, request);
            unit.notify(
                account,
                format!("Your loan request for {} is pending review", amount),
            );
            Ok(LoanDecision::Pending { request: id })
        })
    }

    /// Pay back part or all of the outstanding principal
    ///
    /// The balance must cover the offered amount, but paying more than is
    /// owed only takes what is owed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The amount is not positive
    /// - Nothing is owed
    /// - The balance cannot cover the offered amount
    pub fn repay_loan(
        &self,
        account: AccountId,
        amount: Decimal,
    ) -> Result<RepaymentReceipt, LedgerError> {
        ensure_positive(amount)?;

        self.execute("repay", |unit| {
            let mut borrower = active_account(unit, account)?;
            let mut loan = unit
                .loans
                .get(&account)
                .filter(Loan::is_active)
                .ok_or(LedgerError::NoActiveLoan { account })?;

            if borrower.balance < amount {
                return Err(LedgerError::insufficient_funds(account, borrower.balance, amount));
            }
            let repaid = amount.min(loan.principal);
            debit(&mut borrower, repaid)?;
            loan.principal -= repaid;
            let remaining = loan.principal;

            unit.record(LedgerEntry::debit(
                account,
                EntryKind::LoanRepaid,
                repaid,
                format!("{} still owed", remaining),
                unit.now(),
            ));
            if remaining.is_zero() {
                unit.notify(account, "Your loan is fully repaid");
            }
            unit.loans.put(account, loan);
            unit.put_account(borrower);

            Ok(RepaymentReceipt { repaid, remaining })
        })
    }

    /// Buy or extend insurance coverage
    ///
    /// Coverage stacks on whatever is left of the current policy.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The option does not exist or has an unreadable duration
    /// - The balance cannot cover the cost
    pub fn buy_insurance(
        &self,
        account: AccountId,
        option: OptionId,
    ) -> Result<InsurancePolicy, LedgerError> {
        self.execute("insure", |unit| {
            let offer = unit
                .insurance_options
                .get(&option)
                .ok_or(LedgerError::OptionNotFound { option })?;
            let span = offer.coverage()?;

            let mut holder = active_account(unit, account)?;
            debit(&mut holder, offer.cost)?;

            let now = unit.now();
            let current = unit.insurance.get(&account);
            let policy = InsurancePolicy {
                account,
                ends_at: InsurancePolicy::extended_end(current.as_ref(), now, span)?,
            };

            unit.record(
                LedgerEntry::debit(
                    account,
                    EntryKind::InsurancePurchased,
                    offer.cost,
                    offer.duration.clone(),
                    now,
                )
                .with_details(json!({ "option": option, "ends_at": policy.ends_at })),
            );
            unit.insurance.put(account, policy.clone());
            unit.put_account(holder);
            Ok(policy)
        })
    }

    /// Bid on the running auction
    ///
    /// The bid amount is held in escrow. The previous leader is refunded and
    /// told they were outbid in the same unit, so at most one bid holds
    /// funds at any time. A leader may raise their own bid.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The amount is not positive
    /// - No auction is accepting bids
    /// - The account does not exist or is blocked
    /// - The account cannot cover the bid
    /// - The amount does not strictly exceed the current highest bid
    pub fn place_bid(&self, account: AccountId, amount: Decimal) -> Result<BidReceipt, LedgerError> {
        ensure_positive(amount)?;

        self.execute("bid", |unit| {
            let now = unit.now();
            let mut auction = unit.auction.get();
            if !auction.active || auction.ends_at.is_some_and(|end| end <= now) {
                return Err(LedgerError::AuctionNotActive);
            }
            let holder = active_account(unit, account)?;
            // A leader's own escrow comes back before the new bid is taken
            let own_escrow = auction
                .highest_bid()
                .filter(|leader| leader.bidder == account)
                .map_or(Decimal::ZERO, |leader| leader.amount);
            let available = holder.balance + own_escrow;
            if available < amount {
                return Err(LedgerError::insufficient_funds(account, available, amount));
            }
            let highest = auction.amount_to_beat();
            if amount <= highest {
                return Err(LedgerError::bid_too_low(amount, highest));
            }

            let outbid = auction.highest_bid().cloned();
            if let Some(previous) = &outbid {
                let mut leader = unit.account(previous.bidder)?;
                credit(&mut leader, previous.amount)?;
                unit.put_account(leader);
                unit.record(LedgerEntry::credit(
                    previous.bidder,
                    EntryKind::AuctionRefund,
                    previous.amount,
                    "outbid",
                    now,
                ));
                if previous.bidder != account {
                    unit.notify(
                        previous.bidder,
                        format!("You were outbid: the highest bid is now {}", amount),
                    );
                }
            }

            // Re-read so a leader raising their own bid sees the refund
            let mut bidder = unit.account(account)?;
            debit(&mut bidder, amount)?;
            let bid = Bid {
                bidder: account,
                handle: bidder.handle.clone(),
                amount,
                placed_at: now,
            };
            unit.record(LedgerEntry::debit(
                account,
                EntryKind::AuctionEscrow,
                amount,
                auction.lot.clone().unwrap_or_default(),
                now,
            ));
            unit.put_account(bidder);

            auction.bids.push(bid.clone());
            unit.auction.put(auction);
            Ok(BidReceipt { bid, outbid })
        })
    }

    /// Buy or sell units of an exchange asset at its current price
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The quantity is not positive
    /// - The asset does not exist
    /// - A buyer cannot cover the total
    /// - A seller holds fewer units than offered
    pub fn trade(
        &self,
        account: AccountId,
        ticker: &str,
        quantity: Decimal,
        direction: TradeDirection,
    ) -> Result<TradeReceipt, LedgerError> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::invalid_quantity(quantity));
        }
        let key = (account, ticker.to_string());

        self.execute(trade_name(direction), |unit| {
            let asset = unit
                .assets
                .get(&key.1)
                .ok_or_else(|| LedgerError::AssetNotFound {
                    ticker: key.1.clone(),
                })?;
            let mut trader = active_account(unit, account)?;
            let held = unit.positions.get(&key).unwrap_or(Decimal::ZERO);

            let total = asset
                .price
                .checked_mul(quantity)
                .ok_or_else(|| LedgerError::arithmetic_overflow("trade total"))?;

            let (position, entry) = match direction {
                TradeDirection::Buy => {
                    debit(&mut trader, total)?;
                    let position = held
                        .checked_add(quantity)
                        .ok_or_else(|| LedgerError::arithmetic_overflow("position"))?;
                    let entry = LedgerEntry::debit(
                        account,
                        EntryKind::AssetBought,
                        total,
                        format!("bought {} {}", quantity, ticker),
                        unit.now(),
                    );
                    (position, entry)
                }
                TradeDirection::Sell => {
                    if held < quantity {
                        return Err(LedgerError::insufficient_holdings(
                            account, ticker, held, quantity,
                        ));
                    }
                    credit(&mut trader, total)?;
                    let entry = LedgerEntry::credit(
                        account,
                        EntryKind::AssetSold,
                        total,
                        format!("sold {} {}", quantity, ticker),
                        unit.now(),
                    );
                    (held - quantity, entry)
                }
            };

            unit.record(entry.with_details(json!({
                "ticker": ticker,
                "direction": direction,
                "quantity": quantity,
                "price": asset.price,
                "total": total,
            })));
            unit.positions.put(key.clone(), position);
            unit.put_account(trader);

            Ok(TradeReceipt {
                ticker: ticker.to_string(),
                direction,
                quantity,
                price: asset.price,
                total,
                position,
            })
        })
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn trade_name(direction: TradeDirection) -> &'static str {
    match direction {
        TradeDirection::Buy => "buy",
        TradeDirection::Sell => "sell",
    }
}

pub(crate) fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(amount));
    }
    Ok(())
}

/// Read an account that may initiate money movements
pub(crate) fn active_account(unit: &mut Unit<'_>, id: AccountId) -> Result<Account, LedgerError> {
    let account = unit.account(id)?;
    if account.blocked {
        return Err(LedgerError::account_blocked(id));
    }
    Ok(account)
}

pub(crate) fn debit(account: &mut Account, amount: Decimal) -> Result<(), LedgerError> {
    if account.balance < amount {
        return Err(LedgerError::insufficient_funds(
            account.id,
            account.balance,
            amount,
        ));
    }
    account.balance = account
        .balance
        .checked_sub(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("debit"))?;
    Ok(())
}

pub(crate) fn credit(account: &mut Account, amount: Decimal) -> Result<(), LedgerError> {
    account.balance = account
        .balance
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("credit"))?;
    Ok(())
}

pub(crate) fn add_loyalty(account: &mut Account, points: u64) -> Result<(), LedgerError> {
    account.loyalty_points = account
        .loyalty_points
        .checked_add(points)
        .ok_or_else(|| LedgerError::arithmetic_overflow("loyalty points"))?;
    Ok(())
}

/// Reject a loan that would push total debt above the configured maximum
pub(crate) fn ensure_within_limit(
    unit: &mut Unit<'_>,
    account: AccountId,
    amount: Decimal,
    settings: &LoanConfig,
) -> Result<(), LedgerError> {
    let current_debt = unit
        .loans
        .get(&account)
        .map(|loan| loan.principal)
        .unwrap_or(Decimal::ZERO);
    let total = current_debt
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow("loan total"))?;
    if total > settings.max_amount {
        return Err(LedgerError::LoanLimitExceeded {
            current_debt,
            requested: amount,
            max: settings.max_amount,
        });
    }
    Ok(())
}

/// Credit a loan and add it to the outstanding principal
///
/// Returns the principal owed afterwards. Top-ups keep the original issue
/// time and take the current rate.
pub(crate) fn issue_loan(
    unit: &mut Unit<'_>,
    account: AccountId,
    amount: Decimal,
    settings: &LoanConfig,
) -> Result<Decimal, LedgerError> {
    let now = unit.now();
    let mut borrower = unit.account(account)?;
    credit(&mut borrower, amount)?;

    let loan = match unit.loans.get(&account).filter(Loan::is_active) {
        Some(mut loan) => {
            loan.principal = loan
                .principal
                .checked_add(amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow("loan principal"))?;
            loan.interest_rate = settings.interest_rate;
            loan
        }
        None => Loan {
            account,
            principal: amount,
            interest_rate: settings.interest_rate,
            issued_at: now,
        },
    };
    let principal = loan.principal;

    unit.record(LedgerEntry::credit(
        account,
        EntryKind::LoanIssued,
        amount,
        format!("{}% interest", settings.interest_rate),
        now,
    ));
    unit.loans.put(account, loan);
    unit.put_account(borrower);
    Ok(principal)
}
