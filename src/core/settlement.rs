//! Periodic settlement batch
//!
//! One call to [`Settlement::tick`] performs, inside a single unit:
//!
//! 1. Deposit maturation: every deposit whose maturity has passed is paid
//!    out with interest and cleared
//! 2. Auction closing: an active auction past its end is closed and the
//!    highest bid becomes the winner
//! 3. Market drift: every asset price moves by a small random percentage
//!
//! A failure in any step discards the whole batch; the next tick starts
//! again from committed state. Clearing a deposit in the same unit that
//! pays it is what makes the payout happen exactly once.

use super::executor::{credit, Executor};
use crate::config::{DepositConfig, DriftConfig};
use crate::store::Unit;
use crate::types::{AccountId, Bid, EntryKind, LedgerEntry, LedgerError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// What a committed tick changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementReport {
    /// Accounts paid out, with the amount credited
    pub matured: Vec<(AccountId, Decimal)>,

    /// Whether the auction was closed by this tick
    pub auction_closed: bool,

    /// Winning bid of the closed auction
    pub auction_winner: Option<Bid>,

    /// Number of assets repriced
    pub repriced: usize,
}

/// Runs settlement batches against the executor's store
#[derive(Debug)]
pub struct Settlement {
    executor: Executor,
    rng: Mutex<StdRng>,
}

impl Settlement {
    /// Settlement with an entropy-seeded price generator
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Settlement with a fixed seed, for reproducible drift
    pub fn with_seed(executor: Executor, seed: u64) -> Self {
        Self {
            executor,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Run one settlement batch
    ///
    /// # Returns
    ///
    /// * `Ok(SettlementReport)` once every step has committed together
    /// * `Err(LedgerError)` if any step failed; nothing was applied
    pub fn tick(&self) -> Result<SettlementReport, LedgerError> {
        let config = self.executor.config();

        let result = self.executor.execute("tick", |unit| {
            let matured = mature_deposits(unit, &config.deposit)?;

            let (auction_closed, auction_winner) = if unit.auction.get().is_due(unit.now()) {
                (true, close_auction(unit)?)
            } else {
                (false, None)
            };

            let repriced = drift_prices(unit, &config.drift, &mut *self.rng.lock())?;

            Ok(SettlementReport {
                matured,
                auction_closed,
                auction_winner,
                repriced,
            })
        });

        match &result {
            Ok(report) => info!(
                matured = report.matured.len(),
                auction_closed = report.auction_closed,
                repriced = report.repriced,
                "settlement tick committed"
            ),
            Err(error) => warn!(%error, "settlement tick aborted"),
        }
        result
    }
}

/// Pay out every deposit that has reached maturity
pub(crate) fn mature_deposits(
    unit: &mut Unit<'_>,
    config: &DepositConfig,
) -> Result<Vec<(AccountId, Decimal)>, LedgerError> {
    let now = unit.now();
    let mut due = unit.accounts.scan(|account| {
        account
            .deposit
            .as_ref()
            .is_some_and(|deposit| deposit.is_mature(now))
    });
    due.sort_unstable();

    let multiplier = Decimal::ONE + config.rate;
    let mut paid = Vec::with_capacity(due.len());
    for id in due {
        let mut account = unit.account(id)?;
        let Some(deposit) = account.deposit.take().filter(|d| d.is_mature(now)) else {
            continue;
        };

        let payout = deposit
            .amount
            .checked_mul(multiplier)
            .ok_or_else(|| LedgerError::arithmetic_overflow("deposit payout"))?;
        credit(&mut account, payout)?;
        account.deposit_earnings += payout - deposit.amount;

        unit.record(LedgerEntry::credit(
            id,
            EntryKind::DepositMatured,
            payout,
            format!("principal {}", deposit.amount),
            now,
        ));
        unit.notify(id, format!("Your deposit matured: {} credited", payout));
        unit.put_account(account);
        paid.push((id, payout));
    }
    Ok(paid)
}

/// Close the auction, selecting the strictly highest bid as winner
///
/// The winner's escrowed bid is kept; every other bidder was already
/// refunded when outbid.
pub(crate) fn close_auction(unit: &mut Unit<'_>) -> Result<Option<Bid>, LedgerError> {
    let mut auction = unit.auction.get();
    auction.active = false;
    auction.winner = auction.highest_bid().cloned();

    if let Some(winner) = &auction.winner {
        let account = unit.account(winner.bidder)?;
        unit.notify(
            account.id,
            format!("You won the auction with a bid of {}", winner.amount),
        );
    }

    let winner = auction.winner.clone();
    unit.auction.put(auction);
    Ok(winner)
}

/// Move every asset price by a random percentage within the drift band
pub(crate) fn drift_prices<R: Rng>(
    unit: &mut Unit<'_>,
    config: &DriftConfig,
    rng: &mut R,
) -> Result<usize, LedgerError> {
    let mut tickers = unit.assets.keys();
    tickers.sort();

    let half = Decimal::new(5, 1);
    let two = Decimal::TWO;
    let mut repriced = 0;
    for ticker in tickers {
        let Some(mut asset) = unit.assets.get(&ticker) else {
            continue;
        };

        let sample = Decimal::new(rng.gen_range(0..1_000_000), 6);
        let percent = (sample - half + config.skew) * two * config.magnitude_pct;
        let factor = Decimal::ONE + percent / Decimal::ONE_HUNDRED;
        let price = asset
            .price
            .checked_mul(factor)
            .ok_or_else(|| LedgerError::arithmetic_overflow("asset price"))?
            .round_dp(config.price_scale);

        asset.price = price.max(config.min_price);
        unit.assets.put(ticker, asset);
        repriced += 1;
    }
    Ok(repriced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::core::testing::{world, World};
    use crate::core::traits::Clock;
    use crate::types::{AuctionState, ExchangeAsset};
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn prices(executor: &Executor) -> HashMap<String, Decimal> {
        executor
            .market_snapshot()
            .assets
            .into_iter()
            .map(|asset: ExchangeAsset| (asset.ticker, asset.price))
            .collect()
    }

    #[test]
    fn test_deposit_matures_after_term() {
        let World {
            executor,
            outbox,
            clock,
        } = world(&[("alice", dec!(1000))]);
        let settlement = Settlement::with_seed(executor.clone(), 7);
        executor.open_deposit(1, dec!(1000)).unwrap();

        clock.advance(Duration::hours(23)).unwrap();
        let early = settlement.tick().unwrap();
        assert!(early.matured.is_empty());
        assert_eq!(executor.store().account(1).unwrap().balance, dec!(0));

        clock.advance(Duration::hours(1)).unwrap();
        let report = settlement.tick().unwrap();

        assert_eq!(report.matured, vec![(1, dec!(1100))]);
        let alice = executor.store().account(1).unwrap();
        assert_eq!(alice.balance, dec!(1100));
        assert_eq!(alice.deposit, None);
        assert_eq!(alice.deposit_earnings, dec!(100));
        assert_eq!(
            outbox.messages_for(1),
            vec!["Your deposit matured: 1100.00 credited"]
        );
    }

    #[test]
    fn test_deposit_is_paid_once() {
        let World {
            executor, clock, ..
        } = world(&[("alice", dec!(1000))]);
        let settlement = Settlement::with_seed(executor.clone(), 7);
        executor.open_deposit(1, dec!(500)).unwrap();
        clock.advance(Duration::hours(48)).unwrap();

        settlement.tick().unwrap();
        let second = settlement.tick().unwrap();

        assert!(second.matured.is_empty());
        assert_eq!(executor.store().account(1).unwrap().balance, dec!(1050));
        let payouts = executor
            .store()
            .ledger_for(1)
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::DepositMatured)
            .count();
        assert_eq!(payouts, 1);
    }

    #[test]
    fn test_due_auction_is_closed_with_highest_bidder() {
        let World {
            executor,
            outbox,
            clock,
        } = world(&[("xavier", dec!(100)), ("yvonne", dec!(100))]);
        let settlement = Settlement::with_seed(executor.clone(), 7);
        executor
            .configure_auction(true, Some(clock.now() + Duration::minutes(30)), None)
            .unwrap();
        executor.place_bid(1, dec!(20)).unwrap();
        executor.place_bid(2, dec!(25)).unwrap();

        let not_yet = settlement.tick().unwrap();
        assert!(!not_yet.auction_closed);

        clock.advance(Duration::minutes(30)).unwrap();
        let report = settlement.tick().unwrap();

        assert!(report.auction_closed);
        assert_eq!(report.auction_winner.unwrap().bidder, 2);
        let auction = executor.auction_snapshot();
        assert!(!auction.active);
        assert_eq!(auction.winner.unwrap().amount, dec!(25));
        assert_eq!(
            outbox.messages_for(2).last().unwrap(),
            "You won the auction with a bid of 25"
        );
    }

    #[test]
    fn test_auction_without_end_never_auto_closes() {
        let World {
            executor, clock, ..
        } = world(&[("xavier", dec!(100))]);
        let settlement = Settlement::with_seed(executor.clone(), 7);
        executor.configure_auction(true, None, None).unwrap();

        clock.advance(Duration::days(30)).unwrap();
        let report = settlement.tick().unwrap();

        assert!(!report.auction_closed);
        assert!(executor.auction_snapshot().active);
    }

    #[test]
    fn test_closing_auction_without_bids_has_no_winner() {
        let World {
            executor, clock, ..
        } = world(&[]);
        let settlement = Settlement::with_seed(executor.clone(), 7);
        executor
            .configure_auction(true, Some(clock.now()), None)
            .unwrap();

        let report = settlement.tick().unwrap();

        assert!(report.auction_closed);
        assert!(report.auction_winner.is_none());
        assert!(!executor.auction_snapshot().active);
    }

    #[test]
    fn test_drift_stays_within_band() {
        let World { executor, .. } = world(&[]);
        let settlement = Settlement::with_seed(executor.clone(), 42);

        for _ in 0..50 {
            let before = prices(&executor);
            assert_eq!(settlement.tick().unwrap().repriced, 2);
            let after = prices(&executor);

            for (ticker, old) in before {
                let ratio = after[&ticker] / old;
                // Band is [-0.98%, +1.02%], plus rounding to 4 places
                assert!(ratio >= dec!(0.9895), "{} fell to {}", ticker, ratio);
                assert!(ratio <= dec!(1.0105), "{} rose to {}", ticker, ratio);
            }
        }
    }

    #[test]
    fn test_seeded_drift_is_reproducible() {
        let first = world(&[]).executor;
        let second = world(&[]).executor;

        Settlement::with_seed(first.clone(), 99).tick().unwrap();
        Settlement::with_seed(second.clone(), 99).tick().unwrap();

        assert_eq!(prices(&first), prices(&second));
    }

    #[test]
    fn test_drift_respects_price_floor() {
        let World {
            executor,
            outbox,
            clock,
        } = world(&[]);
        let mut config = EngineConfig::default();
        config.drift.min_price = dec!(5);
        let floored = Executor::new(executor.store().clone(), clock, outbox, config);

        Settlement::with_seed(floored, 3).tick().unwrap();

        assert_eq!(executor.store().asset("COIN").unwrap().price, dec!(5));
    }

    #[test]
    fn test_failed_step_aborts_whole_batch() {
        let World {
            executor, clock, ..
        } = world(&[("alice", dec!(1000))]);
        let settlement = Settlement::with_seed(executor.clone(), 7);
        executor.open_deposit(1, dec!(1000)).unwrap();
        let prices_before = prices(&executor);

        // Auction led by an account that does not exist
        executor
            .store()
            .run(clock.now(), 1, |unit| {
                unit.auction.put(AuctionState {
                    active: true,
                    ends_at: Some(unit.now()),
                    bids: vec![Bid {
                        bidder: 404,
                        handle: "ghost".to_string(),
                        amount: dec!(10),
                        placed_at: unit.now(),
                    }],
                    ..AuctionState::default()
                });
                Ok(())
            })
            .unwrap();
        clock.advance(Duration::hours(24)).unwrap();

        let error = settlement.tick().unwrap_err();

        assert_eq!(error, LedgerError::account_not_found(404));
        let alice = executor.store().account(1).unwrap();
        assert_eq!(alice.balance, dec!(0));
        assert!(alice.deposit.is_some());
        assert!(executor.auction_snapshot().active);
        assert_eq!(prices(&executor), prices_before);
    }

    #[test]
    fn test_tick_shares_store_with_executor() {
        let World { executor, .. } = world(&[]);
        let settlement = Settlement::new(executor.clone());
        assert!(Arc::ptr_eq(
            settlement.executor().store(),
            executor.store()
        ));
    }
}
