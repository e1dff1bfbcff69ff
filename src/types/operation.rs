//! Replayable operation records
//!
//! An [`Operation`] is one row of a replay script: a money movement to run
//! through the executor, a simulated clock advance, or a settlement tick.

use super::account::AccountId;
use super::lending::OptionId;
use super::market::{Ticker, TradeDirection};
use super::shop::CartLine;
use rust_decimal::Decimal;

/// A single replayable operation
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Transfer {
        sender: AccountId,
        recipient: AccountId,
        amount: Decimal,
    },
    Checkout {
        account: AccountId,
        cart: Vec<CartLine>,
        loyalty_points: u64,
    },
    OpenDeposit {
        account: AccountId,
        amount: Decimal,
    },
    RequestLoan {
        account: AccountId,
        amount: Decimal,
    },
    RepayLoan {
        account: AccountId,
        amount: Decimal,
    },
    BuyInsurance {
        account: AccountId,
        option: OptionId,
    },
    PlaceBid {
        account: AccountId,
        amount: Decimal,
    },
    Trade {
        account: AccountId,
        ticker: Ticker,
        quantity: Decimal,
        direction: TradeDirection,
    },
    /// Move the simulated clock forward by this many hours
    Advance { hours: i64 },
    /// Run one settlement batch
    Tick,
}

impl Operation {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Transfer { .. } => "transfer",
            Operation::Checkout { .. } => "checkout",
            Operation::OpenDeposit { .. } => "deposit",
            Operation::RequestLoan { .. } => "loan",
            Operation::RepayLoan { .. } => "repay",
            Operation::BuyInsurance { .. } => "insure",
            Operation::PlaceBid { .. } => "bid",
            Operation::Trade {
                direction: TradeDirection::Buy,
                ..
            } => "buy",
            Operation::Trade {
                direction: TradeDirection::Sell,
                ..
            } => "sell",
            Operation::Advance { .. } => "advance",
            Operation::Tick => "tick",
        }
    }

    /// Account that initiates the operation
    ///
    /// Concurrent replay keeps the operations of one initiating account in
    /// file order.
    pub fn primary_account(&self) -> Option<AccountId> {
        match self {
            Operation::Transfer { sender, .. } => Some(*sender),
            Operation::Checkout { account, .. }
            | Operation::OpenDeposit { account, .. }
            | Operation::RequestLoan { account, .. }
            | Operation::RepayLoan { account, .. }
            | Operation::BuyInsurance { account, .. }
            | Operation::PlaceBid { account, .. }
            | Operation::Trade { account, .. } => Some(*account),
            Operation::Advance { .. } | Operation::Tick => None,
        }
    }

    /// Whether the operation orders everything before and after it
    ///
    /// Clock advances and ticks change what later operations observe, so
    /// concurrent replay never reorders work across them.
    pub fn is_barrier(&self) -> bool {
        matches!(self, Operation::Advance { .. } | Operation::Tick)
    }
}
