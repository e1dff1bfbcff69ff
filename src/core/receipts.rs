//! Success payloads returned by executor operations

use crate::types::{Bid, LoanRequestId, PurchasedLine, Ticker, TradeDirection};
use rust_decimal::Decimal;
use serde::Serialize;

/// Outcome of a transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub sender_balance: Decimal,
    pub recipient_balance: Decimal,
    pub loyalty_earned: u64,
}

/// Outcome of a shop checkout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutReceipt {
    /// Sum of line prices before loyalty points
    pub subtotal: Decimal,
    /// Amount debited from the balance
    pub charged: Decimal,
    pub points_spent: u64,
    pub points_earned: u64,
    pub lines: Vec<PurchasedLine>,
}

/// Outcome of a loan request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LoanDecision {
    /// Funds were credited; `principal` is the total now owed
    Approved { principal: Decimal },
    /// The request waits for administrator review
    Pending { request: LoanRequestId },
}

/// Outcome of a loan repayment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepaymentReceipt {
    /// Amount actually taken, never more than was owed
    pub repaid: Decimal,
    /// Principal still owed
    pub remaining: Decimal,
}

/// Outcome of an accepted auction bid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidReceipt {
    pub bid: Bid,
    /// Previous leader, refunded in the same unit
    pub outbid: Option<Bid>,
}

/// Outcome of an asset trade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReceipt {
    pub ticker: Ticker,
    pub direction: TradeDirection,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    /// Quantity held after the trade
    pub position: Decimal,
}
