//! Exchange and auction types
//!
//! Tradable assets, trade direction, the shared auction record and the
//! read-only snapshots handed out to callers.

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange asset identifier (ticker symbol)
pub type Ticker = String;

/// Asset category shown on the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    /// Equity-like company share
    Company,
    /// Crypto-like token
    Crypto,
}

/// An asset listed on the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeAsset {
    pub ticker: Ticker,
    pub category: AssetCategory,

    /// Current unit price, always positive
    ///
    /// Trades read it; only the settlement drift writes it.
    pub price: Decimal,
}

/// Side of an asset trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// A bid placed on the auction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder: AccountId,
    pub handle: String,
    pub amount: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// The single shared auction record
///
/// Bids are kept in acceptance order; because every accepted bid strictly
/// exceeds the previous highest, the list is strictly increasing by amount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionState {
    /// Whether bids are currently accepted
    pub active: bool,

    /// Scheduled close; `None` means the auction is closed manually
    pub ends_at: Option<DateTime<Utc>>,

    /// Optional description of the lot on offer
    pub lot: Option<String>,

    /// Accepted bids, oldest first
    pub bids: Vec<Bid>,

    /// Winning bid, set once the auction is closed
    pub winner: Option<Bid>,
}

impl AuctionState {
    /// The bid with the strictly highest amount
    ///
    /// With equal amounts the earliest accepted bid wins, which cannot
    /// happen for bids accepted through the executor.
    pub fn highest_bid(&self) -> Option<&Bid> {
        self.bids.iter().fold(None, |best: Option<&Bid>, bid| match best {
            Some(current) if current.amount >= bid.amount => Some(current),
            _ => Some(bid),
        })
    }

    /// Amount a new bid has to exceed
    pub fn amount_to_beat(&self) -> Decimal {
        self.highest_bid()
            .map(|bid| bid.amount)
            .unwrap_or(Decimal::ZERO)
    }

    /// Whether the scheduled end has passed
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.ends_at.is_some_and(|end| end <= now)
    }

    /// Whether a leading bid still holds escrowed funds
    ///
    /// True for an active auction with bids, or a closed one whose leader
    /// never became the winner.
    pub fn has_unsettled_leader(&self) -> bool {
        self.winner.is_none() && !self.bids.is_empty()
    }
}

/// Read-only view of the exchange and the auction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub assets: Vec<ExchangeAsset>,
    pub auction: AuctionState,
    pub taken_at: DateTime<Utc>,
}
