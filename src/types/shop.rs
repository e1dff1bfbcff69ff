//! Shop and task types

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Shop item identifier
pub type ItemId = u32;

/// Task identifier
pub type TaskId = u32;

/// Task submission identifier
pub type SubmissionId = u64;

/// An item sold in the shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItem {
    pub id: ItemId,
    pub name: String,

    /// List price
    pub price: Decimal,

    /// Promotional price, used only when lower than the list price
    #[serde(default)]
    pub discount_price: Option<Decimal>,

    /// Units in stock
    pub quantity: u32,

    /// Units sold so far
    #[serde(default)]
    pub popularity: u64,
}

impl ShopItem {
    /// Price charged per unit
    pub fn unit_price(&self) -> Decimal {
        match self.discount_price {
            Some(discount) if discount < self.price => discount,
            _ => self.price,
        }
    }
}

/// One line of a shopping cart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: ItemId,
    pub quantity: u32,
}

/// Priced line recorded in the purchase entry details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasedLine {
    pub item: ItemId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// A task players can complete for a reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub reward: Decimal,
    #[serde(default)]
    pub loyalty_reward: u64,
}

/// Review state of a task submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

/// A player's claim that a task was completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub id: SubmissionId,
    pub account: AccountId,
    pub task: TaskId,
    pub submitted_at: DateTime<Utc>,
    pub status: SubmissionStatus,
}
