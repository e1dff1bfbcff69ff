//! Player-facing notification messages

use super::account::AccountId;
use serde::{Deserialize, Serialize};

/// A message queued for a player by a committed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub account: AccountId,
    pub text: String,
}

impl Notification {
    pub fn new(account: AccountId, text: impl Into<String>) -> Self {
        Notification {
            account,
            text: text.into(),
        }
    }
}
