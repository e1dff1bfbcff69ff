//! Loan and insurance types
//!
//! Loans, pending loan requests, the loan settings record, insurance options
//! and the per-account insurance policy.

use super::account::AccountId;
use super::error::LedgerError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pending loan request identifier
pub type LoanRequestId = u64;

/// Insurance option identifier
pub type OptionId = u32;

/// Outstanding loan of one account
///
/// An account holds at most one loan; further approved requests grow the
/// principal of the existing loan and keep its original rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    /// Owning account
    pub account: AccountId,

    /// Principal still owed, never negative
    pub principal: Decimal,

    /// Interest rate in percent, fixed when the loan was first issued
    pub interest_rate: Decimal,

    /// When the loan was first issued
    pub issued_at: DateTime<Utc>,
}

impl Loan {
    /// Whether anything is still owed
    pub fn is_active(&self) -> bool {
        self.principal > Decimal::ZERO
    }
}

/// Global loan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanConfig {
    /// Maximum aggregate debt a single account may carry
    pub max_amount: Decimal,

    /// Interest rate in percent applied to newly issued loans
    pub interest_rate: Decimal,

    /// Issue loans immediately instead of queueing them for review
    pub auto_approve: bool,
}

impl Default for LoanConfig {
    fn default() -> Self {
        Self {
            max_amount: Decimal::new(5000, 0),
            interest_rate: Decimal::new(5, 0),
            auto_approve: true,
        }
    }
}

/// Review state of a pending loan request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Loan request queued for administrator review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: LoanRequestId,
    pub account: AccountId,
    pub amount: Decimal,
    pub requested_at: DateTime<Utc>,
    pub status: RequestStatus,
}

/// A purchasable insurance package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceOption {
    pub id: OptionId,

    /// Price charged to the balance
    pub cost: Decimal,

    /// Coverage span such as `"12h"` or `"3d"`
    pub duration: String,
}

impl InsuranceOption {
    /// Parse the coverage span of this option
    pub fn coverage(&self) -> Result<Duration, LedgerError> {
        parse_coverage(&self.duration)
    }
}

/// Parse a coverage span with an hour (`h`) or day (`d`) suffix
///
/// # Errors
///
/// Returns `LedgerError::InvalidDuration` for an unknown suffix, a
/// non-numeric count, a zero count or a span too long to represent.
pub fn parse_coverage(raw: &str) -> Result<Duration, LedgerError> {
    let trimmed = raw.trim();
    let invalid = || LedgerError::invalid_duration(raw);

    let unit = trimmed.chars().last().ok_or_else(invalid)?;
    let count: i64 = trimmed[..trimmed.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| invalid())?;
    if count <= 0 {
        return Err(invalid());
    }

    let span = match unit {
        'h' | 'H' => Duration::try_hours(count),
        'd' | 'D' => Duration::try_days(count),
        _ => None,
    };
    span.ok_or_else(invalid)
}

/// Insurance coverage of one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub account: AccountId,

    /// End of coverage
    pub ends_at: DateTime<Utc>,
}

impl InsurancePolicy {
    /// Coverage end after stacking `span` on top of the current policy
    ///
    /// Coverage is extended from whichever is later, the current end or
    /// `now`, so lapsed policies restart from `now`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ArithmeticOverflow` when the new end falls
    /// outside the representable calendar.
    pub fn extended_end(
        current: Option<&InsurancePolicy>,
        now: DateTime<Utc>,
        span: Duration,
    ) -> Result<DateTime<Utc>, LedgerError> {
        let base = current
            .map(|policy| policy.ends_at.max(now))
            .unwrap_or(now);
        base.checked_add_signed(span)
            .ok_or_else(|| LedgerError::arithmetic_overflow("insurance coverage"))
    }
}
