//! CSV format handling for operation scripts and account output
//!
//! Script columns are `op,account,counterparty,amount,target,quantity`.
//! Which columns an operation reads:
//!
//! | op                        | account | counterparty | amount         | target           | quantity |
//! |---------------------------|---------|--------------|----------------|------------------|----------|
//! | transfer                  | sender  | recipient    | amount         |                  |          |
//! | checkout                  | buyer   |              | loyalty points | `item:qty;...`   |          |
//! | deposit, loan, repay, bid | account |              | amount         |                  |          |
//! | insure                    | account |              |                | option id        |          |
//! | buy, sell                 | account |              |                | ticker           | quantity |
//! | advance                   |         |              | hours          |                  |          |
//! | tick                      |         |              |                |                  |          |
//!
//! Conversion is pure so it can be tested without files.

use crate::io::error::ReplayError;
use crate::store::LedgerStore;
use crate::types::{AccountId, CartLine, Operation, TradeDirection};
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

/// One row of an operation script as it appears in the file
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct OpRecord {
    pub op: String,
    pub account: Option<AccountId>,
    pub counterparty: Option<AccountId>,
    pub amount: Option<String>,
    pub target: Option<String>,
    pub quantity: Option<String>,
}

/// Convert a script row into an [`Operation`]
///
/// Columns an operation does not read are ignored.
///
/// # Errors
///
/// Returns a description of the problem when the op is unknown or a column
/// it needs is missing or unparsable.
pub fn convert_op_record(record: OpRecord) -> Result<Operation, String> {
    let op = record.op.to_lowercase();
    let operation = match op.as_str() {
        "transfer" => Operation::Transfer {
            sender: required_account(&record, "account", record.account)?,
            recipient: required_account(&record, "counterparty", record.counterparty)?,
            amount: required_decimal(&record, "amount", record.amount.as_deref())?,
        },
        "checkout" => Operation::Checkout {
            account: required_account(&record, "account", record.account)?,
            cart: parse_cart(required(&record, "target", record.target.as_deref())?)?,
            loyalty_points: match present(record.amount.as_deref()) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid loyalty points '{}'", raw))?,
                None => 0,
            },
        },
        "deposit" => Operation::OpenDeposit {
            account: required_account(&record, "account", record.account)?,
            amount: required_decimal(&record, "amount", record.amount.as_deref())?,
        },
        "loan" => Operation::RequestLoan {
            account: required_account(&record, "account", record.account)?,
            amount: required_decimal(&record, "amount", record.amount.as_deref())?,
        },
        "repay" => Operation::RepayLoan {
            account: required_account(&record, "account", record.account)?,
            amount: required_decimal(&record, "amount", record.amount.as_deref())?,
        },
        "insure" => {
            let raw = required(&record, "target", record.target.as_deref())?;
            Operation::BuyInsurance {
                account: required_account(&record, "account", record.account)?,
                option: raw
                    .parse()
                    .map_err(|_| format!("Invalid insurance option '{}'", raw))?,
            }
        }
        "bid" => Operation::PlaceBid {
            account: required_account(&record, "account", record.account)?,
            amount: required_decimal(&record, "amount", record.amount.as_deref())?,
        },
        "buy" | "sell" => Operation::Trade {
            account: required_account(&record, "account", record.account)?,
            ticker: required(&record, "target", record.target.as_deref())?.to_string(),
            quantity: required_decimal(&record, "quantity", record.quantity.as_deref())?,
            direction: if op == "buy" {
                TradeDirection::Buy
            } else {
                TradeDirection::Sell
            },
        },
        "advance" => {
            let raw = required(&record, "amount", record.amount.as_deref())?;
            let hours = raw
                .parse::<i64>()
                .map_err(|_| format!("Invalid hour count '{}'", raw))?;
            if hours <= 0 {
                return Err(format!("advance needs a positive hour count, got {}", hours));
            }
            if Duration::try_hours(hours).is_none() {
                return Err(format!("advance of {} hours is out of range", hours));
            }
            Operation::Advance { hours }
        }
        "tick" => Operation::Tick,
        _ => return Err(format!("Unknown operation '{}'", record.op)),
    };
    Ok(operation)
}

fn present(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|value| !value.is_empty())
}

fn required<'a>(record: &OpRecord, column: &str, field: Option<&'a str>) -> Result<&'a str, String> {
    present(field).ok_or_else(|| format!("{} requires the '{}' column", record.op, column))
}

fn required_account(
    record: &OpRecord,
    column: &str,
    field: Option<AccountId>,
) -> Result<AccountId, String> {
    field.ok_or_else(|| format!("{} requires the '{}' column", record.op, column))
}

fn required_decimal(record: &OpRecord, column: &str, field: Option<&str>) -> Result<Decimal, String> {
    let raw = required(record, column, field)?;
    Decimal::from_str(raw).map_err(|_| format!("Invalid {} '{}'", column, raw))
}

/// Parse `item:qty;item:qty`
fn parse_cart(raw: &str) -> Result<Vec<CartLine>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (item, quantity) = entry
                .split_once(':')
                .ok_or_else(|| format!("Cart entry '{}' is not item:quantity", entry))?;
            Ok(CartLine {
                item: item
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid item id '{}'", item.trim()))?,
                quantity: quantity
                    .trim()
                    .parse()
                    .map_err(|_| format!("Invalid quantity '{}'", quantity.trim()))?,
            })
        })
        .collect()
}

/// One row of the accounts report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRow {
    pub account: AccountId,
    pub handle: String,
    pub balance: String,
    pub loyalty: u64,
    /// Principal of the running deposit, zero when none
    pub deposit: String,
    /// Outstanding loan principal, zero when none
    pub loan: String,
    pub blocked: bool,
}

/// Build report rows for every account, sorted by id
pub fn account_rows(store: &LedgerStore) -> Vec<AccountRow> {
    let mut accounts = store.accounts();
    accounts.sort_by_key(|account| account.id);

    accounts
        .into_iter()
        .map(|account| {
            let deposit = account
                .deposit
                .as_ref()
                .map_or(Decimal::ZERO, |deposit| deposit.amount);
            let loan = store
                .loan(account.id)
                .map_or(Decimal::ZERO, |loan| loan.principal);
            AccountRow {
                account: account.id,
                handle: account.handle,
                balance: money(account.balance),
                loyalty: account.loyalty_points,
                deposit: money(deposit),
                loan: money(loan),
                blocked: account.blocked,
            }
        })
        .collect()
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Write the accounts report as CSV
///
/// Columns: `account,handle,balance,loyalty,deposit,loan,blocked`. The
/// header is written even when there are no rows.
pub fn write_accounts_csv(rows: &[AccountRow], output: &mut dyn Write) -> Result<(), ReplayError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(output);

    writer.write_record([
        "account", "handle", "balance", "loyalty", "deposit", "loan", "blocked",
    ])?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
