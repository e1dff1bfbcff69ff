//! Shared fixtures for unit tests

use super::clock::ManualClock;
use super::executor::Executor;
use super::notify::Outbox;
use crate::config::EngineConfig;
use crate::store::LedgerStore;
use crate::types::{AssetCategory, ExchangeAsset, InsuranceOption, ShopItem, Task};
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub(crate) struct World {
    pub executor: Executor,
    pub outbox: Arc<Outbox>,
    pub clock: Arc<ManualClock>,
}

/// Executor over a small catalogue with the given accounts (ids from 1)
///
/// - Shop: 1 "Mug" 50 (discounted to 40, 5 in stock), 2 "Poster" 90 (3 in stock)
/// - Exchange: ACME at 100, COIN at 2.5
/// - Insurance: 1 costs 10 for 12h, 2 costs 25 for 3d
/// - Tasks: 1 "Write a review" pays 75 and 5 points
pub(crate) fn world(accounts: &[(&str, Decimal)]) -> World {
    let store = Arc::new(LedgerStore::new());
    let outbox = Arc::new(Outbox::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ));
    let executor = Executor::new(
        store,
        clock.clone(),
        outbox.clone(),
        EngineConfig::default(),
    );

    for (handle, balance) in accounts {
        executor
            .register_account(handle, *balance, 0, false)
            .unwrap();
    }

    executor
        .upsert_shop_item(ShopItem {
            id: 1,
            name: "Mug".to_string(),
            price: dec!(50),
            discount_price: Some(dec!(40)),
            quantity: 5,
            popularity: 0,
        })
        .unwrap();
    executor
        .upsert_shop_item(ShopItem {
            id: 2,
            name: "Poster".to_string(),
            price: dec!(90),
            discount_price: None,
            quantity: 3,
            popularity: 0,
        })
        .unwrap();
    executor
        .list_asset(ExchangeAsset {
            ticker: "ACME".to_string(),
            category: AssetCategory::Company,
            price: dec!(100),
        })
        .unwrap();
    executor
        .list_asset(ExchangeAsset {
            ticker: "COIN".to_string(),
            category: AssetCategory::Crypto,
            price: dec!(2.5),
        })
        .unwrap();
    executor
        .upsert_insurance_option(InsuranceOption {
            id: 1,
            cost: dec!(10),
            duration: "12h".to_string(),
        })
        .unwrap();
    executor
        .upsert_insurance_option(InsuranceOption {
            id: 2,
            cost: dec!(25),
            duration: "3d".to_string(),
        })
        .unwrap();
    executor
        .upsert_task(Task {
            id: 1,
            name: "Write a review".to_string(),
            reward: dec!(75),
            loyalty_reward: 5,
        })
        .unwrap();

    World {
        executor,
        outbox,
        clock,
    }
}
