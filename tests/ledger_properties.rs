//! Property tests over random operation sequences
//!
//! Whatever mix of operations is thrown at the engine, balances stay
//! non-negative, transfers conserve money and every account's ledger
//! entries sum to its balance.

use bank_ledger_engine::config::EngineConfig;
use bank_ledger_engine::core::{LedgerEngine, Outbox};
use bank_ledger_engine::strategy::apply;
use bank_ledger_engine::types::{CartLine, Operation, TradeDirection};
use bank_ledger_engine::WorldSeed;
use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

const SEED: &str = r#"
    [[accounts]]
    handle = "a"
    balance = "400"
    loyalty = 10
    [[accounts]]
    handle = "b"
    balance = "250"
    [[accounts]]
    handle = "c"
    balance = "900"
    [[accounts]]
    handle = "d"
    balance = "30"

    [[assets]]
    ticker = "ACME"
    category = "company"
    price = "40"

    [[shop]]
    id = 1
    name = "Mug"
    price = "15"
    quantity = 6

    [[insurance]]
    id = 1
    cost = "20"
    duration = "1d"

    [loans]
    max_amount = "300"

    [auction]
    lot = "Lamp"
    ends_in_hours = 30
"#;

fn engine(rng_seed: u64) -> LedgerEngine {
    let engine = LedgerEngine::simulated(
        EngineConfig::default(),
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        Arc::new(Outbox::new()),
        Some(rng_seed),
    );
    WorldSeed::from_toml(SEED)
        .unwrap()
        .apply(engine.executor())
        .unwrap();
    engine
}

fn account() -> impl Strategy<Value = u64> {
    // 5 does not exist
    1u64..=5
}

fn money() -> impl Strategy<Value = Decimal> {
    (0i64..50_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => (account(), account(), money()).prop_map(|(sender, recipient, amount)| {
            Operation::Transfer { sender, recipient, amount }
        }),
        1 => (account(), 1u32..4, 0u64..12).prop_map(|(account, quantity, loyalty_points)| {
            Operation::Checkout {
                account,
                cart: vec![CartLine { item: 1, quantity }],
                loyalty_points,
            }
        }),
        1 => (account(), money()).prop_map(|(account, amount)| Operation::OpenDeposit { account, amount }),
        1 => (account(), money()).prop_map(|(account, amount)| Operation::RequestLoan { account, amount }),
        1 => (account(), money()).prop_map(|(account, amount)| Operation::RepayLoan { account, amount }),
        1 => account().prop_map(|account| Operation::BuyInsurance { account, option: 1 }),
        2 => (account(), money()).prop_map(|(account, amount)| Operation::PlaceBid { account, amount }),
        2 => (account(), 1i64..6, any::<bool>()).prop_map(|(account, units, buy)| Operation::Trade {
            account,
            ticker: "ACME".to_string(),
            quantity: Decimal::from(units),
            direction: if buy { TradeDirection::Buy } else { TradeDirection::Sell },
        }),
        1 => (1i64..20).prop_map(|hours| Operation::Advance { hours }),
        1 => Just(Operation::Tick),
    ]
}

fn transfer() -> impl Strategy<Value = Operation> {
    (account(), account(), money()).prop_map(|(sender, recipient, amount)| Operation::Transfer {
        sender,
        recipient,
        amount,
    })
}

proptest! {
    #[test]
    fn transfers_conserve_total(ops in prop::collection::vec(transfer(), 1..60)) {
        let engine = engine(1);
        let before = engine.store().total_balance();

        for op in &ops {
            let _ = apply(&engine, op);
        }

        prop_assert_eq!(engine.store().total_balance(), before);
    }

    #[test]
    fn ledger_matches_balances(ops in prop::collection::vec(operation(), 1..80), rng_seed in any::<u64>()) {
        let engine = engine(rng_seed);

        for op in &ops {
            let _ = apply(&engine, op);
        }

        let store = engine.store();
        for account in store.accounts() {
            prop_assert!(account.balance >= Decimal::ZERO);
            let ledger_sum: Decimal = store
                .ledger_for(account.id)
                .iter()
                .map(|entry| entry.signed_amount())
                .sum();
            prop_assert_eq!(ledger_sum, account.balance, "account {}", account.id);

            for (_, quantity) in store.portfolio(account.id) {
                prop_assert!(quantity >= Decimal::ZERO);
            }
            if let Some(loan) = store.loan(account.id) {
                prop_assert!(loan.principal >= Decimal::ZERO);
                prop_assert!(loan.principal <= store.loan_config().max_amount);
            }
        }
        for asset in store.market_snapshot(engine.now()).assets {
            prop_assert!(asset.price > Decimal::ZERO);
        }
    }

    #[test]
    fn accepted_bids_strictly_increase(bids in prop::collection::vec((account(), money()), 1..40)) {
        let engine = engine(2);

        for (account, amount) in &bids {
            let _ = apply(&engine, &Operation::PlaceBid { account: *account, amount: *amount });
        }

        let auction = engine.store().auction_snapshot();
        for pair in auction.bids.windows(2) {
            prop_assert!(pair[1].amount > pair[0].amount);
        }
        // Only the leader's bid is held back from the balances
        let escrow = auction.highest_bid().map_or(Decimal::ZERO, |bid| bid.amount);
        prop_assert_eq!(
            engine.store().total_balance() + escrow,
            Decimal::new(1580, 0)
        );
    }
}
