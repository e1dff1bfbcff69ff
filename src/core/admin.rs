//! Administrative operations
//!
//! Registration, manual adjustments, review queues, auction control and
//! catalogue maintenance. These run through the same atomic units as the
//! player operations in [`super::executor`].

use super::executor::{
    credit, debit, ensure_positive, ensure_within_limit, issue_loan, Executor,
};
use super::settlement::close_auction;
use crate::types::{
    Account, AccountId, AuctionState, EntryKind, ExchangeAsset, InsuranceOption, LedgerEntry,
    LedgerError, LoanConfig, LoanRequest, LoanRequestId, MarketSnapshot, RequestStatus, ShopItem,
    SubmissionId, SubmissionStatus, Task, TaskId, TaskSubmission, TeamId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Fields to change on an account; `None` leaves a field as it is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub balance: Option<Decimal>,
    pub loyalty_points: Option<u64>,
    pub blocked: Option<bool>,
    pub team: Option<Option<TeamId>>,
}

impl AccountPatch {
    pub fn balance(balance: Decimal) -> Self {
        Self {
            balance: Some(balance),
            ..Self::default()
        }
    }

    pub fn blocked(blocked: bool) -> Self {
        Self {
            blocked: Some(blocked),
            ..Self::default()
        }
    }
}

impl Executor {
    /// Create an account
    ///
    /// A positive opening balance is recorded as a ledger credit so the
    /// account's entries always sum to its balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is blank or taken, or the opening
    /// balance is negative.
    pub fn register_account(
        &self,
        handle: &str,
        opening_balance: Decimal,
        loyalty_points: u64,
        admin: bool,
    ) -> Result<Account, LedgerError> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(LedgerError::InvalidHandle {
                handle: handle.to_string(),
            });
        }
        if opening_balance < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(opening_balance));
        }

        self.execute("register", |unit| {
            let key = handle.to_string();
            if unit.handles.get(&key).is_some() {
                return Err(LedgerError::HandleTaken { handle: key });
            }

            let mut account = Account::new(unit.allocate_account_id(), handle);
            account.balance = opening_balance;
            account.loyalty_points = loyalty_points;
            account.admin = admin;

            if opening_balance > Decimal::ZERO {
                unit.record(LedgerEntry::credit(
                    account.id,
                    EntryKind::OpeningBalance,
                    opening_balance,
                    "",
                    unit.now(),
                ));
            }
            unit.handles.put(key, account.id);
            unit.put_account(account.clone());
            Ok(account)
        })
    }

    /// Overwrite account fields
    ///
    /// A balance change is recorded as an adjustment entry for the
    /// difference.
    pub fn adjust_account(
        &self,
        id: AccountId,
        patch: AccountPatch,
    ) -> Result<Account, LedgerError> {
        if let Some(balance) = patch.balance {
            if balance < Decimal::ZERO {
                return Err(LedgerError::invalid_amount(balance));
            }
        }

        self.execute("adjust", |unit| {
            let mut account = unit.account(id)?;

            if let Some(target) = patch.balance {
                let difference = target - account.balance;
                if difference > Decimal::ZERO {
                    credit(&mut account, difference)?;
                    unit.record(LedgerEntry::credit(
                        id,
                        EntryKind::AdminAdjustment,
                        difference,
                        "",
                        unit.now(),
                    ));
                } else if difference < Decimal::ZERO {
                    debit(&mut account, -difference)?;
                    unit.record(LedgerEntry::debit(
                        id,
                        EntryKind::AdminAdjustment,
                        -difference,
                        "",
                        unit.now(),
                    ));
                }
            }
            if let Some(points) = patch.loyalty_points {
                account.loyalty_points = points;
            }
            if let Some(blocked) = patch.blocked {
                account.blocked = blocked;
            }
            if let Some(team) = patch.team {
                account.team = team;
            }

            unit.put_account(account.clone());
            Ok(account)
        })
    }

    /// Approve or reject a queued loan request
    ///
    /// Approval re-checks the limit against the debt owed now, not when the
    /// request was made.
    pub fn review_loan_request(
        &self,
        request: LoanRequestId,
        approve: bool,
    ) -> Result<LoanRequest, LedgerError> {
        self.execute("review loan", |unit| {
            let mut pending = unit
                .loan_requests
                .get(&request)
                .ok_or(LedgerError::LoanRequestNotFound { request })?;
            if pending.status != RequestStatus::Pending {
                return Err(LedgerError::RequestAlreadyReviewed { request });
            }

            if approve {
                let settings = unit.loan_config.get();
                ensure_within_limit(unit, pending.account, pending.amount, &settings)?;
                issue_loan(unit, pending.account, pending.amount, &settings)?;
                pending.status = RequestStatus::Approved;
                unit.notify(
                    pending.account,
                    format!("Your loan of {} was approved", pending.amount),
                );
            } else {
                pending.status = RequestStatus::Rejected;
                unit.notify(
                    pending.account,
                    format!("Your loan request for {} was rejected", pending.amount),
                );
            }

            unit.loan_requests.put(request, pending.clone());
            Ok(pending)
        })
    }

    /// Claim completion of a task
    pub fn submit_task(
        &self,
        account: AccountId,
        task: TaskId,
    ) -> Result<TaskSubmission, LedgerError> {
        self.execute("submit task", |unit| {
            unit.account(account)?;
            unit.tasks
                .get(&task)
                .ok_or(LedgerError::TaskNotFound { task })?;

            let submission = TaskSubmission {
                id: unit.allocate_submission_id(),
                account,
                task,
                submitted_at: unit.now(),
                status: SubmissionStatus::Pending,
            };
            unit.submissions.put(submission.id, submission.clone());
            unit.notify(account, "Your task was submitted for review");
            Ok(submission)
        })
    }

    /// Approve or reject a task submission
    ///
    /// Approval pays the task reward and loyalty points and records the
    /// task as completed.
    pub fn review_task_submission(
        &self,
        submission: SubmissionId,
        approve: bool,
    ) -> Result<TaskSubmission, LedgerError> {
        self.execute("review task", |unit| {
            let mut claim = unit
                .submissions
                .get(&submission)
                .ok_or(LedgerError::SubmissionNotFound { submission })?;
            if claim.status != SubmissionStatus::Pending {
                return Err(LedgerError::SubmissionAlreadyReviewed { submission });
            }
            let task = unit
                .tasks
                .get(&claim.task)
                .ok_or(LedgerError::TaskNotFound { task: claim.task })?;

            if approve {
                let mut account = unit.account(claim.account)?;
                credit(&mut account, task.reward)?;
                account.loyalty_points = account
                    .loyalty_points
                    .checked_add(task.loyalty_reward)
                    .ok_or_else(|| LedgerError::arithmetic_overflow("loyalty points"))?;

                let now = unit.now();
                unit.record(LedgerEntry::credit(
                    account.id,
                    EntryKind::TaskReward,
                    task.reward,
                    task.name.clone(),
                    now,
                ));
                if unit.completed_tasks.get(&(account.id, task.id)).is_none() {
                    unit.completed_tasks.put((account.id, task.id), now);
                }
                unit.notify(
                    account.id,
                    format!("Your task \"{}\" was approved", task.name),
                );
                unit.put_account(account);
                claim.status = SubmissionStatus::Approved;
            } else {
                unit.notify(
                    claim.account,
                    format!("Your task \"{}\" was rejected", task.name),
                );
                claim.status = SubmissionStatus::Rejected;
            }

            unit.submissions.put(submission, claim.clone());
            Ok(claim)
        })
    }

    /// Start or stop the auction
    ///
    /// Starting clears bids and winner, refunding a leader whose funds are
    /// still held from an unresolved earlier auction. Stopping a running
    /// auction picks the winner exactly as the settlement batch does.
    pub fn configure_auction(
        &self,
        active: bool,
        ends_at: Option<DateTime<Utc>>,
        lot: Option<String>,
    ) -> Result<AuctionState, LedgerError> {
        self.execute("configure auction", |unit| {
            let current = unit.auction.get();

            if !active {
                if current.active {
                    close_auction(unit)?;
                }
                let mut closed = unit.auction.get();
                closed.active = false;
                closed.ends_at = ends_at;
                unit.auction.put(closed.clone());
                return Ok(closed);
            }

            if current.has_unsettled_leader() {
                if let Some(leader) = current.highest_bid() {
                    let mut account = unit.account(leader.bidder)?;
                    credit(&mut account, leader.amount)?;
                    unit.put_account(account);
                    unit.record(LedgerEntry::credit(
                        leader.bidder,
                        EntryKind::AuctionRefund,
                        leader.amount,
                        "auction restarted",
                        unit.now(),
                    ));
                    unit.notify(
                        leader.bidder,
                        format!(
                            "The auction was restarted; your bid of {} was refunded",
                            leader.amount
                        ),
                    );
                }
            }

            let fresh = AuctionState {
                active: true,
                ends_at,
                lot: lot.clone(),
                bids: Vec::new(),
                winner: None,
            };
            unit.auction.put(fresh.clone());
            Ok(fresh)
        })
    }

    /// Replace the loan settings
    pub fn update_loan_config(&self, settings: LoanConfig) -> Result<LoanConfig, LedgerError> {
        if settings.max_amount < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(settings.max_amount));
        }
        if settings.interest_rate < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(settings.interest_rate));
        }

        self.execute("loan settings", |unit| {
            unit.loan_config.put(settings.clone());
            Ok(settings.clone())
        })
    }

    /// Send a message to every non-admin account
    ///
    /// Returns the number of recipients.
    pub fn broadcast(&self, text: &str) -> Result<usize, LedgerError> {
        self.execute("broadcast", |unit| {
            let recipients = unit.accounts.scan(|account| !account.admin);
            for account in &recipients {
                unit.notify(*account, text);
            }
            Ok(recipients.len())
        })
    }

    /// Add or replace a shop item
    pub fn upsert_shop_item(&self, item: ShopItem) -> Result<(), LedgerError> {
        ensure_positive(item.price)?;
        if let Some(discount) = item.discount_price {
            ensure_positive(discount)?;
        }
        self.execute("shop item", |unit| {
            unit.shop.put(item.id, item.clone());
            Ok(())
        })
    }

    /// Add or replace an exchange asset
    pub fn list_asset(&self, asset: ExchangeAsset) -> Result<(), LedgerError> {
        ensure_positive(asset.price)?;
        self.execute("list asset", |unit| {
            unit.assets.put(asset.ticker.clone(), asset.clone());
            Ok(())
        })
    }

    /// Add or replace an insurance option
    pub fn upsert_insurance_option(&self, option: InsuranceOption) -> Result<(), LedgerError> {
        let span = option.coverage()?;
        if self.clock().now().checked_add_signed(span).is_none() {
            return Err(LedgerError::invalid_duration(&option.duration));
        }
        if option.cost < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(option.cost));
        }
        self.execute("insurance option", |unit| {
            unit.insurance_options.put(option.id, option.clone());
            Ok(())
        })
    }

    /// Add or replace a task
    pub fn upsert_task(&self, task: Task) -> Result<(), LedgerError> {
        if task.reward < Decimal::ZERO {
            return Err(LedgerError::invalid_amount(task.reward));
        }
        self.execute("task", |unit| {
            unit.tasks.put(task.id, task.clone());
            Ok(())
        })
    }

    /// Consistent view of the exchange and the auction
    pub fn market_snapshot(&self) -> MarketSnapshot {
        self.store().market_snapshot(self.clock().now())
    }

    /// Current auction record
    pub fn auction_snapshot(&self) -> AuctionState {
        self.store().auction_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{world, World};
    use crate::core::traits::Clock;
    use crate::types::ErrorKind;
    use chrono::Duration;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_register_records_opening_balance() {
        let World { executor, .. } = world(&[]);

        let account = executor.register_account("carol", dec!(250), 7, false).unwrap();

        assert_eq!(account.balance, dec!(250));
        assert_eq!(account.loyalty_points, 7);
        assert_eq!(executor.store().account_id_by_handle("carol"), Some(account.id));
        let entries = executor.store().ledger_for(account.id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::OpeningBalance);
    }

    #[rstest]
    #[case::taken("alice", dec!(0), ErrorKind::Conflict)]
    #[case::blank("   ", dec!(0), ErrorKind::Validation)]
    #[case::negative("carol", dec!(-1), ErrorKind::Validation)]
    fn test_register_rejections(
        #[case] handle: &str,
        #[case] opening: Decimal,
        #[case] kind: ErrorKind,
    ) {
        let World { executor, .. } = world(&[("alice", dec!(10))]);
        let error = executor.register_account(handle, opening, 0, false).unwrap_err();
        assert_eq!(error.kind(), kind);
        assert_eq!(executor.store().accounts().len(), 1);
    }

    #[rstest]
    #[case::raise(dec!(150), EntryKind::AdminAdjustment, dec!(50))]
    #[case::lower(dec!(40), EntryKind::AdminAdjustment, dec!(-60))]
    fn test_adjust_balance_records_difference(
        #[case] target: Decimal,
        #[case] kind: EntryKind,
        #[case] signed: Decimal,
    ) {
        let World { executor, .. } = world(&[("alice", dec!(100))]);

        let account = executor.adjust_account(1, AccountPatch::balance(target)).unwrap();

        assert_eq!(account.balance, target);
        let entry = executor.store().ledger_for(1).pop().unwrap();
        assert_eq!(entry.kind, kind);
        assert_eq!(entry.signed_amount(), signed);
    }

    #[test]
    fn test_adjust_flags_and_team() {
        let World { executor, .. } = world(&[("alice", dec!(100))]);
        let patch = AccountPatch {
            loyalty_points: Some(12),
            team: Some(Some(3)),
            ..AccountPatch::default()
        };

        let account = executor.adjust_account(1, patch).unwrap();

        assert_eq!(account.loyalty_points, 12);
        assert_eq!(account.team, Some(3));
        assert_eq!(account.balance, dec!(100));
        assert_eq!(executor.store().ledger_for(1).len(), 1);
    }

    fn queue_loan(executor: &Executor, amount: Decimal) -> LoanRequestId {
        executor
            .update_loan_config(LoanConfig {
                auto_approve: false,
                ..LoanConfig::default()
            })
            .unwrap();
        match executor.request_loan(1, amount).unwrap() {
            crate::core::receipts::LoanDecision::Pending { request } => request,
            other => panic!("expected a pending request, got {:?}", other),
        }
    }

    #[test]
    fn test_approving_loan_request_issues_loan() {
        let World {
            executor, outbox, ..
        } = world(&[("alice", dec!(0))]);
        let request = queue_loan(&executor, dec!(700));

        let reviewed = executor.review_loan_request(request, true).unwrap();

        assert_eq!(reviewed.status, RequestStatus::Approved);
        assert_eq!(executor.store().account(1).unwrap().balance, dec!(700));
        assert_eq!(executor.store().loan(1).unwrap().principal, dec!(700));
        assert!(executor.store().pending_loan_requests().is_empty());
        assert_eq!(
            outbox.messages_for(1).last().unwrap(),
            "Your loan of 700 was approved"
        );

        let again = executor.review_loan_request(request, false).unwrap_err();
        assert_eq!(again, LedgerError::RequestAlreadyReviewed { request });
    }

    #[test]
    fn test_rejecting_loan_request_moves_no_money() {
        let World { executor, .. } = world(&[("alice", dec!(0))]);
        let request = queue_loan(&executor, dec!(700));

        let reviewed = executor.review_loan_request(request, false).unwrap();

        assert_eq!(reviewed.status, RequestStatus::Rejected);
        assert_eq!(executor.store().account(1).unwrap().balance, dec!(0));
        assert!(executor.store().loan(1).is_none());
    }

    #[test]
    fn test_approval_rechecks_loan_limit() {
        let World { executor, .. } = world(&[("alice", dec!(0))]);
        let first = queue_loan(&executor, dec!(3000));
        let second = queue_loan(&executor, dec!(3000));
        executor.review_loan_request(first, true).unwrap();

        let error = executor.review_loan_request(second, true).unwrap_err();

        assert!(matches!(error, LedgerError::LoanLimitExceeded { .. }));
        assert_eq!(executor.store().pending_loan_requests().len(), 1);
    }

    #[test]
    fn test_unknown_loan_request() {
        let World { executor, .. } = world(&[]);
        assert_eq!(
            executor.review_loan_request(9, true).unwrap_err(),
            LedgerError::LoanRequestNotFound { request: 9 }
        );
    }

    #[test]
    fn test_task_submission_approval_pays_reward() {
        let World {
            executor, outbox, ..
        } = world(&[("alice", dec!(0))]);

        let submission = executor.submit_task(1, 1).unwrap();
        assert_eq!(submission.status, SubmissionStatus::Pending);

        let reviewed = executor.review_task_submission(submission.id, true).unwrap();

        assert_eq!(reviewed.status, SubmissionStatus::Approved);
        let alice = executor.store().account(1).unwrap();
        assert_eq!(alice.balance, dec!(75));
        assert_eq!(alice.loyalty_points, 5);
        assert!(executor.store().has_completed(1, 1));
        assert_eq!(
            outbox.messages_for(1),
            vec![
                "Your task was submitted for review",
                "Your task \"Write a review\" was approved",
            ]
        );

        let again = executor
            .review_task_submission(submission.id, true)
            .unwrap_err();
        assert_eq!(
            again,
            LedgerError::SubmissionAlreadyReviewed {
                submission: submission.id
            }
        );
    }

    #[test]
    fn test_task_submission_rejection_only_notifies() {
        let World { executor, .. } = world(&[("alice", dec!(0))]);
        let submission = executor.submit_task(1, 1).unwrap();

        executor.review_task_submission(submission.id, false).unwrap();

        assert_eq!(executor.store().account(1).unwrap().balance, dec!(0));
        assert!(!executor.store().has_completed(1, 1));
    }

    #[test]
    fn test_submit_unknown_task() {
        let World { executor, .. } = world(&[("alice", dec!(0))]);
        assert_eq!(
            executor.submit_task(1, 77).unwrap_err(),
            LedgerError::TaskNotFound { task: 77 }
        );
    }

    #[test]
    fn test_restarting_auction_refunds_open_leader() {
        let World { executor, .. } = world(&[("xavier", dec!(100))]);
        executor.configure_auction(true, None, None).unwrap();
        executor.place_bid(1, dec!(30)).unwrap();

        let fresh = executor
            .configure_auction(true, None, Some("Second lot".to_string()))
            .unwrap();

        assert!(fresh.bids.is_empty());
        assert_eq!(fresh.lot.as_deref(), Some("Second lot"));
        assert_eq!(executor.store().account(1).unwrap().balance, dec!(100));
    }

    #[test]
    fn test_stopping_auction_selects_winner() {
        let World {
            executor, outbox, ..
        } = world(&[("xavier", dec!(100)), ("yvonne", dec!(100))]);
        executor.configure_auction(true, None, None).unwrap();
        executor.place_bid(1, dec!(30)).unwrap();
        executor.place_bid(2, dec!(35)).unwrap();

        let closed = executor.configure_auction(false, None, None).unwrap();

        assert!(!closed.active);
        assert_eq!(closed.winner.unwrap().bidder, 2);
        // Winner's escrow is kept, the loser was refunded when outbid
        assert_eq!(executor.store().account(1).unwrap().balance, dec!(100));
        assert_eq!(executor.store().account(2).unwrap().balance, dec!(65));
        assert!(outbox.messages_for(2).last().unwrap().contains("won the auction"));

        // A new auction after a settled one refunds nobody
        executor.configure_auction(true, None, None).unwrap();
        assert_eq!(executor.store().account(2).unwrap().balance, dec!(65));
    }

    #[test]
    fn test_broadcast_skips_admins() {
        let World {
            executor, outbox, ..
        } = world(&[("alice", dec!(0)), ("bob", dec!(0))]);
        executor.register_account("root", dec!(0), 0, true).unwrap();

        let sent = executor.broadcast("Maintenance at noon").unwrap();

        assert_eq!(sent, 2);
        assert_eq!(outbox.messages_for(1), vec!["Maintenance at noon"]);
        assert_eq!(outbox.messages_for(2), vec!["Maintenance at noon"]);
        assert!(outbox.messages_for(3).is_empty());
    }

    #[rstest]
    #[case::hours_out_of_range("99999999999999999h")]
    #[case::past_calendar_end("1000000000d")]
    fn test_insurance_option_with_unreachable_coverage_is_rejected(#[case] duration: &str) {
        let World { executor, .. } = world(&[("alice", dec!(100))]);
        let option = InsuranceOption {
            id: 9,
            cost: dec!(1),
            duration: duration.to_string(),
        };

        let err = executor.upsert_insurance_option(option).unwrap_err();

        assert!(matches!(err, LedgerError::InvalidDuration { .. }));
        assert_eq!(
            executor.buy_insurance(1, 9).unwrap_err(),
            LedgerError::OptionNotFound { option: 9 }
        );
    }

    #[test]
    fn test_catalogue_validation() {
        let World { executor, .. } = world(&[]);
        let option = InsuranceOption {
            id: 5,
            cost: dec!(1),
            duration: "forever".to_string(),
        };
        assert_eq!(
            executor.upsert_insurance_option(option).unwrap_err().kind(),
            ErrorKind::Validation
        );

        let asset = ExchangeAsset {
            ticker: "ZERO".to_string(),
            category: crate::types::AssetCategory::Crypto,
            price: dec!(0),
        };
        assert!(executor.list_asset(asset).is_err());
        assert!(executor.store().asset("ZERO").is_none());
    }

    #[test]
    fn test_market_snapshot_lists_assets_and_auction() {
        let World { executor, clock, .. } = world(&[]);
        executor
            .configure_auction(true, Some(clock.now() + Duration::hours(1)), None)
            .unwrap();

        let snapshot = executor.market_snapshot();

        assert_eq!(snapshot.assets.len(), 2);
        assert_eq!(snapshot.assets[0].ticker, "ACME");
        assert!(snapshot.auction.active);
        assert_eq!(snapshot.taken_at, clock.now());
    }
}
