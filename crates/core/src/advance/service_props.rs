//! Property-based tests for the advance ledger.
//!
//! - Balance bounds: `0 <= balance_remaining <= amount` after any operation sequence
//! - Depletion: `status == depleted` iff `balance_remaining == 0` (balance-tracked kinds)
//! - No partial effect: a rejected deduction leaves the entry unchanged
//! - Idempotent reads: balance queries without intervening writes agree
//! - Audit trail: allocations always sum to `amount - balance_remaining`
//! - Bridge atomicity: a failed bridge leaves no expense behind

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use lexledger_shared::types::{AdvanceId, ClientId, LawyerId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::allocation::AllocationEngine;
use super::balance::BalanceAggregator;
use super::expense::{ExpenseFilter, ExpenseFunding, NewExpense};
use super::memory::MemoryAdvanceStore;
use super::service::AdvanceService;
use super::types::{Advance, AdvanceKind, AdvanceStatus, NewAdvance};
use super::validation::validate_new_advance;

/// Strategy to generate positive amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate balance-tracked kinds.
fn tracked_kind() -> impl Strategy<Value = AdvanceKind> {
    prop_oneof![
        Just(AdvanceKind::ClientRetainer),
        Just(AdvanceKind::ClientExpenseAdvance),
        Just(AdvanceKind::LawyerAdvance),
    ]
}

/// One step applied to an entry.
#[derive(Debug, Clone)]
enum Op {
    Deduct(Decimal),
    Refund,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        9 => positive_amount().prop_map(Op::Deduct),
        1 => Just(Op::Refund),
    ]
}

/// Helper to create a validated entry.
fn make_advance(kind: AdvanceKind, amount: Decimal) -> Advance {
    let input = NewAdvance {
        kind,
        client_id: Some(ClientId::new()),
        matter_id: None,
        lawyer_id: if kind == AdvanceKind::LawyerAdvance {
            Some(LawyerId::new())
        } else {
            None
        },
        amount,
        currency: "USD".to_string(),
        date_received: NaiveDate::from_ymd_opt(2026, 1, 1),
        description: None,
    };
    validate_new_advance(&input, AdvanceId::new(), Utc::now()).unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// Balance bounds and depletion hold after any sequence of deductions and refunds.
    #[test]
    fn prop_balance_bounds_and_depletion(
        kind in tracked_kind(),
        amount in positive_amount(),
        ops in prop::collection::vec(op_strategy(), 0..30),
    ) {
        let mut advance = make_advance(kind, amount);

        for op in ops {
            let before = advance.clone();
            let result = match op {
                Op::Deduct(value) => {
                    AllocationEngine::apply_deduction(&mut advance, value, None, Utc::now())
                        .map(|_| ())
                }
                Op::Refund => AllocationEngine::apply_refund(&mut advance, Utc::now()),
            };
            if result.is_err() {
                prop_assert_eq!(&advance, &before);
            }

            prop_assert!(advance.balance_remaining >= Decimal::ZERO);
            prop_assert!(advance.balance_remaining <= advance.amount);
            if advance.status != AdvanceStatus::Refunded {
                prop_assert_eq!(
                    advance.status == AdvanceStatus::Depleted,
                    advance.balance_remaining.is_zero()
                );
            }
        }
    }

    /// A deduction larger than the balance is rejected and changes nothing.
    #[test]
    fn prop_overdraw_has_no_effect(
        amount in positive_amount(),
        excess in positive_amount(),
    ) {
        let mut advance = make_advance(AdvanceKind::ClientRetainer, amount);
        let before = advance.clone();

        let result =
            AllocationEngine::apply_deduction(&mut advance, amount + excess, None, Utc::now());

        prop_assert!(result.is_err());
        prop_assert_eq!(advance, before);
    }

    /// Fee payments never show a balance and are never depleted.
    #[test]
    fn prop_fee_payments_carry_no_balance(
        amount in positive_amount(),
        deduct in positive_amount(),
    ) {
        let mut advance = make_advance(AdvanceKind::FeePaymentMilestone, amount);
        prop_assert_eq!(advance.balance_remaining, Decimal::ZERO);
        prop_assert!(
            AllocationEngine::apply_deduction(&mut advance, deduct, None, Utc::now()).is_err()
        );
        prop_assert_eq!(advance.status, AdvanceStatus::Active);
        let summary = BalanceAggregator::summarize([&advance], None).unwrap();
        prop_assert!(summary.balances.is_empty());
    }

    /// Aggregation is a pure function of its input.
    #[test]
    fn prop_aggregation_is_idempotent(amounts in prop::collection::vec(positive_amount(), 0..10)) {
        let entries: Vec<Advance> = amounts
            .into_iter()
            .map(|amount| make_advance(AdvanceKind::ClientRetainer, amount))
            .collect();

        let first = BalanceAggregator::summarize(&entries, None).unwrap();
        let second = BalanceAggregator::summarize(&entries, None).unwrap();
        prop_assert_eq!(&first, &second);

        let expected: Decimal = entries.iter().map(|a| a.balance_remaining).sum();
        prop_assert_eq!(first.total(&"USD".parse().unwrap()), expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Allocation rows always add up to what the entry has lost.
    #[test]
    fn prop_allocations_sum_to_consumed(
        kind in tracked_kind(),
        amount in positive_amount(),
        deductions in prop::collection::vec(positive_amount(), 0..15),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let svc = AdvanceService::new(Arc::new(MemoryAdvanceStore::new()));
            let template = make_advance(kind, amount);
            let advance = svc
                .add_advance(&NewAdvance {
                    kind,
                    client_id: template.client_id,
                    matter_id: None,
                    lawyer_id: template.lawyer_id,
                    amount,
                    currency: "USD".to_string(),
                    date_received: None,
                    description: None,
                })
                .await
                .unwrap();

            let mut accepted = 0usize;
            for value in deductions {
                if svc.deduct_from_advance(advance.id, value, None).await.is_ok() {
                    accepted += 1;
                }
            }

            let after = svc.get_advance(advance.id).await.unwrap();
            let allocations = svc.list_allocations(advance.id).await.unwrap();
            let allocated: Decimal = allocations.iter().map(|row| row.amount).sum();

            assert_eq!(allocations.len(), accepted);
            assert_eq!(allocated, after.consumed());
            assert_eq!(allocated, after.amount - after.balance_remaining);
        });
    }

    /// The bridge either records both halves or neither.
    #[test]
    fn prop_bridge_is_atomic(funds in positive_amount(), spend in positive_amount()) {
        let rt = runtime();
        rt.block_on(async {
            let svc = AdvanceService::new(Arc::new(MemoryAdvanceStore::new()));
            let client = ClientId::new();
            let advance = svc
                .add_advance(&NewAdvance {
                    kind: AdvanceKind::ClientExpenseAdvance,
                    client_id: Some(client),
                    matter_id: None,
                    lawyer_id: None,
                    amount: funds,
                    currency: "USD".to_string(),
                    date_received: None,
                    description: None,
                })
                .await
                .unwrap();

            let result = svc
                .add_expense_with_deduction(&NewExpense {
                    client_id: Some(client),
                    matter_id: None,
                    lawyer_id: None,
                    amount: spend,
                    currency: "USD".to_string(),
                    description: "Expert witness".to_string(),
                    expense_date: None,
                    paid_by_lawyer: false,
                    funding: ExpenseFunding::ClientExpenseAdvance,
                })
                .await;

            let expenses = svc.list_expenses(&ExpenseFilter::default()).await.unwrap();
            let after = svc.get_advance(advance.id).await.unwrap();
            let allocations = svc.list_allocations(advance.id).await.unwrap();

            if spend <= funds {
                assert!(result.is_ok());
                assert_eq!(expenses.len(), 1);
                assert_eq!(allocations.len(), 1);
                assert_eq!(after.balance_remaining, funds - spend);
            } else {
                assert!(result.is_err());
                assert!(expenses.is_empty());
                assert!(allocations.is_empty());
                assert_eq!(after.balance_remaining, funds);
            }
        });
    }
}
