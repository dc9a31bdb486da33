//! Service tests over the in-memory store.

use std::sync::Arc;

use chrono::NaiveDate;
use lexledger_shared::types::{AdvanceId, ClientId, CurrencyCode, LawyerId, MatterId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::AdvanceError;
use super::expense::{ExpenseFilter, ExpenseFunding, NewExpense};
use super::memory::MemoryAdvanceStore;
use super::reimbursement::Settlement;
use super::service::AdvanceService;
use super::types::{AdvanceFilter, AdvanceKind, AdvancePatch, AdvanceStatus, NewAdvance};

fn service() -> AdvanceService {
    AdvanceService::new(Arc::new(MemoryAdvanceStore::new()))
}

fn usd() -> CurrencyCode {
    CurrencyCode::usd()
}

fn date(month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2026, month, day)
}

fn client_funds(
    kind: AdvanceKind,
    client_id: ClientId,
    matter_id: Option<MatterId>,
    amount: Decimal,
) -> NewAdvance {
    NewAdvance {
        kind,
        client_id: Some(client_id),
        matter_id,
        lawyer_id: None,
        amount,
        currency: "USD".to_string(),
        date_received: date(1, 15),
        description: None,
    }
}

fn lawyer_funds(lawyer_id: LawyerId, amount: Decimal) -> NewAdvance {
    NewAdvance {
        kind: AdvanceKind::LawyerAdvance,
        client_id: None,
        matter_id: None,
        lawyer_id: Some(lawyer_id),
        amount,
        currency: "USD".to_string(),
        date_received: date(1, 10),
        description: Some("Petty cash".to_string()),
    }
}

fn expense(client_id: Option<ClientId>, amount: Decimal, funding: ExpenseFunding) -> NewExpense {
    NewExpense {
        client_id,
        matter_id: None,
        lawyer_id: None,
        amount,
        currency: "USD".to_string(),
        description: "Court filing fee".to_string(),
        expense_date: date(2, 1),
        paid_by_lawyer: false,
        funding,
    }
}

#[tokio::test]
async fn test_retainer_drawn_down_to_depletion() {
    let svc = service();
    let client = ClientId::new();
    let matter = MatterId::new();
    svc.add_advance(&client_funds(AdvanceKind::ClientRetainer, client, Some(matter), dec!(1000.00)))
        .await
        .unwrap();

    let first = svc
        .deduct_retainer(client, Some(matter), AdvanceKind::ClientRetainer, dec!(400.00), None)
        .await
        .unwrap();
    assert_eq!(first.advance.balance_remaining, dec!(600.00));
    assert_eq!(first.advance.status, AdvanceStatus::Active);

    let second = svc
        .deduct_retainer(client, Some(matter), AdvanceKind::ClientRetainer, dec!(600.00), None)
        .await
        .unwrap();
    assert_eq!(second.advance.balance_remaining, Decimal::ZERO);
    assert_eq!(second.advance.status, AdvanceStatus::Depleted);

    // depleted entries are no longer candidates for the selector
    let third = svc
        .deduct_retainer(client, Some(matter), AdvanceKind::ClientRetainer, dec!(1.00), None)
        .await
        .unwrap_err();
    assert!(matches!(third, AdvanceError::NoMatchingAdvance(_)));

    // by id, the depleted entry reports the shortfall
    let by_id = svc
        .deduct_from_advance(first.advance.id, dec!(1.00), None)
        .await
        .unwrap_err();
    assert!(matches!(by_id, AdvanceError::InsufficientFunds { .. }));

    let entry = svc.get_advance(first.advance.id).await.unwrap();
    assert_eq!(entry.balance_remaining, Decimal::ZERO);
    assert_eq!(svc.list_allocations(entry.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_insufficient_funds_leaves_entry_unchanged() {
    let svc = service();
    let client = ClientId::new();
    let advance = svc
        .add_advance(&client_funds(AdvanceKind::ClientRetainer, client, None, dec!(100.00)))
        .await
        .unwrap();

    let err = svc
        .deduct_from_advance(advance.id, dec!(100.01), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdvanceError::InsufficientFunds { requested, available, .. }
            if requested == dec!(100.01) && available == dec!(100.00)
    ));

    let after = svc.get_advance(advance.id).await.unwrap();
    assert_eq!(after, advance);
    assert!(svc.list_allocations(advance.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_refund_blocks_further_deductions() {
    let svc = service();
    let client = ClientId::new();
    let advance = svc
        .add_advance(&client_funds(AdvanceKind::ClientExpenseAdvance, client, None, dec!(500.00)))
        .await
        .unwrap();
    svc.deduct_from_advance(advance.id, dec!(300.00), None)
        .await
        .unwrap();

    let refunded = svc.refund_advance(advance.id).await.unwrap();
    assert_eq!(refunded.status, AdvanceStatus::Refunded);
    assert_eq!(refunded.balance_remaining, dec!(200.00));

    let err = svc
        .deduct_from_advance(advance.id, dec!(10.00), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::InvalidStateTransition { .. }));
    assert_eq!(
        svc.get_advance(advance.id).await.unwrap().balance_remaining,
        dec!(200.00)
    );

    // refunded funds no longer count
    let balance = svc
        .get_client_expense_advance(client, None, Some(&usd()))
        .await
        .unwrap();
    assert_eq!(balance.total(&usd()), Decimal::ZERO);
}

#[tokio::test]
async fn test_lawyer_balance_reconciles_with_paid_expenses() {
    let svc = service();
    let lawyer = LawyerId::new();
    let advance = svc.add_advance(&lawyer_funds(lawyer, dec!(500.00))).await.unwrap();
    svc.deduct_from_advance(advance.id, dec!(300.00), Some("travel".to_string()))
        .await
        .unwrap();

    svc.add_expense_with_deduction(&NewExpense {
        lawyer_id: Some(lawyer),
        paid_by_lawyer: true,
        ..expense(None, dec!(350.00), ExpenseFunding::None)
    })
    .await
    .unwrap();

    let balance = svc.compute_lawyer_balance(lawyer, None).await.unwrap();
    assert_eq!(balance.total_advanced, dec!(500.00));
    assert_eq!(balance.balance_from_advances, dec!(200.00));
    assert_eq!(balance.expenses_paid, dec!(350.00));
    assert_eq!(balance.total_spent, dec!(350.00));
    assert_eq!(balance.net_balance, dec!(150.00));
    assert_eq!(balance.settlement, Settlement::LawyerHoldsFunds);

    let held = svc.get_lawyer_advance(lawyer, None).await.unwrap();
    assert_eq!(held.total(&usd()), dec!(200.00));
}

#[tokio::test]
async fn test_bridge_commits_expense_and_deduction_together() {
    let svc = service();
    let client = ClientId::new();
    let advance = svc
        .add_advance(&client_funds(AdvanceKind::ClientExpenseAdvance, client, None, dec!(250.00)))
        .await
        .unwrap();

    let recorded = svc
        .add_expense_with_deduction(&expense(
            Some(client),
            dec!(75.50),
            ExpenseFunding::ClientExpenseAdvance,
        ))
        .await
        .unwrap();

    assert_eq!(recorded.expense.advance_id, Some(advance.id));
    let deduction = recorded.deduction.unwrap();
    assert_eq!(deduction.advance.balance_remaining, dec!(174.50));
    assert_eq!(deduction.allocation.amount, dec!(75.50));

    let expenses = svc
        .list_expenses(&ExpenseFilter {
            client_id: Some(client),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(expenses.len(), 1);
}

#[tokio::test]
async fn test_bridge_failure_persists_nothing() {
    let svc = service();
    let client = ClientId::new();
    let advance = svc
        .add_advance(&client_funds(AdvanceKind::ClientExpenseAdvance, client, None, dec!(50.00)))
        .await
        .unwrap();

    let err = svc
        .add_expense_with_deduction(&expense(
            Some(client),
            dec!(80.00),
            ExpenseFunding::Advance {
                advance_id: advance.id,
            },
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::InsufficientFunds { .. }));

    let missing = svc
        .add_expense_with_deduction(&expense(
            Some(client),
            dec!(10.00),
            ExpenseFunding::Advance {
                advance_id: AdvanceId::new(),
            },
        ))
        .await
        .unwrap_err();
    assert!(matches!(missing, AdvanceError::NotFound(_)));

    let wrong_currency = svc
        .add_expense_with_deduction(&NewExpense {
            currency: "EUR".to_string(),
            ..expense(Some(client), dec!(10.00), ExpenseFunding::ClientExpenseAdvance)
        })
        .await
        .unwrap_err();
    assert!(matches!(wrong_currency, AdvanceError::Validation(_)));

    assert!(svc.list_expenses(&ExpenseFilter::default()).await.unwrap().is_empty());
    assert_eq!(
        svc.get_advance(advance.id).await.unwrap().balance_remaining,
        dec!(50.00)
    );
    assert!(svc.list_allocations(advance.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_amounts_past_storage_range_are_rejected() {
    let svc = service();
    let client = ClientId::new();

    for amount in [dec!(100000000000000000.00), dec!(70000000000000000000000000000)] {
        let err = svc
            .add_advance(&client_funds(AdvanceKind::ClientRetainer, client, None, amount))
            .await
            .unwrap_err();
        assert!(matches!(err, AdvanceError::Validation(_)));
    }

    let err = svc
        .add_expense_with_deduction(&expense(
            Some(client),
            dec!(100000000000000000.00),
            ExpenseFunding::None,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));

    let largest = dec!(99999999999999999.99);
    svc.add_advance(&client_funds(AdvanceKind::ClientRetainer, client, None, largest))
        .await
        .unwrap();
    svc.add_advance(&client_funds(AdvanceKind::ClientRetainer, client, None, largest))
        .await
        .unwrap();

    let balance = svc.get_client_retainer(client, None, None).await.unwrap();
    assert_eq!(balance.total(&usd()), largest * dec!(2));
}

#[tokio::test]
async fn test_selector_prefers_oldest_entry() {
    let svc = service();
    let client = ClientId::new();
    let newer = svc
        .add_advance(&NewAdvance {
            date_received: date(3, 1),
            ..client_funds(AdvanceKind::ClientRetainer, client, None, dec!(100.00))
        })
        .await
        .unwrap();
    let older = svc
        .add_advance(&NewAdvance {
            date_received: date(2, 1),
            ..client_funds(AdvanceKind::ClientRetainer, client, None, dec!(100.00))
        })
        .await
        .unwrap();

    let outcome = svc
        .deduct_retainer(client, None, AdvanceKind::ClientRetainer, dec!(40.00), None)
        .await
        .unwrap();
    assert_eq!(outcome.advance.id, older.id);

    // no spanning: 70 exceeds the 60 left on the oldest entry
    let err = svc
        .deduct_retainer(client, None, AdvanceKind::ClientRetainer, dec!(70.00), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AdvanceError::InsufficientFunds { advance_id, .. } if advance_id == older.id
    ));
    assert_eq!(
        svc.get_advance(newer.id).await.unwrap().balance_remaining,
        dec!(100.00)
    );
}

#[tokio::test]
async fn test_client_wide_selector_ignores_matter_entries() {
    let svc = service();
    let client = ClientId::new();
    svc.add_advance(&client_funds(
        AdvanceKind::ClientRetainer,
        client,
        Some(MatterId::new()),
        dec!(100.00),
    ))
    .await
    .unwrap();

    let err = svc
        .deduct_retainer(client, None, AdvanceKind::ClientRetainer, dec!(10.00), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::NoMatchingAdvance(_)));
}

#[tokio::test]
async fn test_deduct_retainer_rejects_other_kinds() {
    let svc = service();
    let err = svc
        .deduct_retainer(
            ClientId::new(),
            None,
            AdvanceKind::LawyerAdvance,
            dec!(10.00),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));
}

#[tokio::test]
async fn test_fee_payment_cannot_be_drawn_down() {
    let svc = service();
    let fee = svc
        .add_advance(&client_funds(
            AdvanceKind::FeePaymentConsultation,
            ClientId::new(),
            None,
            dec!(150.00),
        ))
        .await
        .unwrap();
    assert_eq!(fee.balance_remaining, Decimal::ZERO);
    assert_eq!(fee.status, AdvanceStatus::Active);

    let err = svc
        .deduct_from_advance(fee.id, dec!(1.00), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::InvalidStateTransition { .. }));
    assert!(matches!(
        svc.refund_advance(fee.id).await.unwrap_err(),
        AdvanceError::InvalidStateTransition { .. }
    ));
}

#[tokio::test]
async fn test_balances_scope_by_matter_and_currency() {
    let svc = service();
    let client = ClientId::new();
    let matter = MatterId::new();
    svc.add_advance(&client_funds(AdvanceKind::ClientRetainer, client, None, dec!(100.00)))
        .await
        .unwrap();
    svc.add_advance(&client_funds(AdvanceKind::ClientRetainer, client, Some(matter), dec!(250.00)))
        .await
        .unwrap();
    svc.add_advance(&NewAdvance {
        currency: "eur".to_string(),
        ..client_funds(AdvanceKind::ClientRetainer, client, None, dec!(40.00))
    })
    .await
    .unwrap();
    svc.add_advance(&client_funds(AdvanceKind::ClientExpenseAdvance, client, None, dec!(75.00)))
        .await
        .unwrap();

    let all = svc.get_client_retainer(client, None, None).await.unwrap();
    assert_eq!(all.balances.len(), 2);
    assert_eq!(all.total(&"EUR".parse().unwrap()), dec!(40.00));
    assert_eq!(all.total(&usd()), dec!(350.00));

    let scoped = svc
        .get_client_retainer(client, Some(matter), Some(&usd()))
        .await
        .unwrap();
    assert_eq!(scoped.total(&usd()), dec!(250.00));

    let summary = svc.client_summary(client, None).await.unwrap();
    assert_eq!(summary.retainer, all);
    assert_eq!(summary.expense_advance.total(&usd()), dec!(75.00));

    let unknown = svc.get_client_retainer(ClientId::new(), None, None).await.unwrap();
    assert!(unknown.balances.is_empty());
}

#[tokio::test]
async fn test_repeated_balance_reads_are_identical() {
    let svc = service();
    let client = ClientId::new();
    svc.add_advance(&client_funds(AdvanceKind::ClientRetainer, client, None, dec!(100.00)))
        .await
        .unwrap();

    let first = svc.client_summary(client, None).await.unwrap();
    let second = svc.client_summary(client, None).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_update_delete_and_purge() {
    let svc = service();
    let client = ClientId::new();
    let advance = svc
        .add_advance(&client_funds(AdvanceKind::ClientRetainer, client, None, dec!(100.00)))
        .await
        .unwrap();

    let updated = svc
        .update_advance(
            advance.id,
            &AdvancePatch {
                description: Some("Retainer for appeal".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("Retainer for appeal"));
    assert_eq!(updated.amount, advance.amount);

    let err = svc
        .update_advance(
            advance.id,
            &AdvancePatch {
                amount: Some(dec!(5000.00)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AdvanceError::Validation(_)));

    // purge requires a prior soft delete
    assert!(matches!(
        svc.purge_advance(advance.id).await.unwrap_err(),
        AdvanceError::InvalidStateTransition { .. }
    ));

    svc.deduct_from_advance(advance.id, dec!(30.00), None).await.unwrap();
    svc.delete_advance(advance.id).await.unwrap();

    assert!(matches!(
        svc.get_advance(advance.id).await.unwrap_err(),
        AdvanceError::NotFound(_)
    ));
    assert!(matches!(
        svc.delete_advance(advance.id).await.unwrap_err(),
        AdvanceError::NotFound(_)
    ));
    assert!(svc.list_advances(&AdvanceFilter::default()).await.unwrap().is_empty());
    let with_deleted = svc
        .list_advances(&AdvanceFilter {
            include_deleted: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(with_deleted.len(), 1);
    assert_eq!(with_deleted[0].balance_remaining, dec!(70.00));

    let balance = svc.get_client_retainer(client, None, None).await.unwrap();
    assert!(balance.balances.is_empty());

    assert_eq!(svc.list_allocations(advance.id).await.unwrap().len(), 1);
    svc.purge_advance(advance.id).await.unwrap();
    assert!(matches!(
        svc.list_allocations(advance.id).await.unwrap_err(),
        AdvanceError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_concurrent_deductions_never_overdraw() {
    let svc = service();
    let client = ClientId::new();
    let advance = svc
        .add_advance(&client_funds(AdvanceKind::ClientRetainer, client, None, dec!(100.00)))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.deduct_from_advance(advance.id, dec!(30.00), None).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 3);
    let after = svc.get_advance(advance.id).await.unwrap();
    assert_eq!(after.balance_remaining, dec!(10.00));
    let allocations = svc.list_allocations(advance.id).await.unwrap();
    assert_eq!(allocations.len(), 3);
    let allocated: Decimal = allocations.iter().map(|row| row.amount).sum();
    assert_eq!(allocated, after.consumed());
}
