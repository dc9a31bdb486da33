//! Postgres-backed advance store.
//!
//! Deductions lock the entry row (`SELECT ... FOR UPDATE`), run the shared
//! allocation rules on it and then issue a guarded update:
//!
//! ```sql
//! UPDATE advances SET balance_remaining = balance_remaining - $amount, ...
//!  WHERE id = $id AND balance_remaining >= $amount AND status = 'active'
//! ```
//!
//! Zero affected rows means the entry changed between the check and the
//! write; that surfaces as `ConcurrentModification` and the service retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lexledger_core::advance::{
    Advance, AdvanceError, AdvanceFilter, AdvanceSelector, AdvanceStore, Allocation,
    AllocationEngine, DeductionOutcome, DeductionRequest, DeductionTarget, Expense, ExpenseFilter,
    ExpenseRecorded, MetadataUpdate,
    store::{ensure_purgeable, require_live},
};
use lexledger_shared::types::{AdvanceId, AllocationId, ClientId, ExpenseId, LawyerId, MatterId};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait, sea_query::Expr,
};
use tracing::error;

use crate::entities::{
    advance_allocations, advances, expenses,
    sea_orm_active_enums::{AdvanceKind, AdvanceStatus},
};

fn storage(err: DbErr) -> AdvanceError {
    AdvanceError::Storage(err.to_string())
}

/// Advance repository implementing [`AdvanceStore`] over Postgres.
#[derive(Debug, Clone)]
pub struct AdvanceRepository {
    db: DatabaseConnection,
}

impl AdvanceRepository {
    /// Creates a new advance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Loads and locks the entry a deduction targets.
    async fn lock_target(
        txn: &DatabaseTransaction,
        target: &DeductionTarget,
    ) -> Result<Advance, AdvanceError> {
        match target {
            DeductionTarget::Entry(id) => {
                let row = advances::Entity::find_by_id(id.into_inner())
                    .lock_exclusive()
                    .one(txn)
                    .await
                    .map_err(storage)?;
                require_live(*id, row.map(to_advance).transpose()?)
            }
            DeductionTarget::Oldest(selector) => selector_query(selector)
                .order_by_asc(advances::Column::DateReceived)
                .order_by_asc(advances::Column::CreatedAt)
                .order_by_asc(advances::Column::Id)
                .lock_exclusive()
                .one(txn)
                .await
                .map_err(storage)?
                .map(to_advance)
                .transpose()?
                .ok_or_else(|| AdvanceError::NoMatchingAdvance(selector.describe())),
        }
    }

    /// Loads and locks a live entry by id.
    async fn lock_live(txn: &DatabaseTransaction, id: AdvanceId) -> Result<Advance, AdvanceError> {
        let row = advances::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(storage)?;
        require_live(id, row.map(to_advance).transpose()?)
    }

    /// Applies a checked deduction inside `txn` and appends the allocation row.
    async fn write_deduction<C: ConnectionTrait>(
        conn: &C,
        before: &Advance,
        after: &Advance,
        allocation: &Allocation,
    ) -> Result<(), AdvanceError> {
        let result = advances::Entity::update_many()
            .col_expr(
                advances::Column::BalanceRemaining,
                Expr::col(advances::Column::BalanceRemaining).sub(allocation.amount),
            )
            .col_expr(
                advances::Column::Status,
                AdvanceStatus::from(after.status).as_enum(),
            )
            .col_expr(advances::Column::UpdatedAt, Expr::value(after.updated_at))
            .filter(advances::Column::Id.eq(before.id.into_inner()))
            .filter(advances::Column::BalanceRemaining.gte(allocation.amount))
            .filter(advances::Column::Status.eq(AdvanceStatus::Active))
            .filter(advances::Column::DeletedAt.is_null())
            .exec(conn)
            .await
            .map_err(storage)?;

        if result.rows_affected == 0 {
            return Err(AdvanceError::ConcurrentModification(before.id));
        }

        advance_allocations::ActiveModel {
            id: Set(allocation.id.into_inner()),
            advance_id: Set(allocation.advance_id.into_inner()),
            amount: Set(allocation.amount),
            note: Set(allocation.note.clone()),
            created_at: Set(allocation.created_at.into()),
        }
        .insert(conn)
        .await
        .map_err(storage)?;

        Ok(())
    }
}

#[async_trait]
impl AdvanceStore for AdvanceRepository {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn insert_advance(&self, advance: Advance) -> Result<Advance, AdvanceError> {
        let model = advances::ActiveModel {
            id: Set(advance.id.into_inner()),
            kind: Set(advance.kind.into()),
            client_id: Set(advance.client_id.map(ClientId::into_inner)),
            matter_id: Set(advance.matter_id.map(MatterId::into_inner)),
            lawyer_id: Set(advance.lawyer_id.map(LawyerId::into_inner)),
            amount: Set(advance.amount),
            currency: Set(advance.currency.to_string()),
            balance_remaining: Set(advance.balance_remaining),
            status: Set(advance.status.into()),
            date_received: Set(advance.date_received),
            description: Set(advance.description.clone()),
            created_at: Set(advance.created_at.into()),
            updated_at: Set(advance.updated_at.into()),
            deleted_at: Set(None),
        }
        .insert(&self.db)
        .await
        .map_err(storage)?;

        to_advance(model)
    }

    async fn find_advance(&self, id: AdvanceId) -> Result<Option<Advance>, AdvanceError> {
        advances::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(storage)?
            .map(to_advance)
            .transpose()
    }

    async fn update_metadata(
        &self,
        id: AdvanceId,
        update: &MetadataUpdate,
        now: DateTime<Utc>,
    ) -> Result<Advance, AdvanceError> {
        let txn = self.db.begin().await.map_err(storage)?;
        let mut advance = Self::lock_live(&txn, id).await?;
        update.apply_to(&mut advance, now);

        advances::ActiveModel {
            id: Set(id.into_inner()),
            description: Set(advance.description.clone()),
            date_received: Set(advance.date_received),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(storage)?;

        txn.commit().await.map_err(storage)?;
        Ok(advance)
    }

    async fn soft_delete(
        &self,
        id: AdvanceId,
        now: DateTime<Utc>,
    ) -> Result<Advance, AdvanceError> {
        let txn = self.db.begin().await.map_err(storage)?;
        let mut advance = Self::lock_live(&txn, id).await?;
        advance.deleted_at = Some(now);
        advance.updated_at = now;

        advances::ActiveModel {
            id: Set(id.into_inner()),
            deleted_at: Set(Some(now.into())),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(storage)?;

        txn.commit().await.map_err(storage)?;
        Ok(advance)
    }

    async fn purge(&self, id: AdvanceId) -> Result<(), AdvanceError> {
        let txn = self.db.begin().await.map_err(storage)?;
        let advance = advances::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(storage)?
            .map(to_advance)
            .transpose()?
            .ok_or(AdvanceError::NotFound(id))?;
        ensure_purgeable(&advance)?;

        // allocation rows cascade
        advances::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(storage)?;

        txn.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn list_advances(&self, filter: &AdvanceFilter) -> Result<Vec<Advance>, AdvanceError> {
        let mut query = advances::Entity::find();
        if !filter.include_deleted {
            query = query.filter(advances::Column::DeletedAt.is_null());
        }
        if let Some(id) = filter.client_id {
            query = query.filter(advances::Column::ClientId.eq(id.into_inner()));
        }
        if let Some(id) = filter.matter_id {
            query = query.filter(advances::Column::MatterId.eq(id.into_inner()));
        }
        if let Some(id) = filter.lawyer_id {
            query = query.filter(advances::Column::LawyerId.eq(id.into_inner()));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(advances::Column::Kind.eq(AdvanceKind::from(kind)));
        }
        if let Some(status) = filter.status {
            query = query.filter(advances::Column::Status.eq(AdvanceStatus::from(status)));
        }
        if let Some(currency) = &filter.currency {
            query = query.filter(advances::Column::Currency.eq(currency.as_str()));
        }
        if let Some(from) = filter.date_from {
            query = query.filter(advances::Column::DateReceived.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(advances::Column::DateReceived.lte(to));
        }

        query
            .order_by_asc(advances::Column::DateReceived)
            .order_by_asc(advances::Column::CreatedAt)
            .order_by_asc(advances::Column::Id)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(to_advance)
            .collect()
    }

    async fn deduct(
        &self,
        request: &DeductionRequest,
        now: DateTime<Utc>,
    ) -> Result<DeductionOutcome, AdvanceError> {
        let txn = self.db.begin().await.map_err(storage)?;
        let before = Self::lock_target(&txn, &request.target).await?;

        let mut after = before.clone();
        let allocation = AllocationEngine::apply_deduction(
            &mut after,
            request.amount,
            request.note.clone(),
            now,
        )?;

        Self::write_deduction(&txn, &before, &after, &allocation).await?;
        txn.commit().await.map_err(storage)?;

        Ok(DeductionOutcome {
            advance: after,
            allocation,
        })
    }

    async fn refund(&self, id: AdvanceId, now: DateTime<Utc>) -> Result<Advance, AdvanceError> {
        let txn = self.db.begin().await.map_err(storage)?;
        let mut advance = Self::lock_live(&txn, id).await?;
        AllocationEngine::apply_refund(&mut advance, now)?;

        advances::ActiveModel {
            id: Set(id.into_inner()),
            status: Set(AdvanceStatus::Refunded),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(storage)?;

        txn.commit().await.map_err(storage)?;
        Ok(advance)
    }

    async fn record_expense(
        &self,
        mut expense: Expense,
        deduction: Option<&DeductionRequest>,
        now: DateTime<Utc>,
    ) -> Result<ExpenseRecorded, AdvanceError> {
        let txn = self.db.begin().await.map_err(storage)?;

        // Checks first; nothing is written until every rule has passed.
        let planned = match deduction {
            Some(request) => {
                let before = Self::lock_target(&txn, &request.target).await?;
                AllocationEngine::check_currency(&before, &expense.currency)?;
                let mut after = before.clone();
                let allocation = AllocationEngine::apply_deduction(
                    &mut after,
                    request.amount,
                    request.note.clone(),
                    now,
                )?;
                expense.advance_id = Some(after.id);
                Some((before, after, allocation))
            }
            None => None,
        };

        let written = async {
            if let Some((before, after, allocation)) = &planned {
                Self::write_deduction(&txn, before, after, allocation).await?;
            }
            expense_active_model(&expense)
                .insert(&txn)
                .await
                .map_err(storage)?;
            Ok::<(), AdvanceError>(())
        }
        .await;

        match written {
            Ok(()) => {}
            Err(AdvanceError::ConcurrentModification(id)) => {
                txn.rollback().await.map_err(storage)?;
                return Err(AdvanceError::ConcurrentModification(id));
            }
            Err(err) => {
                error!(expense_id = %expense.id, error = %err, "Expense bridge write failed");
                txn.rollback().await.map_err(storage)?;
                return Err(AdvanceError::AtomicityFailure(err.to_string()));
            }
        }

        if let Err(err) = txn.commit().await {
            return Err(AdvanceError::AtomicityFailure(err.to_string()));
        }

        Ok(ExpenseRecorded {
            expense,
            deduction: planned.map(|(_, advance, allocation)| DeductionOutcome {
                advance,
                allocation,
            }),
        })
    }

    async fn list_allocations(
        &self,
        advance_id: AdvanceId,
    ) -> Result<Vec<Allocation>, AdvanceError> {
        let rows = advance_allocations::Entity::find()
            .filter(advance_allocations::Column::AdvanceId.eq(advance_id.into_inner()))
            .order_by_asc(advance_allocations::Column::CreatedAt)
            .order_by_asc(advance_allocations::Column::Id)
            .all(&self.db)
            .await
            .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| Allocation {
                id: AllocationId::from_uuid(row.id),
                advance_id: AdvanceId::from_uuid(row.advance_id),
                amount: row.amount,
                note: row.note,
                created_at: row.created_at.with_timezone(&Utc),
            })
            .collect())
    }

    async fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, AdvanceError> {
        let mut query = expenses::Entity::find();
        if let Some(id) = filter.client_id {
            query = query.filter(expenses::Column::ClientId.eq(id.into_inner()));
        }
        if let Some(id) = filter.matter_id {
            query = query.filter(expenses::Column::MatterId.eq(id.into_inner()));
        }
        if let Some(id) = filter.lawyer_id {
            query = query.filter(expenses::Column::LawyerId.eq(id.into_inner()));
        }
        if let Some(flag) = filter.paid_by_lawyer {
            query = query.filter(expenses::Column::PaidByLawyer.eq(flag));
        }
        if let Some(currency) = &filter.currency {
            query = query.filter(expenses::Column::Currency.eq(currency.as_str()));
        }

        query
            .order_by_asc(expenses::Column::ExpenseDate)
            .order_by_asc(expenses::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(storage)?
            .into_iter()
            .map(to_expense)
            .collect()
    }
}

/// Builds the candidate query for a selector: live, active entries of the kind.
fn selector_query(selector: &AdvanceSelector) -> sea_orm::Select<advances::Entity> {
    let mut query = advances::Entity::find()
        .filter(advances::Column::Kind.eq(AdvanceKind::from(selector.kind)))
        .filter(advances::Column::Status.eq(AdvanceStatus::Active))
        .filter(advances::Column::DeletedAt.is_null());

    if let Some(id) = selector.client_id {
        query = query.filter(advances::Column::ClientId.eq(id.into_inner()));
    }
    if selector.kind.is_client_scoped() {
        query = match selector.matter_id {
            Some(id) => query.filter(advances::Column::MatterId.eq(id.into_inner())),
            None => query.filter(advances::Column::MatterId.is_null()),
        };
    }
    if let Some(id) = selector.lawyer_id {
        query = query.filter(advances::Column::LawyerId.eq(id.into_inner()));
    }
    query
}

fn to_advance(model: advances::Model) -> Result<Advance, AdvanceError> {
    Ok(Advance {
        id: AdvanceId::from_uuid(model.id),
        kind: model.kind.into(),
        client_id: model.client_id.map(ClientId::from_uuid),
        matter_id: model.matter_id.map(MatterId::from_uuid),
        lawyer_id: model.lawyer_id.map(LawyerId::from_uuid),
        amount: model.amount,
        currency: model
            .currency
            .parse()
            .map_err(|e| AdvanceError::Storage(format!("corrupt currency on {}: {e}", model.id)))?,
        balance_remaining: model.balance_remaining,
        status: model.status.into(),
        date_received: model.date_received,
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        deleted_at: model.deleted_at.map(|at| at.with_timezone(&Utc)),
    })
}

fn to_expense(model: expenses::Model) -> Result<Expense, AdvanceError> {
    Ok(Expense {
        id: ExpenseId::from_uuid(model.id),
        client_id: model.client_id.map(ClientId::from_uuid),
        matter_id: model.matter_id.map(MatterId::from_uuid),
        lawyer_id: model.lawyer_id.map(LawyerId::from_uuid),
        amount: model.amount,
        currency: model
            .currency
            .parse()
            .map_err(|e| AdvanceError::Storage(format!("corrupt currency on {}: {e}", model.id)))?,
        description: model.description,
        expense_date: model.expense_date,
        paid_by_lawyer: model.paid_by_lawyer,
        advance_id: model.advance_id.map(AdvanceId::from_uuid),
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn expense_active_model(expense: &Expense) -> expenses::ActiveModel {
    expenses::ActiveModel {
        id: Set(expense.id.into_inner()),
        client_id: Set(expense.client_id.map(ClientId::into_inner)),
        matter_id: Set(expense.matter_id.map(MatterId::into_inner)),
        lawyer_id: Set(expense.lawyer_id.map(LawyerId::into_inner)),
        amount: Set(expense.amount),
        currency: Set(expense.currency.to_string()),
        description: Set(expense.description.clone()),
        expense_date: Set(expense.expense_date),
        paid_by_lawyer: Set(expense.paid_by_lawyer),
        advance_id: Set(expense.advance_id.map(AdvanceId::into_inner)),
        created_at: Set(expense.created_at.into()),
    }
}
