//! Expenses migration.
//!
//! Creates the minimal expense table the expense-advance bridge writes to.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(EXPENSES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS expenses CASCADE;")
            .await?;
        Ok(())
    }
}

const EXPENSES_SQL: &str = r"
CREATE TABLE expenses (
    id UUID PRIMARY KEY,
    client_id UUID,
    matter_id UUID,
    lawyer_id UUID,
    amount NUMERIC(19, 2) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    description TEXT NOT NULL,
    expense_date DATE NOT NULL DEFAULT CURRENT_DATE,
    paid_by_lawyer BOOLEAN NOT NULL DEFAULT false,
    advance_id UUID REFERENCES advances(id) ON DELETE SET NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_expense_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_expense_currency CHECK (currency ~ '^[A-Z]{3}$'),
    CONSTRAINT chk_expense_paid_by_lawyer CHECK (NOT paid_by_lawyer OR lawyer_id IS NOT NULL)
);

-- Lawyer reimbursement lookups
CREATE INDEX idx_expenses_lawyer ON expenses(lawyer_id, currency) WHERE paid_by_lawyer;

-- Client/matter listing
CREATE INDEX idx_expenses_client ON expenses(client_id, matter_id, expense_date);
";
