//! Advance ledger schema.
//!
//! Creates the entry kinds and statuses, the `advances` table with its balance
//! constraints, and the `advance_allocations` audit table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: LEDGER TABLES
        // ============================================================
        db.execute_unprepared(ADVANCES_SQL).await?;
        db.execute_unprepared(ALLOCATIONS_SQL).await?;

        // ============================================================
        // PART 3: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- Ledger entry kinds
CREATE TYPE advance_kind AS ENUM (
    'client_retainer',
    'client_expense_advance',
    'lawyer_advance',
    'fee_payment_fixed',
    'fee_payment_consultation',
    'fee_payment_success',
    'fee_payment_milestone',
    'fee_payment_other'
);

-- Ledger entry lifecycle
CREATE TYPE advance_status AS ENUM ('active', 'depleted', 'refunded');
";

const ADVANCES_SQL: &str = r"
CREATE TABLE advances (
    id UUID PRIMARY KEY,
    kind advance_kind NOT NULL,
    client_id UUID,
    matter_id UUID,
    lawyer_id UUID,
    amount NUMERIC(19, 2) NOT NULL,
    currency VARCHAR(3) NOT NULL,
    balance_remaining NUMERIC(19, 2) NOT NULL,
    status advance_status NOT NULL DEFAULT 'active',
    date_received DATE NOT NULL DEFAULT CURRENT_DATE,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ,
    CONSTRAINT chk_advance_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_advance_balance_bounds CHECK (
        balance_remaining >= 0 AND balance_remaining <= amount
    ),
    CONSTRAINT chk_advance_currency CHECK (currency ~ '^[A-Z]{3}$'),
    CONSTRAINT chk_advance_matter_needs_client CHECK (matter_id IS NULL OR client_id IS NOT NULL),
    CONSTRAINT chk_advance_lawyer_scope CHECK (
        (kind = 'lawyer_advance' AND lawyer_id IS NOT NULL)
        OR (kind <> 'lawyer_advance' AND lawyer_id IS NULL AND client_id IS NOT NULL)
    ),
    CONSTRAINT chk_advance_fee_payment_balance CHECK (
        kind IN ('client_retainer', 'client_expense_advance', 'lawyer_advance')
        OR (balance_remaining = 0 AND status = 'active')
    ),
    CONSTRAINT chk_advance_depleted CHECK (status <> 'depleted' OR balance_remaining = 0)
);

-- Selector resolution: oldest active entry of a kind for a client/matter
CREATE INDEX idx_advances_client_kind
    ON advances(client_id, kind, matter_id, date_received, created_at)
    WHERE deleted_at IS NULL;

-- Lawyer advances
CREATE INDEX idx_advances_lawyer ON advances(lawyer_id, kind, date_received)
    WHERE deleted_at IS NULL AND lawyer_id IS NOT NULL;
";

const ALLOCATIONS_SQL: &str = r"
CREATE TABLE advance_allocations (
    id UUID PRIMARY KEY,
    advance_id UUID NOT NULL REFERENCES advances(id) ON DELETE CASCADE,
    amount NUMERIC(19, 2) NOT NULL,
    note TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_allocation_amount_positive CHECK (amount > 0)
);

CREATE INDEX idx_allocations_advance ON advance_allocations(advance_id, created_at);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: prevent_advance_immutable_change
-- Kind, scope, amount and currency never change after creation
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_advance_immutable_change()
RETURNS TRIGGER AS $$
BEGIN
    IF NEW.kind <> OLD.kind
        OR NEW.client_id IS DISTINCT FROM OLD.client_id
        OR NEW.matter_id IS DISTINCT FROM OLD.matter_id
        OR NEW.lawyer_id IS DISTINCT FROM OLD.lawyer_id
        OR NEW.amount <> OLD.amount
        OR NEW.currency <> OLD.currency THEN
        RAISE EXCEPTION 'Immutable advance fields cannot be changed (advance %)', OLD.id;
    END IF;
    IF OLD.status = 'refunded' AND NEW.status <> 'refunded' THEN
        RAISE EXCEPTION 'Refunded advance % cannot change status', OLD.id;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_advances_immutable
BEFORE UPDATE ON advances
FOR EACH ROW
EXECUTE FUNCTION prevent_advance_immutable_change();
";

const DROP_ALL_SQL: &str = r"
DROP TRIGGER IF EXISTS trg_advances_immutable ON advances;
DROP FUNCTION IF EXISTS prevent_advance_immutable_change();
DROP TABLE IF EXISTS advance_allocations CASCADE;
DROP TABLE IF EXISTS advances CASCADE;
DROP TYPE IF EXISTS advance_status;
DROP TYPE IF EXISTS advance_kind;
";
