//! `SeaORM` active enums mapped to Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Postgres `advance_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "advance_kind")]
#[serde(rename_all = "snake_case")]
pub enum AdvanceKind {
    #[sea_orm(string_value = "client_retainer")]
    ClientRetainer,
    #[sea_orm(string_value = "client_expense_advance")]
    ClientExpenseAdvance,
    #[sea_orm(string_value = "lawyer_advance")]
    LawyerAdvance,
    #[sea_orm(string_value = "fee_payment_fixed")]
    FeePaymentFixed,
    #[sea_orm(string_value = "fee_payment_consultation")]
    FeePaymentConsultation,
    #[sea_orm(string_value = "fee_payment_success")]
    FeePaymentSuccess,
    #[sea_orm(string_value = "fee_payment_milestone")]
    FeePaymentMilestone,
    #[sea_orm(string_value = "fee_payment_other")]
    FeePaymentOther,
}

/// Postgres `advance_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "advance_status")]
#[serde(rename_all = "lowercase")]
pub enum AdvanceStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "depleted")]
    Depleted,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl From<lexledger_core::advance::AdvanceKind> for AdvanceKind {
    fn from(kind: lexledger_core::advance::AdvanceKind) -> Self {
        use lexledger_core::advance::AdvanceKind as Core;
        match kind {
            Core::ClientRetainer => Self::ClientRetainer,
            Core::ClientExpenseAdvance => Self::ClientExpenseAdvance,
            Core::LawyerAdvance => Self::LawyerAdvance,
            Core::FeePaymentFixed => Self::FeePaymentFixed,
            Core::FeePaymentConsultation => Self::FeePaymentConsultation,
            Core::FeePaymentSuccess => Self::FeePaymentSuccess,
            Core::FeePaymentMilestone => Self::FeePaymentMilestone,
            Core::FeePaymentOther => Self::FeePaymentOther,
        }
    }
}

impl From<AdvanceKind> for lexledger_core::advance::AdvanceKind {
    fn from(kind: AdvanceKind) -> Self {
        match kind {
            AdvanceKind::ClientRetainer => Self::ClientRetainer,
            AdvanceKind::ClientExpenseAdvance => Self::ClientExpenseAdvance,
            AdvanceKind::LawyerAdvance => Self::LawyerAdvance,
            AdvanceKind::FeePaymentFixed => Self::FeePaymentFixed,
            AdvanceKind::FeePaymentConsultation => Self::FeePaymentConsultation,
            AdvanceKind::FeePaymentSuccess => Self::FeePaymentSuccess,
            AdvanceKind::FeePaymentMilestone => Self::FeePaymentMilestone,
            AdvanceKind::FeePaymentOther => Self::FeePaymentOther,
        }
    }
}

impl From<lexledger_core::advance::AdvanceStatus> for AdvanceStatus {
    fn from(status: lexledger_core::advance::AdvanceStatus) -> Self {
        use lexledger_core::advance::AdvanceStatus as Core;
        match status {
            Core::Active => Self::Active,
            Core::Depleted => Self::Depleted,
            Core::Refunded => Self::Refunded,
        }
    }
}

impl From<AdvanceStatus> for lexledger_core::advance::AdvanceStatus {
    fn from(status: AdvanceStatus) -> Self {
        match status {
            AdvanceStatus::Active => Self::Active,
            AdvanceStatus::Depleted => Self::Depleted,
            AdvanceStatus::Refunded => Self::Refunded,
        }
    }
}
