//! `SeaORM` Entity for advances table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{AdvanceKind, AdvanceStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "advances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: AdvanceKind,
    pub client_id: Option<Uuid>,
    pub matter_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub amount: Decimal,
    pub currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub balance_remaining: Decimal,
    pub status: AdvanceStatus,
    pub date_received: Date,
    pub description: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::advance_allocations::Entity")]
    AdvanceAllocations,
    #[sea_orm(has_many = "super::expenses::Entity")]
    Expenses,
}

impl Related<super::advance_allocations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AdvanceAllocations.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
