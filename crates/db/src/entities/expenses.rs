//! `SeaORM` Entity for expenses table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub client_id: Option<Uuid>,
    pub matter_id: Option<Uuid>,
    pub lawyer_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub expense_date: Date,
    pub paid_by_lawyer: bool,
    pub advance_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::advances::Entity",
        from = "Column::AdvanceId",
        to = "super::advances::Column::Id",
        on_delete = "SetNull"
    )]
    Advances,
}

impl Related<super::advances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Advances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
