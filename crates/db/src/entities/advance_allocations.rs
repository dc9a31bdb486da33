//! `SeaORM` Entity for advance_allocations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "advance_allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub advance_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub amount: Decimal,
    pub note: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::advances::Entity",
        from = "Column::AdvanceId",
        to = "super::advances::Column::Id",
        on_delete = "Cascade"
    )]
    Advances,
}

impl Related<super::advances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Advances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
