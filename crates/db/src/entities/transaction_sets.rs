//! `SeaORM` Entity for transaction_sets table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{TransactionSetStatus, TransactionSource};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_sets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub status: TransactionSetStatus,
    pub source: TransactionSource,
    pub business_date: Date,
    #[sea_orm(column_type = "Text", nullable)]
    pub note: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::posting_intents::Entity")]
    PostingIntents,
    #[sea_orm(has_many = "super::posting_runs::Entity")]
    PostingRuns,
    #[sea_orm(has_many = "super::inventory_movements::Entity")]
    InventoryMovements,
}

impl Related<super::posting_intents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostingIntents.def()
    }
}

impl Related<super::posting_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostingRuns.def()
    }
}

impl Related<super::inventory_movements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryMovements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
