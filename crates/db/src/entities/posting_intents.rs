//! `SeaORM` Entity for posting_intents table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "posting_intents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_set_id: Uuid,
    pub tenant_id: Uuid,
    pub posting_date: Date,
    #[sea_orm(column_type = "Text", nullable)]
    pub memo: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transaction_sets::Entity",
        from = "Column::TransactionSetId",
        to = "super::transaction_sets::Column::Id"
    )]
    TransactionSets,
    #[sea_orm(has_many = "super::posting_intent_lines::Entity")]
    PostingIntentLines,
}

impl Related<super::transaction_sets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionSets.def()
    }
}

impl Related<super::posting_intent_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostingIntentLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
