//! `SeaORM` Entity for posting_intent_lines table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "posting_intent_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_set_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub line_no: i32,
    pub tenant_id: Uuid,
    pub account_id: Option<Uuid>,
    pub account_code: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub credit: Decimal,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::posting_intents::Entity",
        from = "Column::TransactionSetId",
        to = "super::posting_intents::Column::TransactionSetId"
    )]
    PostingIntents,
}

impl Related<super::posting_intents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostingIntents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
