//! `SeaORM` Entity for posting_runs table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PostingRunStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "posting_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub transaction_set_id: Uuid,
    pub status: PostingRunStatus,
    pub journal_entry_id: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub retry_of: Option<Uuid>,
    pub started_by: Uuid,
    pub started_at: DateTimeWithTimeZone,
    pub finished_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transaction_sets::Entity",
        from = "Column::TransactionSetId",
        to = "super::transaction_sets::Column::Id"
    )]
    TransactionSets,
}

impl Related<super::transaction_sets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TransactionSets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
