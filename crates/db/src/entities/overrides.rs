//! `SeaORM` Entity for overrides table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::EntityType;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "overrides")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub validation_issue_id: Option<Uuid>,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::validation_issues::Entity",
        from = "Column::ValidationIssueId",
        to = "super::validation_issues::Column::Id"
    )]
    ValidationIssues,
}

impl Related<super::validation_issues::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ValidationIssues.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
