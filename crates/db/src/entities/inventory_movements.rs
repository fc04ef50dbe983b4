//! `SeaORM` Entity for inventory_movements table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{MovementStatus, MovementType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub transaction_set_id: Uuid,
    pub product_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub quantity: Decimal,
    pub from_warehouse_id: Option<Uuid>,
    pub from_location_id: Option<Uuid>,
    pub to_warehouse_id: Option<Uuid>,
    pub to_location_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))", nullable)]
    pub unit_cost: Option<Decimal>,
    pub movement_type: MovementType,
    pub status: MovementStatus,
    pub created_at: DateTimeWithTimeZone,
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
