//! `SeaORM` Entity for inventory_balances table.
//!
//! `available` is a generated column; rows are written only through the
//! increment upsert in the journal writer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub location_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub on_hand: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub reserved: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 6)))")]
    pub available: Decimal,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
