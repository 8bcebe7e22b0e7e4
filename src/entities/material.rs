use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A stored material, serialized with its persisted column names
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "materials")]
#[schema(as = Material, example = json!({
    "id": 1,
    "batch_number": "B1",
    "material_name": "Steel",
    "alert_quantity": 10.0,
    "unit_id": 1,
    "tax_rate_id": 1
}))]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub batch_number: String,
    pub material_name: String,
    #[sea_orm(column_type = "Double")]
    pub alert_quantity: f64,
    pub unit_id: i64,
    pub tax_rate_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
