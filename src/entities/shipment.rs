use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub carrier_id: i32,
    pub tracking_code: Option<String>,
    pub shipping_date: Option<DateTime<Utc>>,
    pub estimated_arrival_date: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::shipment_carrier::Entity",
        from = "Column::CarrierId",
        to = "super::shipment_carrier::Column::Id"
    )]
    Carrier,
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
}

impl Related<super::shipment_carrier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Carrier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
