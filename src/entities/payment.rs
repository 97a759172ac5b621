use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment record owned by its order. Inserted empty at placement; the
/// provider intent id arrives at `begin_payment` and the remaining fields
/// are written once, when the payment is confirmed. Once `done` is true the
/// row is never mutated again.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub method: String,
    pub currency: String,
    pub provider_intent_id: Option<String>,
    pub transaction_amount: Option<Decimal>,
    pub payer: Option<String>,
    pub payee: Option<String>,
    pub done: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
