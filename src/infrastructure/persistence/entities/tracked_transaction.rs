use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::models::{TrackedTransaction, TransactionState};
use crate::infrastructure::persistence::error::DbError;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tracked_transaction")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub public_address: String,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub txid: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub vout: i32,
    #[sea_orm(column_type = "Decimal(Some((16, 8)))")]
    pub amount: Decimal,
    pub confirmations: i32,
    #[sea_orm(column_type = "Text")]
    pub state: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub spent_txid: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for TrackedTransaction {
    type Error = DbError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let state = model
            .state
            .parse::<TransactionState>()
            .map_err(DbError::InvalidRow)?;
        let vout = u32::try_from(model.vout).map_err(|_| {
            DbError::InvalidRow(format!("negative vout {} for {}", model.vout, model.txid))
        })?;

        Ok(TrackedTransaction {
            public_address: model.public_address,
            txid: model.txid,
            vout,
            amount: model.amount,
            confirmations: u32::try_from(model.confirmations).unwrap_or(0),
            state,
            spent_txid: model.spent_txid,
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}
