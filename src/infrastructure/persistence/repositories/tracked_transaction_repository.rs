use async_trait::async_trait;
use log::debug;
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, Statement, Value,
};
use std::fmt;

use crate::domain::models::{OutputKey, TrackedTransaction, TransactionState, UnspentOutput};
use crate::infrastructure::persistence::entities::tracked_transaction;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::ledger_store::{InsertOutcome, LedgerStore, ProcedureStatus};

/// Postgres ledger backed by the `tracked_transaction` table and its procedures
#[derive(Clone)]
pub struct TrackedTransactionRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for TrackedTransactionRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedTransactionRepository")
            .finish_non_exhaustive()
    }
}

fn vout_param(vout: u32) -> Result<Value, DbError> {
    i32::try_from(vout)
        .map(Value::from)
        .map_err(|_| DbError::QueryError(format!("vout {} out of range", vout)))
}

fn count_param(count: u32) -> Value {
    Value::from(i32::try_from(count).unwrap_or(i32::MAX))
}

impl TrackedTransactionRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Run `SELECT <procedure>(...) AS status` and parse the returned status
    async fn call_procedure(
        &self,
        procedure: &'static str,
        values: Vec<Value>,
    ) -> Result<ProcedureStatus, DbError> {
        let placeholders = (1..=values.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {}({}) AS status", procedure, placeholders);

        let row = self
            .conn
            .query_one(Statement::from_sql_and_values(DbBackend::Postgres, &sql, values))
            .await?
            .ok_or_else(|| DbError::QueryError(format!("{} returned no row", procedure)))?;

        let status: String = row.try_get("", "status")?;
        debug!("{} -> {}", procedure, status);
        status.parse().map_err(DbError::QueryError)
    }

    fn into_domain(rows: Vec<tracked_transaction::Model>) -> Result<Vec<TrackedTransaction>, DbError> {
        rows.into_iter().map(TrackedTransaction::try_from).collect()
    }
}

#[async_trait]
impl LedgerStore for TrackedTransactionRepository {
    async fn insert_new(&self, output: &UnspentOutput) -> Result<InsertOutcome, DbError> {
        let status = self
            .call_procedure(
                "transaction_insert",
                vec![
                    output.address.clone().into(),
                    output.txid.clone().into(),
                    vout_param(output.vout)?,
                    count_param(output.confirmations),
                    output.amount.into(),
                ],
            )
            .await?;

        match status {
            ProcedureStatus::Applied => Ok(InsertOutcome::Inserted),
            ProcedureStatus::Duplicate => Ok(InsertOutcome::AlreadyTracked),
            other => Err(DbError::QueryError(format!(
                "transaction_insert returned unexpected status {:?}",
                other
            ))),
        }
    }

    async fn confirm(&self, key: &OutputKey, confirmations: u32) -> Result<(), DbError> {
        self.call_procedure(
            "transaction_confirm",
            vec![
                key.public_address.clone().into(),
                key.txid.clone().into(),
                vout_param(key.vout)?,
                count_param(confirmations),
            ],
        )
        .await?
        .into_transition_result("transaction_confirm", key, TransactionState::Unconfirmed)
    }

    async fn credit(&self, key: &OutputKey, multiplier: Decimal) -> Result<(), DbError> {
        self.call_procedure(
            "transaction_credit",
            vec![
                key.public_address.clone().into(),
                key.txid.clone().into(),
                vout_param(key.vout)?,
                multiplier.into(),
            ],
        )
        .await?
        .into_transition_result("transaction_credit", key, TransactionState::Confirmed)
    }

    async fn spend(&self, key: &OutputKey, spent_txid: &str) -> Result<(), DbError> {
        self.call_procedure(
            "transaction_spend",
            vec![
                key.public_address.clone().into(),
                key.txid.clone().into(),
                vout_param(key.vout)?,
                spent_txid.to_string().into(),
            ],
        )
        .await?
        .into_transition_result("transaction_spend", key, TransactionState::Credited)
    }

    async fn find_by_state(&self, state: TransactionState) -> Result<Vec<TrackedTransaction>, DbError> {
        let rows = tracked_transaction::Entity::find()
            .filter(tracked_transaction::Column::State.eq(state.as_str()))
            .order_by_asc(tracked_transaction::Column::CreatedAt)
            .order_by_asc(tracked_transaction::Column::Txid)
            .order_by_asc(tracked_transaction::Column::Vout)
            .all(&self.conn)
            .await?;

        Self::into_domain(rows)
    }

    async fn find_by_txids(&self, txids: &[String]) -> Result<Vec<TrackedTransaction>, DbError> {
        if txids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = tracked_transaction::Entity::find()
            .filter(tracked_transaction::Column::Txid.is_in(txids.iter().cloned()))
            .all(&self.conn)
            .await?;

        Self::into_domain(rows)
    }
}
