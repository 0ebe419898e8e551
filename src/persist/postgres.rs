// Postgres mirror backend over sqlx.
//
// The write-behind worker owns no async runtime of its own, so the backend
// carries a current-thread tokio runtime and blocks on each statement. All
// four upserts are idempotent on their domain keys.

use std::sync::Arc;

use sqlx::{Connection, PgConnection};
use tracing::info;

use crate::error::{EngineError, Result};

use super::request::{
    AccountWrite, ClearingWrite, InstrumentWrite, OrderWrite, WriteRequest,
};
use super::store::{MirrorBackend, MirrorConnection, StoreError};

const UPSERT_INSTRUMENT: &str = "\
INSERT INTO instruments (symbol, security_id, security_id_source) \
VALUES ($1, $2, $3) \
ON CONFLICT (symbol) DO UPDATE SET \
security_id = EXCLUDED.security_id, \
security_id_source = EXCLUDED.security_id_source";

const UPSERT_ACCOUNT: &str = "\
INSERT INTO accounts (account, firm, type) \
VALUES ($1, $2, $3::account_type) \
ON CONFLICT (account) DO UPDATE SET \
firm = EXCLUDED.firm, \
type = EXCLUDED.type";

const UPSERT_CLEARING: &str = "\
INSERT INTO clearing_firms (firm) \
VALUES ($1) \
ON CONFLICT (firm) DO NOTHING";

const UPSERT_ORDER: &str = "\
INSERT INTO orders (\
  order_id, order_date, cl_order_id, orig_cl_order_id, \
  source, destination, side, ord_type, price, stop_px, \
  order_qty, min_qty, leaves_qty, cum_qty, avg_px, \
  day_order_qty, day_cum_qty, day_avg_px, \
  status, time_in_force, settl_type, capacity, currency, \
  instrument_id, account_id, clearing_firm_id, \
  expire_time, settl_date\
) VALUES (\
  $1, to_date($2::text, 'YYYYMMDD'), $3, $4, \
  $5, $6, $7::side, $8::order_type, $9, $10, \
  $11, $12, $13, $14, $15, \
  $16, $17, $18, \
  $19::order_status, $20::time_in_force, $21::settl_type, $22::capacity, $23::currency, \
  (SELECT id FROM instruments WHERE symbol = $24), \
  (SELECT id FROM accounts WHERE account = $25), \
  (SELECT id FROM clearing_firms WHERE firm = $26), \
  CASE WHEN $27::bigint = 0 THEN NULL ELSE to_timestamp($27::bigint) END, \
  CASE WHEN $28::bigint = 0 THEN NULL ELSE to_date($28::text, 'YYYYMMDD') END\
) \
ON CONFLICT (order_id, order_date) DO UPDATE SET \
  status = EXCLUDED.status, \
  leaves_qty = EXCLUDED.leaves_qty, \
  cum_qty = EXCLUDED.cum_qty, \
  avg_px = EXCLUDED.avg_px, \
  day_order_qty = EXCLUDED.day_order_qty, \
  day_cum_qty = EXCLUDED.day_cum_qty, \
  day_avg_px = EXCLUDED.day_avg_px, \
  cl_order_id = EXCLUDED.cl_order_id, \
  orig_cl_order_id = EXCLUDED.orig_cl_order_id";

fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => StoreError::Permanent(db.to_string()),
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Transient(err.to_string()),
        _ => StoreError::Permanent(err.to_string()),
    }
}

/// Connection factory for the Postgres mirror.
pub struct PostgresBackend {
    url: String,
    runtime: Arc<tokio::runtime::Runtime>,
}

impl PostgresBackend {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| EngineError::Persistence(format!("tokio runtime: {err}")))?;
        Ok(Self {
            url: url.into(),
            runtime: Arc::new(runtime),
        })
    }
}

impl MirrorBackend for PostgresBackend {
    fn connect(&self) -> std::result::Result<Box<dyn MirrorConnection>, StoreError> {
        let conn = self
            .runtime
            .block_on(PgConnection::connect(&self.url))
            .map_err(|err| StoreError::Transient(err.to_string()))?;
        info!("connected to the Postgres mirror");
        Ok(Box::new(PostgresMirrorConnection {
            runtime: Arc::clone(&self.runtime),
            conn,
        }))
    }
}

struct PostgresMirrorConnection {
    runtime: Arc<tokio::runtime::Runtime>,
    conn: PgConnection,
}

impl PostgresMirrorConnection {
    async fn write_instrument(conn: &mut PgConnection, w: &InstrumentWrite) -> sqlx::Result<()> {
        let mut tx = conn.begin().await?;
        sqlx::query(UPSERT_INSTRUMENT)
            .bind(&w.symbol)
            .bind(&w.security_id)
            .bind(&w.security_id_source)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    async fn write_account(conn: &mut PgConnection, w: &AccountWrite) -> sqlx::Result<()> {
        let mut tx = conn.begin().await?;
        sqlx::query(UPSERT_ACCOUNT)
            .bind(&w.account)
            .bind(&w.firm)
            .bind(&w.account_type)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    async fn write_clearing(conn: &mut PgConnection, w: &ClearingWrite) -> sqlx::Result<()> {
        let mut tx = conn.begin().await?;
        sqlx::query(UPSERT_CLEARING)
            .bind(&w.firm)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    async fn write_order(conn: &mut PgConnection, w: &OrderWrite) -> sqlx::Result<()> {
        let settl_type = if w.settl_type.is_empty() {
            None
        } else {
            Some(w.settl_type.as_str())
        };
        let mut tx = conn.begin().await?;
        sqlx::query(UPSERT_ORDER)
            .bind(w.order_id as i64)
            .bind(w.order_date as i64)
            .bind(&w.cl_order_id)
            .bind(&w.orig_cl_order_id)
            .bind(&w.source)
            .bind(&w.destination)
            .bind(&w.side)
            .bind(&w.ord_type)
            .bind(w.price)
            .bind(w.stop_px)
            .bind(w.order_qty as i32)
            .bind(w.min_qty as i32)
            .bind(w.leaves_qty as i32)
            .bind(w.cum_qty as i32)
            .bind(w.avg_px)
            .bind(w.day_order_qty as i32)
            .bind(w.day_cum_qty as i32)
            .bind(w.day_avg_px)
            .bind(&w.status)
            .bind(&w.tif)
            .bind(settl_type)
            .bind(&w.capacity)
            .bind(&w.currency)
            .bind(&w.instrument_symbol)
            .bind(&w.account_name)
            .bind(&w.clearing_firm)
            .bind(w.expire_time as i64)
            .bind(w.settl_date as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }
}

impl MirrorConnection for PostgresMirrorConnection {
    fn write(&mut self, request: &WriteRequest) -> std::result::Result<(), StoreError> {
        let runtime = Arc::clone(&self.runtime);
        let result = match request {
            WriteRequest::Instrument(w) => {
                runtime.block_on(Self::write_instrument(&mut self.conn, w))
            }
            WriteRequest::Account(w) => runtime.block_on(Self::write_account(&mut self.conn, w)),
            WriteRequest::Clearing(w) => runtime.block_on(Self::write_clearing(&mut self.conn, w)),
            WriteRequest::Order(w) => runtime.block_on(Self::write_order(&mut self.conn, w)),
        };
        result.map_err(classify)
    }
}
