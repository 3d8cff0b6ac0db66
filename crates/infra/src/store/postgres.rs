//! Postgres-backed stock store.
//!
//! Two tables: `inventory` (one row per product, current state) and
//! `inventory_movements` (append-only log, unique on `(inventory_id, sequence)`).
//! Each transaction locks the product's row with `SELECT … FOR UPDATE`, so the
//! read, decision, state update and log append are serialized per product while
//! different products never contend.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `AlreadyExists` on insert, `Conflict` otherwise | Duplicate product/sku, concurrent append |
//! | Database (serialization / deadlock) | `40001`, `40P01` | `Conflict` | Lost race |
//! | Database (lock not available) | `55P03` | `Conflict` | `lock_timeout` expired waiting for the row |
//! | Database (query canceled) | `57014` | `Unavailable` | `statement_timeout` |
//! | PoolTimedOut / PoolClosed / Io / Tls | N/A | `Unavailable` | Store unreachable |
//! | ColumnDecode / Decode / ColumnNotFound | N/A | `Corrupt` | Row does not match the schema |
//!
//! ## Runtime bridging
//!
//! `StockStore` is synchronous (thread-per-request callers). The store owns a
//! `tokio::runtime::Handle` and blocks on it, so it must be called from plain
//! threads, never from inside an async task on that runtime.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::{debug, instrument};
use uuid::Uuid;

use stockledger_core::{AggregateRoot, InventoryId, MovementId, OrderId, ProductId, Sku};
use stockledger_inventory::{
    InventoryRecord, Movement, MovementKind, MovementType, RecordParts, StockPosition,
};

use super::in_memory::ensure_empty;
use super::query::MovementQuery;
use super::r#trait::{Committed, Decide, StockStore, StoreError, decide_and_stage, stage_movements};

/// DDL for the two ledger tables (tests/dev; production schemas are migrated elsewhere).
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory (
    id            UUID PRIMARY KEY,
    product_id    TEXT NOT NULL UNIQUE,
    sku           TEXT NOT NULL UNIQUE,
    quantity      BIGINT NOT NULL CHECK (quantity >= 0),
    reserved      BIGINT NOT NULL CHECK (reserved >= 0 AND reserved <= quantity),
    min_stock     BIGINT NOT NULL DEFAULT 0 CHECK (min_stock >= 0),
    reorder_point BIGINT NOT NULL DEFAULT 0 CHECK (reorder_point >= 0),
    location      TEXT,
    version       BIGINT NOT NULL DEFAULT 0,
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS inventory_movements (
    id           UUID PRIMARY KEY,
    inventory_id UUID NOT NULL REFERENCES inventory (id),
    sequence     BIGINT NOT NULL CHECK (sequence > 0),
    type         TEXT NOT NULL,
    quantity     BIGINT NOT NULL,
    reason       TEXT,
    order_id     TEXT,
    created_at   TIMESTAMPTZ NOT NULL,
    UNIQUE (inventory_id, sequence)
);

CREATE INDEX IF NOT EXISTS inventory_movements_order_idx
    ON inventory_movements (inventory_id, order_id)
    WHERE order_id IS NOT NULL;
"#;

const RECORD_COLUMNS: &str = "id, product_id, sku, quantity, reserved, min_stock, reorder_point, \
                              location, version, created_at, updated_at";

/// Postgres-backed stock store.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
    runtime: Handle,
    lock_timeout: Duration,
}

impl PostgresStockStore {
    /// `runtime` drives the pool's IO; `lock_timeout` bounds how long a
    /// transaction waits for a busy row before reporting `Conflict`.
    pub fn new(pool: PgPool, runtime: Handle, lock_timeout: Duration) -> Self {
        Self {
            pool,
            runtime,
            lock_timeout,
        }
    }

    /// Create the ledger tables if they do not exist.
    pub async fn create_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_schema", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, record, opening),
        fields(product_id = %record.product_id(), sku = %record.sku()),
        err
    )]
    pub async fn insert_async(
        &self,
        record: InventoryRecord,
        opening: Vec<MovementKind>,
    ) -> Result<Committed, StoreError> {
        let at = record.created_at();
        let before = StockPosition::open(ensure_empty(record)?);
        let (after, movements) = stage_movements(&before, opening, at)?;
        let rec = after.record();

        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        sqlx::query(
            r#"
            INSERT INTO inventory (
                id, product_id, sku, quantity, reserved, min_stock, reorder_point,
                location, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(rec.id().as_uuid())
        .bind(rec.product_id().as_str())
        .bind(rec.sku().as_str())
        .bind(to_db(rec.quantity())?)
        .bind(to_db(rec.reserved())?)
        .bind(to_db(rec.min_stock())?)
        .bind(to_db(rec.reorder_point())?)
        .bind(rec.location())
        .bind(to_db(after.version())?)
        .bind(rec.created_at())
        .bind(rec.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::AlreadyExists(format!(
                    "inventory for product {} or sku {} already exists",
                    rec.product_id(),
                    rec.sku()
                ))
            } else {
                map_sqlx_error("insert_inventory", e)
            }
        })?;

        insert_movements(&mut tx, &movements).await?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        Ok(Committed {
            before,
            after,
            movements,
        })
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    pub async fn load_async(&self, product_id: &ProductId) -> Result<Option<StockPosition>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let position = load_position(&mut tx, product_id, false).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(position)
    }

    #[instrument(skip(self, decide), fields(product_id = %product_id), err)]
    pub async fn transact_async(
        &self,
        product_id: &ProductId,
        at: DateTime<Utc>,
        decide: &mut Decide<'_>,
    ) -> Result<Committed, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        let Some(before) = load_position(&mut tx, product_id, true).await? else {
            rollback(tx).await?;
            return Err(StoreError::NotFound);
        };

        let (after, movements) = match decide_and_stage(&before, at, decide) {
            Ok(staged) => staged,
            Err(err) => {
                rollback(tx).await?;
                return Err(err);
            }
        };

        if movements.is_empty() {
            rollback(tx).await?;
            return Ok(Committed {
                before,
                after,
                movements,
            });
        }

        let rec = after.record();
        sqlx::query(
            r#"
            UPDATE inventory
            SET quantity = $2, reserved = $3, version = $4, updated_at = $5
            WHERE id = $1 AND version = $6
            "#,
        )
        .bind(rec.id().as_uuid())
        .bind(to_db(rec.quantity())?)
        .bind(to_db(rec.reserved())?)
        .bind(to_db(after.version())?)
        .bind(rec.updated_at())
        .bind(to_db(before.version())?)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_inventory", e))
        .and_then(|done| {
            if done.rows_affected() == 1 {
                Ok(())
            } else {
                Err(StoreError::Conflict(format!(
                    "inventory {} changed under lock (expected version {})",
                    rec.id(),
                    before.version()
                )))
            }
        })?;

        insert_movements(&mut tx, &movements).await?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        debug!(appended = movements.len(), version = after.version(), "stock transaction committed");

        Ok(Committed {
            before,
            after,
            movements,
        })
    }

    #[instrument(skip(self), fields(inventory_id = %inventory_id, limit = query.limit), err)]
    pub async fn movements_async(
        &self,
        inventory_id: InventoryId,
        query: MovementQuery,
    ) -> Result<Vec<Movement>, StoreError> {
        let before = query.before.map(to_db).transpose()?;

        let rows = sqlx::query(
            r#"
            SELECT id, inventory_id, sequence, type, quantity, reason, order_id, created_at
            FROM inventory_movements
            WHERE inventory_id = $1
                AND ($2::BIGINT IS NULL OR sequence < $2)
            ORDER BY sequence DESC
            LIMIT $3
            "#,
        )
        .bind(inventory_id.as_uuid())
        .bind(before)
        .bind(i64::from(query.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }
}

impl StockStore for PostgresStockStore {
    fn insert(
        &self,
        record: InventoryRecord,
        opening: Vec<MovementKind>,
    ) -> Result<Committed, StoreError> {
        self.runtime.block_on(self.insert_async(record, opening))
    }

    fn load(&self, product_id: &ProductId) -> Result<Option<StockPosition>, StoreError> {
        self.runtime.block_on(self.load_async(product_id))
    }

    fn transact(
        &self,
        product_id: &ProductId,
        at: DateTime<Utc>,
        decide: &mut Decide<'_>,
    ) -> Result<Committed, StoreError> {
        self.runtime.block_on(self.transact_async(product_id, at, decide))
    }

    fn movements(
        &self,
        inventory_id: InventoryId,
        query: MovementQuery,
    ) -> Result<Vec<Movement>, StoreError> {
        self.runtime.block_on(self.movements_async(inventory_id, query))
    }
}

async fn rollback(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
}

/// Read a product's record and open reservations inside `tx`.
async fn load_position(
    tx: &mut Transaction<'_, Postgres>,
    product_id: &ProductId,
    for_update: bool,
) -> Result<Option<StockPosition>, StoreError> {
    let sql = if for_update {
        format!("SELECT {RECORD_COLUMNS} FROM inventory WHERE product_id = $1 FOR UPDATE")
    } else {
        format!("SELECT {RECORD_COLUMNS} FROM inventory WHERE product_id = $1")
    };

    let Some(row) = sqlx::query(&sql)
        .bind(product_id.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("load_inventory", e))?
    else {
        return Ok(None);
    };

    let (record, version) = record_from_row(&row)?;

    // Open reservations are derived from the log: RESERVE rows carry +n,
    // RELEASE rows -n, so a positive sum is what the order still holds.
    let reservation_rows = sqlx::query(
        r#"
        SELECT order_id, SUM(quantity)::BIGINT AS open
        FROM inventory_movements
        WHERE inventory_id = $1 AND type IN ('RESERVE', 'RELEASE')
        GROUP BY order_id
        HAVING SUM(quantity) > 0
        "#,
    )
    .bind(record.id().as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_reservations", e))?;

    let mut reservations = BTreeMap::new();
    for row in &reservation_rows {
        let order: String = row.try_get("order_id").map_err(decode_error)?;
        let open: i64 = row.try_get("open").map_err(decode_error)?;
        let order_id = OrderId::parse(order).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        reservations.insert(order_id, from_db("open", open)?);
    }

    StockPosition::restore(record, reservations, version)
        .map(Some)
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

async fn insert_movements(
    tx: &mut Transaction<'_, Postgres>,
    movements: &[Movement],
) -> Result<(), StoreError> {
    for movement in movements {
        let kind = &movement.kind;
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                id, inventory_id, sequence, type, quantity, reason, order_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(movement.id.as_uuid())
        .bind(movement.inventory_id.as_uuid())
        .bind(to_db(movement.sequence)?)
        .bind(kind.movement_type().as_str())
        .bind(kind.delta())
        .bind(kind.reason())
        .bind(kind.order_id().map(OrderId::as_str))
        .bind(movement.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict(format!(
                    "concurrent append detected: sequence {} already exists",
                    movement.sequence
                ))
            } else {
                map_sqlx_error("insert_movement", e)
            }
        })?;
    }
    Ok(())
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<(InventoryRecord, u64), StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let product_id: String = row.try_get("product_id").map_err(decode_error)?;
    let sku: String = row.try_get("sku").map_err(decode_error)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode_error)?;
    let reserved: i64 = row.try_get("reserved").map_err(decode_error)?;
    let min_stock: i64 = row.try_get("min_stock").map_err(decode_error)?;
    let reorder_point: i64 = row.try_get("reorder_point").map_err(decode_error)?;
    let location: Option<String> = row.try_get("location").map_err(decode_error)?;
    let version: i64 = row.try_get("version").map_err(decode_error)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode_error)?;

    let corrupt = |e: stockledger_core::DomainError| StoreError::Corrupt(e.to_string());
    let record = InventoryRecord::from_parts(RecordParts {
        id: InventoryId::from_uuid(id),
        product_id: ProductId::parse(product_id).map_err(corrupt)?,
        sku: Sku::parse(sku).map_err(corrupt)?,
        quantity: from_db("quantity", quantity)?,
        reserved: from_db("reserved", reserved)?,
        min_stock: from_db("min_stock", min_stock)?,
        reorder_point: from_db("reorder_point", reorder_point)?,
        location,
        created_at,
        updated_at,
    })
    .map_err(corrupt)?;

    Ok((record, from_db("version", version)?))
}

fn movement_from_row(row: &sqlx::postgres::PgRow) -> Result<Movement, StoreError> {
    let id: Uuid = row.try_get("id").map_err(decode_error)?;
    let inventory_id: Uuid = row.try_get("inventory_id").map_err(decode_error)?;
    let sequence: i64 = row.try_get("sequence").map_err(decode_error)?;
    let movement_type: String = row.try_get("type").map_err(decode_error)?;
    let quantity: i64 = row.try_get("quantity").map_err(decode_error)?;
    let reason: Option<String> = row.try_get("reason").map_err(decode_error)?;
    let order_id: Option<String> = row.try_get("order_id").map_err(decode_error)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode_error)?;

    let movement_type: MovementType = movement_type
        .parse()
        .map_err(|e: stockledger_core::DomainError| StoreError::Corrupt(e.to_string()))?;

    Ok(Movement {
        id: MovementId::from_uuid(id),
        inventory_id: InventoryId::from_uuid(inventory_id),
        sequence: from_db("sequence", sequence)?,
        kind: decode_kind(movement_type, quantity, reason, order_id)?,
        created_at,
    })
}

/// Rebuild a movement payload from its stored columns (`quantity` is the signed delta).
fn decode_kind(
    movement_type: MovementType,
    delta: i64,
    reason: Option<String>,
    order_id: Option<String>,
) -> Result<MovementKind, StoreError> {
    let missing = |what: &str| StoreError::Corrupt(format!("{movement_type} movement without {what}"));
    let magnitude = |expect_positive: bool| {
        if (delta > 0) == expect_positive && delta != 0 {
            Ok(delta.unsigned_abs())
        } else {
            Err(StoreError::Corrupt(format!(
                "{movement_type} movement with delta {delta}"
            )))
        }
    };
    let order = |order_id: Option<String>| {
        order_id
            .ok_or_else(|| missing("order_id"))
            .and_then(|o| OrderId::parse(o).map_err(|e| StoreError::Corrupt(e.to_string())))
    };

    Ok(match movement_type {
        MovementType::In => MovementKind::In {
            quantity: magnitude(true)?,
            reason: reason.ok_or_else(|| missing("reason"))?,
        },
        MovementType::Out => MovementKind::Out {
            quantity: magnitude(false)?,
            reason: reason.ok_or_else(|| missing("reason"))?,
        },
        MovementType::Adjustment => MovementKind::Adjustment {
            delta,
            reason: reason.ok_or_else(|| missing("reason"))?,
        },
        MovementType::Reserve => MovementKind::Reserve {
            quantity: magnitude(true)?,
            order_id: order(order_id)?,
        },
        MovementType::Release => MovementKind::Release {
            quantity: magnitude(false)?,
            order_id: order(order_id)?,
        },
    })
}

fn to_db(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Corrupt(format!("{value} exceeds BIGINT")))
}

fn from_db(column: &str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {column}: {value}")))
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(format!("failed to decode row: {err}"))
}

/// Classify a Postgres SQLSTATE.
fn classify_code(code: &str, msg: String) -> StoreError {
    match code {
        // unique violation, serialization failure, deadlock, lock_timeout
        "23505" | "40001" | "40P01" | "55P03" => StoreError::Conflict(msg),
        // statement_timeout, admin shutdown, cannot connect now
        "57014" | "57P01" | "57P03" => StoreError::Unavailable(msg),
        // check constraint: the schema refused an invalid balance
        "23514" => StoreError::Corrupt(msg),
        _ => StoreError::Unavailable(msg),
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code() {
                Some(code) => classify_code(code.as_ref(), msg),
                None => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => {
            StoreError::Corrupt(format!("decode error in {operation}: {err}"))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {operation}: {err}")),
    }
}

/// Check if an error is a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
