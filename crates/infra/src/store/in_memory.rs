use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use stockledger_core::{DomainError, InventoryId, ProductId, Sku};
use stockledger_inventory::{InventoryRecord, Movement, MovementKind, StockBalance, StockPosition};

use super::query::MovementQuery;
use super::r#trait::{Committed, Decide, StockStore, StoreError, decide_and_stage, stage_movements};

/// One record and its movement log. Both live behind the same mutex so a
/// state update and its log append are never observed separately.
#[derive(Debug)]
struct Row {
    position: StockPosition,
    log: Vec<Movement>,
}

type RowHandle = Arc<Mutex<Row>>;

#[derive(Debug, Default)]
struct Index {
    by_product: HashMap<ProductId, RowHandle>,
    by_inventory: HashMap<InventoryId, RowHandle>,
    skus: HashMap<Sku, ProductId>,
}

/// In-memory stock store.
///
/// Intended for tests/dev. The index lock is only held to find a row; the
/// per-row mutex serializes transactions on one product while other products
/// proceed in parallel.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    index: RwLock<Index>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row_for_product(&self, product_id: &ProductId) -> Result<Option<RowHandle>, StoreError> {
        let index = self.index.read().map_err(|_| poisoned("index"))?;
        Ok(index.by_product.get(product_id).cloned())
    }

    fn row_for_inventory(&self, inventory_id: InventoryId) -> Result<Option<RowHandle>, StoreError> {
        let index = self.index.read().map_err(|_| poisoned("index"))?;
        Ok(index.by_inventory.get(&inventory_id).cloned())
    }
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} lock poisoned"))
}

/// New records start empty; initial stock is recorded as opening movements so
/// that replay from zero reproduces the record.
pub(crate) fn ensure_empty(record: InventoryRecord) -> Result<InventoryRecord, StoreError> {
    if record.balance() != StockBalance::empty() {
        return Err(StoreError::Rejected(DomainError::invalid_input(
            "new records must start empty; record initial stock as opening movements",
        )));
    }
    Ok(record)
}

impl StockStore for InMemoryStockStore {
    fn insert(
        &self,
        record: InventoryRecord,
        opening: Vec<MovementKind>,
    ) -> Result<Committed, StoreError> {
        let mut index = self.index.write().map_err(|_| poisoned("index"))?;

        if index.by_product.contains_key(record.product_id()) {
            return Err(StoreError::AlreadyExists(format!(
                "inventory for product {} already exists",
                record.product_id()
            )));
        }
        if let Some(owner) = index.skus.get(record.sku()) {
            return Err(StoreError::AlreadyExists(format!(
                "sku {} is already used by product {owner}",
                record.sku()
            )));
        }

        let at = record.created_at();
        let before = StockPosition::open(ensure_empty(record)?);
        let (after, movements) = stage_movements(&before, opening, at)?;

        let row = Arc::new(Mutex::new(Row {
            position: after.clone(),
            log: movements.clone(),
        }));
        let product_id = after.record().product_id().clone();
        index.skus.insert(after.record().sku().clone(), product_id.clone());
        index.by_inventory.insert(after.inventory_id(), row.clone());
        index.by_product.insert(product_id, row);

        Ok(Committed {
            before,
            after,
            movements,
        })
    }

    fn load(&self, product_id: &ProductId) -> Result<Option<StockPosition>, StoreError> {
        let Some(row) = self.row_for_product(product_id)? else {
            return Ok(None);
        };
        let row = row.lock().map_err(|_| poisoned("row"))?;
        Ok(Some(row.position.clone()))
    }

    fn transact(
        &self,
        product_id: &ProductId,
        at: DateTime<Utc>,
        decide: &mut Decide<'_>,
    ) -> Result<Committed, StoreError> {
        let row = self.row_for_product(product_id)?.ok_or(StoreError::NotFound)?;
        let mut row = row.lock().map_err(|_| poisoned("row"))?;

        let before = row.position.clone();
        let (after, movements) = decide_and_stage(&before, at, decide)?;

        row.position = after.clone();
        row.log.extend(movements.iter().cloned());

        Ok(Committed {
            before,
            after,
            movements,
        })
    }

    fn movements(
        &self,
        inventory_id: InventoryId,
        query: MovementQuery,
    ) -> Result<Vec<Movement>, StoreError> {
        let Some(row) = self.row_for_inventory(inventory_id)? else {
            return Ok(vec![]);
        };
        let row = row.lock().map_err(|_| poisoned("row"))?;

        Ok(row
            .log
            .iter()
            .rev()
            .filter(|m| query.matches(m.sequence))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }
}
