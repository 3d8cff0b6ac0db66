use std::collections::VecDeque;

use stockledger_core::InventoryId;
use stockledger_inventory::Movement;

use super::error::LedgerError;
use crate::store::{MovementCursor, MovementQuery, StockStore};

/// Lazy, newest-first iterator over one record's movement log.
///
/// Pages are fetched from the store on demand. After an error the stream ends;
/// [`MovementStream::cursor`] tells where to resume with a fresh stream.
#[derive(Debug)]
pub struct MovementStream<'a, S: ?Sized> {
    store: &'a S,
    inventory_id: InventoryId,
    page_size: u32,
    cursor: Option<MovementCursor>,
    buffer: VecDeque<Movement>,
    exhausted: bool,
}

impl<'a, S> MovementStream<'a, S>
where
    S: StockStore + ?Sized,
{
    pub(crate) fn new(
        store: &'a S,
        inventory_id: InventoryId,
        page_size: u32,
        cursor: Option<MovementCursor>,
    ) -> Self {
        Self {
            store,
            inventory_id,
            page_size: page_size.max(1),
            cursor,
            buffer: VecDeque::new(),
            // sequence 1 is the oldest movement; nothing lies before it
            exhausted: cursor.is_some_and(|c| c.before <= 1),
        }
    }

    /// Resume point: the last movement handed out (or the starting cursor).
    pub fn cursor(&self) -> Option<MovementCursor> {
        self.cursor
    }

    fn fill(&mut self) -> Result<(), LedgerError> {
        let query = MovementQuery {
            limit: self.page_size,
            before: self.cursor.map(|c| c.before),
        };
        let page = self.store.movements(self.inventory_id, query)?;

        let short = page.len() < self.page_size as usize;
        let reached_start = page.last().is_none_or(|m| m.sequence <= 1);
        self.exhausted = short || reached_start;
        self.buffer.extend(page);
        Ok(())
    }
}

impl<S> Iterator for MovementStream<'_, S>
where
    S: StockStore + ?Sized,
{
    type Item = Result<Movement, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fill() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }

        let movement = self.buffer.pop_front()?;
        self.cursor = Some(MovementCursor {
            before: movement.sequence,
        });
        Some(Ok(movement))
    }
}
