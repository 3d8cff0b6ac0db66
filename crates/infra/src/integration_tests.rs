//! Integration tests for the full ledger pipeline.
//!
//! Tests: Command → StockLedger → StockStore → EventBus
//!
//! Verifies:
//! - Reservation, release and adjustment semantics end to end (scenarios A–D)
//! - Racing reservations on the last units: one wins, the other sees `InsufficientStock`
//! - The movement log replays to the live record
//! - Events are published only after commit, and publish failures never fail a mutation
//! - Store conflicts and timeouts surface to the caller without retries

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use thiserror::Error;

use stockledger_core::{InventoryId, OrderId, ProductId, Sku};
use stockledger_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use stockledger_inventory::{
    AdjustStock, AdjustmentType, AlertLevel, Availability, CreateInventory, InventoryRecord,
    Movement, MovementKind, MovementType, ReleaseStock, ReserveStock, StockEvent, StockPosition,
};

use crate::ledger::{
    AdjustmentOutcome, INITIAL_STOCK_REASON, LedgerError, ReleaseOutcome, ReservationOutcome,
    StockLedger, StockResponse,
};
use crate::store::{
    Committed, Decide, InMemoryStockStore, MovementQuery, Pagination, StockStore, StoreError,
};

type Envelope = EventEnvelope<StockEvent>;
type Bus = Arc<InMemoryEventBus<Envelope>>;
type Ledger = StockLedger<Arc<InMemoryStockStore>, Bus>;

fn product(id: &str) -> ProductId {
    ProductId::parse(id).unwrap()
}

fn order(id: &str) -> OrderId {
    OrderId::parse(id).unwrap()
}

fn setup() -> (Ledger, Subscription<Envelope>) {
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let events = bus.subscribe();
    let ledger = StockLedger::new(Arc::new(InMemoryStockStore::new()), bus);
    (ledger, events)
}

fn create<S, B>(
    ledger: &StockLedger<S, B>,
    id: &str,
    quantity: i64,
    min_stock: i64,
    reorder_point: i64,
) -> InventoryRecord
where
    S: StockStore,
    B: EventBus<Envelope>,
{
    ledger
        .create_inventory(
            CreateInventory::new(product(id), Sku::parse(format!("SKU-{id}")).unwrap(), quantity)
                .min_stock(min_stock)
                .reorder_point(reorder_point),
        )
        .unwrap()
}

fn reserve<S, B>(
    ledger: &StockLedger<S, B>,
    id: &str,
    quantity: i64,
    order_id: &str,
) -> Result<ReservationOutcome, LedgerError>
where
    S: StockStore,
    B: EventBus<Envelope>,
{
    ledger.reserve_stock(ReserveStock {
        product_id: product(id),
        quantity,
        order_id: order(order_id),
    })
}

fn release(
    ledger: &Ledger,
    id: &str,
    quantity: i64,
    order_id: &str,
) -> Result<ReleaseOutcome, LedgerError> {
    ledger.release_stock(ReleaseStock {
        product_id: product(id),
        quantity,
        order_id: order(order_id),
    })
}

fn adjust(
    ledger: &Ledger,
    id: &str,
    quantity: i64,
    reason: &str,
    adjustment_type: AdjustmentType,
) -> Result<AdjustmentOutcome, LedgerError> {
    ledger.adjust_stock(AdjustStock {
        product_id: product(id),
        quantity,
        reason: reason.to_string(),
        adjustment_type,
    })
}

fn availability(ledger: &Ledger, id: &str) -> Availability {
    ledger.get_availability(&product(id)).unwrap()
}

fn event_types(events: &Subscription<Envelope>) -> Vec<String> {
    events
        .drain()
        .iter()
        .map(|e| e.event_type().to_string())
        .collect()
}

fn all_movements(ledger: &Ledger, id: &str) -> Vec<Movement> {
    ledger
        .movements(&product(id))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn scenario_a_reserve_into_critical_then_fail_on_shortfall() {
    let (ledger, events) = setup();
    create(&ledger, "p1", 100, 20, 30);
    assert_eq!(event_types(&events), vec!["inventory.record.created"]);

    let outcome = reserve(&ledger, "p1", 95, "order-A").unwrap();
    assert_eq!(outcome.available, 5);
    assert_eq!(outcome.reserved, 95);
    assert!(!outcome.replayed);
    assert_eq!(outcome.to_response().available, Some(5));

    let published = events.drain();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].event_type(), "inventory.stock.reserved");
    match published[1].payload() {
        StockEvent::LowStockAlert(alert) => {
            // 5 <= 30 / 2 takes precedence over 5 <= 20
            assert_eq!(alert.level, AlertLevel::Critical);
            assert_eq!(alert.available_stock, 5);
        }
        other => panic!("expected a low stock alert, got {other:?}"),
    }

    let err = reserve(&ledger, "p1", 10, "order-B").unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientStock {
            requested: 10,
            available: 5
        }
    );
    let response = StockResponse::failure(&product("p1"), &err);
    assert!(!response.success);
    assert_eq!(response.available, Some(5));
    assert_eq!(
        availability(&ledger, "p1"),
        Availability {
            quantity: 100,
            reserved: 95,
            available: 5
        }
    );

    let published = events.drain();
    assert_eq!(published.len(), 1);
    match published[0].payload() {
        StockEvent::StockReservationFailed(failed) => {
            assert_eq!(failed.order_id, order("order-B"));
            assert_eq!(failed.requested, 10);
            assert_eq!(failed.available_stock, 5);
        }
        other => panic!("expected a reservation failure, got {other:?}"),
    }
}

#[test]
fn scenario_b_full_release_restores_availability_without_alert() {
    let (ledger, events) = setup();
    create(&ledger, "p1", 100, 20, 30);
    reserve(&ledger, "p1", 95, "order-A").unwrap();
    events.drain();

    let outcome = release(&ledger, "p1", 95, "order-A").unwrap();
    assert_eq!(outcome.released, 95);
    assert_eq!(outcome.remaining, 0);
    assert_eq!(outcome.reserved, 0);
    assert_eq!(outcome.available, 100);

    assert_eq!(event_types(&events), vec!["inventory.stock.released"]);
}

#[test]
fn scenario_c_out_adjustment_past_zero_is_rejected() {
    let (ledger, events) = setup();
    create(&ledger, "p1", 100, 0, 0);
    events.drain();

    let err = adjust(&ledger, "p1", -150, "damaged goods", AdjustmentType::Out).unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientStock {
            requested: 150,
            available: 100
        }
    );
    assert_eq!(availability(&ledger, "p1").quantity, 100);
    assert_eq!(all_movements(&ledger, "p1").len(), 1);
    assert!(events.drain().is_empty());
}

#[test]
fn scenario_d_racing_reservations_have_exactly_one_winner() {
    for _ in 0..20 {
        let (ledger, _events) = setup();
        create(&ledger, "p1", 100, 0, 0);

        let ledger = Arc::new(ledger);
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["order-1", "order-2"]
            .into_iter()
            .map(|order_id| {
                let ledger = ledger.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    reserve(&*ledger, "p1", 60, order_id)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);

        let loser = results.into_iter().find_map(Result::err).unwrap();
        assert_eq!(
            loser,
            LedgerError::InsufficientStock {
                requested: 60,
                available: 40
            }
        );
        assert_eq!(availability(&ledger, "p1").reserved, 60);
    }
}

#[test]
fn reservations_on_different_products_run_in_parallel() {
    let (ledger, _events) = setup();
    for i in 0..4 {
        create(&ledger, &format!("p{i}"), 50, 0, 0);
    }

    let ledger = Arc::new(ledger);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for n in 0..10 {
                    reserve(&*ledger, &format!("p{i}"), 5, &format!("o-{i}-{n}")).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for i in 0..4 {
        assert_eq!(availability(&ledger, &format!("p{i}")).available, 0);
        ledger.verify_consistency(&product(&format!("p{i}"))).unwrap();
    }
}

#[test]
fn repeated_reservation_for_same_order_reserves_once() {
    let (ledger, events) = setup();
    create(&ledger, "p1", 100, 0, 0);
    events.drain();

    let first = reserve(&ledger, "p1", 5, "order-1").unwrap();
    let second = reserve(&ledger, "p1", 5, "order-1").unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(second.quantity, 5);
    assert_eq!(second.reserved, 5);
    assert_eq!(availability(&ledger, "p1").reserved, 5);
    assert_eq!(event_types(&events), vec!["inventory.stock.reserved"]);
    assert_eq!(all_movements(&ledger, "p1").len(), 2);
}

#[test]
fn order_may_reserve_again_after_full_release() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 10, 0, 0);

    reserve(&ledger, "p1", 4, "order-1").unwrap();
    release(&ledger, "p1", 4, "order-1").unwrap();
    let again = reserve(&ledger, "p1", 6, "order-1").unwrap();

    assert!(!again.replayed);
    assert_eq!(again.quantity, 6);
    assert_eq!(again.available, 4);
}

#[test]
fn reserving_exactly_available_drains_to_zero_and_one_more_fails() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 10, 0, 0);

    let err = reserve(&ledger, "p1", 11, "order-1").unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientStock {
            requested: 11,
            available: 10
        }
    );
    assert_eq!(availability(&ledger, "p1").reserved, 0);

    let outcome = reserve(&ledger, "p1", 10, "order-1").unwrap();
    assert_eq!(outcome.available, 0);
}

#[test]
fn partial_release_keeps_the_rest_of_the_reservation() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 20, 0, 0);
    reserve(&ledger, "p1", 8, "order-1").unwrap();

    let outcome = release(&ledger, "p1", 3, "order-1").unwrap();
    assert_eq!(outcome.released, 3);
    assert_eq!(outcome.remaining, 5);
    assert_eq!(outcome.available, 15);
}

#[test]
fn releasing_more_than_the_order_holds_is_rejected() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 20, 0, 0);
    reserve(&ledger, "p1", 8, "order-1").unwrap();
    reserve(&ledger, "p1", 8, "order-2").unwrap();

    // 9 <= total reserved (16), but order-1 only holds 8
    assert!(matches!(
        release(&ledger, "p1", 9, "order-1"),
        Err(LedgerError::InvalidOperation(_))
    ));
    assert!(matches!(
        release(&ledger, "p1", 1, "order-unknown"),
        Err(LedgerError::InvalidOperation(_))
    ));
    assert_eq!(availability(&ledger, "p1").reserved, 16);
}

#[test]
fn adjustments_report_previous_and_new_quantity() {
    let (ledger, events) = setup();
    create(&ledger, "p1", 100, 0, 0);
    events.drain();

    let received = adjust(&ledger, "p1", 50, "purchase order 17", AdjustmentType::In).unwrap();
    assert_eq!((received.previous_quantity, received.new_quantity), (100, 150));
    assert_eq!(received.movement_type, MovementType::In);

    let shipped = adjust(&ledger, "p1", -30, "shipment", AdjustmentType::Out).unwrap();
    assert_eq!((shipped.previous_quantity, shipped.new_quantity), (150, 120));
    assert_eq!(shipped.delta, -30);

    let counted = adjust(&ledger, "p1", -20, "cycle count", AdjustmentType::Adjustment).unwrap();
    assert_eq!((counted.previous_quantity, counted.new_quantity), (120, 100));
    assert_eq!(counted.movement_type, MovementType::Adjustment);

    assert_eq!(
        event_types(&events),
        vec![
            "inventory.stock.adjusted",
            "inventory.stock.adjusted",
            "inventory.stock.adjusted"
        ]
    );

    let newest = &all_movements(&ledger, "p1")[0];
    assert_eq!(
        newest.kind,
        MovementKind::Adjustment {
            delta: -20,
            reason: "cycle count".to_string()
        }
    );
}

#[test]
fn decrease_below_reserved_is_insufficient_stock() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 100, 0, 0);
    reserve(&ledger, "p1", 80, "order-1").unwrap();

    assert_eq!(
        adjust(&ledger, "p1", 30, "damaged", AdjustmentType::Out).unwrap_err(),
        LedgerError::InsufficientStock {
            requested: 30,
            available: 20
        }
    );
    assert_eq!(
        adjust(&ledger, "p1", -21, "recount", AdjustmentType::Adjustment).unwrap_err(),
        LedgerError::InsufficientStock {
            requested: 21,
            available: 20
        }
    );

    let drained = adjust(&ledger, "p1", 20, "damaged", AdjustmentType::Out).unwrap();
    assert_eq!(drained.new_quantity, 80);
    assert_eq!(drained.available, 0);
}

#[test]
fn malformed_commands_are_invalid_input_and_touch_nothing() {
    let (ledger, events) = setup();
    create(&ledger, "p1", 10, 0, 0);
    events.drain();

    assert!(matches!(
        adjust(&ledger, "p1", 5, "   ", AdjustmentType::In),
        Err(LedgerError::InvalidInput(_))
    ));
    assert!(matches!(
        adjust(&ledger, "p1", -5, "oops", AdjustmentType::In),
        Err(LedgerError::InvalidInput(_))
    ));
    assert!(matches!(
        adjust(&ledger, "p1", 0, "nothing", AdjustmentType::Adjustment),
        Err(LedgerError::InvalidInput(_))
    ));
    assert!(matches!(
        reserve(&ledger, "p1", 0, "order-1"),
        Err(LedgerError::InvalidInput(_))
    ));
    assert!(matches!(
        release(&ledger, "p1", -1, "order-1"),
        Err(LedgerError::InvalidInput(_))
    ));
    assert!(matches!(
        ledger.create_inventory(CreateInventory::new(product("p2"), Sku::parse("SKU-p2").unwrap(), -1)),
        Err(LedgerError::InvalidInput(_))
    ));

    assert_eq!(all_movements(&ledger, "p1").len(), 1);
    assert!(events.drain().is_empty());
}

#[test]
fn duplicate_product_or_sku_is_rejected() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 10, 0, 0);

    let same_product =
        ledger.create_inventory(CreateInventory::new(product("p1"), Sku::parse("OTHER").unwrap(), 5));
    assert!(matches!(same_product, Err(LedgerError::AlreadyExists(_))));

    let same_sku =
        ledger.create_inventory(CreateInventory::new(product("p2"), Sku::parse("SKU-p1").unwrap(), 5));
    assert!(matches!(same_sku, Err(LedgerError::AlreadyExists(_))));

    assert!(matches!(
        ledger.get_inventory(&product("p2")),
        Err(LedgerError::NotFound)
    ));
}

#[test]
fn unknown_product_is_not_found_everywhere() {
    let (ledger, events) = setup();

    assert_eq!(reserve(&ledger, "ghost", 1, "o").unwrap_err(), LedgerError::NotFound);
    assert_eq!(release(&ledger, "ghost", 1, "o").unwrap_err(), LedgerError::NotFound);
    assert_eq!(
        adjust(&ledger, "ghost", 1, "r", AdjustmentType::In).unwrap_err(),
        LedgerError::NotFound
    );
    assert_eq!(ledger.get_availability(&product("ghost")).unwrap_err(), LedgerError::NotFound);
    assert!(matches!(
        ledger.list_movements(&product("ghost"), Pagination::default()),
        Err(LedgerError::NotFound)
    ));
    assert!(matches!(
        ledger.verify_consistency(&product("ghost")),
        Err(LedgerError::NotFound)
    ));
    assert!(events.drain().is_empty());
}

#[test]
fn initial_stock_is_recorded_as_an_opening_movement() {
    let (ledger, _events) = setup();
    let record = create(&ledger, "p1", 40, 5, 10);
    create(&ledger, "empty", 0, 0, 0);

    assert_eq!(record.quantity(), 40);
    assert_eq!(record.reserved(), 0);

    let movements = all_movements(&ledger, "p1");
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].sequence, 1);
    assert_eq!(movements[0].inventory_id, record.id());
    assert_eq!(
        movements[0].kind,
        MovementKind::In {
            quantity: 40,
            reason: INITIAL_STOCK_REASON.to_string()
        }
    );

    assert!(all_movements(&ledger, "empty").is_empty());
}

#[test]
fn replaying_the_log_reproduces_the_live_record() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 100, 10, 20);

    reserve(&ledger, "p1", 30, "order-1").unwrap();
    reserve(&ledger, "p1", 20, "order-2").unwrap();
    adjust(&ledger, "p1", 15, "restock", AdjustmentType::In).unwrap();
    release(&ledger, "p1", 10, "order-1").unwrap();
    adjust(&ledger, "p1", -5, "shrinkage", AdjustmentType::Adjustment).unwrap();
    release(&ledger, "p1", 20, "order-2").unwrap();
    let _ = reserve(&ledger, "p1", 1000, "order-3");

    let replayed = ledger.verify_consistency(&product("p1")).unwrap();
    let live = ledger.get_inventory(&product("p1")).unwrap();

    assert_eq!(replayed.balance, live.balance());
    assert_eq!(replayed.version, 7);
    assert_eq!(replayed.reservations.get(&order("order-1")), Some(&20));
    assert!(!replayed.reservations.contains_key(&order("order-2")));
}

#[test]
fn movements_page_newest_first_with_resumable_cursor() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 100, 0, 0);
    for n in 0..6 {
        reserve(&ledger, "p1", 1, &format!("order-{n}")).unwrap();
    }

    let first = ledger
        .list_movements(&product("p1"), Pagination::first(3))
        .unwrap();
    let sequences: Vec<u64> = first.movements.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![7, 6, 5]);
    assert!(first.has_more());

    let second = ledger
        .list_movements(&product("p1"), Pagination::new(Some(3), first.next))
        .unwrap();
    let sequences: Vec<u64> = second.movements.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![4, 3, 2]);

    let last = ledger
        .list_movements(&product("p1"), Pagination::new(Some(3), second.next))
        .unwrap();
    assert_eq!(last.movements.len(), 1);
    assert_eq!(last.movements[0].movement_type(), MovementType::In);
    assert!(last.next.is_none());

    let created: Vec<DateTime<Utc>> = all_movements(&ledger, "p1")
        .iter()
        .map(|m| m.created_at)
        .collect();
    assert!(created.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn page_size_is_capped_by_config() {
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let config = crate::config::LedgerConfig {
        default_page_size: 2,
        max_page_size: 4,
        ..Default::default()
    };
    let ledger = StockLedger::with_config(Arc::new(InMemoryStockStore::new()), bus, config);
    create(&ledger, "p1", 100, 0, 0);
    for n in 0..9 {
        reserve(&ledger, "p1", 1, &format!("order-{n}")).unwrap();
    }

    let defaulted = ledger.list_movements(&product("p1"), Pagination::default()).unwrap();
    assert_eq!(defaulted.movements.len(), 2);

    let capped = ledger.list_movements(&product("p1"), Pagination::first(500)).unwrap();
    assert_eq!(capped.movements.len(), 4);

    let streamed: Vec<u64> = ledger
        .movements(&product("p1"))
        .unwrap()
        .map(|m| m.unwrap().sequence)
        .collect();
    assert_eq!(streamed, (1..=10).rev().collect::<Vec<_>>());
}

#[test]
fn movement_stream_restarts_from_its_cursor() {
    let (ledger, _events) = setup();
    create(&ledger, "p1", 100, 0, 0);
    for n in 0..4 {
        reserve(&ledger, "p1", 1, &format!("order-{n}")).unwrap();
    }

    let mut stream = ledger.movements(&product("p1")).unwrap();
    let taken: Vec<u64> = stream.by_ref().take(2).map(|m| m.unwrap().sequence).collect();
    assert_eq!(taken, vec![5, 4]);

    let cursor = stream.cursor();
    drop(stream);

    let rest: Vec<u64> = ledger
        .movements_from(&product("p1"), cursor)
        .unwrap()
        .map(|m| m.unwrap().sequence)
        .collect();
    assert_eq!(rest, vec![3, 2, 1]);
}

#[test]
fn envelopes_carry_stream_version_and_iso_timestamps() {
    let (ledger, events) = setup();
    create(&ledger, "p1", 10, 0, 0);
    reserve(&ledger, "p1", 2, "order-1").unwrap();

    let published = events.drain();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].stream_version(), 1);
    assert_eq!(published[1].stream_version(), 2);
    assert_ne!(published[0].event_id(), published[1].event_id());

    let json = published[1].to_json().unwrap();
    let value = serde_json::to_value(&json).unwrap();
    let occurred_at = value["occurred_at"].as_str().unwrap();
    assert!(DateTime::parse_from_rfc3339(occurred_at).is_ok());
    assert_eq!(json.payload()["StockReserved"]["available_stock"], 8);
}

#[derive(Debug, Error)]
#[error("bus offline")]
struct BusOffline;

#[derive(Debug, Default)]
struct FailingBus {
    attempts: AtomicUsize,
}

impl EventBus<Envelope> for FailingBus {
    type Error = BusOffline;

    fn publish(&self, _message: Envelope) -> Result<(), Self::Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(BusOffline)
    }

    fn subscribe(&self) -> Subscription<Envelope> {
        let (_tx, rx) = mpsc::channel();
        Subscription::new(rx)
    }
}

#[test]
fn publish_failures_do_not_undo_committed_changes() {
    let ledger = StockLedger::new(InMemoryStockStore::new(), FailingBus::default());
    create(&ledger, "p1", 10, 0, 0);

    let outcome = reserve(&ledger, "p1", 4, "order-1").unwrap();
    assert_eq!(outcome.available, 6);
    assert_eq!(ledger.get_availability(&product("p1")).unwrap().reserved, 4);
    assert_eq!(ledger.bus().attempts.load(Ordering::SeqCst), 2);
}

/// Store wrapper that fails every transaction with a fixed error.
struct FlakyStore {
    inner: InMemoryStockStore,
    failure: fn() -> StoreError,
    calls: AtomicUsize,
}

impl StockStore for FlakyStore {
    fn insert(
        &self,
        record: InventoryRecord,
        opening: Vec<MovementKind>,
    ) -> Result<Committed, StoreError> {
        self.inner.insert(record, opening)
    }

    fn load(&self, product_id: &ProductId) -> Result<Option<StockPosition>, StoreError> {
        self.inner.load(product_id)
    }

    fn transact(
        &self,
        _product_id: &ProductId,
        _at: DateTime<Utc>,
        _decide: &mut Decide<'_>,
    ) -> Result<Committed, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.failure)())
    }

    fn movements(
        &self,
        inventory_id: InventoryId,
        query: MovementQuery,
    ) -> Result<Vec<Movement>, StoreError> {
        self.inner.movements(inventory_id, query)
    }
}

#[test]
fn conflicts_and_timeouts_surface_without_retry() {
    let cases: [(fn() -> StoreError, fn(&LedgerError) -> bool); 2] = [
        (
            || StoreError::Conflict("lost the row lock".into()),
            |e| matches!(e, LedgerError::Conflict(_)),
        ),
        (
            || StoreError::Unavailable("lock_timeout".into()),
            |e| matches!(e, LedgerError::Unavailable(_)),
        ),
    ];

    for (failure, expected) in cases {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let events = bus.subscribe();
        let store = FlakyStore {
            inner: InMemoryStockStore::new(),
            failure,
            calls: AtomicUsize::new(0),
        };
        let ledger = StockLedger::new(store, bus);
        create(&ledger, "p1", 10, 0, 0);
        events.drain();

        let err = reserve(&ledger, "p1", 1, "order-1").unwrap_err();
        assert!(expected(&err));
        assert!(err.is_transient());
        assert_eq!(ledger.store().calls.load(Ordering::SeqCst), 1);
        assert!(events.drain().is_empty());
    }
}

#[derive(Debug, Clone)]
enum Op {
    Reserve { quantity: i64, order: u8 },
    Release { quantity: i64, order: u8 },
    Adjust { quantity: i64, kind: AdjustmentType },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..40, 0u8..4).prop_map(|(quantity, order)| Op::Reserve { quantity, order }),
        (1i64..40, 0u8..4).prop_map(|(quantity, order)| Op::Release { quantity, order }),
        (1i64..40).prop_map(|quantity| Op::Adjust { quantity, kind: AdjustmentType::In }),
        (1i64..40).prop_map(|quantity| Op::Adjust { quantity, kind: AdjustmentType::Out }),
        (-40i64..40)
            .prop_filter("non-zero delta", |q| *q != 0)
            .prop_map(|quantity| Op::Adjust { quantity, kind: AdjustmentType::Adjustment }),
    ]
}

proptest! {
    #[test]
    fn any_command_sequence_keeps_the_log_and_record_in_step(
        initial in 0i64..100,
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let (ledger, _events) = setup();
        create(&ledger, "p1", initial, 10, 20);

        for op in ops {
            let before = availability(&ledger, "p1");
            let result = match op {
                Op::Reserve { quantity, order } => {
                    reserve(&ledger, "p1", quantity, &format!("o-{order}")).map(|_| ())
                }
                Op::Release { quantity, order } => {
                    release(&ledger, "p1", quantity, &format!("o-{order}")).map(|_| ())
                }
                Op::Adjust { quantity, kind } => adjust(&ledger, "p1", quantity, "prop", kind).map(|_| ()),
            };

            let after = availability(&ledger, "p1");
            prop_assert!(after.reserved <= after.quantity);
            prop_assert_eq!(after.available, after.quantity - after.reserved);
            if result.is_err() {
                prop_assert_eq!(before, after);
            }
        }

        let replayed = ledger.verify_consistency(&product("p1")).unwrap();
        let live = ledger.get_inventory(&product("p1")).unwrap();
        prop_assert_eq!(replayed.balance, live.balance());
    }
}
