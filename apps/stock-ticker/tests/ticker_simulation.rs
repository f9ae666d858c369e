//! Ticker Simulation Integration Tests
//!
//! Drives the ticker through many cycles and checks price bounds, delivery
//! order, and scheduler lifecycle under concurrency.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Barrier};
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::{Decimal, RoundingStrategy};
use tokio_util::sync::CancellationToken;

use stock_ticker::{
    BroadcastError, CycleOutcome, PriceBroadcaster, PriceUpdate, PriceUpdater, Stock, StockStore,
    TickerService, UpdaterOptions, WalkParams,
};

#[derive(Default)]
struct RecordingBroadcaster {
    updates: Mutex<Vec<PriceUpdate>>,
}

impl RecordingBroadcaster {
    fn updates(&self) -> Vec<PriceUpdate> {
        self.updates.lock().clone()
    }

    fn len(&self) -> usize {
        self.updates.lock().len()
    }
}

impl PriceBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, update: &PriceUpdate) -> Result<usize, BroadcastError> {
        self.updates.lock().push(update.clone());
        Ok(1)
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn seeded_store() -> Arc<StockStore> {
    Arc::new(
        StockStore::new([
            Stock::new("A", dec("100.00")),
            Stock::new("B", dec("50.00")),
        ])
        .unwrap(),
    )
}

fn options(interval: Duration, pick_probability: f64, seed: u64) -> UpdaterOptions {
    UpdaterOptions {
        interval,
        walk: WalkParams {
            pick_probability,
            range_percent: 0.002,
            ..WalkParams::default()
        },
        rng_seed: Some(seed),
    }
}

#[test]
fn thousand_ticks_stay_in_bounds_and_deliver_in_order() {
    let store = seeded_store();
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let updater = PriceUpdater::new(
        Arc::clone(&store),
        Arc::clone(&broadcaster) as Arc<dyn PriceBroadcaster>,
        &options(Duration::from_millis(250), 0.10, 20_240_101),
    );

    let mut changed = 0;
    for _ in 0..1000 {
        match updater.run_cycle() {
            CycleOutcome::Completed(report) => {
                assert_eq!(report.examined, 2);
                assert_eq!(report.failures, 0);
                changed += report.changed;
            }
            CycleOutcome::Skipped => panic!("sequential cycles must never skip"),
        }
    }

    let a = store.get("A").unwrap().price;
    let b = store.get("B").unwrap().price;
    assert!(a >= dec("90") && a <= dec("110"), "A drifted to {a}");
    assert!(b >= dec("45") && b <= dec("55"), "B drifted to {b}");

    // Roughly one stock in ten changes per tick
    assert!((100..=300).contains(&changed), "{changed} changes in 1000 ticks");

    // One notification per change, in application order
    let updates = broadcaster.updates();
    assert_eq!(updates.len(), changed);
    for (i, update) in updates.iter().enumerate() {
        assert_eq!(update.sequence, i as u64 + 1);
    }

    // Replaying the changes reproduces the final prices
    let mut replay: HashMap<String, Decimal> =
        HashMap::from([("A".to_string(), dec("100.00")), ("B".to_string(), dec("50.00"))]);
    for update in &updates {
        let price = replay.get_mut(&update.symbol).unwrap();
        let bound = (*price * dec("0.002")).round_dp_with_strategy(2, RoundingStrategy::AwayFromZero);
        assert!(update.change.abs() <= bound, "{update:?} exceeds {bound}");
        *price += update.change;
        assert_eq!(*price, update.price);
    }
    assert_eq!(replay["A"], a);
    assert_eq!(replay["B"], b);

    let stats = updater.stats();
    assert_eq!(stats.completed, 1000);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.changes, changed as u64);
}

#[test]
fn concurrent_start_launches_one_scheduler() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let service = Arc::new(TickerService::new(
        seeded_store(),
        Arc::new(RecordingBroadcaster::default()),
        &options(Duration::from_secs(60), 0.10, 1),
        CancellationToken::new(),
    ));

    let barrier = Arc::new(Barrier::new(100));
    let threads: Vec<_> = (0..100)
        .map(|_| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            let handle = runtime.handle().clone();
            std::thread::spawn(move || {
                let _guard = handle.enter();
                barrier.wait();
                service.start().unwrap()
            })
        })
        .collect();

    let launched = threads
        .into_iter()
        .map(|t| t.join().unwrap())
        .filter(|started| *started)
        .count();
    assert_eq!(launched, 1);
    assert!(service.is_running());

    assert!(runtime.block_on(service.stop()));
    assert!(!service.is_running());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_notifications_after_stop() {
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let service = TickerService::new(
        seeded_store(),
        Arc::clone(&broadcaster) as Arc<dyn PriceBroadcaster>,
        &options(Duration::from_millis(5), 1.0, 3),
        CancellationToken::new(),
    );

    assert!(service.start().unwrap());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(service.stop().await);

    let at_stop = broadcaster.len();
    assert!(at_stop > 0, "scheduler never ticked");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(broadcaster.len(), at_stop);
    assert!(service.stats().completed > 0);
}

#[test]
fn snapshot_reflects_applied_changes() {
    let store = seeded_store();
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let service = TickerService::new(
        Arc::clone(&store),
        Arc::clone(&broadcaster) as Arc<dyn PriceBroadcaster>,
        &options(Duration::from_millis(250), 1.0, 11),
        CancellationToken::new(),
    );
    let updater = PriceUpdater::new(
        Arc::clone(&store),
        Arc::clone(&broadcaster) as Arc<dyn PriceBroadcaster>,
        &options(Duration::from_millis(250), 1.0, 11),
    );

    updater.run_cycle();

    let latest: HashMap<_, _> = broadcaster
        .updates()
        .into_iter()
        .map(|u| (u.symbol.clone(), u.price))
        .collect();
    for stock in service.all_stocks() {
        assert_eq!(latest[&stock.symbol], stock.price);
    }
}
