//! Behavioural tests for loading trip CSV files into a store.

use std::cell::RefCell;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use trips_core::{AggregateFilter, TripStore, TripStoreError};
use trips_data::{LoadSummary, LoadTripsError, ProgressUpdate, load_trips_file};

#[derive(Default)]
struct LoadWorld {
    store: RefCell<Option<TripStore>>,
    outcome: RefCell<Option<Result<LoadSummary, LoadTripsError>>>,
}

impl LoadWorld {
    fn open(&self, first_run: bool) {
        let store = TripStore::open_in_memory(first_run).expect("open store");
        self.store.replace(Some(store));
    }

    fn load(&self, name: &str) {
        let path = Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name);
        let outcome = {
            let mut borrowed = self.store.borrow_mut();
            let store = borrowed.as_mut().expect("store should be open");
            load_trips_file(store, &path, &mut |_: &ProgressUpdate| {})
        };
        self.outcome.replace(Some(outcome));
    }

    fn trip_count(&self) -> i64 {
        let borrowed = self.store.borrow();
        let store = borrowed.as_ref().expect("store should be open");
        store.trip_count().expect("count trips")
    }
}

#[fixture]
fn world() -> LoadWorld {
    LoadWorld::default()
}

#[given("an initialised trip store")]
fn given_store(world: &LoadWorld) {
    world.open(true);
}

#[given("a trip store without a schema")]
fn given_bare_store(world: &LoadWorld) {
    world.open(false);
}

#[when("I load the sample trips file")]
fn when_load_sample(world: &LoadWorld) {
    world.load("trips.csv");
}

#[when("I load the file with a malformed third row")]
fn when_load_broken(world: &LoadWorld) {
    world.load("broken.csv");
}

#[then("{count} trips are stored")]
fn then_count(world: &LoadWorld, count: i64) {
    assert_eq!(world.trip_count(), count);
}

#[then("the weekly average lists Hamburg, Prague and Turin")]
fn then_regions(world: &LoadWorld) {
    let borrowed = world.store.borrow();
    let store = borrowed.as_ref().expect("store should be open");
    let rows = store
        .average_weekly_trips(&AggregateFilter::all())
        .expect("run aggregate");
    let regions: Vec<&str> = rows.iter().map(|row| row.region.as_str()).collect();
    assert_eq!(regions, vec!["Hamburg", "Prague", "Turin"]);
}

#[then("the load fails on row {row}")]
fn then_fails_on_row(world: &LoadWorld, row: u64) {
    let binding = world.outcome.borrow();
    let outcome = binding.as_ref().expect("load should have run");
    match outcome {
        Err(LoadTripsError::InvalidRow { row: failed, .. }) => assert_eq!(*failed, row),
        other => panic!("expected invalid row error, got {other:?}"),
    }
}

#[then("the load fails because the schema is missing")]
fn then_missing_schema(world: &LoadWorld) {
    let binding = world.outcome.borrow();
    let outcome = binding.as_ref().expect("load should have run");
    assert!(
        matches!(
            outcome,
            Err(LoadTripsError::Store(TripStoreError::MissingSchema { .. }))
        ),
        "unexpected outcome: {outcome:?}"
    );
}

#[scenario(path = "tests/features/csv_load.feature", index = 0)]
fn loads_sample_file(world: LoadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/csv_load.feature", index = 1)]
fn keeps_rows_before_failure(world: LoadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/csv_load.feature", index = 2)]
fn refuses_uninitialised_store(world: LoadWorld) {
    let _ = world;
}
