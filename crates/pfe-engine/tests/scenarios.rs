//! End-to-end sessions: edits from every origin, conflict handling, and
//! persistence across engine restarts.

use std::sync::Arc;
use std::time::Duration;

use pfe_bridge::{ChartFilterTrigger, ChartValue, ClickAction};
use pfe_core::{FilterPath, FilterSource, FixedClock, Timestamp};
use pfe_engine::{EngineConfig, EngineError, FilterEngine};
use pfe_persist::{
    decode_snapshot, AddressBar, FileStore, LoadOrigin, MemoryAddressBar, MemoryStore, StateStore,
};
use pfe_schema::{FilterValue, Schema};
use pfe_state::{ConflictSeverity, ConflictType, FilterAction, FilterConflict};

fn path(s: &str) -> FilterPath {
    FilterPath::new(s).unwrap()
}

fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(Timestamp::parse("2025-01-15T09:30:00Z").unwrap()))
}

struct Session {
    store: MemoryStore,
    bar: MemoryAddressBar,
    engine: FilterEngine,
}

fn start(config: EngineConfig, store: MemoryStore, bar: MemoryAddressBar) -> Session {
    let engine = FilterEngine::builder(config)
        .clock(clock())
        .start(Arc::new(store.clone()), Arc::new(bar.clone()))
        .unwrap();
    Session { store, bar, engine }
}

fn fresh() -> Session {
    start(EngineConfig::default(), MemoryStore::new(), MemoryAddressBar::default())
}

fn chart(path: &str, item: &str) -> ChartFilterTrigger {
    ChartFilterTrigger {
        chart_type: "bar".into(),
        segment_id: item.into(),
        filter_type: FilterPath::new(path).unwrap(),
        filter_value: ChartValue::Category(item.into()),
        action: ClickAction::Select,
    }
}

#[tokio::test(start_paused = true)]
async fn empty_session_starts_at_version_one() {
    let s = fresh();
    assert!(s.engine.loaded().is_none());
    assert_eq!(s.engine.state().version(), 1);
    assert!(s.engine.state().filters.is_default());
}

#[tokio::test(start_paused = true)]
async fn edits_from_every_origin_stay_in_one_version_sequence() {
    let mut s = fresh();
    let outcome = s.engine.apply_edit(
        path("industries"),
        FilterValue::list([" Manufacturing ", "retail", "manufacturing"]),
        FilterSource::Manual,
    );
    assert!(outcome.applied);
    assert_eq!(outcome.value, FilterValue::list(["manufacturing", "retail"]));

    s.engine.handle_chart_click(&chart("riskGrades", "CM2")).unwrap();
    s.engine.apply_preset("listed-manufacturing").unwrap();
    s.engine.apply_edit(path("searchQuery"), FilterValue::text("  steel   tubes "), FilterSource::Search);

    let state = s.engine.state();
    assert_eq!(state.version(), 5);
    assert_eq!(state.metadata.source, FilterSource::Search);
    assert_eq!(state.filters.dimension("industries"), Some(&FilterValue::list(["manufacturing"])));
    assert_eq!(state.filters.dimension("listingStatus"), Some(&FilterValue::list(["listed"])));
    assert_eq!(state.filters.dimension("riskGrades"), Some(&FilterValue::list(["CM2"])));
    assert_eq!(state.filters.dimension("searchQuery"), Some(&FilterValue::text("steel tubes")));
}

#[tokio::test(start_paused = true)]
async fn invalid_edit_surfaces_errors_without_bump() {
    let mut s = fresh();
    let outcome = s.engine.apply_edit(
        path("creditLimit"),
        FilterValue::range(Some(9000.0), Some(10.0)),
        FilterSource::Manual,
    );
    assert!(!outcome.applied);
    assert!(!outcome.validation.is_valid);
    let state = s.engine.state();
    assert_eq!(state.version(), 1);
    assert_eq!(state.ui.errors.len(), 1);
    assert_eq!(state.ui.errors[0].code, "INVALID_RANGE");
}

#[tokio::test(start_paused = true)]
async fn unchanged_edit_does_not_bump() {
    let mut s = fresh();
    s.engine.apply_edit(path("regions"), FilterValue::list(["east"]), FilterSource::Manual);
    let again = s.engine.apply_edit(path("regions"), FilterValue::list(["East"]), FilterSource::Manual);
    assert!(!again.applied);
    assert_eq!(s.engine.state().version(), 2);
}

#[tokio::test(start_paused = true)]
async fn contradiction_is_surfaced_and_auto_resolved() {
    let mut s = fresh();
    s.engine.apply_edit(path("riskGrades"), FilterValue::list(["CM1"]), FilterSource::Manual);
    s.engine.apply_edit(
        path("financialMetrics.revenue"),
        FilterValue::range(Some(0.0), Some(50.0)),
        FilterSource::Manual,
    );
    let ctx = s.engine.combination_context(None);
    let detected = s.engine.refresh_conflicts(&ctx);
    assert_eq!(detected.len(), 1);
    assert_eq!(detected[0].conflict_type, ConflictType::Contradiction);
    assert_eq!(s.engine.state().ui.conflicts.len(), 1);

    // A second refresh does not duplicate.
    s.engine.refresh_conflicts(&ctx);
    assert_eq!(s.engine.state().ui.conflicts.len(), 1);

    let report = s.engine.auto_resolve();
    assert_eq!(report.applied, vec![detected[0].id.clone()]);
    let state = s.engine.state();
    assert!(state.ui.conflicts.is_empty());
    assert_eq!(
        state.filters.get(&path("financialMetrics.revenue")),
        Some(&FilterValue::range(None, None))
    );
    assert_eq!(state.filters.dimension("riskGrades"), Some(&FilterValue::list(["CM1"])));
}

#[tokio::test(start_paused = true)]
async fn settle_auto_resolves_when_configured() {
    let mut config = EngineConfig::default();
    config.conflicts.auto_resolve = true;
    let mut s = start(config, MemoryStore::new(), MemoryAddressBar::default());
    s.engine.apply_edit(
        path("financialMetrics.debtEquityRatio"),
        FilterValue::range(Some(10.0), Some(20.0)),
        FilterSource::Manual,
    );
    s.engine.handle_chart_click(&chart("riskGrades", "CM1")).unwrap();
    let ctx = s.engine.combination_context(None);
    let left = s.engine.settle(&ctx);
    assert!(left.is_empty());
    // The chart click is more recent, so the grade is cleared.
    assert_eq!(s.engine.state().filters.dimension("riskGrades"), Some(&FilterValue::List(vec![])));
}

#[tokio::test(start_paused = true)]
async fn refresh_keeps_conflicts_until_expired() {
    let mut s = fresh();
    s.engine.apply_edit(path("listingStatus"), FilterValue::list(["unlisted"]), FilterSource::Manual);
    s.engine.apply_edit(path("creditRatings"), FilterValue::list(["AA"]), FilterSource::Manual);
    let ctx = s.engine.combination_context(None);
    assert_eq!(s.engine.refresh_conflicts(&ctx).len(), 1);
    assert!(s.engine.auto_resolve().applied.is_empty());

    s.engine.dispatch(FilterAction::clear(path("creditRatings")));
    assert!(s.engine.refresh_conflicts(&ctx).is_empty());
    assert_eq!(s.engine.state().ui.conflicts.len(), 1);

    let expired = s.engine.expire_conflicts(&ctx);
    assert_eq!(expired.len(), 1);
    assert!(s.engine.state().ui.conflicts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn refresh_never_removes_surfaced_conflicts() {
    let mut s = fresh();
    s.engine.apply_edit(path("regions"), FilterValue::list(["east"]), FilterSource::Manual);
    s.engine.dispatch(FilterAction::AddConflict {
        conflict: FilterConflict {
            id: "exclusion-external".into(),
            conflict_type: ConflictType::Exclusion,
            filters: vec!["regions".into()],
            message: "raised by the host".into(),
            severity: ConflictSeverity::High,
            auto_resolvable: false,
            suggested_resolution: None,
        },
    });

    let estimated = s.engine.combination_context(Some(0));
    s.engine.refresh_conflicts(&estimated);
    let ids = |s: &Session| s.engine.state().ui.conflicts.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&s).len(), 2);
    assert!(ids(&s).contains(&"exclusion-external".to_string()));

    // No estimate now: the availability conflict is not re-detected but stays.
    let unknown = s.engine.combination_context(None);
    assert!(s.engine.refresh_conflicts(&unknown).is_empty());
    assert_eq!(ids(&s).len(), 2);

    // Expiry drops the validator's conflict and keeps the host's.
    s.engine.expire_conflicts(&unknown);
    assert_eq!(ids(&s), vec!["exclusion-external".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn data_availability_from_estimate() {
    let mut s = fresh();
    s.engine.apply_edit(path("regions"), FilterValue::list(["northeast"]), FilterSource::Manual);
    let ctx = s.engine.combination_context(Some(0));
    let detected = s.engine.refresh_conflicts(&ctx);
    assert_eq!(detected.len(), 1);
    assert_eq!(detected[0].conflict_type, ConflictType::DataAvailability);
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_persists_once() {
    let mut s = fresh();
    for grade in ["CM1", "CM2", "CM3", "CM4", "CM5"] {
        s.engine.handle_chart_click(&chart("riskGrades", grade)).unwrap();
    }
    assert_eq!(s.store.read("portfolio-filters").unwrap(), None);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let stats = s.engine.writer_stats();
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.coalesced, 4);

    let text = s.store.read("portfolio-filters").unwrap().unwrap();
    let schema = Schema::portfolio();
    let (saved, report) = decode_snapshot(&schema, &text, clock().as_ref()).unwrap();
    assert!(report.is_clean());
    assert_eq!(saved.version(), 6);
    assert_eq!(s.bar.query(), "f_riskGrades=CM1%2CCM2%2CCM3%2CCM4%2CCM5");
}

#[tokio::test(start_paused = true)]
async fn cancelled_write_is_superseded_by_later_edits() {
    let mut s = fresh();
    s.engine.apply_edit(path("riskGrades"), FilterValue::list(["CM2"]), FilterSource::Manual);
    s.engine.cancel_pending();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(s.store.read("portfolio-filters").unwrap(), None);

    s.engine.apply_edit(path("regions"), FilterValue::list(["west"]), FilterSource::Manual);
    tokio::time::sleep(Duration::from_millis(500)).await;
    let schema = Schema::portfolio();
    let text = s.store.read("portfolio-filters").unwrap().unwrap();
    let (saved, _) = decode_snapshot(&schema, &text, clock().as_ref()).unwrap();
    assert_eq!(saved.version(), 3);

    s.engine.cancel_pending();
    s.engine.apply_edit(path("regions"), FilterValue::list(["south"]), FilterSource::Manual);
    s.engine.cancel_pending();
    let final_state = s.engine.shutdown().await;
    let text = s.store.read("portfolio-filters").unwrap().unwrap();
    let (saved, _) = decode_snapshot(&schema, &text, clock().as_ref()).unwrap();
    assert_eq!(saved.version(), final_state.version());
    assert_eq!(saved.filters, final_state.filters);
}

#[tokio::test(start_paused = true)]
async fn ui_only_transitions_are_not_persisted() {
    let mut s = fresh();
    s.engine.dispatch(FilterAction::SetLoading { is_loading: true });
    s.engine.flush().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(s.engine.writer_stats().writes, 0);
    assert!(s.engine.state().ui.is_loading);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_each_published_state() {
    let mut s = fresh();
    let mut rx = s.engine.subscribe();
    assert_eq!(rx.borrow_and_update().version(), 1);
    s.engine.apply_preset("watchlist").unwrap();
    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.metadata.source, FilterSource::Preset);
    assert_eq!(seen.version(), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_preset_is_an_error() {
    let mut s = fresh();
    assert!(matches!(s.engine.apply_preset("nope"), Err(EngineError::UnknownPreset(_))));
    assert_eq!(s.engine.state().version(), 1);
}

#[tokio::test(start_paused = true)]
async fn restart_rehydrates_from_storage() {
    let store = MemoryStore::new();
    let mut config = EngineConfig::default();
    config.persistence.query_enabled = false;

    let mut first = start(config.clone(), store.clone(), MemoryAddressBar::default());
    first.engine.apply_preset("compliance-gaps").unwrap();
    first.engine.apply_edit(path("creditLimit"), FilterValue::range(Some(500.0), None), FilterSource::Manual);
    let final_state = first.engine.shutdown().await;

    let second = start(config, store, MemoryAddressBar::default());
    let loaded = second.engine.loaded().unwrap();
    assert_eq!(loaded.origin, LoadOrigin::Storage);
    assert!(loaded.report.is_clean());
    assert_eq!(second.engine.state(), &final_state);
}

#[tokio::test(start_paused = true)]
async fn query_string_wins_and_corrupt_fields_are_dropped() {
    let store = MemoryStore::new();
    store.write("portfolio-filters", r#"{"formatVersion":1,"filters":{"regions":["west"]}}"#).unwrap();
    let bar = MemoryAddressBar::new("?tab=grid&f_riskGrades=CM2,CM3&f_creditLimit=lots-&f_regions=east");
    let s = start(EngineConfig::default(), store, bar);

    let loaded = s.engine.loaded().unwrap();
    assert_eq!(loaded.origin, LoadOrigin::Query);
    assert_eq!(loaded.report.discarded.len(), 1);
    let state = s.engine.state();
    assert_eq!(state.metadata.source, FilterSource::Url);
    assert_eq!(state.filters.dimension("riskGrades"), Some(&FilterValue::list(["CM2", "CM3"])));
    assert_eq!(state.filters.dimension("regions"), Some(&FilterValue::list(["east"])));
    assert_eq!(state.filters.dimension("creditLimit"), Some(&FilterValue::range(None, None)));
}

#[tokio::test(start_paused = true)]
async fn file_store_round_trip_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let session = pfe_core::SessionId::new();
    let store: Arc<dyn StateStore> = Arc::new(FileStore::for_session(dir.path(), &session).unwrap());
    let bar: Arc<dyn AddressBar> = Arc::new(MemoryAddressBar::default());

    let mut engine = FilterEngine::builder(EngineConfig::default())
        .clock(clock())
        .session(session)
        .start(store.clone(), bar.clone())
        .unwrap();
    engine.apply_preset("fy2024").unwrap();
    let saved = engine.shutdown().await;

    let reopened = FilterEngine::builder(EngineConfig::default())
        .clock(clock())
        .start(store, Arc::new(MemoryAddressBar::default()))
        .unwrap();
    assert_eq!(reopened.state().filters, saved.filters);
}

#[test]
fn start_outside_runtime_fails() {
    let result = FilterEngine::start(
        EngineConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryAddressBar::default()),
    );
    assert!(matches!(result, Err(EngineError::Persistence(_))));
}

#[tokio::test(start_paused = true)]
async fn invalid_config_refused() {
    let mut config = EngineConfig::default();
    config.conflicts.performance_threshold = 0;
    let result = FilterEngine::start(config, Arc::new(MemoryStore::new()), Arc::new(MemoryAddressBar::default()));
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
}
