/// Engine facade: runs every analytics pass over one snapshot.
///
/// Temporal aggregation, streak analysis and cascade detection are
/// independent of each other, so each runs as its own job on a shared
/// worker pool. They all read the same `Arc` snapshot and report back over
/// an `mpsc` channel; the prediction composer runs once all three are in.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use threadpool::ThreadPool;

use crate::analysis::cascade::{CancellationToken, bridge_influence, detect_cascades_cancellable};
use crate::analysis::prediction::{PredictionInputs, predict_all};
use crate::analysis::streaks::{compute_all_streaks, weekly_champion};
use crate::analysis::temporal::aggregate_events;
use crate::calendar::AnalyticsCalendar;
use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;
use crate::model::{
    AnalyticsCell, AnalyticsReport, BridgeEvent, CascadeEdge, CellKey, StreakRecord,
    WeeklyChampion,
};
use crate::store::EventStore;

/// Result of one pool job.
enum JobOutput {
    Cells(BTreeMap<CellKey, AnalyticsCell>),
    Streaks {
        records: Vec<StreakRecord>,
        champion: Option<WeeklyChampion>,
    },
    /// `None` when the run was cancelled mid-scan
    Cascades(Option<Vec<CascadeEdge>>),
}

/// Owns the configuration, the calendar and the worker pool.
pub struct AnalyticsEngine {
    config: Arc<AnalyticsConfig>,
    calendar: AnalyticsCalendar,
    pool: ThreadPool,
}

impl AnalyticsEngine {
    /// Validates `config` and starts `engine.worker_threads` workers.
    pub fn new(config: AnalyticsConfig) -> Result<Self, AnalyticsError> {
        config.validate()?;
        let calendar = config.calendar()?;
        let pool = ThreadPool::with_name("bridge-analytics".to_string(), config.engine.worker_threads);

        info!(
            "Analytics engine ready: {} workers, calendar offset {}",
            config.engine.worker_threads,
            calendar.offset()
        );

        Ok(Self {
            config: Arc::new(config),
            calendar,
            pool,
        })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn calendar(&self) -> AnalyticsCalendar {
        self.calendar
    }

    /// Runs every pass and blocks until the report is assembled.
    pub fn compute(
        &self,
        events: Vec<BridgeEvent>,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        run(
            &self.pool,
            &self.config,
            self.calendar,
            Arc::new(events),
            now,
            &CancellationToken::new(),
        )
    }

    /// Takes a snapshot from `store` and computes a report from it.
    pub fn compute_from_store(
        &self,
        store: &dyn EventStore,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        self.compute(store.snapshot(), now)
    }

    /// Starts a run in the background and returns immediately.
    pub fn spawn(
        &self,
        events: Vec<BridgeEvent>,
        now: DateTime<Utc>,
    ) -> Result<PendingReport, AnalyticsError> {
        let (tx, rx) = mpsc::channel();
        let token = CancellationToken::new();

        let pool = self.pool.clone();
        let config = Arc::clone(&self.config);
        let calendar = self.calendar;
        let job_token = token.clone();

        // The coordinator waits on the pool jobs, so it cannot be a pool job
        // itself without starving a single-worker pool.
        thread::Builder::new()
            .name("bridge-analytics-coordinator".to_string())
            .spawn(move || {
                let result = run(&pool, &config, calendar, Arc::new(events), now, &job_token);
                // Receiver gone means the caller dropped the handle
                let _ = tx.send(result);
            })
            .map_err(|e| AnalyticsError::WorkerFailed(format!("could not start coordinator: {}", e)))?;

        Ok(PendingReport {
            receiver: rx,
            token,
            taken: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Background runs
// ---------------------------------------------------------------------------

/// Handle to a run started with `AnalyticsEngine::spawn`.
///
/// Cancelling, or dropping the handle, stops cascade detection at the next
/// bridge boundary and discards whatever the run produces.
pub struct PendingReport {
    receiver: Receiver<Result<AnalyticsReport, AnalyticsError>>,
    token: CancellationToken,
    /// Set once `try_take` has handed out the result
    taken: bool,
}

impl PendingReport {
    /// Blocks until the run finishes.
    pub fn wait(self) -> Result<AnalyticsReport, AnalyticsError> {
        if self.token.is_cancelled() {
            return Err(AnalyticsError::Cancelled);
        }
        if self.taken {
            return Err(AnalyticsError::ReportTaken);
        }
        let result = self
            .receiver
            .recv()
            .map_err(|_| AnalyticsError::WorkerFailed("coordinator exited without a report".to_string()))?;
        self.discard_if_cancelled(result)
    }

    /// The report if the run has finished, `None` while it is still going.
    ///
    /// The result is handed out once; later calls return
    /// `AnalyticsError::ReportTaken`.
    pub fn try_take(&mut self) -> Option<Result<AnalyticsReport, AnalyticsError>> {
        if self.token.is_cancelled() {
            return Some(Err(AnalyticsError::Cancelled));
        }
        if self.taken {
            return Some(Err(AnalyticsError::ReportTaken));
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.taken = true;
                Some(self.discard_if_cancelled(result))
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AnalyticsError::WorkerFailed(
                "coordinator exited without a report".to_string(),
            ))),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn discard_if_cancelled(
        &self,
        result: Result<AnalyticsReport, AnalyticsError>,
    ) -> Result<AnalyticsReport, AnalyticsError> {
        if self.token.is_cancelled() {
            return Err(AnalyticsError::Cancelled);
        }
        result
    }
}

impl Drop for PendingReport {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

// ---------------------------------------------------------------------------
// One run
// ---------------------------------------------------------------------------

fn run(
    pool: &ThreadPool,
    config: &Arc<AnalyticsConfig>,
    calendar: AnalyticsCalendar,
    events: Arc<Vec<BridgeEvent>>,
    now: DateTime<Utc>,
    token: &CancellationToken,
) -> Result<AnalyticsReport, AnalyticsError> {
    debug!("Starting analytics run over {} events", events.len());
    let (tx, rx) = mpsc::channel();

    {
        let tx = tx.clone();
        let events = Arc::clone(&events);
        pool.execute(move || {
            let cells = aggregate_events(&events, &calendar, now);
            let _ = tx.send(JobOutput::Cells(cells));
        });
    }
    {
        let tx = tx.clone();
        let events = Arc::clone(&events);
        let config = Arc::clone(config);
        pool.execute(move || {
            let lookback = Duration::try_days(config.streaks.lookback_days).unwrap_or(Duration::MAX);
            let records = compute_all_streaks(&events, lookback, now, &config.streaks);
            let champion = weekly_champion(&events, now, &calendar, &config.streaks);
            let _ = tx.send(JobOutput::Streaks { records, champion });
        });
    }
    {
        let events = Arc::clone(&events);
        let config = Arc::clone(config);
        let token = token.clone();
        pool.execute(move || {
            let edges = detect_cascades_cancellable(&events, &config.cascade, &token);
            let _ = tx.send(JobOutput::Cascades(edges));
        });
    }

    let mut cells = None;
    let mut streaks = None;
    let mut cascades = None;

    // Ends once every job has sent or died
    for output in rx {
        match output {
            JobOutput::Cells(c) => cells = Some(c),
            JobOutput::Streaks { records, champion } => streaks = Some((records, champion)),
            JobOutput::Cascades(edges) => cascades = Some(edges),
        }
    }

    let cells = cells.ok_or_else(|| missing_job("temporal aggregation"))?;
    let (streaks, weekly_champion) = streaks.ok_or_else(|| missing_job("streak analysis"))?;
    let cascades = match cascades {
        Some(Some(edges)) => edges,
        Some(None) => return Err(AnalyticsError::Cancelled),
        None => return Err(missing_job("cascade detection")),
    };
    if token.is_cancelled() {
        return Err(AnalyticsError::Cancelled);
    }

    let bridge_ids: Vec<i64> = events
        .iter()
        .map(|e| e.entity_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let inputs = PredictionInputs {
        cells: &cells,
        streaks: &streaks,
        cascades: &cascades,
        recent_events: &events,
    };
    let predictions = predict_all(&bridge_ids, now, &inputs, &calendar, config);
    let influence = bridge_influence(&cascades);

    info!(
        "Analytics run complete: {} bridges, {} cells, {} cascade edges",
        bridge_ids.len(),
        cells.len(),
        cascades.len()
    );

    Ok(AnalyticsReport {
        generated_at: now,
        cells: cells.into_values().collect(),
        streaks,
        weekly_champion,
        cascades,
        influence,
        predictions,
    })
}

fn missing_job(name: &str) -> AnalyticsError {
    warn!("{} job exited without reporting", name);
    AnalyticsError::WorkerFailed(format!("{} job exited without reporting", name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cascade::detect_cascades;
    use crate::store::SnapshotStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, 12, 0, 0).unwrap()
    }

    fn opening(id: i64, name: &str, open: DateTime<Utc>, minutes: i64) -> BridgeEvent {
        BridgeEvent {
            entity_id: id,
            entity_name: name.to_string(),
            entity_type: "Bridge".to_string(),
            open_time: open,
            close_time: Some(open + Duration::minutes(minutes)),
            minutes_open: minutes as f64,
            latitude: 0.0,
            longitude: 0.0,
        }
    }

    /// Fremont opens daily at 14:00 for ten days, Ballard follows 10 minutes later.
    fn snapshot() -> Vec<BridgeEvent> {
        let base = Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap();
        let mut events = Vec::new();
        for day in 0..10 {
            let open = base + Duration::days(day);
            events.push(opening(3, "Fremont Bridge", open, 8));
            events.push(opening(1, "Ballard Bridge", open + Duration::minutes(10), 6));
        }
        events
    }

    fn engine() -> AnalyticsEngine {
        AnalyticsEngine::new(AnalyticsConfig::default()).expect("default config is valid")
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = AnalyticsConfig::default();
        config.engine.worker_threads = 0;
        assert!(matches!(
            AnalyticsEngine::new(config),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_new_rejects_oversized_lookback() {
        let mut config = AnalyticsConfig::default();
        config.streaks.lookback_days = 100_000_000;
        assert!(matches!(
            AnalyticsEngine::new(config),
            Err(AnalyticsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_compute_matches_direct_engine_calls() {
        let engine = engine();
        let report = engine.compute(snapshot(), now()).expect("run should succeed");

        let cells = aggregate_events(&snapshot(), &engine.calendar(), now());
        let cascades = detect_cascades(&snapshot(), &engine.config().cascade);

        assert_eq!(report.generated_at, now());
        assert_eq!(report.cells, cells.into_values().collect::<Vec<_>>());
        assert_eq!(report.cascades, cascades);
        assert_eq!(report.streaks.len(), 2);
        assert!(report.weekly_champion.is_some());
    }

    #[test]
    fn test_compute_predicts_every_bridge_in_id_order() {
        let report = engine().compute(snapshot(), now()).expect("run should succeed");
        let ids: Vec<i64> = report.predictions.iter().map(|p| p.bridge_id).collect();
        assert_eq!(ids, vec![1, 3]);
        for p in &report.predictions {
            assert!((0.0..=1.0).contains(&p.probability));
            assert!((0.0..=1.0).contains(&p.confidence));
        }
    }

    #[test]
    fn test_compute_finds_cascade_and_influence() {
        let report = engine().compute(snapshot(), now()).expect("run should succeed");

        let edge = report
            .cascades
            .iter()
            .find(|e| e.trigger_bridge_id == 3 && e.target_bridge_id == 1)
            .expect("Fremont should trigger Ballard");
        assert_eq!(edge.cascade_strength, 1.0);
        assert_eq!(edge.delay_minutes, 10.0);
        assert_eq!(report.influence[0].bridge_id, 3);
    }

    #[test]
    fn test_compute_empty_snapshot() {
        let report = engine().compute(Vec::new(), now()).expect("run should succeed");
        assert!(report.cells.is_empty());
        assert!(report.streaks.is_empty());
        assert!(report.weekly_champion.is_none());
        assert!(report.cascades.is_empty());
        assert!(report.predictions.is_empty());
    }

    #[test]
    fn test_compute_is_repeatable() {
        let engine = engine();
        let mut reversed = snapshot();
        reversed.reverse();

        let first = engine.compute(snapshot(), now()).expect("run should succeed");
        let second = engine.compute(reversed, now()).expect("run should succeed");
        assert_eq!(first, second);
    }

    #[test]
    fn test_compute_from_store() {
        let engine = engine();
        let store = SnapshotStore::new(snapshot());
        let from_store = engine.compute_from_store(&store, now()).expect("run should succeed");
        let direct = engine.compute(snapshot(), now()).expect("run should succeed");
        assert_eq!(from_store, direct);
    }

    #[test]
    fn test_spawn_then_wait_matches_compute() {
        let engine = engine();
        let pending = engine.spawn(snapshot(), now()).expect("spawn should succeed");
        let background = pending.wait().expect("run should succeed");
        let direct = engine.compute(snapshot(), now()).expect("run should succeed");
        assert_eq!(background, direct);
    }

    #[test]
    fn test_cancelled_run_discards_result() {
        let engine = engine();
        let mut pending = engine.spawn(snapshot(), now()).expect("spawn should succeed");
        pending.cancel();
        assert!(pending.is_cancelled());
        assert!(matches!(pending.try_take(), Some(Err(AnalyticsError::Cancelled))));
        assert!(matches!(pending.wait(), Err(AnalyticsError::Cancelled)));
    }

    #[test]
    fn test_try_take_hands_out_report_once() {
        let engine = engine();
        let mut pending = engine.spawn(snapshot(), now()).expect("spawn should succeed");

        let first = loop {
            if let Some(result) = pending.try_take() {
                break result;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        };
        assert_eq!(first.expect("run should succeed").predictions.len(), 2);

        assert!(matches!(pending.try_take(), Some(Err(AnalyticsError::ReportTaken))));
        assert!(matches!(pending.wait(), Err(AnalyticsError::ReportTaken)));
    }

    #[test]
    fn test_single_worker_pool_completes() {
        let mut config = AnalyticsConfig::default();
        config.engine.worker_threads = 1;
        let engine = AnalyticsEngine::new(config).expect("config is valid");
        let report = engine
            .spawn(snapshot(), now())
            .and_then(PendingReport::wait)
            .expect("run should succeed");
        assert_eq!(report.predictions.len(), 2);
    }
}
