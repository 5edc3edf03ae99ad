/// bridge_analytics: predictive analytics over Seattle drawbridge openings.
///
/// # Module structure
///
/// ```text
/// bridge_analytics
/// ├── model     - shared data types (BridgeEvent, AnalyticsCell, StreakRecord, …)
/// ├── error     - AnalyticsError and IngestError
/// ├── config    - engine configuration loader (analytics.toml)
/// ├── calendar  - fixed-offset local calendar used for bucketing
/// ├── store     - EventStore snapshot seam + in-memory SnapshotStore
/// ├── ingest
/// │   ├── seattle - City of Seattle open-data JSON parsing
/// │   └── fixtures (test only) - representative feed payloads
/// └── analysis
///     ├── groupings  - per-bridge chronological histories
///     ├── temporal   - calendar-cell aggregation
///     ├── streaks    - quiet streaks and the weekly champion
///     ├── cascade    - cross-bridge cascade edges
///     ├── prediction - prediction composer
///     └── engine     - thread-pool facade producing an AnalyticsReport
/// ```

/// Public modules
pub mod analysis;
pub mod calendar;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod store;
