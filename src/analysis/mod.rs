/// Analytics engines for the Seattle drawbridge event history.
///
/// Submodules:
/// - `groupings`  - organizes a flat event snapshot into per-bridge histories.
/// - `temporal`   - per (bridge, year, month, weekday, hour) opening statistics.
/// - `streaks`    - quiet-period streaks and the weekly champion.
/// - `cascade`    - "A opens, then B follows" edges and bridge influence.
/// - `prediction` - folds the three signals into one prediction per bridge.
/// - `engine`     - runs the passes on a worker pool and assembles a report.

pub mod cascade;
pub mod engine;
pub mod groupings;
pub mod prediction;
pub mod streaks;
pub mod temporal;
