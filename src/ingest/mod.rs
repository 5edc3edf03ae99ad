/// Event-snapshot ingest.
///
/// Each upstream payload format gets its own file here. The analytics
/// engines only ever see the resulting `BridgeEvent`s.

pub mod seattle;

#[cfg(test)]
pub(crate) mod fixtures;
