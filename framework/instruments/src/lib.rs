mod snapshot;

pub use snapshot::{format_timestamp, MetricsSnapshotBuilder};
