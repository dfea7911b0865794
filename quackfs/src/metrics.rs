//! Process counters and gauges, exposed through the `metrics` crate
//! facade so any recorder (Prometheus exporter, statsd, etc.) can be
//! wired in from `main` without this module depending on one directly —
//! the same facade-over-concrete-exporter split the teacher draws
//! between its `metrics.rs` counters and whichever backend `main`
//! installs.
//!
//! Density mirrors `inmemory_layer.rs`/`compaction.rs`: counters are
//! bumped inline at the call site in `manager.rs`, nothing here runs on
//! its own.

/// Call once at startup, before the first `Manager` operation, so every
/// metric has a description even before it's first recorded.
pub fn describe() {
    metrics::describe_counter!("quackfs_reads_total", "Number of completed read_file calls");
    metrics::describe_counter!(
        "quackfs_bytes_read_total",
        "Total bytes returned across all read_file calls"
    );
    metrics::describe_counter!("quackfs_writes_total", "Number of completed write_file calls");
    metrics::describe_counter!(
        "quackfs_bytes_written_total",
        "Total bytes accepted across all write_file calls"
    );
    metrics::describe_counter!(
        "quackfs_checkpoints_total",
        "Number of checkpoints that flushed a non-empty memtable"
    );
    metrics::describe_gauge!(
        "quackfs_orphan_blobs",
        "Object-store keys under layers/ unreachable from any catalog row, as of the last sweep"
    );
}

pub fn record_read(bytes: u64) {
    metrics::counter!("quackfs_reads_total").increment(1);
    metrics::counter!("quackfs_bytes_read_total").increment(bytes);
}

pub fn record_write(bytes: u64) {
    metrics::counter!("quackfs_writes_total").increment(1);
    metrics::counter!("quackfs_bytes_written_total").increment(bytes);
}

pub fn record_checkpoint() {
    metrics::counter!("quackfs_checkpoints_total").increment(1);
}

pub fn set_orphan_blobs(count: u64) {
    metrics::gauge!("quackfs_orphan_blobs").set(count as f64);
}
