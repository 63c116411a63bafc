/// One unit of work for the worker pool: ingest (or re-ingest) a single
/// source end-to-end. No ordering guarantee is made across jobs.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub source_id: i64,
    pub force_refresh: bool,
}

impl IngestJob {
    pub fn routine(source_id: i64) -> Self {
        Self { source_id, force_refresh: false }
    }

    pub fn priority(source_id: i64) -> Self {
        Self { source_id, force_refresh: true }
    }
}
