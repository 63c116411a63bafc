use intel_core::StageEvent;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

use crate::pipeline::Orchestrator;

const CHANNEL_CAPACITY: usize = 32;

/// Runs the same pipeline as [`Orchestrator::run`] but yields a `StageEvent`
/// at each named checkpoint as the query progresses, for a caller (e.g. the
/// API's SSE endpoint) that wants to relay partial progress instead of
/// waiting for the whole report. The pipeline runs on a spawned task; this
/// returns immediately with the receiving half of the channel.
pub fn run_stream(orchestrator: std::sync::Arc<Orchestrator>, query_text: String, limit: i64) -> impl Stream<Item = StageEvent> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        if let Err(error) = orchestrator.run_with_progress(&query_text, limit, Some(&tx)).await {
            let _ = tx.send(StageEvent::new("error", 1.0).with_message(error.to_string())).await;
        }
    });

    ReceiverStream::new(rx)
}
