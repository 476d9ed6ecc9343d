// src/store/writer.rs
//! Fire-and-forget persistence for live recording events

use super::PersistenceSink;
use crate::error::{RecorderError, Result};
use crate::session::{Session, SessionId, TracePoint, TripSummary, Waypoint};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::sync::{mpsc, oneshot};

enum StoreOp {
    Create(Session, oneshot::Sender<Result<SessionId>>),
    TracePoint(SessionId, TracePoint),
    Waypoint(SessionId, Waypoint),
    Summary(SessionId, TripSummary),
    Flush(oneshot::Sender<()>),
}

impl StoreOp {
    fn apply(self, sink: &dyn PersistenceSink) -> Result<()> {
        match self {
            StoreOp::Create(session, reply) => {
                let result = sink.save_session(&session);
                let outcome = match &result {
                    Ok(_) => Ok(()),
                    Err(e) => Err(RecorderError::persistence(e)),
                };
                let _ = reply.send(result);
                outcome
            }
            StoreOp::TracePoint(id, point) => sink.append_trace_point(id, &point),
            StoreOp::Waypoint(id, waypoint) => sink.append_waypoint(id, &waypoint),
            StoreOp::Summary(id, summary) => sink.update_session(id, &summary),
            StoreOp::Flush(_) => Ok(()),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            StoreOp::Create(..) => "session record",
            StoreOp::TracePoint(..) => "trace point",
            StoreOp::Waypoint(..) => "waypoint",
            StoreOp::Summary(..) => "trip summary",
            StoreOp::Flush(_) => "flush",
        }
    }
}

/// Handle to a background task that applies writes to a [`PersistenceSink`].
///
/// Each queued write is attempted exactly once. Failures are logged and
/// counted; they never reach the recording that produced them.
#[derive(Clone)]
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<StoreOp>,
    sink: Arc<dyn PersistenceSink>,
    failures: Arc<AtomicUsize>,
}

impl PersistenceWriter {
    /// Spawn the writer task on the current tokio runtime
    pub fn spawn(sink: Arc<dyn PersistenceSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<StoreOp>();
        let failures = Arc::new(AtomicUsize::new(0));

        let worker_sink = Arc::clone(&sink);
        let worker_failures = Arc::clone(&failures);
        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                if let StoreOp::Flush(done) = op {
                    let _ = done.send(());
                    continue;
                }

                let what = op.describe();
                let sink = Arc::clone(&worker_sink);
                let outcome = tokio::task::spawn_blocking(move || op.apply(sink.as_ref())).await;
                let failed = match outcome {
                    Ok(Ok(())) => false,
                    Ok(Err(e)) => {
                        tracing::warn!("Failed to persist {}: {}", what, e);
                        true
                    }
                    Err(e) => {
                        tracing::warn!("Persistence task for {} panicked: {}", what, e);
                        true
                    }
                };
                if failed {
                    worker_failures.fetch_add(1, Ordering::Relaxed);
                }
            }
            tracing::debug!("Persistence writer stopped");
        });

        Self { tx, sink, failures }
    }

    /// The sink this writer applies to, for synchronous calls
    pub fn sink(&self) -> &Arc<dyn PersistenceSink> {
        &self.sink
    }

    /// Create the durable record for `session` on the worker and wait for
    /// the id. Writes queued afterwards are applied after the record exists.
    pub async fn save_session(&self, session: Session) -> Result<SessionId> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(StoreOp::Create(session, reply_tx));
        reply_rx
            .await
            .map_err(|_| RecorderError::Persistence("writer stopped before the session was saved".to_string()))?
    }

    pub fn append_trace_point(&self, id: SessionId, point: TracePoint) {
        self.send(StoreOp::TracePoint(id, point));
    }

    pub fn append_waypoint(&self, id: SessionId, waypoint: Waypoint) {
        self.send(StoreOp::Waypoint(id, waypoint));
    }

    pub fn update_session(&self, id: SessionId, summary: TripSummary) {
        self.send(StoreOp::Summary(id, summary));
    }

    fn send(&self, op: StoreOp) {
        let what = op.describe();
        if self.tx.send(op).is_err() {
            tracing::warn!("Persistence writer is gone; dropping {}", what);
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Wait until every write queued before this call has been attempted
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(StoreOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Number of writes that could not be applied
    pub fn failed_writes(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::gps::LocationFix;
    use crate::session::Session;
    use crate::store::MemoryStore;
    use crate::track::RouteAccumulator;

    fn point(id: SessionId, at: i64) -> TracePoint {
        TracePoint {
            session_id: id,
            fix: LocationFix::new(Coordinate { latitude: 0.0, longitude: 0.0 }, None, at),
            timestamp_millis: at,
        }
    }

    #[tokio::test]
    async fn test_writes_reach_sink_after_flush() {
        let store = Arc::new(MemoryStore::new());
        let id = SessionId(1);
        store
            .save_session(&Session::new(id, 0, RouteAccumulator::default()))
            .unwrap();
        let writer = PersistenceWriter::spawn(store.clone());

        for at in 0..5 {
            writer.append_trace_point(id, point(id, at));
        }
        writer.flush().await;

        assert_eq!(store.load_session(id).unwrap().trace.len(), 5);
        assert_eq!(writer.failed_writes(), 0);
    }

    #[tokio::test]
    async fn test_save_session_runs_on_worker() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::spawn(store.clone());
        let id = writer
            .save_session(Session::new(SessionId(3), 30, RouteAccumulator::default()))
            .await
            .unwrap();
        assert_eq!(id, SessionId(3));

        writer.append_trace_point(id, point(id, 31));
        writer.flush().await;
        assert_eq!(store.load_session(id).unwrap().trace.len(), 1);

        store.set_failing(true);
        let failed = writer
            .save_session(Session::new(SessionId(4), 40, RouteAccumulator::default()))
            .await;
        assert!(matches!(failed, Err(RecorderError::Persistence(_))));
        writer.flush().await;
        assert_eq!(writer.failed_writes(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_propagated() {
        let store = Arc::new(MemoryStore::new());
        let writer = PersistenceWriter::spawn(store.clone());
        // Session was never saved, so both writes fail
        writer.append_trace_point(SessionId(2), point(SessionId(2), 0));
        writer.update_session(SessionId(2), TripSummary::placeholder(SessionId(2), 0));
        writer.flush().await;

        assert_eq!(writer.failed_writes(), 2);
    }
}
