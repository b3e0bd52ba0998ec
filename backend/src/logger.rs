use std::time::Duration;

use tracing::{Span, field};

/// Record draft/lot context on the current span once it is known.
pub fn annotate_span(draft_id: &uuid::Uuid, lot_id: Option<&uuid::Uuid>) {
    let span = Span::current();
    span.record("draft_id", field::display(draft_id));
    if let Some(lid) = lot_id {
        span.record("lot_id", field::display(lid));
    }
}

/// Run `fut`, emitting a warning if it exceeds `max`.
///
/// Locked transactions are expected to be short; anything slow here is
/// holding an advisory lock and stalling the whole draft.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = std::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            target: "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}
