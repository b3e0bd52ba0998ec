use tracing::Span;

use super::TraceId;

/// Create a root span for a request / timer job.
pub fn root_span(name: &'static str, trace_id: &TraceId) -> Span {
    tracing::info_span!("root", name = %name, trace_id = %trace_id)
}

/// Create a child span (inherits trace_id automatically).
pub fn child_span(name: &'static str) -> Span {
    tracing::info_span!("child", name = %name)
}
