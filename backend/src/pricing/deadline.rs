/// Result of evaluating a timer reset against the current deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadlineExtension {
    pub should_extend: bool,
    pub new_deadline_ms: i64,
}

/// Compute the deadline a qualifying bid would push the lot to.
///
/// The candidate is `now + reset_on_bid`, capped at
/// `lot_created + max_lot_duration` when a cap is configured. Timers only
/// extend: if the candidate is not strictly later than the current deadline,
/// nothing moves.
pub fn extended_deadline(
    now_ms: i64,
    current_deadline_ms: i64,
    lot_created_ms: i64,
    reset_on_bid_ms: i64,
    max_lot_duration_ms: Option<i64>,
) -> DeadlineExtension {
    let mut candidate = now_ms + reset_on_bid_ms;
    if let Some(cap) = max_lot_duration_ms {
        candidate = candidate.min(lot_created_ms + cap);
    }

    DeadlineExtension {
        should_extend: candidate > current_deadline_ms,
        new_deadline_ms: candidate,
    }
}
