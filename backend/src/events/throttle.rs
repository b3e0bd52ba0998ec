use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

/// Best-effort outbid-notification throttle.
///
/// Rapid bid wars can displace the same user several times a second; this
/// bounds outbid events to one per `(user, lot)` per interval. State is
/// process-local and not required for correctness — a restart just lets one
/// extra notification through.
pub struct OutbidThrottle {
    interval_ms: i64,
    last_sent: Mutex<HashMap<(Uuid, Uuid), i64>>,
}

impl OutbidThrottle {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Default ~3s window.
    pub fn standard() -> Self {
        Self::new(3_000)
    }

    /// Returns true if a notification for `(user, lot)` may be sent now,
    /// recording the send time when it is allowed.
    pub fn allow(&self, user_id: Uuid, lot_id: Uuid, now_ms: i64) -> bool {
        let mut map = self.last_sent.lock();

        match map.get(&(user_id, lot_id)) {
            Some(last) if now_ms - last < self.interval_ms => false,
            _ => {
                map.insert((user_id, lot_id), now_ms);
                true
            }
        }
    }
}
