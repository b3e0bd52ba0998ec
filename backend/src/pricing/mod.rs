//! Pure auction arithmetic.
//!
//! Responsibilities:
//! - Second-price proxy resolution for a single lot.
//! - Budget math: max affordable bid, slot reserve, opening-bid feasibility.
//! - Deadline extension on qualifying bids.
//! - Nominator eligibility and timeout-action dispatch.
//!
//! Non-responsibilities:
//! - No IO, no clock reads, no locking. Every function takes primitives and
//!   value objects and is deterministic; callers supply `now` and committed
//!   state read inside their own transaction.

pub mod budget;
pub mod deadline;
pub mod eligibility;
pub mod second_price;
pub mod timeout;

pub use budget::{BudgetSnapshot, can_afford_min_bid, max_affordable_bid, smart_fallback_max};
pub use deadline::{DeadlineExtension, extended_deadline};
pub use eligibility::{NominatorEligibility, assess_nominator_eligibility};
pub use second_price::{OutbidNotice, ProxyBidEntry, Resolution, resolve_second_price};
pub use timeout::{TimeoutDecision, resolve_timeout_action};
