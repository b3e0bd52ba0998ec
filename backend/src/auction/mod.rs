//! Fast auction orchestration.
//!
//! Lock usage contract (see `locks` for the full ordering rules):
//! - `nominate`, `auto_nominate`, `advance_nominator`, pause/resume and
//!   completion run under `DRAFT(draft_id)`.
//! - `set_max_bid` and settlement run under `AUCTION(lot_id)`.
//! - No operation holds both; settlement commits its `AUCTION` transaction
//!   before rotation takes `DRAFT` in a fresh one.

pub mod bid;
pub mod nominate;
pub mod rotate;
pub mod service;
pub mod settle;

pub use bid::BidOutcome;
pub use nominate::{AutoNominationOutcome, NominatedLot};
pub use rotate::AdvanceOutcome;
pub use service::{AuctionService, CurrentNominator, DraftStateView, RosterBudgetView};
pub use settle::SettlementOutcome;
