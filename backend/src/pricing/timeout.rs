use crate::config::TimeoutPolicy;

use super::eligibility::NominatorEligibility;

/// What the engine should do when the nominator clock expires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutDecision {
    CreateLotWithOpenBid,
    CreateLotNoOpenBid,
    Skip,
}

/// Dispatch the configured timeout policy against the nominator's situation.
///
/// A skip policy always skips. Auto-nomination degrades to a skip whenever
/// there is no player left to nominate or the nominator can no longer open a
/// lot; otherwise the policy decides whether the nominator also becomes the
/// opening bidder.
pub fn resolve_timeout_action(
    policy: TimeoutPolicy,
    has_eligible_player: bool,
    eligibility: NominatorEligibility,
) -> TimeoutDecision {
    if policy == TimeoutPolicy::AutoSkipNominator {
        return TimeoutDecision::Skip;
    }

    if !has_eligible_player || !eligibility.is_eligible() {
        return TimeoutDecision::Skip;
    }

    match policy {
        TimeoutPolicy::AutoNominateAndOpenBid => TimeoutDecision::CreateLotWithOpenBid,
        TimeoutPolicy::AutoNominateNoOpenBid => TimeoutDecision::CreateLotNoOpenBid,
        TimeoutPolicy::AutoSkipNominator => TimeoutDecision::Skip,
    }
}
