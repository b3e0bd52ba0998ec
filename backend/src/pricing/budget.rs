/// Derived spend position of one roster within a draft.
///
/// Computed from committed lots inside the caller's transaction:
/// `spent` sums winning bids on won lots, `won_count` counts them, and
/// `leading_commitment` sums the displayed price of active lots the roster
/// currently leads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BudgetSnapshot {
    pub spent: i64,
    pub won_count: i64,
    pub leading_commitment: i64,
}

/// Maximum amount a roster may bid on a lot right now.
///
/// Every unfilled slot beyond this lot must retain `min_bid` of budget, and
/// money already committed to other active lots is unavailable. When the
/// roster leads *this* lot, its displayed price is already inside
/// `leading_commitment` and is reusable for a raise on the same lot.
///
/// The result may be negative; callers treat that as "cannot afford
/// anything".
pub fn max_affordable_bid(
    total_budget: i64,
    roster_slots: i64,
    snap: &BudgetSnapshot,
    current_lot_bid: i64,
    is_leading_this_lot: bool,
    min_bid: i64,
) -> i64 {
    let remaining_slots = roster_slots - snap.won_count - 1;
    let reserve = remaining_slots.max(0) * min_bid;

    let mut base = total_budget - snap.spent - reserve - snap.leading_commitment;
    if is_leading_this_lot {
        base += current_lot_bid;
    }
    base
}

/// Can this roster still open a lot at the minimum bid?
pub fn can_afford_min_bid(
    total_budget: i64,
    roster_slots: i64,
    snap: &BudgetSnapshot,
    min_bid: i64,
) -> bool {
    min_bid <= max_affordable_bid(total_budget, roster_slots, snap, 0, false, min_bid)
}

/// Conservative proxy ceiling for an auto-nominated AFK nominator: the
/// smaller of what they can afford and the configured cap, floored at
/// `min_bid` so the opening proxy stays solvent.
pub fn smart_fallback_max(affordable: i64, cap: i64, min_bid: i64) -> i64 {
    affordable.min(cap).max(min_bid)
}
