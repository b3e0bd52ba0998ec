use uuid::Uuid;

/// One bidder's stored maximum on a lot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyBidEntry {
    pub roster_id: Uuid,
    pub max_bid: i64,
}

/// Notification payload for a leader displaced by resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutbidNotice {
    pub previous_leader: Uuid,
    pub previous_bid: i64,
    pub new_leading_bid: i64,
}

/// Outcome of re-running proxy resolution over a lot's bids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub new_leader: Uuid,
    pub new_price: i64,
    pub leader_changed: bool,
    pub price_changed: bool,
    pub new_bid_count: i64,
    pub outbid: Option<OutbidNotice>,
}

/// Resolve the leader and displayed price of a lot from its proxy bids.
///
/// Input invariant: `proxy_bids` is sorted by `max_bid` descending, ties
/// broken by earliest insertion (the earlier bidder wins an equal-max tie).
///
/// Rules:
/// - A single proxy leads at `max(current_bid, min_bid)`; the opening price
///   is a floor, never regressed below.
/// - With competition, the highest max leads at
///   `min(highest.max, second.max + min_increment)`.
/// - The price is monotonic: it never drops below `current_bid`.
/// - `bid_count` increments only when the displayed price moves.
pub fn resolve_second_price(
    current_bid: i64,
    current_leader: Option<Uuid>,
    proxy_bids: &[ProxyBidEntry],
    min_bid: i64,
    min_increment: i64,
    current_bid_count: i64,
) -> Option<Resolution> {
    let (new_leader, raw_price) = match proxy_bids {
        [] => return None,
        [only] => (only.roster_id, current_bid.max(min_bid)),
        [highest, second, ..] => (
            highest.roster_id,
            highest.max_bid.min(second.max_bid + min_increment),
        ),
    };

    // Monotonic guard: a resolution can never lower the displayed price.
    let new_price = raw_price.max(current_bid);

    let leader_changed = current_leader != Some(new_leader);
    let price_changed = new_price != current_bid;
    let new_bid_count = current_bid_count + i64::from(price_changed);

    let outbid = match (leader_changed, current_leader) {
        (true, Some(previous_leader)) => Some(OutbidNotice {
            previous_leader,
            previous_bid: current_bid,
            new_leading_bid: new_price,
        }),
        _ => None,
    };

    Some(Resolution {
        new_leader,
        new_price,
        leader_changed,
        price_changed,
        new_bid_count,
        outbid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bid(roster: Uuid, max: i64) -> ProxyBidEntry {
        ProxyBidEntry {
            roster_id: roster,
            max_bid: max,
        }
    }

    #[test]
    fn no_bids_resolves_to_nothing() {
        assert_eq!(resolve_second_price(5, None, &[], 1, 1, 0), None);
    }

    #[test]
    fn single_low_bid_takes_lead_at_opening_floor() {
        // Opening price 5 is the floor even though the lone proxy max is 1;
        // no increment applies when there is no leader.
        let a = Uuid::new_v4();
        let r = resolve_second_price(5, None, &[bid(a, 1)], 1, 1, 0).unwrap();

        assert_eq!(r.new_leader, a);
        assert_eq!(r.new_price, 5);
        assert!(r.leader_changed);
        assert!(!r.price_changed);
        assert_eq!(r.new_bid_count, 0);
        assert!(r.outbid.is_none(), "no previous leader to notify");
    }

    #[test]
    fn underbid_cannot_displace_leader() {
        // current 20, leader A max 25; B arrives with max 15.
        // min(25, 15+1) = 16 is below the displayed price; the monotonic
        // guard holds it at 20 and nothing changes.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let bids = [bid(a, 25), bid(b, 15)];

        let r = resolve_second_price(20, Some(a), &bids, 1, 1, 3).unwrap();

        assert_eq!(r.new_leader, a);
        assert_eq!(r.new_price, 20);
        assert!(!r.leader_changed);
        assert!(!r.price_changed);
        assert_eq!(r.new_bid_count, 3);
        assert!(r.outbid.is_none());
    }

    #[test]
    fn overtake_pays_second_plus_increment() {
        // current 10, leader B max 30; A arrives with max 50.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let bids = [bid(a, 50), bid(b, 30)];

        let r = resolve_second_price(10, Some(b), &bids, 1, 1, 4).unwrap();

        assert_eq!(r.new_leader, a);
        assert_eq!(r.new_price, 31);
        assert!(r.leader_changed);
        assert!(r.price_changed);
        assert_eq!(r.new_bid_count, 5);
        assert_eq!(
            r.outbid,
            Some(OutbidNotice {
                previous_leader: b,
                previous_bid: 10,
                new_leading_bid: 31,
            })
        );
    }

    #[test]
    fn leader_raising_own_ceiling_changes_nothing() {
        // current 5, leader A max raised from 10 to 100, no competition.
        let a = Uuid::new_v4();
        let r = resolve_second_price(5, Some(a), &[bid(a, 100)], 1, 1, 2).unwrap();

        assert_eq!(r.new_leader, a);
        assert_eq!(r.new_price, 5);
        assert!(!r.leader_changed);
        assert!(!r.price_changed);
        assert_eq!(r.new_bid_count, 2);
        assert!(r.outbid.is_none());
    }

    #[test]
    fn overtake_is_capped_by_winner_max() {
        // Second-highest 30 + increment 5 would be 35, but the winner's own
        // ceiling is 32.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let bids = [bid(a, 32), bid(b, 30)];

        let r = resolve_second_price(10, Some(b), &bids, 1, 5, 0).unwrap();

        assert_eq!(r.new_leader, a);
        assert_eq!(r.new_price, 32);
    }

    #[test]
    fn equal_max_tie_goes_to_earlier_bidder() {
        // Sorted input already encodes insertion order within an equal max:
        // the earlier bidder comes first and keeps the lead at their full max.
        let early = Uuid::new_v4();
        let late = Uuid::new_v4();
        let bids = [bid(early, 40), bid(late, 40)];

        let r = resolve_second_price(10, None, &bids, 1, 1, 0).unwrap();

        assert_eq!(r.new_leader, early);
        assert_eq!(r.new_price, 40, "tie resolves at the shared max");
    }

    #[test]
    fn third_bidder_does_not_affect_price() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let bids = [bid(a, 50), bid(b, 30), bid(c, 20)];

        let r = resolve_second_price(10, Some(b), &bids, 1, 1, 0).unwrap();

        assert_eq!(r.new_leader, a);
        assert_eq!(r.new_price, 31, "only the top two matter");
    }

    proptest! {
        // Arrival order of two distinct-max bids never changes the outcome:
        // resolution depends on the sorted set, not on who bid first.
        #[test]
        fn arrival_order_symmetry(max_a in 1i64..500, max_b in 1i64..500, current in 1i64..50) {
            prop_assume!(max_a != max_b);

            let a = Uuid::new_v4();
            let b = Uuid::new_v4();

            let mut first = vec![bid(a, max_a), bid(b, max_b)];
            first.sort_by(|x, y| y.max_bid.cmp(&x.max_bid));
            let mut second = vec![bid(b, max_b), bid(a, max_a)];
            second.sort_by(|x, y| y.max_bid.cmp(&x.max_bid));

            let r1 = resolve_second_price(current, None, &first, 1, 1, 0).unwrap();
            let r2 = resolve_second_price(current, None, &second, 1, 1, 0).unwrap();

            prop_assert_eq!(r1.new_leader, r2.new_leader);
            prop_assert_eq!(r1.new_price, r2.new_price);
        }

        // The monotonic guard holds for arbitrary bid sets.
        #[test]
        fn price_never_regresses(
            current in 0i64..100,
            maxes in proptest::collection::vec(1i64..200, 0..6),
        ) {
            let bids: Vec<ProxyBidEntry> = {
                let mut v: Vec<ProxyBidEntry> =
                    maxes.iter().map(|m| bid(Uuid::new_v4(), *m)).collect();
                v.sort_by(|x, y| y.max_bid.cmp(&x.max_bid));
                v
            };

            if let Some(r) = resolve_second_price(current, None, &bids, 1, 1, 0) {
                prop_assert!(r.new_price >= current);
            }
        }
    }
}
