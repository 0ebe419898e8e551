// Indexed subscription store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::common::{IdT, SubscriberId};
use crate::model::{OrderEntry, WideDataStorage};

use super::filter::OrderFilter;

/// Subscription families. Only order subscriptions are populated by
/// `add_subscription`; the remaining groups exist so per-kind bucketing has
/// one slot per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Order,
    Execution,
    MarketData,
    Timer,
    Alert,
}

impl SubscriptionKind {
    pub const COUNT: usize = 5;

    fn index(self) -> usize {
        match self {
            SubscriptionKind::Order => 0,
            SubscriptionKind::Execution => 1,
            SubscriptionKind::MarketData => 2,
            SubscriptionKind::Timer => 3,
            SubscriptionKind::Alert => 4,
        }
    }
}

/// One registered subscription.
#[derive(Debug)]
pub struct SubscriptionEntry {
    pub id: IdT,
    pub name: String,
    pub kind: SubscriptionKind,
    pub filter: OrderFilter,
    pub handler: SubscriberId,
}

/// Per-kind bucket split: entries pinned to an instrument against everything
/// else. Inner maps are keyed by subscription id, so scans run in id order.
#[derive(Default)]
struct SubscriptionGroup {
    by_instrument: BTreeMap<IdT, BTreeMap<IdT, Arc<SubscriptionEntry>>>,
    general: BTreeMap<IdT, Arc<SubscriptionEntry>>,
}

#[derive(Default)]
struct Inner {
    /// Kind-indexed groups per subscriber.
    by_subscriber: BTreeMap<SubscriberId, Vec<SubscriptionGroup>>,
    /// Flat per-handler list backing O(1) bulk removal.
    by_handler: BTreeMap<SubscriberId, Vec<Arc<SubscriptionEntry>>>,
}

/// Filter-indexed subscription store.
///
/// One coarse mutex serializes reads and writes: predictable latency over
/// read throughput. The lock is never held across user callbacks; lookups
/// return plain subscriber ids for the caller to broadcast.
pub struct SubscriptionManager {
    counter: AtomicU64,
    wide: Arc<WideDataStorage>,
    inner: Mutex<Inner>,
}

impl SubscriptionManager {
    pub fn new(wide: Arc<WideDataStorage>) -> Self {
        Self {
            counter: AtomicU64::new(1),
            wide,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Registers an order subscription for `handler` and returns its id.
    ///
    /// A filter pinned to one instrument (via its instrument-id equality
    /// leaf) lands in that instrument's bucket; anything else is general.
    pub fn add_subscription(
        &self,
        name: &str,
        filter: OrderFilter,
        handler: SubscriberId,
    ) -> IdT {
        let id = IdT {
            id: self.counter.fetch_add(1, Ordering::Relaxed),
            date: 0,
        };
        let pinned = filter.pinned_instrument();
        let entry = Arc::new(SubscriptionEntry {
            id,
            name: name.to_string(),
            kind: SubscriptionKind::Order,
            filter,
            handler,
        });

        let mut inner = self.inner.lock();
        let groups = inner
            .by_subscriber
            .entry(handler)
            .or_insert_with(|| (0..SubscriptionKind::COUNT).map(|_| Default::default()).collect());
        let group = &mut groups[SubscriptionKind::Order.index()];
        match pinned {
            Some(instrument) => {
                group
                    .by_instrument
                    .entry(instrument)
                    .or_default()
                    .insert(id, Arc::clone(&entry));
            }
            None => {
                group.general.insert(id, Arc::clone(&entry));
            }
        }
        inner.by_handler.entry(handler).or_default().push(entry);
        debug!(subscription = %id, handler = %handler, pinned = pinned.is_some(), "subscription added");
        id
    }

    /// Drops every subscription of `handler`. Filters are released outside
    /// the lock.
    pub fn remove_subscriptions(&self, handler: SubscriberId) {
        let removed = {
            let mut inner = self.inner.lock();
            inner.by_subscriber.remove(&handler);
            inner.by_handler.remove(&handler)
        };
        if let Some(removed) = removed {
            debug!(handler = %handler, count = removed.len(), "subscriptions removed");
        }
    }

    /// Subscribers whose composite predicate matches `order`.
    ///
    /// Per subscriber: scan the order's instrument bucket in id order and
    /// stop at the first match; only when no bucket entry matched fall
    /// through to the general set. At most one entry per subscriber wins.
    pub fn subscribers_for(&self, order: &OrderEntry) -> Vec<SubscriberId> {
        let instrument = order.instrument_id();
        let mut matched = Vec::new();

        let inner = self.inner.lock();
        for (handler, groups) in &inner.by_subscriber {
            let group = &groups[SubscriptionKind::Order.index()];

            let mut found = false;
            if let Some(bucket) = group.by_instrument.get(&instrument) {
                for entry in bucket.values() {
                    debug_assert!(entry.kind == SubscriptionKind::Order);
                    if entry.filter.matches(order, &self.wide) {
                        matched.push(*handler);
                        found = true;
                        break;
                    }
                }
            }

            if !found {
                for entry in group.general.values() {
                    debug_assert!(entry.kind == SubscriptionKind::Order);
                    if entry.filter.matches(order, &self.wide) {
                        matched.push(*handler);
                        break;
                    }
                }
            }
        }
        matched
    }

    pub fn subscription_count(&self) -> usize {
        self.inner
            .lock()
            .by_handler
            .values()
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::IdGenerator;
    use crate::model::{InstrumentEntry, LazyRef, Side};
    use crate::subscription::filter::{EnumPredicate, OrderPredicate};

    struct Fixture {
        wide: Arc<WideDataStorage>,
        manager: SubscriptionManager,
        instr_x: IdT,
        instr_y: IdT,
        instr_z: IdT,
    }

    fn fixture() -> Fixture {
        let wide = Arc::new(WideDataStorage::new(Arc::new(IdGenerator::new(20260801))));
        let add = |symbol: &str| {
            wide.add_instrument(InstrumentEntry {
                symbol: symbol.into(),
                ..Default::default()
            })
        };
        let instr_x = add("XXX");
        let instr_y = add("YYY");
        let instr_z = add("ZZZ");
        Fixture {
            manager: SubscriptionManager::new(Arc::clone(&wide)),
            wide,
            instr_x,
            instr_y,
            instr_z,
        }
    }

    fn order_for(instrument: IdT) -> OrderEntry {
        let mut order = OrderEntry::default();
        order.instrument = LazyRef::new(instrument);
        order
    }

    fn handler(id: u64) -> SubscriberId {
        IdT::new(id, 20260801)
    }

    #[test]
    fn test_disjoint_pins() {
        let fx = fixture();
        let a = handler(1);
        let b = handler(2);
        fx.manager
            .add_subscription("sub-x", OrderFilter::pinned_to(fx.instr_x), a);
        fx.manager
            .add_subscription("sub-y", OrderFilter::pinned_to(fx.instr_y), b);

        assert_eq!(fx.manager.subscribers_for(&order_for(fx.instr_x)), vec![a]);
        assert_eq!(fx.manager.subscribers_for(&order_for(fx.instr_y)), vec![b]);
        assert!(fx.manager.subscribers_for(&order_for(fx.instr_z)).is_empty());
    }

    #[test]
    fn test_general_fallback_matches_any_instrument() {
        let fx = fixture();
        let a = handler(1);
        fx.manager.add_subscription("all", OrderFilter::new(), a);

        for instrument in [fx.instr_x, fx.instr_y, fx.instr_z] {
            assert_eq!(fx.manager.subscribers_for(&order_for(instrument)), vec![a]);
        }
    }

    #[test]
    fn test_at_most_one_notification_per_subscriber() {
        let fx = fixture();
        let a = handler(1);
        // Three subscriptions that all match the same order.
        fx.manager
            .add_subscription("pin-1", OrderFilter::pinned_to(fx.instr_x), a);
        fx.manager
            .add_subscription("pin-2", OrderFilter::pinned_to(fx.instr_x), a);
        fx.manager.add_subscription("general", OrderFilter::new(), a);

        let matched = fx.manager.subscribers_for(&order_for(fx.instr_x));
        assert_eq!(matched, vec![a]);
    }

    #[test]
    fn test_bucket_miss_falls_through_to_general() {
        let fx = fixture();
        let a = handler(1);

        // Pinned subscription whose scalar predicate rejects the order.
        let mut selective = OrderFilter::pinned_to(fx.instr_x);
        selective.push(OrderPredicate::Side(EnumPredicate::Equal(Side::Sell)));
        fx.manager.add_subscription("pinned-sell", selective, a);
        fx.manager.add_subscription("general", OrderFilter::new(), a);

        let mut buy = order_for(fx.instr_x);
        buy.side = Side::Buy;
        // Bucket existed but nothing in it matched, so general applies.
        assert_eq!(fx.manager.subscribers_for(&buy), vec![a]);
    }

    #[test]
    fn test_remove_subscriptions_is_bulk() {
        let fx = fixture();
        let a = handler(1);
        let b = handler(2);
        fx.manager
            .add_subscription("sub-x", OrderFilter::pinned_to(fx.instr_x), a);
        fx.manager.add_subscription("general", OrderFilter::new(), a);
        fx.manager
            .add_subscription("keep", OrderFilter::pinned_to(fx.instr_x), b);
        assert_eq!(fx.manager.subscription_count(), 3);

        fx.manager.remove_subscriptions(a);
        assert_eq!(fx.manager.subscription_count(), 1);
        assert_eq!(fx.manager.subscribers_for(&order_for(fx.instr_x)), vec![b]);

        // Removing an unknown handler is a no-op.
        fx.manager.remove_subscriptions(handler(99));
    }
}
