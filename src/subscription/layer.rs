// Subscription layer: the stateless broadcaster.

use tracing::{debug, info, warn};

use crate::common::SubscriberId;
use crate::model::OrderEntry;

/// Broadcasts one matched-order event to its subscribers.
///
/// Validates each subscriber id and records the notification; invalid ids
/// are logged and skipped. Never fails; broadcast problems must not abort
/// an executing transaction.
pub struct SubscriptionLayer;

impl SubscriptionLayer {
    pub fn new() -> Self {
        Self
    }

    /// Notifies every matched subscriber about `order`. Returns how many
    /// notifications were actually delivered.
    pub fn process(&self, order: &OrderEntry, subscribers: &[SubscriberId]) -> usize {
        if subscribers.is_empty() {
            debug!(order = %order.order_id, "no subscribers matched");
            return 0;
        }

        let mut delivered = 0;
        for subscriber in subscribers {
            if !subscriber.is_valid() {
                warn!(order = %order.order_id, "invalid subscriber id, skipping");
                continue;
            }
            info!(
                subscriber = %subscriber,
                order = %order.order_id,
                status = ?order.status,
                "subscriber notified"
            );
            delivered += 1;
        }
        delivered
    }
}

impl Default for SubscriptionLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::IdT;

    #[test]
    fn test_invalid_subscribers_are_skipped() {
        let layer = SubscriptionLayer::new();
        let order = OrderEntry::default();
        let subscribers = vec![IdT::new(1, 1), IdT::default(), IdT::new(2, 1)];
        assert_eq!(layer.process(&order, &subscribers), 2);
    }

    #[test]
    fn test_empty_broadcast_is_a_no_op() {
        let layer = SubscriptionLayer::new();
        assert_eq!(layer.process(&OrderEntry::default(), &[]), 0);
    }
}
