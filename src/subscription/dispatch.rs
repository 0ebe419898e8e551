// Event dispatcher: glue between the subscription index and the layer.

use std::sync::Arc;

use crate::model::OrderEntry;

use super::layer::SubscriptionLayer;
use super::manager::SubscriptionManager;

/// Routes one order event through the subscription matcher and broadcasts
/// to the winners.
///
/// Matching happens under the manager's lock; the broadcast runs after the
/// lock is released.
pub struct EventDispatcher {
    subscriptions: Arc<SubscriptionManager>,
    layer: Arc<SubscriptionLayer>,
}

impl EventDispatcher {
    pub fn new(subscriptions: Arc<SubscriptionManager>, layer: Arc<SubscriptionLayer>) -> Self {
        Self {
            subscriptions,
            layer,
        }
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionManager> {
        &self.subscriptions
    }

    /// Dispatches a modified order; returns the number of notified
    /// subscribers.
    pub fn dispatch_order(&self, order: &OrderEntry) -> usize {
        let matched = self.subscriptions.subscribers_for(order);
        self.layer.process(order, &matched)
    }
}
