// Order storage: the authoritative in-memory order set.

use dashmap::DashMap;

use crate::common::IdT;
use crate::model::{OrderEntry, OrderStatus};

/// Sharded store of all orders seen this session, keyed by the
/// engine-assigned order id, with a client-order-id uniqueness index.
///
/// Orders are never deleted; terminal orders stay queryable. Mutation goes
/// through `update`, which holds only the owning shard lock; the dependency
/// graph keeps two executors from updating the same order concurrently.
pub struct OrderStorage {
    orders: DashMap<IdT, OrderEntry>,
    by_cl_order_id: DashMap<Vec<u8>, IdT>,
}

impl OrderStorage {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            by_cl_order_id: DashMap::new(),
        }
    }

    /// Inserts a new order under its assigned id. `cl_key` is the raw client
    /// order id; returns false (and stores nothing) when that key is already
    /// taken by another order.
    pub fn insert(&self, cl_key: Option<Vec<u8>>, order: OrderEntry) -> bool {
        debug_assert!(order.order_id.is_valid());
        if let Some(key) = cl_key {
            match self.by_cl_order_id.entry(key) {
                dashmap::mapref::entry::Entry::Occupied(_) => return false,
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(order.order_id);
                }
            }
        }
        self.orders.insert(order.order_id, order);
        true
    }

    /// Re-inserts a decoded order during log replay, rebuilding the client
    /// order id index. Replay overwrites: later records win.
    pub fn restore(&self, cl_key: Option<Vec<u8>>, order: OrderEntry) {
        if let Some(key) = cl_key {
            self.by_cl_order_id.insert(key, order.order_id);
        }
        self.orders.insert(order.order_id, order);
    }

    pub fn contains(&self, id: IdT) -> bool {
        self.orders.contains_key(&id)
    }

    /// Snapshot of an order.
    pub fn get(&self, id: IdT) -> Option<OrderEntry> {
        self.orders.get(&id).map(|entry| entry.clone())
    }

    pub fn status(&self, id: IdT) -> Option<OrderStatus> {
        self.orders.get(&id).map(|entry| entry.status)
    }

    pub fn locate_by_cl_order_id(&self, key: &[u8]) -> Option<IdT> {
        self.by_cl_order_id.get(key).map(|entry| *entry)
    }

    /// Mutates an order in place under its shard lock. `f` must not touch
    /// the storage again.
    pub fn update<R>(&self, id: IdT, f: impl FnOnce(&mut OrderEntry) -> R) -> Option<R> {
        self.orders.get_mut(&id).map(|mut entry| f(entry.value_mut()))
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

impl Default for OrderStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: u64) -> OrderEntry {
        let mut order = OrderEntry::default();
        order.order_id = IdT::new(id, 1);
        order.status = OrderStatus::New;
        order
    }

    #[test]
    fn test_insert_and_lookup() {
        let storage = OrderStorage::new();
        assert!(storage.insert(Some(b"CL-1".to_vec()), order(1)));
        assert!(storage.contains(IdT::new(1, 1)));
        assert_eq!(storage.locate_by_cl_order_id(b"CL-1"), Some(IdT::new(1, 1)));
        assert_eq!(storage.locate_by_cl_order_id(b"CL-2"), None);
    }

    #[test]
    fn test_duplicate_client_order_id_is_refused() {
        let storage = OrderStorage::new();
        assert!(storage.insert(Some(b"CL-1".to_vec()), order(1)));
        assert!(!storage.insert(Some(b"CL-1".to_vec()), order(2)));
        // First mapping and order survive; second order is not stored.
        assert_eq!(storage.locate_by_cl_order_id(b"CL-1"), Some(IdT::new(1, 1)));
        assert!(!storage.contains(IdT::new(2, 1)));
    }

    #[test]
    fn test_update_in_place() {
        let storage = OrderStorage::new();
        storage.insert(None, order(1));
        let status = storage
            .update(IdT::new(1, 1), |entry| {
                entry.status = OrderStatus::Canceled;
                entry.status
            })
            .unwrap();
        assert_eq!(status, OrderStatus::Canceled);
        assert_eq!(storage.status(IdT::new(1, 1)), Some(OrderStatus::Canceled));
    }
}
