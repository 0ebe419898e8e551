// Transaction dependency graph.
//
// Tracks transactions, their read/write sets and the parent/child edges
// induced by overlapping sets. For any two transactions whose sets intersect,
// the one with the smaller key is an ancestor of the other, so executing only
// root-frontier nodes yields insertion order for conflicting work and full
// concurrency for disjoint work. Keys are assigned monotonically, which rules
// out cycles by construction.
//
// Nodes live in an arena of reusable slots; edges are slot-index sets, so
// there are no owning pointer cycles to break on teardown.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

use crate::common::TransactionId;

use super::types::{ObjectRef, ObjectSet};

struct Node<V> {
    key: TransactionId,
    /// Taken by `claim_next` while the node keeps blocking its children.
    value: Option<V>,
    depends_on: ObjectSet,
    parents: BTreeSet<u32>,
    children: BTreeSet<u32>,
}

/// Dependency DAG over values keyed by monotonic transaction ids.
///
/// The root frontier (nodes with no remaining parents) is kept as a sorted
/// set and enumerated in ascending key order. `ready_delta` out-parameters
/// report how many nodes became roots during an operation, so the caller can
/// wake executors without re-scanning.
pub struct DependencyGraph<V> {
    nodes: Vec<Option<Node<V>>>,
    free: Vec<u32>,
    keys: HashMap<TransactionId, u32>,
    /// For each declared object, the ordered set of transactions using it.
    objects: HashMap<ObjectRef, BTreeSet<TransactionId>>,
    roots: BTreeSet<TransactionId>,
    cursor: Option<TransactionId>,
}

impl<V> DependencyGraph<V> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            keys: HashMap::new(),
            objects: HashMap::new(),
            roots: BTreeSet::new(),
            cursor: None,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Inserts a node. Every existing node that declared one of `deps`
    /// becomes a parent. Returns false if the key is already present.
    /// `ready_delta` is bumped when the new node lands on the root frontier.
    pub fn add(
        &mut self,
        key: TransactionId,
        value: V,
        deps: &ObjectSet,
        ready_delta: &mut u32,
    ) -> bool {
        if self.keys.contains_key(&key) {
            return false;
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.nodes.push(None);
                (self.nodes.len() - 1) as u32
            }
        };

        let mut parents = BTreeSet::new();
        for object in deps.iter() {
            let users = self.objects.entry(*object).or_default();
            for user in users.range(..key) {
                let parent_slot = self.keys[user];
                parents.insert(parent_slot);
            }
            users.insert(key);
        }
        for &parent_slot in &parents {
            self.nodes[parent_slot as usize]
                .as_mut()
                .expect("parent slot occupied")
                .children
                .insert(slot);
        }

        if parents.is_empty() {
            self.roots.insert(key);
            *ready_delta += 1;
        }

        self.nodes[slot as usize] = Some(Node {
            key,
            value: Some(value),
            depends_on: *deps,
            parents,
            children: BTreeSet::new(),
        });
        self.keys.insert(key, slot);
        true
    }

    /// Removes a node and promotes any child whose last parent this was.
    /// Works for non-root nodes as well. Returns false if the key is absent.
    pub fn remove(&mut self, key: TransactionId, ready_delta: &mut u32) -> bool {
        let slot = match self.keys.remove(&key) {
            Some(slot) => slot,
            None => return false,
        };
        let node = self.nodes[slot as usize].take().expect("slot occupied");
        self.roots.remove(&key);

        for object in node.depends_on.iter() {
            if let Some(users) = self.objects.get_mut(object) {
                users.remove(&key);
                if users.is_empty() {
                    self.objects.remove(object);
                }
            }
        }

        for &child_slot in &node.children {
            let child = self.nodes[child_slot as usize]
                .as_mut()
                .expect("child slot occupied");
            child.parents.remove(&slot);
            if child.parents.is_empty() {
                self.roots.insert(child.key);
                *ready_delta += 1;
            }
        }

        for &parent_slot in &node.parents {
            self.nodes[parent_slot as usize]
                .as_mut()
                .expect("parent slot occupied")
                .children
                .remove(&slot);
        }

        self.free.push(slot);
        true
    }

    /// Keys of the direct parents, in ascending order.
    pub fn parents(&self, key: TransactionId) -> Option<BTreeSet<TransactionId>> {
        let slot = *self.keys.get(&key)?;
        let node = self.nodes[slot as usize].as_ref()?;
        Some(
            node.parents
                .iter()
                .map(|&p| self.nodes[p as usize].as_ref().expect("parent occupied").key)
                .collect(),
        )
    }

    /// Keys of the direct children, in ascending order.
    pub fn children(&self, key: TransactionId) -> Option<BTreeSet<TransactionId>> {
        let slot = *self.keys.get(&key)?;
        let node = self.nodes[slot as usize].as_ref()?;
        Some(
            node.children
                .iter()
                .map(|&c| self.nodes[c as usize].as_ref().expect("child occupied").key)
                .collect(),
        )
    }

    /// First root strictly greater than `after` (or the smallest root).
    /// Pure query; does not touch the instance cursor.
    pub fn next_after(&self, after: Option<TransactionId>) -> Option<TransactionId> {
        match after {
            None => self.roots.iter().next().copied(),
            Some(key) => self.roots.range((Excluded(key), Unbounded)).next().copied(),
        }
    }

    pub fn value(&self, key: TransactionId) -> Option<&V> {
        let slot = *self.keys.get(&key)?;
        self.nodes[slot as usize].as_ref()?.value.as_ref()
    }

    /// Claims the next unclaimed root after the instance cursor, wrapping to
    /// the smallest root once. The value moves out; the node stays and keeps
    /// blocking its children until `remove`.
    pub fn claim_next(&mut self) -> Option<(TransactionId, V)> {
        let scan: Vec<TransactionId> = match self.cursor {
            None => self.roots.iter().copied().collect(),
            Some(cursor) => self
                .roots
                .range((Excluded(cursor), Unbounded))
                .chain(self.roots.range(..=cursor))
                .copied()
                .collect(),
        };
        for key in scan {
            let slot = self.keys[&key];
            let node = self.nodes[slot as usize].as_mut().expect("root occupied");
            if let Some(value) = node.value.take() {
                self.cursor = Some(key);
                return Some((key, value));
            }
        }
        None
    }

    /// Key the cursor rests on, if that node still exists.
    pub fn current(&self) -> Option<TransactionId> {
        self.cursor.filter(|key| self.keys.contains_key(key))
    }

    pub fn is_current_valid(&self) -> bool {
        self.current().is_some()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.keys.clear();
        self.objects.clear();
        self.roots.clear();
        self.cursor = None;
    }
}

impl<V> Default for DependencyGraph<V> {
    fn default() -> Self {
        Self::new()
    }
}
