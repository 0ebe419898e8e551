// Wide-data store: shared reference data resolved lazily from orders.
//
// Values are immutable once published; readers hold `Arc` clones. Lazy
// references resolve at most once through a one-time cell with
// acquire/release ordering.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::common::{IdGenerator, SourceId};

use super::entities::{
    AccountEntry, ClearingEntry, ExecutionList, ExecutionRef, InstrumentEntry, RawDataEntry,
};

/// Typed concurrent maps from `SourceId` to shared immutable values.
///
/// `add_*` assigns a fresh id from the session generator and publishes the
/// value; `restore_*` re-publishes a decoded value under its original id
/// during log replay.
pub struct WideDataStorage {
    ids: Arc<IdGenerator>,
    instruments: DashMap<SourceId, Arc<InstrumentEntry>>,
    accounts: DashMap<SourceId, Arc<AccountEntry>>,
    clearings: DashMap<SourceId, Arc<ClearingEntry>>,
    strings: DashMap<SourceId, Arc<String>>,
    raw_data: DashMap<SourceId, Arc<RawDataEntry>>,
    executions: DashMap<SourceId, Arc<ExecutionList>>,
}

impl WideDataStorage {
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self {
            ids,
            instruments: DashMap::new(),
            accounts: DashMap::new(),
            clearings: DashMap::new(),
            strings: DashMap::new(),
            raw_data: DashMap::new(),
            executions: DashMap::new(),
        }
    }

    pub fn add_instrument(&self, mut value: InstrumentEntry) -> SourceId {
        let id = self.ids.next_id();
        value.id = id;
        self.instruments.insert(id, Arc::new(value));
        id
    }

    pub fn add_account(&self, mut value: AccountEntry) -> SourceId {
        let id = self.ids.next_id();
        value.id = id;
        self.accounts.insert(id, Arc::new(value));
        id
    }

    pub fn add_clearing(&self, mut value: ClearingEntry) -> SourceId {
        let id = self.ids.next_id();
        value.id = id;
        self.clearings.insert(id, Arc::new(value));
        id
    }

    pub fn add_string(&self, value: impl Into<String>) -> SourceId {
        let id = self.ids.next_id();
        self.strings.insert(id, Arc::new(value.into()));
        id
    }

    pub fn add_raw_data(&self, mut value: RawDataEntry) -> SourceId {
        let id = self.ids.next_id();
        value.id = id;
        self.raw_data.insert(id, Arc::new(value));
        id
    }

    pub fn add_execution_list(&self, value: ExecutionList) -> SourceId {
        let id = self.ids.next_id();
        self.executions.insert(id, Arc::new(value));
        id
    }

    pub fn instrument(&self, id: SourceId) -> Option<Arc<InstrumentEntry>> {
        self.instruments.get(&id).map(|v| Arc::clone(&v))
    }

    pub fn account(&self, id: SourceId) -> Option<Arc<AccountEntry>> {
        self.accounts.get(&id).map(|v| Arc::clone(&v))
    }

    pub fn clearing(&self, id: SourceId) -> Option<Arc<ClearingEntry>> {
        self.clearings.get(&id).map(|v| Arc::clone(&v))
    }

    pub fn string(&self, id: SourceId) -> Option<Arc<String>> {
        self.strings.get(&id).map(|v| Arc::clone(&v))
    }

    pub fn raw_data(&self, id: SourceId) -> Option<Arc<RawDataEntry>> {
        self.raw_data.get(&id).map(|v| Arc::clone(&v))
    }

    pub fn execution_list(&self, id: SourceId) -> Option<Arc<ExecutionList>> {
        self.executions.get(&id).map(|v| Arc::clone(&v))
    }

    /// Appends one execution reference to a stored list. The stored value is
    /// replaced wholesale; lazy references resolved before the append keep
    /// their earlier snapshot.
    pub fn append_execution(&self, list_id: SourceId, exec: ExecutionRef) {
        let mut entry = self
            .executions
            .entry(list_id)
            .or_insert_with(|| Arc::new(ExecutionList::new()));
        let mut list = entry.value().as_ref().clone();
        list.push(exec);
        *entry.value_mut() = Arc::new(list);
    }

    // Restore paths used by the record-log loader. Ids come from the log.

    pub fn restore_instrument(&self, value: InstrumentEntry) {
        self.instruments.insert(value.id, Arc::new(value));
    }

    pub fn restore_account(&self, value: AccountEntry) {
        self.accounts.insert(value.id, Arc::new(value));
    }

    pub fn restore_clearing(&self, value: ClearingEntry) {
        self.clearings.insert(value.id, Arc::new(value));
    }

    pub fn restore_string(&self, id: SourceId, value: String) {
        self.strings.insert(id, Arc::new(value));
    }

    pub fn restore_raw_data(&self, value: RawDataEntry) {
        self.raw_data.insert(value.id, Arc::new(value));
    }

    pub fn restore_execution_list(&self, id: SourceId, value: ExecutionList) {
        self.executions.insert(id, Arc::new(value));
    }
}

/// Families of values resolvable through the wide store.
pub trait WideValue: Sized + Send + Sync {
    fn fetch(store: &WideDataStorage, id: SourceId) -> Option<Arc<Self>>;
}

impl WideValue for InstrumentEntry {
    fn fetch(store: &WideDataStorage, id: SourceId) -> Option<Arc<Self>> {
        store.instrument(id)
    }
}

impl WideValue for AccountEntry {
    fn fetch(store: &WideDataStorage, id: SourceId) -> Option<Arc<Self>> {
        store.account(id)
    }
}

impl WideValue for ClearingEntry {
    fn fetch(store: &WideDataStorage, id: SourceId) -> Option<Arc<Self>> {
        store.clearing(id)
    }
}

impl WideValue for String {
    fn fetch(store: &WideDataStorage, id: SourceId) -> Option<Arc<Self>> {
        store.string(id)
    }
}

impl WideValue for RawDataEntry {
    fn fetch(store: &WideDataStorage, id: SourceId) -> Option<Arc<Self>> {
        store.raw_data(id)
    }
}

impl WideValue for ExecutionList {
    fn fetch(store: &WideDataStorage, id: SourceId) -> Option<Arc<Self>> {
        store.execution_list(id)
    }
}

/// Lazy handle to a wide-data value.
///
/// Carries the source id everywhere and resolves the shared value at most
/// once per handle. Clones copy the id together with any already-resolved
/// value, so a resolved handle stays resolved across clones.
#[derive(Debug, Clone)]
pub struct LazyRef<T: WideValue> {
    id: SourceId,
    cell: OnceCell<Arc<T>>,
}

impl<T: WideValue> LazyRef<T> {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            cell: OnceCell::new(),
        }
    }

    /// Handle that references nothing; `get` always returns `None`.
    pub fn unset() -> Self {
        Self::new(SourceId::default())
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn is_set(&self) -> bool {
        self.id.is_valid()
    }

    /// Resolves the value, loading it from the store on first use.
    pub fn get(&self, store: &WideDataStorage) -> Option<&Arc<T>> {
        if !self.id.is_valid() {
            return None;
        }
        self.cell
            .get_or_try_init(|| T::fetch(store, self.id).ok_or(()))
            .ok()
    }

    /// The value if some earlier `get` already resolved it.
    pub fn resolved(&self) -> Option<&Arc<T>> {
        self.cell.get()
    }
}

impl<T: WideValue> Default for LazyRef<T> {
    fn default() -> Self {
        Self::unset()
    }
}
