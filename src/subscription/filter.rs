// Conjunctive order-filter AST.
//
// One sum type per field family instead of a virtual-dispatch class per
// field: evaluation is a `match`, and the pinned-instrument query is a
// structural walk for an instrument-id equality conjunct.

use std::collections::BTreeSet;

use regex::Regex;

use crate::common::IdT;
use crate::model::{
    AccountEntry, AccountType, Capacity, ClearingEntry, Currency, InstrumentEntry, OrderEntry,
    OrderStatus, OrderType, SettlType, Side, TimeInForce, WideDataStorage,
};

/// Predicate over a string field.
#[derive(Debug, Clone)]
pub enum StringPredicate {
    Equal(String),
    InSet(BTreeSet<String>),
    Match(Regex),
}

impl StringPredicate {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            StringPredicate::Equal(expected) => value == expected,
            StringPredicate::InSet(values) => values.contains(value),
            StringPredicate::Match(pattern) => pattern.is_match(value),
        }
    }
}

/// Predicate over an ordered scalar field (prices, quantities, timestamps,
/// id dates).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumPredicate<T> {
    Equal(T),
    Less(T),
    Greater(T),
    LessOrEqual(T),
    GreaterOrEqual(T),
    InRange(T, T),
}

impl<T: PartialOrd + Copy> NumPredicate<T> {
    pub fn matches(&self, value: T) -> bool {
        match *self {
            NumPredicate::Equal(expected) => value == expected,
            NumPredicate::Less(bound) => value < bound,
            NumPredicate::Greater(bound) => value > bound,
            NumPredicate::LessOrEqual(bound) => value <= bound,
            NumPredicate::GreaterOrEqual(bound) => value >= bound,
            NumPredicate::InRange(lo, hi) => value >= lo && value <= hi,
        }
    }

    /// The concrete value this predicate pins, for equality predicates only.
    pub fn equality_value(&self) -> Option<T> {
        match *self {
            NumPredicate::Equal(value) => Some(value),
            _ => None,
        }
    }
}

/// Predicate over an enum field.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumPredicate<T: Ord + Copy> {
    Equal(T),
    InSet(BTreeSet<T>),
}

impl<T: Ord + Copy> EnumPredicate<T> {
    pub fn matches(&self, value: T) -> bool {
        match self {
            EnumPredicate::Equal(expected) => value == *expected,
            EnumPredicate::InSet(values) => values.contains(&value),
        }
    }
}

/// Predicate over the date half of an `IdT`.
pub type DatePredicate = NumPredicate<u32>;

/// Predicate over a composite identifier: an optional full-id equality leaf
/// plus any number of date predicates, all conjoined.
#[derive(Debug, Clone, Default)]
pub struct IdPredicate {
    id_equal: Option<IdT>,
    dates: Vec<DatePredicate>,
}

impl IdPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the full-id equality leaf; at most one may be installed.
    pub fn set_id_equal(&mut self, id: IdT) {
        debug_assert!(self.id_equal.is_none(), "id equality leaf already set");
        self.id_equal = Some(id);
    }

    pub fn add_date(&mut self, predicate: DatePredicate) {
        self.dates.push(predicate);
    }

    pub fn is_empty(&self) -> bool {
        self.id_equal.is_none() && self.dates.is_empty()
    }

    pub fn matches(&self, value: IdT) -> bool {
        if let Some(expected) = self.id_equal {
            if value != expected {
                return false;
            }
        }
        self.dates.iter().all(|p| p.matches(value.date))
    }

    /// Composes the concrete id this predicate pins.
    ///
    /// The id half comes from the equality leaf; the date half is taken only
    /// when exactly one date predicate exists and it is an equality. With
    /// zero or several date predicates nothing is pinned; the historical
    /// single-predicate rule, kept as documented behavior.
    pub fn pinned_value(&self) -> Option<IdT> {
        let base = self.id_equal?;
        if self.dates.len() != 1 {
            return None;
        }
        let date = self.dates[0].equality_value()?;
        Some(IdT::new(base.id, date))
    }
}

/// Per-field predicates over an order; conjoined inside an `OrderFilter`.
#[derive(Debug, Clone)]
pub enum OrderPredicate {
    Status(EnumPredicate<OrderStatus>),
    Side(EnumPredicate<Side>),
    OrdType(EnumPredicate<OrderType>),
    Tif(EnumPredicate<TimeInForce>),
    SettlType(EnumPredicate<SettlType>),
    Capacity(EnumPredicate<Capacity>),
    Currency(EnumPredicate<Currency>),
    Source(StringPredicate),
    Destination(StringPredicate),
    Price(NumPredicate<f64>),
    StopPx(NumPredicate<f64>),
    AvgPx(NumPredicate<f64>),
    DayAvgPx(NumPredicate<f64>),
    MinQty(NumPredicate<u32>),
    OrderQty(NumPredicate<u32>),
    LeavesQty(NumPredicate<u32>),
    CumQty(NumPredicate<u32>),
    DayOrderQty(NumPredicate<u32>),
    DayCumQty(NumPredicate<u32>),
    ExpireTime(NumPredicate<u64>),
    SettlDate(NumPredicate<u64>),
    CreationTime(NumPredicate<u64>),
    LastUpdateTime(NumPredicate<u64>),
}

impl OrderPredicate {
    pub fn matches(&self, order: &OrderEntry, store: &WideDataStorage) -> bool {
        match self {
            OrderPredicate::Status(p) => p.matches(order.status),
            OrderPredicate::Side(p) => p.matches(order.side),
            OrderPredicate::OrdType(p) => p.matches(order.ord_type),
            OrderPredicate::Tif(p) => p.matches(order.tif),
            OrderPredicate::SettlType(p) => p.matches(order.settl_type),
            OrderPredicate::Capacity(p) => p.matches(order.capacity),
            OrderPredicate::Currency(p) => p.matches(order.currency),
            // Unresolvable session strings fail the predicate rather than
            // the whole lookup.
            OrderPredicate::Source(p) => order
                .source
                .get(store)
                .map(|s| p.matches(s))
                .unwrap_or(false),
            OrderPredicate::Destination(p) => order
                .destination
                .get(store)
                .map(|s| p.matches(s))
                .unwrap_or(false),
            OrderPredicate::Price(p) => p.matches(order.price),
            OrderPredicate::StopPx(p) => p.matches(order.stop_px),
            OrderPredicate::AvgPx(p) => p.matches(order.avg_px),
            OrderPredicate::DayAvgPx(p) => p.matches(order.day_avg_px),
            OrderPredicate::MinQty(p) => p.matches(order.min_qty),
            OrderPredicate::OrderQty(p) => p.matches(order.order_qty),
            OrderPredicate::LeavesQty(p) => p.matches(order.leaves_qty),
            OrderPredicate::CumQty(p) => p.matches(order.cum_qty),
            OrderPredicate::DayOrderQty(p) => p.matches(order.day_order_qty),
            OrderPredicate::DayCumQty(p) => p.matches(order.day_cum_qty),
            OrderPredicate::ExpireTime(p) => p.matches(order.expire_time),
            OrderPredicate::SettlDate(p) => p.matches(order.settl_date),
            OrderPredicate::CreationTime(p) => p.matches(order.creation_time),
            OrderPredicate::LastUpdateTime(p) => p.matches(order.last_update_time),
        }
    }
}

/// Conjunctive filter over the order's instrument.
#[derive(Debug, Clone, Default)]
pub struct InstrumentFilter {
    pub id: Option<IdPredicate>,
    pub symbol: Option<StringPredicate>,
    pub security_id: Option<StringPredicate>,
    pub security_id_source: Option<StringPredicate>,
}

impl InstrumentFilter {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.symbol.is_none()
            && self.security_id.is_none()
            && self.security_id_source.is_none()
    }

    pub fn matches(&self, instrument: &InstrumentEntry) -> bool {
        if let Some(p) = &self.id {
            if !p.matches(instrument.id) {
                return false;
            }
        }
        if let Some(p) = &self.symbol {
            if !p.matches(&instrument.symbol) {
                return false;
            }
        }
        if let Some(p) = &self.security_id {
            if !p.matches(&instrument.security_id) {
                return false;
            }
        }
        if let Some(p) = &self.security_id_source {
            if !p.matches(&instrument.security_id_source) {
                return false;
            }
        }
        true
    }

    /// The instrument this filter pins, via the id-equality leaf.
    pub fn pinned_instrument(&self) -> Option<IdT> {
        self.id.as_ref()?.pinned_value()
    }
}

/// Conjunctive filter over the order's account.
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub id: Option<IdPredicate>,
    pub account: Option<StringPredicate>,
    pub firm: Option<StringPredicate>,
    pub account_type: Option<EnumPredicate<AccountType>>,
}

impl AccountFilter {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.account.is_none()
            && self.firm.is_none()
            && self.account_type.is_none()
    }

    pub fn matches(&self, account: &AccountEntry) -> bool {
        if let Some(p) = &self.id {
            if !p.matches(account.id) {
                return false;
            }
        }
        if let Some(p) = &self.account {
            if !p.matches(&account.account) {
                return false;
            }
        }
        if let Some(p) = &self.firm {
            if !p.matches(&account.firm) {
                return false;
            }
        }
        if let Some(p) = &self.account_type {
            if !p.matches(account.account_type) {
                return false;
            }
        }
        true
    }
}

/// Conjunctive filter over the order's clearing firm.
#[derive(Debug, Clone, Default)]
pub struct ClearingFilter {
    pub id: Option<IdPredicate>,
    pub firm: Option<StringPredicate>,
}

impl ClearingFilter {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.firm.is_none()
    }

    pub fn matches(&self, clearing: &ClearingEntry) -> bool {
        if let Some(p) = &self.id {
            if !p.matches(clearing.id) {
                return false;
            }
        }
        if let Some(p) = &self.firm {
            if !p.matches(&clearing.firm) {
                return false;
            }
        }
        true
    }
}

/// Composite subscription predicate: entity filters plus scalar predicates,
/// all conjoined. Owned by its subscription entry.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub instrument: InstrumentFilter,
    pub account: AccountFilter,
    pub clearing: ClearingFilter,
    pub predicates: Vec<OrderPredicate>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter pinned to one instrument by id equality.
    pub fn pinned_to(instrument: IdT) -> Self {
        let mut id = IdPredicate::new();
        id.set_id_equal(instrument);
        id.add_date(DatePredicate::Equal(instrument.date));
        Self {
            instrument: InstrumentFilter {
                id: Some(id),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn push(&mut self, predicate: OrderPredicate) -> &mut Self {
        self.predicates.push(predicate);
        self
    }

    pub fn matches(&self, order: &OrderEntry, store: &WideDataStorage) -> bool {
        if !self.instrument.is_empty() {
            match order.instrument.get(store) {
                Some(instrument) => {
                    if !self.instrument.matches(instrument) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if !self.account.is_empty() {
            match order.account.get(store) {
                Some(account) => {
                    if !self.account.matches(account) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if !self.clearing.is_empty() {
            match order.clearing.get(store) {
                Some(clearing) => {
                    if !self.clearing.matches(clearing) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        self.predicates.iter().all(|p| p.matches(order, store))
    }

    /// The instrument key this filter pins, when its instrument sub-filter
    /// carries an id-equality conjunct.
    pub fn pinned_instrument(&self) -> Option<IdT> {
        self.instrument.pinned_instrument()
    }
}
