// Price-time priority book for one instrument.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, VecDeque};

use tracing::warn;

use crate::common::{DateTime, IdT, Price, Quantity};
use crate::model::{OrderEntry, OrderType, Side};

use super::storage::OrderStorage;

/// Total-ordered price key for book levels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Px(Price);

impl Eq for Px {}

impl PartialOrd for Px {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Px {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.0.total_cmp(&other.0)
    }
}

/// One fill leg produced while matching an incoming order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub maker_order_id: IdT,
    pub price: Price,
    pub quantity: Quantity,
}

/// Resting orders of one instrument in price-time priority.
///
/// Levels map price to a FIFO of order ids; order state itself lives in the
/// order storage. Callers serialize access per instrument (the book set
/// wraps each book in a mutex).
pub struct OrderBook {
    instrument: IdT,
    bids: BTreeMap<Px, VecDeque<IdT>>,
    asks: BTreeMap<Px, VecDeque<IdT>>,
}

impl OrderBook {
    pub fn new(instrument: IdT) -> Self {
        Self {
            instrument,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    pub fn instrument(&self) -> IdT {
        self.instrument
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Open quantity is not tracked here; depth is the resting order count.
    pub fn depth(&self) -> usize {
        self.bids.values().map(VecDeque::len).sum::<usize>()
            + self.asks.values().map(VecDeque::len).sum::<usize>()
    }

    fn levels(&mut self, side: Side) -> &mut BTreeMap<Px, VecDeque<IdT>> {
        if side.is_buy() {
            &mut self.bids
        } else {
            &mut self.asks
        }
    }

    /// Books a resting order at its limit price.
    pub fn insert(&mut self, side: Side, price: Price, order_id: IdT) {
        self.levels(side).entry(Px(price)).or_default().push_back(order_id);
    }

    /// Removes a resting order; returns false if it was not booked there.
    pub fn remove(&mut self, side: Side, price: Price, order_id: IdT) -> bool {
        let levels = self.levels(side);
        if let Some(level) = levels.get_mut(&Px(price)) {
            if let Some(pos) = level.iter().position(|&id| id == order_id) {
                level.remove(pos);
                if level.is_empty() {
                    levels.remove(&Px(price));
                }
                return true;
            }
        }
        false
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().map(|px| px.0)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().map(|px| px.0)
    }

    /// Matches an incoming order against the opposite side.
    ///
    /// Trades execute at the resting price while the taker's limit crosses
    /// (market orders always cross). Maker orders are updated through the
    /// storage and unbooked when filled; the taker is updated in place and
    /// NOT booked here; the caller books any remainder. Returns the fill
    /// legs in execution order.
    pub fn match_incoming(
        &mut self,
        taker: &mut OrderEntry,
        storage: &OrderStorage,
        now: DateTime,
    ) -> Vec<Fill> {
        let mut fills = Vec::new();
        let contra_is_buy = !taker.side.is_buy();

        while taker.leaves_qty > 0 {
            let best = if contra_is_buy {
                self.bids.keys().next_back().copied()
            } else {
                self.asks.keys().next().copied()
            };
            let level_px = match best {
                Some(px) => px,
                None => break,
            };

            let crosses = match taker.ord_type {
                OrderType::Market => true,
                _ => {
                    if contra_is_buy {
                        // Taker sells: trade while best bid >= limit.
                        level_px.0 >= taker.price
                    } else {
                        level_px.0 <= taker.price
                    }
                }
            };
            if !crosses {
                break;
            }

            let levels = if contra_is_buy {
                &mut self.bids
            } else {
                &mut self.asks
            };
            let maker_id = levels
                .get_mut(&level_px)
                .and_then(|level| level.front().copied());
            let maker_id = match maker_id {
                Some(id) => id,
                None => {
                    levels.remove(&level_px);
                    continue;
                }
            };

            let maker_leaves = storage.get(maker_id).map(|maker| maker.leaves_qty);
            let maker_leaves = match maker_leaves {
                Some(leaves) if leaves > 0 => leaves,
                stale => {
                    if stale.is_none() {
                        warn!(order = %maker_id, "booked order missing from storage");
                    }
                    pop_front_of(levels, level_px);
                    continue;
                }
            };

            let traded = taker.leaves_qty.min(maker_leaves);
            let maker_filled = storage
                .update(maker_id, |maker| {
                    maker.apply_fill(traded, level_px.0, now);
                    maker.leaves_qty == 0
                })
                .unwrap_or(true);
            taker.apply_fill(traded, level_px.0, now);

            if maker_filled {
                pop_front_of(levels, level_px);
            }

            fills.push(Fill {
                maker_order_id: maker_id,
                price: level_px.0,
                quantity: traded,
            });
        }

        fills
    }

    /// Open quantity reachable by an incoming order at its limit (or the
    /// whole opposite side for a market order). Used for all-or-none checks
    /// before any fill happens.
    pub fn crossable_quantity(
        &self,
        taker_side: Side,
        ord_type: OrderType,
        limit: Price,
        storage: &OrderStorage,
    ) -> u64 {
        let contra_is_buy = !taker_side.is_buy();
        let levels: Box<dyn Iterator<Item = (&Px, &VecDeque<IdT>)> + '_> = if contra_is_buy {
            Box::new(self.bids.iter().rev())
        } else {
            Box::new(self.asks.iter())
        };

        let mut available = 0u64;
        for (px, level) in levels {
            let crosses = match ord_type {
                OrderType::Market => true,
                _ => {
                    if contra_is_buy {
                        px.0 >= limit
                    } else {
                        px.0 <= limit
                    }
                }
            };
            if !crosses {
                break;
            }
            for order_id in level {
                if let Some(resting) = storage.get(*order_id) {
                    available += resting.leaves_qty as u64;
                }
            }
        }
        available
    }

    /// Re-books a working order during log replay.
    pub fn restore(&mut self, order: &OrderEntry) {
        if order.status.is_working() && order.leaves_qty > 0 {
            self.insert(order.side, order.price, order.order_id);
        }
    }
}

/// Drops the head of a level, erasing the level when it empties.
fn pop_front_of(levels: &mut BTreeMap<Px, VecDeque<IdT>>, px: Px) {
    if let Some(level) = levels.get_mut(&px) {
        level.pop_front();
        if level.is_empty() {
            levels.remove(&px);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderStatus;

    fn stored(storage: &OrderStorage, id: u64, side: Side, px: Price, qty: Quantity) -> IdT {
        let mut order = OrderEntry::default();
        order.order_id = IdT::new(id, 1);
        order.side = side;
        order.ord_type = OrderType::Limit;
        order.price = px;
        order.order_qty = qty;
        order.leaves_qty = qty;
        order.status = OrderStatus::New;
        let order_id = order.order_id;
        storage.insert(None, order);
        order_id
    }

    fn taker(side: Side, px: Price, qty: Quantity) -> OrderEntry {
        let mut order = OrderEntry::default();
        order.order_id = IdT::new(99, 1);
        order.side = side;
        order.ord_type = OrderType::Limit;
        order.price = px;
        order.order_qty = qty;
        order.leaves_qty = qty;
        order.status = OrderStatus::New;
        order
    }

    #[test]
    fn test_insert_remove_best() {
        let mut book = OrderBook::new(IdT::new(1, 1));
        book.insert(Side::Buy, 10.0, IdT::new(1, 1));
        book.insert(Side::Buy, 11.0, IdT::new(2, 1));
        book.insert(Side::Sell, 12.0, IdT::new(3, 1));
        assert_eq!(book.best_bid(), Some(11.0));
        assert_eq!(book.best_ask(), Some(12.0));
        assert_eq!(book.depth(), 3);

        assert!(book.remove(Side::Buy, 11.0, IdT::new(2, 1)));
        assert!(!book.remove(Side::Buy, 11.0, IdT::new(2, 1)));
        assert_eq!(book.best_bid(), Some(10.0));
    }

    #[test]
    fn test_aggressive_buy_crosses_resting_sell() {
        let storage = OrderStorage::new();
        let mut book = OrderBook::new(IdT::new(1, 1));
        let maker = stored(&storage, 1, Side::Sell, 10.0, 100);
        book.insert(Side::Sell, 10.0, maker);

        // Buy 50 with a limit well through the offer: trades at 10.0.
        let mut incoming = taker(Side::Buy, 20.0, 50);
        let fills = book.match_incoming(&mut incoming, &storage, 1);

        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].maker_order_id, maker);
        assert_eq!(fills[0].price, 10.0);
        assert_eq!(fills[0].quantity, 50);

        assert_eq!(incoming.status, OrderStatus::Filled);
        let resting = storage.get(maker).unwrap();
        assert_eq!(resting.status, OrderStatus::PartFill);
        assert_eq!(resting.leaves_qty, 50);
        // Maker still booked with its remainder.
        assert_eq!(book.depth(), 1);
    }

    #[test]
    fn test_no_cross_outside_limit() {
        let storage = OrderStorage::new();
        let mut book = OrderBook::new(IdT::new(1, 1));
        let maker = stored(&storage, 1, Side::Sell, 10.0, 100);
        book.insert(Side::Sell, 10.0, maker);

        let mut incoming = taker(Side::Buy, 9.0, 50);
        let fills = book.match_incoming(&mut incoming, &storage, 1);
        assert!(fills.is_empty());
        assert_eq!(incoming.leaves_qty, 50);
    }

    #[test]
    fn test_price_time_priority_across_levels() {
        let storage = OrderStorage::new();
        let mut book = OrderBook::new(IdT::new(1, 1));
        let cheap = stored(&storage, 1, Side::Sell, 10.0, 30);
        let dear = stored(&storage, 2, Side::Sell, 11.0, 30);
        let late = stored(&storage, 3, Side::Sell, 10.0, 30);
        book.insert(Side::Sell, 11.0, dear);
        book.insert(Side::Sell, 10.0, cheap);
        book.insert(Side::Sell, 10.0, late);

        let mut incoming = taker(Side::Buy, 11.0, 70);
        let fills = book.match_incoming(&mut incoming, &storage, 1);
        let legs: Vec<_> = fills.iter().map(|f| (f.maker_order_id, f.quantity)).collect();
        assert_eq!(legs, vec![(cheap, 30), (late, 30), (dear, 10)]);
        assert_eq!(incoming.status, OrderStatus::Filled);
        assert!((incoming.avg_px - (30.0 * 10.0 + 30.0 * 10.0 + 10.0 * 11.0) / 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_crossable_quantity_respects_limit() {
        let storage = OrderStorage::new();
        let mut book = OrderBook::new(IdT::new(1, 1));
        let near = stored(&storage, 1, Side::Sell, 10.0, 30);
        let far = stored(&storage, 2, Side::Sell, 12.0, 70);
        book.insert(Side::Sell, 10.0, near);
        book.insert(Side::Sell, 12.0, far);

        assert_eq!(
            book.crossable_quantity(Side::Buy, OrderType::Limit, 10.0, &storage),
            30
        );
        assert_eq!(
            book.crossable_quantity(Side::Buy, OrderType::Limit, 12.0, &storage),
            100
        );
        assert_eq!(
            book.crossable_quantity(Side::Buy, OrderType::Limit, 9.0, &storage),
            0
        );
        assert_eq!(
            book.crossable_quantity(Side::Buy, OrderType::Market, 0.0, &storage),
            100
        );
    }

    #[test]
    fn test_market_order_sweeps_regardless_of_price() {
        let storage = OrderStorage::new();
        let mut book = OrderBook::new(IdT::new(1, 1));
        let maker = stored(&storage, 1, Side::Buy, 5.0, 40);
        book.insert(Side::Buy, 5.0, maker);

        let mut incoming = taker(Side::Sell, 100.0, 40);
        incoming.ord_type = OrderType::Market;
        let fills = book.match_incoming(&mut incoming, &storage, 1);
        assert_eq!(fills.len(), 1);
        assert_eq!(incoming.status, OrderStatus::Filled);
        assert!(book.is_empty());
    }
}
