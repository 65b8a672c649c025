// src/engine.rs
//! The order book engine. `process()` drains the fabric FIFO into a
//! reassembly buffer, frames complete messages off the front, and applies
//! each decoded event to the identity map and the price ladder as one step.
//! Decode errors are counted, never raised; `process()` always returns.

use crate::book::{DepthLevels, LevelBook, NodeHandle};
use crate::fabric::ChunkFifo;
use crate::framer::{self, Outcome, Side, WireEvent, MAX_ASSEMBLY_BYTES};
use bytes::{Buf, BytesMut};
use hashbrown::HashMap;
use log::warn;
use std::fmt::Write as _;
use std::sync::Arc;

pub type OrderId = u64;

/// Snapshot of a live order. `price` is in integer ticks, `timestamp` is
/// nanoseconds since session midnight as carried on the wire (informational
/// only; the engine never orders by it).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    pub order_id: OrderId,
    pub price: u32,
    pub qty: u32,
    pub side: Side,
    pub timestamp: u64,
}

/// Non-fatal decode/apply error counters. All monotonic until reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorStats {
    /// Leading byte not in the recognized type set; one byte skipped each.
    pub unknown_message_types: u64,
    /// Reassembly buffer exceeded its cap and was discarded wholesale.
    pub buffer_overflows: u64,
    /// Recognized type still waiting for the rest of its frame.
    pub incomplete_messages: u64,
    /// Book precondition violated (duplicate add, dead id, over-execute).
    pub invalid_operations: u64,
}

/// Top-of-book depth rows, bids descending and asks ascending by price.
#[derive(Clone, Debug, Default)]
pub struct MarketDepth {
    pub bids: DepthLevels,
    pub asks: DepthLevels,
}

#[derive(Clone, Copy, Debug)]
struct Tracked {
    order: Order,
    node: NodeHandle,
}

/// O(1) identity map over live orders. Each entry pairs the order record
/// with the slab handle of its ladder node; the handle is the back-reference
/// that makes cancel and execute constant-time.
#[derive(Default)]
pub struct OrderIndex {
    live: HashMap<OrderId, Tracked>,
}

impl OrderIndex {
    /// False when the id is already live; the map is unchanged in that case.
    pub fn insert(&mut self, order: Order, node: NodeHandle) -> bool {
        if self.live.contains_key(&order.order_id) {
            return false;
        }
        self.live.insert(order.order_id, Tracked { order, node });
        true
    }

    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.live.get(&order_id).map(|t| &t.order)
    }

    pub fn update_quantity(&mut self, order_id: OrderId, new_qty: u32) -> bool {
        match self.live.get_mut(&order_id) {
            Some(t) => {
                t.order.qty = new_qty;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, order_id: OrderId) -> Option<(Order, NodeHandle)> {
        self.live.remove(&order_id).map(|t| (t.order, t.node))
    }

    #[inline]
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.live.contains_key(&order_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    fn tracked(&self, order_id: OrderId) -> Option<Tracked> {
        self.live.get(&order_id).copied()
    }

    fn iter(&self) -> impl Iterator<Item = (&Order, NodeHandle)> {
        self.live.values().map(|t| (&t.order, t.node))
    }
}

/// Observer hook: event type byte ('A', 'X', 'E' or 'U') plus the
/// post-mutation order snapshot.
pub type EventCallback = Box<dyn FnMut(char, &Order)>;

/// Façade over fabric, framing and the dual book representation.
///
/// Single-threaded by contract: one producer fills the fabric, one owner
/// calls `process()` and the queries. Callbacks run synchronously inside
/// the mutating call and receive a detached snapshot, so they cannot
/// re-enter the engine.
pub struct OrderBook {
    fabric: Arc<ChunkFifo>,
    assembly: BytesMut,
    index: OrderIndex,
    ladder: LevelBook,
    callback: Option<EventCallback>,
    errors: ErrorStats,
}

impl OrderBook {
    pub fn new(fabric: Arc<ChunkFifo>) -> Self {
        Self {
            fabric,
            assembly: BytesMut::with_capacity(MAX_ASSEMBLY_BYTES),
            index: OrderIndex::default(),
            ladder: LevelBook::new(),
            callback: None,
            errors: ErrorStats::default(),
        }
    }

    pub fn set_event_callback<F>(&mut self, cb: F)
    where
        F: FnMut(char, &Order) + 'static,
    {
        self.callback = Some(Box::new(cb));
    }

    /// One tick: drain the fabric, then frame and apply until the buffer
    /// runs dry or stalls on a partial message. A buffer past the cap is
    /// discarded in full, complete front messages included, and the tick
    /// ends there.
    pub fn process(&mut self) {
        while let Some(chunk) = self.fabric.read_chunk() {
            self.assembly.extend_from_slice(&chunk);
        }

        if self.assembly.len() > MAX_ASSEMBLY_BYTES {
            warn!(
                "reassembly buffer overflow ({} bytes), discarding buffered data",
                self.assembly.len()
            );
            self.assembly.clear();
            self.errors.buffer_overflows += 1;
            return;
        }

        loop {
            let Some(outcome) = framer::frame_one(&self.assembly) else {
                break;
            };
            match outcome {
                Outcome::Message(event, consumed) => {
                    self.apply(event);
                    self.assembly.advance(consumed);
                }
                Outcome::UnknownType(byte) => {
                    warn!("skipping unknown message type byte {byte:#04x}");
                    self.errors.unknown_message_types += 1;
                    self.assembly.advance(1);
                }
                Outcome::NeedMore => {
                    self.errors.incomplete_messages += 1;
                    break;
                }
            }
        }
    }

    fn apply(&mut self, event: WireEvent) {
        match event {
            WireEvent::Add {
                order_id,
                side,
                price,
                qty,
                timestamp,
            } => {
                self.add_order(Order {
                    order_id,
                    price,
                    qty,
                    side,
                    timestamp,
                });
            }
            // The cancelled-shares field is decoded but not honored; every
            // wire cancel removes the whole remainder.
            WireEvent::Cancel { order_id, .. } => {
                self.cancel_order(order_id);
            }
            WireEvent::Execute { order_id, executed } => {
                self.execute_order(order_id, executed);
            }
            WireEvent::Replace {
                order_id,
                new_order_id,
                qty,
                price,
                ..
            } => {
                self.replace_order(order_id, new_order_id, price, qty);
            }
        }
    }

    /// Insert a new live order and enqueue it at the tail of its price
    /// level. Duplicate ids and zero quantities are refused without touching
    /// the book.
    pub fn add_order(&mut self, order: Order) -> bool {
        if order.qty == 0 || self.index.contains(order.order_id) {
            self.errors.invalid_operations += 1;
            return false;
        }
        let node = self
            .ladder
            .insert(order.order_id, order.side, order.price, order.qty);
        self.index.insert(order, node);
        self.emit('A', &order);
        true
    }

    /// Full cancel: removes the entire remaining quantity whatever the wire
    /// cancelled-shares field carried. The callback sees the order with its
    /// final remaining quantity.
    pub fn cancel_order(&mut self, order_id: OrderId) -> bool {
        let Some((order, node)) = self.index.remove(order_id) else {
            self.errors.invalid_operations += 1;
            return false;
        };
        self.ladder.remove(node);
        self.emit('X', &order);
        true
    }

    /// Execute `executed` shares against a live order. Removes the order
    /// when the remainder hits zero. Over-execution is refused with no
    /// state change.
    pub fn execute_order(&mut self, order_id: OrderId, executed: u32) -> bool {
        let Some(t) = self.index.tracked(order_id) else {
            self.errors.invalid_operations += 1;
            return false;
        };
        if executed > t.order.qty {
            self.errors.invalid_operations += 1;
            return false;
        }
        let remaining = t.order.qty - executed;
        if remaining == 0 {
            self.index.remove(order_id);
            self.ladder.remove(t.node);
        } else {
            self.index.update_quantity(order_id, remaining);
            self.ladder.set_qty(t.node, remaining);
        }
        let snapshot = Order {
            qty: remaining,
            ..t.order
        };
        self.emit('E', &snapshot);
        true
    }

    /// Cancel the original and add a successor carrying the original's side
    /// and timestamp under a new id, price and quantity. The successor joins
    /// the tail of its level; queue priority is not preserved.
    ///
    /// All preconditions are checked up front, so a refused replace leaves
    /// the original order untouched: the new id must differ, must not be
    /// live, the new quantity must be positive, and the original must be
    /// live.
    pub fn replace_order(
        &mut self,
        order_id: OrderId,
        new_order_id: OrderId,
        new_price: u32,
        new_qty: u32,
    ) -> bool {
        if new_order_id == order_id || new_qty == 0 || self.index.contains(new_order_id) {
            self.errors.invalid_operations += 1;
            return false;
        }
        let Some((original, node)) = self.index.remove(order_id) else {
            self.errors.invalid_operations += 1;
            return false;
        };
        self.ladder.remove(node);

        let successor = Order {
            order_id: new_order_id,
            price: new_price,
            qty: new_qty,
            side: original.side,
            timestamp: original.timestamp,
        };
        let new_node = self.ladder.insert(
            successor.order_id,
            successor.side,
            successor.price,
            successor.qty,
        );
        self.index.insert(successor, new_node);
        self.emit('U', &successor);
        true
    }

    #[inline]
    fn emit(&mut self, kind: char, order: &Order) {
        if let Some(cb) = self.callback.as_mut() {
            cb(kind, order);
        }
    }

    // ---------- Market data ----------

    pub fn best_bid(&self) -> Option<(u32, u64)> {
        self.ladder.best(Side::Bid)
    }

    pub fn best_ask(&self) -> Option<(u32, u64)> {
        self.ladder.best(Side::Ask)
    }

    /// `best_ask - best_bid` when strictly positive. A crossed or locked
    /// market (ask <= bid) reports no spread rather than a negative value.
    pub fn spread(&self) -> Option<u32> {
        let (bid, _) = self.best_bid()?;
        let (ask, _) = self.best_ask()?;
        if ask <= bid {
            return None;
        }
        Some(ask - bid)
    }

    pub fn depth(&self, levels: usize) -> MarketDepth {
        MarketDepth {
            bids: self.ladder.top_k(Side::Bid, levels),
            asks: self.ladder.top_k(Side::Ask, levels),
        }
    }

    pub fn find_order(&self, order_id: OrderId) -> Option<&Order> {
        self.index.get(order_id)
    }

    pub fn active_order_count(&self) -> usize {
        self.index.len()
    }

    /// Queue at one price level in priority order, for inspection.
    pub fn level_queue(&self, side: Side, price: u32) -> Vec<(OrderId, u32)> {
        self.ladder.queue_at(side, price)
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.errors
    }

    pub fn reset_error_stats(&mut self) {
        self.errors = ErrorStats::default();
    }

    /// Formatted table of every live order, unsorted (index iteration
    /// order).
    pub fn dump_orders(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} live orders", self.index.len());
        let _ = writeln!(
            out,
            "{:>12} {:>10} {:>10} {:>5} {:>15}",
            "order_id", "price", "qty", "side", "timestamp"
        );
        for (order, _) in self.index.iter() {
            let _ = writeln!(
                out,
                "{:>12} {:>10} {:>10} {:>5} {:>15}",
                order.order_id,
                order.price,
                order.qty,
                match order.side {
                    Side::Bid => "B",
                    Side::Ask => "A",
                },
                order.timestamp
            );
        }
        out
    }

    /// Cross-check the identity map against the ladder and panic on any
    /// disagreement. Test and debugging aid; not called on the hot path.
    pub fn assert_invariants(&self) {
        self.ladder.assert_invariants();
        assert_eq!(
            self.index.len(),
            self.ladder.node_count(),
            "index size != node count"
        );
        for (order, node) in self.index.iter() {
            let (nid, nprice, nqty, nside) = self
                .ladder
                .node_probe(node)
                .expect("live order points at a freed node");
            assert_eq!(nid, order.order_id, "node belongs to another order");
            assert_eq!(nprice, order.price, "node price != order price");
            assert_eq!(nqty, order.qty, "node qty != order qty");
            assert_eq!(nside, order.side, "node side != order side");
            assert!(order.qty > 0, "zero-qty order {} is live", order.order_id);
        }
    }
}
