// src/book.rs
//! Price-level ladder: two price-sorted level maps over slab-allocated order
//! nodes. Each level keeps a doubly linked FIFO of nodes plus an aggregate
//! quantity, giving O(1) best-of-book at the map edges, O(K) depth, and
//! price-time priority inside a level.
//!
//! Nodes are addressed by stable slab handles rather than pointers; the
//! identity map in `engine` stores the handle for each live order.

use crate::framer::Side;
use slab::Slab;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Stable key of a node in the ladder's slab.
pub type NodeHandle = usize;

/// Depth rows as (price, aggregate qty), best first.
pub type DepthLevels = SmallVec<[(u32, u64); 16]>;

#[derive(Clone, Debug)]
struct Node {
    order_id: u64,
    price: u32,
    qty: u32,
    side: Side,
    prev: Option<NodeHandle>,
    next: Option<NodeHandle>,
}

#[derive(Clone, Debug, Default)]
struct Level {
    head: Option<NodeHandle>,
    tail: Option<NodeHandle>,
    total_qty: u64,
    count: usize,
}

struct LevelIter<'a> {
    nodes: &'a Slab<Node>,
    cur: Option<NodeHandle>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = NodeHandle;
    fn next(&mut self) -> Option<Self::Item> {
        let h = self.cur?;
        self.cur = self.nodes[h].next;
        Some(h)
    }
}

/// Both sides of the book. Empty levels never survive a mutation; a level
/// exists iff it holds at least one node.
#[derive(Default)]
pub struct LevelBook {
    bids: BTreeMap<u32, Level>,
    asks: BTreeMap<u32, Level>,
    nodes: Slab<Node>,
}

impl LevelBook {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn side_mut(&mut self, side: Side) -> &mut BTreeMap<u32, Level> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    #[inline]
    fn side_ref(&self, side: Side) -> &BTreeMap<u32, Level> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    /// Append a node at the tail of the level at `price`, creating the level
    /// on first use. Returns the handle the caller must keep to address the
    /// node later.
    pub fn insert(&mut self, order_id: u64, side: Side, price: u32, qty: u32) -> NodeHandle {
        let h = self.nodes.insert(Node {
            order_id,
            price,
            qty,
            side,
            prev: None,
            next: None,
        });
        // Read the previous tail before mutating nodes so the level borrow
        // does not overlap the slab borrow.
        let prev_tail = {
            let lvl = self.side_mut(side).entry(price).or_default();
            lvl.tail
        };
        if let Some(t) = prev_tail {
            self.nodes[t].next = Some(h);
            self.nodes[h].prev = Some(t);
        }
        let lvl = self.side_mut(side).entry(price).or_default();
        if prev_tail.is_none() {
            lvl.head = Some(h);
        }
        lvl.tail = Some(h);
        lvl.count += 1;
        lvl.total_qty += u64::from(qty);
        h
    }

    /// Unlink and free a node, erasing its level if it was the last entry.
    pub fn remove(&mut self, h: NodeHandle) {
        let (price, side, prev, next, qty) = {
            let n = &self.nodes[h];
            (n.price, n.side, n.prev, n.next, n.qty)
        };
        if let Some(p) = prev {
            self.nodes[p].next = next;
        }
        if let Some(nx) = next {
            self.nodes[nx].prev = prev;
        }
        let mut erase = false;
        if let Some(lvl) = self.side_mut(side).get_mut(&price) {
            if prev.is_none() {
                lvl.head = next;
            }
            if next.is_none() {
                lvl.tail = prev;
            }
            lvl.count -= 1;
            lvl.total_qty -= u64::from(qty);
            erase = lvl.count == 0;
        }
        if erase {
            self.side_mut(side).remove(&price);
        }
        self.nodes.remove(h);
    }

    /// Rewrite a node's quantity and fold the delta into the level
    /// aggregate. The node stays in place; queue priority is unchanged.
    pub fn set_qty(&mut self, h: NodeHandle, new_qty: u32) {
        let (price, side, old_qty) = {
            let n = &self.nodes[h];
            (n.price, n.side, n.qty)
        };
        self.nodes[h].qty = new_qty;
        if let Some(lvl) = self.side_mut(side).get_mut(&price) {
            lvl.total_qty = lvl.total_qty - u64::from(old_qty) + u64::from(new_qty);
        }
    }

    /// Best level of a side: highest bid, lowest ask.
    #[inline]
    pub fn best(&self, side: Side) -> Option<(u32, u64)> {
        match side {
            Side::Bid => self.bids.iter().next_back().map(|(p, l)| (*p, l.total_qty)),
            Side::Ask => self.asks.iter().next().map(|(p, l)| (*p, l.total_qty)),
        }
    }

    /// Up to `k` levels, best first: bids descending, asks ascending.
    pub fn top_k(&self, side: Side, k: usize) -> DepthLevels {
        let mut out = DepthLevels::new();
        match side {
            Side::Bid => {
                for (p, l) in self.bids.iter().rev().take(k) {
                    out.push((*p, l.total_qty));
                }
            }
            Side::Ask => {
                for (p, l) in self.asks.iter().take(k) {
                    out.push((*p, l.total_qty));
                }
            }
        }
        out
    }

    /// (order_id, qty) pairs at one price level in queue-priority order.
    /// Empty when the level does not exist.
    pub fn queue_at(&self, side: Side, price: u32) -> Vec<(u64, u32)> {
        let Some(lvl) = self.side_ref(side).get(&price) else {
            return Vec::new();
        };
        self.iter_level(lvl)
            .map(|h| {
                let n = &self.nodes[h];
                (n.order_id, n.qty)
            })
            .collect()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn level_count(&self, side: Side) -> usize {
        self.side_ref(side).len()
    }

    /// (order_id, price, qty, side) of a live node, for cross-checks against
    /// the identity map.
    pub(crate) fn node_probe(&self, h: NodeHandle) -> Option<(u64, u32, u32, Side)> {
        self.nodes.get(h).map(|n| (n.order_id, n.price, n.qty, n.side))
    }

    fn iter_level<'a>(&'a self, lvl: &Level) -> LevelIter<'a> {
        LevelIter {
            nodes: &self.nodes,
            cur: lvl.head,
        }
    }

    /// Walk the whole structure and panic on any broken invariant: per-level
    /// aggregates, FIFO link consistency, no empty levels, node/side/price
    /// agreement, and slab population matching the lists.
    pub fn assert_invariants(&self) {
        let mut seen = 0usize;
        for (side, map) in [(Side::Bid, &self.bids), (Side::Ask, &self.asks)] {
            for (&price, lvl) in map {
                assert!(lvl.count > 0, "empty level at {price} survived");
                let mut sum = 0u64;
                let mut count = 0usize;
                let mut prev: Option<NodeHandle> = None;
                for h in self.iter_level(lvl) {
                    let n = &self.nodes[h];
                    assert_eq!(n.price, price, "node price drifted from level key");
                    assert_eq!(n.side, side, "node filed on the wrong side");
                    assert_eq!(n.prev, prev, "back link broken at {price}");
                    assert!(n.qty > 0, "zero-qty node for order {}", n.order_id);
                    sum += u64::from(n.qty);
                    count += 1;
                    prev = Some(h);
                }
                assert_eq!(lvl.tail, prev, "tail out of sync at {price}");
                assert_eq!(lvl.total_qty, sum, "aggregate out of sync at {price}");
                assert_eq!(lvl.count, count, "count out of sync at {price}");
                seen += count;
            }
        }
        assert_eq!(seen, self.nodes.len(), "orphaned nodes in slab");
    }
}
