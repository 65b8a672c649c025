//! Simulated market-data fabric feeding an order-by-order limit order book.
//!
//! A producer pushes byte chunks into a bounded FIFO modeling the stream
//! interface of a hardware front-end. `OrderBook::process()` drains the
//! FIFO, reassembles the chunks, frames fixed-length feed messages off the
//! front and applies each one to two coupled views of the book: an O(1)
//! identity map over live orders and a price-sorted ladder of FIFO levels.
//!
//! ```text
//! [producer] --write_chunk--> [ChunkFifo] --process()--> [framer]
//!                                                            |
//!                                        [OrderIndex] + [LevelBook]
//!                                                            |
//!                                                   [event callback]
//! ```
//!
//! Every accepted byte either composes into exactly one applied event or is
//! discarded through a recorded error counter; nothing is lost silently.
//! The engine is single-threaded by contract and never blocks.

pub mod book;
pub mod config;
pub mod engine;
pub mod fabric;
pub mod feed;
pub mod framer;

pub use book::{DepthLevels, LevelBook, NodeHandle};
pub use engine::{ErrorStats, MarketDepth, Order, OrderBook, OrderId, OrderIndex};
pub use fabric::{ChunkFifo, FifoStats, DEFAULT_FIFO_DEPTH};
pub use framer::{Outcome, Side, WireEvent};
