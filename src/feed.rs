// src/feed.rs
//! Producer-side frame encoders. Layouts mirror `framer` byte for byte;
//! locate, tracking, symbol and match-number fields are zero-filled since
//! the consumer never interprets them. Used by the demo binary and the test
//! suites to synthesize feed traffic.

use crate::framer::{ADD_MSG_SIZE, CANCEL_MSG_SIZE, EXECUTE_MSG_SIZE, REPLACE_MSG_SIZE};
use bytes::{BufMut, Bytes, BytesMut};

const STOCK_SYMBOL: &[u8; 8] = b"TEST    ";

#[inline]
fn put_header(m: &mut BytesMut, timestamp: u64) {
    m.put_u16_le(0); // stock locate
    m.put_u16_le(0); // tracking number
    m.put_slice(&timestamp.to_le_bytes()[..6]);
}

/// 'A': add order. `side` is the raw wire byte so tests can exercise the
/// side-byte rule with arbitrary values.
pub fn add_order(order_id: u64, price: u32, qty: u32, side: u8, timestamp: u64) -> Bytes {
    let mut m = BytesMut::with_capacity(ADD_MSG_SIZE);
    m.put_u8(b'A');
    put_header(&mut m, timestamp);
    m.put_u64_le(order_id);
    m.put_u8(side);
    m.put_u32_le(qty);
    m.put_slice(STOCK_SYMBOL);
    m.put_u32_le(price);
    debug_assert_eq!(m.len(), ADD_MSG_SIZE);
    m.freeze()
}

/// 'X': order cancel. The consumer applies a full cancel whatever
/// `canceled_qty` says; the field is still encoded for wire fidelity.
pub fn cancel_order(order_id: u64, canceled_qty: u32) -> Bytes {
    let mut m = BytesMut::with_capacity(CANCEL_MSG_SIZE);
    m.put_u8(b'X');
    put_header(&mut m, 0);
    m.put_u64_le(order_id);
    m.put_u32_le(canceled_qty);
    debug_assert_eq!(m.len(), CANCEL_MSG_SIZE);
    m.freeze()
}

/// 'E': order executed.
pub fn execute_order(order_id: u64, executed_qty: u32) -> Bytes {
    let mut m = BytesMut::with_capacity(EXECUTE_MSG_SIZE);
    m.put_u8(b'E');
    put_header(&mut m, 0);
    m.put_u64_le(order_id);
    m.put_u32_le(executed_qty);
    m.put_u64_le(0); // match number
    debug_assert_eq!(m.len(), EXECUTE_MSG_SIZE);
    m.freeze()
}

/// 'U': order replace.
pub fn replace_order(
    order_id: u64,
    new_order_id: u64,
    new_price: u32,
    new_qty: u32,
    timestamp: u64,
) -> Bytes {
    let mut m = BytesMut::with_capacity(REPLACE_MSG_SIZE);
    m.put_u8(b'U');
    put_header(&mut m, timestamp);
    m.put_u64_le(order_id);
    m.put_u64_le(new_order_id);
    m.put_u32_le(new_qty);
    m.put_u32_le(new_price);
    debug_assert_eq!(m.len(), REPLACE_MSG_SIZE);
    m.freeze()
}

/// Split a byte stream into chunks of at most `chunk_len` bytes, order
/// preserved. Messages may be cut at any byte boundary.
pub fn split_chunks(bytes: &[u8], chunk_len: usize) -> Vec<Bytes> {
    assert!(chunk_len > 0, "chunk_len must be at least 1");
    bytes.chunks(chunk_len).map(Bytes::copy_from_slice).collect()
}
