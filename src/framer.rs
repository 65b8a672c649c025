// src/framer.rs
//! Stateless length-driven decoder for the little-endian exchange feed.
//!
//! Frames are fixed-length per message type:
//! [u8 type][locate(2)][tracking(2)][timestamp(6)][type-specific body].
//! All multi-byte integers are little-endian; the timestamp is a 6-byte
//! integer, least significant byte first. Locate, tracking, stock symbol
//! and match number are consumed from the frame but not interpreted.

use serde::{Deserialize, Serialize};

pub const ADD_MSG_SIZE: usize = 36; // 'A'
pub const CANCEL_MSG_SIZE: usize = 23; // 'X'
pub const EXECUTE_MSG_SIZE: usize = 31; // 'E'
pub const REPLACE_MSG_SIZE: usize = 35; // 'U'

/// Hard cap on the reassembly buffer between ticks. Exceeding it signals a
/// truncated frame or a runaway producer and the whole buffer is discarded.
pub const MAX_ASSEMBLY_BYTES: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// One decoded feed message. Quantities and prices are raw wire values;
/// price is in integer ticks (1/10000 units).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireEvent {
    Add {
        order_id: u64,
        side: Side,
        price: u32,
        qty: u32,
        timestamp: u64,
    },
    /// The wire carries a cancelled-shares field; the book treats every
    /// cancel as a full cancel and ignores it (see `OrderBook::cancel_order`).
    Cancel { order_id: u64, canceled: u32 },
    Execute { order_id: u64, executed: u32 },
    Replace {
        order_id: u64,
        new_order_id: u64,
        qty: u32,
        price: u32,
        timestamp: u64,
    },
}

/// Result of one framing attempt against the front of a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A complete frame was decoded; consume this many bytes.
    Message(WireEvent, usize),
    /// Recognized type byte but the frame is still short.
    NeedMore,
    /// Leading byte is not a known type; skip exactly one byte.
    UnknownType(u8),
}

/// Frame length for a type byte, `None` for unknown types.
#[inline]
pub fn message_len(type_byte: u8) -> Option<usize> {
    match type_byte {
        b'A' => Some(ADD_MSG_SIZE),
        b'X' => Some(CANCEL_MSG_SIZE),
        b'E' => Some(EXECUTE_MSG_SIZE),
        b'U' => Some(REPLACE_MSG_SIZE),
        _ => None,
    }
}

/// `'B'` and `'b'` map to `Bid`; every other byte is treated as `Ask`,
/// matching the upstream feed's laxity.
#[inline]
pub fn side_from_byte(b: u8) -> Side {
    if b == b'B' || b == b'b' {
        Side::Bid
    } else {
        Side::Ask
    }
}

#[inline]
fn read_u32(b: &[u8], off: &mut usize) -> u32 {
    let o = *off;
    *off = o + 4;
    u32::from_le_bytes([b[o], b[o + 1], b[o + 2], b[o + 3]])
}

#[inline]
fn read_u64(b: &[u8], off: &mut usize) -> u64 {
    let o = *off;
    *off = o + 8;
    u64::from_le_bytes([
        b[o],
        b[o + 1],
        b[o + 2],
        b[o + 3],
        b[o + 4],
        b[o + 5],
        b[o + 6],
        b[o + 7],
    ])
}

// 6-byte timestamp, LSB first.
#[inline]
fn read_u48(b: &[u8], off: &mut usize) -> u64 {
    let o = *off;
    *off = o + 6;
    let mut v = 0u64;
    for i in 0..6 {
        v |= u64::from(b[o + i]) << (8 * i);
    }
    v
}

/// Attempt to decode exactly one message from the front of `buf`.
///
/// Returns `None` on an empty buffer. Holds no state: two calls on the same
/// bytes yield the same outcome. Field values are not range-checked here;
/// validation against book state happens at dispatch.
pub fn frame_one(buf: &[u8]) -> Option<Outcome> {
    let type_byte = *buf.first()?;
    let Some(need) = message_len(type_byte) else {
        return Some(Outcome::UnknownType(type_byte));
    };
    if buf.len() < need {
        return Some(Outcome::NeedMore);
    }

    let mut o = 1usize;
    o += 4; // stock locate + tracking number
    let event = match type_byte {
        b'A' => {
            let timestamp = read_u48(buf, &mut o);
            let order_id = read_u64(buf, &mut o);
            let side = side_from_byte(buf[o]);
            o += 1;
            let qty = read_u32(buf, &mut o);
            o += 8; // stock symbol
            let price = read_u32(buf, &mut o);
            WireEvent::Add {
                order_id,
                side,
                price,
                qty,
                timestamp,
            }
        }
        b'X' => {
            o += 6; // timestamp
            let order_id = read_u64(buf, &mut o);
            let canceled = read_u32(buf, &mut o);
            WireEvent::Cancel { order_id, canceled }
        }
        b'E' => {
            o += 6; // timestamp
            let order_id = read_u64(buf, &mut o);
            let executed = read_u32(buf, &mut o);
            // match number (8 bytes) ignored
            WireEvent::Execute { order_id, executed }
        }
        b'U' => {
            let timestamp = read_u48(buf, &mut o);
            let order_id = read_u64(buf, &mut o);
            let new_order_id = read_u64(buf, &mut o);
            let qty = read_u32(buf, &mut o);
            let price = read_u32(buf, &mut o);
            WireEvent::Replace {
                order_id,
                new_order_id,
                qty,
                price,
                timestamp,
            }
        }
        _ => unreachable!("message_len filtered unknown types"),
    };
    Some(Outcome::Message(event, need))
}
