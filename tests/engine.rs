// tests/engine.rs
// End-to-end flows through the fabric: chunked delivery, framing recovery,
// backpressure, and the coupled book views.

use bytes::Bytes;
use fabric_lob::engine::{ErrorStats, OrderBook};
use fabric_lob::fabric::ChunkFifo;
use fabric_lob::feed;
use fabric_lob::framer::{Side, ADD_MSG_SIZE, MAX_ASSEMBLY_BYTES};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

fn rig(fifo_depth: usize) -> (Arc<ChunkFifo>, OrderBook) {
    let fabric = Arc::new(ChunkFifo::new(fifo_depth));
    let book = OrderBook::new(fabric.clone());
    (fabric, book)
}

#[test]
fn fragmented_add_completes_on_second_chunk() {
    let (fabric, mut book) = rig(4096);
    let msg = feed::add_order(12345, 10_000, 50, b'B', 1_000_000);

    fabric.write_chunk(msg.slice(..10));
    book.process();
    assert_eq!(book.active_order_count(), 0);
    assert_eq!(book.error_stats().incomplete_messages, 1);

    fabric.write_chunk(msg.slice(10..));
    book.process();
    assert_eq!(book.active_order_count(), 1);
    assert_eq!(book.best_bid(), Some((10_000, 50)));
    book.assert_invariants();
}

#[test]
fn partial_execute_updates_book_and_fires_callback() {
    let (fabric, mut book) = rig(4096);
    let events: Rc<RefCell<Vec<(char, u64, u32)>>> = Rc::default();
    let sink = events.clone();
    book.set_event_callback(move |kind, order| {
        sink.borrow_mut().push((kind, order.order_id, order.qty));
    });

    fabric.write_chunk(feed::add_order(12345, 10_000, 50, b'B', 1_000_000));
    book.process();
    fabric.write_chunk(feed::execute_order(12345, 20));
    book.process();

    assert_eq!(book.find_order(12345).unwrap().qty, 30);
    assert_eq!(book.best_bid(), Some((10_000, 30)));
    assert_eq!(
        events.borrow().as_slice(),
        &[('A', 12345, 50), ('E', 12345, 30)]
    );
    book.assert_invariants();
}

#[test]
fn cancel_erases_order_and_level() {
    let (fabric, mut book) = rig(4096);
    fabric.write_chunk(feed::add_order(12345, 10_000, 50, b'B', 1_000_000));
    book.process();

    fabric.write_chunk(feed::cancel_order(12345, 50));
    book.process();

    assert_eq!(book.active_order_count(), 0);
    assert_eq!(book.best_bid(), None);
    assert!(book.level_queue(Side::Bid, 10_000).is_empty());
    book.assert_invariants();
}

#[test]
fn wire_cancel_is_a_full_cancel_whatever_the_field_says() {
    let (fabric, mut book) = rig(4096);
    fabric.write_chunk(feed::add_order(1, 10_000, 50, b'B', 0));
    book.process();

    // Cancelled-shares field says 5; the engine removes the whole order.
    fabric.write_chunk(feed::cancel_order(1, 5));
    book.process();
    assert_eq!(book.active_order_count(), 0);
}

#[test]
fn replace_reparents_to_tail_of_new_level() {
    let (fabric, mut book) = rig(4096);
    fabric.write_chunk(feed::add_order(1, 100, 10, b'B', 10));
    fabric.write_chunk(feed::add_order(2, 100, 10, b'B', 20));
    book.process();

    fabric.write_chunk(feed::replace_order(1, 3, 101, 10, 99));
    book.process();

    assert_eq!(book.level_queue(Side::Bid, 100), vec![(2, 10)]);
    assert_eq!(book.level_queue(Side::Bid, 101), vec![(3, 10)]);
    assert!(book.find_order(1).is_none());
    // The successor keeps the original's origination timestamp.
    assert_eq!(book.find_order(3).unwrap().timestamp, 10);
    book.assert_invariants();
}

#[test]
fn unknown_byte_then_valid_message_recovers() {
    let (fabric, mut book) = rig(4096);
    let mut bytes = vec![0xFFu8];
    bytes.extend_from_slice(&feed::add_order(7, 10_000, 10, b'B', 0));
    fabric.write_chunk(Bytes::from(bytes));
    book.process();

    assert_eq!(book.active_order_count(), 1);
    assert!(book.find_order(7).is_some());
    assert_eq!(book.error_stats().unknown_message_types, 1);
}

#[test]
fn backpressure_caps_accepted_chunks() {
    let (fabric, mut book) = rig(256);
    let mut accepted = 0;
    for i in 0..20u64 {
        if fabric.write_chunk(feed::add_order(i + 1, 10_000, 10, b'B', 0)) {
            accepted += 1;
        }
    }
    // 7 * 36 = 252 bytes fit; the 8th chunk would cross 256.
    assert_eq!(accepted, 7);
    assert_eq!(fabric.stats().backpressure_events, 13);

    book.process();
    assert_eq!(book.active_order_count(), 7);
    book.assert_invariants();
}

#[test]
fn single_byte_chunks_assemble_a_full_add() {
    let (fabric, mut book) = rig(4096);
    let msg = feed::add_order(55, 10_000, 5, b'S', 123);
    for chunk in feed::split_chunks(&msg, 1) {
        fabric.write_chunk(chunk);
        book.process();
    }
    assert_eq!(book.active_order_count(), 1);
    assert_eq!(book.best_ask(), Some((10_000, 5)));
    // Each short tick stalled on the partial frame.
    assert_eq!(
        book.error_stats().incomplete_messages,
        (ADD_MSG_SIZE - 1) as u64
    );
}

#[test]
fn chunk_boundary_at_message_boundary() {
    let (fabric, mut book) = rig(4096);
    fabric.write_chunk(feed::add_order(1, 100, 10, b'B', 0));
    fabric.write_chunk(feed::add_order(2, 101, 10, b'B', 0));
    book.process();
    assert_eq!(book.active_order_count(), 2);
    assert_eq!(book.error_stats(), ErrorStats::default());
}

#[test]
fn two_messages_in_one_chunk() {
    let (fabric, mut book) = rig(4096);
    let mut bytes = feed::add_order(1, 100, 10, b'B', 0).to_vec();
    bytes.extend_from_slice(&feed::add_order(2, 101, 20, b'S', 0));
    fabric.write_chunk(Bytes::from(bytes));
    book.process();
    assert_eq!(book.active_order_count(), 2);
    assert_eq!(book.spread(), Some(1));
}

#[test]
fn buffer_overflow_discards_even_complete_front_messages() {
    let (fabric, mut book) = rig(4096);
    // One decodable add at the front, then junk past the cap.
    let mut bytes = feed::add_order(1, 100, 10, b'B', 0).to_vec();
    bytes.resize(MAX_ASSEMBLY_BYTES + 1, 0xEE);
    for chunk in feed::split_chunks(&bytes, 128) {
        fabric.write_chunk(chunk);
    }
    book.process();

    assert_eq!(book.active_order_count(), 0);
    assert_eq!(book.error_stats().buffer_overflows, 1);

    // The next tick starts from an empty buffer and works normally.
    fabric.write_chunk(feed::add_order(2, 100, 10, b'B', 0));
    book.process();
    assert_eq!(book.active_order_count(), 1);
    assert!(book.find_order(2).is_some());
}

#[test]
fn process_on_empty_fabric_is_a_no_op() {
    let (_fabric, mut book) = rig(4096);
    book.process();
    assert_eq!(book.active_order_count(), 0);
    assert_eq!(book.error_stats(), ErrorStats::default());
}

#[test]
fn execute_to_exactly_zero_removes_order() {
    let (fabric, mut book) = rig(4096);
    fabric.write_chunk(feed::add_order(1, 100, 10, b'B', 0));
    fabric.write_chunk(feed::execute_order(1, 10));
    book.process();
    assert_eq!(book.active_order_count(), 0);
    assert_eq!(book.best_bid(), None);
    assert_eq!(book.error_stats().invalid_operations, 0);
}

#[test]
fn replace_to_same_id_is_refused_on_the_wire() {
    let (fabric, mut book) = rig(4096);
    fabric.write_chunk(feed::add_order(1, 100, 10, b'B', 0));
    fabric.write_chunk(feed::replace_order(1, 1, 101, 10, 0));
    book.process();

    assert_eq!(book.error_stats().invalid_operations, 1);
    assert_eq!(book.find_order(1).unwrap().price, 100);
    book.assert_invariants();
}

#[test]
fn depth_reports_both_sides_sorted() {
    let (fabric, mut book) = rig(4096);
    for (id, price, side) in [
        (1u64, 9_990u32, b'B'),
        (2, 10_000, b'B'),
        (3, 9_980, b'B'),
        (4, 10_020, b'S'),
        (5, 10_010, b'S'),
        (6, 10_030, b'S'),
    ] {
        fabric.write_chunk(feed::add_order(id, price, 10, side, 0));
    }
    book.process();

    let depth = book.depth(2);
    assert_eq!(depth.bids.as_slice(), &[(10_000, 10), (9_990, 10)]);
    assert_eq!(depth.asks.as_slice(), &[(10_010, 10), (10_020, 10)]);

    let all = book.depth(10);
    assert_eq!(all.bids.len(), 3);
    assert_eq!(all.asks.len(), 3);
    assert_eq!(book.spread(), Some(10));
}

#[test]
fn fifo_priority_is_arrival_order_within_a_level() {
    let (fabric, mut book) = rig(4096);
    for id in 1u64..=4 {
        fabric.write_chunk(feed::add_order(id, 10_000, 10, b'B', id));
    }
    book.process();
    assert_eq!(
        book.level_queue(Side::Bid, 10_000),
        vec![(1, 10), (2, 10), (3, 10), (4, 10)]
    );

    // Removing from the middle keeps the survivors in arrival order.
    fabric.write_chunk(feed::cancel_order(2, 0));
    book.process();
    assert_eq!(
        book.level_queue(Side::Bid, 10_000),
        vec![(1, 10), (3, 10), (4, 10)]
    );
}

#[test]
fn dead_id_operations_are_counted_not_applied() {
    let (fabric, mut book) = rig(4096);
    fabric.write_chunk(feed::add_order(1, 100, 10, b'B', 0));
    fabric.write_chunk(feed::cancel_order(1, 0));
    // All three target a dead order now.
    fabric.write_chunk(feed::cancel_order(1, 0));
    fabric.write_chunk(feed::execute_order(1, 5));
    fabric.write_chunk(feed::replace_order(1, 2, 101, 5, 0));
    book.process();

    assert_eq!(book.error_stats().invalid_operations, 3);
    assert_eq!(book.active_order_count(), 0);
}

#[test]
fn fifo_stats_track_written_and_read_bytes() {
    let (fabric, mut book) = rig(4096);
    let msg = feed::add_order(1, 100, 10, b'B', 0);
    fabric.write_chunk(msg.clone());
    assert_eq!(fabric.depth_bytes(), msg.len());
    book.process();

    let stats = fabric.stats();
    assert_eq!(stats.total_bytes_written, msg.len() as u64);
    assert_eq!(stats.total_bytes_read, msg.len() as u64);
    assert_eq!(stats.max_depth_reached, msg.len());
    assert!(fabric.empty());
}
