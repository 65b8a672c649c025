// src/main.rs
// Demo driver: replays a scripted session through the fabric FIFO and logs
// what the book sees. Usage: fabric-lob [config.toml]

use fabric_lob::config::AppConfig;
use fabric_lob::engine::OrderBook;
use fabric_lob::fabric::ChunkFifo;
use fabric_lob::feed;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

fn init_logger(json: bool) {
    if json {
        let mut b =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        b.format(|buf, record| {
            use std::io::Write;
            let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            writeln!(
                buf,
                "{{\"ts\":\"{}\",\"level\":\"{}\",\"target\":\"{}\",\"msg\":\"{}\"}}",
                ts,
                record.level(),
                record.target(),
                record.args().to_string().replace('"', "'")
            )
        })
        .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
}

fn main() -> anyhow::Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(p) => AppConfig::from_file(&PathBuf::from(p))?,
        None => AppConfig::default(),
    };
    init_logger(cfg.general.json_logs);
    info!(
        "fabric depth {} bytes, reporting {} levels",
        cfg.fabric.max_depth_bytes, cfg.book.depth_levels
    );

    let fabric = Arc::new(ChunkFifo::new(cfg.fabric.max_depth_bytes));
    let mut book = OrderBook::new(fabric.clone());
    book.set_event_callback(|kind, order| {
        info!(
            "event {} order={} px={} qty={} side={:?} ts={}",
            kind, order.order_id, order.price, order.qty, order.side, order.timestamp
        );
    });

    // Fragmented delivery: the first add arrives split across two chunks.
    info!("-- fragmented add --");
    let msg = feed::add_order(12345, 10_000, 50, b'B', 1_000_000);
    fabric.write_chunk(msg.slice(..10));
    book.process();
    info!("after first fragment: {} live orders", book.active_order_count());
    fabric.write_chunk(msg.slice(10..));
    book.process();
    info!("after second fragment: {} live orders", book.active_order_count());

    fabric.write_chunk(feed::add_order(12346, 10_050, 100, b'S', 1_000_100));
    book.process();

    info!("-- partial execute --");
    fabric.write_chunk(feed::execute_order(12345, 20));
    book.process();
    if let Some(order) = book.find_order(12345) {
        info!("order 12345 after execution: qty={}", order.qty);
    }

    info!("-- cancel --");
    fabric.write_chunk(feed::cancel_order(12346, 0));
    book.process();
    info!("after cancel: {} live orders", book.active_order_count());

    info!("-- replace --");
    fabric.write_chunk(feed::replace_order(12345, 12400, 10_010, 30, 1_000_200));
    book.process();

    info!("-- batch adds --");
    for i in 20_000u64..20_005 {
        let price = 9_900 + (i % 10) as u32;
        fabric.write_chunk(feed::add_order(i, price, 10, b'B', 2_000_000 + i));
    }
    book.process();
    info!("live orders after batch: {}", book.active_order_count());

    // A junk byte in front of a valid frame: the engine skips it and
    // recovers on the very next byte.
    info!("-- unknown byte recovery --");
    fabric.write_chunk(bytes::Bytes::from_static(&[0xFF]));
    fabric.write_chunk(feed::add_order(30_000, 10_020, 25, b'S', 3_000_000));
    book.process();

    // Backpressure sweep: a burst bigger than the FIFO. Rejected chunks are
    // the producer's problem; the book only sees what was accepted.
    info!("-- backpressure sweep --");
    let mut accepted = 0u32;
    for i in 40_000u64..40_200 {
        if fabric.write_chunk(feed::add_order(i, 10_000, 1, b'B', 4_000_000 + i)) {
            accepted += 1;
        }
    }
    info!(
        "burst: {} of 200 chunks accepted, fifo utilization {:.2}",
        accepted,
        fabric.utilization()
    );
    book.process();

    info!("-- final state --");
    info!("best bid: {:?}", book.best_bid());
    info!("best ask: {:?}", book.best_ask());
    info!("spread: {:?}", book.spread());
    let depth = book.depth(cfg.book.depth_levels);
    info!("depth bids: {:?}", depth.bids.as_slice());
    info!("depth asks: {:?}", depth.asks.as_slice());
    info!("book:\n{}", book.dump_orders());
    info!("fifo stats: {:?}", fabric.stats());
    info!("error stats: {:?}", book.error_stats());

    Ok(())
}
