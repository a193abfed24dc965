//! A small producer/consumer pipeline over one shared queue.
//!
//! Run with: `cargo run --example pipeline`

use ringmpmc::{Config, Queue, RingError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

const N_PRODUCERS: u64 = 2;
const N_CONSUMERS: usize = 2;
const ITEMS_PER_PRODUCER: u64 = 50_000;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = Config {
        enable_metrics: true,
        pop_timeout: Duration::from_millis(200),
        ..Config::new(16)
    };
    let queue = Queue::<u64>::new(config);
    let done = Arc::new(AtomicBool::new(false));

    let mut producers = Vec::new();
    for producer_id in 0..N_PRODUCERS {
        let queue = queue.clone();
        producers.push(thread::spawn(move || {
            let mut sent = 0u64;
            while sent < ITEMS_PER_PRODUCER {
                let batch_len = 8.min(ITEMS_PER_PRODUCER - sent);
                let batch: Vec<u64> = (sent..sent + batch_len)
                    .map(|i| (producer_id << 32) | i)
                    .collect();
                match queue.push(&batch) {
                    Ok(_) => sent += batch_len,
                    Err(RingError::CapacityExceeded) => thread::yield_now(),
                    Err(err) => panic!("push failed: {err}"),
                }
            }
            info!(producer_id, sent, "producer finished");
        }));
    }

    let mut consumers = Vec::new();
    for consumer_id in 0..N_CONSUMERS {
        let queue = queue.clone();
        let done = Arc::clone(&done);
        consumers.push(thread::spawn(move || {
            let mut out = [0u64; 16];
            let mut received = 0u64;
            loop {
                match queue.pop(&mut out) {
                    Ok(taken) => received += taken as u64,
                    Err(RingError::PopTimeout) => {
                        if done.load(Ordering::Acquire) && queue.is_empty() {
                            break;
                        }
                    }
                    Err(err) => panic!("pop failed: {err}"),
                }
            }
            info!(consumer_id, received, "consumer finished");
            received
        }));
    }

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let received: u64 = consumers.into_iter().map(|c| c.join().unwrap()).sum();
    assert_eq!(received, N_PRODUCERS * ITEMS_PER_PRODUCER);

    info!(
        capacity = queue.capacity(),
        metrics = ?queue.metrics(),
        "pipeline drained"
    );
}
