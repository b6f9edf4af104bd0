//! # Request/Reply Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | Correlation registry | register + resolve, contended and not |
//! | Envelope codec | encode / decode of a cart reply |
//! | Round trip | client -> responder -> client on the in-process broker |

use bus_rpc::{CorrelationRegistry, RequestReplyClient, RpcConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mtogo_tests::integration::{spawn_echo, Ping, Pong, REPLIES, REQUESTS};
use rand::Rng;
use rust_decimal::Decimal;
use shared_bus::{decode, encode, InMemoryBroker};
use shared_types::{CartResponse, CorrelationId, OrderItem};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Correlation registry
// ============================================================================

fn bench_registry(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-registry");

    let registry = CorrelationRegistry::<u64>::new();
    group.bench_function("register_resolve", |b| {
        b.iter(|| {
            let id = CorrelationId::new();
            let pending = registry
                .register(id, "bench", Duration::from_secs(30))
                .unwrap();
            black_box(registry.resolve(id, 1));
            drop(pending);
        })
    });

    // Resolve against a registry already holding many entries.
    for backlog in [100usize, 10_000] {
        let loaded = CorrelationRegistry::<u64>::new();
        let _held: Vec<_> = (0..backlog)
            .map(|_| {
                loaded
                    .register(CorrelationId::new(), "backlog", Duration::from_secs(300))
                    .unwrap()
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("register_resolve_with_backlog", backlog),
            &backlog,
            |b, _| {
                b.iter(|| {
                    let id = CorrelationId::new();
                    let pending = loaded
                        .register(id, "bench", Duration::from_secs(30))
                        .unwrap();
                    black_box(loaded.resolve(id, 1));
                    drop(pending);
                })
            },
        );
    }

    group.finish();
}

// ============================================================================
// Envelope codec
// ============================================================================

fn sample_reply(items: usize) -> CartResponse {
    let mut rng = rand::thread_rng();
    CartResponse {
        user_id: "bench-user".to_string(),
        items: (0..items)
            .map(|i| OrderItem {
                menu_item_id: i as i32,
                menu_item_name: format!("Dish {i}"),
                price: Decimal::new(rng.gen_range(100..10_000), 2),
                quantity: rng.gen_range(1..5),
            })
            .collect(),
    }
}

fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope-codec");

    for items in [1usize, 10, 100] {
        let reply = sample_reply(items);
        let id = CorrelationId::new();
        let bytes = encode(id, &reply).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("encode", items), &reply, |b, reply| {
            b.iter(|| black_box(encode(id, reply).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", items), &bytes, |b, bytes| {
            b.iter(|| black_box(decode::<CartResponse>(bytes).unwrap()))
        });
    }

    group.finish();
}

// ============================================================================
// In-process round trip
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    let broker = InMemoryBroker::new();
    let (client, _echo) = rt.block_on(async {
        let echo = spawn_echo(&broker).await;
        let client = Arc::new(RequestReplyClient::new(
            Arc::new(broker.clone()),
            RpcConfig::default(),
        ));
        client.start(&[REPLIES]).await.unwrap();
        (client, echo)
    });

    let mut group = c.benchmark_group("round-trip");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("echo", |b| {
        b.to_async(&rt).iter(|| {
            let client = Arc::clone(&client);
            async move {
                let pong: Pong = client
                    .call(REQUESTS, REPLIES, &Ping { seq: 1, delay_ms: 0 })
                    .await
                    .unwrap();
                black_box(pong)
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_registry, bench_envelope, bench_round_trip);
criterion_main!(benches);
