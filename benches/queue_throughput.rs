use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use agentmesh::core::queue;

fn spsc_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_round_trip");
    for &capacity in &[256usize, 4096, 65536] {
        group.throughput(Throughput::Elements(capacity as u64));
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let (producer, consumer) = queue::bounded::<u64>(capacity);
                let writer = thread::spawn(move || {
                    for v in 0..capacity as u64 {
                        while !producer.offer(v) {
                            std::hint::spin_loop();
                        }
                    }
                });

                let mut received = 0usize;
                while received < capacity {
                    received += consumer.drain_to(capacity, |v| {
                        black_box(v);
                    });
                }
                writer.join().unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, spsc_round_trip);
criterion_main!(benches);
