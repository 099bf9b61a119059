use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::{sync::Arc, thread};

/// One thread removing every other element while readers search the list.
fn bench_remove_while_reading(c: &mut Criterion) {
    const READERS: usize = 3;
    let mut group = c.benchmark_group("remove_while_reading");

    for size in [1_000, 5_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::new("ConcurrentList", size),
            &size,
            |b, &size| {
                b.iter(|| {
                    use handover::ConcurrentList;
                    let list: Arc<ConcurrentList<usize>> = Arc::new((0..size).collect());
                    let readers: Vec<_> = (0..READERS)
                        .map(|_| {
                            let list = list.clone();
                            thread::spawn(move || list.find_first_if(|&i| i == 1))
                        })
                        .collect();

                    criterion::black_box(list.remove_if(|i| i % 2 == 0));

                    for reader in readers {
                        criterion::black_box(reader.join().unwrap());
                    }
                })
            },
        );

        #[cfg(feature = "std-sync")]
        group.bench_with_input(
            BenchmarkId::new("Mutex<Vec<_>>", size),
            &size,
            |b, &size| {
                b.iter(|| {
                    use std::sync::Mutex;
                    let list = Arc::new(Mutex::new((0..size).rev().collect::<Vec<_>>()));
                    let readers: Vec<_> = (0..READERS)
                        .map(|_| {
                            let list = list.clone();
                            thread::spawn(move || {
                                list.lock().unwrap().iter().find(|&&i| i == 1).copied()
                            })
                        })
                        .collect();

                    list.lock().unwrap().retain(|i| i % 2 != 0);

                    for reader in readers {
                        criterion::black_box(reader.join().unwrap());
                    }
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_remove_while_reading);
criterion_main!(benches);
