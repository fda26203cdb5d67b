use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use weft::runtime::gc::{Heap, allocate_sub_heap, merge_heap};

fn bench_allocate(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap/allocate");

    for &count in &[100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut heap = Heap::new();
                for i in 0..n {
                    black_box(heap.allocate(16 + (i % 4) * 8));
                }
                black_box(heap.block_count());
            });
        });
    }

    group.finish();
}

fn bench_collect_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("heap/collect_list");

    for &count in &[100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &n| {
            b.iter(|| {
                let mut heap = Heap::new();
                let root = heap.allocate(16);
                heap.set_root(Some(root));
                let mut tail = root;
                for i in 0..n {
                    let node = heap.allocate(16);
                    // Every other node hangs off the list, the rest are garbage.
                    if i % 2 == 0 {
                        heap.write_word(tail + 8, node).unwrap();
                        tail = node;
                    }
                }
                heap.collect();
                black_box(heap.live_objects());
            });
        });
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    c.bench_function("heap/merge_sub_heap", |b| {
        b.iter(|| {
            let mut parent = Heap::new();
            let root = parent.allocate(16);
            parent.set_root(Some(root));
            let parent = parent.into_ref();

            let link = allocate_sub_heap(&parent, 16);
            if let Some(heap) = link.heap() {
                let mut heap = heap.lock();
                for _ in 0..256 {
                    heap.allocate(24);
                }
            }
            black_box(merge_heap(&link, &parent));
        });
    });
}

criterion_group!(benches, bench_allocate, bench_collect_list, bench_merge);
criterion_main!(benches);
