use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use peerlink::{Bridge, BridgeConfig, Bridgeable, HandleTable, MarshalOptions, NativeObject};
use peerlink_vm::{Vm, VmOptions};

fn bench_handle_for(c: &mut Criterion) {
    let table = HandleTable::default();
    let objects: Vec<NativeObject> = (0..1_000u64).map(|i| Arc::new(i) as NativeObject).collect();

    for obj in &objects {
        table.handle_for(Some(obj), true);
    }

    c.bench_function("handle_for_existing", |b| {
        b.iter(|| {
            for obj in &objects {
                black_box(table.handle_for(Some(black_box(obj)), false));
            }
        });
    });
}

fn bench_resolve(c: &mut Criterion) {
    let table = HandleTable::default();
    let obj: NativeObject = Arc::new(String::from("resolved"));
    let handle = table.handle_for(Some(&obj), true);

    c.bench_function("resolve", |b| {
        b.iter(|| table.resolve(black_box(handle)).unwrap());
    });
    c.bench_function("resolve_as", |b| {
        b.iter(|| table.resolve_as::<String>(black_box(handle)).unwrap());
    });
}

fn bench_retain_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("retain_release");

    for size in [1usize, 64, 4_096] {
        let table = HandleTable::default();
        let objects: Vec<NativeObject> = (0..size).map(|i| Arc::new(i) as NativeObject).collect();
        let handles: Vec<_> = objects.iter().map(|o| table.handle_for(Some(o), true)).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("cycle", size), &handles, |b, handles| {
            b.iter(|| {
                for &handle in handles {
                    table.retain(handle).unwrap();
                    table.release(handle).unwrap();
                }
            });
        });
    }

    group.finish();
}

fn bench_list_conversion(c: &mut Criterion) {
    let vm = Vm::new(VmOptions::default()).unwrap();
    let bridge = Bridge::new(vm, BridgeConfig::default()).unwrap();
    let list: Vec<String> = (0..1_000).map(|i| format!("item-{}", i)).collect();

    let mut group = c.benchmark_group("list_to_managed");
    group.throughput(Throughput::Elements(list.len() as u64));
    for (name, options) in [("bridged", MarshalOptions::empty()), ("compat", MarshalOptions::KOTLINCOMPAT)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let managed = list.to_managed(&bridge, options).unwrap();
                black_box(managed.is_some())
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_handle_for,
    bench_resolve,
    bench_retain_release,
    bench_list_conversion
);
criterion_main!(benches);
