use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reopen_cache::{
    HandleCache, NodeKind, NodePath, OpenConfiguration, RawResource, Result,
};
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

// A resource with a single empty root; opening it costs nothing, so the
// benches measure the cache itself.
struct Empty(String);

impl RawResource for Empty {
    fn name(&self) -> &str {
        &self.0
    }
    fn kind(&self, _path: &NodePath) -> Result<NodeKind> {
        Ok(NodeKind::Collection)
    }
    fn children(&self, _path: &NodePath) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    fn read(&self, _path: &NodePath) -> Result<Value> {
        Ok(Value::Null)
    }
    fn is_writable(&self) -> bool {
        false
    }
    fn create_collection(&mut self, _path: &NodePath) -> Result<()> {
        Ok(())
    }
    fn write(&mut self, _path: &NodePath, _value: Value) -> Result<()> {
        Ok(())
    }
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

fn cache(capacity: usize) -> HandleCache {
    HandleCache::with_capacity(
        |config: &OpenConfiguration| -> Result<Box<dyn RawResource>> {
            Ok(Box::new(Empty(config.target().to_string())))
        },
        NonZeroUsize::new(capacity).unwrap(),
    )
}

fn config(n: u64) -> OpenConfiguration {
    OpenConfiguration::new(format!("/data/{:016x}.json", n))
        .with_arg("r")
        .with_option("pretty", false)
}

fn bench_hit_10k(c: &mut Criterion) {
    c.bench_function("cache::hit_10k_on_100", |b| {
        let cache = cache(100);
        let configs: Vec<_> = lcg(1).take(100).map(config).collect();
        for cfg in &configs {
            let _ = cache.get_or_open(cfg.clone(), false).unwrap();
        }
        b.iter(|| {
            for cfg in configs.iter().cycle().take(10_000) {
                black_box(cache.get_or_open(cfg.clone(), false).unwrap());
            }
        })
    });
}

fn bench_miss_evicting_10k(c: &mut Criterion) {
    c.bench_function("cache::miss_evicting_10k_cap_100", |b| {
        let cache = cache(100);
        let mut fresh = lcg(0xdead_beef);
        b.iter(|| {
            for _ in 0..10_000 {
                let cfg = config(fresh.next().unwrap());
                black_box(cache.get_or_open(cfg, false).unwrap());
            }
        })
    });
}

fn bench_capture_reconstruct_1k(c: &mut Criterion) {
    c.bench_function("cache::capture_reconstruct_1k", |b| {
        let cache = cache(100);
        let handle = cache.get_or_open(config(42), false).unwrap();
        b.iter(|| {
            for _ in 0..1_000 {
                let record = handle.root().unwrap().capture().unwrap();
                black_box(record.reconstruct(&cache).unwrap());
            }
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(3))
        .sample_size(20)
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_hit_10k, bench_miss_evicting_10k, bench_capture_reconstruct_1k
}
criterion_main!(benches);
