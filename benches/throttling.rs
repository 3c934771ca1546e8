use alert_throttle::{
    FileLedgerStore, InMemoryLedgerStore, LedgerState, LedgerStore, Metrics, Normalizer,
    NotificationLimits, RateLimiter, ResetPolicy, SystemClock,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tempfile::TempDir;

/// Benchmark normalization and hashing speed
fn bench_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");
    let normalizer = Normalizer::default();

    let short = "Undefined index: id";
    let long = "PDOException: SQLSTATE[HY000] [2002] Connection refused in \
                /srv/releases/20240501/app/src/Db/Connection.php:118 [pid 48211] \
                while handling https://shop.example.com/checkout?step=3";

    group.bench_function("short_message", |b| {
        b.iter(|| normalizer.hash(black_box(short)))
    });

    group.bench_function("long_message", |b| {
        b.iter(|| normalizer.hash(black_box(long)))
    });

    group.bench_function("identity_long_message", |b| {
        let identity = Normalizer::identity();
        b.iter(|| identity.hash(black_box(long)))
    });

    group.finish();
}

fn limiter(store: Arc<dyn LedgerStore>) -> RateLimiter {
    RateLimiter::new(
        store,
        Arc::new(SystemClock::new()),
        ResetPolicy::midnight_utc(),
        NotificationLimits {
            max_per_window: u32::MAX,
            max_per_request: u32::MAX,
        },
        Metrics::new(),
    )
}

/// Benchmark limiter decisions against each ledger store
fn bench_decisions(c: &mut Criterion) {
    let mut group = c.benchmark_group("decisions");
    let normalizer = Normalizer::default();
    let hash = normalizer.hash("Database gone away");

    group.throughput(Throughput::Elements(100));

    group.bench_function(BenchmarkId::new("duplicate", "in_memory"), |b| {
        let limiter = limiter(Arc::new(InMemoryLedgerStore::new()));
        limiter.check(&hash).unwrap();
        b.iter(|| {
            for _ in 0..100 {
                black_box(limiter.check(black_box(&hash)).unwrap());
            }
        })
    });

    group.bench_function(BenchmarkId::new("duplicate", "file"), |b| {
        let dir = TempDir::new().unwrap();
        let limiter = limiter(Arc::new(FileLedgerStore::new(dir.path().join("email-sent"))));
        limiter.check(&hash).unwrap();
        b.iter(|| {
            for _ in 0..100 {
                black_box(limiter.check(black_box(&hash)).unwrap());
            }
        })
    });

    group.finish();
}

/// Benchmark ledger decoding by ledger size
fn bench_ledger_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_decode");
    let normalizer = Normalizer::identity();

    for size in [10usize, 100, 1000] {
        let mut state = LedgerState::new();
        for i in 0..size {
            state
                .sent_hashes
                .insert(normalizer.hash(&format!("message {}", i)));
        }
        state.daily_count = size as u32;
        let encoded = state.encode().unwrap();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("hashes", size), &encoded, |b, encoded| {
            b.iter(|| LedgerState::decode(black_box(encoded)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_normalization,
    bench_decisions,
    bench_ledger_decode
);
criterion_main!(benches);
