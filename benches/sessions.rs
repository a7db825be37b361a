use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use workgate::identity::{Principal, SessionStore};
use workgate::onboarding::{completion, RedirectPolicy};

fn bench_sessions(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_store");
    group.sample_size(20);

    for &n in &[1_000usize, 10_000usize] {
        let store = SessionStore::default();
        let grants: Vec<_> = (0..n).map(|i| store.issue(&format!("user-{i}")).unwrap()).collect();
        let mut rng = StdRng::seed_from_u64(0xBEEF_CAFE);
        let picks: Vec<usize> = (0..1_000).map(|_| rng.gen_range(0..n)).collect();

        group.throughput(Throughput::Elements(picks.len() as u64));
        group.bench_with_input(BenchmarkId::new("validate_access", n), &n, |b, _| {
            b.iter(|| {
                let mut hits = 0usize;
                for &i in &picks {
                    if store.validate_access(&grants[i].access_token).is_some() { hits += 1; }
                }
                criterion::black_box(hits);
            });
        });
    }

    group.bench_function("issue_then_refresh", |b| {
        let store = SessionStore::default();
        b.iter(|| {
            let g = store.issue("bench-user").unwrap();
            criterion::black_box(store.refresh(&g.refresh_token));
        });
    });
    group.finish();
}

fn bench_onboarding(c: &mut Criterion) {
    let mut group = c.benchmark_group("onboarding");
    let policy = RedirectPolicy::default();
    let principal = Principal {
        id: "u1".into(),
        email: "u1@example.com".into(),
        display_name: Some("  Ada ".into()),
        credential_set: true,
        avatar_url: None,
    };
    group.bench_function("completion", |b| {
        b.iter(|| criterion::black_box(completion(&principal, criterion::black_box(1))));
    });
    group.bench_function("is_at_onboarding", |b| {
        b.iter(|| criterion::black_box(policy.is_at_onboarding(criterion::black_box("/onboarding/profile?step=2"))));
    });
    group.finish();
}

criterion_group!(benches, bench_sessions, bench_onboarding);
criterion_main!(benches);
