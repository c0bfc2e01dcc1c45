use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};
use meetup_matcher::config::MatchPolicy;
use meetup_matcher::models::{Event, EventLocation};
use meetup_matcher::services::filter::filter_candidates;
use meetup_matcher::services::resolver::evaluate_pair;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

/// A city's worth of events: clustered around Berlin, spread over a day.
fn generate_events(count: usize) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(2026);
    let base = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

    (0..count)
        .map(|i| {
            let start = base + Duration::minutes(rng.random_range(0..1200));
            Event {
                id: format!("event-{:05}", i),
                owner_id: format!("user-{}", i % (count / 2).max(1)),
                start,
                end: start + Duration::minutes(rng.random_range(30..240)),
                location: EventLocation::Physical {
                    latitude: 52.52 + rng.random_range(-1.5..1.5),
                    longitude: 13.405 + rng.random_range(-2.5..2.5),
                    radius_km: rng.random_range(1.0..30.0),
                },
                created_at: base,
                updated_at: base,
            }
        })
        .collect()
}

fn benchmark_candidate_filter(c: &mut Criterion) {
    let policy = MatchPolicy::default();
    let events = generate_events(500);
    let source = &events[0];

    let mut group = c.benchmark_group("candidate_filter");

    group.bench_function("prefilter_then_exact", |b| {
        b.iter(|| {
            filter_candidates(black_box(source), &events, policy.search_padding_km)
                .into_iter()
                .filter(|candidate| evaluate_pair(source, candidate, &policy).is_ok())
                .count()
        })
    });

    group.bench_function("exact_only", |b| {
        b.iter(|| {
            events
                .iter()
                .filter(|candidate| evaluate_pair(black_box(source), candidate, &policy).is_ok())
                .count()
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_candidate_filter);
criterion_main!(benches);
