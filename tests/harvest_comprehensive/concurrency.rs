//! Concurrency Tests
//!
//! Many execution contexts building and storing traces at once, and
//! harvests racing with stores.

use crate::*;
use std::collections::HashSet;
use std::sync::Barrier;
use std::thread;
use tracewarden::{TraceId, MAX_FORCED_TRACES};

#[test]
fn test_each_thread_builds_its_own_trace() {
    init_tracing();
    const THREADS: usize = 8;
    const UNITS: usize = 10;

    let agent = Arc::new(
        TraceAgent::builder()
            .config(keep_all().diagnostic_mode(true))
            .build()
            .unwrap(),
    );
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let agent = Arc::clone(&agent);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for u in 0..UNITS {
                    agent.on_push(format!("thread-{}", t)).unwrap();
                    agent.on_push(format!("unit-{}", u)).unwrap();
                    assert_eq!(agent.scope_depth(), 2);
                    agent.on_pop().unwrap();
                    agent.on_pop().unwrap();
                    assert_eq!(agent.scope_depth(), 0);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert!(agent.registry().is_empty());
    let recent = agent.sampler().recent_traces();
    assert_eq!(recent.len(), THREADS * UNITS);

    // no trace mixes segments from two threads
    for trace in &recent {
        let outer = &trace.root().children()[0];
        assert!(outer.name().starts_with("thread-"));
        assert_eq!(outer.children().len(), 1);
        assert_eq!(trace.segment_count(), 3);
    }
    let ids: HashSet<TraceId> = recent.iter().map(|t| t.id()).collect();
    assert_eq!(ids.len(), THREADS * UNITS);
}

#[test]
fn test_concurrent_stores_and_harvests_lose_nothing() {
    const WRITERS: usize = 3;
    const PER_WRITER: usize = 5;
    assert!(WRITERS * PER_WRITER <= MAX_FORCED_TRACES);

    let config = SamplerConfig::default()
        .trace_threshold_secs(600.0)
        .sampling_rate(0);
    let sampler = Arc::new(Sampler::new(&config));
    let barrier = Arc::new(Barrier::new(WRITERS + 1));

    let writers: Vec<_> = (0..WRITERS)
        .map(|_| {
            let sampler = Arc::clone(&sampler);
            let barrier = Arc::clone(&barrier);
            let config = config.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut ids = Vec::new();
                for i in 0..PER_WRITER {
                    let trace = finished(&config, i as u64, true);
                    ids.push(trace.id());
                    sampler.store(trace);
                    thread::yield_now();
                }
                ids
            })
        })
        .collect();

    barrier.wait();
    let mut harvested = Vec::new();
    for _ in 0..100 {
        harvested.extend(sampler.harvest(Vec::new()).iter().map(|t| t.id()));
    }

    let mut stored = Vec::new();
    for w in writers {
        stored.extend(w.join().unwrap());
    }
    harvested.extend(sampler.harvest(Vec::new()).iter().map(|t| t.id()));

    let unique: HashSet<_> = harvested.iter().copied().collect();
    assert_eq!(unique.len(), harvested.len(), "a trace was emitted twice");
    assert_eq!(unique, stored.into_iter().collect::<HashSet<_>>());
}

#[test]
fn test_slowest_under_contention_is_global_max() {
    const THREADS: u64 = 6;

    let config = keep_all();
    let sampler = Arc::new(Sampler::new(&config));
    let barrier = Arc::new(Barrier::new(THREADS as usize));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let sampler = Arc::clone(&sampler);
            let barrier = Arc::clone(&barrier);
            let config = config.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..50u64 {
                    sampler.store(finished(&config, t * 1_000 + i, false));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(
        sampler.slowest_duration(),
        Some(Duration::from_millis((THREADS - 1) * 1_000 + 49))
    );
}
