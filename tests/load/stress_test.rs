#![cfg(test)]
//! Load tests for the simulation engine
//!
//! - Large fleets complete a tick within the tick interval
//! - Status readers never stall the tick loop
//! - Memory stays bounded by the history ring sizes

use rand::{rngs::StdRng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use reefer_fleet_sim::environment::SyntheticEnvironment;
use reefer_fleet_sim::fleet::{generate_fleet, FleetRegistry};
use reefer_fleet_sim::simulation::{EngineConfig, SimulationEngine};

fn build_engine(fleet_size: usize, max_ticks: u64) -> SimulationEngine {
    let mut rng = StdRng::seed_from_u64(77);
    let fleet = generate_fleet(fleet_size, chrono::Utc::now(), &mut rng);
    let registry = Arc::new(FleetRegistry::from_vehicles(fleet).unwrap());

    SimulationEngine::builder(EngineConfig {
        realtime: false,
        seed: 77,
        max_ticks: Some(max_ticks),
        max_concurrency: 256,
        optimization_every_ticks: 5,
        history_capacity: 32,
        ..EngineConfig::default()
    })
    .registry(registry)
    .environment(Arc::new(SyntheticEnvironment::new(77)))
    .build()
    .unwrap()
}

/// Test: tick latency for a 5,000-vehicle fleet
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default as this is a slow test
async fn test_tick_latency_large_fleet() {
    let mut engine = build_engine(5_000, 10);

    let mut latencies = Vec::new();
    for _ in 0..10 {
        let start = Instant::now();
        let report = engine.tick().await.unwrap();
        latencies.push(start.elapsed());
        assert_eq!(report.readings, 5_000);
    }

    let max_latency = latencies.iter().max().unwrap();
    let avg_latency: Duration = latencies.iter().sum::<Duration>() / latencies.len() as u32;
    println!("Tick latency - Max: {:?}, Avg: {:?}", max_latency, avg_latency);

    // A tick must finish well inside the 30 s reference interval
    assert!(
        max_latency < &Duration::from_secs(5),
        "Tick latency exceeded 5s: {:?}",
        max_latency
    );
}

/// Test: concurrent status readers while the engine runs
///
/// Readers take per-vehicle locks and history read locks; neither may deadlock
/// against in-flight pipelines.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default as this is a slow test
async fn test_concurrent_readers_during_ticks() {
    let mut engine = build_engine(1_000, 20);
    let registry = engine.registry();
    let history = engine.history();
    let cancel = CancellationToken::new();

    let mut readers = JoinSet::new();
    for _ in 0..32 {
        let registry = registry.clone();
        let history = history.clone();
        let cancel = cancel.clone();
        readers.spawn(async move {
            let mut reads = 0usize;
            while !cancel.is_cancelled() {
                for entry in registry.entries().iter().take(50) {
                    let _ = entry.snapshot().await;
                    let _ = history.latest_reading(entry.id());
                    reads += 1;
                }
                let _ = history.recent_alerts(100);
                tokio::task::yield_now().await;
            }
            reads
        });
    }

    let run = engine.run(CancellationToken::new());
    let summary = tokio::time::timeout(Duration::from_secs(60), run)
        .await
        .expect("engine stalled under reader load")
        .unwrap();
    cancel.cancel();

    let mut total_reads = 0;
    while let Some(reads) = readers.join_next().await {
        total_reads += reads.unwrap();
    }
    println!("{} ticks, {} status reads", summary.ticks, total_reads);
    assert_eq!(summary.ticks, 20);
    assert_eq!(summary.readings, 20_000);
}

/// Test: history stays bounded over a long run
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default as this is a slow test
async fn test_history_bounded_over_long_run() {
    let mut engine = build_engine(200, 200);
    engine.run(CancellationToken::new()).await.unwrap();

    let history = engine.history();
    for entry in engine.registry().entries() {
        assert!(history.readings(entry.id()).len() <= 32);
    }
    assert!(history.alert_count() <= 500);
}

/// Test: readings per second
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Ignore by default as this is a slow test
async fn test_throughput_benchmark() {
    let mut engine = build_engine(2_000, u64::MAX);

    let start = Instant::now();
    let mut readings = 0usize;
    while start.elapsed() < Duration::from_secs(5) {
        readings += engine.tick().await.unwrap().readings;
    }

    let elapsed = start.elapsed();
    let per_second = readings as f64 / elapsed.as_secs_f64();
    println!(
        "Throughput: {:.0} readings/second ({} readings in {:?})",
        per_second, readings, elapsed
    );

    assert!(
        per_second > 1_000.0,
        "Throughput too low: {:.0} readings/s",
        per_second
    );
}
