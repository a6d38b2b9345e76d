//! Background simplification with stale-result discarding.
//!
//! Two tracks are submitted back to back, as when a user opens one flight
//! and immediately switches to another. Only the second result is used.
//!
//! Run with: cargo run --example background_simplify

use igc_analysis::{Fix, SimplifyConfig, SimplifyWorker};

fn wavy_track(n: usize, amplitude_deg: f64) -> Vec<Fix> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            Fix::new(t, 46.0 + t * 1e-4, 8.0 + amplitude_deg * (t / 30.0).sin(), 1000.0)
        })
        .collect()
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            return;
        }
    };

    let worker = SimplifyWorker::new(runtime.handle().clone());
    let config = SimplifyConfig::default();

    let first_track = wavy_track(50_000, 0.002);
    let second_track = wavy_track(20_000, 0.001);

    let first = worker.submit(first_track.clone(), &config);
    let second = worker.submit(second_track.clone(), &config);
    println!("Submitted jobs {} and {}", first.job_id(), second.job_id());

    runtime.block_on(async {
        match first.wait().await {
            Ok(r) => println!("Job {} returned {} fixes (unexpected)", r.job_id, r.simplified_fixes.len()),
            Err(e) => println!("Job 1 discarded: {}", e),
        }

        let track = second.simplified_or(&second_track).await;
        println!(
            "Rendering job 2: {} -> {} fixes",
            second_track.len(),
            track.len()
        );
    });
}
