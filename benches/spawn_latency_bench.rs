// Supervisor overhead benchmark
// Measures one supervised run from spawn to reaped child with both relays joined
// Target: p50 < 20ms, p95 < 50ms for a trivial child

use std::time::{Duration, Instant};
use testbox::core::supervisor::ProcessSupervisor;

/// Benchmark configuration
const ITERATIONS: usize = 200;
const WARMUP_ITERATIONS: usize = 20;

/// Latency percentiles
struct LatencyStats {
    p50: Duration,
    p95: Duration,
    p99: Duration,
    min: Duration,
    max: Duration,
    mean: Duration,
}

impl LatencyStats {
    fn from_samples(mut samples: Vec<Duration>) -> Self {
        samples.sort();
        let len = samples.len();

        let p50_idx = (len as f64 * 0.50) as usize;
        let p95_idx = (len as f64 * 0.95) as usize;
        let p99_idx = (len as f64 * 0.99) as usize;

        let sum: Duration = samples.iter().sum();
        let mean = sum / len as u32;

        Self {
            p50: samples[p50_idx],
            p95: samples[p95_idx],
            p99: samples[p99_idx],
            min: samples[0],
            max: samples[len - 1],
            mean,
        }
    }

    fn print(&self) {
        println!("  p50: {:?}", self.p50);
        println!("  p95: {:?}", self.p95);
        println!("  p99: {:?}", self.p99);
        println!("  min: {:?}", self.min);
        println!("  max: {:?}", self.max);
        println!("  mean: {:?}", self.mean);
    }
}

struct Scenario {
    name: &'static str,
    command: Vec<String>,
    input: Vec<u8>,
    p50_budget: Duration,
    p95_budget: Duration,
}

fn sh(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Returns whether the scenario met its budget.
fn run_scenario(supervisor: &ProcessSupervisor, scenario: &Scenario) -> bool {
    let run_once = || {
        let start = Instant::now();
        let _ = supervisor.capture(
            &scenario.command,
            &scenario.input,
            Some(Duration::from_secs(10)),
        );
        start.elapsed()
    };

    for _ in 0..WARMUP_ITERATIONS {
        run_once();
    }
    let samples: Vec<Duration> = (0..ITERATIONS).map(|_| run_once()).collect();
    let stats = LatencyStats::from_samples(samples);

    println!("\n=== {} ===", scenario.name);
    stats.print();

    let passed = stats.p50 < scenario.p50_budget && stats.p95 < scenario.p95_budget;
    if passed {
        println!("PASS");
    } else {
        println!(
            "FAIL: p50={:?} (target <{:?}), p95={:?} (target <{:?})",
            stats.p50, scenario.p50_budget, stats.p95, scenario.p95_budget
        );
    }
    passed
}

fn main() {
    println!("=== testbox supervisor spawn latency ===");
    println!("Iterations: {} (after {} warmup)", ITERATIONS, WARMUP_ITERATIONS);

    let supervisor = ProcessSupervisor::default();
    let scenarios = [
        Scenario {
            name: "true",
            command: vec!["/bin/true".to_string()],
            input: Vec::new(),
            p50_budget: Duration::from_millis(20),
            p95_budget: Duration::from_millis(50),
        },
        Scenario {
            name: "cat 1 MiB",
            command: sh("cat"),
            input: vec![b'7'; 1 << 20],
            p50_budget: Duration::from_millis(60),
            p95_budget: Duration::from_millis(120),
        },
    ];

    let passed = scenarios
        .iter()
        .filter(|scenario| run_scenario(&supervisor, scenario))
        .count();

    println!("\n=== Summary ===");
    println!("{}/{} scenarios passed", passed, scenarios.len());
    if passed != scenarios.len() {
        std::process::exit(1);
    }
}
