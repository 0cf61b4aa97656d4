//! Headless run of the robot haul simulation.
//!
//! Run with: cargo run --release --example haul_demo -- --config configuration.json
//!
//! Logging follows `RUST_LOG` (default `info`).

use haul_sim::{config::config_path_from_args, RobotState, SimWorld, SpawnConfig, StressProfiler};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAMES: usize = 600;
const FRAME_DT: f32 = 1.0 / 60.0;

fn main() {
    init_tracing();
    info!("=== Robot Haul Simulation ===");

    let path = config_path_from_args(std::env::args().skip(1));
    let defaults = SpawnConfig {
        count: 10_000,
        max_size: 1000.0,
        robot_speed: 20.0,
        ..SpawnConfig::default()
    };
    let mut sim = SimWorld::from_config_file(defaults, &path);
    sim.enable_profiling();

    let mut run = StressProfiler::new();
    for frame in 0..FRAMES {
        let start = Instant::now();
        sim.advance_frame(FRAME_DT);
        run.record_frame(start.elapsed());

        if (frame + 1) % 120 == 0 {
            let snapshot = sim.snapshot();
            info!(
                tick = snapshot.tick,
                time = snapshot.time,
                idle = snapshot.count_in_state(RobotState::Idle),
                carrying = snapshot.count_in_state(RobotState::Carrying),
                dropping = snapshot.count_in_state(RobotState::Dropping),
                cooling = snapshot.count_in_state(RobotState::CoolingDown),
                "progress"
            );
        }
    }

    let robots = sim.robot_count();
    run.print_summary(robots, sim.profiler());
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
