//! Per-stage timing for the frame pipeline.
//!
//! When a [`Profiler`] resource is present in the world, every stage records
//! its wall time under its stage name. `SimWorld` inserts one automatically
//! when built with the `profile` feature:
//!
//! ```bash
//! cargo test --release --features profile
//! ```
//!
//! or explicitly via `SimWorld::enable_profiling`.

use bevy_ecs::prelude::*;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Collects timing data for named stages and reports aggregated statistics.
#[derive(Resource, Default, Debug, Clone)]
pub struct Profiler {
    sections: HashMap<&'static str, SectionStats>,
    frame_count: u64,
}

/// Statistics for one stage.
#[derive(Default, Debug, Clone, Copy)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
}

impl SectionStats {
    pub fn avg_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }

    fn add(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
        self.min_time = Some(self.min_time.map_or(elapsed, |m| m.min(elapsed)));
        self.max_time = Some(self.max_time.map_or(elapsed, |m| m.max(elapsed)));
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one run of `name`.
    pub fn record(&mut self, name: &'static str, elapsed: Duration) {
        self.sections.entry(name).or_default().add(elapsed);
    }

    /// Time a closure under `name`.
    pub fn time_section<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    /// Count one completed frame.
    pub fn end_frame(&mut self) {
        self.frame_count += 1;
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn get_section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }

    pub fn section_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.sections.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Sum of all recorded stage time.
    pub fn total_time(&self) -> Duration {
        self.sections.values().map(|s| s.total_time).sum()
    }

    /// Table of stages sorted by total time, slowest first.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== Stage Profile ({} frames) ===", self.frame_count);

        let mut sections: Vec<_> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time));
        let total = self.total_time();

        let _ = writeln!(
            out,
            "{:<22} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Stage", "Total", "Avg/frame", "Min", "Max", "% Time"
        );
        let _ = writeln!(out, "{}", "-".repeat(75));

        for (name, stats) in &sections {
            let avg_per_frame = if self.frame_count > 0 {
                stats.total_time / self.frame_count as u32
            } else {
                Duration::ZERO
            };
            let pct = if total.as_nanos() > 0 {
                (stats.total_time.as_nanos() as f64 / total.as_nanos() as f64) * 100.0
            } else {
                0.0
            };
            let _ = writeln!(
                out,
                "{:<22} {:>10.2?} {:>10.2?} {:>10.2?} {:>10.2?} {:>7.1}%",
                name,
                stats.total_time,
                avg_per_frame,
                stats.min_time.unwrap_or(Duration::ZERO),
                stats.max_time.unwrap_or(Duration::ZERO),
                pct
            );
        }

        let _ = writeln!(out, "{}", "-".repeat(75));
        let _ = writeln!(out, "{:<22} {:>10.2?}", "TOTAL", total);
        if self.frame_count > 0 {
            let avg_frame = total / self.frame_count as u32;
            let fps = if avg_frame.as_secs_f64() > 0.0 {
                1.0 / avg_frame.as_secs_f64()
            } else {
                0.0
            };
            let _ = writeln!(out, "{:<22} {:>10.2?} ({:.1} FPS)", "Avg per frame", avg_frame, fps);
        }
        out
    }

    pub fn print_summary(&self) {
        println!("\n{}", self.summary());
    }

    pub fn reset(&mut self) {
        self.sections.clear();
        self.frame_count = 0;
    }
}

/// Wall-clock summary of a whole run, with an optional stage breakdown.
#[derive(Debug, Default)]
pub struct StressProfiler {
    pub frames: u64,
    pub total_time: Duration,
}

impl StressProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, duration: Duration) {
        self.total_time += duration;
        self.frames += 1;
    }

    pub fn avg_frame(&self) -> Duration {
        if self.frames == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.frames as u32
        }
    }

    pub fn print_summary(&self, agents: usize, stages: Option<&Profiler>) {
        let avg = self.avg_frame();
        println!("\n=== Stress Run Summary ===");
        println!("Robots: {}", agents);
        println!("Frames: {}", self.frames);
        println!("Total time: {:?}", self.total_time);
        println!("Avg per frame: {:?} ({:.2} ms)", avg, avg.as_secs_f64() * 1000.0);
        if let Some(profiler) = stages {
            profiler.print_summary();
        }
    }
}
