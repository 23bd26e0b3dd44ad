// src/config.rs
//
// Central configuration for the warehouse simulator.
// Single source of truth for the episode driver, the stochastic event
// generators, and the telemetry logger. All knobs have documented defaults;
// the CLI (src/main.rs) only overrides what the operator asks for.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Simulated length of one episode in seconds.
    pub episode_duration_s: f64,
    /// Fixed tick size in seconds; simulated time only advances in ticks.
    pub tick_s: f64,
    /// Base RNG seed. Episode `n` is seeded with `seed_base + n`.
    pub seed_base: u64,
    /// Number of robots placed at the charging station on reset.
    pub robot_count: usize,
    /// Robot speed in distance units per second.
    pub robot_speed: f64,
    /// Battery percentage below which an idle robot reports LOW_BATTERY.
    pub low_battery_threshold: f64,
    /// Popularity decay runs at most once per this many seconds.
    pub decay_interval_s: f64,
    /// Mean inter-arrival time of incoming deliveries (exponential).
    pub delivery_mean_interval_s: f64,
    /// Mean inter-arrival time of customer orders (exponential).
    pub order_mean_interval_s: f64,
    /// Period of the shelf fill-rate restock sweep.
    pub restock_sweep_interval_s: f64,
    /// Minimum spacing between robot telemetry snapshots.
    pub snapshot_interval_s: f64,
    /// Directory the per-episode telemetry dump is written to.
    pub log_dir: PathBuf,
    /// Whether telemetry is captured and dumped at all.
    pub telemetry_enabled: bool,
    /// Echo every wire message to stderr (debugging aid).
    pub log_json_messages: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            episode_duration_s: 3600.0,
            tick_s: 1.0,
            seed_base: 42,
            robot_count: 3,
            robot_speed: 1.0,
            low_battery_threshold: 20.0,
            decay_interval_s: 600.0,
            delivery_mean_interval_s: 2.0 * 3600.0,
            order_mean_interval_s: 5.0 * 60.0,
            restock_sweep_interval_s: 1800.0,
            snapshot_interval_s: 1.0,
            log_dir: PathBuf::from("./logs"),
            telemetry_enabled: true,
            log_json_messages: false,
        }
    }
}
