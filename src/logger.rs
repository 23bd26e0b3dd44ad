// src/logger.rs
//
// Per-episode telemetry: robot snapshots on an interval, task events, a
// per-node heatmap, and the aggregate metrics fed from step results. One
// JSON document per episode lands in the log directory. Telemetry failures
// never take the simulation down; they are reported and dropped.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::robot::{Robot, StepOutcome};
use crate::types::{ProductId, RobotIndex, SimTime};
use crate::world::World;

/// Task-event categories recorded in telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskEventKind {
    Move,
    Pickup,
    Dropoff,
    Handover,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RobotSnapshotRecord {
    pub timestamp: f64,
    pub robot_id: String,
    pub robot_index: usize,
    pub pos_x: f64,
    pub pos_y: f64,
    pub current_node: usize,
    pub node_id: String,
    pub status: String,
    pub battery: f64,
    pub carrying: bool,
    pub carrying_product_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskEventRecord {
    pub timestamp: f64,
    pub robot_index: usize,
    pub robot_id: String,
    pub event_type: TaskEventKind,
    pub product_id: i64,
    pub from_node: i64,
    pub to_node: i64,
    pub distance_traveled: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapEntry {
    pub node_index: usize,
    pub node_id: String,
    pub visit_count: u64,
    pub total_time_spent: f64,
    pub robot_visits: Vec<u64>,
}

/// Aggregate episode metrics. Updated from every `step_simulation` result
/// and from the movement ticks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeMetrics {
    pub episode: u64,
    pub total_time: f64,
    pub orders_completed: u64,
    pub orders_failed: u64,
    pub avg_completion_time: f64,
    pub total_distance_traveled: f64,
    pub total_battery_used: f64,
    pub optimal_zone_placements: u64,
    pub suboptimal_placements: u64,
    pub robot_utilization: f64,
}

/// The compact metrics block sent on EPISODE_END.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeEndMetrics {
    pub orders_completed: u64,
    pub orders_failed: u64,
    pub total_distance: f64,
    pub avg_completion_time: f64,
    pub robot_utilization: f64,
}

impl From<&EpisodeMetrics> for EpisodeEndMetrics {
    fn from(m: &EpisodeMetrics) -> Self {
        Self {
            orders_completed: m.orders_completed,
            orders_failed: m.orders_failed,
            total_distance: m.total_distance_traveled,
            avg_completion_time: m.avg_completion_time,
            robot_utilization: m.robot_utilization,
        }
    }
}

/// The on-disk dump, one document per episode.
#[derive(Debug, Clone, Serialize)]
struct EpisodeDump<'a> {
    episode: u64,
    metrics: &'a EpisodeMetrics,
    robot_snapshots: &'a [RobotSnapshotRecord],
    task_events: &'a [TaskEventRecord],
    heatmap: &'a [HeatmapEntry],
}

pub struct EpisodeLogger {
    log_dir: PathBuf,
    snapshot_interval: f64,
    enabled: bool,
    recording: bool,
    last_snapshot: f64,
    metrics: EpisodeMetrics,
    snapshots: Vec<RobotSnapshotRecord>,
    task_events: Vec<TaskEventRecord>,
    heatmap: Vec<HeatmapEntry>,
}

impl EpisodeLogger {
    pub fn new(log_dir: impl Into<PathBuf>, snapshot_interval: f64, enabled: bool) -> Self {
        Self {
            log_dir: log_dir.into(),
            snapshot_interval,
            enabled,
            recording: false,
            last_snapshot: 0.0,
            metrics: EpisodeMetrics::default(),
            snapshots: Vec::new(),
            task_events: Vec::new(),
            heatmap: Vec::new(),
        }
    }

    pub fn metrics(&self) -> &EpisodeMetrics {
        &self.metrics
    }

    pub fn task_events(&self) -> &[TaskEventRecord] {
        &self.task_events
    }

    /// Reset all buffers and start recording a new episode.
    pub fn start_episode(&mut self, episode: u64, world: &World, robots: &[Robot]) {
        self.snapshots.clear();
        self.task_events.clear();
        self.metrics = EpisodeMetrics {
            episode,
            ..EpisodeMetrics::default()
        };
        self.last_snapshot = 0.0;
        self.heatmap = world
            .nodes
            .iter()
            .enumerate()
            .map(|(node_index, node)| HeatmapEntry {
                node_index,
                node_id: node.id.clone(),
                visit_count: 0,
                total_time_spent: 0.0,
                robot_visits: vec![0; robots.len()],
            })
            .collect();
        self.recording = self.enabled;
    }

    /// Capture one snapshot per robot if the interval has elapsed, and feed
    /// the heatmap with the robots' current positions.
    pub fn log_robot_snapshots(&mut self, now: SimTime, world: &World, robots: &[Robot]) {
        if !self.recording {
            return;
        }
        if now - self.last_snapshot < self.snapshot_interval && now > 0.0 {
            return;
        }
        self.last_snapshot = now;

        for (robot_index, robot) in robots.iter().enumerate() {
            let node_id = world
                .nodes
                .get(robot.current_node)
                .map(|n| n.id.clone())
                .unwrap_or_default();
            self.snapshots.push(RobotSnapshotRecord {
                timestamp: now,
                robot_id: robot.id.clone(),
                robot_index,
                pos_x: robot.pos_x,
                pos_y: robot.pos_y,
                current_node: robot.current_node,
                node_id,
                status: robot.status.as_str().to_string(),
                battery: robot.battery,
                carrying: robot.carrying,
                carrying_product_id: if robot.carrying {
                    robot
                        .current_order
                        .as_ref()
                        .map(|o| i64::from(o.product_id))
                        .unwrap_or(-1)
                } else {
                    -1
                },
            });
            self.touch_heatmap(robot.current_node, robot_index);
        }
    }

    fn touch_heatmap(&mut self, node_index: usize, robot_index: RobotIndex) {
        if let Some(entry) = self.heatmap.get_mut(node_index) {
            entry.visit_count += 1;
            entry.total_time_spent += self.snapshot_interval;
            if let Some(visits) = entry.robot_visits.get_mut(robot_index) {
                *visits += 1;
            }
        }
    }

    pub fn log_task_event(
        &mut self,
        now: SimTime,
        robot_index: RobotIndex,
        robots: &[Robot],
        kind: TaskEventKind,
        product_id: ProductId,
        from_node: i64,
        to_node: i64,
        distance: f64,
    ) {
        if !self.recording {
            return;
        }
        let robot_id = robots
            .get(robot_index)
            .map(|r| r.id.clone())
            .unwrap_or_default();
        self.task_events.push(TaskEventRecord {
            timestamp: now,
            robot_index,
            robot_id,
            event_type: kind,
            product_id: i64::from(product_id),
            from_node,
            to_node,
            distance_traveled: distance,
        });
    }

    /// Fold one discrete step result into the aggregates.
    pub fn update_metrics(&mut self, outcome: &StepOutcome) {
        if !self.recording {
            return;
        }
        if outcome.order_completed {
            self.metrics.orders_completed += 1;
        }
        if outcome.order_failed {
            self.metrics.orders_failed += 1;
        }
        self.metrics.total_battery_used += outcome.battery_used;
        if outcome.optimal_zone_placement {
            self.metrics.optimal_zone_placements += 1;
        } else if outcome.order_completed {
            self.metrics.suboptimal_placements += 1;
        }
    }

    /// Distance covered by gradual movement (outside step results).
    pub fn add_travel_distance(&mut self, distance: f64) {
        if self.recording {
            self.metrics.total_distance_traveled += distance;
        }
    }

    /// Close the episode: derive the averaged metrics.
    pub fn end_episode(&mut self, now: SimTime, fleet_size: usize) {
        if !self.recording {
            return;
        }
        self.metrics.total_time = now;
        if self.metrics.orders_completed > 0 {
            self.metrics.avg_completion_time = now / self.metrics.orders_completed as f64;
        }

        // Coarse utilisation: share of logged activity over robot-seconds.
        let active_events = self
            .task_events
            .iter()
            .filter(|e| {
                matches!(
                    e.event_type,
                    TaskEventKind::Move | TaskEventKind::Pickup | TaskEventKind::Dropoff
                )
            })
            .count() as f64;
        let possible = now * fleet_size as f64;
        if possible > 0.0 {
            self.metrics.robot_utilization = (active_events / possible * 100.0).min(100.0);
        }
        self.recording = false;
    }

    /// Write the episode document. Returns the path written.
    pub fn save(&self, filename: &str) -> io::Result<PathBuf> {
        std::fs::create_dir_all(&self.log_dir)?;
        let path = self.log_dir.join(filename);
        let file = File::create(&path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(
            writer,
            &EpisodeDump {
                episode: self.metrics.episode,
                metrics: &self.metrics,
                robot_snapshots: &self.snapshots,
                task_events: &self.task_events,
                heatmap: &self.heatmap,
            },
        )
        .map_err(io::Error::from)?;
        Ok(path)
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}
