//! Wareflow core library.
//!
//! A discrete-event warehouse simulator that drives an external
//! reinforcement-learning policy over a line-delimited JSON channel. The
//! binary (`src/main.rs`) is a thin stdio harness around these components.
//!
//! # Architecture
//!
//! - **Graph & routing** (`graph`): static adjacency list, Dijkstra with
//!   avoid-sets and an A* hook.
//! - **World model** (`world`): nodes with tagged payloads (shelf, dock,
//!   charging station, front desk), the product catalogue and the canonical
//!   13-node layout.
//! - **Robots** (`robot`): lifecycle state machine, battery accounting and
//!   the discrete action interpreter feeding the RL result map.
//! - **Popularity & zones** (`popularity`): demand counters with periodic
//!   decay and the Hot/Warm/Cold placement recommendation.
//! - **Events** (`events`): deterministic time-ordered queue plus seeded
//!   stochastic generators for deliveries, orders and restock sweeps.
//! - **Negotiation** (`tasks`, `episode`): every task round-trips through
//!   the policy; customer-order stock is reserved before the task is sent
//!   and rolled back exactly on WAIT or protocol error.
//! - **Protocol** (`protocol`, `snapshot`): typed newline-framed JSON
//!   messages over generic reader/writer pairs.
//! - **Telemetry** (`logger`): per-episode snapshots, task events, heatmap
//!   and metrics, dumped as one JSON document per episode.
//!
//! The whole simulator is single-threaded and cooperative: simulated time
//! advances only in `Simulator::process_events`, and the only suspension
//! point is the blocking read for a task's paired action.

pub mod config;
pub mod episode;
pub mod events;
pub mod graph;
pub mod logger;
pub mod popularity;
pub mod protocol;
pub mod robot;
pub mod snapshot;
pub mod tasks;
pub mod types;
pub mod world;

pub use config::SimConfig;
pub use episode::Simulator;
pub use events::{EventKind, EventSystem, SimEvent};
pub use graph::{Graph, Path};
pub use logger::{EpisodeLogger, EpisodeMetrics};
pub use protocol::{stdio_channel, ActionMsg, Inbound, JsonLineChannel, Outbound, ProtocolError};
pub use robot::{init_fleet, step_simulation, Robot, StepAction, StepOutcome};
pub use tasks::{PostponeTracker, Reservation, Task, TaskCounter};
pub use types::{ActionKind, NodeType, Priority, RobotStatus, StatusKind, TaskKind, Zone};
pub use world::World;

#[cfg(test)]
mod tests {
    use super::*;

    /// The rerouting guarantee the layout is built around: the directed
    /// shelf_A -> charging_station edge must not be used backwards.
    #[test]
    fn charging_station_to_shelf_a_routes_around_directed_edge() {
        let w = World::canonical();
        let path = w.graph.shortest_path(w.charging_station, w.shelves[0]);
        assert!(path.found);
        assert_eq!(path.nodes, vec![w.charging_station, w.shelves[1], w.shelves[0]]);
        assert!((path.total_distance - 8.0).abs() < 1e-12);

        // The forward direction uses the direct edge.
        let forward = w.graph.shortest_path(w.shelves[0], w.charging_station);
        assert!((forward.total_distance - 3.0).abs() < 1e-12);
    }

    /// Shortest-path symmetry holds on the undirected subgraph.
    #[test]
    fn undirected_edges_are_symmetric() {
        let w = World::canonical();
        let there = w.graph.shortest_path(w.loading_dock, w.shelves[0]);
        let back = w.graph.shortest_path(w.shelves[0], w.loading_dock);
        assert_eq!(there.total_distance, back.total_distance);
    }
}
