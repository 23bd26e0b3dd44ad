// src/robot.rs
//
// Robot fleet: lifecycle state machine, battery accounting, and the two
// movement models.
//
//  - `start_movement` / `tick` traverse a planned path edge by edge
//    (the episode driver's model).
//  - `step_simulation` interprets discrete action codes with direct-edge
//    semantics (the model the RL result map is computed from).
//
// Both models price distance at the same battery rate.

use crate::graph::Path;
use crate::popularity;
use crate::types::{NodeIndex, ProductId, RobotIndex, RobotStatus};
use crate::world::{NodePayload, World};

/// Battery percent consumed per distance unit, shared by both movement models.
pub const BATTERY_PER_DISTANCE: f64 = 0.5;

/// Battery gained by one CHARGE action.
const CHARGE_STEP: f64 = 10.0;

/// Below this battery a charge counts as well-timed.
const CHARGE_OPTIMAL_BELOW: f64 = 30.0;

/// Minimum battery for a robot to accept a handover.
const HANDOVER_MIN_BATTERY: f64 = 20.0;

/// An order held by at most one robot at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub product_id: ProductId,
    pub slot_index: usize,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct Robot {
    pub id: String,
    pub current_node: NodeIndex,
    pub target_node: Option<NodeIndex>,
    /// Progress along the current edge in [0, 1].
    pub progress: f64,
    pub pos_x: f64,
    pub pos_y: f64,
    pub status: RobotStatus,
    pub carrying: bool,
    pub has_order: bool,
    /// Battery percentage in [0, 100].
    pub battery: f64,
    pub speed: f64,
    pub current_order: Option<Order>,
    pub current_path: Option<Path>,
    path_cursor: usize,
    /// Edge trigger for LOW_BATTERY notifications; re-armed on recovery.
    pub low_battery_notified: bool,
}

impl Robot {
    fn new(index: RobotIndex, start_node: NodeIndex, speed: f64) -> Self {
        Self {
            id: format!("robot_{index}"),
            current_node: start_node,
            target_node: None,
            progress: 0.0,
            pos_x: 0.0,
            pos_y: 0.0,
            status: RobotStatus::Idle,
            carrying: false,
            has_order: false,
            battery: 100.0,
            speed,
            current_order: None,
            current_path: None,
            path_cursor: 0,
            low_battery_notified: false,
        }
    }

    /// True when the robot is standing at `node` (not mid-edge).
    pub fn is_at(&self, node: NodeIndex) -> bool {
        self.current_node == node && self.status != RobotStatus::Moving
    }

    pub fn is_idle(&self) -> bool {
        self.status == RobotStatus::Idle
    }

    pub fn needs_charging(&self, threshold: f64) -> bool {
        self.battery < threshold
    }

    fn drain_battery(&mut self, amount: f64) {
        self.battery = (self.battery - amount).max(0.0);
    }
}

/// Place `n` fresh robots at the charging station with full battery.
pub fn init_fleet(n: usize, charging_station: NodeIndex, speed: f64) -> Vec<Robot> {
    (0..n).map(|i| Robot::new(i, charging_station, speed)).collect()
}

/// Recompute per-node robot counters from robot positions. Called after
/// fleet (re)initialisation so MOVE bookkeeping starts consistent.
pub fn sync_node_counters(world: &mut World, robots: &[Robot]) {
    for node in &mut world.nodes {
        node.current_robots = 0;
    }
    for robot in robots {
        if let Some(node) = world.nodes.get_mut(robot.current_node) {
            node.current_robots += 1;
        }
    }
}

/// Plan a shortest path and put an idle robot in motion along it.
/// Returns false when the robot is busy, the target is unreachable, or the
/// robot is already there.
pub fn start_movement(robot: &mut Robot, world: &World, target: NodeIndex) -> bool {
    if robot.status != RobotStatus::Idle {
        eprintln!(
            "[robot] {} cannot start moving while {}",
            robot.id,
            robot.status.as_str()
        );
        return false;
    }

    let path = world.graph.shortest_path(robot.current_node, target);
    if !path.found || path.nodes.len() < 2 {
        if !path.found {
            eprintln!(
                "[robot] {}: no path from {} to {target}",
                robot.id, robot.current_node
            );
        }
        return false;
    }

    robot.target_node = Some(path.nodes[1]);
    robot.path_cursor = 1;
    robot.progress = 0.0;
    robot.status = RobotStatus::Moving;
    robot.current_path = Some(path);
    true
}

/// Outcome of one movement tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickOutcome {
    /// The robot arrived at the final node of its path this tick.
    pub arrived_final: bool,
    /// Distance covered this tick (for travel metrics).
    pub moved_distance: f64,
}

/// Advance a moving robot by `dt` seconds along its planned path.
pub fn tick(robot: &mut Robot, world: &World, dt: f64) -> TickOutcome {
    let mut outcome = TickOutcome::default();
    if robot.status != RobotStatus::Moving {
        return outcome;
    }
    let Some(target) = robot.target_node else {
        robot.status = RobotStatus::Idle;
        return outcome;
    };

    let edge_distance = world.graph.edge_distance(robot.current_node, target);
    if !edge_distance.is_finite() || edge_distance <= 0.0 {
        eprintln!(
            "[robot] {}: no edge {} -> {target}; stopping",
            robot.id, robot.current_node
        );
        robot.status = RobotStatus::Idle;
        robot.target_node = None;
        robot.current_path = None;
        return outcome;
    }

    let mut moved = robot.speed * dt;
    let remaining = (1.0 - robot.progress) * edge_distance;
    if moved > remaining {
        moved = remaining;
    }

    // A drained battery strands the robot where it is.
    let cost = BATTERY_PER_DISTANCE * moved;
    if robot.battery <= 0.0 {
        robot.status = RobotStatus::Idle;
        return outcome;
    }
    if cost > robot.battery {
        moved = robot.battery / BATTERY_PER_DISTANCE;
    }
    robot.drain_battery(BATTERY_PER_DISTANCE * moved);

    robot.progress += moved / edge_distance;
    outcome.moved_distance = moved;

    if robot.progress >= 1.0 - 1e-9 {
        robot.current_node = target;
        robot.progress = 0.0;
        robot.path_cursor += 1;

        let next = robot
            .current_path
            .as_ref()
            .and_then(|p| p.nodes.get(robot.path_cursor).copied());
        match next {
            Some(next_node) => {
                robot.target_node = Some(next_node);
            }
            None => {
                robot.status = RobotStatus::Idle;
                robot.target_node = None;
                robot.current_path = None;
                outcome.arrived_final = true;
            }
        }
    }

    outcome
}

/// Discrete action codes accepted by `step_simulation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    Move,
    Pickup,
    Dropoff,
    Charge,
    Transfer,
}

impl StepAction {
    pub fn from_code(code: u8) -> Option<StepAction> {
        match code {
            0 => Some(StepAction::Move),
            1 => Some(StepAction::Pickup),
            2 => Some(StepAction::Dropoff),
            3 => Some(StepAction::Charge),
            4 => Some(StepAction::Transfer),
            _ => None,
        }
    }
}

/// Result map of one discrete simulation step. Flags are 0/1 on the wire;
/// domain failures land here, never in an error type.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct StepOutcome {
    pub order_completed: bool,
    pub order_failed: bool,
    pub blocked: bool,
    pub robot_idle: bool,
    pub charging_optimal: bool,
    pub handover_success: bool,
    pub optimal_zone_placement: bool,
    pub battery_used: f64,
    pub distance_saved: f64,
    pub completion_time: f64,
}

/// Execute one discrete action for `robot_idx` and report the result map.
pub fn step_simulation(
    world: &mut World,
    robots: &mut [Robot],
    robot_idx: RobotIndex,
    action: StepAction,
    target: Option<NodeIndex>,
    product_id: ProductId,
) -> StepOutcome {
    let mut result = StepOutcome::default();

    if robot_idx >= robots.len() {
        eprintln!("[robot] invalid robot index {robot_idx}");
        result.order_failed = true;
        return result;
    }

    match action {
        StepAction::Move => step_move(world, &mut robots[robot_idx], target, &mut result),
        StepAction::Pickup => step_pickup(world, &mut robots[robot_idx], target, product_id, &mut result),
        StepAction::Dropoff => step_dropoff(world, &mut robots[robot_idx], target, &mut result),
        StepAction::Charge => step_charge(world, &mut robots[robot_idx], &mut result),
        StepAction::Transfer => step_transfer(world, robots, robot_idx, target, &mut result),
    }

    let robot = &robots[robot_idx];
    if robot.status == RobotStatus::Idle && !robot.has_order {
        result.robot_idle = true;
    }
    result
}

fn step_move(world: &mut World, robot: &mut Robot, target: Option<NodeIndex>, result: &mut StepOutcome) {
    let Some(target) = target.filter(|&t| t < world.nodes.len()) else {
        result.order_failed = true;
        return;
    };

    let dest = &world.nodes[target];
    if dest.current_robots >= dest.max_robots {
        result.blocked = true;
        return;
    }

    let distance = world.direct_distance(robot.current_node, target);
    let battery_cost = BATTERY_PER_DISTANCE * distance;
    if robot.battery < battery_cost {
        eprintln!("[robot] {} out of battery for move", robot.id);
        result.order_failed = true;
        return;
    }

    let source = robot.current_node;
    world.nodes[source].current_robots = world.nodes[source].current_robots.saturating_sub(1);
    world.nodes[target].current_robots += 1;
    robot.current_node = target;
    robot.drain_battery(battery_cost);
    robot.status = RobotStatus::Idle;
    result.battery_used = battery_cost;
}

fn step_pickup(
    world: &mut World,
    robot: &mut Robot,
    target: Option<NodeIndex>,
    product_id: ProductId,
    result: &mut StepOutcome,
) {
    let Some(target) = target else {
        result.order_failed = true;
        return;
    };
    if !robot.is_at(target) {
        result.order_failed = true;
        return;
    }
    if robot.carrying {
        eprintln!("[robot] {} already carrying an item", robot.id);
        result.order_failed = true;
        return;
    }

    let found = world.find_product_on_shelf(product_id);
    let Some((shelf_node, slot_index)) = found.filter(|&(shelf, _)| shelf == target) else {
        eprintln!("[robot] product {product_id} not available at node {target}");
        result.order_failed = true;
        return;
    };

    if let Some(shelf) = world.shelf_mut(shelf_node) {
        let slot = &mut shelf.slots[slot_index];
        slot.occupied = slot.occupied.saturating_sub(1);
    }

    robot.carrying = true;
    robot.current_order = Some(Order {
        product_id,
        slot_index,
        quantity: 1,
    });
    robot.status = RobotStatus::Carrying;
}

fn step_dropoff(world: &mut World, robot: &mut Robot, target: Option<NodeIndex>, result: &mut StepOutcome) {
    if !robot.carrying {
        result.order_failed = true;
        return;
    }
    let Some(target) = target.filter(|&t| t < world.nodes.len()) else {
        result.order_failed = true;
        return;
    };
    if !robot.is_at(target) {
        result.order_failed = true;
        return;
    }

    let product_id = robot
        .current_order
        .as_ref()
        .map(|o| o.product_id)
        .unwrap_or(-1);

    match world.nodes[target].payload {
        NodePayload::FrontDesk(_) => {
            let desk = world.desk_mut();
            desk.pending_orders = desk.pending_orders.saturating_sub(1);
            result.order_completed = true;
            popularity::update_popularity_and_zone(world, product_id);
        }
        NodePayload::Shelf(_) => {
            if world.find_best_shelf_for_product(product_id) == Some(target) {
                result.optimal_zone_placement = true;
            }
            world.restock_slot(target, product_id, 1);
            result.order_completed = true;
        }
        _ => {
            // Dropping anywhere else discards nothing and completes nothing.
        }
    }

    robot.carrying = false;
    robot.has_order = false;
    robot.current_order = None;
    robot.status = RobotStatus::Idle;
}

fn step_charge(world: &mut World, robot: &mut Robot, result: &mut StepOutcome) {
    if robot.current_node != world.charging_station {
        result.order_failed = true;
        return;
    }

    let charger = world.charger_mut();
    let already_charging = robot.status == RobotStatus::Charging;
    if !already_charging && charger.occupied_count >= charger.ports {
        result.blocked = true;
        return;
    }
    if !already_charging {
        charger.occupied_count += 1;
    }

    let before = robot.battery;
    let charge = CHARGE_STEP.min(100.0 - robot.battery);
    robot.battery += charge;
    robot.status = RobotStatus::Charging;
    if before < CHARGE_OPTIMAL_BELOW {
        result.charging_optimal = true;
    }

    if robot.battery >= 100.0 {
        robot.battery = 100.0;
        robot.status = RobotStatus::Idle;
        let charger = world.charger_mut();
        charger.occupied_count = charger.occupied_count.saturating_sub(1);
    }
}

fn step_transfer(
    world: &mut World,
    robots: &mut [Robot],
    robot_idx: RobotIndex,
    target: Option<NodeIndex>,
    result: &mut StepOutcome,
) {
    if robots[robot_idx].current_order.is_none() {
        result.order_failed = true;
        return;
    }

    let from_node = robots[robot_idx].current_node;
    let mut nearest: Option<RobotIndex> = None;
    let mut min_distance = 1000.0;
    for (i, other) in robots.iter().enumerate() {
        if i == robot_idx || other.has_order || other.battery < HANDOVER_MIN_BATTERY {
            continue;
        }
        let dist = world.direct_distance(from_node, other.current_node);
        if dist < min_distance {
            min_distance = dist;
            nearest = Some(i);
        }
    }

    let Some(other_idx) = nearest else {
        result.order_failed = true;
        return;
    };

    let order = robots[robot_idx].current_order.take();
    robots[robot_idx].has_order = false;
    robots[other_idx].current_order = order;
    robots[other_idx].has_order = true;

    // `target` only feeds the distance-saved heuristic; the order itself is
    // not delivered here.
    if let Some(target) = target {
        let original = world.direct_distance(from_node, target);
        let new = world.direct_distance(robots[other_idx].current_node, target);
        result.distance_saved = (original - new).max(0.0);
    }
    result.handover_success = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RobotStatus;

    fn setup() -> (World, Vec<Robot>) {
        let mut world = World::canonical();
        let robots = init_fleet(3, world.charging_station, 1.0);
        sync_node_counters(&mut world, &robots);
        (world, robots)
    }

    #[test]
    fn fleet_starts_idle_and_full() {
        let (world, robots) = setup();
        assert_eq!(robots.len(), 3);
        for r in &robots {
            assert_eq!(r.current_node, world.charging_station);
            assert_eq!(r.status, RobotStatus::Idle);
            assert_eq!(r.battery, 100.0);
            assert!(!r.carrying);
        }
        assert_eq!(world.nodes[world.charging_station].current_robots, 3);
    }

    #[test]
    fn gradual_movement_follows_path_and_drains_battery() {
        let (world, mut robots) = setup();
        let shelf_b = world.shelves[1];
        // charging_station -> shelf_B is a directed edge of 4.0.
        assert!(start_movement(&mut robots[0], &world, shelf_b));
        assert_eq!(robots[0].status, RobotStatus::Moving);

        let mut total = 0.0;
        let mut arrived = false;
        for _ in 0..10 {
            let out = tick(&mut robots[0], &world, 1.0);
            total += out.moved_distance;
            if out.arrived_final {
                arrived = true;
                break;
            }
        }
        assert!(arrived);
        assert_eq!(robots[0].current_node, shelf_b);
        assert_eq!(robots[0].status, RobotStatus::Idle);
        assert!((total - 4.0).abs() < 1e-9);
        assert!((robots[0].battery - (100.0 - 2.0)).abs() < 1e-9);
    }

    #[test]
    fn movement_rejected_while_busy() {
        let (world, mut robots) = setup();
        assert!(start_movement(&mut robots[0], &world, world.shelves[1]));
        assert!(!start_movement(&mut robots[0], &world, world.front_desk));
    }

    #[test]
    fn drained_battery_strands_robot() {
        let (world, mut robots) = setup();
        robots[0].battery = 0.5;
        assert!(start_movement(&mut robots[0], &world, world.shelves[1]));
        for _ in 0..10 {
            tick(&mut robots[0], &world, 1.0);
        }
        assert_eq!(robots[0].battery, 0.0);
        assert_ne!(robots[0].status, RobotStatus::Moving);
        // 0.5% battery buys one metre of the four.
        assert_ne!(robots[0].current_node, world.shelves[1]);
    }

    #[test]
    fn move_to_full_node_is_blocked() {
        let (mut world, mut robots) = setup();
        let shelf_a = world.shelves[0];
        world.nodes[shelf_a].current_robots = world.nodes[shelf_a].max_robots;

        let before = world.nodes[world.charging_station].current_robots;
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Move, Some(shelf_a), -1);
        assert!(out.blocked);
        assert!(!out.order_failed);
        assert_eq!(robots[0].current_node, world.charging_station);
        assert_eq!(world.nodes[world.charging_station].current_robots, before);
    }

    #[test]
    fn move_updates_counters_and_battery() {
        let (mut world, mut robots) = setup();
        let shelf_b = world.shelves[1];
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Move, Some(shelf_b), -1);
        assert!(!out.order_failed && !out.blocked);
        assert_eq!(robots[0].current_node, shelf_b);
        assert_eq!(world.nodes[shelf_b].current_robots, 1);
        assert_eq!(world.nodes[world.charging_station].current_robots, 2);
        assert!((out.battery_used - 2.0).abs() < 1e-9);
        assert!((robots[0].battery - 98.0).abs() < 1e-9);
    }

    #[test]
    fn move_without_direct_edge_uses_sentinel_cost() {
        let (mut world, mut robots) = setup();
        // charging_station has no direct edge to the front desk; the 100.0
        // sentinel prices the move at 50% battery.
        let front_desk = world.front_desk;
        let out = step_simulation(
            &mut world,
            &mut robots,
            0,
            StepAction::Move,
            Some(front_desk),
            -1,
        );
        assert!(!out.order_failed);
        assert!((out.battery_used - 50.0).abs() < 1e-9);
    }

    #[test]
    fn pickup_requires_presence_and_stock() {
        let (mut world, mut robots) = setup();
        let shelf_a = world.shelves[0];

        // Not at the shelf yet.
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Pickup, Some(shelf_a), 1);
        assert!(out.order_failed);

        robots[0].current_node = shelf_a;
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Pickup, Some(shelf_a), 1);
        assert!(!out.order_failed);
        assert!(robots[0].carrying);
        assert_eq!(robots[0].status, RobotStatus::Carrying);
        assert_eq!(world.get_shelf_slots(shelf_a)[0].occupied, 34);

        // A carrying robot cannot pick again.
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Pickup, Some(shelf_a), 2);
        assert!(out.order_failed);
    }

    #[test]
    fn dropoff_at_front_desk_completes_order() {
        let (mut world, mut robots) = setup();
        world.desk_mut().pending_orders = 2;
        robots[0].current_node = world.front_desk;
        robots[0].carrying = true;
        robots[0].has_order = true;
        robots[0].current_order = Some(Order {
            product_id: 1,
            slot_index: 0,
            quantity: 1,
        });

        let front_desk = world.front_desk;
        let out = step_simulation(
            &mut world,
            &mut robots,
            0,
            StepAction::Dropoff,
            Some(front_desk),
            -1,
        );
        assert!(out.order_completed);
        assert_eq!(world.desk().pending_orders, 1);
        assert!(!robots[0].carrying);
        assert!(!robots[0].has_order);
        assert_eq!(robots[0].status, RobotStatus::Idle);
        assert_eq!(world.product(1).unwrap().popularity, 1);
        assert!(out.robot_idle);
    }

    #[test]
    fn dropoff_at_shelf_restocks_and_scores_placement() {
        let (mut world, mut robots) = setup();
        let shelf_d = world.shelves[3]; // Cold, hosts product 6 with space
        robots[0].current_node = shelf_d;
        robots[0].carrying = true;
        robots[0].current_order = Some(Order {
            product_id: 6,
            slot_index: 0,
            quantity: 1,
        });

        let before = world.get_shelf_slots(shelf_d)[0].occupied;
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Dropoff, Some(shelf_d), -1);
        assert!(out.order_completed);
        assert!(out.optimal_zone_placement);
        assert_eq!(world.get_shelf_slots(shelf_d)[0].occupied, before + 1);
    }

    #[test]
    fn charge_steps_battery_and_holds_port() {
        let (mut world, mut robots) = setup();
        robots[0].battery = 25.0;

        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Charge, None, -1);
        assert!(out.charging_optimal);
        assert_eq!(robots[0].battery, 35.0);
        assert_eq!(robots[0].status, RobotStatus::Charging);
        assert_eq!(world.charger().occupied_count, 1);

        // Continuing to charge keeps the same port.
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Charge, None, -1);
        assert!(!out.charging_optimal);
        assert_eq!(robots[0].battery, 45.0);
        assert_eq!(world.charger().occupied_count, 1);
    }

    #[test]
    fn charge_at_full_battery_is_a_no_op() {
        let (mut world, mut robots) = setup();
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Charge, None, -1);
        assert!(!out.charging_optimal);
        assert_eq!(robots[0].battery, 100.0);
        assert_eq!(robots[0].status, RobotStatus::Idle);
        assert_eq!(world.charger().occupied_count, 0);
    }

    #[test]
    fn charge_blocked_when_ports_full() {
        let (mut world, mut robots) = setup();
        world.charger_mut().occupied_count = world.charger().ports;
        robots[0].battery = 50.0;
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Charge, None, -1);
        assert!(out.blocked);
        assert_eq!(robots[0].battery, 50.0);
    }

    #[test]
    fn charge_away_from_station_fails() {
        let (mut world, mut robots) = setup();
        robots[0].current_node = world.shelves[0];
        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Charge, None, -1);
        assert!(out.order_failed);
    }

    #[test]
    fn transfer_hands_order_to_nearest_capable_robot() {
        let (mut world, mut robots) = setup();
        robots[0].current_node = world.shelves[0];
        robots[0].has_order = true;
        robots[0].current_order = Some(Order {
            product_id: 1,
            slot_index: 0,
            quantity: 2,
        });
        // Robot 1 is adjacent (shelf_B at 4.0), robot 2 is drained.
        robots[1].current_node = world.shelves[1];
        robots[2].battery = 10.0;

        let front_desk = world.front_desk;
        let out = step_simulation(
            &mut world,
            &mut robots,
            0,
            StepAction::Transfer,
            Some(front_desk),
            -1,
        );
        assert!(out.handover_success);
        assert!(!robots[0].has_order);
        assert!(robots[0].current_order.is_none());
        assert!(robots[1].has_order);
        assert_eq!(robots[1].current_order.as_ref().unwrap().product_id, 1);
        // shelf_A -> desk is 6.0; shelf_B -> desk has no direct edge (100.0).
        assert_eq!(out.distance_saved, 0.0);
    }

    #[test]
    fn transfer_with_no_candidate_fails() {
        let (mut world, mut robots) = setup();
        robots[0].current_order = Some(Order {
            product_id: 1,
            slot_index: 0,
            quantity: 1,
        });
        robots[0].has_order = true;
        robots[1].has_order = true;
        robots[2].battery = 5.0;

        let out = step_simulation(&mut world, &mut robots, 0, StepAction::Transfer, None, -1);
        assert!(out.order_failed);
        assert!(robots[0].has_order);
    }

    #[test]
    fn step_action_codes() {
        assert_eq!(StepAction::from_code(0), Some(StepAction::Move));
        assert_eq!(StepAction::from_code(4), Some(StepAction::Transfer));
        assert_eq!(StepAction::from_code(9), None);
    }
}
