// src/episode.rs
//
// The simulator: single owner of the world, the fleet, the event queue and
// the policy channel. Episodes advance in fixed ticks; each tick drains due
// events, and every task-producing event negotiates synchronously with the
// policy before the world moves on. The reservation discipline lives here:
// stock backing a customer order is decremented before NEW_TASK goes out
// and restored exactly on WAIT or protocol error.

use std::io::{BufRead, Write};

use crate::config::SimConfig;
use crate::events::{retry, EventKind, EventSystem, SimEvent};
use crate::logger::{EpisodeEndMetrics, EpisodeLogger, TaskEventKind};
use crate::popularity::{self, DecayClock};
use crate::protocol::{ActionMsg, Inbound, JsonLineChannel, Outbound, ProtocolError};
use crate::robot::{self, Order, Robot};
use crate::snapshot::{capture_products, capture_robots, LayoutSnapshot, StateSnapshot};
use crate::tasks::{
    self, customer_order_task, incoming_delivery_task, postpone_backoff_s, restock_request_task,
    PostponeTracker, Task, TaskCounter, CANCEL_AT, URGENT_ESCALATION_AT,
};
use crate::types::{Lorry, Priority, ProductId, RobotStatus, SimTime, StatusKind};
use crate::world::World;

pub struct Simulator<R, W> {
    cfg: SimConfig,
    world: World,
    robots: Vec<Robot>,
    events: EventSystem,
    decay: DecayClock,
    postpones: PostponeTracker,
    task_ids: TaskCounter,
    channel: JsonLineChannel<R, W>,
    logger: EpisodeLogger,
    episode: u64,
}

impl<R: BufRead, W: Write> Simulator<R, W> {
    pub fn new(cfg: SimConfig, channel: JsonLineChannel<R, W>) -> Self {
        let mut world = World::canonical();
        let robots = robot::init_fleet(cfg.robot_count, world.charging_station, cfg.robot_speed);
        robot::sync_node_counters(&mut world, &robots);

        let events = EventSystem::new(
            cfg.delivery_mean_interval_s,
            cfg.order_mean_interval_s,
            cfg.restock_sweep_interval_s,
        );
        let decay = DecayClock::new(cfg.decay_interval_s);
        let logger = EpisodeLogger::new(
            cfg.log_dir.clone(),
            cfg.snapshot_interval_s,
            cfg.telemetry_enabled,
        );

        Self {
            cfg,
            world,
            robots,
            events,
            decay,
            postpones: PostponeTracker::new(),
            task_ids: TaskCounter::new(),
            channel,
            logger,
            episode: 1,
        }
    }

    // Accessors, mainly for integration tests driving scripted channels.

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn robots(&self) -> &[Robot] {
        &self.robots
    }

    pub fn robots_mut(&mut self) -> &mut [Robot] {
        &mut self.robots
    }

    pub fn events(&self) -> &EventSystem {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventSystem {
        &mut self.events
    }

    pub fn postpones(&self) -> &PostponeTracker {
        &self.postpones
    }

    pub fn channel(&self) -> &JsonLineChannel<R, W> {
        &self.channel
    }

    pub fn logger(&self) -> &EpisodeLogger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut EpisodeLogger {
        &mut self.logger
    }

    pub fn now(&self) -> SimTime {
        self.events.now()
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }

    // ---------------------------------------------------------------------
    // Top-level driver
    // ---------------------------------------------------------------------

    /// Full lifecycle: INIT/READY handshake, then episodes until the policy
    /// stops asking for resets or closes the channel.
    pub fn run(&mut self) -> Result<(), ProtocolError> {
        self.events.init(self.cfg.seed_base + self.episode, &self.world);
        self.handshake()?;

        loop {
            self.run_episode()?;

            let now = self.events.now();
            let metrics = EpisodeEndMetrics::from(self.logger.metrics());
            let final_state = StateSnapshot::capture(&self.world, &self.robots, now);
            self.channel.send(&Outbound::EpisodeEnd {
                timestamp: now,
                metrics,
                final_state,
            })?;

            match self.channel.recv() {
                Ok(Some(Inbound::Reset { episode_number })) => {
                    self.reset_episode(episode_number);
                    self.handshake()?;
                }
                Ok(Some(other)) => {
                    eprintln!("[sim] expected RESET, got {other:?}; shutting down");
                    return Ok(());
                }
                Ok(None) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Send INIT and block for READY.
    pub fn handshake(&mut self) -> Result<(), ProtocolError> {
        self.channel.send(&Outbound::Init {
            timestamp: self.events.now(),
            warehouse_layout: LayoutSnapshot::capture(&self.world),
            products: capture_products(&self.world),
            robots: capture_robots(&self.robots),
        })?;

        match self.channel.recv() {
            Ok(Some(Inbound::Ready)) => Ok(()),
            Ok(Some(other)) => Err(ProtocolError::Handshake(format!(
                "expected READY, got {other:?}"
            ))),
            Ok(None) => Err(ProtocolError::Handshake("channel closed before READY".into())),
            Err(e) => Err(e),
        }
    }

    /// One bounded simulated-time episode.
    pub fn run_episode(&mut self) -> Result<(), ProtocolError> {
        self.logger
            .start_episode(self.episode, &self.world, &self.robots);
        eprintln!("[sim] episode {} starting", self.episode);

        while self.events.now() < self.cfg.episode_duration_s {
            self.step_tick()?;
        }

        let now = self.events.now();
        self.logger.end_episode(now, self.robots.len());
        popularity::print_popularity_report(&self.world);

        if self.cfg.telemetry_enabled {
            let filename = format!("episode_{}.json", self.episode);
            match self.logger.save(&filename) {
                Ok(path) => eprintln!("[sim] telemetry written to {}", path.display()),
                Err(e) => eprintln!("[sim] WARN: telemetry dump failed: {e}"),
            }
        }

        eprintln!("[sim] episode {} ended at t={now}", self.episode);
        Ok(())
    }

    /// Reset world, fleet, clocks and RNG for the next episode.
    pub fn reset_episode(&mut self, episode_number: u64) {
        eprintln!("[sim] resetting for episode {episode_number}");
        self.episode = episode_number;
        self.world.reset_inventory();
        self.robots = robot::init_fleet(
            self.cfg.robot_count,
            self.world.charging_station,
            self.cfg.robot_speed,
        );
        robot::sync_node_counters(&mut self.world, &self.robots);
        self.events
            .init(self.cfg.seed_base + episode_number, &self.world);
        self.decay.reset();
        self.postpones.clear();
    }

    // ---------------------------------------------------------------------
    // Event processing
    // ---------------------------------------------------------------------

    /// One full tick: drain events, advance robots, capture telemetry and
    /// check world invariants.
    pub fn step_tick(&mut self) -> Result<(), ProtocolError> {
        self.process_events(self.cfg.tick_s)?;
        self.update_robots(self.cfg.tick_s);

        let now = self.events.now();
        self.logger
            .log_robot_snapshots(now, &self.world, &self.robots);

        for violation in self.world.invariant_violations() {
            eprintln!("[sim] WARN: invariant violated: {violation}");
        }
        Ok(())
    }

    /// Advance simulated time by `dt`, run popularity decay, then drain and
    /// dispatch every event whose trigger time has passed.
    pub fn process_events(&mut self, dt: f64) -> Result<(), ProtocolError> {
        let now = self.events.advance(dt);
        self.decay.apply(&mut self.world, now);

        while let Some(event) = self.events.pop_due() {
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: SimEvent) -> Result<(), ProtocolError> {
        match event.kind {
            EventKind::IncomingDelivery => self.handle_incoming_delivery(event),
            EventKind::CustomerOrder => self.handle_customer_order(event),
            EventKind::RestockNeeded => self.handle_restock_sweep(event),
            EventKind::UrgentRestock => self.handle_urgent_restock(event),
            EventKind::RobotTaskComplete => self.handle_robot_status_event(
                event,
                StatusKind::TaskComplete,
                "reached final destination",
            ),
            EventKind::LowBattery => {
                self.handle_robot_status_event(event, StatusKind::LowBattery, "battery low")
            }
        }
    }

    /// Per-tick robot updates: gradual movement, arrival notifications and
    /// low-battery detection.
    fn update_robots(&mut self, dt: f64) {
        let now = self.events.now();
        for i in 0..self.robots.len() {
            let outcome = robot::tick(&mut self.robots[i], &self.world, dt);
            if outcome.moved_distance > 0.0 {
                self.logger.add_travel_distance(outcome.moved_distance);
            }
            if outcome.arrived_final {
                let node = self.robots[i].current_node;
                self.logger.log_task_event(
                    now,
                    i,
                    &self.robots,
                    TaskEventKind::Move,
                    -1,
                    -1,
                    node as i64,
                    outcome.moved_distance,
                );
                self.events.push(SimEvent::robot_task_complete(now, i));
            }

            // A drained robot abandoned mid-path is stuck: drop the stale
            // plan and tell the policy once.
            let stranded = {
                let robot = &mut self.robots[i];
                if robot.battery <= 0.0
                    && robot.status != RobotStatus::Moving
                    && robot.current_path.is_some()
                {
                    robot.current_path = None;
                    robot.target_node = None;
                    true
                } else {
                    false
                }
            };
            if stranded {
                self.push_robot_status(i, StatusKind::Stuck, "battery drained mid-route");
            }

            let robot = &mut self.robots[i];
            if robot.battery >= self.cfg.low_battery_threshold {
                robot.low_battery_notified = false;
            } else if robot.is_idle() && !robot.low_battery_notified {
                robot.low_battery_notified = true;
                self.events.push(SimEvent::low_battery(now, i));
            }
        }
    }

    /// Execute one discrete robot action and fold its result map into the
    /// episode metrics and task-event log. Embedders drive the fleet with
    /// this between ticks.
    pub fn apply_step(
        &mut self,
        robot_index: usize,
        action: robot::StepAction,
        target: Option<usize>,
        product_id: ProductId,
    ) -> robot::StepOutcome {
        let now = self.events.now();
        let from_node = self
            .robots
            .get(robot_index)
            .map(|r| r.current_node as i64)
            .unwrap_or(-1);
        let was_charging = self
            .robots
            .get(robot_index)
            .map(|r| r.status == RobotStatus::Charging)
            .unwrap_or(false);

        let outcome = robot::step_simulation(
            &mut self.world,
            &mut self.robots,
            robot_index,
            action,
            target,
            product_id,
        );
        self.logger.update_metrics(&outcome);

        let target_node = target.map(|t| t as i64).unwrap_or(-1);
        if outcome.order_failed {
            self.logger.log_task_event(
                now,
                robot_index,
                &self.robots,
                TaskEventKind::Failed,
                product_id,
                from_node,
                target_node,
                0.0,
            );
            self.push_robot_status(robot_index, StatusKind::TaskFailed, "action failed");
            return outcome;
        }

        match action {
            robot::StepAction::Move => {
                let distance = outcome.battery_used / robot::BATTERY_PER_DISTANCE;
                self.logger.add_travel_distance(distance);
                self.logger.log_task_event(
                    now,
                    robot_index,
                    &self.robots,
                    TaskEventKind::Move,
                    -1,
                    from_node,
                    target_node,
                    distance,
                );
            }
            robot::StepAction::Pickup => {
                self.logger.log_task_event(
                    now,
                    robot_index,
                    &self.robots,
                    TaskEventKind::Pickup,
                    product_id,
                    target_node,
                    target_node,
                    0.0,
                );
            }
            robot::StepAction::Dropoff => {
                self.logger.log_task_event(
                    now,
                    robot_index,
                    &self.robots,
                    TaskEventKind::Dropoff,
                    product_id,
                    target_node,
                    target_node,
                    0.0,
                );
            }
            robot::StepAction::Transfer => {
                if outcome.handover_success {
                    self.logger.log_task_event(
                        now,
                        robot_index,
                        &self.robots,
                        TaskEventKind::Handover,
                        product_id,
                        from_node,
                        target_node,
                        outcome.distance_saved,
                    );
                    self.push_robot_status(
                        robot_index,
                        StatusKind::HandoverReady,
                        "order handed over",
                    );
                }
            }
            robot::StepAction::Charge => {
                // Edge-triggered like LOW_BATTERY: one CHARGING push when
                // the port is first seized, none while it is held.
                let charging_now = self
                    .robots
                    .get(robot_index)
                    .map(|r| r.status == RobotStatus::Charging)
                    .unwrap_or(false);
                if charging_now && !was_charging {
                    self.push_robot_status(robot_index, StatusKind::Charging, "charge port seized");
                }
            }
        }
        outcome
    }

    // ---------------------------------------------------------------------
    // Negotiation
    // ---------------------------------------------------------------------

    /// Send NEW_TASK and block for the paired action. Protocol-level
    /// failures degrade to WAIT (the caller rolls back); a closed channel
    /// is fatal.
    fn negotiate(&mut self, task: &Task) -> Result<ActionMsg, ProtocolError> {
        let state = StateSnapshot::capture(&self.world, &self.robots, self.events.now());
        self.channel.send(&Outbound::NewTask {
            timestamp: self.events.now(),
            task: task.clone(),
            state,
        })?;

        match self.channel.recv() {
            Ok(Some(Inbound::Action { action })) => Ok(action),
            Ok(Some(other)) => {
                eprintln!(
                    "[sim] WARN: expected ACTION for {}, got {other:?}; treating as WAIT",
                    task.task_id
                );
                Ok(ActionMsg::wait())
            }
            Ok(None) => Err(ProtocolError::Closed),
            Err(ProtocolError::Parse(e)) => {
                eprintln!(
                    "[sim] WARN: malformed action for {}: {e}; treating as WAIT",
                    task.task_id
                );
                Ok(ActionMsg::wait())
            }
            Err(e) => Err(e),
        }
    }

    fn send_ack(
        &mut self,
        task_id: &str,
        robot: Option<usize>,
        estimate: f64,
    ) -> Result<(), ProtocolError> {
        self.channel.send(&Outbound::Ack {
            task_id: task_id.to_string(),
            robot_index: robot.map(|r| r as i64).unwrap_or(-1),
            status: "accepted".to_string(),
            estimated_completion_time: estimate,
        })
    }

    fn send_error(
        &mut self,
        task_id: &str,
        error_code: &str,
        message: &str,
    ) -> Result<(), ProtocolError> {
        self.channel.send(&Outbound::Error {
            task_id: task_id.to_string(),
            error_code: error_code.to_string(),
            message: message.to_string(),
            robot_index: -1,
        })
    }

    /// Path-based completion estimate: robot to source, then source to
    /// target, at the assigned robot's speed.
    fn estimate_completion_time(&self, robot: Option<usize>, source: usize, target: usize) -> f64 {
        let mut distance = 0.0;
        let mut speed = self.cfg.robot_speed;
        if let Some(r) = robot.and_then(|r| self.robots.get(r)) {
            speed = r.speed;
            let leg = self.world.graph.shortest_path(r.current_node, source);
            if leg.found {
                distance += leg.total_distance;
            }
        }
        let leg = self.world.graph.shortest_path(source, target);
        if leg.found {
            distance += leg.total_distance;
        }
        distance / speed.max(1e-9)
    }

    // ---------------------------------------------------------------------
    // Event handlers
    // ---------------------------------------------------------------------

    fn handle_incoming_delivery(&mut self, event: SimEvent) -> Result<(), ProtocolError> {
        let now = self.events.now();

        if self.world.dock().occupied {
            // Lorry circles until the dock clears.
            let mut retry_event = event;
            retry_event.trigger_time = now + retry::DELIVERY_DOCK_BUSY_S;
            self.events.push(retry_event);
            return Ok(());
        }

        {
            let dock = self.world.dock_mut();
            dock.occupied = true;
            dock.delivery_count += 1;
            dock.current_lorry = Lorry::from_quantity(event.quantity);
        }
        eprintln!(
            "[sim] delivery: product {} x{} at the loading dock",
            event.product_id, event.quantity
        );

        let task = incoming_delivery_task(
            &mut self.task_ids,
            event.product_id,
            event.quantity,
            self.world.loading_dock,
        );
        let action = self.negotiate(&task)?;

        if action.is_wait() {
            self.world.dock_mut().occupied = false;
            let mut retry_event = event;
            retry_event.trigger_time = now + retry::DELIVERY_WAIT_S;
            self.events.push(retry_event);
        } else {
            // The chosen shelf must have a slot assigned to the product.
            let chosen = action.target(self.world.nodes.len()).filter(|&t| {
                self.world
                    .shelf(t)
                    .map(|s| s.slots.iter().any(|sl| sl.product_id == Some(event.product_id)))
                    .unwrap_or(false)
            });

            if let Some(shelf) = chosen {
                self.world
                    .restock_slot(shelf, event.product_id, event.quantity);
                self.world.dock_mut().occupied = false;
                let robot = action.robot(self.robots.len());
                let estimate =
                    self.estimate_completion_time(robot, self.world.loading_dock, shelf);
                self.send_ack(&task.task_id, robot, estimate)?;
            } else {
                // Unusable shelf choice: surface the error and retry later.
                self.send_error(
                    &task.task_id,
                    "INVALID_TARGET",
                    "chosen shelf has no slot for the delivered product",
                )?;
                self.world.dock_mut().occupied = false;
                let mut retry_event = event;
                retry_event.trigger_time = now + retry::DELIVERY_WAIT_S;
                self.events.push(retry_event);
            }
        }

        self.events.schedule_incoming_delivery(&self.world);
        Ok(())
    }

    fn handle_customer_order(&mut self, event: SimEvent) -> Result<(), ProtocolError> {
        let now = self.events.now();
        let product = event.product_id;
        let quantity = event.quantity;
        let is_retry = self.postpones.count(product) > 0;

        if !is_retry {
            self.world.desk_mut().pending_orders += 1;
            popularity::update_popularity_and_zone(&mut self.world, product);
            eprintln!("[sim] order: product {product} x{quantity} at the front desk");
        }

        let Some((shelf, slot)) = self.world.find_shelf_with_stock(product, quantity) else {
            self.postpone_order(event);
            return Ok(());
        };
        let Some(reservation) = tasks::reserve(&mut self.world, shelf, slot, quantity) else {
            self.postpone_order(event);
            return Ok(());
        };

        // Successful reservation clears the product's failure streak.
        self.postpones.reset(product);

        let task =
            customer_order_task(&mut self.task_ids, product, quantity, shelf, self.world.front_desk);
        let action = self.negotiate(&task)?;

        if action.is_wait() {
            tasks::rollback(&mut self.world, reservation);
            let attempts = self.postpones.record(product);
            let mut retry_event = event;
            retry_event.trigger_time = now + postpone_backoff_s(attempts);
            self.events.push(retry_event);
            return Ok(());
        }

        let robot = action.robot(self.robots.len());
        if let Some(r) = robot {
            self.robots[r].has_order = true;
            self.robots[r].current_order = Some(Order {
                product_id: product,
                slot_index: slot,
                quantity,
            });
        }
        let estimate = self.estimate_completion_time(robot, shelf, self.world.front_desk);
        self.send_ack(&task.task_id, robot, estimate)?;

        self.events.schedule_customer_order(&self.world);
        Ok(())
    }

    /// Stock miss: back off, escalate at three postponements, cancel at ten.
    fn postpone_order(&mut self, event: SimEvent) {
        let now = self.events.now();
        let product = event.product_id;
        let attempts = self.postpones.record(product);

        if attempts >= CANCEL_AT {
            eprintln!(
                "[sim] order for product {product} cancelled after {attempts} postponements"
            );
            let desk = self.world.desk_mut();
            desk.pending_orders = desk.pending_orders.saturating_sub(1);
            self.postpones.reset(product);
            self.events.schedule_customer_order(&self.world);
            return;
        }

        if attempts == URGENT_ESCALATION_AT {
            eprintln!("[sim] escalating urgent restock for product {product}");
            self.events.push(SimEvent {
                kind: EventKind::UrgentRestock,
                trigger_time: now + retry::URGENT_ESCALATION_DELAY_S,
                node_index: Some(self.world.loading_dock),
                product_id: product,
                quantity: Lorry::Big.quantity(),
            });
        }

        let mut retry_event = event;
        retry_event.trigger_time = now + postpone_backoff_s(attempts);
        self.events.push(retry_event);
    }

    fn handle_restock_sweep(&mut self, _event: SimEvent) -> Result<(), ProtocolError> {
        struct Shortfall {
            shelf: usize,
            product: ProductId,
            quantity: u32,
            priority: Priority,
        }

        let mut shortfalls = Vec::new();
        for &shelf_idx in &self.world.shelves {
            let Some(shelf) = self.world.shelf(shelf_idx) else {
                continue;
            };
            for slot in &shelf.slots {
                let Some(product) = slot.product_id else {
                    continue;
                };
                if slot.capacity == 0 {
                    continue;
                }
                let fill_rate = slot.fill_rate();
                let popularity = self
                    .world
                    .product(product)
                    .map(|p| p.popularity)
                    .unwrap_or(0);
                let threshold = if popularity >= 5 {
                    0.5
                } else if popularity >= 3 {
                    0.4
                } else {
                    0.3
                };
                if fill_rate >= threshold {
                    continue;
                }
                let critical = fill_rate < 0.1;
                shortfalls.push(Shortfall {
                    shelf: shelf_idx,
                    product,
                    quantity: if critical {
                        slot.capacity
                    } else {
                        slot.capacity - slot.occupied
                    },
                    priority: if critical { Priority::High } else { Priority::Low },
                });
            }
        }

        for shortfall in shortfalls {
            let task = restock_request_task(
                &mut self.task_ids,
                shortfall.product,
                shortfall.quantity,
                self.world.loading_dock,
                shortfall.shelf,
                shortfall.priority,
                0.0,
            );
            let action = self.negotiate(&task)?;
            if action.is_wait() {
                eprintln!("[sim] restock of product {} deferred", shortfall.product);
            } else {
                let robot = action.robot(self.robots.len());
                let estimate = self.estimate_completion_time(
                    robot,
                    self.world.loading_dock,
                    shortfall.shelf,
                );
                self.send_ack(&task.task_id, robot, estimate)?;
            }
        }

        self.events.schedule_restock_sweep();
        Ok(())
    }

    fn handle_urgent_restock(&mut self, event: SimEvent) -> Result<(), ProtocolError> {
        let now = self.events.now();
        let product = event.product_id;

        if self.world.dock().occupied {
            let mut retry_event = event;
            retry_event.trigger_time = now + retry::URGENT_DOCK_BUSY_S;
            self.events.push(retry_event);
            return Ok(());
        }

        // The emergency delivery seizes the dock like any other lorry.
        {
            let dock = self.world.dock_mut();
            dock.occupied = true;
            dock.delivery_count += 1;
            dock.current_lorry = Lorry::from_quantity(event.quantity);
        }

        // Prefer the slot already assigned to the product; fall back to an
        // empty slot the product can take over.
        let target = self
            .world
            .find_slot_for_product(product)
            .or_else(|| self.world.find_free_slot());

        let Some((shelf, slot)) = target else {
            eprintln!("[sim] WARN: urgent restock of product {product} found no slot");
            self.world.dock_mut().occupied = false;
            let mut retry_event = event;
            retry_event.trigger_time = now + retry::URGENT_WAIT_S;
            self.events.push(retry_event);
            return Ok(());
        };

        let task = restock_request_task(
            &mut self.task_ids,
            product,
            event.quantity,
            self.world.loading_dock,
            shelf,
            Priority::Urgent,
            now + retry::URGENT_DEADLINE_S,
        );
        let action = self.negotiate(&task)?;

        if action.is_wait() {
            self.world.dock_mut().occupied = false;
            let mut retry_event = event;
            retry_event.trigger_time = now + retry::URGENT_WAIT_S;
            self.events.push(retry_event);
            return Ok(());
        }

        // Claim the slot for the product if it was a free-slot fallback.
        let slot_state = self.world.get_shelf_slots(shelf).get(slot).cloned();
        if let Some(slot_state) = slot_state {
            if slot_state.product_id != Some(product) {
                self.world
                    .set_shelf_slot(shelf, slot, Some(product), slot_state.capacity, 0);
            }
        }
        self.world.restock_slot(shelf, product, event.quantity);
        self.world.dock_mut().occupied = false;

        let robot = action.robot(self.robots.len());
        let estimate = self.estimate_completion_time(robot, self.world.loading_dock, shelf);
        self.send_ack(&task.task_id, robot, estimate)?;
        Ok(())
    }

    fn handle_robot_status_event(
        &mut self,
        event: SimEvent,
        status: StatusKind,
        message: &str,
    ) -> Result<(), ProtocolError> {
        let Some(robot_index) = event.node_index.filter(|&r| r < self.robots.len()) else {
            return Ok(());
        };
        // Battery may have recovered between queueing and dispatch.
        if status == StatusKind::LowBattery
            && self.robots[robot_index].battery >= self.cfg.low_battery_threshold
        {
            return Ok(());
        }

        self.send_robot_status(robot_index, status, message)
    }

    fn send_robot_status(
        &mut self,
        robot_index: usize,
        status: StatusKind,
        message: &str,
    ) -> Result<(), ProtocolError> {
        let state = StateSnapshot::capture(&self.world, &self.robots, self.events.now());
        self.channel.send(&Outbound::RobotStatus {
            timestamp: self.events.now(),
            robot_index,
            status_type: status,
            task_id: String::new(),
            message: message.to_string(),
            state,
        })
    }

    /// Best-effort status push for notifications raised outside the
    /// event-dispatch path. A failed send is reported, never fatal.
    fn push_robot_status(&mut self, robot_index: usize, status: StatusKind, message: &str) {
        if let Err(e) = self.send_robot_status(robot_index, status, message) {
            eprintln!("[sim] WARN: robot status push failed: {e}");
        }
    }
}
