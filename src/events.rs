// src/events.rs
//
// Time-ordered event queue plus the stochastic generators feeding it.
// The queue is a binary min-heap keyed by trigger time with a secondary
// enqueue-sequence key, so events with equal trigger times pop in FIFO
// order and runs are reproducible. All randomness flows through one seeded
// ChaCha8 generator owned here.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::types::{Lorry, ProductId, RobotIndex, SimTime};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    IncomingDelivery,
    CustomerOrder,
    RestockNeeded,
    UrgentRestock,
    RobotTaskComplete,
    LowBattery,
}

/// One scheduled simulation event.
///
/// `node_index` is the node the event concerns; for the robot-scoped kinds
/// (`RobotTaskComplete`, `LowBattery`) it carries the robot index instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub kind: EventKind,
    pub trigger_time: SimTime,
    pub node_index: Option<usize>,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl SimEvent {
    pub fn robot_task_complete(trigger_time: SimTime, robot: RobotIndex) -> Self {
        Self {
            kind: EventKind::RobotTaskComplete,
            trigger_time,
            node_index: Some(robot),
            product_id: -1,
            quantity: 0,
        }
    }

    pub fn low_battery(trigger_time: SimTime, robot: RobotIndex) -> Self {
        Self {
            kind: EventKind::LowBattery,
            trigger_time,
            node_index: Some(robot),
            product_id: -1,
            quantity: 0,
        }
    }
}

/// Heap wrapper ordering events by (trigger_time, enqueue seq), earliest
/// first. BinaryHeap is a max-heap, so comparisons are reversed.
#[derive(Debug, Clone)]
struct QueuedEvent {
    event: SimEvent,
    seq: u64,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedEvent {}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .event
            .trigger_time
            .partial_cmp(&self.event.trigger_time)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The scheduler state: heap, clock and RNG.
#[derive(Debug, Clone)]
pub struct EventSystem {
    heap: BinaryHeap<QueuedEvent>,
    next_seq: u64,
    rng: ChaCha8Rng,
    now: SimTime,
    delivery_mean_s: f64,
    order_mean_s: f64,
    restock_interval_s: f64,
}

impl EventSystem {
    pub fn new(delivery_mean_s: f64, order_mean_s: f64, restock_interval_s: f64) -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            rng: ChaCha8Rng::seed_from_u64(0),
            now: 0.0,
            delivery_mean_s,
            order_mean_s,
            restock_interval_s,
        }
    }

    /// Re-seed the RNG, clear the heap and the clock, and pre-schedule the
    /// first delivery, the first customer order and the restock sweep.
    pub fn init(&mut self, seed: u64, world: &World) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.heap.clear();
        self.next_seq = 0;
        self.now = 0.0;
        self.schedule_incoming_delivery(world);
        self.schedule_customer_order(world);
        self.schedule_restock_sweep();
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Advance the clock by one tick; events are drained by the caller.
    pub fn advance(&mut self, dt: f64) -> SimTime {
        self.now += dt;
        self.now
    }

    pub fn push(&mut self, event: SimEvent) {
        if event.trigger_time < self.now {
            eprintln!(
                "[events] WARN: event scheduled in the past ({} < {}); clamping",
                event.trigger_time, self.now
            );
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let mut event = event;
        event.trigger_time = event.trigger_time.max(self.now);
        self.heap.push(QueuedEvent { event, seq });
    }

    /// Pop the earliest event whose trigger time has passed.
    pub fn pop_due(&mut self) -> Option<SimEvent> {
        let due = self
            .heap
            .peek()
            .map(|q| q.event.trigger_time <= self.now)
            .unwrap_or(false);
        if due {
            self.heap.pop().map(|q| q.event)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn next_trigger_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|q| q.event.trigger_time)
    }

    /// Snapshot of the pending events in trigger order (for tests and
    /// diagnostics; the heap itself stays untouched).
    pub fn pending(&self) -> Vec<SimEvent> {
        let mut events: Vec<_> = self.heap.iter().cloned().collect();
        events.sort_by(|a, b| {
            a.event
                .trigger_time
                .partial_cmp(&b.event.trigger_time)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.seq.cmp(&b.seq))
        });
        events.into_iter().map(|q| q.event).collect()
    }

    // ---------------------------------------------------------------------
    // Stochastic generators
    // ---------------------------------------------------------------------

    fn sample_exponential(&mut self, mean_s: f64) -> f64 {
        // Inverse CDF on a uniform draw; 1-u keeps the log argument nonzero.
        let u: f64 = self.rng.gen();
        -mean_s * (1.0 - u).ln()
    }

    fn sample_product_weighted(&mut self, world: &World, weights: Vec<f64>) -> ProductId {
        match WeightedIndex::new(&weights) {
            Ok(dist) => {
                let idx = dist.sample(&mut self.rng);
                world.products[idx].id
            }
            Err(_) => world.products.first().map(|p| p.id).unwrap_or(-1),
        }
    }

    /// Schedule the next lorry arrival. Less popular products are refilled
    /// more often: weight = max(1, 10 - popularity).
    pub fn schedule_incoming_delivery(&mut self, world: &World) {
        let trigger_time = self.now + self.sample_exponential(self.delivery_mean_s);

        let lorry = match self.rng.gen_range(0..3) {
            0 => Lorry::Small,
            1 => Lorry::Medium,
            _ => Lorry::Big,
        };

        let weights: Vec<f64> = world
            .products
            .iter()
            .map(|p| (10.0 - f64::from(p.popularity)).max(1.0))
            .collect();
        let product_id = self.sample_product_weighted(world, weights);

        self.push(SimEvent {
            kind: EventKind::IncomingDelivery,
            trigger_time,
            node_index: Some(world.loading_dock),
            product_id,
            quantity: lorry.quantity(),
        });
    }

    /// Schedule the next customer order. Popular products are ordered more
    /// often: weight = popularity + 1.
    pub fn schedule_customer_order(&mut self, world: &World) {
        let trigger_time = self.now + self.sample_exponential(self.order_mean_s);

        let weights: Vec<f64> = world
            .products
            .iter()
            .map(|p| f64::from(p.popularity + 1))
            .collect();
        let product_id = self.sample_product_weighted(world, weights);
        let quantity = self.rng.gen_range(1..=5);

        self.push(SimEvent {
            kind: EventKind::CustomerOrder,
            trigger_time,
            node_index: Some(world.front_desk),
            product_id,
            quantity,
        });
    }

    /// Schedule the next periodic shelf fill-rate sweep.
    pub fn schedule_restock_sweep(&mut self) {
        let trigger_time = self.now + self.restock_interval_s;
        self.push(SimEvent {
            kind: EventKind::RestockNeeded,
            trigger_time,
            node_index: None,
            product_id: -1,
            quantity: 0,
        });
    }
}

/// Retry delays for the dispatch paths (seconds).
pub mod retry {
    /// Lorry waits for the dock to clear.
    pub const DELIVERY_DOCK_BUSY_S: f64 = 300.0;
    /// Policy answered WAIT to a delivery task.
    pub const DELIVERY_WAIT_S: f64 = 120.0;
    /// Urgent restock found the dock busy.
    pub const URGENT_DOCK_BUSY_S: f64 = 30.0;
    /// Policy answered WAIT to an urgent restock.
    pub const URGENT_WAIT_S: f64 = 60.0;
    /// Escalated urgent restock fires almost immediately.
    pub const URGENT_ESCALATION_DELAY_S: f64 = 1.0;
    /// Deadline granted to an urgent restock task.
    pub const URGENT_DEADLINE_S: f64 = 180.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> EventSystem {
        EventSystem::new(7200.0, 300.0, 1800.0)
    }

    fn event_at(t: f64) -> SimEvent {
        SimEvent {
            kind: EventKind::CustomerOrder,
            trigger_time: t,
            node_index: None,
            product_id: 1,
            quantity: 1,
        }
    }

    #[test]
    fn pops_in_time_order() {
        let mut sys = system();
        sys.push(event_at(5.0));
        sys.push(event_at(1.0));
        sys.push(event_at(3.0));
        sys.advance(10.0);

        let mut times = Vec::new();
        while let Some(ev) = sys.pop_due() {
            times.push(ev.trigger_time);
        }
        assert_eq!(times, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn equal_times_pop_fifo() {
        let mut sys = system();
        let mut first = event_at(2.0);
        first.product_id = 10;
        let mut second = event_at(2.0);
        second.product_id = 20;
        sys.push(first);
        sys.push(second);
        sys.advance(5.0);

        assert_eq!(sys.pop_due().unwrap().product_id, 10);
        assert_eq!(sys.pop_due().unwrap().product_id, 20);
    }

    #[test]
    fn not_due_stays_queued() {
        let mut sys = system();
        sys.push(event_at(100.0));
        sys.advance(1.0);
        assert!(sys.pop_due().is_none());
        assert_eq!(sys.len(), 1);
        assert_eq!(sys.next_trigger_time(), Some(100.0));
    }

    #[test]
    fn past_events_are_clamped_to_now() {
        let mut sys = system();
        sys.advance(50.0);
        sys.push(event_at(10.0));
        assert_eq!(sys.next_trigger_time(), Some(50.0));
    }

    #[test]
    fn init_preschedules_three_generators() {
        let world = World::canonical();
        let mut sys = system();
        sys.init(42, &world);
        let kinds: Vec<_> = sys.pending().iter().map(|e| e.kind).collect();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.contains(&EventKind::IncomingDelivery));
        assert!(kinds.contains(&EventKind::CustomerOrder));
        assert!(kinds.contains(&EventKind::RestockNeeded));

        // The sweep is strictly periodic.
        let sweep = sys
            .pending()
            .into_iter()
            .find(|e| e.kind == EventKind::RestockNeeded)
            .unwrap();
        assert_eq!(sweep.trigger_time, 1800.0);
    }

    #[test]
    fn same_seed_same_schedule() {
        let world = World::canonical();
        let mut a = system();
        let mut b = system();
        a.init(7, &world);
        b.init(7, &world);
        assert_eq!(a.pending(), b.pending());

        let mut c = system();
        c.init(8, &world);
        assert_ne!(a.pending(), c.pending());
    }

    #[test]
    fn order_quantities_stay_in_range() {
        let world = World::canonical();
        let mut sys = system();
        sys.init(1, &world);
        for _ in 0..50 {
            sys.schedule_customer_order(&world);
        }
        for ev in sys.pending() {
            if ev.kind == EventKind::CustomerOrder {
                assert!((1..=5).contains(&ev.quantity));
            }
        }
    }

    #[test]
    fn delivery_quantities_are_lorry_sizes() {
        let world = World::canonical();
        let mut sys = system();
        sys.init(1, &world);
        for _ in 0..50 {
            sys.schedule_incoming_delivery(&world);
        }
        for ev in sys.pending() {
            if ev.kind == EventKind::IncomingDelivery {
                assert!([10, 20, 30].contains(&ev.quantity));
            }
        }
    }
}
