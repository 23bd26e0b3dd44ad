// src/tasks.rs
//
// Task construction and the reservation discipline around policy
// negotiation. Stock motivated by a task is decremented BEFORE the task
// goes on the wire; a WAIT or protocol error reverses the exact decrement.
// Postpone counters drive retry backoff and urgency escalation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{NodeIndex, Priority, ProductId, SimTime, TaskKind};
use crate::world::World;

/// A task on the wire. Node fields use `-1` for "not applicable / policy
/// chooses".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub task_type: TaskKind,
    pub product_id: ProductId,
    pub quantity: u32,
    pub source_node: i64,
    pub target_node: i64,
    pub priority: Priority,
    pub deadline: f64,
}

/// Monotonic task-id allocator; ids look like `order_42`. The counter is
/// never reset so ids stay unique across episodes.
#[derive(Debug, Clone, Default)]
pub struct TaskCounter {
    next: u64,
}

impl TaskCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self, kind: TaskKind) -> String {
        self.next += 1;
        format!("{}_{}", kind.id_prefix(), self.next)
    }
}

pub fn customer_order_task(
    counter: &mut TaskCounter,
    product_id: ProductId,
    quantity: u32,
    source_shelf: NodeIndex,
    front_desk: NodeIndex,
) -> Task {
    Task {
        task_id: counter.next_id(TaskKind::CustomerOrder),
        task_type: TaskKind::CustomerOrder,
        product_id,
        quantity,
        source_node: source_shelf as i64,
        target_node: front_desk as i64,
        priority: Priority::Normal,
        deadline: 0.0,
    }
}

/// Delivery task: the policy chooses the destination shelf, hence
/// `target_node = -1`.
pub fn incoming_delivery_task(
    counter: &mut TaskCounter,
    product_id: ProductId,
    quantity: u32,
    loading_dock: NodeIndex,
) -> Task {
    Task {
        task_id: counter.next_id(TaskKind::IncomingDelivery),
        task_type: TaskKind::IncomingDelivery,
        product_id,
        quantity,
        source_node: loading_dock as i64,
        target_node: -1,
        priority: Priority::Normal,
        deadline: 0.0,
    }
}

pub fn restock_request_task(
    counter: &mut TaskCounter,
    product_id: ProductId,
    quantity: u32,
    source_node: NodeIndex,
    target_shelf: NodeIndex,
    priority: Priority,
    deadline: SimTime,
) -> Task {
    Task {
        task_id: counter.next_id(TaskKind::RestockRequest),
        task_type: TaskKind::RestockRequest,
        product_id,
        quantity,
        source_node: source_node as i64,
        target_node: target_shelf as i64,
        priority,
        deadline,
    }
}

/// Receipt for a speculative stock decrement. Must be either committed
/// (dropped) after an ACK or rolled back after WAIT/error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub shelf: NodeIndex,
    pub slot: usize,
    pub quantity: u32,
}

/// Eagerly take `quantity` from a slot. Returns None (and leaves the world
/// untouched) when the slot cannot cover the request.
pub fn reserve(world: &mut World, shelf: NodeIndex, slot: usize, quantity: u32) -> Option<Reservation> {
    let data = world.shelf_mut(shelf)?;
    let s = data.slots.get_mut(slot)?;
    if s.occupied < quantity {
        return None;
    }
    s.occupied -= quantity;
    Some(Reservation {
        shelf,
        slot,
        quantity,
    })
}

/// Reverse a reservation exactly. Clamps (with a diagnostic) if the slot
/// shrank in the meantime, which would indicate a bug elsewhere.
pub fn rollback(world: &mut World, reservation: Reservation) {
    let Some(data) = world.shelf_mut(reservation.shelf) else {
        eprintln!(
            "[tasks] WARN: rollback against missing shelf {}",
            reservation.shelf
        );
        return;
    };
    let Some(slot) = data.slots.get_mut(reservation.slot) else {
        eprintln!(
            "[tasks] WARN: rollback against missing slot {} on shelf {}",
            reservation.slot, reservation.shelf
        );
        return;
    };
    let restored = slot.occupied + reservation.quantity;
    if restored > slot.capacity {
        eprintln!(
            "[tasks] WARN: rollback overflows slot {} on shelf {}; clamping",
            reservation.slot, reservation.shelf
        );
    }
    slot.occupied = restored.min(slot.capacity);
}

/// Consecutive stock-failure counters keyed by product id.
#[derive(Debug, Clone, Default)]
pub struct PostponeTracker {
    counts: BTreeMap<ProductId, u32>,
}

/// Postpone count at which an urgent restock is escalated.
pub const URGENT_ESCALATION_AT: u32 = 3;

/// Postpone count at which the order is cancelled.
pub const CANCEL_AT: u32 = 10;

impl PostponeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more postponement; returns the new count.
    pub fn record(&mut self, product_id: ProductId) -> u32 {
        let count = self.counts.entry(product_id).or_insert(0);
        *count += 1;
        *count
    }

    pub fn count(&self, product_id: ProductId) -> u32 {
        self.counts.get(&product_id).copied().unwrap_or(0)
    }

    /// Reset on successful reservation or cancellation.
    pub fn reset(&mut self, product_id: ProductId) {
        self.counts.remove(&product_id);
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

/// Retry backoff after the `attempts`-th postponement: 30 * 2^min(n-1, 4).
pub fn postpone_backoff_s(attempts: u32) -> f64 {
    let exp = attempts.saturating_sub(1).min(4);
    30.0 * f64::from(1u32 << exp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_monotonic_and_prefixed() {
        let mut counter = TaskCounter::new();
        let w = World::canonical();
        let t1 = customer_order_task(&mut counter, 1, 2, w.shelves[0], w.front_desk);
        let t2 = incoming_delivery_task(&mut counter, 5, 20, w.loading_dock);
        let t3 = restock_request_task(
            &mut counter,
            7,
            10,
            w.loading_dock,
            w.shelves[3],
            Priority::Urgent,
            180.0,
        );
        assert_eq!(t1.task_id, "order_1");
        assert_eq!(t2.task_id, "delivery_2");
        assert_eq!(t3.task_id, "restock_3");
        assert_eq!(t2.target_node, -1);
        assert_eq!(t3.priority, Priority::Urgent);

        // Node fields carry real indices where applicable.
        assert_eq!(t1.source_node, w.shelves[0] as i64);
        assert_eq!(t1.target_node, w.front_desk as i64);
    }

    #[test]
    fn reserve_then_rollback_restores_stock() {
        let mut w = World::canonical();
        let shelf = w.shelves[0];
        let res = reserve(&mut w, shelf, 0, 2).unwrap();
        assert_eq!(w.get_shelf_slots(shelf)[0].occupied, 33);
        rollback(&mut w, res);
        assert_eq!(w.get_shelf_slots(shelf)[0].occupied, 35);
    }

    #[test]
    fn reserve_fails_on_insufficient_stock() {
        let mut w = World::canonical();
        let shelf = w.shelves[0];
        assert!(reserve(&mut w, shelf, 0, 36).is_none());
        assert_eq!(w.get_shelf_slots(shelf)[0].occupied, 35);
    }

    #[test]
    fn rollback_clamps_on_overflow() {
        let mut w = World::canonical();
        let shelf = w.shelves[0];
        let res = reserve(&mut w, shelf, 0, 2).unwrap();
        // Something else refilled the slot behind our back.
        w.set_shelf_slot(shelf, 0, Some(1), 50, 50);
        rollback(&mut w, res);
        assert_eq!(w.get_shelf_slots(shelf)[0].occupied, 50);
        assert!(w.invariant_violations().is_empty());
    }

    #[test]
    fn postpone_counts_and_reset() {
        let mut tracker = PostponeTracker::new();
        assert_eq!(tracker.record(7), 1);
        assert_eq!(tracker.record(7), 2);
        assert_eq!(tracker.count(7), 2);
        assert_eq!(tracker.count(8), 0);
        tracker.reset(7);
        assert_eq!(tracker.count(7), 0);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(postpone_backoff_s(1), 30.0);
        assert_eq!(postpone_backoff_s(2), 60.0);
        assert_eq!(postpone_backoff_s(3), 120.0);
        assert_eq!(postpone_backoff_s(4), 240.0);
        assert_eq!(postpone_backoff_s(5), 480.0);
        assert_eq!(postpone_backoff_s(12), 480.0);
    }
}
