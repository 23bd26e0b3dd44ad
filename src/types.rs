// src/types.rs
//
// Common shared types for the warehouse simulator.

use serde::{Deserialize, Serialize};

/// Simulated time in seconds since episode start.
pub type SimTime = f64;

/// Stable node index into the world's node vector.
pub type NodeIndex = usize;

/// Stable robot index into the robot vector.
pub type RobotIndex = usize;

/// Catalogue product id. Ids start at 1; `-1` is the wire sentinel for "none".
pub type ProductId = i32;

/// Kind of a world node. The carried payload variant must match this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Shelf,
    LoadingDock,
    FrontDesk,
    ChargingStation,
    Junction,
}

/// Popularity class assigned to a node, used by the placement recommender.
/// Non-shelf nodes are `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    Hot,
    Warm,
    Cold,
    Other,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Hot => "Hot",
            Zone::Warm => "Warm",
            Zone::Cold => "Cold",
            Zone::Other => "Other",
        }
    }
}

/// Delivery lorry size; `quantity` is the number of items delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lorry {
    Small,
    Medium,
    Big,
}

impl Lorry {
    /// Number of items a lorry of this size delivers.
    pub fn quantity(&self) -> u32 {
        match self {
            Lorry::Small => 10,
            Lorry::Medium => 20,
            Lorry::Big => 30,
        }
    }

    /// Map a delivered quantity back to the smallest lorry that fits it.
    pub fn from_quantity(quantity: u32) -> Lorry {
        if quantity <= 10 {
            Lorry::Small
        } else if quantity <= 20 {
            Lorry::Medium
        } else {
            Lorry::Big
        }
    }
}

/// Task categories negotiated with the external policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    CustomerOrder,
    IncomingDelivery,
    RestockRequest,
}

impl TaskKind {
    /// Stable prefix used when allocating task ids ("order_42" etc).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            TaskKind::CustomerOrder => "order",
            TaskKind::IncomingDelivery => "delivery",
            TaskKind::RestockRequest => "restock",
        }
    }
}

/// Task priority on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

/// Action verbs the policy may answer a task with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    PickupAndDeliver,
    Restock,
    Charge,
    Handover,
    Wait,
}

impl Default for ActionKind {
    fn default() -> Self {
        ActionKind::Wait
    }
}

/// Status categories pushed to the policy via ROBOT_STATUS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    TaskComplete,
    TaskFailed,
    LowBattery,
    Stuck,
    HandoverReady,
    Charging,
}

/// Robot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotStatus {
    Idle,
    Moving,
    Carrying,
    Picking,
    Dropping,
    Charging,
}

impl RobotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotStatus::Idle => "Idle",
            RobotStatus::Moving => "Moving",
            RobotStatus::Carrying => "Carrying",
            RobotStatus::Picking => "Picking",
            RobotStatus::Dropping => "Dropping",
            RobotStatus::Charging => "Charging",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lorry_quantities_round_trip() {
        for lorry in [Lorry::Small, Lorry::Medium, Lorry::Big] {
            assert_eq!(Lorry::from_quantity(lorry.quantity()), lorry);
        }
    }

    #[test]
    fn wire_names_match_protocol() {
        let json = serde_json::to_string(&TaskKind::CustomerOrder).unwrap();
        assert_eq!(json, "\"CUSTOMER_ORDER\"");
        let json = serde_json::to_string(&ActionKind::PickupAndDeliver).unwrap();
        assert_eq!(json, "\"PICKUP_AND_DELIVER\"");
        let json = serde_json::to_string(&Priority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
        let json = serde_json::to_string(&StatusKind::LowBattery).unwrap();
        assert_eq!(json, "\"LOW_BATTERY\"");
    }
}
