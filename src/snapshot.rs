// src/snapshot.rs
//
// Read-only wire views of the world and the fleet. Captured between event
// dispatch steps, so every snapshot is internally consistent. Node and
// robot references stay integer indices on the wire; absent references are
// the -1 sentinel.

use serde::Serialize;

use crate::robot::Robot;
use crate::types::SimTime;
use crate::world::{NodePayload, World};

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub index: usize,
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub zone: String,
    pub max_robots: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeSnapshot {
    pub from: usize,
    pub to: usize,
    pub distance: f64,
    pub directed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub edges: Vec<EdgeSnapshot>,
}

impl LayoutSnapshot {
    pub fn capture(world: &World) -> Self {
        let nodes = world
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| NodeSnapshot {
                index,
                id: node.id.clone(),
                node_type: format!("{:?}", node.node_type),
                zone: node.zone.as_str().to_string(),
                max_robots: node.max_robots,
            })
            .collect();

        let mut edges = Vec::new();
        for from in 0..world.graph.node_count() {
            for edge in world.graph.neighbors(from) {
                edges.push(EdgeSnapshot {
                    from,
                    to: edge.to,
                    distance: edge.distance,
                    directed: edge.directed,
                });
            }
        }

        Self { nodes, edges }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductSnapshot {
    pub id: i32,
    pub name: String,
    pub popularity: u32,
}

pub fn capture_products(world: &World) -> Vec<ProductSnapshot> {
    world
        .products
        .iter()
        .map(|p| ProductSnapshot {
            id: p.id,
            name: p.name.clone(),
            popularity: p.popularity,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWire {
    pub product_id: i32,
    pub quantity: u32,
    pub slot_index: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RobotWire {
    pub id: String,
    pub index: usize,
    pub current_node: i64,
    pub target_node: i64,
    pub battery: f64,
    pub status: String,
    pub carrying: bool,
    pub has_order: bool,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_order: Option<OrderWire>,
}

pub fn capture_robots(robots: &[Robot]) -> Vec<RobotWire> {
    robots
        .iter()
        .enumerate()
        .map(|(index, robot)| RobotWire {
            id: robot.id.clone(),
            index,
            current_node: robot.current_node as i64,
            target_node: robot.target_node.map(|n| n as i64).unwrap_or(-1),
            battery: robot.battery,
            status: robot.status.as_str().to_string(),
            carrying: robot.carrying,
            has_order: robot.has_order,
            speed: robot.speed,
            current_order: robot.current_order.as_ref().map(|o| OrderWire {
                product_id: o.product_id,
                quantity: o.quantity,
                slot_index: o.slot_index,
            }),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub slot_index: usize,
    pub product_id: i64,
    pub occupied: u32,
    pub capacity: u32,
    pub fill_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShelfSnapshot {
    pub node_index: usize,
    pub shelf_name: String,
    pub zone: String,
    pub slots: Vec<SlotSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DockSnapshot {
    pub occupied: bool,
    pub delivery_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeskSnapshot {
    pub pending_orders: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargerSnapshot {
    pub occupied: u32,
    pub available_ports: u32,
}

/// The full state block attached to NEW_TASK / ROBOT_STATUS / EPISODE_END.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub sim_time: f64,
    pub robots: Vec<RobotWire>,
    pub inventory: Vec<ShelfSnapshot>,
    pub loading_dock: DockSnapshot,
    pub front_desk: DeskSnapshot,
    pub charging_station: ChargerSnapshot,
}

impl StateSnapshot {
    pub fn capture(world: &World, robots: &[Robot], sim_time: SimTime) -> Self {
        let mut inventory = Vec::with_capacity(world.shelves.len());
        for &shelf_idx in &world.shelves {
            let node = &world.nodes[shelf_idx];
            if let NodePayload::Shelf(shelf) = &node.payload {
                inventory.push(ShelfSnapshot {
                    node_index: shelf_idx,
                    shelf_name: shelf.name.clone(),
                    zone: node.zone.as_str().to_string(),
                    slots: shelf
                        .slots
                        .iter()
                        .enumerate()
                        .map(|(slot_index, slot)| SlotSnapshot {
                            slot_index,
                            product_id: slot.product_id.map(i64::from).unwrap_or(-1),
                            occupied: slot.occupied,
                            capacity: slot.capacity,
                            fill_rate: slot.fill_rate(),
                        })
                        .collect(),
                });
            }
        }

        let dock = world.dock();
        let charger = world.charger();

        Self {
            sim_time,
            robots: capture_robots(robots),
            inventory,
            loading_dock: DockSnapshot {
                occupied: dock.occupied,
                delivery_count: dock.delivery_count,
            },
            front_desk: DeskSnapshot {
                pending_orders: world.desk().pending_orders,
            },
            charging_station: ChargerSnapshot {
                occupied: charger.occupied_count,
                available_ports: charger.ports.saturating_sub(charger.occupied_count),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::init_fleet;

    #[test]
    fn layout_covers_every_node_and_edge_direction() {
        let world = World::canonical();
        let layout = LayoutSnapshot::capture(&world);
        assert_eq!(layout.nodes.len(), 13);
        assert_eq!(layout.nodes[0].node_type, "LoadingDock");
        assert_eq!(layout.nodes[1].zone, "Hot");
        // Undirected edges appear once per direction.
        let dock_to_a = layout
            .edges
            .iter()
            .filter(|e| (e.from == 0 && e.to == 1) || (e.from == 1 && e.to == 0))
            .count();
        assert_eq!(dock_to_a, 2);
    }

    #[test]
    fn state_snapshot_has_fill_rates() {
        let world = World::canonical();
        let robots = init_fleet(2, world.charging_station, 1.0);
        let state = StateSnapshot::capture(&world, &robots, 12.5);

        assert_eq!(state.sim_time, 12.5);
        assert_eq!(state.robots.len(), 2);
        assert_eq!(state.inventory.len(), 10);
        let shelf_a = &state.inventory[0];
        assert_eq!(shelf_a.zone, "Hot");
        assert!((shelf_a.slots[0].fill_rate - 35.0 / 50.0).abs() < 1e-12);
        assert_eq!(state.charging_station.available_ports, 3);
    }

    #[test]
    fn robot_wire_uses_sentinels() {
        let world = World::canonical();
        let robots = init_fleet(1, world.charging_station, 1.0);
        let wire = capture_robots(&robots);
        assert_eq!(wire[0].target_node, -1);
        assert_eq!(wire[0].status, "Idle");
        assert!(wire[0].current_order.is_none());

        let json = serde_json::to_value(&wire[0]).unwrap();
        assert_eq!(json["target_node"], -1);
        // Absent order is omitted entirely, not null.
        assert!(json.get("current_order").is_none());
    }
}
