// src/world.rs
//
// Ground-truth world model: nodes with tagged payloads, the product
// catalogue, and the canonical warehouse layout. All inventory mutation
// flows through the methods here; they clamp instead of panicking when an
// operation would violate an invariant, and report the clamp on stderr.

use crate::graph::Graph;
use crate::types::{Lorry, NodeIndex, NodeType, ProductId, Zone};

/// One shelf slot. Invariant: `occupied <= capacity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub product_id: Option<ProductId>,
    pub occupied: u32,
    pub capacity: u32,
}

impl Slot {
    pub fn empty() -> Self {
        Self {
            product_id: None,
            occupied: 0,
            capacity: 0,
        }
    }

    /// `occupied / capacity`, 0 when capacity is 0.
    pub fn fill_rate(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            f64::from(self.occupied) / f64::from(self.capacity)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfData {
    pub name: String,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockData {
    pub occupied: bool,
    pub delivery_count: u32,
    pub current_lorry: Lorry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargerData {
    pub occupied_count: u32,
    pub ports: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskData {
    pub pending_orders: u32,
}

/// Tagged node payload; the variant must match the node's `node_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePayload {
    Shelf(ShelfData),
    LoadingDock(DockData),
    ChargingStation(ChargerData),
    FrontDesk(DeskData),
    Junction,
}

impl NodePayload {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodePayload::Shelf(_) => NodeType::Shelf,
            NodePayload::LoadingDock(_) => NodeType::LoadingDock,
            NodePayload::ChargingStation(_) => NodeType::ChargingStation,
            NodePayload::FrontDesk(_) => NodeType::FrontDesk,
            NodePayload::Junction => NodeType::Junction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub zone: Zone,
    pub max_robots: u32,
    pub current_robots: u32,
    pub payload: NodePayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub popularity: u32,
}

/// The owned world state: node vector, product catalogue, routing graph and
/// the landmark indices of the canonical layout.
#[derive(Debug, Clone)]
pub struct World {
    pub nodes: Vec<Node>,
    pub products: Vec<Product>,
    pub graph: Graph,
    pub loading_dock: NodeIndex,
    pub charging_station: NodeIndex,
    pub front_desk: NodeIndex,
    pub shelves: Vec<NodeIndex>,
}

/// Canonical catalogue: (id, name), ids 1..=30.
const CATALOGUE: &[(ProductId, &str)] = &[
    (1, "T-shirts"),
    (2, "Jeans"),
    (3, "Jackets"),
    (4, "Shoes"),
    (5, "Accessories"),
    (6, "Soda"),
    (7, "Juice"),
    (8, "Energy Drinks"),
    (9, "Skin Care"),
    (10, "Makeup"),
    (11, "Perfume"),
    (12, "Hair Care"),
    (13, "Mobile Phones"),
    (14, "Laptops"),
    (15, "Headphones"),
    (16, "Game Consoles"),
    (17, "Cameras"),
    (18, "Books"),
    (19, "Magazines"),
    (20, "Games"),
    (21, "Kitchen Utensils"),
    (22, "Textiles"),
    (23, "Furniture"),
    (24, "Lighting"),
    (25, "Decoration"),
    (26, "Training Equipment"),
    (27, "Sports Clothing"),
    (28, "Outdoor Equipment"),
    (29, "Children's Toys"),
    (30, "Board Games"),
];

/// Canonical shelves: (letter, zone, slots as (product, capacity, occupied)).
#[allow(clippy::type_complexity)]
const SHELF_LAYOUT: &[(&str, Zone, &[(ProductId, u32, u32)])] = &[
    ("A", Zone::Hot, &[(1, 50, 35), (2, 40, 28), (3, 30, 15), (4, 45, 30), (5, 60, 45)]),
    ("B", Zone::Warm, &[(13, 25, 12), (14, 20, 8), (15, 50, 35), (16, 15, 7), (17, 30, 18)]),
    ("C", Zone::Cold, &[(9, 40, 25), (10, 45, 30), (11, 35, 20), (12, 40, 28)]),
    ("D", Zone::Cold, &[(6, 100, 75), (7, 80, 60), (8, 70, 45)]),
    ("E", Zone::Cold, &[(18, 60, 45), (19, 50, 30), (20, 40, 25)]),
    ("F", Zone::Cold, &[(21, 35, 20), (22, 45, 30), (23, 15, 8)]),
    ("G", Zone::Cold, &[(24, 40, 25), (25, 50, 35)]),
    ("H", Zone::Warm, &[(26, 30, 18), (27, 40, 25), (28, 25, 15)]),
    ("I", Zone::Hot, &[(29, 55, 40), (30, 35, 20)]),
    ("J", Zone::Warm, &[(1, 50, 40), (15, 50, 35), (6, 100, 80), (18, 60, 45)]),
];

const CHARGING_PORTS: u32 = 3;

impl World {
    /// Build the canonical 13-node warehouse: loading dock, shelves A-J,
    /// charging station, front desk, with the fixed edge list.
    pub fn canonical() -> Self {
        let mut world = World {
            nodes: Vec::new(),
            products: CATALOGUE
                .iter()
                .map(|(id, name)| Product {
                    id: *id,
                    name: (*name).to_string(),
                    popularity: 0,
                })
                .collect(),
            graph: Graph::new(),
            loading_dock: 0,
            charging_station: 0,
            front_desk: 0,
            shelves: Vec::new(),
        };

        world.loading_dock = world.add_node(
            "loading_dock",
            Zone::Other,
            2,
            NodePayload::LoadingDock(DockData {
                occupied: false,
                delivery_count: 0,
                current_lorry: Lorry::Medium,
            }),
        );

        for (letter, zone, slots) in SHELF_LAYOUT {
            let idx = world.add_node(
                &format!("shelf_{letter}"),
                *zone,
                1,
                NodePayload::Shelf(ShelfData {
                    name: format!("Shelf {letter}"),
                    slots: slots
                        .iter()
                        .map(|(product, capacity, occupied)| Slot {
                            product_id: Some(*product),
                            occupied: *occupied,
                            capacity: *capacity,
                        })
                        .collect(),
                }),
            );
            world.shelves.push(idx);
        }

        world.charging_station = world.add_node(
            "charging_station",
            Zone::Other,
            CHARGING_PORTS,
            NodePayload::ChargingStation(ChargerData {
                occupied_count: 0,
                ports: CHARGING_PORTS,
            }),
        );

        world.front_desk = world.add_node(
            "front_desk",
            Zone::Other,
            2,
            NodePayload::FrontDesk(DeskData { pending_orders: 0 }),
        );

        let [dock, a, b, c, d, e, f, g, h, i, j, charge, desk] = [
            world.loading_dock,
            world.shelves[0],
            world.shelves[1],
            world.shelves[2],
            world.shelves[3],
            world.shelves[4],
            world.shelves[5],
            world.shelves[6],
            world.shelves[7],
            world.shelves[8],
            world.shelves[9],
            world.charging_station,
            world.front_desk,
        ];

        world.graph.add_edge(dock, a, 5.0, false);
        world.graph.add_edge(a, charge, 3.0, true);
        world.graph.add_edge(a, b, 4.0, false);
        world.graph.add_edge(a, desk, 6.0, false);
        world.graph.add_edge(charge, b, 4.0, true);
        world.graph.add_edge(b, c, 3.0, false);
        world.graph.add_edge(b, d, 4.0, false);
        world.graph.add_edge(b, e, 5.0, false);
        world.graph.add_edge(c, g, 4.0, true);
        world.graph.add_edge(c, f, 5.0, true);
        world.graph.add_edge(d, c, 3.0, true);
        world.graph.add_edge(d, h, 4.0, true);
        world.graph.add_edge(e, d, 7.0, true);
        world.graph.add_edge(f, j, 6.0, false);
        world.graph.add_edge(f, g, 3.0, true);
        world.graph.add_edge(g, d, 3.0, true);
        world.graph.add_edge(h, i, 4.0, false);
        world.graph.add_edge(h, j, 5.0, true);
        world.graph.add_edge(i, desk, 8.0, false);
        world.graph.add_edge(f, charge, 10.0, true);

        world
    }

    fn add_node(&mut self, id: &str, zone: Zone, max_robots: u32, payload: NodePayload) -> NodeIndex {
        let idx = self.graph.add_node();
        self.nodes.push(Node {
            id: id.to_string(),
            node_type: payload.node_type(),
            zone,
            max_robots,
            current_robots: 0,
            payload,
        });
        debug_assert_eq!(idx, self.nodes.len() - 1);
        idx
    }

    /// Restore the canonical inventory: shelf slots, dock, charger, front
    /// desk, robot counters and all popularity counters. Idempotent; the
    /// graph is untouched.
    pub fn reset_inventory(&mut self) {
        for ((_, _, slots), &shelf_idx) in SHELF_LAYOUT.iter().zip(&self.shelves) {
            if let NodePayload::Shelf(data) = &mut self.nodes[shelf_idx].payload {
                data.slots = slots
                    .iter()
                    .map(|(product, capacity, occupied)| Slot {
                        product_id: Some(*product),
                        occupied: *occupied,
                        capacity: *capacity,
                    })
                    .collect();
            }
        }

        if let NodePayload::LoadingDock(dock) = &mut self.nodes[self.loading_dock].payload {
            dock.occupied = false;
            dock.delivery_count = 0;
            dock.current_lorry = Lorry::Medium;
        }
        if let NodePayload::ChargingStation(charger) =
            &mut self.nodes[self.charging_station].payload
        {
            charger.occupied_count = 0;
        }
        if let NodePayload::FrontDesk(desk) = &mut self.nodes[self.front_desk].payload {
            desk.pending_orders = 0;
        }

        for node in &mut self.nodes {
            node.current_robots = 0;
        }
        for product in &mut self.products {
            product.popularity = 0;
        }
    }

    // ---------------------------------------------------------------------
    // Payload accessors
    // ---------------------------------------------------------------------

    pub fn shelf(&self, node: NodeIndex) -> Option<&ShelfData> {
        match self.nodes.get(node).map(|n| &n.payload) {
            Some(NodePayload::Shelf(data)) => Some(data),
            _ => None,
        }
    }

    pub fn shelf_mut(&mut self, node: NodeIndex) -> Option<&mut ShelfData> {
        match self.nodes.get_mut(node).map(|n| &mut n.payload) {
            Some(NodePayload::Shelf(data)) => Some(data),
            _ => None,
        }
    }

    pub fn dock(&self) -> &DockData {
        match &self.nodes[self.loading_dock].payload {
            NodePayload::LoadingDock(data) => data,
            _ => unreachable!("loading dock payload mismatch"),
        }
    }

    pub fn dock_mut(&mut self) -> &mut DockData {
        match &mut self.nodes[self.loading_dock].payload {
            NodePayload::LoadingDock(data) => data,
            _ => unreachable!("loading dock payload mismatch"),
        }
    }

    pub fn charger(&self) -> &ChargerData {
        match &self.nodes[self.charging_station].payload {
            NodePayload::ChargingStation(data) => data,
            _ => unreachable!("charging station payload mismatch"),
        }
    }

    pub fn charger_mut(&mut self) -> &mut ChargerData {
        match &mut self.nodes[self.charging_station].payload {
            NodePayload::ChargingStation(data) => data,
            _ => unreachable!("charging station payload mismatch"),
        }
    }

    pub fn desk(&self) -> &DeskData {
        match &self.nodes[self.front_desk].payload {
            NodePayload::FrontDesk(data) => data,
            _ => unreachable!("front desk payload mismatch"),
        }
    }

    pub fn desk_mut(&mut self) -> &mut DeskData {
        match &mut self.nodes[self.front_desk].payload {
            NodePayload::FrontDesk(data) => data,
            _ => unreachable!("front desk payload mismatch"),
        }
    }

    pub fn product(&self, product_id: ProductId) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    pub fn product_mut(&mut self, product_id: ProductId) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id == product_id)
    }

    // ---------------------------------------------------------------------
    // Slot operations
    // ---------------------------------------------------------------------

    pub fn get_shelf_slots(&self, shelf_node: NodeIndex) -> &[Slot] {
        self.shelf(shelf_node).map(|s| s.slots.as_slice()).unwrap_or(&[])
    }

    /// Overwrite one slot of a shelf. `occupied` is clamped to `capacity`.
    pub fn set_shelf_slot(
        &mut self,
        shelf_node: NodeIndex,
        slot_index: usize,
        product_id: Option<ProductId>,
        capacity: u32,
        occupied: u32,
    ) {
        let Some(shelf) = self.shelf_mut(shelf_node) else {
            eprintln!("[world] WARN: set_shelf_slot on non-shelf node {shelf_node}");
            return;
        };
        let Some(slot) = shelf.slots.get_mut(slot_index) else {
            eprintln!("[world] WARN: set_shelf_slot slot {slot_index} out of range");
            return;
        };
        slot.product_id = product_id;
        slot.capacity = capacity;
        slot.occupied = occupied.min(capacity);
    }

    /// Swap the stored product (id + stock) between two shelf slots. Slot
    /// capacities stay with the physical slot; the incoming stock is clamped.
    pub fn swap_products(
        &mut self,
        a: (NodeIndex, usize),
        b: (NodeIndex, usize),
    ) -> bool {
        let Some(slot_a) = self.shelf(a.0).and_then(|s| s.slots.get(a.1)).cloned() else {
            return false;
        };
        let Some(slot_b) = self.shelf(b.0).and_then(|s| s.slots.get(b.1)).cloned() else {
            return false;
        };

        self.set_shelf_slot(a.0, a.1, slot_b.product_id, slot_a.capacity, slot_b.occupied);
        self.set_shelf_slot(b.0, b.1, slot_a.product_id, slot_b.capacity, slot_a.occupied);
        true
    }

    /// First shelf/slot that stocks `product_id` with `occupied > 0`.
    pub fn find_product_on_shelf(&self, product_id: ProductId) -> Option<(NodeIndex, usize)> {
        self.find_shelf_with_stock(product_id, 1)
    }

    /// First shelf/slot with at least `quantity` of `product_id` in stock.
    pub fn find_shelf_with_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Option<(NodeIndex, usize)> {
        for &shelf_idx in &self.shelves {
            if let Some(shelf) = self.shelf(shelf_idx) {
                for (slot_idx, slot) in shelf.slots.iter().enumerate() {
                    if slot.product_id == Some(product_id) && slot.occupied >= quantity {
                        return Some((shelf_idx, slot_idx));
                    }
                }
            }
        }
        None
    }

    /// First shelf/slot assigned to `product_id`, stocked or not.
    pub fn find_slot_for_product(&self, product_id: ProductId) -> Option<(NodeIndex, usize)> {
        for &shelf_idx in &self.shelves {
            if let Some(shelf) = self.shelf(shelf_idx) {
                for (slot_idx, slot) in shelf.slots.iter().enumerate() {
                    if slot.product_id == Some(product_id) {
                        return Some((shelf_idx, slot_idx));
                    }
                }
            }
        }
        None
    }

    /// First completely unassigned or empty slot, for emergency placements.
    pub fn find_free_slot(&self) -> Option<(NodeIndex, usize)> {
        for &shelf_idx in &self.shelves {
            if let Some(shelf) = self.shelf(shelf_idx) {
                for (slot_idx, slot) in shelf.slots.iter().enumerate() {
                    if slot.product_id.is_none() || slot.occupied == 0 {
                        return Some((shelf_idx, slot_idx));
                    }
                }
            }
        }
        None
    }

    /// Placement recommendation: a shelf in the product's recommended zone
    /// that already hosts the product and has free capacity; otherwise the
    /// first shelf slot with free capacity. Ties resolve by node index.
    pub fn find_best_shelf_for_product(&self, product_id: ProductId) -> Option<NodeIndex> {
        let popularity = self.product(product_id).map(|p| p.popularity)?;
        let target_zone = crate::popularity::recommended_zone(popularity);

        for &shelf_idx in &self.shelves {
            if self.nodes[shelf_idx].zone != target_zone {
                continue;
            }
            if let Some(shelf) = self.shelf(shelf_idx) {
                let hosts_with_space = shelf
                    .slots
                    .iter()
                    .any(|s| s.product_id == Some(product_id) && s.occupied < s.capacity);
                if hosts_with_space {
                    return Some(shelf_idx);
                }
            }
        }

        for &shelf_idx in &self.shelves {
            if let Some(shelf) = self.shelf(shelf_idx) {
                if shelf.slots.iter().any(|s| s.occupied < s.capacity) {
                    return Some(shelf_idx);
                }
            }
        }

        None
    }

    /// Add stock to the first slot of `shelf_node` assigned to `product_id`,
    /// clamped to capacity. Returns the amount actually stored.
    pub fn restock_slot(
        &mut self,
        shelf_node: NodeIndex,
        product_id: ProductId,
        quantity: u32,
    ) -> u32 {
        let Some(shelf) = self.shelf_mut(shelf_node) else {
            return 0;
        };
        for slot in &mut shelf.slots {
            if slot.product_id == Some(product_id) {
                let stored = quantity.min(slot.capacity - slot.occupied);
                if stored < quantity {
                    eprintln!(
                        "[world] WARN: restock of product {product_id} clamped to capacity \
                         on node {shelf_node} ({stored}/{quantity} stored)"
                    );
                }
                slot.occupied += stored;
                return stored;
            }
        }
        0
    }

    /// Direct-edge distance used by the discrete action model. Falls back to
    /// a large sentinel when no direct edge exists.
    pub fn direct_distance(&self, from: NodeIndex, to: NodeIndex) -> f64 {
        let d = self.graph.edge_distance(from, to);
        if d.is_finite() {
            d
        } else {
            100.0
        }
    }

    // ---------------------------------------------------------------------
    // Invariants
    // ---------------------------------------------------------------------

    /// Pure invariant check; returns human-readable violations. Empty means
    /// the world is consistent.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.node_type != node.payload.node_type() {
                out.push(format!("node {idx}: type tag does not match payload"));
            }
            if node.current_robots > node.max_robots {
                out.push(format!(
                    "node {idx}: current_robots {} > max_robots {}",
                    node.current_robots, node.max_robots
                ));
            }
            match &node.payload {
                NodePayload::Shelf(shelf) => {
                    for (slot_idx, slot) in shelf.slots.iter().enumerate() {
                        if slot.occupied > slot.capacity {
                            out.push(format!(
                                "node {idx} slot {slot_idx}: occupied {} > capacity {}",
                                slot.occupied, slot.capacity
                            ));
                        }
                    }
                }
                NodePayload::ChargingStation(charger) => {
                    if charger.occupied_count > charger.ports {
                        out.push(format!(
                            "node {idx}: charger occupancy {} > ports {}",
                            charger.occupied_count, charger.ports
                        ));
                    }
                }
                _ => {}
            }
        }
        out
    }
}
