// src/popularity.rs
//
// Popularity tracking and Hot/Warm/Cold zone recommendation.
// Customer demand bumps a per-product counter; a periodic sweep decays all
// counters so stale bestsellers cool off. The recommendation feeds the
// placement logic in `World::find_best_shelf_for_product`.

use crate::types::{ProductId, SimTime, Zone};
use crate::world::World;

/// Zone recommended for a product at the given popularity.
pub fn recommended_zone(popularity: u32) -> Zone {
    if popularity >= 10 {
        Zone::Hot
    } else if popularity >= 5 {
        Zone::Warm
    } else {
        Zone::Cold
    }
}

/// Bump a product's popularity by one and recompute its recommended zone.
/// Logs a mismatch diagnostic when the product's primary shelf sits in a
/// different zone than the recommendation.
pub fn update_popularity_and_zone(world: &mut World, product_id: ProductId) {
    let Some(product) = world.product_mut(product_id) else {
        eprintln!("[popularity] WARN: unknown product id {product_id}");
        return;
    };
    product.popularity += 1;
    let popularity = product.popularity;
    let name = product.name.clone();
    let recommended = recommended_zone(popularity);

    if let Some(shelf_idx) = find_product_primary_shelf(world, product_id) {
        let shelf_zone = world.nodes[shelf_idx].zone;
        if shelf_zone != recommended {
            eprintln!(
                "[popularity] {name} now {popularity}: stored in {} zone, recommended {}",
                shelf_zone.as_str(),
                recommended.as_str()
            );
        }
    }
}

/// First shelf currently stocking the product; the "primary" location used
/// for zone-mismatch reporting.
pub fn find_product_primary_shelf(world: &World, product_id: ProductId) -> Option<usize> {
    world.find_product_on_shelf(product_id).map(|(shelf, _)| shelf)
}

/// All product ids whose current recommendation equals `zone`.
pub fn products_recommended_for_zone(world: &World, zone: Zone) -> Vec<ProductId> {
    world
        .products
        .iter()
        .filter(|p| recommended_zone(p.popularity) == zone)
        .map(|p| p.id)
        .collect()
}

/// Stderr summary of per-product popularity, printed at episode end.
pub fn print_popularity_report(world: &World) {
    eprintln!("[popularity] ---- product popularity report ----");
    for product in &world.products {
        if product.popularity == 0 {
            continue;
        }
        eprintln!(
            "[popularity] {:<20} popularity={:<4} zone={}",
            product.name,
            product.popularity,
            recommended_zone(product.popularity).as_str()
        );
    }
}

/// Process-wide decay clock. Fires at most once per interval; each firing
/// multiplies every popularity by 0.95 (floored). Reset to zero on episode
/// reset together with the simulated clock.
#[derive(Debug, Clone)]
pub struct DecayClock {
    interval_s: f64,
    last_applied_s: f64,
}

impl DecayClock {
    pub fn new(interval_s: f64) -> Self {
        Self {
            interval_s,
            last_applied_s: 0.0,
        }
    }

    pub fn reset(&mut self) {
        self.last_applied_s = 0.0;
    }

    /// Apply decay if the interval has elapsed. Returns whether it fired.
    pub fn apply(&mut self, world: &mut World, now: SimTime) -> bool {
        if now - self.last_applied_s < self.interval_s {
            return false;
        }
        self.last_applied_s = now;
        for product in &mut world.products {
            product.popularity = (f64::from(product.popularity) * 0.95).floor() as u32;
        }
        true
    }
}
