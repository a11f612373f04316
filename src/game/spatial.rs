//! Spatial hash grid for proximity queries.
//!
//! Divides the arena into fixed-size cells and buckets entities by the cell
//! containing their center. Queries scan the cell range covering the query
//! circle, so results are a superset of the true radius-filtered set:
//! callers needing exactness filter by distance themselves. An entity whose
//! bucket cell intersects the scanned range is never missed.

use hashbrown::HashMap;
use rustc_hash::FxHashSet;

use crate::game::state::EntityId;
use crate::util::vec2::Vec2;

/// Cell size in world units.
///
/// Large enough that a typical hit-radius query touches at most four cells.
pub const CELL_SIZE: f32 = 250.0;

/// Initial capacity for the cell map
const GRID_INITIAL_CAPACITY: usize = 128;

/// Initial capacity for entity vectors within cells
const CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Spatial hash grid keyed by entity id
#[derive(Debug, Default)]
pub struct SpatialGrid {
    cells: HashMap<CellKey, Vec<(EntityId, Vec2)>>,
}

impl SpatialGrid {
    pub fn new() -> Self {
        Self {
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
        }
    }

    /// Clear all entities. Called at the start of every tick.
    ///
    /// Keeps cell allocations so steady-state ticks do not reallocate.
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
    }

    #[inline]
    fn cell_of(position: Vec2) -> CellKey {
        (
            (position.x / CELL_SIZE).floor() as i32,
            (position.y / CELL_SIZE).floor() as i32,
        )
    }

    /// Bucket an entity into the cell containing its center
    #[inline]
    pub fn insert(&mut self, id: EntityId, position: Vec2) {
        let key = Self::cell_of(position);
        self.cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push((id, position));
    }

    /// All entity ids whose bucket cell intersects the cell range covering
    /// the query circle, deduplicated.
    pub fn query(&self, x: f32, y: f32, radius: f32) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut seen: FxHashSet<EntityId> = FxHashSet::default();

        let min = Self::cell_of(Vec2::new(x - radius, y - radius));
        let max = Self::cell_of(Vec2::new(x + radius, y + radius));

        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                if let Some(cell) = self.cells.get(&(cx, cy)) {
                    for &(id, _) in cell {
                        if seen.insert(id) {
                            out.push(id);
                        }
                    }
                }
            }
        }

        out
    }

    /// Query with candidate positions included, for callers that filter by
    /// exact distance without a second lookup
    pub fn query_with_positions(&self, x: f32, y: f32, radius: f32) -> Vec<(EntityId, Vec2)> {
        let mut out = Vec::new();
        let mut seen: FxHashSet<EntityId> = FxHashSet::default();

        let min = Self::cell_of(Vec2::new(x - radius, y - radius));
        let max = Self::cell_of(Vec2::new(x + radius, y + radius));

        for cx in min.0..=max.0 {
            for cy in min.1..=max.1 {
                if let Some(cell) = self.cells.get(&(cx, cy)) {
                    for &(id, pos) in cell {
                        if seen.insert(id) {
                            out.push((id, pos));
                        }
                    }
                }
            }
        }

        out
    }

    /// Total entities currently bucketed
    pub fn len(&self) -> usize {
        self.cells.values().map(|c| c.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|c| c.is_empty())
    }
}
