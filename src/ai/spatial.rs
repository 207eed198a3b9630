//! Spatial hash grid for amortized O(1) neighbor queries
//!
//! Buckets agent handles by horizontal cell (the vertical axis is ignored;
//! crowding is a ground-plane concern). The grid is always rebuilt
//! wholesale at a throttled cadence rather than maintained incrementally —
//! full rebuilds at the collision-check interval are cheaper than keeping
//! cells current for every agent move. Queries cover the 3x3 neighborhood
//! so near-boundary neighbors are never missed.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::util::vec3::Vec3;
use crate::world::agent::AgentId;

/// Default cell size in world units, roughly 2x the crowd collision radius
/// so that everything within the radius sits in the 3x3 neighborhood
pub const DEFAULT_CELL_SIZE: f32 = 200.0;

/// Initial capacity for the cell map
const GRID_INITIAL_CAPACITY: usize = 256;

/// Initial capacity for agent vectors within cells
const CELL_INITIAL_CAPACITY: usize = 8;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Query result buffer; 16 inline slots cover typical crowd densities
pub type NeighborBuf = SmallVec<[AgentId; 16]>;

/// Spatial hash grid over agent handles
pub struct SpatialHashGrid {
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    cells: FxHashMap<CellKey, Vec<AgentId>>,
    /// Pre-computed neighbor offsets for the 9-cell query
    neighbor_offsets: [(i32, i32); 9],
}

impl SpatialHashGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: FxHashMap::with_capacity_and_hasher(GRID_INITIAL_CAPACITY, Default::default()),
            neighbor_offsets: [
                (-1, -1), (0, -1), (1, -1),
                (-1,  0), (0,  0), (1,  0),
                (-1,  1), (0,  1), (1,  1),
            ],
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Empty all cell buckets (capacity is kept for the next rebuild)
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
    }

    /// Convert world position to cell key (horizontal components only)
    #[inline]
    fn position_to_cell(&self, position: Vec3) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Insert an agent at a position. Within one rebuild pass an agent is
    /// never duplicated inside its bucket; callers filter stale handles
    /// before insertion, the grid does not validate them.
    pub fn add_agent(&mut self, position: Vec3, agent: AgentId) {
        let key = self.position_to_cell(position);
        let cell = self
            .cells
            .entry(key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY));
        if !cell.contains(&agent) {
            cell.push(agent);
        }
    }

    /// All agents in the query position's cell and its eight neighbors.
    /// No deduplication across buckets; fine for proximity checks, not for
    /// exact counting.
    pub fn cell_agents(&self, position: Vec3) -> NeighborBuf {
        let (cx, cy) = self.position_to_cell(position);
        let mut out = NeighborBuf::new();
        for &(dx, dy) in &self.neighbor_offsets {
            if let Some(cell) = self.cells.get(&(cx + dx, cy + dy)) {
                out.extend_from_slice(cell);
            }
        }
        out
    }

    /// Total agents currently bucketed
    pub fn agent_count(&self) -> usize {
        self.cells.values().map(|c| c.len()).sum()
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.values().filter(|c| !c.is_empty()).count()
    }
}

impl Default for SpatialHashGrid {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}
