//! Static arena description and the destructible terrain built from it.
//!
//! Boundary segments stay whole and carry an advertising slot. Interior walls
//! are cut into chunks of roughly [`WALL_CHUNK_SIZE`] so they can be shot
//! apart piece by piece.

use std::collections::HashMap;

use log::debug;
use rand::Rng;
use shared::protocol::{TileCoord, WallData};
use shared::{
    circle_intersects_rect, Rect, FLOOR_GRID_SIZE, FLOOR_TILE_HEALTH, FLOOR_TILE_SIZE,
    SPAWN_ATTEMPTS, SPAWN_CLEARANCE, WALL_CHUNK_HEALTH, WALL_CHUNK_SIZE, WORLD_HEIGHT,
    WORLD_WIDTH,
};

const EDGE_THICKNESS: f32 = 40.0;
const EDGE_SEGMENT: f32 = 500.0;
const SPAWN_MARGIN: f32 = 100.0;

/// Fallback spawns used when random placement keeps failing. Each one is
/// clear of every wall at [`SPAWN_CLEARANCE`].
pub const SAFE_SPAWNS: [(f32, f32); 3] = [(300.0, 300.0), (1500.0, 1500.0), (1800.0, 1800.0)];

pub const LOOT_SPAWNS: [(f32, f32); 16] = [
    (300.0, 500.0),
    (700.0, 300.0),
    (1100.0, 500.0),
    (1500.0, 300.0),
    (1700.0, 700.0),
    (500.0, 1000.0),
    (900.0, 700.0),
    (1300.0, 1000.0),
    (300.0, 1300.0),
    (700.0, 1500.0),
    (1100.0, 1300.0),
    (1500.0, 1700.0),
    (1000.0, 500.0),
    (500.0, 700.0),
    (1000.0, 1500.0),
    (1500.0, 1100.0),
];

/// Interior maze layout on a 5x5 grid of 400 unit cells.
const INTERIOR_WALLS: [(f32, f32, f32, f32); 26] = [
    (400.0, 40.0, 40.0, 360.0),
    (800.0, 40.0, 40.0, 360.0),
    (1200.0, 40.0, 40.0, 360.0),
    (1600.0, 40.0, 40.0, 360.0),
    (40.0, 200.0, 200.0, 40.0),
    (900.0, 200.0, 120.0, 40.0),
    (40.0, 400.0, 360.0, 40.0),
    (800.0, 440.0, 40.0, 360.0),
    (1240.0, 400.0, 360.0, 40.0),
    (400.0, 440.0, 40.0, 160.0),
    (1600.0, 440.0, 40.0, 360.0),
    (400.0, 800.0, 1200.0, 40.0),
    (400.0, 840.0, 40.0, 360.0),
    (800.0, 840.0, 40.0, 160.0),
    (1200.0, 840.0, 40.0, 160.0),
    (800.0, 1200.0, 40.0, 360.0),
    (1200.0, 1200.0, 40.0, 360.0),
    (40.0, 1600.0, 760.0, 40.0),
    (1200.0, 1600.0, 760.0, 40.0),
    (400.0, 1360.0, 40.0, 240.0),
    (1600.0, 1200.0, 40.0, 240.0),
    (960.0, 960.0, 80.0, 80.0),
    (800.0, 800.0, 80.0, 80.0),
    (1120.0, 1120.0, 80.0, 80.0),
    (1120.0, 800.0, 80.0, 80.0),
    (800.0, 1120.0, 80.0, 80.0),
];

#[derive(Debug, Clone, PartialEq)]
pub enum WallKind {
    /// Indestructible boundary segment carrying an advertising slot.
    Edge { ad_slot: String },
    Destructible { health: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WallChunk {
    pub id: String,
    pub rect: Rect,
    pub kind: WallKind,
}

impl WallChunk {
    pub fn is_destructible(&self) -> bool {
        matches!(self.kind, WallKind::Destructible { .. })
    }

    pub fn to_data(&self) -> WallData {
        let (ad_slot, health) = match &self.kind {
            WallKind::Edge { ad_slot } => (Some(ad_slot.clone()), None),
            WallKind::Destructible { health } => (None, Some(*health)),
        };
        WallData {
            id: self.id.clone(),
            x: self.rect.x,
            y: self.rect.y,
            width: self.rect.width,
            height: self.rect.height,
            is_edge: !self.is_destructible(),
            is_destructible: self.is_destructible(),
            ad_slot,
            health,
        }
    }
}

/// Result of a projectile striking a wall chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum WallDamage {
    /// Boundary walls absorb the shot.
    Absorbed,
    Damaged { remaining: u32 },
    Destroyed { wall_id: String },
}

/// Wall chunks currently blocking movement and projectiles, plus the ones
/// waiting to regenerate.
#[derive(Debug, Clone)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
    walls: Vec<WallChunk>,
    destroyed: HashMap<String, WallChunk>,
}

impl Arena {
    /// Builds the standard arena: 16 boundary segments and the chunked maze.
    pub fn new() -> Self {
        let mut walls = Vec::new();

        for (side, base_x, base_y, horizontal) in [
            ("north", 0.0, 0.0, true),
            ("south", 0.0, WORLD_HEIGHT - EDGE_THICKNESS, true),
            ("west", 0.0, 0.0, false),
            ("east", WORLD_WIDTH - EDGE_THICKNESS, 0.0, false),
        ] {
            for i in 0..4 {
                let offset = i as f32 * EDGE_SEGMENT;
                let rect = if horizontal {
                    Rect::new(base_x + offset, base_y, EDGE_SEGMENT, EDGE_THICKNESS)
                } else {
                    Rect::new(base_x, base_y + offset, EDGE_THICKNESS, EDGE_SEGMENT)
                };
                let ad_slot = format!("{}_{}", side, i + 1);
                walls.push(WallChunk {
                    id: format!("edge_{}", ad_slot),
                    rect,
                    kind: WallKind::Edge { ad_slot },
                });
            }
        }

        for (index, &(x, y, width, height)) in INTERIOR_WALLS.iter().enumerate() {
            walls.extend(chunk_wall(index, Rect::new(x, y, width, height)));
        }

        debug!("Arena built with {} wall chunks", walls.len());
        Self::with_walls(walls)
    }

    pub fn with_walls(walls: Vec<WallChunk>) -> Self {
        Self {
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            walls,
            destroyed: HashMap::new(),
        }
    }

    pub fn walls(&self) -> &[WallChunk] {
        &self.walls
    }

    pub fn wall(&self, id: &str) -> Option<&WallChunk> {
        self.walls.iter().find(|wall| wall.id == id)
    }

    pub fn is_destroyed(&self, id: &str) -> bool {
        self.destroyed.contains_key(id)
    }

    /// True if a circle at (x, y) overlaps any active wall chunk.
    pub fn collides(&self, x: f32, y: f32, radius: f32) -> bool {
        self.walls
            .iter()
            .any(|wall| circle_intersects_rect(x, y, radius, &wall.rect))
    }

    /// Index of the first active wall whose 3D volume contains the point.
    pub fn wall_at(&self, x: f32, y: f32) -> Option<usize> {
        self.walls.iter().position(|wall| wall.rect.contains(x, y))
    }

    /// Applies one hit to the wall at `index`. Destroyed chunks leave the
    /// active set immediately.
    pub fn damage_wall(&mut self, index: usize) -> WallDamage {
        let Some(wall) = self.walls.get_mut(index) else {
            return WallDamage::Absorbed;
        };
        let remaining = match &mut wall.kind {
            WallKind::Edge { .. } => return WallDamage::Absorbed,
            WallKind::Destructible { health } => {
                *health = health.saturating_sub(1);
                *health
            }
        };
        if remaining > 0 {
            return WallDamage::Damaged { remaining };
        }

        let wall = self.walls.swap_remove(index);
        let wall_id = wall.id.clone();
        self.destroyed.insert(wall_id.clone(), wall);
        WallDamage::Destroyed { wall_id }
    }

    /// Puts a destroyed chunk back with full health. Returns `None` if the
    /// chunk is not waiting to regenerate.
    pub fn regenerate_wall(&mut self, id: &str) -> Option<&WallChunk> {
        let mut wall = self.destroyed.remove(id)?;
        wall.kind = WallKind::Destructible {
            health: WALL_CHUNK_HEALTH,
        };
        self.walls.push(wall);
        self.walls.last()
    }

    pub fn wall_data(&self) -> Vec<WallData> {
        self.walls.iter().map(WallChunk::to_data).collect()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits an interior wall into equal chunks no larger than the chunk size.
fn chunk_wall(wall_index: usize, rect: Rect) -> Vec<WallChunk> {
    let cols = (rect.width / WALL_CHUNK_SIZE).ceil().max(1.0) as usize;
    let rows = (rect.height / WALL_CHUNK_SIZE).ceil().max(1.0) as usize;
    let chunk_width = rect.width / cols as f32;
    let chunk_height = rect.height / rows as f32;

    let mut chunks = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        for c in 0..cols {
            chunks.push(WallChunk {
                id: format!("wall_{}_{}_{}", wall_index, r, c),
                rect: Rect::new(
                    rect.x + c as f32 * chunk_width,
                    rect.y + r as f32 * chunk_height,
                    chunk_width,
                    chunk_height,
                ),
                kind: WallKind::Destructible {
                    health: WALL_CHUNK_HEALTH,
                },
            });
        }
    }
    chunks
}

#[derive(Debug, Clone, Copy)]
pub struct FloorCell {
    pub health: u32,
    pub active: bool,
}

/// Uniform grid of destructible ground. When disabled every cell reports
/// support and ignores damage.
#[derive(Debug, Clone)]
pub struct FloorGrid {
    enabled: bool,
    cells: Vec<FloorCell>,
}

impl FloorGrid {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            cells: vec![
                FloorCell {
                    health: FLOOR_TILE_HEALTH,
                    active: true,
                };
                FLOOR_GRID_SIZE * FLOOR_GRID_SIZE
            ],
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Grid coordinate containing (x, y), if inside the grid.
    pub fn cell_at(&self, x: f32, y: f32) -> Option<TileCoord> {
        if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
            return None;
        }
        let gx = (x / FLOOR_TILE_SIZE).floor() as usize;
        let gy = (y / FLOOR_TILE_SIZE).floor() as usize;
        if gx >= FLOOR_GRID_SIZE || gy >= FLOOR_GRID_SIZE {
            return None;
        }
        Some(TileCoord { gx, gy })
    }

    fn cell(&self, coord: TileCoord) -> &FloorCell {
        &self.cells[coord.gy * FLOOR_GRID_SIZE + coord.gx]
    }

    /// True if the ground at (x, y) can hold an entity.
    pub fn supports(&self, x: f32, y: f32) -> bool {
        if !self.enabled {
            return true;
        }
        self.cell_at(x, y)
            .map(|coord| self.cell(coord).active)
            .unwrap_or(false)
    }

    /// Damages the cell under (x, y). Returns the cell if this hit destroyed it.
    pub fn damage(&mut self, x: f32, y: f32, amount: u32) -> Option<TileCoord> {
        if !self.enabled {
            return None;
        }
        let coord = self.cell_at(x, y)?;
        let cell = &mut self.cells[coord.gy * FLOOR_GRID_SIZE + coord.gx];
        if !cell.active {
            return None;
        }
        cell.health = cell.health.saturating_sub(amount);
        if cell.health == 0 {
            cell.active = false;
            return Some(coord);
        }
        None
    }

    pub fn destroyed_cells(&self) -> Vec<TileCoord> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.active)
            .map(|(index, _)| TileCoord {
                gx: index % FLOOR_GRID_SIZE,
                gy: index / FLOOR_GRID_SIZE,
            })
            .collect()
    }
}

/// Picks a random spawn that is clear of walls and standing on solid floor,
/// falling back to [`SAFE_SPAWNS`] after a bounded number of attempts.
pub fn choose_spawn<R: Rng>(arena: &Arena, floor: &FloorGrid, rng: &mut R) -> (f32, f32) {
    for _ in 0..SPAWN_ATTEMPTS {
        let x = rng.gen_range(SPAWN_MARGIN..arena.width - SPAWN_MARGIN);
        let y = rng.gen_range(SPAWN_MARGIN..arena.height - SPAWN_MARGIN);
        if floor.supports(x, y) && !arena.collides(x, y, SPAWN_CLEARANCE) {
            return (x, y);
        }
    }

    debug!("Random spawn search failed, using a safe default");
    SAFE_SPAWNS[rng.gen_range(0..SAFE_SPAWNS.len())]
}
