//! Demo world: an animated tile field, grid lines and a marker polygon.

use miso_render::device::{GraphicsDevice, TextureHandle};
use miso_render::vertex::{SpriteInstance, Vertex, WaterParams, orthographic};
use miso_render::{Color, Renderer};

pub const TILE_SIZE: u32 = 32;
pub const GRID_W: u32 = 40;
pub const GRID_H: u32 = 24;

/// Tile sheet laid out as `[grass, water]`, each `TILE_SIZE` square.
pub fn tile_sheet_pixels() -> (u32, u32, Vec<u8>) {
    let (w, h) = (TILE_SIZE * 2, TILE_SIZE);
    let mut px = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let water = x >= TILE_SIZE;
            let lx = x % TILE_SIZE;
            let edge = lx == 0 || y == 0;
            let checker = ((lx / 4) + (y / 4)) % 2 == 0;
            let rgba = match (water, edge, checker) {
                (_, true, _) => [20, 24, 28, 255],
                (false, _, true) => [88, 150, 64, 255],
                (false, _, false) => [76, 136, 56, 255],
                (true, _, true) => [52, 110, 190, 255],
                (true, _, false) => [44, 96, 172, 255],
            };
            px.extend_from_slice(&rgba);
        }
    }
    (w, h, px)
}

/// Whether tile `(tx, ty)` is water: a diagonal river across the grid.
pub fn is_water(tx: u32, ty: u32) -> bool {
    let d = tx as i32 - ty as i32 - 8;
    (-2..=2).contains(&d)
}

pub struct Scene {
    tiles: TextureHandle,
    land: Vec<SpriteInstance>,
    water: Vec<SpriteInstance>,
}

impl Scene {
    pub fn new(tiles: TextureHandle) -> Self {
        let mut land = Vec::new();
        let mut water = Vec::new();
        let s = TILE_SIZE as f32;

        for ty in 0..GRID_H {
            for tx in 0..GRID_W {
                let wet = is_water(tx, ty);
                let inst = SpriteInstance {
                    x: tx as f32 * s,
                    y: ty as f32 * s,
                    z: 0.0,
                    flags: if wet { SpriteInstance::WATER } else { 0.0 },
                    w: s,
                    h: s,
                    tile_x: tx as f32,
                    tile_y: ty as f32,
                    u: if wet { 0.5 } else { 0.0 },
                    v: 0.0,
                    uw: 0.5,
                    vh: 1.0,
                };
                if wet { water.push(inst) } else { land.push(inst) }
            }
        }

        Self { tiles, land, water }
    }

    pub fn tile_count(&self) -> usize {
        self.land.len() + self.water.len()
    }

    /// Records one frame of world draws. Returns how many were dropped.
    pub fn draw<D: GraphicsDevice>(&self, renderer: &mut Renderer<D>, time: f32) -> u32 {
        let (w, h) = renderer.device().surface_size();
        let (w, h) = (w.max(1) as f32, h.max(1) as f32);

        // slow pan across the grid
        let world_w = (GRID_W * TILE_SIZE) as f32;
        let pan = ((time * 0.1).sin() * 0.5 + 0.5) * (world_w - w).max(0.0);
        renderer.set_view_projection(orthographic(pan, pan + w, h, 0.0, -1.0, 1.0));
        renderer.set_water_params(WaterParams::new(time, 0.5, 0.06, 0.6));

        let mut outcomes = Vec::with_capacity(8);

        // land and water share a texture and uniforms, so these merge into one batch
        outcomes.push(renderer.draw_sprite_instances(self.tiles, &self.land));
        outcomes.push(renderer.draw_sprite_instances(self.tiles, &self.water));

        let grid = Color::new(0.0, 0.0, 0.0, 0.35);
        let s = TILE_SIZE as f32;
        for tx in (0..=GRID_W).step_by(4) {
            let x = tx as f32 * s;
            outcomes.push(renderer.draw_line([x, 0.0, 0.0], [x, GRID_H as f32 * s, 0.0], grid));
        }
        for ty in (0..=GRID_H).step_by(4) {
            let y = ty as f32 * s;
            outcomes.push(renderer.draw_line([0.0, y, 0.0], [world_w, y, 0.0], grid));
        }

        outcomes.push(renderer.draw_world_geometry(&marker(pan + w * 0.5, h * 0.5, 24.0, time)));

        outcomes.iter().filter(|o| o.is_dropped()).count() as u32
    }
}

/// Rotating diamond as a triangle list.
fn marker(cx: f32, cy: f32, r: f32, time: f32) -> Vec<Vertex> {
    let fill = Color::new(1.0, 0.85, 0.2, 0.85);
    let rim = Color::new(1.0, 0.4, 0.1, 0.9);
    let a = time * 1.5;
    let corner = |i: u32| {
        let t = a + i as f32 * std::f32::consts::FRAC_PI_2;
        Vertex::new(cx + t.cos() * r, cy + t.sin() * r, rim)
    };
    let centre = Vertex::new(cx, cy, fill);

    (0..4)
        .flat_map(|i| [centre, corner(i), corner((i + 1) % 4)])
        .collect()
}
