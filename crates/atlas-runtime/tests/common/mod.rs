#![allow(dead_code)]

use std::sync::Arc;

use atlas_blocks::{BaseColor, Color, ColorTable, MaterialCatalog, Shade};
use atlas_geom::WorldBorder;
use atlas_runtime::RenderSettings;
use atlas_world::{Column, MemoryWorld};

/// Flat grass at y=4 over stone, open to the sky.
pub fn flat_world(border: WorldBorder) -> Arc<MemoryWorld> {
    let catalog = MaterialCatalog::standard();
    let world = MemoryWorld::new(0, 15);
    let mut col = Column::new();
    col.fill(0, 3, catalog.id("stone")).set(4, catalog.id("grass_block"));
    world.set_default_column(col);
    world.set_world_border(Some(border));
    Arc::new(world)
}

pub fn colors() -> Arc<ColorTable> {
    Arc::new(ColorTable::builtin(&MaterialCatalog::standard()).expect("builtin colors"))
}

pub fn lit_grass() -> Color {
    Color::new(BaseColor::GRASS, Shade::Light)
}

pub fn settings() -> RenderSettings {
    RenderSettings {
        tick_budget_ms: 200,
        region_idle_ticks: 1200,
        steps_per_run: 256,
        io_threads: 0,
        missing_chunk_warn_ticks: 3,
    }
}
