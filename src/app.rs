use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use atlas_blocks::{ColorTable, MaterialCatalog, Palette};
use atlas_io::{PngTileStore, TileStore, load_tag};
use atlas_runtime::{FullRenderStatus, MapContext};
use atlas_world::NoiseWorld;

use crate::config::AtlasConfig;

const GC_EVERY_TICKS: u64 = 100;
const STATUS_EVERY: Duration = Duration::from_secs(10);
const DRAIN_POLL: Duration = Duration::from_millis(5);

pub struct RenderOptions {
    /// Drop a checkpointed full render and start from the center ring.
    pub restart: bool,
    pub max_ticks: Option<u64>,
}

fn load_colors(cfg: &AtlasConfig, catalog: &MaterialCatalog) -> Result<ColorTable, Box<dyn Error>> {
    match &cfg.paths.colors {
        Some(path) => ColorTable::from_path(path, catalog),
        None => ColorTable::builtin(catalog),
    }
}

/// Renders every region inside the configured border, resuming a previous
/// run's checkpoint unless asked to restart.
pub fn run_render(cfg: &AtlasConfig, opts: &RenderOptions) -> Result<(), Box<dyn Error>> {
    let mut catalog = MaterialCatalog::standard();
    let world = Arc::new(NoiseWorld::new(
        cfg.world.terrain.clone(),
        &mut catalog,
        cfg.world.border(),
        cfg.world.generator_threads,
    )?);
    let colors = Arc::new(load_colors(cfg, &catalog)?);
    log::info!("{} block colors loaded", colors.count());
    let store: Arc<dyn TileStore> = Arc::new(PngTileStore::new(cfg.tiles_dir(), Palette::standard()));

    let mut ctx = MapContext::new(
        cfg.world.name.clone(),
        Arc::clone(&world),
        colors,
        store,
        cfg.world_dir(),
        cfg.render.settings.clone(),
    )?;
    ctx.enable()?;
    if opts.restart && ctx.is_full_render_active() {
        ctx.cancel_full_render()?;
    }
    if ctx.is_full_render_active() {
        if ctx.full_render_progress().is_some_and(|p| p.paused) {
            ctx.resume_full_render()?;
        }
    } else {
        ctx.schedule_full_render()?;
    }

    let interval = Duration::from_millis(cfg.render.tick_interval_ms);
    let started = Instant::now();
    let mut last_status = started;
    let mut ticks = 0u64;
    loop {
        let now = Instant::now();
        ctx.tick(now);
        ticks += 1;
        if ticks % GC_EVERY_TICKS == 0 {
            world.collect_garbage();
        }
        if now.duration_since(last_status) >= STATUS_EVERY {
            last_status = now;
            log::info!("{}", ctx.status().to_string().trim_end());
        }
        if !ctx.is_full_render_active() && ctx.queued_chunks() == 0 && ctx.is_io_idle() {
            log::info!("render complete after {ticks} ticks in {:.1}s", started.elapsed().as_secs_f64());
            break;
        }
        if opts.max_ticks.is_some_and(|max| ticks >= max) {
            log::warn!("stopping after {ticks} ticks; progress is checkpointed");
            break;
        }
        if let Some(rest) = interval.checked_sub(now.elapsed()) {
            thread::sleep(rest);
        }
    }

    while !ctx.is_io_idle() {
        ctx.tick_io();
        thread::sleep(DRAIN_POLL);
    }
    ctx.disable()?;
    Ok(())
}

/// Prints what the world tag on disk says about the map.
pub fn print_status(cfg: &AtlasConfig) -> Result<(), Box<dyn Error>> {
    let dir = cfg.world_dir();
    let Some(tag) = load_tag(&dir)? else {
        println!("world {}: no map at {}", cfg.world.name, dir.display());
        return Ok(());
    };
    println!("world {} ({:?})", cfg.world.name, tag.environment);
    match tag.effective_border() {
        Some(b) => println!("  border {b}"),
        None => println!("  border unknown"),
    }
    let variants: Vec<String> = tag.variants.iter().map(|v| v.to_string()).collect();
    println!("  variants {}", variants.join(", "));
    match tag.full_render.as_ref().map(FullRenderStatus::from_progress) {
        Some(fr) => {
            print!(
                "  full render {}: ring {}, {} done, {} queued, {} ms/tick",
                fr.state, fr.ring, fr.regions_done, fr.queued_regions, fr.max_millis_per_tick
            );
            if let Some(region) = fr.current_region {
                print!(", at {region} ({} chunks)", fr.chunks_pending);
            }
            println!();
        }
        None => println!("  no full render in progress"),
    }
    Ok(())
}

/// Parses a color table and reports how many blocks it maps.
pub fn check_colors(path: &Path) -> Result<(), Box<dyn Error>> {
    let catalog = MaterialCatalog::standard();
    let table = ColorTable::from_path(path, &catalog)?;
    println!("{}: {} block colors", path.display(), table.count());
    Ok(())
}
