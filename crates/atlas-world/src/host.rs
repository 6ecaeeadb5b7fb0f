use atlas_blocks::MaterialId;
use atlas_geom::{ChunkPos, WorldBorder};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

/// Sky light of a block open to the sky.
pub const FULL_SKY: u8 = 15;

/// What the map needs to know about one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockSample {
    pub material: MaterialId,
    pub sky_light: u8,
    pub waterlogged: bool,
}

impl BlockSample {
    pub const AIR: BlockSample = BlockSample {
        material: MaterialId::AIR,
        sky_light: FULL_SKY,
        waterlogged: false,
    };

    #[inline]
    pub fn is_air(&self) -> bool {
        self.material.is_air()
    }

    /// Water proper or a waterlogged block.
    #[inline]
    pub fn is_water(&self) -> bool {
        self.material == MaterialId::WATER || self.waterlogged
    }

    #[inline]
    pub fn is_lava(&self) -> bool {
        self.material == MaterialId::LAVA
    }

    #[inline]
    pub fn is_liquid(&self) -> bool {
        self.is_water() || self.is_lava()
    }
}

/// Read access to world blocks. Callers only query chunks they know to be
/// resident.
pub trait BlockSource {
    fn min_y(&self) -> i32;
    /// Highest valid block y, inclusive.
    fn max_y(&self) -> i32;
    fn is_chunk_resident(&self, chunk: ChunkPos) -> bool;
    fn block_at(&self, x: i32, y: i32, z: i32) -> BlockSample;
    /// Day clock in ticks; one day is 24000.
    fn day_time(&self) -> i64;
}

/// Dimension kind of a world; decides which map variants it gets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Normal,
    Nether,
    End,
}

pub type LoadTicket = u64;

/// Completion of an asynchronous chunk load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkLoaded {
    pub chunk: ChunkPos,
    pub ticket: LoadTicket,
}

/// A pending load; the host answers through `reply` once the chunk is resident.
#[derive(Debug)]
pub struct ChunkLoadRequest {
    pub ticket: LoadTicket,
    pub reply: Sender<ChunkLoaded>,
}

impl ChunkLoadRequest {
    pub fn new(ticket: LoadTicket, reply: Sender<ChunkLoaded>) -> Self {
        Self { ticket, reply }
    }

    /// Reports the chunk as loaded. A dropped receiver is fine.
    pub fn complete(self, chunk: ChunkPos) {
        let _ = self.reply.send(ChunkLoaded {
            chunk,
            ticket: self.ticket,
        });
    }
}

/// A world that loads chunks on request and keeps pinned ones resident.
pub trait ChunkHost: BlockSource {
    fn load_chunk_async(&self, chunk: ChunkPos, request: ChunkLoadRequest);
    fn pin_chunk(&self, chunk: ChunkPos);
    fn unpin_chunk(&self, chunk: ChunkPos);
    /// `None` while the world itself is not loaded.
    fn world_border(&self) -> Option<WorldBorder>;
    fn environment(&self) -> Environment;
    /// Ticks per second the host has managed lately, for hosts that run a
    /// tick loop of their own. Full renders shrink their budget while it lags.
    fn tick_rate(&self) -> Option<f64> {
        None
    }
}
