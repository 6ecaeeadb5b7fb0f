//! Host world interfaces and the in-process worlds that implement them.
#![forbid(unsafe_code)]

pub mod column;
pub mod host;
pub mod memory;
pub mod noise;

pub use column::Column;
pub use host::{
    BlockSample, BlockSource, ChunkHost, ChunkLoadRequest, ChunkLoaded, Environment, FULL_SKY,
    LoadTicket,
};
pub use memory::MemoryWorld;
pub use noise::{NoiseParams, NoiseWorld};
