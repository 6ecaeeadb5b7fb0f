//! Materials, map color table, and the indexed palette.
#![forbid(unsafe_code)]

pub mod color;
pub mod material;
pub mod palette;
pub mod table;

pub use color::{BaseColor, Color, Shade};
pub use material::{MaterialCatalog, MaterialId};
pub use palette::Palette;
pub use table::ColorTable;
