use std::error::Error;
use std::fs;
use std::path::Path;

use crate::color::{BaseColor, Color, Shade};
use crate::material::{MaterialCatalog, MaterialId};

const BUILTIN: &str = include_str!("../assets/colors.txt");

/// Material -> base color lookup, read from `<index> <material>` lines.
#[derive(Clone, Debug, Default)]
pub struct ColorTable {
    bases: Vec<BaseColor>,
    count: usize,
}

impl ColorTable {
    /// Parses the line format. Blank lines and `#` comments are ignored;
    /// malformed lines and unknown materials are logged and skipped. Water
    /// and lava are always pinned to their own buckets.
    pub fn parse(text: &str, catalog: &MaterialCatalog) -> Result<Self, Box<dyn Error>> {
        let mut table = ColorTable {
            bases: vec![BaseColor::NONE; catalog.len()],
            count: 0,
        };
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((index, name)) = line.split_once(char::is_whitespace) else {
                log::warn!("color table line {}: missing material: {}", lineno + 1, line);
                continue;
            };
            let base = match index.parse::<u8>() {
                Ok(v) if BaseColor(v).is_valid() => BaseColor(v),
                _ => {
                    log::warn!("color table line {}: invalid value: {}", lineno + 1, line);
                    continue;
                }
            };
            let Some(id) = catalog.get_id(name.trim()) else {
                log::warn!("color table line {}: unknown material: {}", lineno + 1, line);
                continue;
            };
            table.bases[id.0 as usize] = base;
            table.count += 1;
        }
        if table.count == 0 {
            return Err("color table has no valid entries".into());
        }
        table.pin(MaterialId::WATER, BaseColor::WATER);
        table.pin(MaterialId::LAVA, BaseColor::FIRE);
        for air in [MaterialId::AIR, MaterialId::CAVE_AIR, MaterialId::VOID_AIR] {
            table.pin(air, BaseColor::NONE);
        }
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>, catalog: &MaterialCatalog) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::parse(&s, catalog)
    }

    /// Table shipped with the crate, covering the standard catalog.
    pub fn builtin(catalog: &MaterialCatalog) -> Result<Self, Box<dyn Error>> {
        Self::parse(BUILTIN, catalog)
    }

    fn pin(&mut self, id: MaterialId, base: BaseColor) {
        if let Some(slot) = self.bases.get_mut(id.0 as usize) {
            *slot = base;
        }
    }

    /// Number of valid lines read.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn base(&self, id: MaterialId) -> BaseColor {
        self.bases.get(id.0 as usize).copied().unwrap_or(BaseColor::NONE)
    }

    /// Materials without a color are see-through for the height search.
    #[inline]
    pub fn is_transparent(&self, id: MaterialId) -> bool {
        self.base(id).is_none()
    }

    #[inline]
    pub fn color(&self, id: MaterialId, shade: Shade) -> Color {
        Color::new(self.base(id), shade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_standard_catalog() {
        let catalog = MaterialCatalog::standard();
        let table = ColorTable::builtin(&catalog).expect("builtin table");
        assert_eq!(table.base(catalog.id("grass_block")), BaseColor::GRASS);
        assert_eq!(table.base(MaterialId::WATER), BaseColor::WATER);
        assert_eq!(table.base(MaterialId::LAVA), BaseColor::FIRE);
        assert!(table.is_transparent(catalog.id("glass")));
        assert!(table.is_transparent(MaterialId::CAVE_AIR));
        assert!(!table.is_transparent(catalog.id("stone")));
    }
}
