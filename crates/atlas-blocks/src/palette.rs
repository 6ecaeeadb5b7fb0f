use std::collections::HashMap;

use crate::color::{BASE_RGB, BaseColor, Color, Shade};

const SLOTS: usize = BaseColor::COUNT * 4;

/// RGBA expansion of every palette index, and the reverse map used when a
/// persisted tile is read back.
#[derive(Clone, Debug)]
pub struct Palette {
    rgba: Vec<[u8; 4]>,
    reverse: HashMap<[u8; 4], Color>,
}

impl Default for Palette {
    fn default() -> Self {
        Self::standard()
    }
}

impl Palette {
    pub fn standard() -> Self {
        let mut rgba = Vec::with_capacity(SLOTS);
        for base in 0..BaseColor::COUNT {
            for shade in Shade::ALL {
                rgba.push(expand(BASE_RGB[base], base == 0, shade));
            }
        }
        let mut reverse = HashMap::with_capacity(SLOTS);
        for (idx, px) in rgba.iter().enumerate() {
            reverse.entry(*px).or_insert(Color(idx as u8));
        }
        Self { rgba, reverse }
    }

    #[inline]
    pub fn rgba(&self, color: Color) -> [u8; 4] {
        self.rgba.get(color.0 as usize).copied().unwrap_or([0, 0, 0, 0])
    }

    /// Palette index for a stored pixel; anything not produced by this
    /// palette reads back as transparent.
    #[inline]
    pub fn color_of(&self, rgba: [u8; 4]) -> Color {
        if rgba[3] == 0 {
            return Color::TRANSPARENT;
        }
        self.reverse.get(&rgba).copied().unwrap_or(Color::TRANSPARENT)
    }
}

fn expand(hex: u32, none: bool, shade: Shade) -> [u8; 4] {
    if none {
        return [0, 0, 0, 0];
    }
    let m = shade.multiplier();
    let r = ((hex >> 16) & 0xFF) * m / 255;
    let g = ((hex >> 8) & 0xFF) * m / 255;
    let b = (hex & 0xFF) * m / 255;
    [r as u8, g as u8, b as u8, 0xFF]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bright_is_full_base_rgb() {
        let palette = Palette::standard();
        assert_eq!(palette.rgba(BaseColor::GRASS.shaded(Shade::Bright)), [0x7F, 0xB2, 0x38, 0xFF]);
        assert_eq!(palette.rgba(BaseColor::NONE.shaded(Shade::Dark)), [0, 0, 0, 0]);
    }

    #[test]
    fn every_opaque_index_reads_back() {
        let palette = Palette::standard();
        for idx in 4..SLOTS as u8 {
            let color = Color(idx);
            assert_eq!(palette.color_of(palette.rgba(color)), color, "index {idx}");
        }
        assert_eq!(palette.color_of([1, 2, 3, 255]), Color::TRANSPARENT);
    }
}
