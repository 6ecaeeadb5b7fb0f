/// One of the map hue buckets. Index 0 is "no color" and renders transparent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BaseColor(pub u8);

impl BaseColor {
    pub const COUNT: usize = 62;

    pub const NONE: BaseColor = BaseColor(0);
    pub const GRASS: BaseColor = BaseColor(1);
    pub const SAND: BaseColor = BaseColor(2);
    pub const FIRE: BaseColor = BaseColor(4);
    pub const PLANT: BaseColor = BaseColor(7);
    pub const SNOW: BaseColor = BaseColor(8);
    pub const DIRT: BaseColor = BaseColor(10);
    pub const STONE: BaseColor = BaseColor(11);
    pub const WATER: BaseColor = BaseColor(12);
    pub const WOOD: BaseColor = BaseColor(13);
    pub const BLACK: BaseColor = BaseColor(29);
    pub const NETHER: BaseColor = BaseColor(35);

    #[inline]
    pub fn is_valid(self) -> bool {
        (self.0 as usize) < Self::COUNT
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Full-brightness RGB as `0xRRGGBB`.
    #[inline]
    pub fn rgb(self) -> u32 {
        BASE_RGB.get(self.0 as usize).copied().unwrap_or(0)
    }

    #[inline]
    pub fn shaded(self, shade: Shade) -> Color {
        Color(self.0 * 4 + shade as u8)
    }
}

pub(crate) const BASE_RGB: [u32; BaseColor::COUNT] = [
    0x000000, 0x7FB238, 0xF7E9A3, 0xC7C7C7, 0xFF0000, 0xA0A0FF, 0xA7A7A7, 0x007C00, 0xFFFFFF,
    0xA4A8B8, 0x976D4D, 0x707070, 0x4040FF, 0x8F7748, 0xFFFCF5, 0xD87F33, 0xB24CD8, 0x6699D8,
    0xE5E533, 0x7FCC19, 0xF27FA5, 0x4C4C4C, 0x999999, 0x4C7F99, 0x7F3FB2, 0x334CB2, 0x664C33,
    0x667F33, 0x993333, 0x191919, 0xFAEE4D, 0x5CDBD5, 0x4A80FF, 0x00D93A, 0x815631, 0x700200,
    0xD1B1A1, 0x9F5224, 0x95576C, 0x706C8A, 0xBA8524, 0x677535, 0xA04D4E, 0x392923, 0x876B62,
    0x575C5C, 0x7A4958, 0x4C3E5C, 0x4C3223, 0x4C522A, 0x8E3C2E, 0x251610, 0xBD3031, 0x943F61,
    0x5C191D, 0x167E86, 0x3A8E8C, 0x562C3E, 0x14B485, 0x646464, 0xD8AF93, 0x7FA796,
];

/// Brightness level of a base color; the discriminant is the palette offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Shade {
    Normal = 0,
    Light = 1,
    Bright = 2,
    Dark = 3,
}

impl Shade {
    pub const ALL: [Shade; 4] = [Shade::Normal, Shade::Light, Shade::Bright, Shade::Dark];

    /// Multiplier out of 255 applied to the base RGB.
    #[inline]
    pub const fn multiplier(self) -> u32 {
        match self {
            Shade::Normal => 180,
            Shade::Light => 220,
            Shade::Bright => 255,
            Shade::Dark => 135,
        }
    }

    /// Rank from darkest (0) to brightest (3).
    #[inline]
    pub const fn brightness_rank(self) -> u8 {
        match self {
            Shade::Dark => 0,
            Shade::Normal => 1,
            Shade::Light => 2,
            Shade::Bright => 3,
        }
    }

    #[inline]
    pub const fn from_offset(offset: u8) -> Shade {
        match offset & 3 {
            0 => Shade::Normal,
            1 => Shade::Light,
            2 => Shade::Bright,
            _ => Shade::Dark,
        }
    }
}

/// Palette index: `base * 4 + shade`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Color(pub u8);

impl Color {
    pub const TRANSPARENT: Color = Color(0);
    /// Marks a pixel whose column had no block to show.
    pub const NO_DATA: Color = Color(BaseColor::BLACK.0 * 4 + Shade::Dark as u8);

    #[inline]
    pub const fn new(base: BaseColor, shade: Shade) -> Self {
        Color(base.0 * 4 + shade as u8)
    }

    #[inline]
    pub const fn base(self) -> BaseColor {
        BaseColor(self.0 >> 2)
    }

    #[inline]
    pub const fn shade(self) -> Shade {
        Shade::from_offset(self.0)
    }

    #[inline]
    pub const fn is_transparent(self) -> bool {
        self.0 >> 2 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shade_offsets_pack_next_to_base() {
        let c = BaseColor::WATER.shaded(Shade::Bright);
        assert_eq!(c, Color(50));
        assert_eq!(c.base(), BaseColor::WATER);
        assert_eq!(c.shade(), Shade::Bright);
        assert_eq!(Color::NO_DATA, Color(119));
        assert!(Color::TRANSPARENT.is_transparent());
        assert!(!Color::NO_DATA.is_transparent());
    }
}
