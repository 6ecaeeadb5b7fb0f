use std::fmt;
use std::str::FromStr;

use atlas_blocks::Color;
use atlas_world::Environment;
use serde::{Deserialize, Serialize};

/// Which height search and tile set a render uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderVariant {
    Surface,
    Cave,
    Nether,
}

impl RenderVariant {
    pub const ALL: [RenderVariant; 3] = [RenderVariant::Surface, RenderVariant::Cave, RenderVariant::Nether];

    /// Directory holding this variant's tiles.
    pub const fn dir_name(self) -> &'static str {
        match self {
            RenderVariant::Surface => "surface",
            RenderVariant::Cave => "cave",
            RenderVariant::Nether => "nether",
        }
    }

    /// Variants a world of `environment` gets; the first one is its main map.
    pub fn for_environment(environment: Environment) -> Vec<RenderVariant> {
        match environment {
            Environment::Normal => vec![RenderVariant::Surface, RenderVariant::Cave],
            Environment::Nether => vec![RenderVariant::Nether],
            Environment::End => vec![RenderVariant::Surface],
        }
    }

    /// Pixel used when a column has nothing to show. The surface map lets
    /// the void show through; underground maps paint it dark.
    pub const fn no_data(self) -> Color {
        match self {
            RenderVariant::Surface => Color::TRANSPARENT,
            RenderVariant::Cave | RenderVariant::Nether => Color::NO_DATA,
        }
    }
}

impl fmt::Display for RenderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for RenderVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RenderVariant::ALL
            .into_iter()
            .find(|v| v.dir_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown render variant: {s}"))
    }
}
