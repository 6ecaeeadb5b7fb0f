use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u16);

impl MaterialId {
    pub const AIR: MaterialId = MaterialId(0);
    pub const CAVE_AIR: MaterialId = MaterialId(1);
    pub const VOID_AIR: MaterialId = MaterialId(2);
    pub const WATER: MaterialId = MaterialId(3);
    pub const LAVA: MaterialId = MaterialId(4);

    /// Any of the three air kinds.
    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 <= Self::VOID_AIR.0
    }

    #[inline]
    pub const fn is_liquid(self) -> bool {
        self.0 == Self::WATER.0 || self.0 == Self::LAVA.0
    }
}

const RESERVED: [&str; 5] = ["air", "cave_air", "void_air", "water", "lava"];

/// Materials every catalog built with [`MaterialCatalog::standard`] knows,
/// in id order after the reserved ones.
pub const STANDARD_MATERIALS: &[&str] = &[
    "stone",
    "cobblestone",
    "bedrock",
    "gravel",
    "dirt",
    "coarse_dirt",
    "grass_block",
    "sand",
    "sandstone",
    "clay",
    "snow",
    "snow_block",
    "ice",
    "oak_log",
    "oak_planks",
    "oak_leaves",
    "short_grass",
    "glass",
    "deepslate",
    "iron_ore",
    "obsidian",
    "netherrack",
    "nether_quartz_ore",
    "soul_sand",
    "glowstone",
    "basalt",
    "magma_block",
    "crimson_nylium",
    "warped_nylium",
    "end_stone",
];

#[derive(Clone, Debug)]
pub struct Material {
    pub id: MaterialId,
    pub key: String,
}

/// Interned material names. Ids are dense and stable for the catalog's life.
#[derive(Clone, Debug)]
pub struct MaterialCatalog {
    pub materials: Vec<Material>,
    pub by_key: HashMap<String, MaterialId>,
}

impl Default for MaterialCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialCatalog {
    /// Catalog holding only the reserved air and liquid materials.
    pub fn new() -> Self {
        let mut catalog = Self {
            materials: Vec::new(),
            by_key: HashMap::new(),
        };
        for key in RESERVED {
            catalog.intern(key);
        }
        catalog
    }

    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for key in STANDARD_MATERIALS {
            catalog.intern(key);
        }
        catalog
    }

    /// Returns the id for `key`, assigning the next free one if it is new.
    pub fn intern(&mut self, key: &str) -> MaterialId {
        if let Some(id) = self.by_key.get(key) {
            return *id;
        }
        let id = MaterialId(self.materials.len() as u16);
        self.by_key.insert(key.to_string(), id);
        self.materials.push(Material {
            id,
            key: key.to_string(),
        });
        id
    }

    pub fn get_id(&self, key: &str) -> Option<MaterialId> {
        self.by_key.get(key).copied()
    }

    /// Id of a material every standard catalog is known to hold.
    pub fn id(&self, key: &str) -> MaterialId {
        self.get_id(key)
            .unwrap_or_else(|| panic!("material {key:?} missing from catalog"))
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    pub fn name(&self, id: MaterialId) -> &str {
        self.get(id).map(|m| m.key.as_str()).unwrap_or("unknown")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    #[inline]
    pub fn is_air(&self, id: MaterialId) -> bool {
        id.is_air()
    }
}
