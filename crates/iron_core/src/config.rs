//! Simulation configuration.
//!
//! A [`SimConfig`] fully determines the opening state of a match. Hosts
//! build one in code or parse it from RON text; every field has a default
//! so partial files are accepted.

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::factions::FactionId;
use crate::math::{Fixed, Rect, Vec2Fixed};

/// Default RNG seed.
pub const DEFAULT_SEED: u64 = 42;

/// Match-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Map width in world units.
    pub map_width: i32,
    /// Map height in world units.
    pub map_height: i32,
    /// Grid tile size for placement snapping and fog of war.
    pub tile_size: i32,
    /// Maximum distance from a placement point to a friendly building.
    pub construction_range: i32,
    /// Seed for world and AI randomness.
    pub seed: u64,
    /// Iron each headquarters starts with.
    pub starting_iron: u32,
    /// Number of iron fields scattered at setup.
    pub iron_field_count: u32,
    /// Minimum distance between a field's top-left and the map edge.
    pub iron_field_margin: i32,
    /// Top-left corner of the GDI headquarters.
    pub gdi_hq_position: (i32, i32),
    /// Top-left corner of the NOD headquarters.
    pub nod_hq_position: (i32, i32),
    /// Factions driven by the strategic AI.
    pub ai_factions: Vec<FactionId>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            map_width: 1600,
            map_height: 800,
            tile_size: 32,
            construction_range: 160,
            seed: DEFAULT_SEED,
            starting_iron: 1500,
            iron_field_count: 40,
            iron_field_margin: 100,
            gdi_hq_position: (300, 300),
            nod_hq_position: (1300, 500),
            ai_factions: vec![FactionId::Nod],
        }
    }
}

impl SimConfig {
    /// Parse a configuration from RON text and validate it.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Same configuration with a different seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check that values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.map_width <= 0 || self.map_height <= 0 {
            return Err(GameError::InvalidConfig(format!(
                "map must have positive size, got {}x{}",
                self.map_width, self.map_height
            )));
        }
        if self.tile_size <= 0 {
            return Err(GameError::InvalidConfig(format!(
                "tile size must be positive, got {}",
                self.tile_size
            )));
        }
        if self.map_width % self.tile_size != 0 || self.map_height % self.tile_size != 0 {
            return Err(GameError::InvalidConfig(format!(
                "map {}x{} is not a whole number of {} tiles",
                self.map_width, self.map_height, self.tile_size
            )));
        }
        if 2 * self.iron_field_margin >= self.map_width.min(self.map_height) {
            return Err(GameError::InvalidConfig(format!(
                "iron field margin {} leaves no room on the map",
                self.iron_field_margin
            )));
        }
        Ok(())
    }

    /// The playable area.
    #[must_use]
    pub fn map_bounds(&self) -> Rect {
        Rect::new(
            Fixed::ZERO,
            Fixed::ZERO,
            Fixed::from_num(self.map_width),
            Fixed::from_num(self.map_height),
        )
    }

    /// Map centre point.
    #[must_use]
    pub fn map_center(&self) -> Vec2Fixed {
        Vec2Fixed::from_ints(self.map_width / 2, self.map_height / 2)
    }

    /// Top-left corner of a faction's starting headquarters.
    #[must_use]
    pub fn hq_position(&self, faction: FactionId) -> Vec2Fixed {
        let (x, y) = match faction {
            FactionId::Gdi => self.gdi_hq_position,
            FactionId::Nod => self.nod_hq_position,
        };
        Vec2Fixed::from_ints(x, y)
    }

    /// Whether the strategic AI drives `faction`.
    #[must_use]
    pub fn is_ai(&self, faction: FactionId) -> bool {
        self.ai_factions.contains(&faction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.map_width / config.tile_size, 50);
        assert_eq!(config.map_height / config.tile_size, 25);
        assert!(config.is_ai(FactionId::Nod));
        assert!(!config.is_ai(FactionId::Gdi));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = SimConfig::from_ron_str("(seed: 7, ai_factions: [Gdi, Nod])").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.map_width, 1600);
        assert!(config.is_ai(FactionId::Gdi));
    }

    #[test]
    fn test_rejects_ragged_tiles() {
        let result = SimConfig::from_ron_str("(map_width: 1000, tile_size: 32)");
        assert!(matches!(result, Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_ron() {
        let result = SimConfig::from_ron_str("(seed: \"many\")");
        assert!(matches!(result, Err(GameError::ConfigParse(_))));
    }

    #[test]
    fn test_hq_positions() {
        let config = SimConfig::default();
        assert_eq!(config.hq_position(FactionId::Nod), Vec2Fixed::from_ints(1300, 500));
    }
}
