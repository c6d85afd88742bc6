//! Error types for the game simulation.

use thiserror::Error;

use crate::buildings::PlacementResult;
use crate::components::{BuildingKind, EntityId, ProducibleKind};
use crate::factions::FactionId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for simulation setup and lookups.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Configuration text failed to parse.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Configuration parsed but holds unusable values.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

/// Why a player or AI command was rejected.
///
/// A rejected command leaves the simulation untouched. Hosts typically log
/// the reason and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The faction has no living headquarters to act through.
    #[error("{0:?} has no headquarters")]
    NoHeadquarters(FactionId),

    /// Referenced entity does not exist.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Entity belongs to the other faction.
    #[error("Entity {entity} is not owned by {faction:?}")]
    NotOwned {
        /// The entity referenced.
        entity: EntityId,
        /// The faction that issued the command.
        faction: FactionId,
    },

    /// Entity is not a unit.
    #[error("Entity {0} is not a unit")]
    NotAUnit(EntityId),

    /// Entity is not a building.
    #[error("Entity {0} is not a building")]
    NotABuilding(EntityId),

    /// Not enough iron for the requested item.
    #[error("Insufficient iron: need {required}, have {available}")]
    InsufficientIron {
        /// Cost of the item.
        required: u32,
        /// Iron in the headquarters stockpile.
        available: u32,
    },

    /// The production queue is at capacity.
    #[error("Production queue is full ({capacity} items)")]
    QueueFull {
        /// Maximum queue length.
        capacity: usize,
    },

    /// The required support building is missing.
    #[error("{item:?} requires a {requires:?}")]
    MissingRequirement {
        /// Item that was requested.
        item: ProducibleKind,
        /// Building that must exist first.
        requires: BuildingKind,
    },

    /// Placement was requested with nothing pending.
    #[error("No building is awaiting placement")]
    NoPendingBuilding,

    /// Placement failed validation.
    #[error("Invalid placement: {0:?}")]
    InvalidPlacement(PlacementResult),

    /// Selling the last headquarters would end production for good.
    #[error("Cannot sell the last headquarters")]
    LastHeadquarters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_messages() {
        let err = CommandError::InsufficientIron {
            required: 500,
            available: 120,
        };
        assert_eq!(err.to_string(), "Insufficient iron: need 500, have 120");

        let err = CommandError::QueueFull { capacity: 5 };
        assert_eq!(err.to_string(), "Production queue is full (5 items)");
    }

    #[test]
    fn test_game_error_from_ron() {
        let parse = ron::from_str::<u32>("not a number").unwrap_err();
        let err: GameError = parse.into();
        assert!(err.to_string().starts_with("Failed to parse configuration"));
    }
}
