//! Faction definitions and identifiers.

use serde::{Deserialize, Serialize};

/// Unique identifier for the two competing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FactionId {
    /// Global Defense Initiative - slower, sturdier units.
    Gdi,
    /// Brotherhood of Nod - faster, more fragile units.
    Nod,
}

impl FactionId {
    /// Both factions in a stable order.
    pub const ALL: [FactionId; 2] = [FactionId::Gdi, FactionId::Nod];

    /// Get the display name for this faction.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Gdi => "Global Defense Initiative",
            Self::Nod => "Brotherhood of Nod",
        }
    }

    /// Get the short name for this faction.
    #[must_use]
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::Gdi => "GDI",
            Self::Nod => "NOD",
        }
    }

    /// The opposing faction.
    #[must_use]
    pub const fn opponent(&self) -> FactionId {
        match self {
            Self::Gdi => Self::Nod,
            Self::Nod => Self::Gdi,
        }
    }

    /// Stable index into per-faction storage.
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Gdi => 0,
            Self::Nod => 1,
        }
    }
}

/// One value per faction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerFaction<T> {
    /// Value for [`FactionId::Gdi`].
    pub gdi: T,
    /// Value for [`FactionId::Nod`].
    pub nod: T,
}

impl<T> PerFaction<T> {
    /// Build both entries from a constructor.
    pub fn from_fn(mut f: impl FnMut(FactionId) -> T) -> Self {
        Self {
            gdi: f(FactionId::Gdi),
            nod: f(FactionId::Nod),
        }
    }

    /// Borrow the entry for `faction`.
    #[must_use]
    pub fn get(&self, faction: FactionId) -> &T {
        match faction {
            FactionId::Gdi => &self.gdi,
            FactionId::Nod => &self.nod,
        }
    }

    /// Mutably borrow the entry for `faction`.
    pub fn get_mut(&mut self, faction: FactionId) -> &mut T {
        match faction {
            FactionId::Gdi => &mut self.gdi,
            FactionId::Nod => &mut self.nod,
        }
    }
}
