//! The match board: a fixed row of cells generated once per match.

use rand::Rng;
use rand::seq::index;
use ricefield_protocol::{CellKind, GrainKind, PowerupKind};

use crate::MatchConfig;

/// One board slot. Immutable once the board is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub grain: GrainKind,
    pub powerup: PowerupKind,
}

impl Cell {
    pub const fn rice() -> Self {
        Self {
            grain: GrainKind::Rice,
            powerup: PowerupKind::None,
        }
    }

    pub const fn chaff() -> Self {
        Self {
            grain: GrainKind::Chaff,
            powerup: PowerupKind::None,
        }
    }

    /// Returns a copy of this cell carrying `powerup`.
    pub const fn with(self, powerup: PowerupKind) -> Self {
        Self {
            grain: self.grain,
            powerup,
        }
    }

    /// The wire classification (`RICE_BUFF`, `CHAFF`, ...).
    pub fn kind(&self) -> CellKind {
        CellKind {
            grain: self.grain,
            powerup: self.powerup,
        }
    }
}

/// A generated board.
///
/// Grain and powerups are placed independently: the RICE positions are one
/// uniform sample, the powerup positions another. A powerup can therefore
/// sit on RICE or on CHAFF. BUFF and DEBUFF never share a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: Vec<Cell>,
}

impl Board {
    /// Generates a board from a validated config.
    ///
    /// `rng` is injected so tests can use a seeded generator.
    pub fn generate(config: &MatchConfig, rng: &mut impl Rng) -> Self {
        let total = config.total_cells;
        let mut cells = vec![Cell::chaff(); total];

        for i in index::sample(rng, total, config.rice_cells.min(total)) {
            cells[i].grain = GrainKind::Rice;
        }

        let powerups = (config.buff_cells + config.debuff_cells).min(total);
        for (n, i) in index::sample(rng, total, powerups).into_iter().enumerate() {
            cells[i].powerup = if n < config.buff_cells {
                PowerupKind::Buff
            } else {
                PowerupKind::Debuff
            };
        }

        Self { cells }
    }

    /// Builds a board from explicit cells. Used by tests and tools that
    /// need a known layout.
    pub fn from_cells(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell at `index`, or `None` if out of range.
    pub fn get(&self, index: usize) -> Option<Cell> {
        self.cells.get(index).copied()
    }

    /// Indices of all RICE cells, ascending. Sent to clients at match start.
    pub fn rice_indices(&self) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.grain == GrainKind::Rice)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn rice_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.grain == GrainKind::Rice)
            .count()
    }

    fn count_powerup(&self, kind: PowerupKind) -> usize {
        self.cells.iter().filter(|cell| cell.powerup == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_generate_default_config_has_exact_counts() {
        let config = MatchConfig::default();
        let mut rng = StdRng::seed_from_u64(7);

        let board = Board::generate(&config, &mut rng);

        assert_eq!(board.len(), 100);
        assert_eq!(board.rice_count(), 67);
        assert_eq!(board.count_powerup(PowerupKind::Buff), 5);
        assert_eq!(board.count_powerup(PowerupKind::Debuff), 3);
    }

    #[test]
    fn test_generate_many_seeds_counts_always_hold() {
        let config = MatchConfig {
            total_cells: 10,
            rice_cells: 4,
            buff_cells: 3,
            debuff_cells: 3,
            ..MatchConfig::default()
        };
        for seed in 0..50 {
            let board = Board::generate(&config, &mut StdRng::seed_from_u64(seed));
            assert_eq!(board.rice_count(), 4);
            assert_eq!(board.count_powerup(PowerupKind::Buff), 3);
            assert_eq!(board.count_powerup(PowerupKind::Debuff), 3);
        }
    }

    #[test]
    fn test_generate_powerups_land_on_both_grains() {
        // With every cell a powerup and half the cells rice, powerups must
        // sit on both kinds of grain.
        let config = MatchConfig {
            total_cells: 8,
            rice_cells: 4,
            buff_cells: 4,
            debuff_cells: 4,
            ..MatchConfig::default()
        };
        let board = Board::generate(&config, &mut StdRng::seed_from_u64(1));
        let on_rice = (0..8)
            .filter_map(|i| board.get(i))
            .filter(|c| c.grain == GrainKind::Rice && c.powerup.is_some())
            .count();
        assert_eq!(on_rice, 4);
        assert_eq!(board.count_powerup(PowerupKind::None), 0);
    }

    #[test]
    fn test_generate_same_seed_same_board() {
        let config = MatchConfig::default();
        let a = Board::generate(&config, &mut StdRng::seed_from_u64(42));
        let b = Board::generate(&config, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_rice_indices_ascending() {
        let board = Board::from_cells(vec![
            Cell::chaff(),
            Cell::rice(),
            Cell::chaff().with(PowerupKind::Buff),
            Cell::rice().with(PowerupKind::Debuff),
        ]);
        assert_eq!(board.rice_indices(), vec![1, 3]);
        assert_eq!(board.rice_count(), 2);
    }

    #[test]
    fn test_get_out_of_range_is_none() {
        let board = Board::from_cells(vec![Cell::rice()]);
        assert!(board.get(0).is_some());
        assert!(board.get(1).is_none());
    }

    #[test]
    fn test_cell_kind_reflects_powerup() {
        let cell = Cell::rice().with(PowerupKind::Buff);
        assert_eq!(cell.kind().to_string(), "RICE_BUFF");
    }
}
