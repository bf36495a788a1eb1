use crate::domain::block::Difficulty;

/// Leading hex zeros required of a block hash unless configured otherwise.
pub const DEFAULT_DIFFICULTY: u8 = 4;

/// Tunables for the chain engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Proof-of-work target for every block, genesis included.
    pub difficulty: Difficulty,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::new(DEFAULT_DIFFICULTY),
        }
    }
}

impl EngineConfig {
    pub fn with_difficulty(mut self, leading_zeros: u8) -> Self {
        self.difficulty = Difficulty::new(leading_zeros);
        self
    }
}
