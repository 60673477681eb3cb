//! Game configuration types.

use super::defaults::default_max_search_results;
use crate::protocol::GameSeed;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Starting media written to the store at startup. Without one, joins
    /// fail until an operator installs a seed.
    #[serde(default)]
    pub seed: Option<GameSeed>,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_search_results: default_max_search_results(),
        }
    }
}
