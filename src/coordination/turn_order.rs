use std::sync::Mutex;

/// Decides, once per filled room, whether the joining player moves first.
pub trait TurnOrder: Send + Sync {
    fn joiner_moves_first(&self) -> bool;
}

/// Fair coin flip.
#[derive(Debug)]
pub struct RandomTurnOrder {
    rng: Mutex<fastrand::Rng>,
}

impl RandomTurnOrder {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Reproducible sequence of flips.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Default for RandomTurnOrder {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnOrder for RandomTurnOrder {
    fn joiner_moves_first(&self) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.bool(),
            // A poisoned generator still produces uniform bits.
            Err(poisoned) => poisoned.into_inner().bool(),
        }
    }
}

/// Always the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedTurnOrder(pub bool);

impl TurnOrder for FixedTurnOrder {
    fn joiner_moves_first(&self) -> bool {
        self.0
    }
}
