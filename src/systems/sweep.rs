use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::{
    rng::SystemRng,
    systems::{System, TickContext},
    world::City,
};

/// Converts finished training jobs into placed units, one batch per
/// sweep.
pub struct TrainingCompletionSystem;

impl TrainingCompletionSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TrainingCompletionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for TrainingCompletionSystem {
    fn name(&self) -> &'static str {
        "training_completion"
    }

    fn cadence(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn run(&mut self, ctx: &TickContext, city: &mut City, _rng: &mut SystemRng<'_>) -> Result<()> {
        let completed = city.completion_sweep(ctx.now_ms);
        if completed > 0 {
            info!(completed, "units finished training");
        }
        Ok(())
    }
}
