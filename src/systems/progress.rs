use std::time::Duration;

use anyhow::Result;

use crate::{
    rng::SystemRng,
    systems::{System, TickContext},
    world::City,
};

/// Recomputes every active training job's progress fraction ten times a
/// second so the rendering collaborator always has a fresh value. Never
/// transitions a job.
pub struct TrainingProgressSystem;

impl TrainingProgressSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TrainingProgressSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for TrainingProgressSystem {
    fn name(&self) -> &'static str {
        "training_progress"
    }

    fn cadence(&self) -> Duration {
        Duration::from_millis(100)
    }

    fn run(&mut self, ctx: &TickContext, city: &mut City, _rng: &mut SystemRng<'_>) -> Result<()> {
        city.progress_tick(ctx.now_ms);
        Ok(())
    }
}
