//! Periodic simulation behaviors.
//!
//! Each system runs on its own wall-clock cadence, driven by the runtime
//! through the session's command queue, so one system's batch is never
//! observable half-applied by another.

mod income;
mod progress;
mod sweep;

use std::time::Duration;

use anyhow::Result;

use crate::{rng::SystemRng, world::City};

pub use income::IncomeSystem;
pub use progress::TrainingProgressSystem;
pub use sweep::TrainingCompletionSystem;

/// Wall-clock context for one pulse.
pub struct TickContext {
    /// Milliseconds since session start, from the runtime's monotonic
    /// clock.
    pub now_ms: u64,
}

pub trait System: Send {
    fn name(&self) -> &'static str;
    /// How often the runtime pulses this system.
    fn cadence(&self) -> Duration;
    fn run(&mut self, ctx: &TickContext, city: &mut City, rng: &mut SystemRng<'_>) -> Result<()>;
}

/// The standard set, in pulse order: progress republish, completion
/// sweep, income accrual.
pub fn standard_systems() -> Vec<Box<dyn System>> {
    vec![
        Box::new(TrainingProgressSystem::new()),
        Box::new(TrainingCompletionSystem::new()),
        Box::new(IncomeSystem::new()),
    ]
}
