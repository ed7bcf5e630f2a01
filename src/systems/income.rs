use std::time::Duration;

use anyhow::Result;

use crate::{
    rng::SystemRng,
    systems::{System, TickContext},
    world::City,
};

/// Accrues passive gold from producing buildings and population tax,
/// measured against real elapsed time so slow ticks don't lose income.
/// Each tick also runs the gold-deposit spawn trial.
pub struct IncomeSystem;

impl IncomeSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for IncomeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for IncomeSystem {
    fn name(&self) -> &'static str {
        "income"
    }

    fn cadence(&self) -> Duration {
        Duration::from_secs(1)
    }

    fn run(&mut self, ctx: &TickContext, city: &mut City, rng: &mut SystemRng<'_>) -> Result<()> {
        city.income_tick(ctx.now_ms, rng);
        Ok(())
    }
}
