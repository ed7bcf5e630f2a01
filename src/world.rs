//! Authoritative simulation state: the economy, the placement registry,
//! active training jobs, and gold deposits, plus every operation that
//! mutates them. All state is owned by one [`City`] value; the runtime
//! serializes access through a single driver task.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{Catalog, UnitCost};
use crate::error::SimError;
use crate::rng::SystemRng;

pub const MAP_WIDTH: f64 = 2_000.0;
pub const MAP_HEIGHT: f64 = 1_500.0;
/// Deposits spawn inset from the map edges.
const DEPOSIT_MARGIN: f64 = 100.0;
/// Probability of a deposit spawning, evaluated once per income tick.
const DEPOSIT_SPAWN_CHANCE: f64 = 0.05;
/// Building type whose presence unlocks the food-for-gold trade.
const TRADE_BUILDING: &str = "market";

const STAT_BASE: f64 = 50.0;
const STAT_MAX: f64 = 100.0;
const BASE_POPULATION: u32 = 100;
const TAX_MAX: u8 = 30;
const TAX_STEP: u8 = 5;
const DEFAULT_TAX: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(u64);

impl JobId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DepositId(u64);

impl DepositId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// What occupies a spot on the map. Units and buildings share the
/// registry but are distinct variants, never distinguished by naming
/// conventions on the type id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacedKind {
    Building { type_id: String },
    Unit { type_id: String },
}

impl PlacedKind {
    pub fn type_id(&self) -> &str {
        match self {
            PlacedKind::Building { type_id } | PlacedKind::Unit { type_id } => type_id,
        }
    }

    pub fn is_building(&self) -> bool {
        matches!(self, PlacedKind::Building { .. })
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, PlacedKind::Unit { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedEntity {
    pub id: EntityId,
    pub kind: PlacedKind,
    pub position: Position,
}

/// An in-flight request to produce one unit. `origin` snapshots the
/// chosen training building's position at start; the building itself is
/// never looked up again.
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub id: JobId,
    pub unit_type: String,
    pub started_ms: u64,
    pub building_id: EntityId,
    pub origin: Position,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoldDeposit {
    pub id: DepositId,
    pub position: Position,
    pub amount: u32,
    pub size: u32,
}

/// The resource triple plus derived figures. Gold, happiness, and food
/// are clamped to [0, 100] after every mutation. Happiness and food are
/// level quantities re-derived from the placed buildings; gold is a
/// running balance that building placement, training costs, income,
/// deposits, and trades adjust incrementally.
#[derive(Debug, Clone)]
pub struct EconomyState {
    gold: f64,
    happiness: f64,
    food: f64,
    population: u32,
    building_count: u32,
    military_units: u32,
    tax_rate: u8,
}

impl Default for EconomyState {
    fn default() -> Self {
        Self {
            gold: STAT_BASE,
            happiness: STAT_BASE,
            food: STAT_BASE,
            population: BASE_POPULATION,
            building_count: 0,
            military_units: 0,
            tax_rate: DEFAULT_TAX,
        }
    }
}

fn clamp_stat(value: f64) -> f64 {
    value.clamp(0.0, STAT_MAX)
}

impl EconomyState {
    pub fn gold(&self) -> f64 {
        self.gold
    }

    pub fn happiness(&self) -> f64 {
        self.happiness
    }

    pub fn food(&self) -> f64 {
        self.food
    }

    pub fn population(&self) -> u32 {
        self.population
    }

    pub fn building_count(&self) -> u32 {
        self.building_count
    }

    pub fn military_units(&self) -> u32 {
        self.military_units
    }

    pub fn tax_rate(&self) -> u8 {
        self.tax_rate
    }

    pub fn add_gold(&mut self, delta: f64) {
        self.gold = clamp_stat(self.gold + delta);
    }

    pub fn add_food(&mut self, delta: f64) {
        self.food = clamp_stat(self.food + delta);
    }

    pub fn can_afford(&self, cost: UnitCost) -> bool {
        self.gold >= f64::from(cost.gold) && self.food >= f64::from(cost.food)
    }

    /// Sufficiency is the caller's check; this only subtracts, clamped
    /// at zero.
    pub(crate) fn deduct_training_cost(&mut self, cost: UnitCost) {
        self.gold = (self.gold - f64::from(cost.gold)).max(0.0);
        self.food = (self.food - f64::from(cost.food)).max(0.0);
    }

    /// Clamp to [0, 30] and snap to the nearest 5% step. Returns the
    /// applied rate.
    pub fn set_tax_rate(&mut self, rate: u8) -> u8 {
        let clamped = rate.min(TAX_MAX);
        self.tax_rate = ((clamped + TAX_STEP / 2) / TAX_STEP) * TAX_STEP;
        self.tax_rate
    }

    /// Trade 20 food for 15 gold. No-op below 20 food.
    pub fn convert_food_to_gold(&mut self) -> bool {
        if self.food < 20.0 {
            return false;
        }
        self.food -= 20.0;
        self.add_gold(15.0);
        true
    }

    pub(crate) fn bump_military(&mut self) {
        self.military_units += 1;
    }

    pub(crate) fn apply_derived(&mut self, happiness: f64, food: f64, buildings: u32, military: u32) {
        self.happiness = clamp_stat(happiness);
        self.food = clamp_stat(food);
        self.building_count = buildings;
        self.military_units = military;
        self.population =
            BASE_POPULATION + ((self.happiness + self.food) / 2.0).floor() as u32;
    }

    pub(crate) fn apply_counts(&mut self, buildings: u32, military: u32) {
        self.building_count = buildings;
        self.military_units = military;
    }

    pub fn snapshot(&self) -> EconomySnapshot {
        EconomySnapshot {
            gold: self.gold,
            happiness: self.happiness,
            food: self.food,
            population: self.population,
            building_count: self.building_count,
            military_units: self.military_units,
            tax_rate: self.tax_rate,
        }
    }
}

pub struct City {
    catalog: Catalog,
    economy: EconomyState,
    placements: Vec<PlacedEntity>,
    jobs: Vec<TrainingJob>,
    deposits: Vec<GoldDeposit>,
    available_units: BTreeSet<String>,
    next_entity: u64,
    next_job: u64,
    next_deposit: u64,
    last_income_ms: u64,
}

impl City {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            economy: EconomyState::default(),
            placements: Vec::new(),
            jobs: Vec::new(),
            deposits: Vec::new(),
            available_units: BTreeSet::new(),
            next_entity: 0,
            next_job: 0,
            next_deposit: 0,
            last_income_ms: 0,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn economy(&self) -> &EconomyState {
        &self.economy
    }

    pub fn economy_mut(&mut self) -> &mut EconomyState {
        &mut self.economy
    }

    pub fn placements(&self) -> &[PlacedEntity] {
        &self.placements
    }

    pub fn training_jobs(&self) -> &[TrainingJob] {
        &self.jobs
    }

    pub fn deposits(&self) -> &[GoldDeposit] {
        &self.deposits
    }

    pub fn available_units(&self) -> &BTreeSet<String> {
        &self.available_units
    }

    /// Military count derived by walking the registry, independent of
    /// the incrementally tracked counter.
    pub fn derived_military_count(&self) -> u32 {
        self.placements.iter().filter(|e| e.kind.is_unit()).count() as u32
    }

    pub fn place_building(
        &mut self,
        type_id: &str,
        position: Position,
    ) -> Result<EntityId, SimError> {
        let gold_delta = match self.catalog.building(type_id) {
            Some(def) => f64::from(def.effects.gold),
            None => return Err(SimError::UnknownBuildingType(type_id.to_string())),
        };
        let id = self.allocate_entity();
        self.placements.push(PlacedEntity {
            id,
            kind: PlacedKind::Building {
                type_id: type_id.to_string(),
            },
            position,
        });
        // A building's gold effect lands exactly once, at placement.
        // Happiness and food are re-derived from the whole building set.
        self.economy.add_gold(gold_delta);
        self.refresh_derived();
        self.refresh_availability();
        Ok(id)
    }

    pub fn start_training(
        &mut self,
        unit_type: &str,
        target: Position,
        now_ms: u64,
    ) -> Result<JobId, SimError> {
        let (cost, required) = match self.catalog.unit(unit_type) {
            Some(def) => (def.cost, def.required_building.clone()),
            None => return Err(SimError::UnknownUnitType(unit_type.to_string())),
        };
        if !self.available_units.contains(unit_type) {
            return Err(SimError::PrerequisiteMissing {
                unit: unit_type.to_string(),
                required,
            });
        }
        if !self.economy.can_afford(cost) {
            return Err(SimError::InsufficientResources {
                unit: unit_type.to_string(),
                gold: cost.gold,
                food: cost.food,
            });
        }
        // Checked against the live registry, independent of the
        // availability set.
        let chosen = self
            .placements
            .iter()
            .filter(|e| matches!(&e.kind, PlacedKind::Building { type_id } if *type_id == required))
            .min_by(|a, b| {
                a.position
                    .distance_to(target)
                    .total_cmp(&b.position.distance_to(target))
            });
        let Some(chosen) = chosen else {
            return Err(SimError::NoTrainingBuilding {
                unit: unit_type.to_string(),
                required,
            });
        };
        let building_id = chosen.id;
        let origin = chosen.position;

        // The player commits resources at training start, not completion.
        self.economy.deduct_training_cost(cost);
        let id = self.allocate_job();
        self.jobs.push(TrainingJob {
            id,
            unit_type: unit_type.to_string(),
            started_ms: now_ms,
            building_id,
            origin,
            progress: 0.0,
        });
        Ok(id)
    }

    /// Refresh every active job's progress fraction. Pure republish for
    /// the rendering collaborator; no job changes state here.
    pub fn progress_tick(&mut self, now_ms: u64) {
        for job in &mut self.jobs {
            let Some(def) = self.catalog.unit(&job.unit_type) else {
                warn!(unit_type = %job.unit_type, "skipping progress for job with unknown unit type");
                continue;
            };
            let elapsed = now_ms.saturating_sub(job.started_ms) as f64;
            job.progress = (elapsed / def.build_time_ms() as f64).min(1.0);
        }
    }

    /// Move every finished job out of the active set, emitting exactly
    /// one placed unit each. The whole batch is applied before returning;
    /// no partial application is observable. Returns the batch size.
    pub fn completion_sweep(&mut self, now_ms: u64) -> usize {
        let mut remaining = Vec::with_capacity(self.jobs.len());
        let mut completed = Vec::new();
        for job in self.jobs.drain(..) {
            match self.catalog.unit(&job.unit_type) {
                Some(def) if now_ms.saturating_sub(job.started_ms) >= def.build_time_ms() => {
                    completed.push(job);
                }
                Some(_) => remaining.push(job),
                None => {
                    warn!(unit_type = %job.unit_type, "dropping training job with unknown unit type");
                }
            }
        }
        self.jobs = remaining;
        if completed.is_empty() {
            return 0;
        }
        let count = completed.len();
        for job in completed {
            let position = self.unit_spawn_position(&job);
            self.place_completed_unit(job.unit_type, position);
            self.economy.bump_military();
        }
        // Re-derive counts from the registry; must agree with the
        // incremental bump above.
        self.refresh_counts();
        count
    }

    /// Accrue passive gold from producing buildings and population tax
    /// for the real time elapsed since the previous tick, then run the
    /// deposit spawn trial.
    pub fn income_tick(&mut self, now_ms: u64, rng: &mut SystemRng<'_>) {
        let elapsed_secs = now_ms.saturating_sub(self.last_income_ms) as f64 / 1_000.0;
        let mut building_income = 0.0;
        for entity in &self.placements {
            let PlacedKind::Building { type_id } = &entity.kind else {
                continue;
            };
            match self.catalog.building(type_id) {
                Some(def) if def.effects.gold > 0 => {
                    building_income += f64::from(def.effects.gold) / 20.0;
                }
                Some(_) => {}
                None => {
                    warn!(%type_id, "skipping income for building with unknown type");
                }
            }
        }
        let tax_income =
            (f64::from(self.economy.population()) * f64::from(self.economy.tax_rate()) / 100.0)
                / 10.0;
        let total = building_income + tax_income;
        if total > 0.0 {
            self.economy.add_gold(total * elapsed_secs);
            debug!(building_income, tax_income, elapsed_secs, "applied passive income");
        }
        self.last_income_ms = now_ms;

        if rng.gen_bool(DEPOSIT_SPAWN_CHANCE) {
            self.spawn_deposit(rng);
        }
    }

    pub fn spawn_deposit(&mut self, rng: &mut SystemRng<'_>) -> DepositId {
        let position = Position {
            x: rng.gen_range(DEPOSIT_MARGIN..MAP_WIDTH - DEPOSIT_MARGIN),
            y: rng.gen_range(DEPOSIT_MARGIN..MAP_HEIGHT - DEPOSIT_MARGIN),
        };
        let amount = rng.gen_range(5..=20);
        let size = rng.gen_range(20..=40);
        let id = DepositId(self.next_deposit);
        self.next_deposit += 1;
        self.deposits.push(GoldDeposit {
            id,
            position,
            amount,
            size,
        });
        debug!(id = id.raw(), amount, "gold deposit spawned");
        id
    }

    /// Collect a deposit. Unknown or already-collected ids are a silent
    /// no-op, so duplicate clicks cannot double-pay.
    pub fn collect_deposit(&mut self, id: DepositId) -> Option<u32> {
        let index = self.deposits.iter().position(|d| d.id == id)?;
        let deposit = self.deposits.remove(index);
        self.economy.add_gold(f64::from(deposit.amount));
        Some(deposit.amount)
    }

    pub fn set_tax_rate(&mut self, rate: u8) -> u8 {
        self.economy.set_tax_rate(rate)
    }

    pub fn convert_food_to_gold(&mut self) -> bool {
        self.economy.convert_food_to_gold()
    }

    pub fn can_trade(&self) -> bool {
        self.placements
            .iter()
            .any(|e| matches!(&e.kind, PlacedKind::Building { type_id } if type_id == TRADE_BUILDING))
    }

    pub fn snapshot(&self) -> CitySnapshot {
        CitySnapshot {
            economy: self.economy.snapshot(),
            placements: self
                .placements
                .iter()
                .map(|e| PlacementSnapshot {
                    id: e.id.raw(),
                    kind: if e.kind.is_unit() { "unit" } else { "building" },
                    type_id: e.kind.type_id().to_string(),
                    position: e.position,
                })
                .collect(),
            training: self
                .jobs
                .iter()
                .map(|job| TrainingSnapshot {
                    id: job.id.raw(),
                    unit_type: job.unit_type.clone(),
                    position: job.origin,
                    progress: job.progress,
                })
                .collect(),
            deposits: self
                .deposits
                .iter()
                .map(|d| DepositSnapshot {
                    id: d.id.raw(),
                    position: d.position,
                    amount: d.amount,
                    size: d.size,
                })
                .collect(),
            available_units: self.available_units.iter().cloned().collect(),
            can_trade: self.can_trade(),
        }
    }

    fn allocate_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    fn allocate_job(&mut self) -> JobId {
        let id = JobId(self.next_job);
        self.next_job += 1;
        id
    }

    /// Invoked only by the completion sweep.
    fn place_completed_unit(&mut self, type_id: String, position: Position) -> EntityId {
        let id = self.allocate_entity();
        self.placements.push(PlacedEntity {
            id,
            kind: PlacedKind::Unit { type_id },
            position,
        });
        id
    }

    /// Finished units appear just below their training building.
    fn unit_spawn_position(&self, job: &TrainingJob) -> Position {
        let (width, height) = self
            .catalog
            .unit(&job.unit_type)
            .and_then(|unit| self.catalog.building(&unit.required_building))
            .map(|b| (b.width, b.height))
            .unwrap_or((50.0, 50.0));
        Position {
            x: job.origin.x + width / 2.0,
            y: job.origin.y + height + 20.0,
        }
    }

    /// Re-derive happiness, food, population, and both counts from the
    /// current building set. Gold is deliberately left alone: re-deriving
    /// it would erase everything spent and earned since placement.
    fn refresh_derived(&mut self) {
        let mut happiness = STAT_BASE;
        let mut food = STAT_BASE;
        let mut buildings = 0u32;
        let mut military = 0u32;
        for entity in &self.placements {
            match &entity.kind {
                PlacedKind::Building { type_id } => match self.catalog.building(type_id) {
                    Some(def) => {
                        buildings += 1;
                        happiness += f64::from(def.effects.happiness);
                        food += f64::from(def.effects.food);
                    }
                    None => {
                        warn!(%type_id, "skipping placed building with unknown type");
                    }
                },
                PlacedKind::Unit { .. } => military += 1,
            }
        }
        self.economy.apply_derived(happiness, food, buildings, military);
    }

    /// Counts-only refresh for registry changes that leave the building
    /// set untouched (unit completion). Keeps food spent on training from
    /// being resurrected.
    fn refresh_counts(&mut self) {
        let buildings = self
            .placements
            .iter()
            .filter(|e| e.kind.is_building())
            .count() as u32;
        let military = self.derived_military_count();
        self.economy.apply_counts(buildings, military);
    }

    fn refresh_availability(&mut self) {
        let placed_types: BTreeSet<&str> = self
            .placements
            .iter()
            .filter(|e| e.kind.is_building())
            .map(|e| e.kind.type_id())
            .collect();
        self.available_units = self
            .catalog
            .units()
            .filter(|unit| placed_types.contains(unit.required_building.as_str()))
            .map(|unit| unit.id.clone())
            .collect();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EconomySnapshot {
    pub gold: f64,
    pub happiness: f64,
    pub food: f64,
    pub population: u32,
    pub building_count: u32,
    pub military_units: u32,
    pub tax_rate: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacementSnapshot {
    pub id: u64,
    pub kind: &'static str,
    pub type_id: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingSnapshot {
    pub id: u64,
    pub unit_type: String,
    pub position: Position,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DepositSnapshot {
    pub id: u64,
    pub position: Position,
    pub amount: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CitySnapshot {
    pub economy: EconomySnapshot,
    pub placements: Vec<PlacementSnapshot>,
    pub training: Vec<TrainingSnapshot>,
    pub deposits: Vec<DepositSnapshot>,
    pub available_units: Vec<String>,
    pub can_trade: bool,
}
