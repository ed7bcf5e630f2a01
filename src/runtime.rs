//! Session runtime: one driver task exclusively owns the [`City`] and
//! processes a single-consumer command queue. User intents and the
//! periodic system pulses all arrive as commands, so every
//! read-modify-write is atomic with respect to every other; no task can
//! observe a half-applied batch.

use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::{
    catalog::Catalog,
    error::SimError,
    rng::RngManager,
    systems::{standard_systems, System, TickContext},
    world::{City, CitySnapshot, DepositId, EntityId, JobId, Position},
};

const COMMAND_BUFFER: usize = 256;
const FRAME_BUFFER: usize = 512;

pub struct SessionSettings {
    pub catalog: Catalog,
    pub seed: u64,
}

impl SessionSettings {
    pub fn new(catalog: Catalog, seed: u64) -> Self {
        Self { catalog, seed }
    }
}

/// One published view of the world, emitted after every applied command
/// pulse so the rendering collaborator can follow along.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub now_ms: u64,
    pub snapshot: CitySnapshot,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("simulation session has shut down")]
    Closed,
}

enum Command {
    PlaceBuilding {
        type_id: String,
        position: Position,
        reply: oneshot::Sender<Result<EntityId, SimError>>,
    },
    StartTraining {
        unit_type: String,
        target: Position,
        reply: oneshot::Sender<Result<JobId, SimError>>,
    },
    CollectDeposit {
        id: DepositId,
        reply: oneshot::Sender<Option<u32>>,
    },
    SetTaxRate {
        rate: u8,
        reply: oneshot::Sender<u8>,
    },
    ConvertFoodToGold {
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<CitySnapshot>,
    },
    Pulse {
        system: usize,
    },
    Shutdown,
}

/// Cloneable entry point into a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    frames: broadcast::Sender<Frame>,
}

impl SessionHandle {
    pub async fn place_building(
        &self,
        type_id: &str,
        position: Position,
    ) -> Result<EntityId, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::PlaceBuilding {
                type_id: type_id.to_string(),
                position,
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?.map_err(SessionError::from)
    }

    pub async fn start_training(
        &self,
        unit_type: &str,
        target: Position,
    ) -> Result<JobId, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::StartTraining {
                unit_type: unit_type.to_string(),
                target,
                reply,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?.map_err(SessionError::from)
    }

    /// Returns the collected amount, or `None` for an unknown or
    /// already-collected deposit.
    pub async fn collect_deposit(&self, id: DepositId) -> Result<Option<u32>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::CollectDeposit { id, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Returns the applied (clamped, snapped) rate.
    pub async fn set_tax_rate(&self, rate: u8) -> Result<u8, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SetTaxRate { rate, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn convert_food_to_gold(&self) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ConvertFoodToGold { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn snapshot(&self) -> Result<CitySnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn subscribe_frames(&self) -> broadcast::Receiver<Frame> {
        self.frames.subscribe()
    }

    /// Stop the driver loop; the interval tasks wind down once the
    /// channel closes.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

/// Start a session: the driver task plus one interval task per periodic
/// system. Must be called from within a tokio runtime.
pub fn spawn_session(settings: SessionSettings) -> SessionHandle {
    let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
    let (frames, _) = broadcast::channel(FRAME_BUFFER);
    let systems = standard_systems();

    for (index, system) in systems.iter().enumerate() {
        let cadence = system.cadence();
        let pulses = commands.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick resolves immediately; consume it so pulses
            // start one full cadence in.
            interval.tick().await;
            loop {
                interval.tick().await;
                if pulses.send(Command::Pulse { system: index }).await.is_err() {
                    break;
                }
            }
        });
    }

    let frames_tx = frames.clone();
    tokio::spawn(drive(settings, systems, receiver, frames_tx));

    SessionHandle { commands, frames }
}

async fn drive(
    settings: SessionSettings,
    mut systems: Vec<Box<dyn System>>,
    mut receiver: mpsc::Receiver<Command>,
    frames: broadcast::Sender<Frame>,
) {
    let mut city = City::new(settings.catalog);
    let mut rng = RngManager::new(settings.seed);
    let started = Instant::now();
    info!(seed = settings.seed, "simulation session started");

    while let Some(command) = receiver.recv().await {
        let now_ms = started.elapsed().as_millis() as u64;
        match command {
            Command::PlaceBuilding {
                type_id,
                position,
                reply,
            } => {
                let _ = reply.send(city.place_building(&type_id, position));
                publish(&frames, now_ms, &city);
            }
            Command::StartTraining {
                unit_type,
                target,
                reply,
            } => {
                let _ = reply.send(city.start_training(&unit_type, target, now_ms));
                publish(&frames, now_ms, &city);
            }
            Command::CollectDeposit { id, reply } => {
                let _ = reply.send(city.collect_deposit(id));
                publish(&frames, now_ms, &city);
            }
            Command::SetTaxRate { rate, reply } => {
                let _ = reply.send(city.set_tax_rate(rate));
                publish(&frames, now_ms, &city);
            }
            Command::ConvertFoodToGold { reply } => {
                let _ = reply.send(city.convert_food_to_gold());
                publish(&frames, now_ms, &city);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(city.snapshot());
            }
            Command::Pulse { system } => {
                let Some(system) = systems.get_mut(system) else {
                    continue;
                };
                let ctx = TickContext { now_ms };
                let mut stream = rng.stream(system.name());
                // A failing pulse never takes the session down with it.
                if let Err(err) = system.run(&ctx, &mut city, &mut stream) {
                    error!(system = system.name(), %err, "periodic system failed");
                }
                publish(&frames, now_ms, &city);
            }
            Command::Shutdown => break,
        }
    }
    info!("simulation session stopped");
}

fn publish(frames: &broadcast::Sender<Frame>, now_ms: u64, city: &City) {
    // No receivers is fine; frames are fire-and-forget.
    let _ = frames.send(Frame {
        now_ms,
        snapshot: city.snapshot(),
    });
}
