pub mod catalog;
pub mod error;
pub mod rng;
pub mod runtime;
pub mod systems;
pub mod web;
pub mod world;

pub use catalog::{Catalog, CatalogLoader};
pub use error::SimError;
pub use runtime::{spawn_session, SessionHandle, SessionSettings};
pub use world::{City, CitySnapshot, Position};
