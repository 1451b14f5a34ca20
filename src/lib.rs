extern crate serde;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;
extern crate serde_json;
extern crate bincode;
extern crate csv;
extern crate time;
extern crate thiserror;
#[cfg(test)]
#[macro_use]
extern crate assert_approx_eq;

pub mod constants;
pub mod error;
pub mod config;

mod particles;
pub use self::particles::Particle;
pub use self::particles::Axes;

pub mod boundary;
pub mod tree;
pub mod gravity;
pub mod collision;
pub mod integrator;
pub mod megno;
pub mod simulation;
pub mod tools;
pub mod output;

pub use self::error::{Error, Result};
pub use self::config::{SimulationConfig, CaseDescription, GravityMode, BoundaryKind, CollisionMode, IntegratorKind, BoxGeometry};
pub use self::simulation::{Simulation, IntegrationStatus, Hooks};
pub use self::integrator::{Integrator, IntegratorState};
pub use self::collision::{CollisionResolver, CollisionOutcome, HardSphere, MergeResolver, HaltResolver};
