mod coordinates;
mod kepler;
mod leapfrog;
mod ias15;
mod whfast;
mod wh;
mod sei;
mod hybrid;

pub use self::leapfrog::LeapFrog;
pub use self::ias15::Ias15;
pub use self::whfast::WHFast;
pub use self::wh::Wh;
pub use self::sei::Sei;
pub use self::hybrid::Hybrid;
pub use self::kepler::kepler_step;
pub use self::coordinates::{inertial_to_jacobi, jacobi_to_inertial, inertial_to_democratic_heliocentric, democratic_heliocentric_to_inertial};

use super::config::IntegratorKind;
use super::simulation::Simulation;

/// A step is split around the force evaluation: `part1` runs before the
/// accelerations are updated and `part2` after. Integrators that keep an internal
/// (unsynchronized) state write back physical coordinates in `synchronize`, and
/// drop every cached quantity in `reset`.
pub trait Integrator {
    fn part1(&mut self, sim: &mut Simulation);
    fn part2(&mut self, sim: &mut Simulation);
    fn synchronize(&mut self, sim: &mut Simulation);
    fn reset(&mut self);
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum IntegratorState {
    Ias15(Ias15),
    WHFast(WHFast),
    Wh(Wh),
    Sei(Sei),
    LeapFrog(LeapFrog),
    Hybrid(Hybrid),
    None, // Placeholder while the simulation lends the integrator out
}

impl Default for IntegratorState {
    fn default() -> IntegratorState {
        IntegratorState::None
    }
}

impl IntegratorState {
    pub fn new(kind: IntegratorKind) -> IntegratorState {
        match kind {
            IntegratorKind::Ias15 => IntegratorState::Ias15(Ias15::new()),
            IntegratorKind::WHFast => IntegratorState::WHFast(WHFast::new()),
            IntegratorKind::Wh => IntegratorState::Wh(Wh::new()),
            IntegratorKind::Sei => IntegratorState::Sei(Sei::new()),
            IntegratorKind::LeapFrog => IntegratorState::LeapFrog(LeapFrog::new()),
            IntegratorKind::Hybrid => IntegratorState::Hybrid(Hybrid::new()),
        }
    }

    pub fn kind(&self) -> Option<IntegratorKind> {
        match self {
            IntegratorState::Ias15(_) => Some(IntegratorKind::Ias15),
            IntegratorState::WHFast(_) => Some(IntegratorKind::WHFast),
            IntegratorState::Wh(_) => Some(IntegratorKind::Wh),
            IntegratorState::Sei(_) => Some(IntegratorKind::Sei),
            IntegratorState::LeapFrog(_) => Some(IntegratorKind::LeapFrog),
            IntegratorState::Hybrid(_) => Some(IntegratorKind::Hybrid),
            IntegratorState::None => None,
        }
    }

    pub fn as_integrator_mut(&mut self) -> Option<&mut dyn Integrator> {
        match self {
            IntegratorState::Ias15(integrator) => Some(integrator),
            IntegratorState::WHFast(integrator) => Some(integrator),
            IntegratorState::Wh(integrator) => Some(integrator),
            IntegratorState::Sei(integrator) => Some(integrator),
            IntegratorState::LeapFrog(integrator) => Some(integrator),
            IntegratorState::Hybrid(integrator) => Some(integrator),
            IntegratorState::None => None,
        }
    }
}
