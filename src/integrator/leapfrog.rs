use super::Integrator;
use super::super::gravity::IgnoreGravityTerms;
use super::super::simulation::Simulation;

/// Drift-kick-drift leap-frog: second order, symplectic and time reversible.
/// Every step starts and ends synchronized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LeapFrog {}

impl LeapFrog {
    pub fn new() -> LeapFrog {
        LeapFrog {}
    }

    fn drift(sim: &mut Simulation, dt: f64) {
        for particle in sim.particles.iter_mut() {
            particle.position += particle.velocity * dt;
        }
    }
}

impl Integrator for LeapFrog {
    fn part1(&mut self, sim: &mut Simulation) {
        sim.ignore_gravity_terms = IgnoreGravityTerms::None;
        let dt = sim.dt;
        LeapFrog::drift(sim, dt/2.);
        sim.t += dt/2.;
    }

    fn part2(&mut self, sim: &mut Simulation) {
        let dt = sim.dt;
        for particle in sim.particles.iter_mut() {
            particle.velocity += particle.acceleration * dt;
        }
        LeapFrog::drift(sim, dt/2.);
        sim.t += dt/2.;
        sim.dt_last_done = dt;
    }

    fn synchronize(&mut self, _sim: &mut Simulation) {}

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::config::{IntegratorKind, SimulationConfig};
    use super::super::super::particles::{Axes, Particle};

    #[test]
    fn free_particle_moves_in_a_straight_line() {
        let mut config = SimulationConfig::default();
        config.integrator = IntegratorKind::LeapFrog;
        config.dt = 0.1;
        let mut sim = Simulation::new(config, vec![Particle::test_particle(Axes::new(1., 2., 3.), Axes::new(0.5, -1., 0.))]).unwrap();
        for _ in 0..10 {
            sim.step();
        }
        let p = sim.particles[0];
        assert_approx_eq!(p.position.x, 1.5, 1e-14);
        assert_approx_eq!(p.position.y, 1., 1e-14);
        assert_eq!(p.velocity, Axes::new(0.5, -1., 0.));
    }

    #[test]
    fn backward_integration_retraces_the_orbit() {
        let mut config = SimulationConfig::default();
        config.integrator = IntegratorKind::LeapFrog;
        config.dt = 0.01;
        let particles = vec![
            Particle::new(1., 0., Axes::zero(), Axes::zero()),
            Particle::new(0., 0., Axes::new(1., 0., 0.), Axes::new(0., 1.2, 0.)),
        ];
        let mut sim = Simulation::new(config, particles).unwrap();
        let initial = sim.particles[1];
        for _ in 0..100 {
            sim.step();
        }
        sim.dt = -sim.dt;
        for _ in 0..100 {
            sim.step();
        }
        assert!((sim.particles[1].position - initial.position).norm() < 1e-12);
        assert!((sim.particles[1].velocity - initial.velocity).norm() < 1e-12);
    }
}
