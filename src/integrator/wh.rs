use super::Integrator;
use super::coordinates::{AlternativeCoordinates, inertial_to_democratic_heliocentric, democratic_heliocentric_to_inertial};
use super::kepler::{kepler_step, kepler_variational_step};
use super::super::gravity::IgnoreGravityTerms;
use super::super::particles::Axes;
use super::super::simulation::Simulation;

/// Wisdom-Holman mapping in democratic heliocentric coordinates (a.k.a.
/// canonical heliocentric, Poincare or mixed-variables coordinates), always used
/// in safe mode and without correction (i.e. 2nd order integrator, comparable
/// to the mercury symplectic part of the hybrid integrator).
///
/// "Jacobi coordinates lead to a better precision compared to heliocentric
/// coordinates if orbits are well separated and do not cross each other. If
/// close encounter occur, then heliocentric coordinates can help improve the
/// integrator's accuracy."
/// Source: HERMES: a hybrid integrator for simulating close encounters and planetesimal migration
///         Ari Silburt, Hanno Rein & Dan Tamayo
///
/// The Hamiltonian is split in three parts (Duncan, Levison & Lee 1998): the
/// Keplerian motion of every body around the central one (drift), the
/// interaction between non-central bodies (kick) and the momentum of the
/// central body (jump). Every step starts and ends synchronized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Wh {
    heliocentric: Vec<AlternativeCoordinates>,  // Real bodies followed by variational particles
    masses: Vec<f64>,
    timestep_warning: usize,
}

impl Wh {
    pub fn new() -> Wh {
        Wh::default()
    }

    fn from_inertial(&mut self, sim: &Simulation) {
        let n_real = sim.n_real();
        let n_active = sim.n_active();
        self.masses = sim.particles[..n_real].iter().enumerate()
            .map(|(i, particle)| if i < n_active { particle.mass } else { 0. })
            .collect();
        self.heliocentric.clear();
        self.heliocentric.resize(sim.particles.len(), AlternativeCoordinates::default());
        let (real, var) = self.heliocentric.split_at_mut(n_real);
        inertial_to_democratic_heliocentric(&self.masses, &sim.particles[..n_real], real);
        inertial_to_democratic_heliocentric(&self.masses, &sim.particles[n_real..], var);
    }

    fn to_inertial(&self, sim: &mut Simulation) {
        let n_real = sim.n_real();
        let (real, var) = sim.particles.split_at_mut(n_real);
        democratic_heliocentric_to_inertial(&self.masses, &self.heliocentric[..n_real], real);
        democratic_heliocentric_to_inertial(&self.masses, &self.heliocentric[n_real..], var);
    }

    #[allow(non_snake_case)]
    fn kepler_steps(&mut self, G: f64, dt: f64) {
        let n_real = self.masses.len();
        let has_var = self.heliocentric.len() > n_real;
        let gm = match self.masses.first() {
            Some(&m0) => G*m0,
            None => return,
        };
        for i in 1..n_real {
            if has_var {
                let position = self.heliocentric[i].position;
                let velocity = self.heliocentric[i].velocity;
                let var = &mut self.heliocentric[n_real+i];
                kepler_variational_step(&position, &velocity, &mut var.position, &mut var.velocity, gm, dt, &mut self.timestep_warning);
            }
            let body = &mut self.heliocentric[i];
            kepler_step(&mut body.position, &mut body.velocity, gm, dt, &mut self.timestep_warning);
        }
    }

    fn com_step(&mut self, dt: f64) {
        let n_real = self.masses.len();
        for offset in [0, n_real].iter() {
            if let Some(com) = self.heliocentric.get_mut(*offset) {
                com.position += com.velocity * dt;
            }
        }
    }

    /// Drift of every body due to the momentum of the central one
    fn jump_step(&mut self, dt: f64) {
        let n_real = self.masses.len();
        if n_real == 0 {
            return;
        }
        let m0 = self.masses[0];
        for offset in [0, n_real].iter() {
            let bodies = match self.heliocentric.get_mut(offset+1..offset+n_real) {
                Some(bodies) => bodies,
                None => continue,
            };
            let mut momentum = Axes::zero();
            for (body, mass) in bodies.iter().zip(self.masses[1..].iter()) {
                momentum += body.velocity * *mass;
            }
            let shift = momentum * (dt/m0);
            for body in bodies.iter_mut() {
                body.position += shift;
            }
        }
    }

    /// Kick with the accelerations computed without the central body
    fn interaction_step(&mut self, sim: &Simulation, dt: f64) {
        let n_real = self.masses.len();
        for (i, particle) in sim.particles.iter().enumerate() {
            if i == 0 || i == n_real {
                continue; // Center of mass entries
            }
            self.heliocentric[i].velocity += particle.acceleration * dt;
        }
    }
}

impl Integrator for Wh {
    fn part1(&mut self, sim: &mut Simulation) {
        sim.ignore_gravity_terms = IgnoreGravityTerms::CentralBody;
        self.from_inertial(sim);
        let dt = sim.dt;
        self.kepler_steps(sim.config.G, dt/2.);
        self.com_step(dt/2.);
        self.jump_step(dt/2.);
        self.to_inertial(sim);
        sim.t += dt/2.;
    }

    fn part2(&mut self, sim: &mut Simulation) {
        let dt = sim.dt;
        self.interaction_step(sim, dt);
        self.jump_step(dt/2.);
        self.kepler_steps(sim.config.G, dt/2.);
        self.com_step(dt/2.);
        self.to_inertial(sim);
        sim.t += dt/2.;
        sim.dt_last_done = dt;
    }

    fn synchronize(&mut self, _sim: &mut Simulation) {}

    fn reset(&mut self) {
        let timestep_warning = self.timestep_warning;
        *self = Wh::default();
        self.timestep_warning = timestep_warning;
    }
}
