use super::Integrator;
use super::coordinates::{AlternativeCoordinates, inertial_to_jacobi, inertial_to_jacobi_acceleration, jacobi_to_inertial};
use super::kepler::{kepler_step, kepler_variational_step};
use super::super::constants::{WHFAST_CORRECTOR_A1, WHFAST_CORRECTOR_B31};
use super::super::gravity::IgnoreGravityTerms;
use super::super::simulation::Simulation;

/// Source: Rein & Tamayo, 2015
/// WHFast is a complete reimplementation of the Wisdom-Holman integrator,
/// designed to speed up the algorithm and increase its accuracy. It is
/// unbiased (i.e., the errors are random and uncorrelated), and has a very slow
/// error growth. For sufficiently small timesteps, it achieves Brouwer's law
/// (i.e., the energy error grows as time to the power of one half).
///
/// The Hamiltonian is split in Jacobi coordinates: the Keplerian motion of
/// every body around the center of mass of the bodies interior to it is solved
/// exactly (drift) while the interaction terms are applied as a velocity kick.
/// This leads to a good precision as long as orbits are well separated and do
/// not cross each other.
///
/// In safe mode the physical (inertial) coordinates are synchronized after every
/// step. Disabling it lets consecutive drifts be combined into a single one,
/// which requires an explicit `synchronize` before reading the particles.
///
/// A third order symplectic corrector (Wisdom, Holman & Touma 1996) can be
/// enabled. It is applied when the integrator leaves a synchronized state and
/// inverted when it synchronizes again.
///
/// Variational particles are mapped with the linearised kick and a finite
/// difference of the Kepler drift.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WHFast {
    jacobi: Vec<AlternativeCoordinates>,    // Real bodies followed by variational particles
    masses: Vec<f64>,                       // Gravitating mass of each real body (0 for test particles)
    is_synchronized: bool,
    recalculate_jacobi: bool,
    timestep_warning: usize,
}

impl Default for WHFast {
    fn default() -> WHFast {
        WHFast {
            jacobi: Vec::new(),
            masses: Vec::new(),
            is_synchronized: true,
            recalculate_jacobi: true,
            timestep_warning: 0,
        }
    }
}

impl WHFast {
    pub fn new() -> WHFast {
        WHFast::default()
    }

    pub fn is_synchronized(&self) -> bool {
        self.is_synchronized
    }

    /// Force the Jacobi coordinates to be recomputed from the particles at the
    /// beginning of the next step.
    pub fn recalculate_coordinates(&mut self) {
        self.recalculate_jacobi = true;
    }

    fn from_inertial(&mut self, sim: &Simulation) {
        let n_real = sim.n_real();
        let n_active = sim.n_active();
        self.masses = sim.particles[..n_real].iter().enumerate()
            .map(|(i, particle)| if i < n_active { particle.mass } else { 0. })
            .collect();
        self.jacobi.clear();
        self.jacobi.resize(sim.particles.len(), AlternativeCoordinates::default());
        let (jacobi_real, jacobi_var) = self.jacobi.split_at_mut(n_real);
        inertial_to_jacobi(&self.masses, &sim.particles[..n_real], jacobi_real);
        inertial_to_jacobi(&self.masses, &sim.particles[n_real..], jacobi_var);
    }

    fn to_inertial(&self, sim: &mut Simulation) {
        let n_real = sim.n_real();
        let (real, var) = sim.particles.split_at_mut(n_real);
        jacobi_to_inertial(&self.masses, &self.jacobi[..n_real], real);
        jacobi_to_inertial(&self.masses, &self.jacobi[n_real..], var);
    }

    #[allow(non_snake_case)]
    fn kepler_steps(&mut self, G: f64, dt: f64) {
        let n_real = self.masses.len();
        let has_var = self.jacobi.len() > n_real;
        let mut eta = match self.masses.first() {
            Some(&m0) => m0,
            None => return,
        };
        for i in 1..n_real {
            eta += self.masses[i];
            if has_var {
                let position = self.jacobi[i].position;
                let velocity = self.jacobi[i].velocity;
                let var = &mut self.jacobi[n_real+i];
                kepler_variational_step(&position, &velocity, &mut var.position, &mut var.velocity, G*eta, dt, &mut self.timestep_warning);
            }
            let body = &mut self.jacobi[i];
            kepler_step(&mut body.position, &mut body.velocity, G*eta, dt, &mut self.timestep_warning);
        }
    }

    fn com_step(&mut self, dt: f64) {
        let n_real = self.masses.len();
        if n_real == 0 {
            return;
        }
        let com = &mut self.jacobi[0];
        com.position += com.velocity * dt;
        if self.jacobi.len() > n_real {
            let com = &mut self.jacobi[n_real];
            com.position += com.velocity * dt;
        }
    }

    /// Kick with the interaction Hamiltonian. Uses the inertial accelerations
    /// currently stored in the particles, computed without the inner pair.
    #[allow(non_snake_case)]
    fn interaction_step(&mut self, sim: &Simulation, dt: f64) {
        let n_real = self.masses.len();
        if n_real == 0 {
            return;
        }
        let G = sim.config.G;
        let has_var = self.jacobi.len() > n_real;
        {
            let (jacobi_real, jacobi_var) = self.jacobi.split_at_mut(n_real);
            inertial_to_jacobi_acceleration(&self.masses, &sim.particles[..n_real], jacobi_real);
            if has_var {
                inertial_to_jacobi_acceleration(&self.masses, &sim.particles[n_real..], jacobi_var);
            }
        }
        let mut eta = self.masses[0];
        for i in 1..n_real {
            eta += self.masses[i];
            let position = self.jacobi[i].position;
            let rj2i = 1./position.norm2();
            let rji = rj2i.sqrt();
            let rj3i_m = rji*rj2i*G*eta;
            if has_var {
                let var = &mut self.jacobi[n_real+i];
                var.velocity += var.acceleration * dt;
                if i > 1 {
                    let rdr = position.dot(&var.position);
                    var.velocity += (var.position - position * (3.*rdr*rj2i)) * (dt*rj3i_m);
                }
            }
            let body = &mut self.jacobi[i];
            body.velocity += body.acceleration * dt;
            if i > 1 {
                // Remove the part of the central attraction already solved by the drift
                body.velocity += position * (dt*rj3i_m);
            }
        }
    }

    fn corrector_z(&mut self, sim: &mut Simulation, a: f64, b: f64) {
        let g = sim.config.G;
        self.kepler_steps(g, a);
        self.to_inertial(sim);
        sim.update_acceleration();
        self.interaction_step(sim, -b);
        self.kepler_steps(g, -2.*a);
        self.to_inertial(sim);
        sim.update_acceleration();
        self.interaction_step(sim, b);
        self.kepler_steps(g, a);
    }

    /// `inv` is 1 to apply the corrector and -1 to remove it
    fn apply_corrector(&mut self, sim: &mut Simulation, inv: f64) {
        if sim.config.whfast.corrector != 3 {
            return;
        }
        let dt = sim.dt;
        self.corrector_z(sim, WHFAST_CORRECTOR_A1*dt, -inv*WHFAST_CORRECTOR_B31*dt);
        self.corrector_z(sim, -WHFAST_CORRECTOR_A1*dt, inv*WHFAST_CORRECTOR_B31*dt);
    }
}

impl Integrator for WHFast {
    fn part1(&mut self, sim: &mut Simulation) {
        sim.ignore_gravity_terms = IgnoreGravityTerms::InnerPair;
        if self.jacobi.len() != sim.particles.len() {
            self.recalculate_jacobi = true;
        }
        if sim.config.whfast.safe_mode || self.recalculate_jacobi {
            if !self.is_synchronized {
                self.synchronize(sim);
            }
            self.from_inertial(sim);
            self.recalculate_jacobi = false;
        }
        let dt = sim.dt;
        let g = sim.config.G;
        if self.is_synchronized {
            self.apply_corrector(sim, 1.);
            self.kepler_steps(g, dt/2.);
            self.com_step(dt/2.);
        } else {
            // Combine the second drift of the previous step with the first of this one
            self.kepler_steps(g, dt);
            self.com_step(dt);
        }
        self.is_synchronized = false;
        self.to_inertial(sim);
        sim.t += dt/2.;
    }

    fn part2(&mut self, sim: &mut Simulation) {
        let dt = sim.dt;
        self.interaction_step(sim, dt);
        if sim.config.whfast.safe_mode {
            self.synchronize(sim);
        }
        sim.t += dt/2.;
        sim.dt_last_done = dt;
    }

    fn synchronize(&mut self, sim: &mut Simulation) {
        if self.is_synchronized {
            return;
        }
        sim.ignore_gravity_terms = IgnoreGravityTerms::InnerPair;
        let dt = sim.dt;
        self.kepler_steps(sim.config.G, dt/2.);
        self.com_step(dt/2.);
        self.apply_corrector(sim, -1.);
        self.to_inertial(sim);
        self.is_synchronized = true;
    }

    fn reset(&mut self) {
        let timestep_warning = self.timestep_warning;
        *self = WHFast::default();
        self.timestep_warning = timestep_warning;
    }
}
