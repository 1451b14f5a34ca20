use super::Integrator;
use super::super::gravity::IgnoreGravityTerms;
use super::super::particles::Particle;
use super::super::simulation::Simulation;

/// Symplectic Epicycle Integrator (Rein & Tremaine 2011) for particles in a
/// shearing sheet (Hill's approximation). The epicyclic motion (and the
/// vertical oscillation) is solved exactly, so self-gravity and collisions are
/// the only terms treated as a kick.
///
/// Rotations are implemented as three shear operators to avoid round-off errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Sei {
    last_dt: f64,           // Cached trigonometric terms were computed for this timestep
    last_omega: f64,
    last_omega_z: f64,
    sindt: f64,             // sin(omega*(-dt/2))
    tandt: f64,             // tan(omega*(-dt/4))
    sindtz: f64,
    tandtz: f64,
}

impl Sei {
    pub fn new() -> Sei {
        Sei::default()
    }

    fn update_trigonometry(&mut self, omega: f64, omega_z: f64, dt: f64) {
        if self.last_dt == dt && self.last_omega == omega && self.last_omega_z == omega_z {
            return;
        }
        self.sindt = (omega*(-dt/2.)).sin();
        self.tandt = (omega*(-dt/4.)).tan();
        self.sindtz = (omega_z*(-dt/2.)).sin();
        self.tandtz = (omega_z*(-dt/4.)).tan();
        self.last_dt = dt;
        self.last_omega = omega;
        self.last_omega_z = omega_z;
    }

    /// Exact epicyclic and vertical motion over half a timestep
    fn operator_h012(&self, dt: f64, particle: &mut Particle) {
        let omega = self.last_omega;
        let omega_z = self.last_omega_z;

        // Vertical motion
        let zx = particle.position.z * omega_z;
        let zy = particle.velocity.z;
        let zt1 = zx - self.tandtz*zy;
        let zyt = self.sindtz*zt1 + zy;
        let zxt = zt1 - self.tandtz*zyt;
        particle.position.z = zxt/omega_z;
        particle.velocity.z = zyt;

        // Motion in the xy plane
        let a_o = 2.*particle.velocity.y + 4.*particle.position.x*omega;   // Center of epicyclic motion
        let b_o = particle.position.y*omega - 2.*particle.velocity.x;
        let ys = (particle.position.y*omega - b_o)/2.;                     // Epicycle vector
        let xs = particle.position.x*omega - a_o;
        let xst1 = xs - self.tandt*ys;
        let yst = self.sindt*xst1 + ys;
        let xst = xst1 - self.tandt*yst;
        particle.position.x = (xst + a_o)/omega;
        particle.position.y = (yst*2. + b_o)/omega - 3./4.*a_o*dt;
        particle.velocity.x = yst;
        particle.velocity.y = -xst*2. - 3./2.*a_o;
    }
}

impl Integrator for Sei {
    fn part1(&mut self, sim: &mut Simulation) {
        sim.ignore_gravity_terms = IgnoreGravityTerms::None;
        let dt = sim.dt;
        self.update_trigonometry(sim.config.sei.omega, sim.config.sei.vertical_frequency(), dt);
        for particle in sim.particles.iter_mut() {
            self.operator_h012(dt, particle);
        }
        sim.t += dt/2.;
    }

    fn part2(&mut self, sim: &mut Simulation) {
        let dt = sim.dt;
        for particle in sim.particles.iter_mut() {
            particle.velocity += particle.acceleration * dt;
            self.operator_h012(dt, particle);
        }
        sim.t += dt/2.;
        sim.dt_last_done = dt;
    }

    fn synchronize(&mut self, _sim: &mut Simulation) {}

    fn reset(&mut self) {
        *self = Sei::default();
    }
}
