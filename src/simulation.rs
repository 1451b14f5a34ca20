use std::fmt;
use std::mem;
use super::boundary::{self, GhostBox};
use super::collision::{self, CollisionResolver, CollisionStatistics, HardSphere};
use super::config::{BoxGeometry, CollisionMode, GravityMode, IntegratorKind, SimulationConfig};
use super::error::{Error, Result};
use super::gravity::{self, IgnoreGravityTerms};
use super::integrator::IntegratorState;
use super::megno::Megno;
use super::particles::Particle;
use super::tools;
use super::tree::Tree;

/// Velocity dependent or any other extra force, called after gravity with the
/// real particles and the current time. It must add to the accelerations.
pub type AdditionalForces = Box<dyn FnMut(&mut [Particle], f64)>;
/// Called at the end of every step with the real particles and the current time.
pub type PostTimestep = Box<dyn FnMut(&mut [Particle], f64)>;
/// Called after every step of `integrate`.
pub type Heartbeat = Box<dyn FnMut(&mut Simulation)>;

/// User supplied callbacks. They are not part of snapshots.
pub struct Hooks {
    pub additional_forces: Option<AdditionalForces>,
    pub post_timestep: Option<PostTimestep>,
    pub heartbeat: Option<Heartbeat>,
    pub collision_resolver: Box<dyn CollisionResolver>,
}

impl Default for Hooks {
    fn default() -> Hooks {
        Hooks {
            additional_forces: None,
            post_timestep: None,
            heartbeat: None,
            collision_resolver: Box::new(HardSphere::new()),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("additional_forces", &self.additional_forces.is_some())
            .field("post_timestep", &self.post_timestep.is_some())
            .field("heartbeat", &self.heartbeat.is_some())
            .finish()
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum IntegrationStatus {
    StoppedAtTmax,
    StoppedByExitFlag,
    StoppedByNonFinite,     // The offending step was rolled back
}

/// State restored when a step produces non-finite values
struct StepBackup {
    particles: Vec<Particle>,
    t: f64,
    dt: f64,
    dt_last_done: f64,
    n_var: usize,
    n_active: Option<usize>,
    megno: Option<Megno>,
    integrator: IntegratorState, // Internal coordinates matching `particles`
    ignore_gravity_terms: IgnoreGravityTerms,
}

/// Simulation context: the particle array (real particles followed by
/// `n_var` variational particles, the k-th variational particle shadowing the
/// k-th real one), the configuration and the integrator state.
///
/// Any modification of the particle set or of the configuration synchronizes
/// the integrator first and resets it afterwards.
#[derive(Debug, Serialize, Deserialize)]
pub struct Simulation {
    pub t: f64,
    pub dt: f64,                    // Timestep of the next step (may be changed by adaptive integrators)
    pub dt_last_done: f64,          // Timestep actually taken by the last step
    pub config: SimulationConfig,
    pub particles: Vec<Particle>,
    pub n_var: usize,
    pub integrator: IntegratorState,
    pub ignore_gravity_terms: IgnoreGravityTerms,
    pub collision_statistics: CollisionStatistics,
    pub megno: Option<Megno>,
    pub steps_done: u64,
    next_id: usize,
    exit_requested: bool,
    #[serde(skip)]
    pub tree: Option<Tree>,
    #[serde(skip)]
    pub hooks: Hooks,
}

impl Simulation {
    pub fn new(config: SimulationConfig, particles: Vec<Particle>) -> Result<Simulation> {
        config.validate(&particles, 0)?;
        let mut particles = particles;
        for (id, particle) in particles.iter_mut().enumerate() {
            particle.id = id;
        }
        let next_id = particles.len();
        Ok(Simulation {
            t: 0.,
            dt: config.dt,
            dt_last_done: 0.,
            integrator: IntegratorState::new(config.integrator),
            config: config,
            particles: particles,
            n_var: 0,
            ignore_gravity_terms: IgnoreGravityTerms::None,
            collision_statistics: CollisionStatistics::default(),
            megno: None,
            steps_done: 0,
            next_id: next_id,
            exit_requested: false,
            tree: None,
            hooks: Hooks::default(),
        })
    }

    pub fn n_real(&self) -> usize {
        self.particles.len() - self.n_var
    }

    pub fn n_active(&self) -> usize {
        let n_real = self.n_real();
        self.config.n_active.unwrap_or(n_real).min(n_real)
    }

    pub fn ghost_boxes(&self) -> Vec<GhostBox> {
        boundary::ghost_boxes(self.config.boundary, &self.config.box_geometry,
                              self.config.nghostx, self.config.nghosty, self.config.nghostz,
                              self.config.sei.omega, self.t)
    }

    /// Recompute the acceleration of every particle (real and variational)
    /// at the current positions.
    pub fn update_acceleration(&mut self) {
        let n_real = self.n_real();
        let n_active = self.n_active();
        let ghost_boxes = self.ghost_boxes();
        if self.config.gravity == GravityMode::Tree {
            self.tree = Some(Tree::build(&self.config.box_geometry, &mut self.particles, n_real, n_active));
        }
        gravity::calculate_accelerations(&self.config, &mut self.particles, n_real, n_active,
                                         &ghost_boxes, self.tree.as_ref(), self.ignore_gravity_terms);
        gravity::calculate_variational_accelerations(&self.config, &mut self.particles, n_real, n_active,
                                                     self.ignore_gravity_terms);
        if let Some(additional_forces) = self.hooks.additional_forces.as_mut() {
            additional_forces(&mut self.particles[..n_real], self.t);
        }
    }

    /// Advance by one timestep. Returns `Some` when the integration must stop.
    pub fn step(&mut self) -> Option<IntegrationStatus> {
        let backup = StepBackup {
            particles: self.particles.clone(),
            t: self.t,
            dt: self.dt,
            dt_last_done: self.dt_last_done,
            n_var: self.n_var,
            n_active: self.config.n_active,
            megno: self.megno,
            integrator: self.integrator.clone(),
            ignore_gravity_terms: self.ignore_gravity_terms,
        };

        let mut integrator = mem::take(&mut self.integrator);
        if let Some(stepper) = integrator.as_integrator_mut() {
            stepper.part1(self);
            self.update_acceleration();
            stepper.part2(self);
        }
        self.integrator = integrator;
        self.steps_done += 1;

        let n_real = self.n_real();
        if let Some(post_timestep) = self.hooks.post_timestep.as_mut() {
            post_timestep(&mut self.particles[..n_real], self.t);
        }

        self.apply_boundaries();
        self.search_and_resolve_collisions();
        self.update_megno();

        if !self.t.is_finite() || !self.particles.iter().all(|particle| particle.is_finite()) {
            warn!("Non-finite values after the step at t = {:e}, restoring the previous state", backup.t);
            self.particles = backup.particles;
            self.t = backup.t;
            self.dt = backup.dt;
            self.dt_last_done = backup.dt_last_done;
            self.n_var = backup.n_var;
            self.config.n_active = backup.n_active;
            self.megno = backup.megno;
            self.integrator = backup.integrator;
            self.ignore_gravity_terms = backup.ignore_gravity_terms;
            return Some(IntegrationStatus::StoppedByNonFinite);
        }
        if self.exit_requested {
            return Some(IntegrationStatus::StoppedByExitFlag);
        }
        None
    }

    /// Integrate until `tmax` (forever if `tmax` is 0). With exact finish
    /// enabled, the last step is shortened so that the final time is exactly
    /// `tmax` and the nominal timestep is restored afterwards. Without it, the
    /// integration stops at the first step ending at or after `tmax`.
    pub fn integrate(&mut self, tmax: f64) -> Result<IntegrationStatus> {
        self.config.validate(&self.particles, self.n_var)?;
        self.exit_requested = false;
        let run_forever = tmax == 0.;
        let direction = if self.dt < 0. { -1. } else { 1. };
        let mut nominal_dt: Option<f64> = None;

        let status = loop {
            if !run_forever && (self.t - tmax)*direction >= 0. {
                break IntegrationStatus::StoppedAtTmax;
            }
            if self.exit_requested {
                break IntegrationStatus::StoppedByExitFlag;
            }
            let mut finishing = false;
            if self.config.exact_finish_time && !run_forever && (self.t + self.dt - tmax)*direction >= 0. {
                // Shortening the step of an unsynchronized integrator would break its state
                self.synchronize();
                if nominal_dt.is_none() {
                    nominal_dt = Some(self.dt);
                }
                self.dt = tmax - self.t;
                finishing = true;
            }
            let requested_dt = self.dt;
            let stop = self.step();
            self.call_heartbeat();
            if let Some(stop) = stop {
                break stop;
            }
            if finishing && self.dt_last_done == requested_dt {
                self.t = tmax;
            }
        };

        self.synchronize();
        if let Some(dt) = nominal_dt {
            self.dt = dt;
        }
        debug!("Integration stopped at t = {:e} after {} steps: {:?}", self.t, self.steps_done, status);
        Ok(status)
    }

    fn call_heartbeat(&mut self) {
        if let Some(mut heartbeat) = self.hooks.heartbeat.take() {
            heartbeat(self);
            if self.hooks.heartbeat.is_none() {
                self.hooks.heartbeat = Some(heartbeat);
            }
        }
    }

    fn apply_boundaries(&mut self) {
        let n_real = self.n_real();
        let escaped = boundary::check_boundaries(self.config.boundary, &self.config.box_geometry,
                                                 &mut self.particles[..n_real], self.config.sei.omega, self.t);
        if escaped.is_empty() {
            return;
        }
        self.synchronize();
        for &index in escaped.iter().rev() {
            info!("Particle {} left the simulation box at t = {:e} and was removed", self.particles[index].id, self.t);
            self.remove_unchecked(index);
        }
        self.reset_integrator_state();
    }

    fn search_and_resolve_collisions(&mut self) {
        let n_real = self.n_real();
        if self.config.collision == CollisionMode::None {
            return;
        }
        // Detection needs positions and velocities at the same time
        self.synchronize();
        let collision_boxes = boundary::collision_ghost_boxes(self.config.boundary, &self.config.box_geometry,
                                                              self.config.nghostx, self.config.nghosty, self.config.nghostz,
                                                              self.config.sei.omega, self.t);
        let collisions = match self.config.collision {
            CollisionMode::None => Vec::new(),
            CollisionMode::Direct => collision::detect_direct(&self.particles, n_real, &collision_boxes, self.t),
            CollisionMode::Tree => {
                // Particles moved since the force evaluation
                let n_active = self.n_active();
                let tree = Tree::build(&self.config.box_geometry, &mut self.particles, n_real, n_active);
                let collisions = collision::detect_tree(&self.particles, n_real, &collision_boxes, &tree, self.t);
                self.tree = Some(tree);
                collisions
            },
        };
        if collisions.is_empty() {
            return;
        }

        let summary = collision::resolve_collisions(&collisions, &mut self.particles[..n_real],
                                                    self.hooks.collision_resolver.as_mut(),
                                                    self.config.minimum_collision_velocity,
                                                    &mut self.collision_statistics);
        for &index in summary.removed.iter().rev() {
            debug!("Particle {} merged at t = {:e}", self.particles[index].id, self.t);
            self.remove_unchecked(index);
        }
        self.reset_integrator_state();
        if summary.halt {
            info!("Collision at t = {:e} requested the end of the integration", self.t);
            self.exit_requested = true;
        }
    }

    fn update_megno(&mut self) {
        let mut megno = match self.megno {
            Some(megno) => megno,
            None => return,
        };
        self.synchronize();
        // Shadow accelerations must include every term at the synchronized positions
        self.ignore_gravity_terms = IgnoreGravityTerms::None;
        self.update_acceleration();
        let n_real = self.n_real();
        megno.update(&self.particles[n_real..], self.t, self.dt_last_done);
        if megno.renormalize(&mut self.particles[n_real..]) {
            self.reset_integrator_state();
        }
        self.megno = Some(megno);
    }

    /// Write back physical coordinates if the integrator keeps an internal state
    pub fn synchronize(&mut self) {
        let mut integrator = mem::take(&mut self.integrator);
        if let Some(stepper) = integrator.as_integrator_mut() {
            stepper.synchronize(self);
        }
        self.integrator = integrator;
    }

    pub fn reset_integrator_state(&mut self) {
        if let Some(stepper) = self.integrator.as_integrator_mut() {
            stepper.reset();
        }
    }

    pub fn set_integrator(&mut self, kind: IntegratorKind) -> Result<()> {
        let mut config = self.config.clone();
        config.integrator = kind;
        config.validate(&self.particles, self.n_var)?;
        self.synchronize();
        self.config = config;
        self.integrator = IntegratorState::new(kind);
        Ok(())
    }

    /// Replace the configuration. The timestep is reset to `config.dt`.
    pub fn set_config(&mut self, config: SimulationConfig) -> Result<()> {
        config.validate(&self.particles, self.n_var)?;
        self.synchronize();
        let integrator_changed = config.integrator != self.config.integrator;
        self.dt = config.dt;
        self.config = config;
        if integrator_changed {
            self.integrator = IntegratorState::new(self.config.integrator);
        } else {
            self.reset_integrator_state();
        }
        Ok(())
    }

    pub fn configure_box(&mut self, root_size: f64, root_nx: usize, root_ny: usize, root_nz: usize) -> Result<()> {
        let geometry = BoxGeometry::new(root_size, root_nx, root_ny, root_nz);
        geometry.validate()?;
        self.synchronize();
        self.config.box_geometry = geometry;
        self.reset_integrator_state();
        Ok(())
    }

    /// Append a real particle and return its id
    pub fn add_particle(&mut self, particle: Particle) -> Result<usize> {
        if self.n_var > 0 {
            return Err(Error::InvalidConfiguration("particles cannot be added while variational particles are tracked".to_string()));
        }
        if !particle.is_finite() || particle.mass < 0. || particle.radius < 0. {
            return Err(Error::InvalidConfiguration(format!("invalid particle (mass {}, radius {})", particle.mass, particle.radius)));
        }
        self.synchronize();
        let mut particle = particle;
        particle.id = self.next_id;
        self.next_id += 1;
        self.particles.push(particle);
        self.reset_integrator_state();
        Ok(particle.id)
    }

    /// Remove the real particle at `index` together with its variational
    /// shadow. Without `keep_sorted` the last particle takes its place (only
    /// possible when there are no variational particles).
    pub fn remove_particle(&mut self, index: usize, keep_sorted: bool) -> Result<Particle> {
        if index >= self.n_real() {
            return Err(Error::ParticleNotFound(format!("index {} (there are {} particles)", index, self.n_real())));
        }
        self.synchronize();
        let removed = if keep_sorted || self.n_var > 0 {
            self.remove_unchecked(index)
        } else {
            if let Some(n_active) = self.config.n_active.as_mut() {
                if index < *n_active {
                    *n_active -= 1;
                }
            }
            self.particles.swap_remove(index)
        };
        self.reset_integrator_state();
        Ok(removed)
    }

    pub fn remove_particle_by_id(&mut self, id: usize, keep_sorted: bool) -> Result<Particle> {
        match self.particle_index_by_id(id) {
            Some(index) => self.remove_particle(index, keep_sorted),
            None => Err(Error::ParticleNotFound(format!("id {}", id))),
        }
    }

    pub fn particle_index_by_id(&self, id: usize) -> Option<usize> {
        self.particles[..self.n_real()].iter().position(|particle| particle.id == id)
    }

    fn remove_unchecked(&mut self, index: usize) -> Particle {
        let n_real = self.n_real();
        if self.n_var > 0 && n_real + index < self.particles.len() {
            self.particles.remove(n_real + index);
            self.n_var -= 1;
        }
        if let Some(n_active) = self.config.n_active.as_mut() {
            if index < *n_active {
                *n_active -= 1;
            }
        }
        self.particles.remove(index)
    }

    /// True if an output with period `interval` is due after the last step
    pub fn output_check(&self, interval: f64) -> bool {
        if self.t == 0. || interval <= 0. {
            return true;
        }
        (self.t/interval).floor() != ((self.t - self.dt_last_done)/interval).floor()
    }

    /// Stop `integrate` after the current step
    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn move_to_center_of_mass(&mut self) {
        self.synchronize();
        let n_real = self.n_real();
        tools::move_to_center_of_mass(&mut self.particles[..n_real]);
        self.reset_integrator_state();
    }

    /// Add one variational particle per real particle, displaced by `delta`,
    /// and start tracking MEGNO. Previous variational particles are dropped.
    pub fn megno_init(&mut self, delta: f64) -> Result<()> {
        if !(delta.is_finite() && delta > 0.) {
            return Err(Error::InvalidConfiguration(format!("MEGNO displacement must be positive (got {})", delta)));
        }
        self.synchronize();
        let n_real = self.n_real();
        let mut particles = self.particles[..n_real].to_vec();
        particles.extend(Megno::initial_displacements(&self.particles[..n_real], delta));
        self.config.validate(&particles, n_real)?;
        self.particles = particles;
        self.n_var = n_real;
        self.megno = Some(Megno::new(delta));
        self.reset_integrator_state();
        Ok(())
    }

    pub fn megno(&self) -> Result<f64> {
        self.megno.map(|megno| megno.megno(self.t)).ok_or(Error::MegnoNotInitialized)
    }

    pub fn lyapunov(&self) -> Result<f64> {
        self.megno.map(|megno| megno.lyapunov()).ok_or(Error::MegnoNotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::particles::Axes;

    fn two_bodies(integrator: IntegratorKind) -> Simulation {
        let mut config = SimulationConfig::default();
        config.integrator = integrator;
        config.dt = 0.01;
        let particles = vec![
            Particle::new(1., 0., Axes::zero(), Axes::zero()),
            Particle::new(1e-3, 0., Axes::new(1., 0., 0.), Axes::new(0., 1., 0.)),
        ];
        Simulation::new(config, particles).unwrap()
    }

    #[test]
    fn ids_are_assigned_in_order() {
        let mut sim = two_bodies(IntegratorKind::LeapFrog);
        assert_eq!(sim.particles[1].id, 1);
        let id = sim.add_particle(Particle::test_particle(Axes::new(3., 0., 0.), Axes::zero())).unwrap();
        assert_eq!(id, 2);
        sim.remove_particle(1, true).unwrap();
        assert_eq!(sim.particle_index_by_id(2), Some(1));
        assert!(sim.particle_index_by_id(1).is_none());
        match sim.remove_particle_by_id(7, true) {
            Err(Error::ParticleNotFound(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn removal_keeps_variational_particles_aligned() {
        let mut sim = two_bodies(IntegratorKind::Ias15);
        sim.add_particle(Particle::new(1e-4, 0., Axes::new(2., 0., 0.), Axes::new(0., 0.7, 0.))).unwrap();
        sim.megno_init(1e-8).unwrap();
        assert_eq!(sim.n_var, 3);
        sim.remove_particle(1, false).unwrap();
        assert_eq!(sim.n_var, 2);
        assert_eq!(sim.n_real(), 2);
        assert_eq!(sim.particles[2].id, sim.particles[0].id);
        assert_eq!(sim.particles[3].id, sim.particles[1].id);
    }

    #[test]
    fn adding_particles_with_variational_particles_is_rejected() {
        let mut sim = two_bodies(IntegratorKind::Ias15);
        sim.megno_init(1e-8).unwrap();
        assert!(sim.add_particle(Particle::default()).is_err());
    }

    #[test]
    fn output_check_fires_once_per_interval() {
        let mut sim = two_bodies(IntegratorKind::LeapFrog);
        assert!(sim.output_check(0.05));
        let mut outputs = 0;
        for _ in 0..22 {
            sim.step();
            if sim.output_check(0.05) {
                outputs += 1;
            }
        }
        assert_eq!(outputs, 4);
    }

    #[test]
    fn heartbeat_can_stop_the_integration() {
        let mut sim = two_bodies(IntegratorKind::LeapFrog);
        sim.hooks.heartbeat = Some(Box::new(|sim: &mut Simulation| {
            if sim.steps_done == 5 {
                sim.request_exit();
            }
        }));
        assert_eq!(sim.integrate(10.).unwrap(), IntegrationStatus::StoppedByExitFlag);
        assert_eq!(sim.steps_done, 5);
    }

    #[test]
    fn additional_forces_are_applied() {
        let mut config = SimulationConfig::default();
        config.integrator = IntegratorKind::LeapFrog;
        config.gravity = GravityMode::None;
        config.dt = 0.1;
        let mut sim = Simulation::new(config, vec![Particle::test_particle(Axes::zero(), Axes::zero())]).unwrap();
        sim.hooks.additional_forces = Some(Box::new(|particles: &mut [Particle], _t: f64| {
            for particle in particles.iter_mut() {
                particle.acceleration += Axes::new(0., 0., -1.);
            }
        }));
        for _ in 0..10 {
            sim.step();
        }
        assert_approx_eq!(sim.particles[0].velocity.z, -1., 1e-14);
        assert_approx_eq!(sim.particles[0].position.z, -0.5, 1e-14);
    }

    #[test]
    fn switching_integrator_keeps_the_state() {
        let mut sim = two_bodies(IntegratorKind::WHFast);
        sim.config.whfast.safe_mode = false;
        for _ in 0..10 {
            sim.step();
        }
        sim.set_integrator(IntegratorKind::Ias15).unwrap();
        assert_eq!(sim.integrator.kind(), Some(IntegratorKind::Ias15));
        assert_approx_eq!(sim.t, 0.1, 1e-14);
        assert!(sim.set_integrator(IntegratorKind::Sei).is_ok());
    }

    #[test]
    fn resizing_the_box_synchronizes_first() {
        let mut sim = two_bodies(IntegratorKind::WHFast);
        let mut reference = two_bodies(IntegratorKind::WHFast);
        sim.config.whfast.safe_mode = false;
        reference.config.whfast.safe_mode = false;
        for _ in 0..10 {
            sim.step();
            reference.step();
        }
        sim.configure_box(20., 1, 1, 1).unwrap();
        reference.synchronize();
        assert_eq!(sim.particles, reference.particles);
    }
}
