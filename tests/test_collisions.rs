extern crate gravitas;
#[macro_use]
extern crate assert_approx_eq;

mod common;
use gravitas::boundary::collision_ghost_boxes;
use gravitas::collision::{detect_direct, detect_tree};
use gravitas::tree::Tree;
use gravitas::{Axes, BoundaryKind, BoxGeometry, CollisionMode, GravityMode, HaltResolver, IntegrationStatus, IntegratorKind,
               MergeResolver, Particle, Simulation, SimulationConfig};

fn head_on_config() -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.integrator = IntegratorKind::LeapFrog;
    config.gravity = GravityMode::None;
    config.collision = CollisionMode::Direct;
    config.dt = 0.01;
    config
}

fn head_on_pair() -> Vec<Particle> {
    vec![
        Particle::new(2., 0.1, Axes::new(-1., 0., 0.), Axes::new(1., 0.2, 0.)),
        Particle::new(1., 0.1, Axes::new(1., 0., 0.), Axes::new(-1., 0., 0.)),
    ]
}

#[test]
fn merging_conserves_mass_and_momentum() {
    let mut sim = Simulation::new(head_on_config(), head_on_pair()).unwrap();
    sim.hooks.collision_resolver = Box::new(MergeResolver);
    sim.integrate(2.).unwrap();
    assert_eq!(sim.n_real(), 1);
    let merged = sim.particles[0];
    assert_eq!(merged.id, 0);
    assert_eq!(merged.mass, 3.);
    assert_approx_eq!(merged.velocity.x, 1./3., 1e-14);
    assert_approx_eq!(merged.velocity.y, 0.4/3., 1e-14);
    assert_approx_eq!(merged.radius, 0.1*(2f64).cbrt(), 1e-14);
    assert!(merged.last_collision > 0.8 && merged.last_collision < 1.);
}

#[test]
fn halt_resolver_stops_the_integration() {
    let mut sim = Simulation::new(head_on_config(), head_on_pair()).unwrap();
    sim.hooks.collision_resolver = Box::new(HaltResolver);
    assert_eq!(sim.integrate(2.).unwrap(), IntegrationStatus::StoppedByExitFlag);
    assert!(sim.t < 1.);
    assert_eq!(sim.n_real(), 2);
}

#[test]
fn custom_resolver_closure() {
    let mut sim = Simulation::new(head_on_config(), head_on_pair()).unwrap();
    sim.hooks.collision_resolver = Box::new(|collision: &gravitas::collision::Collision, particles: &mut [Particle]| {
        // Stick together without merging
        let p1 = particles[collision.p1];
        let p2 = particles[collision.p2];
        let velocity = (p1.velocity * p1.mass + p2.velocity * p2.mass) * (1./(p1.mass + p2.mass));
        particles[collision.p1].velocity = velocity;
        particles[collision.p2].velocity = velocity;
        gravitas::CollisionOutcome::Bounce
    });
    sim.integrate(2.).unwrap();
    assert_eq!(sim.n_real(), 2);
    assert_approx_eq!(sim.particles[0].velocity.x, sim.particles[1].velocity.x, 1e-14);
}

#[test]
fn elastic_bounces_in_a_periodic_box_conserve_momentum_and_energy() {
    let mut config = SimulationConfig::default();
    config.integrator = IntegratorKind::LeapFrog;
    config.gravity = GravityMode::None;
    config.boundary = BoundaryKind::Periodic;
    config.collision = CollisionMode::Direct;
    config.box_geometry = BoxGeometry::new(1., 1, 1, 1);
    config.nghostx = 1;
    config.nghosty = 1;
    config.dt = 1e-3;
    let mut sim = Simulation::new(config, common::systems::particle_cloud(60, 1., 0.02)).unwrap();
    let momentum = |sim: &Simulation| sim.particles.iter().fold(Axes::zero(), |sum, p| sum + p.velocity * p.mass);
    let kinetic = |sim: &Simulation| sim.particles.iter().map(|p| 0.5*p.mass*p.velocity.norm2()).sum::<f64>();
    let initial_momentum = momentum(&sim);
    let initial_kinetic = kinetic(&sim);
    sim.integrate(1.).unwrap();
    assert!(sim.collision_statistics.count > 0);
    assert_eq!(sim.n_real(), 60);
    assert!((momentum(&sim) - initial_momentum).norm() < 1e-15);
    assert_approx_eq!(kinetic(&sim), initial_kinetic, 1e-15);
    for particle in sim.particles.iter() {
        assert!(gravitas::boundary::is_in_box(&sim.config.box_geometry, &particle.position));
    }
}

#[test]
fn tree_and_direct_searches_find_the_same_pairs() {
    let geometry = BoxGeometry::new(1., 1, 1, 1);
    let mut particles = common::systems::particle_cloud(300, 1., 0.03);
    let n = particles.len();
    let ghost_boxes = collision_ghost_boxes(BoundaryKind::Periodic, &geometry, 1, 1, 0, 0., 0.);
    let tree = Tree::build(&geometry, &mut particles, n, n);
    let pairs = |collisions: Vec<gravitas::collision::Collision>| collisions.iter().map(|c| (c.p1, c.p2)).collect::<Vec<_>>();
    let direct = pairs(detect_direct(&particles, n, &ghost_boxes, 0.));
    let with_tree = pairs(detect_tree(&particles, n, &ghost_boxes, &tree, 0.));
    assert!(!direct.is_empty());
    assert_eq!(direct, with_tree);
}

#[test]
fn collision_search_sees_synchronized_particles() {
    let mut sim = common::systems::basic_configuration(IntegratorKind::WHFast, 0.01);
    sim.config.whfast.safe_mode = false;
    sim.config.collision = CollisionMode::Direct;
    for _ in 0..10 {
        assert!(sim.step().is_none());
        let detected_on = sim.particles.clone();
        sim.synchronize();
        assert_eq!(detected_on, sim.particles);
    }
    assert_eq!(sim.collision_statistics.count, 0);
}
