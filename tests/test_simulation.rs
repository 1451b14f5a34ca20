extern crate gravitas;
#[macro_use]
extern crate assert_approx_eq;

mod common;
use gravitas::output::{read_snapshot, write_snapshot};
use gravitas::{Axes, BoundaryKind, BoxGeometry, Error, GravityMode, IntegrationStatus, IntegratorKind, Particle, Simulation, SimulationConfig};

#[test]
fn binary_snapshot_resumes_identically() {
    let mut sim = common::systems::basic_configuration(IntegratorKind::WHFast, 0.01);
    sim.config.whfast.safe_mode = false;
    sim.integrate(1.).unwrap();
    let snapshot_path = common::temporary_path("resume.bin");
    write_snapshot(&snapshot_path, &sim).unwrap();
    let mut restored = read_snapshot(&snapshot_path).unwrap();
    assert_eq!(restored.t, sim.t);
    assert_eq!(restored.particles, sim.particles);
    sim.integrate(2.).unwrap();
    restored.integrate(2.).unwrap();
    assert_eq!(restored.particles, sim.particles);
    let _ = std::fs::remove_file(&snapshot_path);
}

#[test]
fn json_snapshot_keeps_the_configuration() {
    let mut sim = common::systems::basic_configuration(IntegratorKind::Ias15, 0.01);
    sim.config.softening = 1e-4;
    sim.integrate(0.5).unwrap();
    let snapshot_path = common::temporary_path("resume.json");
    write_snapshot(&snapshot_path, &sim).unwrap();
    let restored = read_snapshot(&snapshot_path).unwrap();
    assert_eq!(restored.config.integrator, IntegratorKind::Ias15);
    assert_approx_eq!(restored.config.softening, 1e-4, 1e-18);
    assert_eq!(restored.n_real(), 3);
    for (a, b) in restored.particles.iter().zip(sim.particles.iter()) {
        assert_eq!(a.id, b.id);
        assert_approx_eq!(a.position.x, b.position.x, 1e-14);
        assert_approx_eq!(a.velocity.y, b.velocity.y, 1e-14);
    }
    let _ = std::fs::remove_file(&snapshot_path);
}

#[test]
fn megno_requires_initialization() {
    let sim = common::systems::two_body(IntegratorKind::Ias15, 0.01);
    match sim.megno() {
        Err(Error::MegnoNotInitialized) => {},
        other => panic!("unexpected result {:?}", other),
    }
    assert!(sim.lyapunov().is_err());
}

#[test]
fn megno_of_a_regular_orbit_tends_to_two() {
    let mut sim = common::systems::basic_configuration(IntegratorKind::Ias15, 0.01);
    sim.megno_init(1e-16).unwrap();
    assert_eq!(sim.n_var, 3);
    assert_eq!(sim.particles.len(), 6);
    sim.integrate(500.).unwrap();
    let megno = sim.megno().unwrap();
    assert!((megno - 2.).abs() < 0.3, "MEGNO = {}", megno);
    assert!(sim.lyapunov().unwrap().abs() < 0.01);
}

#[test]
fn whfast_and_ias15_agree_on_megno() {
    let mut ias15 = common::systems::basic_configuration(IntegratorKind::Ias15, 0.01);
    let mut whfast = common::systems::basic_configuration(IntegratorKind::WHFast, 0.01);
    ias15.megno_init(1e-16).unwrap();
    whfast.megno_init(1e-16).unwrap();
    ias15.integrate(100.).unwrap();
    whfast.integrate(100.).unwrap();
    assert_approx_eq!(ias15.megno().unwrap(), whfast.megno().unwrap(), 0.1);
}

#[test]
fn variational_particles_are_rejected_with_periodic_boundaries() {
    let mut config = SimulationConfig::default();
    config.boundary = BoundaryKind::Periodic;
    config.box_geometry = BoxGeometry::new(10., 1, 1, 1);
    let mut sim = Simulation::new(config, common::systems::particle_cloud(4, 10., 0.)).unwrap();
    match sim.megno_init(1e-8) {
        Err(Error::InvalidConfiguration(_)) => {},
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(sim.n_var, 0);
    assert_eq!(sim.particles.len(), 4);
}

#[test]
fn invalid_configurations_are_rejected() {
    let particles = common::systems::particle_cloud(4, 1., 0.);
    let mut config = SimulationConfig::default();
    config.gravity = GravityMode::Tree;
    assert!(Simulation::new(config, particles.clone()).is_err());

    let mut config = SimulationConfig::default();
    config.boundary = BoundaryKind::Shear;
    config.integrator = IntegratorKind::LeapFrog;
    assert!(Simulation::new(config, particles.clone()).is_err());

    let mut config = SimulationConfig::default();
    config.integrator = IntegratorKind::WHFast;
    config.whfast.corrector = 5;
    assert!(Simulation::new(config, particles.clone()).is_err());

    let mut config = SimulationConfig::default();
    config.n_active = Some(7);
    assert!(Simulation::new(config, particles.clone()).is_err());

    let mut config = SimulationConfig::default();
    config.integrator = IntegratorKind::Wh;
    let massless_center = vec![Particle::test_particle(Axes::zero(), Axes::zero()), particles[0]];
    assert!(Simulation::new(config, massless_center).is_err());

    let mut sim = Simulation::new(SimulationConfig::default(), particles).unwrap();
    sim.config.dt = 0.;
    assert!(sim.integrate(1.).is_err());
}

#[test]
fn non_finite_step_is_rolled_back() {
    let mut sim = common::systems::two_body(IntegratorKind::LeapFrog, 0.1);
    sim.hooks.additional_forces = Some(Box::new(|particles: &mut [Particle], t: f64| {
        if t > 0.5 {
            particles[1].acceleration.x = std::f64::NAN;
        }
    }));
    assert_eq!(sim.integrate(10.).unwrap(), IntegrationStatus::StoppedByNonFinite);
    assert!(sim.t < 0.6);
    assert!(sim.t > 0.4);
    assert!(sim.particles.iter().all(|particle| particle.is_finite()));
}

#[test]
fn open_boundary_removes_escaping_particles() {
    let mut config = SimulationConfig::default();
    config.boundary = BoundaryKind::Open;
    config.box_geometry = BoxGeometry::new(4., 1, 1, 1);
    config.integrator = IntegratorKind::LeapFrog;
    config.gravity = GravityMode::None;
    config.dt = 0.1;
    let particles = vec![
        Particle::test_particle(Axes::new(0., 0., 0.), Axes::new(0.1, 0., 0.)),
        Particle::test_particle(Axes::new(1.5, 0., 0.), Axes::new(1., 0., 0.)),
        Particle::test_particle(Axes::new(0., 1., 0.), Axes::new(0., -0.1, 0.)),
    ];
    let mut sim = Simulation::new(config, particles).unwrap();
    sim.integrate(1.).unwrap();
    assert_eq!(sim.n_real(), 2);
    assert_eq!(sim.particles[0].id, 0);
    assert_eq!(sim.particles[1].id, 2);
}

#[test]
fn periodic_images_change_the_force() {
    let mut config = SimulationConfig::default();
    config.boundary = BoundaryKind::Periodic;
    config.box_geometry = BoxGeometry::new(2., 1, 1, 1);
    config.nghostx = 1;
    config.nghosty = 1;
    config.nghostz = 1;
    let particles = vec![
        Particle::new(1., 0., Axes::new(-0.5, 0., 0.), Axes::zero()),
        Particle::new(1., 0., Axes::new(0.5, 0., 0.), Axes::zero()),
    ];
    let mut periodic = Simulation::new(config, particles.clone()).unwrap();
    periodic.update_acceleration();
    let mut open = Simulation::new(SimulationConfig::default(), particles).unwrap();
    open.update_acceleration();

    // The image on the left pulls against the direct neighbour
    assert_approx_eq!(open.particles[0].acceleration.x, 1., 1e-14);
    assert!(periodic.particles[0].acceleration.x > 0.);
    assert!(periodic.particles[0].acceleration.x < 1.);
    assert_approx_eq!(periodic.particles[0].acceleration.y, 0., 1e-14);
    assert_approx_eq!(periodic.particles[0].acceleration.z, 0., 1e-14);
    assert_approx_eq!(periodic.particles[1].acceleration.x, -periodic.particles[0].acceleration.x, 1e-14);
}
