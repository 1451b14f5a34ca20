extern crate gravitas;

#[macro_use]
extern crate criterion;

use criterion::Criterion;
use gravitas::tools::particle_from_orbital_elements;
use gravitas::{Axes, BoundaryKind, BoxGeometry, GravityMode, IntegratorKind, Particle, Simulation, SimulationConfig};

fn create_planetary_system(integrator: IntegratorKind) -> Simulation {
    let mut config = SimulationConfig::default();
    config.integrator = integrator;
    config.dt = 0.01;
    let star = Particle::new(1., 0.005, Axes::zero(), Axes::zero());
    let mut particles = vec![star];
    for i in 0..8 {
        let f = i as f64;
        let planet = particle_from_orbital_elements(config.G, &star, 1e-5*(1. + f), 1. + 0.6*f, 0.02*f, 0.01*f, 0.7*f, 1.3*f, 2.1*f);
        if let Ok(planet) = planet {
            particles.push(planet);
        }
    }
    let mut sim = Simulation::new(config, particles).unwrap();
    sim.move_to_center_of_mass();
    sim
}

fn create_particle_box(gravity: GravityMode, n: usize) -> Simulation {
    let mut config = SimulationConfig::default();
    config.integrator = IntegratorKind::LeapFrog;
    config.gravity = gravity;
    config.boundary = BoundaryKind::Periodic;
    config.box_geometry = BoxGeometry::new(1., 1, 1, 1);
    config.softening = 1e-3;
    let particles = (0..n).map(|i| {
        let f = (i + 1) as f64;
        Particle::new(1./(n as f64), 0., Axes::new((f*0.618033988749895) % 1. - 0.5, (f*0.414213562373095) % 1. - 0.5, (f*0.732050807568877) % 1. - 0.5), Axes::zero())
    }).collect();
    Simulation::new(config, particles).unwrap()
}

fn criterion_benchmark_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    for integrator in [IntegratorKind::Ias15, IntegratorKind::WHFast, IntegratorKind::Wh, IntegratorKind::LeapFrog].iter() {
        let mut sim = create_planetary_system(*integrator);
        group.bench_function(format!("{:?}", integrator), |b| b.iter(|| sim.step()));
    }
    let mut sim = create_planetary_system(IntegratorKind::WHFast);
    sim.megno_init(1e-16).unwrap();
    group.bench_function("WHFast+MEGNO", |b| b.iter(|| sim.step()));
    group.finish();

    let mut group = c.benchmark_group("update_acceleration");
    for gravity in [GravityMode::Basic, GravityMode::Compensated, GravityMode::Tree].iter() {
        let mut sim = create_particle_box(*gravity, 1000);
        group.bench_function(format!("{:?}", gravity), |b| b.iter(|| sim.update_acceleration()));
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark_simulation);
criterion_main!(benches);
