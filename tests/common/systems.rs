use gravitas::tools::particle_from_orbital_elements;
use gravitas::{Axes, IntegratorKind, Particle, Simulation, SimulationConfig};

pub fn star() -> Particle {
    Particle::new(1., 0.005, Axes::zero(), Axes::zero())
}

/// Star with a planet on a circular orbit at unit distance
pub fn two_body(integrator: IntegratorKind, time_step: f64) -> Simulation {
    let mut config = SimulationConfig::default();
    config.integrator = integrator;
    config.dt = time_step;
    let star = star();
    let planet = particle_from_orbital_elements(config.G, &star, 1e-3, 1., 0., 0., 0., 0., 0.).unwrap();
    let mut sim = Simulation::new(config, vec![star, planet]).unwrap();
    sim.move_to_center_of_mass();
    sim
}

/// Star with an eccentric planet and an outer companion, well separated
pub fn basic_configuration(integrator: IntegratorKind, time_step: f64) -> Simulation {
    let mut config = SimulationConfig::default();
    config.integrator = integrator;
    config.dt = time_step;
    let star = star();
    let inner = particle_from_orbital_elements(config.G, &star, 1e-3, 1., 0.1, 0.02, 0.3, 1.2, 0.).unwrap();
    let outer = particle_from_orbital_elements(config.G, &star, 3e-4, 2.2, 0.05, 0.04, 2.1, 0.4, 2.5).unwrap();
    let mut sim = Simulation::new(config, vec![star, inner, outer]).unwrap();
    sim.move_to_center_of_mass();
    sim
}

/// Equal mass particles spread over the box centered at the origin, with
/// small random-looking velocities
pub fn particle_cloud(n: usize, box_size: f64, radius: f64) -> Vec<Particle> {
    (0..n).map(|i| {
        let f = (i + 1) as f64;
        let position = Axes::new(
            ((f*0.618033988749895) % 1. - 0.5)*box_size,
            ((f*0.414213562373095) % 1. - 0.5)*box_size,
            ((f*0.732050807568877) % 1. - 0.5)*box_size*0.2,
        );
        let velocity = Axes::new((f*0.381966011250105) % 1. - 0.5, (f*0.236067977499790) % 1. - 0.5, 0.);
        Particle::new(1e-6, radius, position, velocity)
    }).collect()
}
