use super::Integrator;
use super::ias15::Ias15;
use super::whfast::WHFast;
use super::super::simulation::Simulation;

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum HybridMode {
    Symplectic,     // WHFast
    HighAccuracy,   // IAS15
}

/// Switches between WHFast and IAS15 depending on the closest encounter
/// between two non-central bodies, measured in units of their mutual Hill
/// radius with respect to the central body at index 0. The whole system is
/// handed to IAS15 while any pair is closer than `switch_ratio`, and back to
/// WHFast once every pair is farther than `switch_ratio * hysteresis`.
///
/// IAS15 adapts the timestep during the encounter, the symplectic timestep is
/// restored when switching back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hybrid {
    whfast: WHFast,
    ias15: Ias15,
    mode: HybridMode,
    mode_selected: bool,
    symplectic_dt: Option<f64>, // Nominal timestep saved while IAS15 is in charge
    switches: usize,
}

impl Default for Hybrid {
    fn default() -> Hybrid {
        Hybrid {
            whfast: WHFast::new(),
            ias15: Ias15::new(),
            mode: HybridMode::Symplectic,
            mode_selected: false,
            symplectic_dt: None,
            switches: 0,
        }
    }
}

impl Hybrid {
    pub fn new() -> Hybrid {
        Hybrid::default()
    }

    pub fn mode(&self) -> HybridMode {
        self.mode
    }

    /// Number of integrator switches since the beginning
    pub fn switches(&self) -> usize {
        self.switches
    }

    /// Minimum over every pair of the squared separation divided by the squared
    /// sum of Hill radii. Infinite when there is no pair to compare.
    pub fn minimum_hill_ratio(sim: &Simulation) -> f64 {
        let n_real = sim.n_real();
        let n_active = sim.n_active();
        let central = match sim.particles.first() {
            Some(central) => *central,
            None => return std::f64::INFINITY,
        };
        let hill_radius = |i: usize| {
            let particle = &sim.particles[i];
            let m = particle.mass/(3.*central.mass);
            let r02 = (particle.position - central.position).norm2();
            (m*m*r02*r02*r02).powf(1./6.)
        };
        let mut min_ratio = std::f64::INFINITY;
        for i in 1..n_active {
            let rhi = hill_radius(i);
            for j in (i+1)..n_real {
                let rh_sum = rhi + hill_radius(j);
                let rh_sum2 = rh_sum*rh_sum;
                if rh_sum2 == 0. {
                    continue;
                }
                let rij2 = (sim.particles[i].position - sim.particles[j].position).norm2();
                let ratio = rij2/rh_sum2;
                if ratio < min_ratio {
                    min_ratio = ratio;
                }
            }
        }
        min_ratio
    }

    fn select_mode(&mut self, sim: &mut Simulation) {
        self.mode_selected = true;
        let ratio = Hybrid::minimum_hill_ratio(sim);
        let switch_ratio = sim.config.hybrid.switch_ratio;
        let release_ratio = switch_ratio*sim.config.hybrid.hysteresis;
        match self.mode {
            HybridMode::Symplectic if ratio < switch_ratio*switch_ratio => {
                self.whfast.synchronize(sim);
                self.ias15.reset();
                self.symplectic_dt = Some(sim.dt);
                self.mode = HybridMode::HighAccuracy;
                self.switches += 1;
                info!("Close encounter at t = {:e} (separation {:.3} mutual Hill radii): switching to IAS15", sim.t, ratio.sqrt());
            },
            HybridMode::HighAccuracy if ratio > release_ratio*release_ratio => {
                if let Some(dt) = self.symplectic_dt.take() {
                    sim.dt = dt;
                }
                self.whfast.reset();
                self.mode = HybridMode::Symplectic;
                self.switches += 1;
                info!("Encounter finished at t = {:e} (separation {:.3} mutual Hill radii): switching to WHFast", sim.t, ratio.sqrt());
            },
            _ => {},
        }
    }
}

impl Integrator for Hybrid {
    fn part1(&mut self, sim: &mut Simulation) {
        if !self.mode_selected {
            self.select_mode(sim);
        }
        match self.mode {
            HybridMode::Symplectic => self.whfast.part1(sim),
            HybridMode::HighAccuracy => self.ias15.part1(sim),
        }
    }

    fn part2(&mut self, sim: &mut Simulation) {
        match self.mode {
            HybridMode::Symplectic => self.whfast.part2(sim),
            HybridMode::HighAccuracy => self.ias15.part2(sim),
        }
        // Decided after the step so that the next timestep is known in advance
        self.select_mode(sim);
    }

    fn synchronize(&mut self, sim: &mut Simulation) {
        if self.mode == HybridMode::Symplectic {
            self.whfast.synchronize(sim);
        }
    }

    fn reset(&mut self) {
        self.whfast.reset();
        self.ias15.reset();
        self.mode_selected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::config::{IntegratorKind, SimulationConfig};
    use super::super::super::particles::{Axes, Particle};

    fn simulation(planets: Vec<Particle>) -> Simulation {
        let mut config = SimulationConfig::default();
        config.integrator = IntegratorKind::Hybrid;
        config.dt = 0.01;
        let mut particles = vec![Particle::new(1., 0., Axes::zero(), Axes::zero())];
        particles.extend(planets);
        Simulation::new(config, particles).unwrap()
    }

    #[test]
    fn hill_ratio_of_two_planets() {
        let sim = simulation(vec![
            Particle::new(3e-3, 0., Axes::new(1., 0., 0.), Axes::new(0., 1., 0.)),
            Particle::new(3e-3, 0., Axes::new(1.5, 0., 0.), Axes::new(0., 0.8, 0.)),
        ]);
        // Hill radii 0.1 and 0.15
        assert_approx_eq!(Hybrid::minimum_hill_ratio(&sim), 0.25/0.0625, 1e-12);
    }

    #[test]
    fn widely_separated_planets_stay_symplectic() {
        let mut sim = simulation(vec![
            Particle::new(1e-5, 0., Axes::new(1., 0., 0.), Axes::new(0., 1., 0.)),
            Particle::new(1e-5, 0., Axes::new(-4., 0., 0.), Axes::new(0., -0.5, 0.)),
        ]);
        for _ in 0..100 {
            sim.step();
        }
        match sim.integrator {
            super::super::IntegratorState::Hybrid(ref hybrid) => {
                assert_eq!(hybrid.mode(), HybridMode::Symplectic);
                assert_eq!(hybrid.switches(), 0);
            },
            _ => panic!("unexpected integrator"),
        }
    }

    #[test]
    fn flyby_switches_to_ias15_and_back() {
        let mut sim = simulation(vec![
            Particle::new(1e-3, 0., Axes::new(1., 0., 0.), Axes::new(0., 1., 0.)),
            Particle::new(1e-3, 0., Axes::new(1.05, 0., 0.), Axes::new(3., 1., 0.)),
        ]);
        sim.step();
        match sim.integrator {
            super::super::IntegratorState::Hybrid(ref hybrid) => assert_eq!(hybrid.mode(), HybridMode::HighAccuracy),
            _ => panic!("unexpected integrator"),
        }
        sim.integrate(5.).unwrap();
        match sim.integrator {
            super::super::IntegratorState::Hybrid(ref hybrid) => {
                assert_eq!(hybrid.mode(), HybridMode::Symplectic);
                assert_eq!(hybrid.switches(), 2);
            },
            _ => panic!("unexpected integrator"),
        }
        assert_eq!(sim.dt, 0.01);
        assert_eq!(sim.t, 5.);
    }
}
