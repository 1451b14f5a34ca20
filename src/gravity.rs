use super::boundary::GhostBox;
use super::config::{GravityMode, SimulationConfig};
use super::particles::{Axes, Particle};
use super::tree::Tree;

/// Pair interactions an integrator already accounts for in its Kepler drift and
/// that must be left out of the direct force calculation.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum IgnoreGravityTerms {
    None,
    InnerPair,      // Jacobi coordinates: the 0-1 pair
    CentralBody,    // Democratic heliocentric coordinates: every pair involving body 0
}

impl Default for IgnoreGravityTerms {
    fn default() -> IgnoreGravityTerms {
        IgnoreGravityTerms::None
    }
}

impl IgnoreGravityTerms {
    pub fn skips(&self, i: usize, j: usize) -> bool {
        match self {
            IgnoreGravityTerms::None => false,
            IgnoreGravityTerms::InnerPair => (i == 0 && j == 1) || (i == 1 && j == 0),
            IgnoreGravityTerms::CentralBody => i == 0 || j == 0,
        }
    }

    /// Sources whose force on particle `i` is left out, `i` itself included.
    /// Returns `None` when no source acts on `i` at all.
    pub fn skipped_sources(&self, i: usize, n_active: usize) -> Option<Vec<usize>> {
        if *self == IgnoreGravityTerms::CentralBody && i == 0 {
            return None;
        }
        let mut skipped = vec![i];
        skipped.extend((0..n_active.min(2)).filter(|&j| j != i && self.skips(i, j)));
        Some(skipped)
    }
}

/// Compensated (Kahan) accumulation of one acceleration term
fn compensated_add(acceleration: &mut Axes, compensation: &mut Axes, term: Axes) {
    let y = term - *compensation;
    let t = *acceleration + y;
    *compensation = (t - *acceleration) - y;
    *acceleration = t;
}

/// Overwrite the acceleration of the first `n_real` particles with the gravity
/// sourced by the first `n_active` ones, summed over every ghost box.
#[allow(non_snake_case)]
pub fn calculate_accelerations(config: &SimulationConfig, particles: &mut [Particle], n_real: usize, n_active: usize,
                               ghost_boxes: &[GhostBox], tree: Option<&Tree>, ignore: IgnoreGravityTerms) {
    let G = config.G;
    let softening2 = config.softening*config.softening;
    for particle in particles[..n_real].iter_mut() {
        particle.acceleration = Axes::zero();
    }
    match config.gravity {
        GravityMode::None => {},
        GravityMode::Basic => {
            for gb in ghost_boxes.iter() {
                for i in 0..n_real {
                    let shifted = particles[i].position + gb.shift_position;
                    let mut acceleration = Axes::zero();
                    for j in 0..n_active {
                        if i == j || ignore.skips(i, j) {
                            continue;
                        }
                        let d = shifted - particles[j].position;
                        let r = (d.norm2() + softening2).sqrt();
                        let prefact = -G/(r*r*r)*particles[j].mass;
                        acceleration += d * prefact;
                    }
                    particles[i].acceleration += acceleration;
                }
            }
        },
        GravityMode::Compensated => {
            let mut compensation = vec![Axes::zero(); n_real];
            // Massive pairs, both directions at once
            for i in 0..n_active {
                for j in (i+1)..n_active {
                    if ignore.skips(i, j) {
                        continue;
                    }
                    let d = particles[i].position - particles[j].position;
                    let r2 = d.norm2() + softening2;
                    let r = r2.sqrt();
                    let prefact = G/(r2*r);
                    let term_i = d * (-prefact*particles[j].mass);
                    let term_j = d * (prefact*particles[i].mass);
                    compensated_add(&mut particles[i].acceleration, &mut compensation[i], term_i);
                    compensated_add(&mut particles[j].acceleration, &mut compensation[j], term_j);
                }
            }
            // Test particles
            for i in n_active..n_real {
                for j in 0..n_active {
                    if ignore.skips(i, j) {
                        continue;
                    }
                    let d = particles[i].position - particles[j].position;
                    let r2 = d.norm2() + softening2;
                    let r = r2.sqrt();
                    let term = d * (-G/(r2*r)*particles[j].mass);
                    compensated_add(&mut particles[i].acceleration, &mut compensation[i], term);
                }
            }
            // Periodic images
            for gb in ghost_boxes.iter().filter(|gb| !gb.is_zero()) {
                for i in 0..n_real {
                    let shifted = particles[i].position + gb.shift_position;
                    for j in 0..n_active {
                        if i == j || ignore.skips(i, j) {
                            continue;
                        }
                        let d = shifted - particles[j].position;
                        let r2 = d.norm2() + softening2;
                        let r = r2.sqrt();
                        let term = d * (-G/(r2*r)*particles[j].mass);
                        compensated_add(&mut particles[i].acceleration, &mut compensation[i], term);
                    }
                }
            }
        },
        GravityMode::Tree => {
            if let Some(tree) = tree {
                for i in 0..n_real {
                    let skipped = match ignore.skipped_sources(i, n_active) {
                        Some(skipped) => skipped,
                        None => continue,
                    };
                    let mut acceleration = Axes::zero();
                    for gb in ghost_boxes.iter() {
                        let query = particles[i].position + gb.shift_position;
                        acceleration += tree.acceleration_at(&query, &skipped, particles, n_active, G, softening2,
                                                             config.opening_angle2, config.tree_quadrupole);
                    }
                    particles[i].acceleration = acceleration;
                }
            }
        },
    }
}

/// Linearized gravity acting on the variational particles stored right after the
/// `n_real` real ones (variational particle `k` shadows real particle `k`).
#[allow(non_snake_case)]
pub fn calculate_variational_accelerations(config: &SimulationConfig, particles: &mut [Particle], n_real: usize, n_active: usize,
                                           ignore: IgnoreGravityTerms) {
    let n_var = particles.len() - n_real;
    if n_var == 0 {
        return;
    }
    let G = config.G;
    let softening2 = config.softening*config.softening;
    for particle in particles[n_real..].iter_mut() {
        particle.acceleration = Axes::zero();
    }
    if config.gravity == GravityMode::None {
        return;
    }
    for i in 0..n_var.min(n_real) {
        let mut acceleration = Axes::zero();
        for j in 0..n_active.min(n_var) {
            if i == j || ignore.skips(i, j) {
                continue;
            }
            let d = particles[i].position - particles[j].position;
            let r2 = d.norm2() + softening2;
            let r = r2.sqrt();
            let r3inv = 1./(r2*r);
            let r5inv = 3.*r3inv/r2;
            let dd = particles[n_real+i].position - particles[n_real+j].position;
            let da = Axes {
                x: dd.x*(d.x*d.x*r5inv - r3inv) + dd.y*(d.x*d.y*r5inv) + dd.z*(d.x*d.z*r5inv),
                y: dd.x*(d.y*d.x*r5inv) + dd.y*(d.y*d.y*r5inv - r3inv) + dd.z*(d.y*d.z*r5inv),
                z: dd.x*(d.z*d.x*r5inv) + dd.y*(d.z*d.y*r5inv) + dd.z*(d.z*d.z*r5inv - r3inv),
            };
            acceleration += da * (G*particles[j].mass);
        }
        particles[n_real+i].acceleration = acceleration;
    }
}
