use std::cmp::Ordering;
use super::boundary::GhostBox;
use super::particles::{Axes, Particle};
use super::tree::Tree;

/// Overlapping and approaching pair found by the detector. `p1 < p2` always
/// holds, and `ghost_box` is the image of `p1` that touches `p2`.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct Collision {
    pub p1: usize,
    pub p2: usize,
    pub ghost_box: GhostBox,
    pub time: f64,
}

impl Collision {
    /// Separation vector from `p2` to the image of `p1`
    pub fn separation(&self, particles: &[Particle]) -> Axes {
        particles[self.p1].position + self.ghost_box.shift_position - particles[self.p2].position
    }

    pub fn relative_velocity(&self, particles: &[Particle]) -> Axes {
        particles[self.p1].velocity + self.ghost_box.shift_velocity - particles[self.p2].velocity
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CollisionOutcome {
    Merge,  // Remove p2 after folding it into p1
    Bounce, // Velocities were changed by the resolver
    Halt,   // Stop the integration after this step
    Ignore,
}

/// Accumulated momentum flux of bouncing collisions, used to compute the
/// viscosity of planetary rings.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CollisionStatistics {
    pub momentum_log: f64,
    pub count: u64,
}

pub trait CollisionResolver {
    fn resolve(&mut self, collision: &Collision, particles: &mut [Particle], minimum_collision_velocity: f64,
               statistics: &mut CollisionStatistics) -> CollisionOutcome;
}

impl<F> CollisionResolver for F where F: FnMut(&Collision, &mut [Particle]) -> CollisionOutcome {
    fn resolve(&mut self, collision: &Collision, particles: &mut [Particle], _minimum_collision_velocity: f64,
               _statistics: &mut CollisionStatistics) -> CollisionOutcome {
        self(collision, particles)
    }
}

/// Normal coefficient of restitution as a function of the impact speed
pub trait CoefficientOfRestitution {
    fn coefficient(&self, impact_speed: f64) -> f64;
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ConstantRestitution(pub f64);

impl CoefficientOfRestitution for ConstantRestitution {
    fn coefficient(&self, _impact_speed: f64) -> f64 {
        self.0
    }
}

/// Bridges & Hatzes (1984) velocity dependent restitution for ice particles:
/// eps = (v/vc)^-0.234 above the critical speed vc, fully elastic below it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BridgesRestitution {
    pub critical_speed: f64,
}

impl CoefficientOfRestitution for BridgesRestitution {
    fn coefficient(&self, impact_speed: f64) -> f64 {
        let eps = (impact_speed/self.critical_speed).powf(-0.234);
        if eps > 1. || !eps.is_finite() { 1. } else { eps }
    }
}

/// Instantaneous hard-sphere bounce with a normal coefficient of restitution.
pub struct HardSphere {
    pub restitution: Box<dyn CoefficientOfRestitution>,
}

impl HardSphere {
    pub fn new() -> HardSphere {
        HardSphere { restitution: Box::new(ConstantRestitution(1.)) }
    }

    pub fn with_restitution(restitution: Box<dyn CoefficientOfRestitution>) -> HardSphere {
        HardSphere { restitution: restitution }
    }
}

impl Default for HardSphere {
    fn default() -> HardSphere {
        HardSphere::new()
    }
}

impl CollisionResolver for HardSphere {
    fn resolve(&mut self, collision: &Collision, particles: &mut [Particle], minimum_collision_velocity: f64,
               statistics: &mut CollisionStatistics) -> CollisionOutcome {
        let p1 = particles[collision.p1];
        let p2 = particles[collision.p2];
        let d = collision.separation(particles);
        let rp = p1.radius + p2.radius;
        if rp*rp < d.norm2() {
            return CollisionOutcome::Ignore;
        }
        let v = collision.relative_velocity(particles);
        if v.dot(&d) > 0. {
            return CollisionOutcome::Ignore; // Not approaching
        }
        let old_vy_outer = if d.x > 0. { p1.velocity.y } else { p2.velocity.y };

        // Rotate both balls into the xy plane and then onto the positive x axis
        let theta = d.z.atan2(d.y);
        let (stheta, ctheta) = theta.sin_cos();
        let vy21n = ctheta*v.y + stheta*v.z;
        let y21n = ctheta*d.y + stheta*d.z;
        let phi = y21n.atan2(d.x);
        let (sphi, cphi) = phi.sin_cos();
        let vx21nn = cphi*v.x + sphi*vy21n;

        let eps = self.restitution.coefficient(vx21nn.abs());
        let mut dvx2 = -(1.0 + eps)*vx21nn;
        let minr = p1.radius.min(p2.radius);
        let maxr = p1.radius.max(p2.radius);
        if minr > 0. {
            // Push overlapping particles apart
            let mut mindv = minr*minimum_collision_velocity;
            mindv *= 1. - (d.norm() - maxr)/minr;
            if mindv > maxr*minimum_collision_velocity {
                mindv = maxr*minimum_collision_velocity;
            }
            if dvx2 < mindv {
                dvx2 = mindv;
            }
        }
        // Rotate back
        let dvx2n = cphi*dvx2;
        let dvy2n = sphi*dvx2;
        let dv = Axes::new(dvx2n, ctheta*dvy2n, stheta*dvy2n);

        let total_mass = p1.mass + p2.mass;
        let (p1_fraction, p2_fraction) = if total_mass > 0. {
            (p2.mass/total_mass, p1.mass/total_mass)
        } else {
            (0.5, 0.5)
        };
        particles[collision.p2].velocity -= dv * p2_fraction;
        particles[collision.p2].last_collision = collision.time;
        particles[collision.p1].velocity += dv * p1_fraction;
        particles[collision.p1].last_collision = collision.time;

        if d.x > 0. {
            statistics.momentum_log += -d.x.abs()*(old_vy_outer - particles[collision.p1].velocity.y)*p1.mass;
        } else {
            statistics.momentum_log += -d.x.abs()*(old_vy_outer - particles[collision.p2].velocity.y)*p2.mass;
        }
        statistics.count += 1;
        CollisionOutcome::Bounce
    }
}

/// Perfect merger of colliding bodies, performed by `resolve_collisions`.
#[derive(Debug, Copy, Clone, Default)]
pub struct MergeResolver;

impl CollisionResolver for MergeResolver {
    fn resolve(&mut self, _collision: &Collision, _particles: &mut [Particle], _minimum_collision_velocity: f64,
               _statistics: &mut CollisionStatistics) -> CollisionOutcome {
        CollisionOutcome::Merge
    }
}

/// Stop the integration at the first collision.
#[derive(Debug, Copy, Clone, Default)]
pub struct HaltResolver;

impl CollisionResolver for HaltResolver {
    fn resolve(&mut self, _collision: &Collision, _particles: &mut [Particle], _minimum_collision_velocity: f64,
               _statistics: &mut CollisionStatistics) -> CollisionOutcome {
        CollisionOutcome::Halt
    }
}

fn is_collision(p1: &Particle, p2: &Particle, gb: &GhostBox) -> bool {
    let d = p1.position + gb.shift_position - p2.position;
    let rp = p1.radius + p2.radius;
    if d.norm2() > rp*rp {
        return false;
    }
    let v = p1.velocity + gb.shift_velocity - p2.velocity;
    v.dot(&d) <= 0.
}

/// Keep one collision per pair (the closest image) in ascending `(p1, p2)` order.
fn sort_and_deduplicate(collisions: Vec<Collision>, particles: &[Particle]) -> Vec<Collision> {
    let mut keyed: Vec<(Collision, f64)> = collisions.into_iter()
        .map(|collision| { let distance2 = collision.separation(particles).norm2(); (collision, distance2) })
        .collect();
    keyed.sort_by(|a, b| {
        (a.0.p1, a.0.p2).cmp(&(b.0.p1, b.0.p2))
            .then(a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
    });
    keyed.dedup_by(|later, earlier| later.0.p1 == earlier.0.p1 && later.0.p2 == earlier.0.p2);
    keyed.into_iter().map(|(collision, _)| collision).collect()
}

/// All-pairs search over the first `n_real` particles.
pub fn detect_direct(particles: &[Particle], n_real: usize, ghost_boxes: &[GhostBox], time: f64) -> Vec<Collision> {
    let mut collisions = Vec::new();
    for gb in ghost_boxes.iter() {
        for i in 0..n_real {
            for j in (i+1)..n_real {
                if is_collision(&particles[i], &particles[j], gb) {
                    collisions.push(Collision { p1: i, p2: j, ghost_box: *gb, time: time });
                }
            }
        }
    }
    sort_and_deduplicate(collisions, particles)
}

/// Tree search: cells whose enclosing sphere is farther than the two largest
/// possible radii are skipped.
pub fn detect_tree(particles: &[Particle], n_real: usize, ghost_boxes: &[GhostBox], tree: &Tree, time: f64) -> Vec<Collision> {
    let mut collisions = Vec::new();
    for gb in ghost_boxes.iter() {
        for i in 0..n_real {
            let query = particles[i].position + gb.shift_position;
            let search_radius = particles[i].radius + tree.largest_partner_radius(particles[i].radius);
            tree.visit_neighbour_candidates(&query, search_radius, |j| {
                if j > i && j < n_real && is_collision(&particles[i], &particles[j], gb) {
                    collisions.push(Collision { p1: i, p2: j, ghost_box: *gb, time: time });
                }
            });
        }
    }
    sort_and_deduplicate(collisions, particles)
}

/// Fold `p2` (seen through `ghost_box` from `p1`) into `p1`, conserving mass,
/// momentum and volume.
pub fn merge_particles(particles: &mut [Particle], p1: usize, p2: usize, ghost_box: &GhostBox, time: f64) {
    let a = particles[p1];
    let b = particles[p2];
    let b_position = b.position - ghost_box.shift_position;
    let b_velocity = b.velocity - ghost_box.shift_velocity;
    let total_mass = a.mass + b.mass;
    let (wa, wb) = if total_mass > 0. { (a.mass/total_mass, b.mass/total_mass) } else { (0.5, 0.5) };
    let merged = &mut particles[p1];
    merged.position = a.position * wa + b_position * wb;
    merged.velocity = a.velocity * wa + b_velocity * wb;
    merged.acceleration = a.acceleration * wa + b.acceleration * wb;
    merged.mass = total_mass;
    merged.radius = (a.radius.powi(3) + b.radius.powi(3)).cbrt();
    merged.last_collision = time;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionSummary {
    pub removed: Vec<usize>,    // Ascending indices of merged away particles
    pub halt: bool,
}

/// Hand every collision to `resolver` in order. Collisions involving a particle
/// that was merged away earlier in the same pass are skipped, and a `Halt`
/// outcome stops the pass. Removal of merged particles is left to the caller.
pub fn resolve_collisions(collisions: &[Collision], particles: &mut [Particle], resolver: &mut dyn CollisionResolver,
                          minimum_collision_velocity: f64, statistics: &mut CollisionStatistics) -> ResolutionSummary {
    let mut summary = ResolutionSummary::default();
    for collision in collisions.iter() {
        if summary.removed.contains(&collision.p1) || summary.removed.contains(&collision.p2) {
            continue;
        }
        match resolver.resolve(collision, particles, minimum_collision_velocity, statistics) {
            CollisionOutcome::Merge => {
                merge_particles(particles, collision.p1, collision.p2, &collision.ghost_box, collision.time);
                summary.removed.push(collision.p2);
            },
            CollisionOutcome::Halt => {
                summary.halt = true;
                break;
            },
            CollisionOutcome::Bounce | CollisionOutcome::Ignore => {},
        }
    }
    summary.removed.sort();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::boundary::ghost_boxes;
    use super::super::config::{BoundaryKind, BoxGeometry};

    fn ring(n: usize) -> Vec<Particle> {
        (0..n).map(|i| {
            let f = i as f64;
            let position = Axes::new(((f*0.618034) % 1.) - 0.5, ((f*0.414214) % 1.) - 0.5, (((f*0.732051) % 1.) - 0.5)*0.1);
            let velocity = Axes::new(((f*0.3819) % 1.) - 0.5, ((f*0.2360) % 1.) - 0.5, 0.);
            Particle::new(1e-6, 0.04, position, velocity)
        }).collect()
    }

    #[test]
    fn head_on_pair_is_detected_once() {
        let particles = vec![
            Particle::new(1., 0.1, Axes::new(-0.05, 0., 0.), Axes::new(1., 0., 0.)),
            Particle::new(1., 0.1, Axes::new(0.05, 0., 0.), Axes::new(-1., 0., 0.)),
        ];
        let collisions = detect_direct(&particles, 2, &[GhostBox::default()], 0.);
        assert_eq!(collisions.len(), 1);
        assert_eq!((collisions[0].p1, collisions[0].p2), (0, 1));
    }

    #[test]
    fn receding_pair_is_not_a_collision() {
        let particles = vec![
            Particle::new(1., 0.1, Axes::new(-0.05, 0., 0.), Axes::new(-1., 0., 0.)),
            Particle::new(1., 0.1, Axes::new(0.05, 0., 0.), Axes::new(1., 0., 0.)),
        ];
        assert!(detect_direct(&particles, 2, &[GhostBox::default()], 0.).is_empty());
    }

    #[test]
    fn tree_and_direct_searches_agree() {
        let geometry = BoxGeometry::new(1., 1, 1, 1);
        let mut particles = ring(300);
        let boxes = ghost_boxes(BoundaryKind::Periodic, &geometry, 1, 1, 0, 0., 0.);
        let direct = detect_direct(&particles, 300, &boxes, 0.);
        let tree = Tree::build(&geometry, &mut particles, 300, 300);
        let from_tree = detect_tree(&particles, 300, &boxes, &tree, 0.);
        assert!(!direct.is_empty());
        let pairs = |collisions: &Vec<Collision>| collisions.iter().map(|c| (c.p1, c.p2)).collect::<Vec<(usize, usize)>>();
        assert_eq!(pairs(&direct), pairs(&from_tree));
    }

    #[test]
    fn elastic_bounce_conserves_momentum_and_energy() {
        let mut particles = vec![
            Particle::new(1., 0.1, Axes::new(-0.05, 0.01, 0.02), Axes::new(1., 0.2, 0.)),
            Particle::new(3., 0.1, Axes::new(0.05, 0., 0.), Axes::new(-1., 0., 0.1)),
        ];
        let momentum = |ps: &Vec<Particle>| ps[0].velocity * ps[0].mass + ps[1].velocity * ps[1].mass;
        let energy = |ps: &Vec<Particle>| 0.5*(ps[0].mass*ps[0].velocity.norm2() + ps[1].mass*ps[1].velocity.norm2());
        let (p_before, e_before) = (momentum(&particles), energy(&particles));
        let collisions = detect_direct(&particles, 2, &[GhostBox::default()], 1.5);
        let mut statistics = CollisionStatistics::default();
        let mut resolver = HardSphere::new();
        let summary = resolve_collisions(&collisions, &mut particles, &mut resolver, 0., &mut statistics);
        assert!(summary.removed.is_empty());
        assert!((momentum(&particles) - p_before).norm() < 1e-14);
        assert_approx_eq!(energy(&particles), e_before, 1e-14);
        assert_eq!(statistics.count, 1);
        assert_eq!(particles[0].last_collision, 1.5);
        // Now receding
        assert!(detect_direct(&particles, 2, &[GhostBox::default()], 1.5).is_empty());
    }

    #[test]
    fn inelastic_bounce_loses_energy() {
        let mut particles = vec![
            Particle::new(1., 0.1, Axes::new(-0.05, 0., 0.), Axes::new(1., 0., 0.)),
            Particle::new(1., 0.1, Axes::new(0.05, 0., 0.), Axes::new(-1., 0., 0.)),
        ];
        let collisions = detect_direct(&particles, 2, &[GhostBox::default()], 0.);
        let mut resolver = HardSphere::with_restitution(Box::new(ConstantRestitution(0.5)));
        resolve_collisions(&collisions, &mut particles, &mut resolver, 0., &mut CollisionStatistics::default());
        assert_approx_eq!(particles[0].velocity.x, -0.5, 1e-14);
        assert_approx_eq!(particles[1].velocity.x, 0.5, 1e-14);
    }

    #[test]
    fn merge_conserves_mass_momentum_and_volume() {
        let mut particles = vec![
            Particle::new(1., 1., Axes::new(-0.5, 0., 0.), Axes::new(1., 0., 0.)),
            Particle::new(3., 1., Axes::new(0.5, 0., 0.), Axes::new(-1., 1., 0.)),
            Particle::new(1., 0.1, Axes::new(5., 0., 0.), Axes::zero()),
        ];
        let collisions = detect_direct(&particles, 3, &[GhostBox::default()], 0.);
        let summary = resolve_collisions(&collisions, &mut particles, &mut MergeResolver, 0., &mut CollisionStatistics::default());
        assert_eq!(summary.removed, vec![1]);
        assert_eq!(particles[0].mass, 4.);
        assert_approx_eq!(particles[0].velocity.x, -0.5, 1e-15);
        assert_approx_eq!(particles[0].velocity.y, 0.75, 1e-15);
        assert_approx_eq!(particles[0].position.x, 0.25, 1e-15);
        assert_approx_eq!(particles[0].radius, 2f64.cbrt(), 1e-15);
    }

    #[test]
    fn halt_stops_the_pass() {
        let mut particles = vec![
            Particle::new(1., 0.1, Axes::new(-0.05, 0., 0.), Axes::new(1., 0., 0.)),
            Particle::new(1., 0.1, Axes::new(0.05, 0., 0.), Axes::new(-1., 0., 0.)),
        ];
        let collisions = detect_direct(&particles, 2, &[GhostBox::default()], 0.);
        let summary = resolve_collisions(&collisions, &mut particles, &mut HaltResolver, 0., &mut CollisionStatistics::default());
        assert!(summary.halt);
        let mut count = 0;
        let mut counting = |_: &Collision, _: &mut [Particle]| { count += 1; CollisionOutcome::Ignore };
        resolve_collisions(&collisions, &mut particles, &mut counting, 0., &mut CollisionStatistics::default());
        assert_eq!(count, 1);
    }
}
