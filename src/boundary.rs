use super::config::{BoundaryKind, BoxGeometry};
use super::particles::{Axes, Particle};

/// Position and velocity offset of one periodic or sheared image of the box.
/// Recomputed every step, shear images move with time.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GhostBox {
    pub shift_position: Axes,
    pub shift_velocity: Axes,
}

impl GhostBox {
    pub fn is_zero(&self) -> bool {
        *self == GhostBox::default()
    }
}

/// Ghost box with integer offsets (i, j, k) along (x, y, z).
/// `omega` is the shear rate and `time` the current simulation time, both only
/// used by shearing boundaries.
pub fn ghost_box(boundary: BoundaryKind, geometry: &BoxGeometry, i: i64, j: i64, k: i64, omega: f64, time: f64) -> GhostBox {
    let boxsize = geometry.boxsize();
    match boundary {
        BoundaryKind::None | BoundaryKind::Open => GhostBox::default(),
        BoundaryKind::Periodic => {
            GhostBox {
                shift_position: Axes::new(boxsize.x*i as f64, boxsize.y*j as f64, boxsize.z*k as f64),
                shift_velocity: Axes::zero(),
            }
        },
        BoundaryKind::Shear => {
            // Ghost boxes have a finite velocity
            let shift_vy = -1.5*(i as f64)*omega*boxsize.x;
            // The shift in the y direction is time dependent
            let shift = if i == 0 {
                -((shift_vy*time) % boxsize.y)
            } else if i > 0 {
                -((shift_vy*time - boxsize.y/2.) % boxsize.y) - boxsize.y/2.
            } else {
                -((shift_vy*time + boxsize.y/2.) % boxsize.y) + boxsize.y/2.
            };
            GhostBox {
                shift_position: Axes::new(boxsize.x*i as f64, boxsize.y*j as f64 - shift, boxsize.z*k as f64),
                shift_velocity: Axes::new(0., shift_vy, 0.),
            }
        },
    }
}

/// Enumerate every image in `[-nghostx, nghostx] x [-nghosty, nghosty] x [-nghostz, nghostz]`.
/// Open and unbounded simulations always get exactly one zero-shift box.
pub fn ghost_boxes(boundary: BoundaryKind, geometry: &BoxGeometry, nghostx: usize, nghosty: usize, nghostz: usize, omega: f64, time: f64) -> Vec<GhostBox> {
    match boundary {
        BoundaryKind::None | BoundaryKind::Open => vec![GhostBox::default()],
        BoundaryKind::Periodic | BoundaryKind::Shear => {
            let (nx, ny, nz) = (nghostx as i64, nghosty as i64, nghostz as i64);
            let mut boxes = Vec::with_capacity(((2*nx+1)*(2*ny+1)*(2*nz+1)) as usize);
            for i in -nx..=nx {
                for j in -ny..=ny {
                    for k in -nz..=nz {
                        boxes.push(ghost_box(boundary, geometry, i, j, k, omega, time));
                    }
                }
            }
            boxes
        },
    }
}

/// Collision searches only look at the innermost ring of images.
pub fn collision_ghost_boxes(boundary: BoundaryKind, geometry: &BoxGeometry, nghostx: usize, nghosty: usize, nghostz: usize, omega: f64, time: f64) -> Vec<GhostBox> {
    ghost_boxes(boundary, geometry, nghostx.min(1), nghosty.min(1), nghostz.min(1), omega, time)
}

pub fn is_in_box(geometry: &BoxGeometry, position: &Axes) -> bool {
    let half = geometry.boxsize() * 0.5;
    !(position.x > half.x || position.x < -half.x
        || position.y > half.y || position.y < -half.y
        || position.z > half.z || position.z < -half.z)
}

fn wrap(value: &mut f64, size: f64) {
    if !value.is_finite() {
        return;
    }
    while *value > size/2. {
        *value -= size;
    }
    while *value < -size/2. {
        *value += size;
    }
}

/// Bring particles that left the box back according to the boundary kind.
/// Returns the indices (ascending) of particles that escaped an open box and must
/// be removed by the caller.
pub fn check_boundaries(boundary: BoundaryKind, geometry: &BoxGeometry, particles: &mut [Particle], omega: f64, time: f64) -> Vec<usize> {
    let boxsize = geometry.boxsize();
    let mut escaped = Vec::new();
    match boundary {
        BoundaryKind::None => {},
        BoundaryKind::Open => {
            for (i, particle) in particles.iter().enumerate() {
                if !is_in_box(geometry, &particle.position) {
                    escaped.push(i);
                }
            }
        },
        BoundaryKind::Periodic => {
            for particle in particles.iter_mut() {
                wrap(&mut particle.position.x, boxsize.x);
                wrap(&mut particle.position.y, boxsize.y);
                wrap(&mut particle.position.z, boxsize.z);
            }
        },
        BoundaryKind::Shear => {
            let offset_p1 = -((-1.5*omega*boxsize.x*time + boxsize.y/2.) % boxsize.y) - boxsize.y/2.;
            let offset_m1 = -((1.5*omega*boxsize.x*time - boxsize.y/2.) % boxsize.y) + boxsize.y/2.;
            for particle in particles.iter_mut() {
                if particle.position.x.is_finite() {
                    // Radial
                    while particle.position.x > boxsize.x/2. {
                        particle.position.x -= boxsize.x;
                        particle.position.y += offset_p1;
                        particle.velocity.y += 1.5*omega*boxsize.x;
                    }
                    while particle.position.x < -boxsize.x/2. {
                        particle.position.x += boxsize.x;
                        particle.position.y += offset_m1;
                        particle.velocity.y -= 1.5*omega*boxsize.x;
                    }
                }
                // Azimuthal
                wrap(&mut particle.position.y, boxsize.y);
                // Vertical (periodic keeps particles inside the tree)
                wrap(&mut particle.position.z, boxsize.z);
            }
        },
    }
    escaped
}
