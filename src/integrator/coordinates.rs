use super::super::particles::{Axes, Particle};

/// Position, velocity and acceleration of a body in Jacobi or democratic
/// heliocentric coordinates. Entry 0 always describes the center of mass of the
/// whole system.
///
/// Every transformation is linear in the coordinates for fixed masses, so the
/// same functions also map variational particles: `masses` always come from the
/// real bodies while `source`/`target` can be either set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct AlternativeCoordinates {
    pub mass: f64,
    pub position: Axes,
    pub velocity: Axes,
    pub acceleration: Axes,
}

pub fn inertial_to_jacobi(masses: &[f64], source: &[Particle], jacobi: &mut [AlternativeCoordinates]) {
    let (central, bodies) = match source.split_first() {
        Some(split) => split,
        None => return,
    };
    let mut eta = masses[0];
    let mut s = central.position * eta;
    let mut sv = central.velocity * eta;
    for (i, particle) in bodies.iter().enumerate() {
        let i = i + 1;
        let ei = 1./eta;
        eta += masses[i];
        let pme = eta*ei;
        jacobi[i].mass = masses[i];
        jacobi[i].position = particle.position - s * ei;
        jacobi[i].velocity = particle.velocity - sv * ei;
        s = s * pme + jacobi[i].position * masses[i];
        sv = sv * pme + jacobi[i].velocity * masses[i];
    }
    let mtot_i = 1./eta;
    jacobi[0].mass = eta;
    jacobi[0].position = s * mtot_i;
    jacobi[0].velocity = sv * mtot_i;
}

pub fn inertial_to_jacobi_acceleration(masses: &[f64], source: &[Particle], jacobi: &mut [AlternativeCoordinates]) {
    let (central, bodies) = match source.split_first() {
        Some(split) => split,
        None => return,
    };
    let mut eta = masses[0];
    let mut s = central.acceleration * eta;
    for (i, particle) in bodies.iter().enumerate() {
        let i = i + 1;
        let ei = 1./eta;
        eta += masses[i];
        let pme = eta*ei;
        jacobi[i].acceleration = particle.acceleration - s * ei;
        s = s * pme + jacobi[i].acceleration * masses[i];
    }
    jacobi[0].acceleration = s * (1./eta);
}

pub fn jacobi_to_inertial(masses: &[f64], jacobi: &[AlternativeCoordinates], target: &mut [Particle]) {
    let n = target.len();
    if n == 0 {
        return;
    }
    let mut eta: f64 = masses[..n].iter().sum();
    let mut s = jacobi[0].position * eta;
    let mut sv = jacobi[0].velocity * eta;
    for i in (1..n).rev() {
        let ei = 1./eta;
        s = (s - jacobi[i].position * masses[i]) * ei;
        sv = (sv - jacobi[i].velocity * masses[i]) * ei;
        target[i].position = jacobi[i].position + s;
        target[i].velocity = jacobi[i].velocity + sv;
        eta -= masses[i];
        s = s * eta;
        sv = sv * eta;
    }
    let mtot_i = 1./eta;
    target[0].position = s * mtot_i;
    target[0].velocity = sv * mtot_i;
}

/// Positions relative to the central body, velocities relative to the center of
/// mass (a.k.a. canonical heliocentric or Poincare coordinates).
pub fn inertial_to_democratic_heliocentric(masses: &[f64], source: &[Particle], heliocentric: &mut [AlternativeCoordinates]) {
    let central = match source.first() {
        Some(central) => *central,
        None => return,
    };
    let mut mtot = 0.;
    let mut com_position = Axes::zero();
    let mut com_velocity = Axes::zero();
    for (particle, &mass) in source.iter().zip(masses.iter()) {
        com_position += particle.position * mass;
        com_velocity += particle.velocity * mass;
        mtot += mass;
    }
    heliocentric[0].mass = mtot;
    heliocentric[0].position = com_position * (1./mtot);
    heliocentric[0].velocity = com_velocity * (1./mtot);
    for i in 1..source.len() {
        heliocentric[i].mass = masses[i];
        heliocentric[i].position = source[i].position - central.position;
        heliocentric[i].velocity = source[i].velocity - heliocentric[0].velocity;
    }
}

pub fn democratic_heliocentric_to_inertial(masses: &[f64], heliocentric: &[AlternativeCoordinates], target: &mut [Particle]) {
    let n = target.len();
    if n == 0 {
        return;
    }
    let m0 = masses[0];
    let mtot = heliocentric[0].mass;
    let mut central_position = heliocentric[0].position;
    let mut central_velocity = heliocentric[0].velocity;
    for i in 1..n {
        central_position -= heliocentric[i].position * (masses[i]/mtot);
        central_velocity -= heliocentric[i].velocity * (masses[i]/m0);
    }
    target[0].position = central_position;
    target[0].velocity = central_velocity;
    for i in 1..n {
        target[i].position = heliocentric[i].position + central_position;
        target[i].velocity = heliocentric[i].velocity + heliocentric[0].velocity;
    }
}
