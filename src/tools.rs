use super::constants::{PI, TWO_PI, TINY, MIN_REL_ERROR};
use super::error::{Error, Result};
use super::particles::{Axes, Particle};
use super::simulation::Simulation;

/// Keplerian elements of a particle relative to a primary. Angles are in
/// radians; `period` is negative for hyperbolic orbits.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct Orbit {
    pub semi_major_axis: f64,
    pub distance: f64,                      // Radial distance from the primary
    pub angular_momentum: f64,              // Specific angular momentum
    pub period: f64,
    pub mean_longitude: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub longitude_of_ascending_node: f64,
    pub argument_of_pericenter: f64,
    pub true_anomaly: f64,
    pub mean_anomaly: f64,
}

/// acos(num/denom) in the half plane selected by the sign of `disambiguator`
fn acos2(num: f64, denom: f64, disambiguator: f64) -> f64 {
    let cs = (num/denom).max(-1.).min(1.);
    let val = cs.acos();
    if disambiguator < 0. { -val } else { val }
}

fn modulus(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r < 0. { r + b } else { r }
}

/// Orbital elements of `particle` around `primary` (e.g., the central star or the
/// center of mass of the interior bodies).
#[allow(non_snake_case)]
pub fn compute_orbit(G: f64, particle: &Particle, primary: &Particle) -> Result<Orbit> {
    if primary.mass <= TINY {
        return Err(Error::DegenerateOrbit("primary has no mass"));
    }
    let mu = G*(particle.mass + primary.mass);
    let dr = particle.position - primary.position;
    let dv = particle.velocity - primary.velocity;
    let d = dr.norm();
    if d <= TINY {
        return Err(Error::DegenerateOrbit("particle is on top of its primary"));
    }
    let v2 = dv.norm2();
    let vcirc2 = mu/d;
    if vcirc2 <= TINY {
        return Err(Error::DegenerateOrbit("gravitational parameter is zero"));
    }
    let v = v2.sqrt();
    let vdiff2 = v2 - vcirc2;

    // --- Angular momentum
    let h_vec = dr.cross(&dv);
    let h = h_vec.norm();
    if v == 0. || h/(d*v) <= MIN_REL_ERROR {
        return Err(Error::DegenerateOrbit("radial orbit"));
    }

    // --- Eccentricity vector
    let vr = dr.dot(&dv)/d;
    let rvr = d*vr;
    let muinv = 1./mu;
    let e_vec = (dr * vdiff2 - dv * rvr) * muinv;
    let e = e_vec.norm();

    // --- Size and period
    let a = -mu/(v2 - 2.*vcirc2);
    let period = a.signum()*TWO_PI*(a.abs().powi(3)/mu).sqrt();

    // --- Orientation
    let inclination = acos2(h_vec.z, h, 1.);
    let node = Axes::new(-h_vec.y, h_vec.x, 0.);    // z cross h
    let n = node.norm();
    let longitude_of_ascending_node = if n > TINY { acos2(node.x, n, node.y) } else { 0. };

    // --- Anomalies
    let mean_anomaly = if e < 1. {
        let ea = acos2(1. - d/a, e, vr);
        ea - e*ea.sin()
    } else {
        let mut ea = ((1. - d/a)/e).acosh();
        if vr < 0. {
            ea = -ea;
        }
        e*ea.sinh() - ea
    };
    let (argument_of_pericenter, true_anomaly) = if e > TINY {
        let f = acos2(e_vec.dot(&dr), e*d, vr);
        let omega = if n > TINY {
            acos2(node.dot(&e_vec), n*e, e_vec.z)
        } else if inclination < PI/2. {
            // Equatorial prograde: measured from the x axis
            acos2(e_vec.x, e, e_vec.y) - longitude_of_ascending_node
        } else {
            longitude_of_ascending_node - acos2(e_vec.x, e, e_vec.y)
        };
        (omega, f)
    } else if n > TINY {
        // Circular: anomalies measured from the ascending node
        (0., acos2(node.dot(&dr), n*d, dr.z))
    } else {
        // Circular and equatorial: measured from the x axis
        let theta = acos2(dr.x, d, dr.y);
        (0., if inclination < PI/2. { theta } else { -theta })
    };
    let mean_longitude = if inclination < PI/2. {
        longitude_of_ascending_node + argument_of_pericenter + mean_anomaly
    } else {
        longitude_of_ascending_node - argument_of_pericenter - mean_anomaly
    };

    Ok(Orbit {
        semi_major_axis: a,
        distance: d,
        angular_momentum: h,
        period: period,
        mean_longitude: modulus(mean_longitude, TWO_PI),
        eccentricity: e,
        inclination: inclination,
        longitude_of_ascending_node: modulus(longitude_of_ascending_node, TWO_PI),
        argument_of_pericenter: modulus(argument_of_pericenter, TWO_PI),
        true_anomaly: modulus(true_anomaly, TWO_PI),
        mean_anomaly: if e < 1. { modulus(mean_anomaly, TWO_PI) } else { mean_anomaly },
    })
}

/// Inverse of `compute_orbit`: build a particle of the given mass from its
/// orbital elements around `primary` (Murray & Dermott 2.122 and 2.36).
#[allow(non_snake_case)]
pub fn particle_from_orbital_elements(G: f64, primary: &Particle, mass: f64, semi_major_axis: f64, eccentricity: f64, inclination: f64,
                                      longitude_of_ascending_node: f64, argument_of_pericenter: f64, true_anomaly: f64) -> Result<Particle> {
    let (a, e, f) = (semi_major_axis, eccentricity, true_anomaly);
    if e == 1. {
        return Err(Error::DegenerateOrbit("parabolic orbits cannot be described by a semi-major axis"));
    }
    if e < 0. {
        return Err(Error::DegenerateOrbit("negative eccentricity"));
    }
    if e > 1. && a > 0. {
        return Err(Error::DegenerateOrbit("hyperbolic orbits need a negative semi-major axis"));
    }
    if e < 1. && a < 0. {
        return Err(Error::DegenerateOrbit("bound orbits need a positive semi-major axis"));
    }
    if e > 1. && f.cos() < -1./e {
        return Err(Error::DegenerateOrbit("true anomaly beyond the asymptotes of the hyperbola"));
    }
    if primary.mass < TINY {
        return Err(Error::DegenerateOrbit("primary has no mass"));
    }

    let r = a*(1. - e*e)/(1. + e*f.cos());
    let v0 = (G*(mass + primary.mass)/a/(1. - e*e)).sqrt();
    let (c_o, s_o) = (longitude_of_ascending_node.cos(), longitude_of_ascending_node.sin());
    let (co, so) = (argument_of_pericenter.cos(), argument_of_pericenter.sin());
    let (cf, sf) = (f.cos(), f.sin());
    let (ci, si) = (inclination.cos(), inclination.sin());

    let position = Axes::new(
        r*(c_o*(co*cf - so*sf) - s_o*(so*cf + co*sf)*ci),
        r*(s_o*(co*cf - so*sf) + c_o*(so*cf + co*sf)*ci),
        r*(so*cf + co*sf)*si,
    );
    let velocity = Axes::new(
        v0*((e + cf)*(-ci*co*s_o - c_o*so) - sf*(co*c_o - ci*so*s_o)),
        v0*((e + cf)*(ci*co*c_o - s_o*so) - sf*(co*s_o + ci*so*c_o)),
        v0*((e + cf)*co*si - sf*si*so),
    );
    Ok(Particle::new(mass, 0., primary.position + position, primary.velocity + velocity))
}

/// Mass, position and velocity of the barycenter of `particles`
pub fn compute_center_of_mass(particles: &[Particle]) -> Particle {
    let mut com = Particle::default();
    for particle in particles.iter() {
        com.position += particle.position * particle.mass;
        com.velocity += particle.velocity * particle.mass;
        com.mass += particle.mass;
    }
    if com.mass > 0. {
        com.position = com.position * (1./com.mass);
        com.velocity = com.velocity * (1./com.mass);
    }
    com
}

/// Kinetic plus (unsoftened) potential energy of the real particles. Only the
/// active ones contribute to the potential.
#[allow(non_snake_case)]
pub fn compute_total_energy(sim: &Simulation) -> f64 {
    let particles = &sim.particles[..sim.n_real()];
    let n_active = sim.n_active();
    let G = sim.config.G;
    let mut kinetic = 0.;
    let mut potential = 0.;
    for (i, p) in particles.iter().enumerate() {
        kinetic += 0.5*p.mass*p.velocity.norm2();
        if i < n_active {
            for q in particles[i+1..].iter() {
                potential -= G*p.mass*q.mass/(p.position - q.position).norm();
            }
        }
    }
    kinetic + potential
}

/// Total angular momentum of the real particles
pub fn compute_angular_momentum(sim: &Simulation) -> Axes {
    let mut total = Axes::zero();
    for p in sim.particles[..sim.n_real()].iter() {
        total += p.position.cross(&p.velocity) * p.mass;
    }
    total
}

/// Shift positions and velocities so that the barycenter sits at rest at the origin
pub fn move_to_center_of_mass(particles: &mut [Particle]) {
    let com = compute_center_of_mass(particles);
    for particle in particles.iter_mut() {
        particle.position -= com.position;
        particle.velocity -= com.velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sun() -> Particle {
        Particle::new(1., 0., Axes::new(0.1, -0.2, 0.05), Axes::new(0.01, 0., -0.02))
    }

    #[test]
    fn circular_orbit_elements() {
        let planet = Particle::new(0., 0., Axes::new(2., 0., 0.), Axes::new(0., (0.5f64).sqrt(), 0.));
        let primary = Particle::new(1., 0., Axes::zero(), Axes::zero());
        let orbit = compute_orbit(1., &planet, &primary).unwrap();
        assert_approx_eq!(orbit.semi_major_axis, 2., 1e-12);
        assert_approx_eq!(orbit.eccentricity, 0., 1e-12);
        assert_approx_eq!(orbit.inclination, 0., 1e-12);
        assert_approx_eq!(orbit.period, TWO_PI*(8.0f64).sqrt(), 1e-10);
    }

    #[test]
    fn elements_round_trip() {
        let primary = sun();
        for &(a, e, inc, node, peri, f) in &[(1.3, 0.2, 0.3, 1.1, 2.5, 0.7),
                                             (5., 0.6, 2.0, 4.0, 0.4, 3.5),
                                             (-2., 1.5, 0.8, 0.5, 1.0, 0.3)] {
            let particle = particle_from_orbital_elements(1., &primary, 1e-3, a, e, inc, node, peri, f).unwrap();
            let orbit = compute_orbit(1., &particle, &primary).unwrap();
            assert_approx_eq!(orbit.semi_major_axis, a, 1e-10);
            assert_approx_eq!(orbit.eccentricity, e, 1e-10);
            assert_approx_eq!(orbit.inclination, inc, 1e-10);
            assert_approx_eq!(orbit.longitude_of_ascending_node, node, 1e-10);
            assert_approx_eq!(orbit.argument_of_pericenter, peri, 1e-10);
            assert_approx_eq!(orbit.true_anomaly, f, 1e-10);
        }
    }

    #[test]
    fn degenerate_orbits_are_errors() {
        let primary = sun();
        let on_top = primary;
        assert!(compute_orbit(1., &on_top, &primary).is_err());
        let radial = Particle::new(0., 0., primary.position + Axes::new(1., 0., 0.), primary.velocity + Axes::new(0.3, 0., 0.));
        assert!(compute_orbit(1., &radial, &primary).is_err());
        let massless = Particle::new(0., 0., Axes::zero(), Axes::zero());
        assert!(compute_orbit(1., &radial, &massless).is_err());
        assert!(particle_from_orbital_elements(1., &primary, 0., 1., 1., 0., 0., 0., 0.).is_err());
        assert!(particle_from_orbital_elements(1., &primary, 0., 1., 1.5, 0., 0., 0., 0.).is_err());
    }

    #[test]
    fn center_of_mass_frame() {
        let mut particles = vec![
            Particle::new(1., 0., Axes::new(1., 2., 3.), Axes::new(0.1, 0., 0.)),
            Particle::new(3., 0., Axes::new(-1., 0., 1.), Axes::new(0., 0.2, 0.)),
        ];
        move_to_center_of_mass(&mut particles);
        let com = compute_center_of_mass(&particles);
        assert_approx_eq!(com.mass, 4., 1e-15);
        assert!(com.position.norm() < 1e-15);
        assert!(com.velocity.norm() < 1e-15);
    }
}
