use super::super::constants::{PI, WHFAST_NMAX_QUART, WHFAST_NMAX_NEWT, KEPLER_DERIVATIVE_STEP};
use super::super::particles::Axes;

const BISECTION_MAX_ITERATIONS: usize = 200;

/// Fast inverse factorial lookup table
const INVFACTORIAL: [f64; 14] = [1., 1., 1./2., 1./6., 1./24., 1./120., 1./720., 1./5040., 1./40320., 1./362880., 1./3628800., 1./39916800., 1./479001600., 1./6227020800.];

/// Advances a two-body relative orbit by `dt` using Stiefel/Stumpff universal
/// variables (Wisdom & Hernandez 2015, Rein & Tamayo 2015). Works for elliptic,
/// parabolic and hyperbolic orbits; `gm` is the gravitational parameter of the pair.
///
/// The first time the step exceeds an orbital period a warning is logged and
/// `timestep_warning` is increased so that it is not repeated.
pub fn kepler_step(position: &mut Axes, velocity: &mut Axes, gm: f64, dt: f64, timestep_warning: &mut usize) {
    let p1_position = *position;
    let p1_velocity = *velocity;

    let r0 = p1_position.norm();
    let r0i = 1./r0;
    let v2 = p1_velocity.norm2();
    let beta = 2.*gm*r0i - v2;
    let eta0 = p1_position.dot(&p1_velocity);
    let zeta0 = gm - beta*r0;
    let mut x;
    let mut gs;
    let mut invperiod = 0.; // only used for beta>0.
    let x_per_period;

    if beta > 0. {
        // Elliptic orbit
        let sqrt_beta = beta.sqrt();
        invperiod = sqrt_beta*beta / (2.*PI*gm);
        x_per_period = 2.*PI / sqrt_beta;
        if dt.abs()*invperiod > 1. && *timestep_warning == 0 {
            warn!("Kepler solver convergence issue: timestep is larger than at least one orbital period");
            *timestep_warning += 1;
        }
        let dtr0i = dt*r0i;
        x = dtr0i * (1. - dtr0i*eta0*0.5*r0i); // second order guess
    } else {
        // Hyperbolic orbit
        x = 0.;
        x_per_period = std::f64::NAN; // nan triggers Newton's method
    }

    let mut converged = false;
    let mut old_x = x;

    // One Newton step
    gs = stiefel_gs3(beta, x);
    let eta0_gs1_zeta0_gs2 = eta0*gs[1] + zeta0*gs[2];
    let mut ri = 1./(r0 + eta0_gs1_zeta0_gs2);
    x = ri*(x*eta0_gs1_zeta0_gs2 - eta0*gs[2] - zeta0*gs[3] + dt);

    // Choose solver depending on estimated step size
    if !x_per_period.is_nan() && (x-old_x).abs() > 0.01*x_per_period {
        // Quartic solver (Laguerre-Conway)
        x = beta*dt/gm;
        let mut prev_x = [0.; WHFAST_NMAX_QUART+1];
        'outer: for n_lag in 1..WHFAST_NMAX_QUART {
            gs = stiefel_gs3(beta, x);
            let f = r0*x + eta0*gs[2] + zeta0*gs[3] - dt;
            let fp = r0 + eta0*gs[1] + zeta0*gs[2];
            let fpp = eta0*gs[0] + zeta0*gs[1];
            let denom = fp + (16.*fp*fp - 20.*f*fpp).abs().sqrt();
            x = (x*denom - 5.*f)/denom;
            for previous in prev_x.iter().take(n_lag).skip(1) {
                if x == *previous {
                    converged = true;
                    break 'outer;
                }
            }
            prev_x[n_lag] = x;
        }
        let eta0_gs1_zeta0_gs2 = eta0*gs[1] + zeta0*gs[2];
        ri = 1./(r0 + eta0_gs1_zeta0_gs2);
    } else {
        // Newton's method
        let mut old_x2;
        for _ in 1..WHFAST_NMAX_NEWT {
            old_x2 = old_x;
            old_x = x;
            gs = stiefel_gs3(beta, x);
            let eta0_gs1_zeta0_gs2 = eta0*gs[1] + zeta0*gs[2];
            ri = 1./(r0 + eta0_gs1_zeta0_gs2);
            x = ri*(x*eta0_gs1_zeta0_gs2 - eta0*gs[2] - zeta0*gs[3] + dt);
            if x == old_x || x == old_x2 {
                converged = true;
                break;
            }
        }
    }

    // Fallback to bisection
    if !converged {
        let mut x_min;
        let mut x_max;
        if beta > 0. {
            x_min = x_per_period * (dt*invperiod).floor();
            x_max = x_min + x_per_period;
        } else {
            let h2 = r0*r0*v2 - eta0*eta0;
            let q = h2/gm/(1. + (1. - h2*beta/(gm*gm)).sqrt());
            let vq = h2.sqrt()/q;
            x_min = 1./(vq + r0/dt);
            x_max = dt/q;
        }
        x = (x_max + x_min)/2.;
        for _ in 0..BISECTION_MAX_ITERATIONS {
            gs = stiefel_gs3(beta, x);
            let s = r0*x + eta0*gs[2] + zeta0*gs[3] - dt;
            if s >= 0. {
                x_max = x;
            } else {
                x_min = x;
            }
            x = (x_max + x_min)/2.;
            if !((x_max-x_min).abs()/x_max.abs() > 1e-15) {
                break;
            }
        }
        let eta0_gs1_zeta0_gs2 = eta0*gs[1] + zeta0*gs[2];
        ri = 1./(r0 + eta0_gs1_zeta0_gs2);
    }
    if ri.is_nan() {
        // (Almost) straight line motion in the hyperbolic case
        ri = 0.;
        gs[1] = 0.;
        gs[2] = 0.;
        gs[3] = 0.;
    }

    // Not the traditional f and g functions
    let f = -gm*gs[2]*r0i;
    let g = dt - gm*gs[3];
    let fd = -gm*gs[1]*r0i*ri;
    let gd = -gm*gs[2]*ri;

    *position += p1_position * f + p1_velocity * g;
    *velocity += p1_position * fd + p1_velocity * gd;
}

/// Propagates a variational displacement (`delta_position`, `delta_velocity`)
/// through the same Kepler drift as the orbit (`position`, `velocity`), which must
/// still hold the state at the beginning of the drift. The linearised map is
/// obtained by a central finite difference scaled to the size of the orbit.
pub fn kepler_variational_step(position: &Axes, velocity: &Axes, delta_position: &mut Axes, delta_velocity: &mut Axes, gm: f64, dt: f64, timestep_warning: &mut usize) {
    let relative_position = if position.norm() > 0. { delta_position.norm()/position.norm() } else { delta_position.norm() };
    let relative_velocity = if velocity.norm() > 0. { delta_velocity.norm()/velocity.norm() } else { delta_velocity.norm() };
    let scale = relative_position.max(relative_velocity);
    if scale == 0. || !scale.is_finite() {
        return;
    }
    let lambda = KEPLER_DERIVATIVE_STEP / scale;

    let mut plus_position = *position + *delta_position * lambda;
    let mut plus_velocity = *velocity + *delta_velocity * lambda;
    let mut minus_position = *position - *delta_position * lambda;
    let mut minus_velocity = *velocity - *delta_velocity * lambda;
    kepler_step(&mut plus_position, &mut plus_velocity, gm, dt, timestep_warning);
    kepler_step(&mut minus_position, &mut minus_velocity, gm, dt, timestep_warning);

    let inv_two_lambda = 0.5/lambda;
    *delta_position = (plus_position - minus_position) * inv_two_lambda;
    *delta_velocity = (plus_velocity - minus_velocity) * inv_two_lambda;
}

fn stiefel_gs3(beta: f64, x: f64) -> [f64; 6] {
    let x2 = x.powi(2);
    let mut gs = stumpff_cs3(beta*x2);
    gs[1] *= x;
    gs[2] *= x2;
    gs[3] *= x2*x;
    gs
}

fn stumpff_cs3(z: f64) -> [f64; 6] {
    if !z.is_finite() {
        return [std::f64::NAN; 6];
    }
    let mut z = z;
    let mut n = 0;
    while z.abs() > 0.1 {
        z = z/4.;
        n += 1;
    }
    let mut cs = [0.; 6];
    let nmax = 13;
    let mut c_odd = INVFACTORIAL[nmax];
    let mut c_even = INVFACTORIAL[nmax-1];

    let mut np = nmax-2;
    while np >= 3 {
        c_odd = INVFACTORIAL[np] - z*c_odd;
        c_even = INVFACTORIAL[np-1] - z*c_even;
        np -= 2;
    }
    cs[3] = c_odd;
    cs[2] = c_even;
    cs[1] = INVFACTORIAL[1] - z*c_odd;
    cs[0] = INVFACTORIAL[0] - z*c_even;
    while n > 0 {
        cs[3] = (cs[2] + cs[0]*cs[3])*0.25;
        cs[2] = cs[1]*cs[1]*0.5;
        cs[1] = cs[0]*cs[1];
        cs[0] = 2.*cs[0]*cs[0] - 1.;
        n -= 1;
    }
    cs
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::super::constants::TWO_PI;

    fn energy(position: &Axes, velocity: &Axes, gm: f64) -> f64 {
        0.5*velocity.norm2() - gm/position.norm()
    }

    #[test]
    fn stumpff_functions_at_zero() {
        let cs = stumpff_cs3(0.);
        assert_eq!(cs[0], 1.);
        assert_eq!(cs[1], 1.);
        assert_eq!(cs[2], 0.5);
        assert_approx_eq!(cs[3], 1./6., 1e-16);
    }

    #[test]
    fn circular_orbit_returns_after_one_period() {
        let mut position = Axes::new(1., 0., 0.);
        let mut velocity = Axes::new(0., 1., 0.);
        let mut warning = 0;
        for _ in 0..100 {
            kepler_step(&mut position, &mut velocity, 1., TWO_PI/100., &mut warning);
        }
        assert_approx_eq!(position.x, 1., 1e-12);
        assert_approx_eq!(position.y, 0., 1e-12);
        assert_approx_eq!(velocity.y, 1., 1e-12);
        assert_eq!(warning, 0);
    }

    #[test]
    fn eccentric_and_hyperbolic_orbits_conserve_energy() {
        let mut warning = 0;
        for &(speed, dt) in &[(1.3, 0.7), (1.6, 3.), (2.5, 10.)] {
            let mut position = Axes::new(1., 0., 0.);
            let mut velocity = Axes::new(0., speed, 0.1);
            let initial_energy = energy(&position, &velocity, 1.);
            let initial_momentum = position.cross(&velocity);
            kepler_step(&mut position, &mut velocity, 1., dt, &mut warning);
            assert_approx_eq!(energy(&position, &velocity, 1.), initial_energy, 1e-12);
            assert!((position.cross(&velocity) - initial_momentum).norm() < 1e-12);
        }
    }

    #[test]
    fn backward_step_undoes_forward_step() {
        let mut position = Axes::new(0.7, 0.2, -0.1);
        let mut velocity = Axes::new(-0.3, 1.1, 0.05);
        let mut warning = 0;
        kepler_step(&mut position, &mut velocity, 1., 0.37, &mut warning);
        kepler_step(&mut position, &mut velocity, 1., -0.37, &mut warning);
        assert!((position - Axes::new(0.7, 0.2, -0.1)).norm() < 1e-13);
        assert!((velocity - Axes::new(-0.3, 1.1, 0.05)).norm() < 1e-13);
    }

    #[test]
    fn long_step_warns_once() {
        let mut position = Axes::new(1., 0., 0.);
        let mut velocity = Axes::new(0., 1., 0.);
        let mut warning = 0;
        kepler_step(&mut position, &mut velocity, 1., 3.*TWO_PI + 0.1, &mut warning);
        kepler_step(&mut position, &mut velocity, 1., 3.*TWO_PI + 0.1, &mut warning);
        assert_eq!(warning, 1);
        assert!(position.is_finite());
    }

    #[test]
    fn variational_step_follows_nearby_orbit() {
        let position = Axes::new(1., 0., 0.);
        let velocity = Axes::new(0., 1.1, 0.);
        let mut delta_position = Axes::new(1e-9, 2e-9, 0.);
        let mut delta_velocity = Axes::new(0., -1e-9, 1e-9);
        let mut warning = 0;

        let mut shifted_position = position + delta_position;
        let mut shifted_velocity = velocity + delta_velocity;
        kepler_step(&mut shifted_position, &mut shifted_velocity, 1., 0.5, &mut warning);
        let mut drifted_position = position;
        let mut drifted_velocity = velocity;
        kepler_step(&mut drifted_position, &mut drifted_velocity, 1., 0.5, &mut warning);

        kepler_variational_step(&position, &velocity, &mut delta_position, &mut delta_velocity, 1., 0.5, &mut warning);
        assert!((drifted_position + delta_position - shifted_position).norm() < 1e-14);
        assert!((drifted_velocity + delta_velocity - shifted_velocity).norm() < 1e-14);
    }

    #[test]
    fn zero_variation_stays_zero() {
        let mut delta_position = Axes::zero();
        let mut delta_velocity = Axes::zero();
        let mut warning = 0;
        kepler_variational_step(&Axes::new(1., 0., 0.), &Axes::new(0., 1., 0.), &mut delta_position, &mut delta_velocity, 1., 0.1, &mut warning);
        assert_eq!(delta_position, Axes::zero());
        assert_eq!(delta_velocity, Axes::zero());
    }
}
