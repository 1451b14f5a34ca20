use super::constants::MEGNO_RENORMALIZATION_THRESHOLD;
use super::particles::{Axes, Particle};

const GOLDEN_RATIO_CONJUGATE: f64 = 0.618033988749894848204586834365638118;

/// Running statistics of the Mean Exponential Growth factor of Nearby Orbits
/// (Cincotta & Simo 2000). The variational particles themselves live in the
/// particle array, right after the real ones.
///
/// The Lyapunov characteristic number is estimated from the slope of <Y>(t),
/// i.e. 2*cov(<Y>, t)/var(t), using a single-pass update.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct Megno {
    delta: f64,         // Norm of the initial displacement
    ys: f64,            // Running integral of 2*t*d(ln delta)/dt
    yss: f64,           // Running integral of Y(t)
    cov_yt: f64,        // Covariance of <Y> and t
    var_t: f64,         // Variance of t
    mean_t: f64,
    mean_y: f64,
    n: u64,
    renormalizations: u64,
}

impl Megno {
    pub fn new(delta: f64) -> Megno {
        Megno {
            delta: delta,
            ys: 0.,
            yss: 0.,
            cov_yt: 0.,
            var_t: 0.,
            mean_t: 0.,
            mean_y: 0.,
            n: 0,
            renormalizations: 0,
        }
    }

    /// Initial shadow particles, one per real particle: positions hold the
    /// displacement and velocities its rate of change. Components follow a
    /// golden-ratio sequence so that runs are reproducible, and every shadow is
    /// scaled to norm `delta`.
    pub fn initial_displacements(real: &[Particle], delta: f64) -> Vec<Particle> {
        real.iter().enumerate().map(|(i, particle)| {
            let mut components = [0.; 6];
            for (k, component) in components.iter_mut().enumerate() {
                let index = (6*i + k + 1) as f64;
                *component = (index*GOLDEN_RATIO_CONJUGATE).fract() - 0.5;
            }
            let norm = components.iter().map(|c| c*c).sum::<f64>().sqrt();
            let scale = delta/norm;
            let mut shadow = Particle::new(particle.mass, 0.,
                Axes::new(components[0], components[1], components[2]) * scale,
                Axes::new(components[3], components[4], components[5]) * scale);
            shadow.id = particle.id;
            shadow
        }).collect()
    }

    /// d(delta)/dt / delta, using every variational particle
    pub fn deltad_delta(variational: &[Particle]) -> f64 {
        let mut deltad = 0.;
        let mut delta2 = 0.;
        for p in variational.iter() {
            deltad += p.velocity.dot(&p.position) + p.acceleration.dot(&p.velocity);
            delta2 += p.position.norm2() + p.velocity.norm2();
        }
        if delta2 > 0. { deltad/delta2 } else { 0. }
    }

    pub fn norm2(variational: &[Particle]) -> f64 {
        variational.iter().map(|p| p.position.norm2() + p.velocity.norm2()).sum()
    }

    /// Add the contribution of the step that just ended at time `t` and lasted `dt`.
    pub fn update(&mut self, variational: &[Particle], t: f64, dt: f64) {
        if t == 0. {
            return;
        }
        let dy = dt * 2. * t * Megno::deltad_delta(variational);
        // Running Y(t)
        self.ys += dy;
        let y = self.ys/t;
        // Average <Y>
        self.yss += y*dt;
        // Covariance of (<Y>, t) and variance of t
        self.n += 1;
        let n = self.n as f64;
        let d_t = t - self.mean_t;
        self.mean_t += d_t/n;
        let d_y = self.yss/t - self.mean_y;
        self.mean_y += d_y/n;
        self.cov_yt += (n - 1.)/n * d_t * d_y;
        self.var_t += (n - 1.)/n * d_t * d_t;
    }

    /// Rescale the shadows to norm `delta` when they have grown past the
    /// floating point safe range. Returns true if they were modified.
    pub fn renormalize(&mut self, variational: &mut [Particle]) -> bool {
        let delta2 = Megno::norm2(variational);
        if !(delta2 > MEGNO_RENORMALIZATION_THRESHOLD) || !delta2.is_finite() {
            return false;
        }
        let scale = self.delta/delta2.sqrt();
        for p in variational.iter_mut() {
            p.position = p.position * scale;
            p.velocity = p.velocity * scale;
            p.acceleration = p.acceleration * scale;
        }
        self.renormalizations += 1;
        debug!("Variational particles renormalized (|delta|^2 = {:e})", delta2);
        true
    }

    /// Mean exponential growth factor <Y> at time `t`
    pub fn megno(&self, t: f64) -> f64 {
        if t == 0. {
            return 0.;
        }
        self.yss/t
    }

    /// Largest Lyapunov characteristic number. <Y> grows as lambda*t/2 for
    /// chaotic orbits.
    pub fn lyapunov(&self) -> f64 {
        if self.var_t == 0. {
            return 0.;
        }
        2.*self.cov_yt/self.var_t
    }

    pub fn renormalizations(&self) -> u64 {
        self.renormalizations
    }
}
