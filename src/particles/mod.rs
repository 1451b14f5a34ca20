mod particle;
mod axes;

pub use self::particle::Particle;
pub use self::axes::Axes;
