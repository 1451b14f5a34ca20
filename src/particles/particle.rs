use super::Axes;

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct Particle {
    pub id: usize, // Unique identifier, kept across removals
    pub mass: f64,
    pub radius: f64,
    pub position: Axes,
    pub velocity: Axes,
    pub acceleration: Axes,
    pub last_collision: f64, // Time of the last resolved collision
    /// Index of the tree cell holding this particle. Only valid until the next
    /// tree rebuild.
    #[serde(skip)]
    pub cell: Option<usize>,
}

impl Particle {
    pub fn new(mass: f64, radius: f64, position: Axes, velocity: Axes) -> Particle {
        Particle {
            id: 0, // To be set by the simulation
            mass: mass,
            radius: radius,
            position: position,
            velocity: velocity,
            acceleration: Axes::zero(),
            last_collision: 0.,
            cell: None,
        }
    }

    pub fn test_particle(position: Axes, velocity: Axes) -> Particle {
        Particle::new(0., 0., position, velocity)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite() && self.acceleration.is_finite()
    }
}

impl Default for Particle {
    fn default() -> Particle {
        Particle::new(0., 0., Axes::zero(), Axes::zero())
    }
}
