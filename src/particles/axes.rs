use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Axes {
    pub fn new(x: f64, y: f64, z: f64) -> Axes {
        Axes { x: x, y: y, z: z }
    }

    pub fn zero() -> Axes {
        Axes { x: 0., y: 0., z: 0. }
    }

    pub fn dot(&self, other: &Axes) -> f64 {
        self.x*other.x + self.y*other.y + self.z*other.z
    }

    pub fn cross(&self, other: &Axes) -> Axes {
        Axes {
            x: self.y*other.z - self.z*other.y,
            y: self.z*other.x - self.x*other.z,
            z: self.x*other.y - self.y*other.x,
        }
    }

    pub fn norm2(&self) -> f64 {
        self.dot(self)
    }

    pub fn norm(&self) -> f64 {
        self.norm2().sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Axes {
    type Output = Axes;
    fn add(self, other: Axes) -> Axes {
        Axes { x: self.x + other.x, y: self.y + other.y, z: self.z + other.z }
    }
}

impl Sub for Axes {
    type Output = Axes;
    fn sub(self, other: Axes) -> Axes {
        Axes { x: self.x - other.x, y: self.y - other.y, z: self.z - other.z }
    }
}

impl Mul<f64> for Axes {
    type Output = Axes;
    fn mul(self, factor: f64) -> Axes {
        Axes { x: self.x*factor, y: self.y*factor, z: self.z*factor }
    }
}

impl Neg for Axes {
    type Output = Axes;
    fn neg(self) -> Axes {
        Axes { x: -self.x, y: -self.y, z: -self.z }
    }
}

impl AddAssign for Axes {
    fn add_assign(&mut self, other: Axes) {
        self.x += other.x;
        self.y += other.y;
        self.z += other.z;
    }
}

impl SubAssign for Axes {
    fn sub_assign(&mut self, other: Axes) {
        self.x -= other.x;
        self.y -= other.y;
        self.z -= other.z;
    }
}
