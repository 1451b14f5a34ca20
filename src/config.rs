use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use serde_json;
use super::constants::{DEFAULT_G, DEFAULT_TIME_STEP, DEFAULT_OPENING_ANGLE2};
use super::constants::{INTEGRATOR_EPSILON, INTEGRATOR_EPSILON_GLOBAL, INTEGRATOR_MIN_DT, INTEGRATOR_MAX_DT};
use super::constants::{HYBRID_SWITCH_RATIO, HYBRID_HYSTERESIS};
use super::error::{Result, invalid_configuration};
use super::particles::{Axes, Particle};

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum GravityMode {
    None,
    Basic,
    Compensated,
    Tree,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum BoundaryKind {
    None,
    Open,
    Periodic,
    Shear,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum CollisionMode {
    None,
    Direct,
    Tree,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum IntegratorKind {
    Ias15,
    WHFast,
    Wh,
    Sei,
    LeapFrog,
    Hybrid,
}

impl IntegratorKind {
    /// Integrators that split the Hamiltonian around a central body at index 0
    pub fn needs_central_body(&self) -> bool {
        match self {
            IntegratorKind::WHFast | IntegratorKind::Wh | IntegratorKind::Hybrid => true,
            _ => false,
        }
    }
}

/// Simulation box made of `root_nx * root_ny * root_nz` cubic root cells
/// centered on the origin.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoxGeometry {
    pub root_size: f64,
    pub root_nx: usize,
    pub root_ny: usize,
    pub root_nz: usize,
}

impl BoxGeometry {
    pub fn new(root_size: f64, root_nx: usize, root_ny: usize, root_nz: usize) -> BoxGeometry {
        BoxGeometry { root_size: root_size, root_nx: root_nx, root_ny: root_ny, root_nz: root_nz }
    }

    pub fn boxsize(&self) -> Axes {
        Axes {
            x: self.root_size * self.root_nx as f64,
            y: self.root_size * self.root_ny as f64,
            z: self.root_size * self.root_nz as f64,
        }
    }

    pub fn boxsize_max(&self) -> f64 {
        let boxsize = self.boxsize();
        boxsize.x.max(boxsize.y).max(boxsize.z)
    }

    pub fn root_n(&self) -> usize {
        self.root_nx * self.root_ny * self.root_nz
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.root_size.is_finite() && self.root_size > 0.) {
            return invalid_configuration(format!("root box size must be positive and finite (got {})", self.root_size));
        }
        if self.root_nx == 0 || self.root_ny == 0 || self.root_nz == 0 {
            return invalid_configuration("the number of root boxes must be at least one per axis");
        }
        Ok(())
    }
}

impl Default for BoxGeometry {
    fn default() -> BoxGeometry {
        BoxGeometry::new(1., 1, 1, 1)
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Ias15Config {
    pub epsilon: f64,           // 0 means fixed timestep
    pub epsilon_global: bool,
    pub min_dt: f64,
    pub max_dt: f64,            // 0 means unlimited
}

impl Default for Ias15Config {
    fn default() -> Ias15Config {
        Ias15Config {
            epsilon: INTEGRATOR_EPSILON,
            epsilon_global: INTEGRATOR_EPSILON_GLOBAL,
            min_dt: INTEGRATOR_MIN_DT,
            max_dt: INTEGRATOR_MAX_DT,
        }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WHFastConfig {
    pub corrector: u32,         // Symplectic corrector order: 0 (disabled) or 3
    pub safe_mode: bool,        // Synchronize after every step
}

impl Default for WHFastConfig {
    fn default() -> WHFastConfig {
        WHFastConfig { corrector: 0, safe_mode: true }
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SeiConfig {
    pub omega: f64,             // Epicyclic frequency
    pub omega_z: Option<f64>,   // Vertical frequency (defaults to omega)
}

impl Default for SeiConfig {
    fn default() -> SeiConfig {
        SeiConfig { omega: 1., omega_z: None }
    }
}

impl SeiConfig {
    pub fn vertical_frequency(&self) -> f64 {
        self.omega_z.unwrap_or(self.omega)
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HybridConfig {
    pub switch_ratio: f64,      // Encounter threshold in mutual Hill radii
    pub hysteresis: f64,        // Switch back once separation exceeds switch_ratio*hysteresis
}

impl Default for HybridConfig {
    fn default() -> HybridConfig {
        HybridConfig { switch_ratio: HYBRID_SWITCH_RATIO, hysteresis: HYBRID_HYSTERESIS }
    }
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub G: f64,
    pub softening: f64,
    pub dt: f64,
    pub exact_finish_time: bool,
    pub n_active: Option<usize>,            // None: every real particle sources gravity
    pub box_geometry: BoxGeometry,
    pub nghostx: usize,
    pub nghosty: usize,
    pub nghostz: usize,
    pub gravity: GravityMode,
    pub boundary: BoundaryKind,
    pub collision: CollisionMode,
    pub integrator: IntegratorKind,
    pub opening_angle2: f64,
    pub tree_quadrupole: bool,
    pub force_is_velocity_dependent: bool,
    pub minimum_collision_velocity: f64,
    pub ias15: Ias15Config,
    pub whfast: WHFastConfig,
    pub sei: SeiConfig,
    pub hybrid: HybridConfig,
}

impl Default for SimulationConfig {
    fn default() -> SimulationConfig {
        SimulationConfig {
            G: DEFAULT_G,
            softening: 0.,
            dt: DEFAULT_TIME_STEP,
            exact_finish_time: true,
            n_active: None,
            box_geometry: BoxGeometry::default(),
            nghostx: 0,
            nghosty: 0,
            nghostz: 0,
            gravity: GravityMode::Basic,
            boundary: BoundaryKind::None,
            collision: CollisionMode::None,
            integrator: IntegratorKind::Ias15,
            opening_angle2: DEFAULT_OPENING_ANGLE2,
            tree_quadrupole: false,
            force_is_velocity_dependent: true,
            minimum_collision_velocity: 0.,
            ias15: Ias15Config::default(),
            whfast: WHFastConfig::default(),
            sei: SeiConfig::default(),
            hybrid: HybridConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Reject invalid mode combinations before any step runs. `n_real` and `n_var`
    /// split the particle array into physical and variational particles.
    pub fn validate(&self, particles: &[Particle], n_var: usize) -> Result<()> {
        let n_real = particles.len().saturating_sub(n_var);
        if !(self.G.is_finite()) {
            return invalid_configuration("gravitational constant must be finite");
        }
        if !(self.softening.is_finite() && self.softening >= 0.) {
            return invalid_configuration(format!("softening must be non-negative (got {})", self.softening));
        }
        if !(self.dt.is_finite() && self.dt != 0.) {
            return invalid_configuration(format!("timestep must be finite and non-zero (got {})", self.dt));
        }
        if !(self.opening_angle2.is_finite() && self.opening_angle2 >= 0.) {
            return invalid_configuration(format!("opening_angle2 must be non-negative (got {})", self.opening_angle2));
        }
        if let Some(n_active) = self.n_active {
            if n_active > n_real {
                return invalid_configuration(format!("n_active ({}) exceeds the number of real particles ({})", n_active, n_real));
            }
        }
        self.box_geometry.validate()?;

        let bounded = self.boundary != BoundaryKind::None;
        if self.gravity == GravityMode::Tree && !bounded {
            return invalid_configuration("tree gravity needs a simulation box (boundary must not be None)");
        }
        if self.collision == CollisionMode::Tree {
            if !bounded {
                return invalid_configuration("tree collision search needs a simulation box (boundary must not be None)");
            }
            if self.gravity != GravityMode::Tree {
                return invalid_configuration("tree collision search needs the spatial index built by tree gravity");
            }
        }
        if self.boundary == BoundaryKind::Shear && self.integrator != IntegratorKind::Sei {
            return invalid_configuration("shear boundaries are only supported by the SEI integrator");
        }

        if !(self.ias15.epsilon.is_finite() && self.ias15.epsilon >= 0.) {
            return invalid_configuration("IAS15 epsilon must be non-negative");
        }
        if self.ias15.min_dt < 0. || self.ias15.max_dt < 0. {
            return invalid_configuration("IAS15 min_dt and max_dt must be non-negative");
        }
        if self.whfast.corrector != 0 && self.whfast.corrector != 3 {
            return invalid_configuration(format!("WHFast corrector order {} is not supported (use 0 or 3)", self.whfast.corrector));
        }
        if !(self.sei.omega.is_finite() && self.sei.omega > 0.) || !(self.sei.vertical_frequency().is_finite() && self.sei.vertical_frequency() > 0.) {
            return invalid_configuration("SEI frequencies must be positive");
        }
        if !(self.hybrid.switch_ratio > 0.) || !(self.hybrid.hysteresis >= 1.) {
            return invalid_configuration("hybrid switch_ratio must be positive and hysteresis at least 1");
        }

        if self.integrator.needs_central_body() {
            match particles.first() {
                Some(central) if central.mass > 0. => {},
                Some(_) => return invalid_configuration("Wisdom-Holman integrators need a massive central body at index 0"),
                None => {},
            }
        }
        if n_var > 0 {
            if self.boundary == BoundaryKind::Periodic || self.boundary == BoundaryKind::Shear {
                return invalid_configuration("variational particles are not supported with periodic or shear boundaries");
            }
            if self.gravity == GravityMode::Tree {
                return invalid_configuration("variational particles need direct gravity (basic or compensated)");
            }
        }
        Ok(())
    }
}

/// Initial conditions read by the command line tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDescription {
    #[serde(default)]
    pub config: SimulationConfig,
    pub particles: Vec<Particle>,
    #[serde(default)]
    pub megno_delta: Option<f64>,   // Initialize the variational tracker with this displacement
}

impl CaseDescription {
    pub fn from_json_file(path: &Path) -> Result<CaseDescription> {
        let reader = BufReader::new(File::open(path)?);
        let case: CaseDescription = serde_json::from_reader(reader)?;
        Ok(case)
    }
}
