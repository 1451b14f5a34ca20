pub const PI : f64 = std::f64::consts::PI;
pub const TWO_PI : f64 = std::f64::consts::PI * 2.;

//// Defaults for the simulation context
pub const DEFAULT_G : f64 = 1.;                    // Gravitational constant (code units)
pub const DEFAULT_TIME_STEP : f64 = 0.001;
pub const DEFAULT_OPENING_ANGLE2 : f64 = 0.25;     // Square of the cell opening angle
pub const TINY : f64 = 1.0e-308;                   // Used to detect degenerate orbits
pub const MIN_REL_ERROR : f64 = 1.0e-12;           // Radial orbit detection (h/(r*v))

//// Constants for IAS15 integrator (to be ignored for others)
pub const INTEGRATOR_EPSILON : f64 = 1e-9;          // Precision parameter
                                                    // If it is zero, then a constant timestep is used.
pub const INTEGRATOR_EPSILON_GLOBAL : bool = true;  // if true: estimate the fractional error by max(acceleration_error)/max(acceleration), where max is take over all particles.
                                                    // if false: estimate the fractional error by max(acceleration_error/acceleration).
pub const INTEGRATOR_MIN_DT : f64 = 0.;             // Minimum timestep used as a floor when adaptive timestepping is enabled
pub const INTEGRATOR_MAX_DT : f64 = 0.;             // Maximum timestep (0 = no limit)
pub const SAFETY_FACTOR : f64 = 0.25;               // Maximum increase/deacrease of consecutve timesteps
pub const INTEGRATOR_CONVERGED_ERROR : f64 = 1e-16; // Predictor corrector loop stops below this change in b6
pub const INTEGRATOR_MAX_ITERATIONS : usize = 12;   // Predictor corrector loop cap
pub const INTEGRATOR_ITERATIONS_WARNING : usize = 10;

///// Constants for WHFast
pub const WHFAST_NMAX_QUART : usize = 64;           // Maximum number of iterations for quartic solver
pub const WHFAST_NMAX_NEWT : usize = 32;            // Maximum number of iterations for Newton's method
pub const WHFAST_CORRECTOR_A1 : f64 = 0.41833001326703777398908601289259374469640768464934; // sqrt(7/40)
pub const WHFAST_CORRECTOR_B31 : f64 = -0.024900596027799867499350357910273437184309981229127; // -sqrt(10/7)/48
pub const KEPLER_DERIVATIVE_STEP : f64 = 1e-6;      // Relative perturbation used to linearize the Kepler drift

///// Constants for the hybrid integrator
pub const HYBRID_SWITCH_RATIO : f64 = 8.;           // In units of the mutual Hill radius
pub const HYBRID_HYSTERESIS : f64 = 1.25;

///// Spatial tree
pub const TREE_MAX_DEPTH : usize = 128;             // Coincident particles share a bucket below this depth

///// MEGNO
pub const MEGNO_RENORMALIZATION_THRESHOLD : f64 = 1e100; // Shadow displacements are rescaled above this squared norm
