#![allow(dead_code)]

pub mod systems;

use std::path::PathBuf;

pub fn simulation_properties() -> (f64, f64) {
    let time_step: f64 = 0.01; // in units where G = 1 and the inner orbit has a period of 2*pi
    let time_limit: f64 = 100.;
    (time_step, time_limit)
}

pub fn relative_energy_error(sim: &gravitas::Simulation, initial_energy: f64) -> f64 {
    ((gravitas::tools::compute_total_energy(sim) - initial_energy)/initial_energy).abs()
}

/// File under the system temporary directory, removed beforehand if present
pub fn temporary_path(filename: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("gravitas-{}-{}", std::process::id(), filename));
    if path.exists() {
        let _ = std::fs::remove_file(&path);
    }
    path
}
