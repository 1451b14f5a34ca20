use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use super::error::Result;
use super::simulation::Simulation;
use super::tools::compute_total_energy;

fn is_json(path: &Path) -> bool {
    path.extension().map_or(false, |extension| extension == "json")
}

/// `name.ext` becomes `name.YYYYMMDDTHH.ext`, so backups are still read with
/// the format of the original snapshot
fn backup_path(snapshot_path: &Path, now: OffsetDateTime) -> PathBuf {
    let extension = snapshot_path.extension().and_then(|extension| extension.to_str()).unwrap_or("bin");
    let backup_extension = format!("{:04}{:02}{:02}T{:02}.{}", now.year(), now.month() as u8, now.day(), now.hour(), extension);
    snapshot_path.with_extension(backup_extension)
}

////////////////////////////////////////////////////////////////////////////////
//- Dump and restore functions
////////////////////////////////////////////////////////////////////////////////

/// Serialize the simulation (particles, configuration and integrator state) so
/// that it can be resumed. JSON if the extension is `.json`, binary otherwise.
///
/// An existing snapshot is renamed first, keeping at most one backup per hour
/// thanks to the filename collision.
pub fn write_snapshot(snapshot_path: &Path, sim: &Simulation) -> Result<()> {
    if snapshot_path.exists() {
        fs::rename(snapshot_path, backup_path(snapshot_path, OffsetDateTime::now_utc()))?;
    }

    // The buffer will be written out when the writer is dropped
    let mut writer = BufWriter::new(File::create(snapshot_path)?);
    if is_json(snapshot_path) {
        serde_json::to_writer_pretty(&mut writer, sim)?;
    } else {
        bincode::serialize_into(&mut writer, sim)?;
    }
    writer.flush()?;
    debug!("Snapshot written to '{}' at t = {:e}", snapshot_path.display(), sim.t);
    Ok(())
}

/// Restore a simulation written by `write_snapshot`. Hooks are not part of
/// snapshots and must be installed again.
pub fn read_snapshot(snapshot_path: &Path) -> Result<Simulation> {
    let reader = BufReader::new(File::open(snapshot_path)?);
    let sim: Simulation = if is_json(snapshot_path) {
        serde_json::from_reader(reader)?
    } else {
        bincode::deserialize_from(reader)?
    };
    sim.config.validate(&sim.particles, sim.n_var)?;
    info!("Restored simulation from '{}' (t = {:e}, {} particles)", snapshot_path.display(), sim.t, sim.n_real());
    Ok(sim)
}

////////////////////////////////////////////////////////////////////////////////
//- Diagnostics
////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Serialize)]
struct DiagnosticsRecord {
    time: f64,
    dt: f64,
    n_particles: usize,
    energy: f64,
    relative_energy_error: f64,
    collisions: u64,
    megno: Option<f64>,
    lyapunov: Option<f64>,
}

/// One CSV row per call with conserved quantities and chaos indicators. The
/// energy error is measured against the first written row.
pub struct DiagnosticsWriter<W: Write> {
    writer: csv::Writer<W>,
    initial_energy: Option<f64>,
}

impl DiagnosticsWriter<File> {
    pub fn create(path: &Path) -> Result<DiagnosticsWriter<File>> {
        Ok(DiagnosticsWriter::new(File::create(path)?))
    }
}

impl<W: Write> DiagnosticsWriter<W> {
    pub fn new(writer: W) -> DiagnosticsWriter<W> {
        DiagnosticsWriter {
            writer: csv::Writer::from_writer(writer),
            initial_energy: None,
        }
    }

    pub fn write(&mut self, sim: &Simulation) -> Result<()> {
        let energy = compute_total_energy(sim);
        let initial_energy = *self.initial_energy.get_or_insert(energy);
        let relative_energy_error = if initial_energy != 0. {
            (energy - initial_energy)/initial_energy
        } else {
            energy - initial_energy
        };
        self.writer.serialize(DiagnosticsRecord {
            time: sim.t,
            dt: sim.dt_last_done,
            n_particles: sim.n_real(),
            energy: energy,
            relative_energy_error: relative_energy_error,
            collisions: sim.collision_statistics.count,
            megno: sim.megno().ok(),
            lyapunov: sim.lyapunov().ok(),
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner()
            .map_err(|error| io::Error::new(error.error().kind(), error.error().to_string()).into())
    }
}
