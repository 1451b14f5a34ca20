extern crate gravitas;
extern crate clap;
extern crate time;
extern crate env_logger;
#[macro_use]
extern crate log;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use gravitas::output::{read_snapshot, write_snapshot, DiagnosticsWriter};
use gravitas::{CaseDescription, IntegrationStatus, Simulation};
use log::LevelFilter;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;

fn init_logger(silent: bool) {
    let level = if silent { LevelFilter::Warn } else { LevelFilter::Info };
    env_logger::Builder::new()
        .format(|buf, record| {
            let now = time::OffsetDateTime::now_utc();
            writeln!(buf, "[{} {:04}.{:02}.{:02} {:02}:{:02}:{:02} UTC] {}", record.level(),
                     now.year(), now.month() as u8, now.day(), now.hour(), now.minute(), now.second(), record.args())
        })
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run_arguments(command: Command) -> Command {
    command
        .arg(Arg::new("tmax")
            .long("tmax")
            .value_name("time")
            .required(true)
            .value_parser(value_parser!(f64))
            .help("Final time of the integration (0 runs until the simulation stops by itself)"))
        .arg(Arg::new("diagnostics_interval")
            .long("diagnostics-interval")
            .value_name("time")
            .default_value("1.0")
            .value_parser(value_parser!(f64))
            .help("Time between diagnostics rows"))
        .arg(Arg::new("snapshot_every")
            .long("snapshot-every")
            .value_name("rows")
            .default_value("100")
            .value_parser(value_parser!(u64))
            .help("Write a recovery snapshot every this many diagnostics rows"))
        .arg(Arg::new("diagnostics_filename")
            .long("diagnostics")
            .value_name("csv")
            .value_parser(value_parser!(PathBuf))
            .help("CSV file with energy, collisions and MEGNO"))
        .arg(Arg::new("silent")
            .short('s')
            .long("silent")
            .action(ArgAction::SetTrue)
            .help("Only print WARNING/ERROR messages"))
}

struct RunOptions {
    tmax: f64,
    interval: f64,
    snapshot_every: u64,
    diagnostics_path: Option<PathBuf>,
}

impl RunOptions {
    fn from_matches(matches: &ArgMatches) -> RunOptions {
        RunOptions {
            tmax: matches.get_one::<f64>("tmax").copied().unwrap_or(0.),
            interval: matches.get_one::<f64>("diagnostics_interval").copied().unwrap_or(1.),
            snapshot_every: matches.get_one::<u64>("snapshot_every").copied().unwrap_or(100).max(1),
            diagnostics_path: matches.get_one::<PathBuf>("diagnostics_filename").cloned(),
        }
    }
}

fn start(case_path: &Path, snapshot_path: &Path) -> gravitas::Result<Simulation> {
    if snapshot_path.exists() {
        return Err(gravitas::Error::InvalidConfiguration(format!("file '{}' already exists", snapshot_path.display())));
    }
    let case = CaseDescription::from_json_file(case_path)?;
    let mut sim = Simulation::new(case.config, case.particles)?;
    if let Some(delta) = case.megno_delta {
        sim.megno_init(delta)?;
    }
    info!("Created new simulation based on '{}' ({} particles, {:?} integrator)", case_path.display(), sim.n_real(), sim.config.integrator);
    Ok(sim)
}

fn run(sim: &mut Simulation, snapshot_path: &Path, options: &RunOptions) -> gravitas::Result<IntegrationStatus> {
    if !(options.interval > 0.) {
        return Err(gravitas::Error::InvalidConfiguration("diagnostics interval must be positive".to_string()));
    }
    let mut diagnostics = match options.diagnostics_path {
        Some(ref path) => Some(DiagnosticsWriter::create(path)?),
        None => None,
    };
    if let Some(diagnostics) = diagnostics.as_mut() {
        diagnostics.write(sim)?;
    }

    let forward = sim.dt > 0.;
    let mut rows = 0;
    let status = loop {
        let target = match (options.tmax == 0., forward) {
            (true, true) => sim.t + options.interval,
            (true, false) => sim.t - options.interval,
            (false, true) => (sim.t + options.interval).min(options.tmax),
            (false, false) => (sim.t - options.interval).max(options.tmax),
        };
        let status = sim.integrate(target)?;
        rows += 1;
        if let Some(diagnostics) = diagnostics.as_mut() {
            diagnostics.write(sim)?;
            diagnostics.flush()?;
        }
        if rows % options.snapshot_every == 0 {
            write_snapshot(snapshot_path, sim)?;
        }
        let reached = if forward { sim.t >= options.tmax } else { sim.t <= options.tmax };
        match status {
            IntegrationStatus::StoppedAtTmax if options.tmax == 0. || !reached => continue,
            other => break other,
        }
    };
    write_snapshot(snapshot_path, sim)?;
    Ok(status)
}

fn main() {
    let started = Instant::now();

    let matches = Command::new("gravitas")
        .version(env!("CARGO_PKG_VERSION"))
        .about("N-body integrator for gravitational dynamics, collisions and chaos indicators.")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(run_arguments(Command::new("start")
            .about("Start a simulation")
            .arg(Arg::new("start_case_filename")
                .required(true)
                .index(1)
                .value_parser(value_parser!(PathBuf))
                .help("JSON case description"))
            .arg(Arg::new("snapshot_filename")
                .required(true)
                .index(2)
                .value_parser(value_parser!(PathBuf))
                .help("Recovery snapshot filename (.json or binary)"))))
        .subcommand(run_arguments(Command::new("resume")
            .about("Resume a simulation")
            .arg(Arg::new("snapshot_filename")
                .required(true)
                .index(1)
                .value_parser(value_parser!(PathBuf))
                .help("Recovery snapshot filename"))))
        .get_matches();

    let (subcommand, sub_matches) = match matches.subcommand() {
        Some(pair) => pair,
        None => unreachable!(),
    };
    let resume = subcommand == "resume";
    init_logger(sub_matches.get_flag("silent"));
    let options = RunOptions::from_matches(sub_matches);
    let snapshot_path = match sub_matches.get_one::<PathBuf>("snapshot_filename") {
        Some(path) => path.clone(),
        None => unreachable!(),
    };

    let restored = if resume {
        read_snapshot(&snapshot_path)
    } else {
        match sub_matches.get_one::<PathBuf>("start_case_filename") {
            Some(case_path) => start(case_path, &snapshot_path),
            None => unreachable!(),
        }
    };
    let mut sim = match restored {
        Ok(sim) => sim,
        Err(e) => {
            error!("It was not possible to {} the simulation: {}", subcommand, e);
            process::exit(1);
        },
    };

    match run(&mut sim, &snapshot_path, &options) {
        Ok(status) => info!("Integration finished at t = {:e} ({:?})", sim.t, status),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        },
    }

    let elapsed = started.elapsed().as_secs_f64();
    if !resume {
        info!("Execution time: {} seconds", elapsed);
    } else {
        info!("Execution time since last resume: {} seconds", elapsed);
    }
}
