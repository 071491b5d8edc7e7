//! Main arm executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise ArmCtrl from its parameters
//!     - Main loop:
//!         - Telecommand processing, from a script or from stdin
//!         - ArmCtrl processing (motion director tick)
//!         - Response output and archiving
//!
//! # Modules
//!
//! All modules (e.g. `arm_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use arm_lib::{
    arm_ctrl::{MotionState, StatusReport},
    data_store::{DataStore, SafeModeCause},
    tc_processor::TcProcessor,
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Command line options.
#[derive(Debug, StructOpt)]
#[structopt(name = "arm_exec", about = "Kinematic control of a serial robot arm")]
struct Opts {
    /// ArmCtrl parameter file, relative to `$ARM_SW_ROOT/params`.
    #[structopt(long, default_value = "arm_ctrl.toml")]
    params: String,

    /// Target period of one cycle in seconds.
    #[structopt(long, default_value = "0.1")]
    cycle_period: f64,

    /// Stop after this many seconds.
    #[structopt(long)]
    max_duration: Option<f64>,

    /// Script of timed commands to run. Commands are read from stdin if not
    /// given.
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,
}

/// One row of the cycle archive.
#[derive(Serialize)]
struct CycleRecord {
    time_s: f64,
    motion_state: MotionState,
    error_norm: f64,
    num_substeps: usize,
    fault: String,
    angles_deg: String,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
enum TcSource {
    Script(ScriptInterpreter),
    Stdin(Receiver<String>),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    if !(opts.cycle_period.is_finite() && opts.cycle_period > 0.0) {
        return Err(eyre!(
            "The cycle period must be positive, got {}",
            opts.cycle_period
        ));
    }

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Arm Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opts);

    // ---- INITIALISE TC SOURCE ----

    let mut tc_source = match opts.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            TcSource::Script(si)
        }
        None => {
            info!("No script provided, commands will be read from stdin\n");
            TcSource::Stdin(spawn_stdin_reader())
        }
    };

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    ds.arm_ctrl
        .init(opts.params.clone(), &session)
        .wrap_err("Failed to initialise ArmCtrl")?;
    info!("ArmCtrl init complete");

    let mut tc_processor = TcProcessor::new();
    let responses = tc_processor.subscribe();

    let mut archiver = Archiver::from_path(&session, "arm_ctrl.csv")
        .wrap_err("Failed to create the ArmCtrl archive")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut tc_source_closed = false;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        ds.cycle_start(opts.cycle_period);

        // ---- TELECOMMAND PROCESSING ----

        match tc_source {
            TcSource::Script(ref mut si) => match si.get_pending_tcs(ds.sim_time_s) {
                PendingTcs::None => (),
                PendingTcs::Some(tcs) => {
                    for tc in tcs.iter() {
                        tc_processor.exec(&mut ds.arm_ctrl, tc);
                    }
                }
                PendingTcs::EndOfScript => {
                    if !tc_source_closed {
                        info!("End of TC script reached, stopping once the arm is idle");
                        tc_source_closed = true;
                    }
                }
            },
            TcSource::Stdin(ref rx) => loop {
                match rx.try_recv() {
                    Ok(line) => tc_processor.exec_line(&mut ds.arm_ctrl, &line),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !tc_source_closed {
                            info!("Stdin closed, stopping once the arm is idle");
                            tc_source_closed = true;
                        }
                        break;
                    }
                }
            },
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        if !ds.safe {
            match ds.arm_ctrl.proc(&ds.arm_ctrl_input) {
                Ok((o, r)) => {
                    ds.arm_ctrl_output = o;
                    ds.arm_ctrl_status_rpt = r;
                }
                Err(e) => {
                    warn!("Error during ArmCtrl processing: {}", e);
                    ds.make_safe(SafeModeCause::ArmCtrlError);
                }
            }
        }

        tc_processor.report_status(&ds.arm_ctrl_status_rpt);

        // ---- RESPONSES ----

        for response in responses.try_iter() {
            println!("{}", response);
        }

        // ---- WRITE ARCHIVES ----

        if let Err(e) = archiver.serialise(cycle_record(&ds)) {
            warn!("Could not archive ArmCtrl data: {}", e);
        }

        // ---- EXIT CONDITIONS ----

        if ds.safe {
            info!("Arm made safe, stopping");
            break;
        }

        // A faulted arm can't reach its target without a new command
        let arm_settled = ds.arm_ctrl_status_rpt.motion_state == MotionState::Idle
            || ds.arm_ctrl_status_rpt.fault.is_some();
        if tc_source_closed && arm_settled {
            info!("No more commands and arm settled, stopping");
            break;
        }

        if let Some(max_duration) = opts.max_duration {
            if ds.sim_time_s >= max_duration {
                info!("Maximum duration of {} s reached, stopping", max_duration);
                ds.make_safe(SafeModeCause::MaxDurationReached);
                break;
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(opts.cycle_period).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - opts.cycle_period
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    session.save("arm_config.json", ds.arm_ctrl.arm_config());
    session.save::<_, StatusReport>("status_report.json", ds.arm_ctrl_status_rpt.clone());

    info!("End of execution after {} cycles", ds.num_cycles);

    session.exit();

    Ok(())
}

/// Read lines from stdin on a separate thread, the channel disconnects when
/// stdin closes.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = channel();

    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Could not read from stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Build the archive record of this cycle.
fn cycle_record(ds: &DataStore) -> CycleRecord {
    let rpt = &ds.arm_ctrl_status_rpt;

    CycleRecord {
        time_s: ds.sim_time_s,
        motion_state: rpt.motion_state,
        error_norm: rpt.error_norm,
        num_substeps: rpt.num_substeps,
        fault: rpt
            .fault
            .as_ref()
            .map(|f| f.to_string())
            .unwrap_or_default(),
        angles_deg: ds
            .arm_ctrl
            .get_all_joint_angles()
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" "),
    }
}
