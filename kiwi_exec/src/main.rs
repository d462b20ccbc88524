//! Main kiwi executable entry point.
//!
//! # Architecture
//!
//! The executable drives the robot up to a fiducial marker:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the actuator (motor board) and vision feed, either on the hardware or in the
//!       simulated world
//!     - Main loop:
//!         - Execute one cycle of the behaviour state machine
//!         - Check the stop conditions (machine stopped, run time, consecutive errors)
//!     - Shutdown: stop the machine and save the final behaviour telemetry
//!
//! Ctrl-C, or typing `q` (or `stop`) followed by enter on the terminal, stops the machine.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use std::{
    io::BufRead,
    thread,
    time::Instant,
};
use structopt::StructOpt;

// Internal
use kiwi_lib::{
    actuator::{ActuatorPort, MotorBoard},
    behav_mgr::{BehavMgrParams, StateMachine, StopHandle},
    drive_ctrl::{DriveCtrlParams, DriveKinematics},
    params::KiwiExecParams,
    sim::{SimCamera, SimMotorBus, SimParams, SimWorld},
    vision::{ThreadedFeed, VisionFeed, VisionParams},
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Command line options, overriding values from `kiwi_exec.toml`.
#[derive(Debug, StructOpt)]
#[structopt(name = "kiwi_exec", about = "Drive the kiwi robot up to a fiducial marker")]
struct Opts {
    /// Run in the simulated world instead of on the hardware
    #[structopt(long)]
    sim: bool,

    /// Stop after this many seconds
    #[structopt(long)]
    max_run_time: Option<f64>,
}

/// Parameters shared by both the hardware and simulated setups.
struct ExecSetup {
    exec: KiwiExecParams,
    behav_mgr: BehavMgrParams,
    vision: VisionParams,
    kinematics: DriveKinematics,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    let opts = Opts::from_args();

    // Initialise session
    let session = Session::new("kiwi_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Kiwi Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI options: {:?}", opts);

    // ---- LOAD PARAMETERS ----

    let mut exec_params: KiwiExecParams =
        util::params::load("kiwi_exec.toml").wrap_err("Could not load exec params")?;

    if opts.sim {
        exec_params.use_sim = true;
    }
    if opts.max_run_time.is_some() {
        exec_params.max_run_time_s = opts.max_run_time;
    }

    let drive_ctrl_params: DriveCtrlParams =
        util::params::load("drive_ctrl.toml").wrap_err("Could not load DriveCtrl params")?;

    let behav_mgr_params: BehavMgrParams =
        util::params::load("behav_mgr.toml").wrap_err("Could not load BehavMgr params")?;
    behav_mgr_params
        .validate()
        .wrap_err("Invalid BehavMgr params")?;

    let vision_params: VisionParams =
        util::params::load("vision.toml").wrap_err("Could not load vision params")?;
    vision_params
        .validate()
        .wrap_err("Invalid vision params")?;

    if behav_mgr_params.moving.frame_width_px != vision_params.frame_width_px {
        warn!(
            "BehavMgr frame width ({} px) differs from the vision frame width ({} px), centering \
            will be biased",
            behav_mgr_params.moving.frame_width_px, vision_params.frame_width_px
        );
    }

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    let kinematics =
        DriveKinematics::new(&drive_ctrl_params).wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    let setup = ExecSetup {
        exec: exec_params,
        behav_mgr: behav_mgr_params,
        vision: vision_params,
        kinematics,
    };

    if setup.exec.use_sim {
        run_sim(setup, &session)
    } else {
        run_hardware(setup, &session)
    }
}

/// Run in the simulated world.
fn run_sim(setup: ExecSetup, session: &Session) -> Result<(), Report> {
    let sim_params: SimParams =
        util::params::load("sim.toml").wrap_err("Could not load sim params")?;

    let world = SimWorld::new(sim_params);
    info!("Simulated world initialised, robot at {:?}", world.pose());

    let bus = SimMotorBus::new(
        world.clone(),
        setup.exec.motor_board.clone(),
        setup.kinematics.clone(),
    );
    let actuator = MotorBoard::new(bus, setup.exec.motor_board.clone(), setup.kinematics.clone());
    let vision = ThreadedFeed::new(SimCamera::new(world.clone(), &setup.vision), setup.vision);

    let mut sm = StateMachine::new(setup.behav_mgr, actuator, vision);
    let result = run(&mut sm, &setup.exec, session);

    info!(
        "Final simulated pose {:?}, {:.03} m from the marker",
        world.pose(),
        world.marker_distance_m()
    );

    result
}

/// Run on the Raspberry Pi, with the motor board on I2C and detections from the external
/// marker detector.
#[cfg(all(target_arch = "arm", target_os = "linux", target_env = "gnu"))]
fn run_hardware(setup: ExecSetup, session: &Session) -> Result<(), Report> {
    use kiwi_lib::vision::DetectionStream;

    use kiwi_lib::actuator::ActuatorError;

    let bus = rppal::i2c::I2c::with_bus(setup.exec.i2c_bus)
        .map_err(|e| ActuatorError::BusInitError(e.to_string()))
        .wrap_err_with(|| format!("Failed to open I2C bus {}", setup.exec.i2c_bus))?;
    let actuator = MotorBoard::new(bus, setup.exec.motor_board.clone(), setup.kinematics.clone());
    info!("MotorBoard initialised");

    // Opened by the feed once the detector has created it, Init waits for it
    let source = DetectionStream::open(&setup.exec.detection_stream_path);
    let vision = ThreadedFeed::new(source, setup.vision);
    info!(
        "Vision feed initialised on {}",
        setup.exec.detection_stream_path
    );

    let mut sm = StateMachine::new(setup.behav_mgr, actuator, vision);
    run(&mut sm, &setup.exec, session)
}

#[cfg(not(all(target_arch = "arm", target_os = "linux", target_env = "gnu")))]
fn run_hardware(_setup: ExecSetup, _session: &Session) -> Result<(), Report> {
    Err(eyre!(
        "The motor board is only available on the Raspberry Pi, use --sim to run in simulation"
    ))
}

/// Run the state machine until it stops, the maximum run time elapses or too many consecutive
/// cycles fail.
fn run<A, V>(
    sm: &mut StateMachine<A, V>,
    params: &KiwiExecParams,
    session: &Session,
) -> Result<(), Report>
where
    A: ActuatorPort,
    V: VisionFeed,
{
    let cycle_period = params
        .cycle_period()
        .ok_or_else(|| eyre!("Invalid cycle frequency: {} Hz", params.cycle_frequency_hz))?;
    let max_run_time = params.max_run_time();

    install_interrupt_handler(sm.stop_handle())?;
    spawn_stop_listener(sm.stop_handle());

    info!("Beginning main loop\n");

    sm.start();

    let start_instant = Instant::now();
    let mut num_cycles: u64 = 0;
    let mut num_consec_cycle_overruns: u64 = 0;
    let mut result = Ok(());

    loop {
        let cycle_start_instant = Instant::now();

        // ---- BEHAVIOUR ----

        if !sm.update() {
            info!("BehavMgr has stopped");
            break;
        }

        if sm.num_consec_errors() > params.max_consec_errors {
            let msg = match sm.last_error() {
                Some(e) => format!("{}", e),
                None => String::from("unknown error"),
            };
            error!(
                "{} consecutive BehavMgr errors, aborting",
                sm.num_consec_errors()
            );
            result = Err(eyre!(
                "BehavMgr failed for {} consecutive cycles, last error: {}",
                sm.num_consec_errors(),
                msg
            ));
            break;
        }

        if let Some(max) = max_run_time {
            if start_instant.elapsed() > max {
                info!("Maximum run time of {:.02} s reached", max.as_secs_f64());
                break;
            }
        }

        // ---- TELEMETRY ----

        if num_cycles % (params.cycle_frequency_hz.round().max(1.0) as u64) == 0 {
            debug!("BehavTm: {:?}", sm.get_tm());
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                num_consec_cycle_overruns += 1;
                warn!(
                    "Cycle overran by {:.06} s ({} consecutive)",
                    cycle_dur.as_secs_f64() - cycle_period.as_secs_f64(),
                    num_consec_cycle_overruns
                );
            }
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    sm.stop();

    info!(
        "Ran {} cycles in {:.03} s, finished in {}",
        num_cycles,
        start_instant.elapsed().as_secs_f64(),
        sm.state()
    );

    session
        .save_json("behav_tm.json", &sm.get_tm())
        .wrap_err("Failed to save the final BehavTm")?;

    info!("End of execution");

    result
}

/// Request a stop on Ctrl-C so that the machine zeroes the motors before exiting. A second
/// interrupt while the stop is pending exits immediately.
fn install_interrupt_handler(handle: StopHandle) -> Result<(), Report> {
    ctrlc::set_handler(move || {
        if on_interrupt(&handle) {
            eprintln!("Second interrupt received, exiting without stopping the motors");
            std::process::exit(130);
        }
    })
    .wrap_err("Failed to install the interrupt handler")
}

/// Request a stop, returns `true` if one was already pending.
fn on_interrupt(handle: &StopHandle) -> bool {
    if handle.is_stop_requested() {
        return true;
    }
    info!("Interrupt received, stopping");
    handle.request_stop();
    false
}

/// Listen on stdin for a stop request.
///
/// The thread is detached, it stays blocked on stdin until the process exits.
fn spawn_stop_listener(handle: StopHandle) {
    let spawned = thread::Builder::new()
        .name("stop_listener".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) if matches!(l.trim(), "q" | "stop") => {
                        info!("Stop requested from the terminal");
                        handle.request_stop();
                        break;
                    }
                    Ok(_) => (),
                    Err(_) => break,
                }
            }
        });

    if let Err(e) = spawned {
        warn!(
            "Could not start the stop listener, only the stop conditions will end the run: {}",
            e
        );
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_interrupt_requests_stop() {
        let handle = StopHandle::default();
        let observer = handle.clone();

        assert!(!on_interrupt(&handle));
        assert!(observer.is_stop_requested());

        // A second interrupt before the loop has stopped asks to exit
        assert!(on_interrupt(&handle));
    }
}
