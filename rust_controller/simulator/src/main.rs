// Ignore this lint otherwise many warnings are generated for common mathematical notation
#![allow(non_snake_case)]

extern crate env_logger;
#[macro_use]
extern crate log;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate stats;

extern crate config;
extern crate control_model;
extern crate controller;
extern crate prelude;

mod flame_merge;
mod settings;
mod simulation_model;

use std::error::Error;
use std::thread;
use std::time::{Duration, Instant};

use control_model::{Actuation, KinematicBicycle};
use controller::{Controller, Mpc};
use prelude::*;

use settings::{SimulatorConfig, SIMULATOR_FILE};
use simulation_model::Plant;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let sim_config = SimulatorConfig::load(SIMULATOR_FILE)?;
    let mpc_config = sim_config.load_mpc()?;
    let dt = mpc_config.dt;
    let model = KinematicBicycle::new(mpc_config.Lf);
    let mpc = Mpc::new(mpc_config);

    run(&sim_config, &mpc, model, dt);

    if let Some(ref path) = sim_config.flame_graph {
        flame_merge::write_flame(path)?;
        info!("flame graph written to {}", path);
    }

    Ok(())
}

fn run<C: Controller>(sim_config: &SimulatorConfig, controller: &C, model: KinematicBicycle, dt: float) {
    let path = sim_config.path;
    let mut plant = Plant::new(model, path, sim_config.initial);

    let n_steps = (sim_config.t / dt) as usize;
    let dt_duration = Duration::from_secs_f64(dt);
    let mut stats = stats::OnlineStats::new();
    let mut previous: Option<Actuation> = None;
    let mut failures = 0;

    for i in 0..n_steps {
        let step_start = Instant::now();

        let measured = plant.measure(sim_config.position_noise, sim_config.heading_noise);

        // Start controller timer
        let controller_start = Instant::now();

        let actuation = match controller.step(&measured, &path) {
            Ok(output) => {
                debug!("Predicted {:?}", output.trajectory);
                output.actuation
            }
            Err(e) => {
                failures += 1;
                let fallback = Actuation::hold_or_brake(previous);
                warn!("step {}: {}, applying {:?}", i, e, fallback);
                fallback
            }
        };

        let controller_millis = controller_start.elapsed().as_secs_f64() * 1e3;
        stats.add(controller_millis);

        info!("Controller took {} ms", controller_millis);
        info!("State {:?}", measured);
        info!("Control {:?}", actuation);

        plant.step(dt, &actuation);
        previous = Some(actuation);

        let step_elapsed = step_start.elapsed();
        if let Some(step_remaining) = dt_duration.checked_sub(step_elapsed) {
            if sim_config.real_time {
                thread::sleep(step_remaining);
            }
        } else {
            println!(
                "step missed deadline. took {:.1}ms.",
                step_elapsed.as_secs_f64() * 1e3
            );
        }
    }

    let end = plant.state();
    println!(
        "Finished at x {:.2} y {:.2} v {:.2} cte {:.3} epsi {:.3}, {} fallbacks",
        end.x, end.y, end.v, end.cte, end.epsi, failures
    );
    println!("Running stats (mean/ms, stdev/ms): {:?}", stats);
}
