use std::path::Path;

use config::ConfigError;
use control_model::{PathPolynomial, VehicleState};
use prelude::*;

pub static SIMULATOR_FILE: &'static str = "simulator.toml";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Simulated duration in seconds.
    pub t: float,
    /// Sleep out the remainder of each timestep.
    pub real_time: bool,
    /// Controller hyperparameters, defaults if the file is missing.
    pub mpc_config: String,
    pub path: PathPolynomial,
    pub initial: VehicleState,
    /// Measurement noise standard deviations.
    pub position_noise: float,
    pub heading_noise: float,
    /// Write collected flame spans here on exit.
    pub flame_graph: Option<String>,
}

impl Default for SimulatorConfig {
    fn default() -> SimulatorConfig {
        SimulatorConfig {
            t: 20.0,
            real_time: false,
            mpc_config: "mpc.toml".to_owned(),
            path: PathPolynomial::new([1.0, 0.05, 0.002, -0.0001]),
            initial: VehicleState::default(),
            position_noise: 0.0,
            heading_noise: 0.0,
            flame_graph: None,
        }
    }
}

impl SimulatorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SimulatorConfig, ConfigError> {
        if path.as_ref().exists() {
            config::load_toml(path)
        } else {
            Ok(SimulatorConfig::default())
        }
    }

    pub fn load_mpc(&self) -> Result<config::MpcConfig, ConfigError> {
        if Path::new(&self.mpc_config).exists() {
            config::load(&self.mpc_config)
        } else {
            info!("{} not found, using default controller config", self.mpc_config);
            Ok(config::MpcConfig::default())
        }
    }
}
