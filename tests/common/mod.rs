//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use chrono::DateTime;
use der_dispatch_sim::assets::{
    Asset, BaselineErrorParams, Battery, BatteryParams, Hvac, HvacMode, HvacParams,
};
use der_dispatch_sim::config::ScenarioFile;
use der_dispatch_sim::dispatch::strategy::StrategyConfig;
use der_dispatch_sim::io::export::write_csv;
use der_dispatch_sim::scenario::{Scenario, ScenarioConfig};
use der_dispatch_sim::sim::types::Difficulty;
use der_dispatch_sim::sim::{Simulation, TimestepResult};

/// Noise-free scenario inputs starting at 14:00 local time.
pub fn quiet_config(ticks: usize, target_kw: Vec<f32>, outdoor_temp_f: Vec<f32>) -> ScenarioConfig {
    ScenarioConfig {
        start_time: DateTime::parse_from_rfc3339("2024-07-15T14:00:00-05:00")
            .expect("valid timestamp"),
        ticks,
        seed: 42,
        difficulty: Difficulty::Easy,
        target_kw,
        outdoor_temp_f,
        baseline_error: BaselineErrorParams {
            sigma_bias: 0.0,
            sigma_drift: 0.0,
            rho: 0.0,
        },
        measurement_noise_pct: 0.0,
        noncompliance_prob: 0.0,
    }
}

/// Home battery (13.5 kWh, 5 kW, 20% reserve, lossless) with no bias.
pub fn battery(id: &str, soc: f32) -> Asset {
    Asset::Battery(Battery::new(
        id,
        BatteryParams {
            capacity_kwh: 13.5,
            p_ch_kw: 5.0,
            p_dis_kw: 5.0,
            soc_reserve: 0.2,
            eta_charge: 1.0,
            eta_discharge: 1.0,
        },
        soc,
        0.0,
    ))
}

/// Cooling HVAC with a fast envelope (α = 0.1, β = 0.5 °F/tick, 3 kW),
/// preferred 74 °F, comfort band 70–78 °F, 1 °F deadband.
pub fn fast_hvac(id: &str, tin_f: f32) -> Asset {
    Asset::Hvac(Hvac::new(
        id,
        HvacParams {
            mode: HvacMode::Cooling,
            alpha: 0.1,
            beta_f: 0.5,
            rated_kw: 3.0,
            preferred_f: 74.0,
            comfort_min_f: 70.0,
            comfort_max_f: 78.0,
            deadband_f: 1.0,
        },
        tin_f,
        0.0,
    ))
}

/// Builds a scenario, panicking on validation errors.
pub fn scenario(config: ScenarioConfig, assets: Vec<Asset>) -> Scenario {
    Scenario::new(config, assets).expect("scenario should validate")
}

/// Baseline preset as a ready-to-run simulation.
pub fn baseline_simulation() -> Simulation {
    preset_simulation("baseline")
}

pub fn preset_simulation(name: &str) -> Simulation {
    let file = ScenarioFile::from_preset(name).expect("preset exists");
    let scenario = file.build().expect("preset builds");
    let strategy = file.strategy_config().expect("preset strategy is valid");
    Simulation::new(scenario, strategy)
}

/// Runs to completion and returns the history.
pub fn run(sim: &mut Simulation) -> Vec<TimestepResult> {
    sim.run_to_completion()
        .expect("run should complete")
        .to_vec()
}

/// CSV bytes of a history.
pub fn csv_bytes(results: &[TimestepResult]) -> Vec<u8> {
    let mut buf = Vec::new();
    write_csv(results, &mut buf).expect("csv write to memory");
    buf
}

/// Default strategy with every intensity dial at `dial`.
pub fn strategy_with_dials(dial: f32) -> StrategyConfig {
    let mut s = StrategyConfig::default();
    s.intensity.hvac = dial;
    s.intensity.battery = dial;
    s.intensity.ev = dial;
    s.intensity.fleet_site = dial;
    s.intensity.ci_building = dial;
    s
}
