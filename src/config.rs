//! TOML-based scenario configuration and preset definitions.

use std::collections::BTreeSet;
use std::f32::consts::PI;
use std::fs;
use std::path::Path;

use chrono::{DateTime, FixedOffset, Timelike};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::assets::{
    Asset, BaselineErrorParams, Battery, BatteryParams, CiBuilding, CiParams, Ev, EvParams,
    FleetParams, FleetSite, FleetVehicle, Hvac, HvacMode, HvacParams, TICK_MINUTES, noise,
};
use crate::dispatch::strategy::{StrategyConfig, StrategySettings};
use crate::error::ConfigError;
use crate::scenario::{Scenario, ScenarioConfig};
use crate::sim::types::Difficulty;

/// Offset mixed into the scenario seed for the genesis bias draws, so the
/// run's own stream starts fresh.
const BIAS_SEED_OFFSET: u64 = 0x5EED_B1A5;

/// Top-level scenario file parsed from TOML.
///
/// All sections have defaults matching the baseline preset's timing and
/// noise, with an empty portfolio. Load from TOML with
/// [`ScenarioFile::from_toml_file`] or start from a preset with
/// [`ScenarioFile::from_preset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioFile {
    pub simulation: SimulationSection,
    pub target: TargetSection,
    pub weather: WeatherSection,
    pub baseline_error: BaselineErrorSection,
    pub noise: NoiseSection,
    pub strategy: StrategySettings,
    pub hvac: Vec<HvacEntry>,
    pub battery: Vec<BatteryEntry>,
    pub ev: Vec<EvEntry>,
    pub fleet: Vec<FleetEntry>,
    pub ci_building: Vec<CiEntry>,
}

/// Run timing and global parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    /// RFC 3339 start of the first tick.
    pub start_time: String,
    /// Number of 5-minute ticks (must be > 0).
    pub ticks: usize,
    /// Master random seed.
    pub seed: u64,
    /// `"easy"`, `"normal"` or `"hard"`.
    pub difficulty: String,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            start_time: "2024-07-15T12:00:00-05:00".to_string(),
            ticks: 72,
            seed: 42,
            difficulty: "normal".to_string(),
        }
    }
}

/// Target load reduction: a flat event block, or an explicit series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSection {
    /// Requested reduction during the event (kW).
    pub kw: f32,
    /// First event tick (inclusive).
    pub event_start_tick: usize,
    /// Last event tick (exclusive).
    pub event_end_tick: usize,
    /// Per-tick targets; overrides the block when present.
    pub series: Option<Vec<f32>>,
}

impl Default for TargetSection {
    fn default() -> Self {
        Self {
            kw: 60.0,
            event_start_tick: 24,
            event_end_tick: 48,
            series: None,
        }
    }
}

/// Outdoor temperature: a daily cosine, or an explicit series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherSection {
    /// Daily mean (°F).
    pub base_f: f32,
    /// Half the daily swing (°F).
    pub amplitude_f: f32,
    /// Local hour of the daily maximum.
    pub peak_hour: f32,
    /// Per-tick temperatures; overrides the curve when present.
    pub series: Option<Vec<f32>>,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            base_f: 88.0,
            amplitude_f: 8.0,
            peak_hour: 15.0,
            series: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselineErrorSection {
    pub sigma_bias: f32,
    pub sigma_drift: f32,
    pub rho: f32,
}

impl Default for BaselineErrorSection {
    fn default() -> Self {
        Self {
            sigma_bias: 0.1,
            sigma_drift: 0.05,
            rho: 0.9,
        }
    }
}

impl From<&BaselineErrorSection> for BaselineErrorParams {
    fn from(s: &BaselineErrorSection) -> Self {
        Self {
            sigma_bias: s.sigma_bias,
            sigma_drift: s.sigma_drift,
            rho: s.rho,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NoiseSection {
    /// Half-width of the multiplicative measurement noise (fraction).
    pub measurement_pct: f32,
    /// Per-tick probability that an asset ignores its command.
    pub noncompliance_prob: f32,
}

impl Default for NoiseSection {
    fn default() -> Self {
        Self {
            measurement_pct: 0.02,
            noncompliance_prob: 0.05,
        }
    }
}

/// One `[[hvac]]` table. `count > 1` expands into numbered copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HvacEntry {
    pub id: String,
    pub count: usize,
    /// `"cooling"` or `"heating"`.
    pub mode: String,
    pub alpha: f32,
    pub beta_f: f32,
    pub rated_kw: f32,
    pub preferred_f: f32,
    pub comfort_min_f: f32,
    pub comfort_max_f: f32,
    pub deadband_f: f32,
    pub initial_temp_f: f32,
}

impl Default for HvacEntry {
    fn default() -> Self {
        Self {
            id: "hvac".to_string(),
            count: 1,
            mode: "cooling".to_string(),
            alpha: 0.05,
            beta_f: 1.5,
            rated_kw: 3.5,
            preferred_f: 74.0,
            comfort_min_f: 70.0,
            comfort_max_f: 78.0,
            deadband_f: 1.0,
            initial_temp_f: 74.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryEntry {
    pub id: String,
    pub count: usize,
    pub capacity_kwh: f32,
    pub p_ch_kw: f32,
    pub p_dis_kw: f32,
    pub soc_reserve: f32,
    pub eta_charge: f32,
    pub eta_discharge: f32,
    pub initial_soc: f32,
}

impl Default for BatteryEntry {
    fn default() -> Self {
        Self {
            id: "battery".to_string(),
            count: 1,
            capacity_kwh: 13.5,
            p_ch_kw: 5.0,
            p_dis_kw: 5.0,
            soc_reserve: 0.2,
            eta_charge: 0.95,
            eta_discharge: 0.95,
            initial_soc: 0.9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvEntry {
    pub id: String,
    pub count: usize,
    pub t_arrive: usize,
    pub t_depart: usize,
    pub p_max_kw: f32,
    pub e_req_kwh: f32,
    pub initial_kwh: f32,
}

impl Default for EvEntry {
    fn default() -> Self {
        Self {
            id: "ev".to_string(),
            count: 1,
            t_arrive: 0,
            t_depart: 96,
            p_max_kw: 7.2,
            e_req_kwh: 40.0,
            initial_kwh: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetEntry {
    pub id: String,
    pub default_cap_kw: f32,
    pub vehicles: Vec<FleetVehicleEntry>,
}

impl Default for FleetEntry {
    fn default() -> Self {
        Self {
            id: "fleet".to_string(),
            default_cap_kw: 150.0,
            vehicles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetVehicleEntry {
    pub t_arrive: usize,
    pub t_depart: usize,
    pub p_max_kw: f32,
    pub e_req_kwh: f32,
    pub initial_kwh: f32,
}

impl Default for FleetVehicleEntry {
    fn default() -> Self {
        Self {
            t_arrive: 0,
            t_depart: 96,
            p_max_kw: 11.0,
            e_req_kwh: 50.0,
            initial_kwh: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CiEntry {
    pub id: String,
    pub count: usize,
    pub base_load_kw: f32,
    pub shed_max_kw: f32,
    pub fatigue_decay: f32,
    pub fatigue_gain: f32,
    pub fatigue_recovery: f32,
    pub process_kw: f32,
    pub max_process_toggles: u32,
    pub business_start_hour: u32,
    pub business_end_hour: u32,
}

impl Default for CiEntry {
    fn default() -> Self {
        Self {
            id: "ci".to_string(),
            count: 1,
            base_load_kw: 150.0,
            shed_max_kw: 40.0,
            fatigue_decay: 0.5,
            fatigue_gain: 0.05,
            fatigue_recovery: 0.02,
            process_kw: 30.0,
            max_process_toggles: 2,
            business_start_hour: 8,
            business_end_hour: 18,
        }
    }
}

/// Expands `count` copies of a base id: `id` alone, or `id-01`, `id-02`…
fn expand_ids(id: &str, count: usize) -> Vec<String> {
    if count == 1 {
        vec![id.to_string()]
    } else {
        (1..=count).map(|i| format!("{id}-{i:02}")).collect()
    }
}

fn parse_start_time(s: &str) -> Result<DateTime<FixedOffset>, ConfigError> {
    DateTime::parse_from_rfc3339(s).map_err(|e| {
        ConfigError::new(
            "simulation.start_time",
            format!("must be RFC 3339, got \"{s}\": {e}"),
        )
    })
}

fn hvac_mode(s: &str) -> Option<HvacMode> {
    match s {
        "cooling" => Some(HvacMode::Cooling),
        "heating" => Some(HvacMode::Heating),
        _ => None,
    }
}

fn fleet_vehicles(n: usize, first_depart: usize) -> Vec<FleetVehicleEntry> {
    (0..n)
        .map(|i| FleetVehicleEntry {
            t_depart: first_depart + 4 * i,
            e_req_kwh: 45.0 + i as f32,
            ..FleetVehicleEntry::default()
        })
        .collect()
}

impl ScenarioFile {
    /// Returns the baseline scenario: a summer afternoon event against a
    /// mixed portfolio.
    pub fn baseline() -> Self {
        Self {
            hvac: vec![HvacEntry {
                count: 20,
                ..HvacEntry::default()
            }],
            battery: vec![BatteryEntry {
                count: 6,
                ..BatteryEntry::default()
            }],
            ev: vec![EvEntry {
                count: 8,
                ..EvEntry::default()
            }],
            fleet: vec![FleetEntry {
                vehicles: fleet_vehicles(10, 60),
                ..FleetEntry::default()
            }],
            ci_building: vec![CiEntry {
                count: 2,
                ..CiEntry::default()
            }],
            ..Self::default()
        }
    }

    /// Returns the heat-wave preset: hotter, longer event, harder scoring,
    /// HVAC-dominated portfolio.
    pub fn heat_wave() -> Self {
        let base = Self::baseline();
        Self {
            simulation: SimulationSection {
                difficulty: "hard".to_string(),
                ..SimulationSection::default()
            },
            target: TargetSection {
                kw: 90.0,
                event_start_tick: 18,
                event_end_tick: 60,
                series: None,
            },
            weather: WeatherSection {
                base_f: 98.0,
                amplitude_f: 6.0,
                ..WeatherSection::default()
            },
            hvac: vec![HvacEntry {
                count: 35,
                initial_temp_f: 75.0,
                ..HvacEntry::default()
            }],
            ..base
        }
    }

    /// Returns the fleet-heavy preset: three depots carry most of the
    /// flexibility.
    pub fn fleet_heavy() -> Self {
        let base = Self::baseline();
        Self {
            target: TargetSection {
                kw: 80.0,
                ..TargetSection::default()
            },
            hvac: vec![HvacEntry {
                count: 8,
                ..HvacEntry::default()
            }],
            fleet: (1..=3)
                .map(|i| FleetEntry {
                    id: format!("depot-{i}"),
                    default_cap_kw: 120.0,
                    vehicles: fleet_vehicles(12, 56 + 4 * i),
                })
                .collect(),
            ci_building: Vec::new(),
            ..base
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "heat_wave", "fleet_heavy"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "heat_wave" => Ok(Self::heat_wave()),
            "fleet_heavy" => Ok(Self::fleet_heavy()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if let Err(e) = parse_start_time(&s.start_time) {
            errors.push(e);
        }
        if s.ticks == 0 {
            errors.push(ConfigError::new("simulation.ticks", "must be > 0"));
        }
        if Difficulty::parse(&s.difficulty).is_none() {
            errors.push(ConfigError::new(
                "simulation.difficulty",
                format!(
                    "must be one of {}, got \"{}\"",
                    Difficulty::NAMES.join(", "),
                    s.difficulty
                ),
            ));
        }

        let t = &self.target;
        match &t.series {
            Some(series) => {
                if series.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    errors.push(ConfigError::new(
                        "target.series",
                        "every value must be finite and >= 0",
                    ));
                }
            }
            None => {
                if !t.kw.is_finite() || t.kw < 0.0 {
                    errors.push(ConfigError::new("target.kw", "must be finite and >= 0"));
                }
                if t.event_start_tick >= t.event_end_tick {
                    errors.push(ConfigError::new(
                        "target.event_start_tick",
                        "must be < target.event_end_tick",
                    ));
                }
            }
        }

        if let Some(series) = &self.weather.series {
            if series.iter().any(|v| !v.is_finite()) {
                errors.push(ConfigError::new("weather.series", "every value must be finite"));
            }
        } else if !(0.0..24.0).contains(&self.weather.peak_hour) {
            errors.push(ConfigError::new("weather.peak_hour", "must be in [0, 24)"));
        }

        let be = &self.baseline_error;
        if be.sigma_bias < 0.0 {
            errors.push(ConfigError::new("baseline_error.sigma_bias", "must be >= 0"));
        }
        if be.sigma_drift < 0.0 {
            errors.push(ConfigError::new("baseline_error.sigma_drift", "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&be.rho) {
            errors.push(ConfigError::new("baseline_error.rho", "must be in [0.0, 1.0]"));
        }

        let n = &self.noise;
        if !(0.0..1.0).contains(&n.measurement_pct) {
            errors.push(ConfigError::new("noise.measurement_pct", "must be in [0.0, 1.0)"));
        }
        if !(0.0..=1.0).contains(&n.noncompliance_prob) {
            errors.push(ConfigError::new(
                "noise.noncompliance_prob",
                "must be in [0.0, 1.0]",
            ));
        }

        if let Err(e) = self.strategy.validate() {
            errors.push(e.into());
        }

        for (i, h) in self.hvac.iter().enumerate() {
            let f = |name: &str| format!("hvac[{i}].{name}");
            if hvac_mode(&h.mode).is_none() {
                errors.push(ConfigError::new(
                    f("mode"),
                    format!("must be \"cooling\" or \"heating\", got \"{}\"", h.mode),
                ));
            }
            if !(h.alpha > 0.0 && h.alpha <= 1.0) {
                errors.push(ConfigError::new(f("alpha"), "must be in (0.0, 1.0]"));
            }
            if h.beta_f <= 0.0 {
                errors.push(ConfigError::new(f("beta_f"), "must be > 0"));
            }
            if h.rated_kw <= 0.0 {
                errors.push(ConfigError::new(f("rated_kw"), "must be > 0"));
            }
            if !(h.comfort_min_f <= h.preferred_f && h.preferred_f <= h.comfort_max_f)
                || h.comfort_min_f >= h.comfort_max_f
            {
                errors.push(ConfigError::new(
                    f("preferred_f"),
                    "must lie within [comfort_min_f, comfort_max_f] with min < max",
                ));
            }
            if h.deadband_f < 0.0 {
                errors.push(ConfigError::new(f("deadband_f"), "must be >= 0"));
            }
        }

        for (i, b) in self.battery.iter().enumerate() {
            let f = |name: &str| format!("battery[{i}].{name}");
            if b.capacity_kwh <= 0.0 {
                errors.push(ConfigError::new(f("capacity_kwh"), "must be > 0"));
            }
            if b.p_ch_kw < 0.0 || b.p_dis_kw < 0.0 {
                errors.push(ConfigError::new(f("p_dis_kw"), "power limits must be >= 0"));
            }
            if !(0.0..1.0).contains(&b.soc_reserve) {
                errors.push(ConfigError::new(f("soc_reserve"), "must be in [0.0, 1.0)"));
            }
            if !(b.soc_reserve..=1.0).contains(&b.initial_soc) {
                errors.push(ConfigError::new(
                    f("initial_soc"),
                    "must be in [soc_reserve, 1.0]",
                ));
            }
            for (name, eta) in [("eta_charge", b.eta_charge), ("eta_discharge", b.eta_discharge)] {
                if !(eta > 0.0 && eta <= 1.0) {
                    errors.push(ConfigError::new(f(name), "must be in (0.0, 1.0]"));
                }
            }
        }

        for (i, e) in self.ev.iter().enumerate() {
            let f = |name: &str| format!("ev[{i}].{name}");
            if e.t_arrive >= e.t_depart {
                errors.push(ConfigError::new(f("t_arrive"), "must be < t_depart"));
            }
            if e.p_max_kw <= 0.0 {
                errors.push(ConfigError::new(f("p_max_kw"), "must be > 0"));
            }
            if e.e_req_kwh < 0.0 || e.initial_kwh < 0.0 {
                errors.push(ConfigError::new(f("e_req_kwh"), "energies must be >= 0"));
            }
        }

        for (i, fl) in self.fleet.iter().enumerate() {
            if fl.default_cap_kw < 0.0 {
                errors.push(ConfigError::new(
                    format!("fleet[{i}].default_cap_kw"),
                    "must be >= 0",
                ));
            }
            for (j, v) in fl.vehicles.iter().enumerate() {
                let f = |name: &str| format!("fleet[{i}].vehicles[{j}].{name}");
                if v.t_arrive >= v.t_depart {
                    errors.push(ConfigError::new(f("t_arrive"), "must be < t_depart"));
                }
                if v.p_max_kw <= 0.0 {
                    errors.push(ConfigError::new(f("p_max_kw"), "must be > 0"));
                }
                if v.e_req_kwh < 0.0 || v.initial_kwh < 0.0 {
                    errors.push(ConfigError::new(f("e_req_kwh"), "energies must be >= 0"));
                }
            }
        }

        for (i, c) in self.ci_building.iter().enumerate() {
            let f = |name: &str| format!("ci_building[{i}].{name}");
            if c.base_load_kw < 0.0 || c.shed_max_kw < 0.0 || c.process_kw < 0.0 {
                errors.push(ConfigError::new(f("base_load_kw"), "loads must be >= 0"));
            }
            if c.fatigue_decay < 0.0 || c.fatigue_gain < 0.0 || c.fatigue_recovery < 0.0 {
                errors.push(ConfigError::new(
                    f("fatigue_gain"),
                    "fatigue rates must be >= 0",
                ));
            }
            if c.business_start_hour > 23 || c.business_end_hour > 24 {
                errors.push(ConfigError::new(
                    f("business_start_hour"),
                    "business hours must be within a day",
                ));
            }
        }

        let counts = self
            .hvac
            .iter()
            .map(|h| ("hvac", h.count))
            .chain(self.battery.iter().map(|b| ("battery", b.count)))
            .chain(self.ev.iter().map(|e| ("ev", e.count)))
            .chain(self.ci_building.iter().map(|c| ("ci_building", c.count)));
        for (section, count) in counts {
            if count == 0 {
                errors.push(ConfigError::new(format!("{section}.count"), "must be > 0"));
            }
        }

        let mut seen = BTreeSet::new();
        for id in self.asset_ids() {
            if !seen.insert(id.clone()) {
                errors.push(ConfigError::new("id", format!("duplicate asset id \"{id}\"")));
            }
        }

        errors
    }

    /// Every asset id after `count` expansion, in portfolio order.
    pub fn asset_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for h in &self.hvac {
            ids.extend(expand_ids(&h.id, h.count));
        }
        for b in &self.battery {
            ids.extend(expand_ids(&b.id, b.count));
        }
        for e in &self.ev {
            ids.extend(expand_ids(&e.id, e.count));
        }
        for f in &self.fleet {
            ids.push(f.id.clone());
        }
        for c in &self.ci_building {
            ids.extend(expand_ids(&c.id, c.count));
        }
        ids
    }

    /// Resolved per-tick target series over the horizon (kW).
    pub fn target_series(&self) -> Vec<f32> {
        let t = &self.target;
        match &t.series {
            Some(series) => series.clone(),
            None => (0..self.simulation.ticks)
                .map(|tick| {
                    if tick >= t.event_start_tick && tick < t.event_end_tick {
                        t.kw
                    } else {
                        0.0
                    }
                })
                .collect(),
        }
    }

    /// Resolved per-tick outdoor temperature series (°F).
    ///
    /// The curve peaks at `peak_hour` local time and bottoms out twelve
    /// hours later.
    pub fn temperature_series(&self, start: DateTime<FixedOffset>) -> Vec<f32> {
        let w = &self.weather;
        if let Some(series) = &w.series {
            return series.clone();
        }
        let start_hour = start.hour() as f32 + start.minute() as f32 / 60.0;
        (0..self.simulation.ticks)
            .map(|tick| {
                let hour = start_hour + (tick as i64 * TICK_MINUTES) as f32 / 60.0;
                w.base_f + w.amplitude_f * (2.0 * PI * (hour - w.peak_hour) / 24.0).cos()
            })
            .collect()
    }

    /// Validated strategy from the `[strategy]` section.
    ///
    /// # Errors
    ///
    /// Returns the first strategy violation as a `ConfigError`.
    pub fn strategy_config(&self) -> Result<StrategyConfig, ConfigError> {
        self.strategy.validate().map_err(ConfigError::from)
    }

    /// Builds the immutable [`Scenario`], drawing each asset's fixed
    /// baseline bias from a generator derived from the seed.
    ///
    /// # Errors
    ///
    /// Returns every validation error.
    pub fn build(&self) -> Result<Scenario, Vec<ConfigError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let start_time = parse_start_time(&self.simulation.start_time).map_err(|e| vec![e])?;
        let difficulty = Difficulty::parse(&self.simulation.difficulty).unwrap_or_default();
        let baseline_error = BaselineErrorParams::from(&self.baseline_error);

        let mut rng = StdRng::seed_from_u64(self.simulation.seed.wrapping_add(BIAS_SEED_OFFSET));
        let mut bias = || noise::symmetric_uniform(&mut rng, baseline_error.sigma_bias);
        let mut assets = Vec::new();

        for h in &self.hvac {
            let mode = hvac_mode(&h.mode).unwrap_or(HvacMode::Cooling);
            let params = HvacParams {
                mode,
                alpha: h.alpha,
                beta_f: h.beta_f,
                rated_kw: h.rated_kw,
                preferred_f: h.preferred_f,
                comfort_min_f: h.comfort_min_f,
                comfort_max_f: h.comfort_max_f,
                deadband_f: h.deadband_f,
            };
            for id in expand_ids(&h.id, h.count) {
                assets.push(Asset::Hvac(Hvac::new(
                    id,
                    params.clone(),
                    h.initial_temp_f,
                    bias(),
                )));
            }
        }
        for b in &self.battery {
            let params = BatteryParams {
                capacity_kwh: b.capacity_kwh,
                p_ch_kw: b.p_ch_kw,
                p_dis_kw: b.p_dis_kw,
                soc_reserve: b.soc_reserve,
                eta_charge: b.eta_charge,
                eta_discharge: b.eta_discharge,
            };
            for id in expand_ids(&b.id, b.count) {
                assets.push(Asset::Battery(Battery::new(
                    id,
                    params.clone(),
                    b.initial_soc,
                    bias(),
                )));
            }
        }
        for e in &self.ev {
            let params = EvParams {
                t_arrive: e.t_arrive,
                t_depart: e.t_depart,
                p_max_kw: e.p_max_kw,
                e_req_kwh: e.e_req_kwh,
            };
            for id in expand_ids(&e.id, e.count) {
                assets.push(Asset::Ev(Ev::new(id, params.clone(), e.initial_kwh, bias())));
            }
        }
        for f in &self.fleet {
            let params = FleetParams {
                default_cap_kw: f.default_cap_kw,
                vehicles: f
                    .vehicles
                    .iter()
                    .map(|v| FleetVehicle {
                        t_arrive: v.t_arrive,
                        t_depart: v.t_depart,
                        p_max_kw: v.p_max_kw,
                        e_req_kwh: v.e_req_kwh,
                    })
                    .collect(),
            };
            let initial: Vec<f32> = f.vehicles.iter().map(|v| v.initial_kwh).collect();
            assets.push(Asset::FleetSite(FleetSite::new(
                f.id.clone(),
                params,
                &initial,
                bias(),
            )));
        }
        for c in &self.ci_building {
            let params = CiParams {
                base_load_kw: c.base_load_kw,
                shed_max_kw: c.shed_max_kw,
                fatigue_decay: c.fatigue_decay,
                fatigue_gain: c.fatigue_gain,
                fatigue_recovery: c.fatigue_recovery,
                process_kw: c.process_kw,
                max_process_toggles: c.max_process_toggles,
                business_start_hour: c.business_start_hour,
                business_end_hour: c.business_end_hour,
            };
            for id in expand_ids(&c.id, c.count) {
                assets.push(Asset::CiBuilding(CiBuilding::new(id, params.clone(), bias())));
            }
        }

        let config = ScenarioConfig {
            start_time,
            ticks: self.simulation.ticks,
            seed: self.simulation.seed,
            difficulty,
            target_kw: self.target_series(),
            outdoor_temp_f: self.temperature_series(start_time),
            baseline_error,
            measurement_noise_pct: self.noise.measurement_pct,
            noncompliance_prob: self.noise.noncompliance_prob,
        };
        Scenario::new(config, assets)
    }
}
