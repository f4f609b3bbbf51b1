//! Common types and traits for asset state-transition models.

use std::fmt;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::battery::{Battery, BatteryCommand};
use super::ci_building::{CiBuilding, CiCommand};
use super::ev::{Ev, EvCommand};
use super::fleet::{FleetCommand, FleetSite};
use super::hvac::{Hvac, HvacCommand};
use super::noise;
use crate::error::ModelError;

/// Length of one simulation tick in minutes.
pub const TICK_MINUTES: i64 = 5;

/// Length of one simulation tick in hours.
pub const TICK_HOURS: f32 = TICK_MINUTES as f32 / 60.0;

/// The five asset families in a portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Hvac,
    Battery,
    Ev,
    FleetSite,
    CiBuilding,
}

impl AssetKind {
    /// All kinds in a stable order.
    pub const ALL: [AssetKind; 5] = [
        AssetKind::Hvac,
        AssetKind::Battery,
        AssetKind::Ev,
        AssetKind::FleetSite,
        AssetKind::CiBuilding,
    ];

    /// Returns a short snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Hvac => "hvac",
            AssetKind::Battery => "battery",
            AssetKind::Ev => "ev",
            AssetKind::FleetSite => "fleet_site",
            AssetKind::CiBuilding => "ci_building",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of the counterfactual-baseline error processes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineErrorParams {
    /// Half-width of the fixed per-asset bias distribution (kW).
    pub sigma_bias: f32,
    /// Half-width of the AR(1) drift innovation (kW).
    pub sigma_drift: f32,
    /// AR(1) persistence coefficient (0.0 to 1.0).
    pub rho: f32,
}

impl Default for BaselineErrorParams {
    fn default() -> Self {
        Self {
            sigma_bias: 0.0,
            sigma_drift: 0.0,
            rho: 0.0,
        }
    }
}

/// State carried by every asset variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonState {
    /// Fixed per-asset baseline bias (kW), drawn once at genesis.
    pub baseline_bias: f32,
    /// Persistent AR(1) baseline drift (kW).
    pub baseline_drift: f32,
    /// Terminal flag. Once set the asset contributes zero power and is never
    /// dispatched again.
    pub dropped: bool,
}

impl CommonState {
    pub fn with_bias(baseline_bias: f32) -> Self {
        Self {
            baseline_bias,
            ..Self::default()
        }
    }
}

/// Exogenous conditions for one tick, shared by the models and the
/// dispatch-side estimators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    /// Current tick index.
    pub tick: usize,
    /// Outdoor dry-bulb temperature (°F).
    pub outdoor_temp_f: f32,
    /// Local clock hour (0..24) at the start of the tick.
    pub hour_of_day: u32,
}

impl Conditions {
    pub fn new(tick: usize, outdoor_temp_f: f32, hour_of_day: u32) -> Self {
        Self {
            tick,
            outdoor_temp_f,
            hour_of_day,
        }
    }
}

/// Everything a model needs besides its own state and command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetContext {
    pub conditions: Conditions,
    /// Probability that an asset ignores its command this tick.
    pub noncompliance_prob: f32,
    pub baseline_error: BaselineErrorParams,
    /// Half-width of the multiplicative measurement noise (fraction).
    pub measurement_noise_pct: f32,
}

impl AssetContext {
    /// A noise-free context, mostly useful for tests and estimators.
    pub fn ideal(conditions: Conditions) -> Self {
        Self {
            conditions,
            noncompliance_prob: 0.0,
            baseline_error: BaselineErrorParams::default(),
            measurement_noise_pct: 0.0,
        }
    }
}

/// Control action addressed to a single asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Hvac(HvacCommand),
    Battery(BatteryCommand),
    Ev(EvCommand),
    FleetSite(FleetCommand),
    CiBuilding(CiCommand),
}

impl Command {
    /// Asset kind this command is meant for.
    pub fn kind(&self) -> AssetKind {
        match self {
            Command::Hvac(_) => AssetKind::Hvac,
            Command::Battery(_) => AssetKind::Battery,
            Command::Ev(_) => AssetKind::Ev,
            Command::FleetSite(_) => AssetKind::FleetSite,
            Command::CiBuilding(_) => AssetKind::CiBuilding,
        }
    }
}

/// A command together with the id of the asset it targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetCommand {
    pub asset_id: String,
    pub command: Command,
}

/// Physical outcome of one tick for a single model, before baseline error
/// and measurement noise are applied.
#[derive(Debug, Clone)]
pub struct Transition<M> {
    /// The asset with its variant state advanced. `common.dropped` is set
    /// when the model crossed a terminal limit this tick.
    pub next: M,
    /// Counterfactual consumption had no command been issued (kW).
    pub baseline_kw: f32,
    /// Actual consumption this tick (kW, negative when exporting).
    pub actual_kw: f32,
}

/// Trait implemented by every per-type physical/behavioral model.
///
/// `transition` is only called for assets that are not yet dropped, and
/// receives the command only when the asset complied this tick.
pub trait AssetModel: Clone {
    /// Variant-specific command payload.
    type Command;

    /// Returns the asset id.
    fn id(&self) -> &str;

    /// Returns the state shared by all variants.
    fn common(&self) -> &CommonState;

    /// Mutable access to the shared state.
    fn common_mut(&mut self) -> &mut CommonState;

    /// Advances the variant physics by one tick.
    fn transition(&self, command: Option<&Self::Command>, ctx: &AssetContext) -> Transition<Self>;
}

/// Result of advancing one model, still typed by variant.
#[derive(Debug, Clone)]
pub struct ModelStep<M> {
    pub next: M,
    pub power_delta_kw: f32,
    pub command_applied: bool,
}

impl<M> ModelStep<M> {
    fn into_asset_step(self, wrap: fn(M) -> Asset) -> AssetStep {
        AssetStep {
            asset: wrap(self.next),
            power_delta_kw: self.power_delta_kw,
            command_applied: self.command_applied,
        }
    }
}

/// Advances any model by one tick, applying the shared noise processes.
///
/// Draw order is fixed: noncompliance roll, drift innovation, measurement
/// noise. All three are drawn even for dropped assets.
pub fn advance_model<M: AssetModel>(
    model: &M,
    command: Option<&M::Command>,
    ctx: &AssetContext,
    rng: &mut StdRng,
) -> ModelStep<M> {
    let complied = noise::complies(rng, ctx.noncompliance_prob);
    let drift = noise::advance_drift(rng, model.common().baseline_drift, &ctx.baseline_error);
    let factor = noise::measurement_factor(rng, ctx.measurement_noise_pct);

    if model.common().dropped {
        let mut next = model.clone();
        next.common_mut().baseline_drift = drift;
        return ModelStep {
            next,
            power_delta_kw: 0.0,
            command_applied: false,
        };
    }

    let honored = command.filter(|_| complied);
    let Transition {
        mut next,
        baseline_kw,
        actual_kw,
    } = model.transition(honored, ctx);

    let common = next.common_mut();
    common.baseline_drift = drift;
    let power_delta_kw = if common.dropped {
        0.0
    } else {
        (baseline_kw - actual_kw + common.baseline_bias + drift) * factor
    };

    ModelStep {
        next,
        power_delta_kw,
        command_applied: honored.is_some(),
    }
}

/// Result of advancing one asset by one tick.
#[derive(Debug, Clone)]
pub struct AssetStep {
    /// Replacement asset carrying the next state.
    pub asset: Asset,
    /// Measured load reduction versus the counterfactual baseline (kW).
    pub power_delta_kw: f32,
    /// Whether a command was present and honored.
    pub command_applied: bool,
}

/// A portfolio member: one of the five asset families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    Hvac(Hvac),
    Battery(Battery),
    Ev(Ev),
    FleetSite(FleetSite),
    CiBuilding(CiBuilding),
}

impl Asset {
    pub fn id(&self) -> &str {
        match self {
            Asset::Hvac(a) => a.id(),
            Asset::Battery(a) => a.id(),
            Asset::Ev(a) => a.id(),
            Asset::FleetSite(a) => a.id(),
            Asset::CiBuilding(a) => a.id(),
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Hvac(_) => AssetKind::Hvac,
            Asset::Battery(_) => AssetKind::Battery,
            Asset::Ev(_) => AssetKind::Ev,
            Asset::FleetSite(_) => AssetKind::FleetSite,
            Asset::CiBuilding(_) => AssetKind::CiBuilding,
        }
    }

    pub fn common(&self) -> &CommonState {
        match self {
            Asset::Hvac(a) => a.common(),
            Asset::Battery(a) => a.common(),
            Asset::Ev(a) => a.common(),
            Asset::FleetSite(a) => a.common(),
            Asset::CiBuilding(a) => a.common(),
        }
    }

    pub fn is_dropped(&self) -> bool {
        self.common().dropped
    }

    /// Advances this asset by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InapplicableCommand`] when the command variant
    /// does not match the asset variant. The asset is left untouched in that
    /// case; callers decide whether to retry without a command.
    pub fn advance(
        &self,
        command: Option<&Command>,
        ctx: &AssetContext,
        rng: &mut StdRng,
    ) -> Result<AssetStep, ModelError> {
        let mismatch = |other: &Command| ModelError::InapplicableCommand {
            asset_id: self.id().to_string(),
            asset_kind: self.kind(),
            command_kind: other.kind(),
        };

        let step = match self {
            Asset::Hvac(m) => {
                let c = match command {
                    None => None,
                    Some(Command::Hvac(c)) => Some(c),
                    Some(other) => return Err(mismatch(other)),
                };
                advance_model(m, c, ctx, rng).into_asset_step(Asset::Hvac)
            }
            Asset::Battery(m) => {
                let c = match command {
                    None => None,
                    Some(Command::Battery(c)) => Some(c),
                    Some(other) => return Err(mismatch(other)),
                };
                advance_model(m, c, ctx, rng).into_asset_step(Asset::Battery)
            }
            Asset::Ev(m) => {
                let c = match command {
                    None => None,
                    Some(Command::Ev(c)) => Some(c),
                    Some(other) => return Err(mismatch(other)),
                };
                advance_model(m, c, ctx, rng).into_asset_step(Asset::Ev)
            }
            Asset::FleetSite(m) => {
                let c = match command {
                    None => None,
                    Some(Command::FleetSite(c)) => Some(c),
                    Some(other) => return Err(mismatch(other)),
                };
                advance_model(m, c, ctx, rng).into_asset_step(Asset::FleetSite)
            }
            Asset::CiBuilding(m) => {
                let c = match command {
                    None => None,
                    Some(Command::CiBuilding(c)) => Some(c),
                    Some(other) => return Err(mismatch(other)),
                };
                advance_model(m, c, ctx, rng).into_asset_step(Asset::CiBuilding)
            }
        };
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::battery::BatteryParams;
    use rand::SeedableRng;

    fn battery() -> Asset {
        Asset::Battery(Battery::new(
            "bat-1",
            BatteryParams {
                capacity_kwh: 13.5,
                p_ch_kw: 5.0,
                p_dis_kw: 5.0,
                soc_reserve: 0.2,
                eta_charge: 1.0,
                eta_discharge: 1.0,
            },
            0.8,
            0.0,
        ))
    }

    fn ctx() -> AssetContext {
        AssetContext::ideal(Conditions::new(0, 75.0, 12))
    }

    #[test]
    fn mismatched_command_is_rejected() {
        let asset = battery();
        let mut rng = StdRng::seed_from_u64(1);
        let cmd = Command::Ev(EvCommand {
            rate_reduction_kw: 2.0,
        });
        let err = asset.advance(Some(&cmd), &ctx(), &mut rng).unwrap_err();
        assert_eq!(
            err,
            ModelError::InapplicableCommand {
                asset_id: "bat-1".into(),
                asset_kind: AssetKind::Battery,
                command_kind: AssetKind::Ev,
            }
        );
    }

    #[test]
    fn dropped_asset_contributes_nothing() {
        let mut asset = battery();
        if let Asset::Battery(b) = &mut asset {
            b.state.common.dropped = true;
        }
        let mut rng = StdRng::seed_from_u64(1);
        let cmd = Command::Battery(BatteryCommand { power_kw: 5.0 });
        let step = asset.advance(Some(&cmd), &ctx(), &mut rng).unwrap();
        assert_eq!(step.power_delta_kw, 0.0);
        assert!(!step.command_applied);
        assert!(step.asset.is_dropped());
    }

    #[test]
    fn full_noncompliance_ignores_command() {
        let asset = battery();
        let mut rng = StdRng::seed_from_u64(9);
        let mut c = ctx();
        c.noncompliance_prob = 1.0;
        let cmd = Command::Battery(BatteryCommand { power_kw: 5.0 });
        let step = asset.advance(Some(&cmd), &c, &mut rng).unwrap();
        assert!(!step.command_applied);
        assert_eq!(step.power_delta_kw, 0.0);
    }

    #[test]
    fn bias_shifts_reported_delta() {
        let asset = Asset::Battery(Battery::new(
            "bat-2",
            BatteryParams {
                capacity_kwh: 10.0,
                p_ch_kw: 5.0,
                p_dis_kw: 5.0,
                soc_reserve: 0.1,
                eta_charge: 1.0,
                eta_discharge: 1.0,
            },
            0.5,
            0.25,
        ));
        let mut rng = StdRng::seed_from_u64(2);
        let step = asset.advance(None, &ctx(), &mut rng).unwrap();
        assert!((step.power_delta_kw - 0.25).abs() < 1e-6);
    }

    #[test]
    fn kinds_round_trip_through_labels() {
        for kind in AssetKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }
}
