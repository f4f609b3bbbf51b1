//! Residential HVAC: first-order thermal envelope with a hysteresis
//! thermostat.

use serde::{Deserialize, Serialize};

use super::types::{AssetContext, AssetModel, CommonState, Transition};

/// Conditioning direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Cooling,
    Heating,
}

/// Fixed HVAC parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HvacParams {
    pub mode: HvacMode,
    /// Envelope coupling to outdoor temperature per tick (0..1).
    pub alpha: f32,
    /// Indoor temperature change per tick while running (°F, magnitude).
    pub beta_f: f32,
    /// Electrical draw while running (kW).
    pub rated_kw: f32,
    /// Occupant-preferred setpoint (°F).
    pub preferred_f: f32,
    /// Lower hard comfort bound (°F). Crossing it while heating drops the asset.
    pub comfort_min_f: f32,
    /// Upper hard comfort bound (°F). Crossing it while cooling drops the asset.
    pub comfort_max_f: f32,
    /// Thermostat deadband width (°F), centered on the setpoint.
    pub deadband_f: f32,
}

/// Mutable HVAC state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HvacState {
    /// Indoor temperature (°F).
    pub tin_f: f32,
    /// Whether the compressor/furnace is running.
    pub running: bool,
    /// Setpoint in effect during the last tick (°F).
    pub setpoint_f: f32,
    pub common: CommonState,
}

/// Setpoint shift relative to the preferred setpoint (°F). Positive raises
/// the setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HvacCommand {
    pub setpoint_shift_f: f32,
}

/// A thermostatically controlled residential HVAC unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hvac {
    pub id: String,
    pub params: HvacParams,
    pub state: HvacState,
}

impl Hvac {
    pub fn new(id: impl Into<String>, params: HvacParams, tin_f: f32, baseline_bias: f32) -> Self {
        let setpoint_f = params.preferred_f;
        Self {
            id: id.into(),
            params,
            state: HvacState {
                tin_f,
                running: false,
                setpoint_f,
                common: CommonState::with_bias(baseline_bias),
            },
        }
    }

    /// Direction in which running moves the indoor temperature.
    fn drive_sign(&self) -> f32 {
        match self.params.mode {
            HvacMode::Cooling => -1.0,
            HvacMode::Heating => 1.0,
        }
    }

    /// Steady-state duty cycle that would hold the preferred setpoint at the
    /// given outdoor temperature.
    pub fn baseline_duty(&self, outdoor_temp_f: f32) -> f32 {
        let p = &self.params;
        let load_f = match p.mode {
            HvacMode::Cooling => outdoor_temp_f - p.preferred_f,
            HvacMode::Heating => p.preferred_f - outdoor_temp_f,
        };
        let beta = p.beta_f.abs();
        if load_f <= 0.0 || beta <= 0.0 {
            return 0.0;
        }
        (p.alpha * load_f / beta).clamp(0.0, 1.0)
    }

    /// Counterfactual draw at the preferred setpoint (kW).
    pub fn baseline_kw(&self, outdoor_temp_f: f32) -> f32 {
        self.params.rated_kw * self.baseline_duty(outdoor_temp_f)
    }

    /// Distance to the hard comfort bound in the conditioning direction (°F).
    pub fn comfort_margin_f(&self) -> f32 {
        match self.params.mode {
            HvacMode::Cooling => self.params.comfort_max_f - self.state.tin_f,
            HvacMode::Heating => self.state.tin_f - self.params.comfort_min_f,
        }
    }

    /// Span between the preferred setpoint and the hard comfort bound (°F).
    pub fn comfort_span_f(&self) -> f32 {
        match self.params.mode {
            HvacMode::Cooling => self.params.comfort_max_f - self.params.preferred_f,
            HvacMode::Heating => self.params.preferred_f - self.params.comfort_min_f,
        }
    }

    /// Setpoint-shift sign that reduces consumption for this mode.
    pub fn relief_direction(&self) -> f32 {
        -self.drive_sign()
    }

    fn thermostat(&self, setpoint_f: f32) -> bool {
        let half = self.params.deadband_f.max(0.0) / 2.0;
        let tin = self.state.tin_f;
        match self.params.mode {
            HvacMode::Cooling if tin > setpoint_f + half => true,
            HvacMode::Cooling if tin < setpoint_f - half => false,
            HvacMode::Heating if tin < setpoint_f - half => true,
            HvacMode::Heating if tin > setpoint_f + half => false,
            _ => self.state.running,
        }
    }
}

impl AssetModel for Hvac {
    type Command = HvacCommand;

    fn id(&self) -> &str {
        &self.id
    }

    fn common(&self) -> &CommonState {
        &self.state.common
    }

    fn common_mut(&mut self) -> &mut CommonState {
        &mut self.state.common
    }

    fn transition(&self, command: Option<&HvacCommand>, ctx: &AssetContext) -> Transition<Self> {
        let p = &self.params;
        let outdoor = ctx.conditions.outdoor_temp_f;
        let setpoint_f = p.preferred_f + command.map_or(0.0, |c| c.setpoint_shift_f);
        let running = self.thermostat(setpoint_f);

        let drive = if running {
            self.drive_sign() * p.beta_f.abs()
        } else {
            0.0
        };
        let tin_f = self.state.tin_f + p.alpha * (outdoor - self.state.tin_f) + drive;

        let crossed = match p.mode {
            HvacMode::Cooling => tin_f > p.comfort_max_f,
            HvacMode::Heating => tin_f < p.comfort_min_f,
        };

        let mut next = self.clone();
        next.state.tin_f = tin_f;
        next.state.running = running;
        next.state.setpoint_f = setpoint_f;
        next.state.common.dropped = crossed;

        Transition {
            next,
            baseline_kw: self.baseline_kw(outdoor),
            actual_kw: if running { p.rated_kw } else { 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::types::Conditions;

    fn cooling() -> HvacParams {
        HvacParams {
            mode: HvacMode::Cooling,
            alpha: 0.1,
            beta_f: 1.5,
            rated_kw: 3.5,
            preferred_f: 74.0,
            comfort_min_f: 66.0,
            comfort_max_f: 78.0,
            deadband_f: 1.0,
        }
    }

    fn ctx(outdoor: f32) -> AssetContext {
        AssetContext::ideal(Conditions::new(0, outdoor, 14))
    }

    #[test]
    fn cooling_turns_on_above_deadband() {
        let hvac = Hvac::new("h", cooling(), 75.0, 0.0);
        let t = hvac.transition(None, &ctx(90.0));
        assert!(t.next.state.running);
        assert_eq!(t.actual_kw, 3.5);
        // 75 + 0.1 * 15 - 1.5
        assert!((t.next.state.tin_f - 75.0).abs() < 1e-5);
    }

    #[test]
    fn raised_setpoint_keeps_unit_off() {
        let hvac = Hvac::new("h", cooling(), 75.0, 0.0);
        let t = hvac.transition(Some(&HvacCommand { setpoint_shift_f: 2.0 }), &ctx(90.0));
        assert!(!t.next.state.running);
        assert_eq!(t.next.state.setpoint_f, 76.0);
        assert!(t.baseline_kw - t.actual_kw > 0.0);
    }

    #[test]
    fn hysteresis_holds_previous_state_inside_band() {
        let mut hvac = Hvac::new("h", cooling(), 74.2, 0.0);
        hvac.state.running = true;
        let t = hvac.transition(None, &ctx(90.0));
        assert!(t.next.state.running);
        hvac.state.running = false;
        let t = hvac.transition(None, &ctx(90.0));
        assert!(!t.next.state.running);
    }

    #[test]
    fn crossing_comfort_max_drops() {
        let hvac = Hvac::new("h", cooling(), 77.9, 0.0);
        let t = hvac.transition(Some(&HvacCommand { setpoint_shift_f: 4.0 }), &ctx(100.0));
        assert!(t.next.state.tin_f > 78.0);
        assert!(t.next.state.common.dropped);
    }

    #[test]
    fn heating_mirrors_cooling() {
        let params = HvacParams {
            mode: HvacMode::Heating,
            preferred_f: 68.0,
            comfort_min_f: 64.0,
            comfort_max_f: 76.0,
            ..cooling()
        };
        let hvac = Hvac::new("h", params, 67.0, 0.0);
        let t = hvac.transition(None, &ctx(30.0));
        assert!(t.next.state.running);
        assert_eq!(hvac.relief_direction(), -1.0);
        assert!(hvac.baseline_duty(30.0) > 0.0);
        assert_eq!(hvac.baseline_duty(80.0), 0.0);
    }

    #[test]
    fn duty_is_zero_when_mild() {
        let hvac = Hvac::new("h", cooling(), 72.0, 0.0);
        assert_eq!(hvac.baseline_duty(70.0), 0.0);
        assert!((hvac.baseline_duty(89.0) - 1.0).abs() < 1e-6);
    }
}
