//! Commercial/industrial building with fatigue-limited HVAC shed and a
//! toggleable process load.

use serde::{Deserialize, Serialize};

use super::types::{AssetContext, AssetModel, CommonState, Transition};

/// Fatigue level beyond which the building opts out for the rest of the run.
pub const FATIGUE_DROP_THRESHOLD: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiParams {
    /// Non-sheddable base load (kW).
    pub base_load_kw: f32,
    /// Fresh (zero-fatigue) HVAC shed capacity `Smax` (kW).
    pub shed_max_kw: f32,
    /// Capacity decay rate `k` in `Smax * exp(-k * fatigue)`.
    pub fatigue_decay: f32,
    /// Fatigue gained per tick at full shed (`a`).
    pub fatigue_gain: f32,
    /// Fatigue recovered per tick with no shed (`b`).
    pub fatigue_recovery: f32,
    /// Process load switched by a toggle (kW).
    pub process_kw: f32,
    pub max_process_toggles: u32,
    /// First business hour (inclusive, local clock).
    pub business_start_hour: u32,
    /// End of business hours (exclusive, local clock).
    pub business_end_hour: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiState {
    pub fatigue: f32,
    /// HVAC shed delivered during the last tick (kW).
    pub shed_kw: f32,
    pub process_on: bool,
    pub toggles_used: u32,
    pub common: CommonState,
}

/// HVAC shed request plus the desired process state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CiCommand {
    pub shed_kw: f32,
    /// Request to switch the process load off.
    pub process_off: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiBuilding {
    pub id: String,
    pub params: CiParams,
    pub state: CiState,
}

impl CiBuilding {
    pub fn new(id: impl Into<String>, params: CiParams, baseline_bias: f32) -> Self {
        Self {
            id: id.into(),
            params,
            state: CiState {
                fatigue: 0.0,
                shed_kw: 0.0,
                process_on: true,
                toggles_used: 0,
                common: CommonState::with_bias(baseline_bias),
            },
        }
    }

    /// Fatigue-decayed HVAC shed capacity (kW).
    pub fn shed_capacity_kw(&self) -> f32 {
        let p = &self.params;
        (p.shed_max_kw * (-p.fatigue_decay * self.state.fatigue).exp()).max(0.0)
    }

    pub fn in_business_hours(&self, hour: u32) -> bool {
        let p = &self.params;
        if p.business_start_hour <= p.business_end_hour {
            hour >= p.business_start_hour && hour < p.business_end_hour
        } else {
            hour >= p.business_start_hour || hour < p.business_end_hour
        }
    }

    /// A toggle is available while budget remains, outside business hours or
    /// once the first toggle has already been spent.
    pub fn toggle_permitted(&self, hour: u32) -> bool {
        self.state.toggles_used < self.params.max_process_toggles
            && (!self.in_business_hours(hour) || self.state.toggles_used >= 1)
    }

    /// Counterfactual consumption: base load with the process running (kW).
    pub fn baseline_kw(&self) -> f32 {
        self.params.base_load_kw + self.params.process_kw
    }
}

impl AssetModel for CiBuilding {
    type Command = CiCommand;

    fn id(&self) -> &str {
        &self.id
    }

    fn common(&self) -> &CommonState {
        &self.state.common
    }

    fn common_mut(&mut self) -> &mut CommonState {
        &mut self.state.common
    }

    fn transition(&self, command: Option<&CiCommand>, ctx: &AssetContext) -> Transition<Self> {
        let p = &self.params;
        let shed_kw = command.map_or(0.0, |c| c.shed_kw.clamp(0.0, self.shed_capacity_kw()));
        let shed_ratio = if p.shed_max_kw > 0.0 {
            (shed_kw / p.shed_max_kw).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let fatigue = (self.state.fatigue + p.fatigue_gain * shed_ratio
            - p.fatigue_recovery * (1.0 - shed_ratio))
            .max(0.0);

        let want_on = command.is_none_or(|c| !c.process_off);
        let mut next = self.clone();
        if want_on != self.state.process_on && self.toggle_permitted(ctx.conditions.hour_of_day) {
            next.state.process_on = want_on;
            next.state.toggles_used += 1;
        }

        next.state.fatigue = fatigue;
        next.state.shed_kw = shed_kw;
        next.state.common.dropped = fatigue > FATIGUE_DROP_THRESHOLD;

        let process_kw = if next.state.process_on {
            p.process_kw
        } else {
            0.0
        };

        Transition {
            next,
            baseline_kw: self.baseline_kw(),
            actual_kw: p.base_load_kw - shed_kw + process_kw,
        }
    }
}
