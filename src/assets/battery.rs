use serde::{Deserialize, Serialize};

use super::types::{AssetContext, AssetModel, CommonState, TICK_HOURS, Transition};

/// Fixed parameters of a home battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryParams {
    /// Usable energy capacity (kWh, > 0).
    pub capacity_kwh: f32,
    /// Maximum charging power (kW, positive magnitude).
    pub p_ch_kw: f32,
    /// Maximum discharging power (kW, positive magnitude).
    pub p_dis_kw: f32,
    /// SOC floor that dispatch may never cross (fraction).
    pub soc_reserve: f32,
    /// Charging efficiency (0..1].
    pub eta_charge: f32,
    /// Discharging efficiency (0..1].
    pub eta_discharge: f32,
}

/// Mutable battery state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    /// State of charge, always within `[soc_reserve, 1.0]`.
    pub soc: f32,
    /// Last delivered power (kW; positive=discharge, negative=charge).
    pub power_kw: f32,
    pub common: CommonState,
}

/// Battery power request. Positive discharges (reduces net load), negative
/// charges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryCommand {
    pub power_kw: f32,
}

/// A home battery modeled as a single SOC bucket.
///
/// Idle is the counterfactual baseline, so the full delivered discharge is
/// the asset's contribution. Batteries have no modeled failure mode and never
/// set `dropped` themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    pub id: String,
    pub params: BatteryParams,
    pub state: BatteryState,
}

impl Battery {
    /// Creates a battery at the given SOC.
    ///
    /// The SOC is clamped into `[soc_reserve, 1.0]`; configuration
    /// validation rejects out-of-range values before this point.
    pub fn new(id: impl Into<String>, params: BatteryParams, soc: f32, baseline_bias: f32) -> Self {
        let soc = soc.clamp(params.soc_reserve.clamp(0.0, 1.0), 1.0);
        Self {
            id: id.into(),
            params,
            state: BatteryState {
                soc,
                power_kw: 0.0,
                common: CommonState::with_bias(baseline_bias),
            },
        }
    }

    /// Maximum discharge power this tick, bounded by rating and the energy
    /// above reserve.
    pub fn available_discharge_kw(&self) -> f32 {
        let p = &self.params;
        let above_reserve_kwh = (self.state.soc - p.soc_reserve).max(0.0) * p.capacity_kwh;
        let max_kw_soc = above_reserve_kwh * p.eta_discharge / TICK_HOURS;
        p.p_dis_kw.min(max_kw_soc).max(0.0)
    }

    /// Maximum charge power this tick, bounded by rating and headroom.
    pub fn available_charge_kw(&self) -> f32 {
        let p = &self.params;
        if p.eta_charge <= 0.0 {
            return 0.0;
        }
        let headroom_kwh = (1.0 - self.state.soc).max(0.0) * p.capacity_kwh;
        let max_kw_soc = headroom_kwh / p.eta_charge / TICK_HOURS;
        p.p_ch_kw.min(max_kw_soc).max(0.0)
    }
}

impl AssetModel for Battery {
    type Command = BatteryCommand;

    fn id(&self) -> &str {
        &self.id
    }

    fn common(&self) -> &CommonState {
        &self.state.common
    }

    fn common_mut(&mut self) -> &mut CommonState {
        &mut self.state.common
    }

    fn transition(&self, command: Option<&BatteryCommand>, _ctx: &AssetContext) -> Transition<Self> {
        let p = &self.params;
        let request_kw = command.map_or(0.0, |c| c.power_kw);
        let mut next = self.clone();

        let delivered_kw = if request_kw > 0.0 && p.capacity_kwh > 0.0 {
            let kw = request_kw.min(self.available_discharge_kw());
            if p.eta_discharge > 0.0 {
                next.state.soc -= kw * TICK_HOURS / (p.capacity_kwh * p.eta_discharge);
            }
            kw
        } else if request_kw < 0.0 && p.capacity_kwh > 0.0 {
            let kw = (-request_kw).min(self.available_charge_kw());
            next.state.soc += kw * TICK_HOURS * p.eta_charge / p.capacity_kwh;
            -kw
        } else {
            0.0
        };

        next.state.soc = next.state.soc.clamp(p.soc_reserve.clamp(0.0, 1.0), 1.0);
        next.state.power_kw = delivered_kw;

        Transition {
            next,
            baseline_kw: 0.0,
            actual_kw: -delivered_kw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::types::Conditions;

    fn params() -> BatteryParams {
        BatteryParams {
            capacity_kwh: 10.0,
            p_ch_kw: 5.0,
            p_dis_kw: 5.0,
            soc_reserve: 0.2,
            eta_charge: 1.0,
            eta_discharge: 1.0,
        }
    }

    fn ctx() -> AssetContext {
        AssetContext::ideal(Conditions::new(0, 75.0, 12))
    }

    fn step(b: &Battery, kw: f32) -> Transition<Battery> {
        b.transition(Some(&BatteryCommand { power_kw: kw }), &ctx())
    }

    #[test]
    fn discharge_power_limit() {
        let b = Battery::new("b", params(), 0.9, 0.0);
        let t = step(&b, 10.0);
        assert_eq!(t.next.state.power_kw, 5.0);
        assert_eq!(t.baseline_kw - t.actual_kw, 5.0);
    }

    #[test]
    fn charge_power_limit() {
        let b = Battery::new("b", params(), 0.5, 0.0);
        let t = step(&b, -10.0);
        assert_eq!(t.next.state.power_kw, -5.0);
        assert_eq!(t.baseline_kw - t.actual_kw, -5.0);
    }

    #[test]
    fn discharge_stops_at_reserve() {
        // 0.01 above reserve on 10 kWh = 0.1 kWh = 1.2 kW over one 5-minute tick
        let b = Battery::new("b", params(), 0.21, 0.0);
        let t = step(&b, 5.0);
        assert!((t.next.state.power_kw - 1.2).abs() < 1e-3);
        assert!((t.next.state.soc - 0.2).abs() < 1e-5);
    }

    #[test]
    fn charge_stops_at_full() {
        let b = Battery::new("b", params(), 0.99, 0.0);
        let t = step(&b, -5.0);
        assert!((t.next.state.power_kw + 1.2).abs() < 1e-3);
        assert!((t.next.state.soc - 1.0).abs() < 1e-5);
    }

    #[test]
    fn soc_never_leaves_bounds_over_many_ticks() {
        let mut b = Battery::new("b", params(), 0.5, 0.0);
        for i in 0..500 {
            let kw = if (i / 40) % 2 == 0 { 5.0 } else { -5.0 };
            b = step(&b, kw).next;
            assert!(b.state.soc >= 0.2 - 1e-6 && b.state.soc <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn idle_without_command() {
        let b = Battery::new("b", params(), 0.5, 0.0);
        let t = b.transition(None, &ctx());
        assert_eq!(t.next.state.soc, 0.5);
        assert_eq!(t.actual_kw, 0.0);
        assert!(!t.next.state.common.dropped);
    }

    #[test]
    fn initial_soc_is_clamped_to_reserve() {
        let b = Battery::new("b", params(), 0.05, 0.0);
        assert_eq!(b.state.soc, 0.2);
    }
}
