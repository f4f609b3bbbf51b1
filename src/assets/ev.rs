use serde::{Deserialize, Serialize};

use super::types::{AssetContext, AssetModel, CommonState, TICK_HOURS, Transition};

/// Multiplier on the remaining energy requirement that triggers the
/// deadline override.
pub const OVERRIDE_SLACK: f32 = 1.1;

/// Fixed parameters of one residential EV charging session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvParams {
    /// Tick at which the vehicle plugs in (inclusive).
    pub t_arrive: usize,
    /// Tick at which the vehicle leaves (exclusive).
    pub t_depart: usize,
    /// Maximum charging power (kW).
    pub p_max_kw: f32,
    /// Energy the vehicle must hold at departure (kWh).
    pub e_req_kwh: f32,
}

/// Mutable EV state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvState {
    /// Energy delivered so far (kWh).
    pub e_kwh: f32,
    pub plugged: bool,
    /// Set once the deadline becomes tight; forces max-rate charging until
    /// departure.
    pub override_active: bool,
    /// Charging power during the last tick (kW).
    pub charge_kw: f32,
    pub common: CommonState,
}

/// Requested reduction below the uncontrolled charging rate (kW).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvCommand {
    pub rate_reduction_kw: f32,
}

/// A residential EV charger serving a single session.
///
/// The uncontrolled baseline charges at full rate from arrival until the
/// requirement is met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ev {
    pub id: String,
    pub params: EvParams,
    pub state: EvState,
}

impl Ev {
    pub fn new(id: impl Into<String>, params: EvParams, e_kwh: f32, baseline_bias: f32) -> Self {
        Self {
            id: id.into(),
            params,
            state: EvState {
                e_kwh: e_kwh.max(0.0),
                plugged: false,
                override_active: false,
                charge_kw: 0.0,
                common: CommonState::with_bias(baseline_bias),
            },
        }
    }

    /// Whether `tick` falls inside the plug-in window.
    pub fn is_present(&self, tick: usize) -> bool {
        tick >= self.params.t_arrive && tick < self.params.t_depart
    }

    /// Energy still required before departure (kWh).
    pub fn remaining_kwh(&self) -> f32 {
        (self.params.e_req_kwh - self.state.e_kwh).max(0.0)
    }

    /// Most energy that can still be delivered before departure (kWh).
    pub fn max_feasible_kwh(&self, tick: usize) -> f32 {
        self.params.t_depart.saturating_sub(tick) as f32 * self.params.p_max_kw * TICK_HOURS
    }

    /// Whether the deadline condition for the override holds at `tick`.
    pub fn deadline_tight(&self, tick: usize) -> bool {
        self.max_feasible_kwh(tick) <= OVERRIDE_SLACK * self.remaining_kwh()
    }

    /// Uncontrolled charging power at `tick` (kW).
    pub fn baseline_kw(&self, tick: usize) -> f32 {
        if !self.is_present(tick) {
            return 0.0;
        }
        self.params.p_max_kw.min(self.remaining_kwh() / TICK_HOURS).max(0.0)
    }

    /// Average rate needed to finish exactly at departure (kW).
    pub fn required_rate_kw(&self, tick: usize) -> f32 {
        let ticks_left = self.params.t_depart.saturating_sub(tick).max(1);
        self.remaining_kwh() / (ticks_left as f32 * TICK_HOURS)
    }
}

impl AssetModel for Ev {
    type Command = EvCommand;

    fn id(&self) -> &str {
        &self.id
    }

    fn common(&self) -> &CommonState {
        &self.state.common
    }

    fn common_mut(&mut self) -> &mut CommonState {
        &mut self.state.common
    }

    fn transition(&self, command: Option<&EvCommand>, ctx: &AssetContext) -> Transition<Self> {
        let tick = ctx.conditions.tick;
        let mut next = self.clone();

        if tick >= self.params.t_depart {
            next.state.plugged = false;
            next.state.override_active = false;
            next.state.charge_kw = 0.0;
            next.state.common.dropped = true;
            return Transition {
                next,
                baseline_kw: 0.0,
                actual_kw: 0.0,
            };
        }

        if tick < self.params.t_arrive {
            next.state.plugged = false;
            next.state.charge_kw = 0.0;
            return Transition {
                next,
                baseline_kw: 0.0,
                actual_kw: 0.0,
            };
        }

        let baseline_kw = self.baseline_kw(tick);
        let override_active = self.state.override_active || self.deadline_tight(tick);
        let charge_kw = match command {
            Some(c) if !override_active => (baseline_kw - c.rate_reduction_kw.max(0.0)).max(0.0),
            _ => baseline_kw,
        };

        next.state.plugged = true;
        next.state.override_active = override_active;
        next.state.charge_kw = charge_kw;
        next.state.e_kwh += charge_kw * TICK_HOURS;

        Transition {
            next,
            baseline_kw,
            actual_kw: charge_kw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::types::Conditions;

    fn params() -> EvParams {
        EvParams {
            t_arrive: 2,
            t_depart: 30,
            p_max_kw: 7.2,
            e_req_kwh: 12.0,
        }
    }

    fn ctx(tick: usize) -> AssetContext {
        AssetContext::ideal(Conditions::new(tick, 75.0, 18))
    }

    fn full_reduction() -> EvCommand {
        EvCommand {
            rate_reduction_kw: 7.2,
        }
    }

    #[test]
    fn idle_before_arrival() {
        let ev = Ev::new("ev", params(), 0.0, 0.0);
        let t = ev.transition(None, &ctx(0));
        assert!(!t.next.state.plugged);
        assert_eq!(t.actual_kw, 0.0);
    }

    #[test]
    fn reduction_lowers_charging() {
        let ev = Ev::new("ev", params(), 0.0, 0.0);
        let t = ev.transition(
            Some(&EvCommand {
                rate_reduction_kw: 3.2,
            }),
            &ctx(2),
        );
        assert!(t.next.state.plugged);
        assert!((t.actual_kw - 4.0).abs() < 1e-5);
        assert!((t.baseline_kw - 7.2).abs() < 1e-5);
    }

    #[test]
    fn reduction_applies_to_tapering_final_charge() {
        // 0.3 kWh short: uncontrolled rate is 3.6 kW, below p_max.
        let ev = Ev::new("ev", params(), 11.7, 0.0);
        assert!(!ev.deadline_tight(5));
        let t = ev.transition(
            Some(&EvCommand {
                rate_reduction_kw: 2.0,
            }),
            &ctx(5),
        );
        assert!((t.baseline_kw - 3.6).abs() < 1e-4);
        assert!((t.actual_kw - 1.6).abs() < 1e-4);

        let t = ev.transition(Some(&full_reduction()), &ctx(5));
        assert_eq!(t.actual_kw, 0.0);
    }

    #[test]
    fn override_forces_max_rate_and_sticks() {
        let mut ev = Ev::new("ev", params(), 0.0, 0.0);
        let mut engaged_at = None;
        for tick in 2..30 {
            let was_tight = ev.deadline_tight(tick);
            let t = ev.transition(Some(&full_reduction()), &ctx(tick));
            if was_tight && engaged_at.is_none() {
                engaged_at = Some(tick);
            }
            if engaged_at.is_some() {
                assert!(t.next.state.override_active, "override lost at {tick}");
                assert!((t.actual_kw - t.baseline_kw).abs() < 1e-6);
            }
            ev = t.next;
        }
        assert!(engaged_at.is_some());
    }

    #[test]
    fn departure_drops_permanently() {
        let ev = Ev::new("ev", params(), 0.0, 0.0);
        let t = ev.transition(None, &ctx(30));
        assert!(t.next.state.common.dropped);
        assert!(!t.next.state.plugged);
        assert!(!t.next.state.override_active);
    }

    #[test]
    fn satisfied_vehicle_draws_nothing() {
        let ev = Ev::new("ev", params(), 12.0, 0.0);
        let t = ev.transition(None, &ctx(5));
        assert_eq!(t.actual_kw, 0.0);
        assert_eq!(t.baseline_kw, 0.0);
        assert!(!t.next.state.override_active);
    }
}
