//! Commercial fleet-charging site: many vehicles sharing one site cap.

use serde::{Deserialize, Serialize};

use super::types::{AssetContext, AssetModel, CommonState, TICK_HOURS, Transition};

/// Fixed parameters of one vehicle visiting the site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetVehicle {
    pub t_arrive: usize,
    pub t_depart: usize,
    pub p_max_kw: f32,
    pub e_req_kwh: f32,
}

/// Mutable per-vehicle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetVehicleState {
    pub e_kwh: f32,
    pub plugged: bool,
    pub charge_kw: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetParams {
    /// Site cap applied when no command is in effect (kW).
    pub default_cap_kw: f32,
    pub vehicles: Vec<FleetVehicle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetState {
    pub vehicles: Vec<FleetVehicleState>,
    /// Cap in effect during the last tick (kW).
    pub site_cap_kw: f32,
    /// Total site draw during the last tick (kW).
    pub power_kw: f32,
    pub common: CommonState,
}

/// Site-wide charging cap (kW).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FleetCommand {
    pub site_cap_kw: f32,
}

/// Fleet charging depot. Never drops on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSite {
    pub id: String,
    pub params: FleetParams,
    pub state: FleetState,
}

impl FleetSite {
    /// Creates a site; `initial_kwh[i]` seeds vehicle `i` (missing entries
    /// start empty).
    pub fn new(
        id: impl Into<String>,
        params: FleetParams,
        initial_kwh: &[f32],
        baseline_bias: f32,
    ) -> Self {
        let vehicles = (0..params.vehicles.len())
            .map(|i| FleetVehicleState {
                e_kwh: initial_kwh.get(i).copied().unwrap_or(0.0).max(0.0),
                plugged: false,
                charge_kw: 0.0,
            })
            .collect();
        let site_cap_kw = params.default_cap_kw;
        Self {
            id: id.into(),
            params,
            state: FleetState {
                vehicles,
                site_cap_kw,
                power_kw: 0.0,
                common: CommonState::with_bias(baseline_bias),
            },
        }
    }

    fn remaining_kwh(&self, i: usize) -> f32 {
        let e = self.state.vehicles.get(i).map_or(0.0, |v| v.e_kwh);
        (self.params.vehicles[i].e_req_kwh - e).max(0.0)
    }

    fn is_present(v: &FleetVehicle, tick: usize) -> bool {
        tick >= v.t_arrive && tick < v.t_depart
    }

    /// Urgency of each vehicle: remaining energy over remaining time (kW).
    /// Absent or satisfied vehicles have zero urgency.
    pub fn urgencies(&self, tick: usize) -> Vec<f32> {
        self.params
            .vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let remaining = self.remaining_kwh(i);
                if !Self::is_present(v, tick) || remaining <= 0.0 {
                    return 0.0;
                }
                let ticks_left = v.t_depart.saturating_sub(tick).max(1);
                remaining / (ticks_left as f32 * TICK_HOURS)
            })
            .collect()
    }

    /// Splits `cap_kw` across needy vehicles in proportion to urgency.
    ///
    /// Each allocation is bounded by the vehicle rating and by what it can
    /// still absorb this tick; capacity freed by saturated vehicles is
    /// offered once more to the rest.
    pub fn allocate(&self, tick: usize, cap_kw: f32) -> Vec<f32> {
        let urgencies = self.urgencies(tick);
        let limits: Vec<f32> = self
            .params
            .vehicles
            .iter()
            .enumerate()
            .map(|(i, v)| {
                if urgencies[i] > 0.0 {
                    v.p_max_kw.min(self.remaining_kwh(i) / TICK_HOURS).max(0.0)
                } else {
                    0.0
                }
            })
            .collect();

        let mut alloc = vec![0.0_f32; urgencies.len()];
        let mut budget = cap_kw.max(0.0);
        for _ in 0..2 {
            let open_urgency: f32 = urgencies
                .iter()
                .zip(alloc.iter().zip(&limits))
                .filter(|(_, (a, l))| **a < **l)
                .map(|(u, _)| *u)
                .sum();
            if open_urgency <= 0.0 || budget <= 1e-6 {
                break;
            }
            let mut spent = 0.0;
            for i in 0..alloc.len() {
                if alloc[i] >= limits[i] || urgencies[i] <= 0.0 {
                    continue;
                }
                let share = budget * urgencies[i] / open_urgency;
                let add = share.min(limits[i] - alloc[i]);
                alloc[i] += add;
                spent += add;
            }
            budget -= spent;
        }
        alloc
    }

    /// Uncontrolled site draw under the default cap (kW).
    pub fn baseline_kw(&self, tick: usize) -> f32 {
        self.allocate(tick, self.params.default_cap_kw).iter().sum()
    }

    /// Sum of the rates needed to finish every present vehicle on time (kW).
    pub fn required_rate_kw(&self, tick: usize) -> f32 {
        self.urgencies(tick).iter().sum()
    }
}

impl AssetModel for FleetSite {
    type Command = FleetCommand;

    fn id(&self) -> &str {
        &self.id
    }

    fn common(&self) -> &CommonState {
        &self.state.common
    }

    fn common_mut(&mut self) -> &mut CommonState {
        &mut self.state.common
    }

    fn transition(&self, command: Option<&FleetCommand>, ctx: &AssetContext) -> Transition<Self> {
        let tick = ctx.conditions.tick;
        let cap_kw = command.map_or(self.params.default_cap_kw, |c| c.site_cap_kw.max(0.0));
        let alloc = self.allocate(tick, cap_kw);

        let mut next = self.clone();
        for (i, (vehicle, kw)) in next.state.vehicles.iter_mut().zip(&alloc).enumerate() {
            vehicle.plugged = Self::is_present(&self.params.vehicles[i], tick);
            vehicle.charge_kw = *kw;
            vehicle.e_kwh += kw * TICK_HOURS;
        }
        let actual_kw: f32 = alloc.iter().sum();
        next.state.site_cap_kw = cap_kw;
        next.state.power_kw = actual_kw;

        Transition {
            next,
            baseline_kw: self.baseline_kw(tick),
            actual_kw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::types::Conditions;

    fn site() -> FleetSite {
        FleetSite::new(
            "depot",
            FleetParams {
                default_cap_kw: 100.0,
                vehicles: vec![
                    FleetVehicle {
                        t_arrive: 0,
                        t_depart: 12,
                        p_max_kw: 50.0,
                        e_req_kwh: 40.0,
                    },
                    FleetVehicle {
                        t_arrive: 0,
                        t_depart: 48,
                        p_max_kw: 50.0,
                        e_req_kwh: 40.0,
                    },
                    FleetVehicle {
                        t_arrive: 20,
                        t_depart: 40,
                        p_max_kw: 50.0,
                        e_req_kwh: 40.0,
                    },
                ],
            },
            &[],
            0.0,
        )
    }

    fn ctx(tick: usize) -> AssetContext {
        AssetContext::ideal(Conditions::new(tick, 75.0, 3))
    }

    #[test]
    fn urgent_vehicle_gets_larger_share() {
        let s = site();
        let alloc = s.allocate(0, 30.0);
        assert!(alloc[0] > alloc[1]);
        assert_eq!(alloc[2], 0.0);
        assert!((alloc.iter().sum::<f32>() - 30.0).abs() < 1e-3);
    }

    #[test]
    fn allocation_respects_vehicle_rating() {
        let s = site();
        let alloc = s.allocate(0, 1_000.0);
        assert!(alloc.iter().all(|kw| *kw <= 50.0 + 1e-4));
    }

    #[test]
    fn cap_command_reduces_draw() {
        let s = site();
        let t = s.transition(Some(&FleetCommand { site_cap_kw: 20.0 }), &ctx(0));
        assert!((t.actual_kw - 20.0).abs() < 1e-3);
        assert!(t.baseline_kw > t.actual_kw);
        assert_eq!(t.next.state.site_cap_kw, 20.0);
        assert!(t.next.state.vehicles[0].plugged);
        assert!(!t.next.state.vehicles[2].plugged);
    }

    #[test]
    fn empty_site_draws_nothing() {
        let s = site();
        let t = s.transition(None, &ctx(60));
        assert_eq!(t.actual_kw, 0.0);
        assert!(!t.next.state.common.dropped);
    }
}
