//! Translates a capacity request into the asset-specific command.

use crate::assets::{
    Asset, BatteryCommand, CiCommand, Command, Conditions, EvCommand, FleetCommand,
    HvacCommand,
};

use super::intensity;

/// Largest setpoint shift the engine will request (°F).
pub const MAX_SETPOINT_SHIFT_F: f32 = 2.0;

/// A synthesized command with the engine's own estimate of what it yields.
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesized {
    pub command: Command,
    /// Budgeting estimate of the contribution (kW). Not a measurement.
    pub estimate_kw: f32,
}

/// Builds the command that asks `asset` for `request_kw` of reduction.
///
/// `capacity_kw` is the raw capacity estimate and `dial` the asset type's
/// intensity. Returns `None` when nothing useful can be requested.
pub fn synthesize(
    asset: &Asset,
    request_kw: f32,
    capacity_kw: f32,
    dial: f32,
    conditions: &Conditions,
) -> Option<Synthesized> {
    if request_kw <= 0.0 || !request_kw.is_finite() {
        return None;
    }
    let out = match asset {
        Asset::Battery(_) => Synthesized {
            command: Command::Battery(BatteryCommand {
                power_kw: request_kw,
            }),
            estimate_kw: request_kw,
        },
        Asset::Hvac(h) => {
            if capacity_kw <= 0.0 {
                return None;
            }
            let steps = (MAX_SETPOINT_SHIFT_F * request_kw / capacity_kw)
                .round()
                .clamp(1.0, MAX_SETPOINT_SHIFT_F);
            Synthesized {
                command: Command::Hvac(HvacCommand {
                    setpoint_shift_f: steps * h.relief_direction(),
                }),
                estimate_kw: capacity_kw * steps / MAX_SETPOINT_SHIFT_F,
            }
        }
        Asset::Ev(_) => Synthesized {
            command: Command::Ev(EvCommand {
                rate_reduction_kw: request_kw,
            }),
            estimate_kw: request_kw,
        },
        Asset::FleetSite(f) => {
            let baseline = f.baseline_kw(conditions.tick);
            let cap = (baseline - request_kw).max(0.0);
            Synthesized {
                command: Command::FleetSite(FleetCommand { site_cap_kw: cap }),
                estimate_kw: baseline - cap,
            }
        }
        Asset::CiBuilding(c) => {
            let shed_cap = c.shed_capacity_kw();
            let switch_off = intensity::allows_process_toggle(dial)
                && c.state.process_on
                && c.toggle_permitted(conditions.hour_of_day)
                && request_kw > shed_cap;
            // A process already switched off stays off while dispatched; its
            // reduction is outside the capacity estimate and not budgeted.
            let process_kw = if switch_off { c.params.process_kw } else { 0.0 };
            let shed_kw = (request_kw - process_kw).clamp(0.0, shed_cap);
            Synthesized {
                command: Command::CiBuilding(CiCommand {
                    shed_kw,
                    process_off: switch_off || !c.state.process_on,
                }),
                estimate_kw: shed_kw + process_kw,
            }
        }
    };
    debug_assert_eq!(out.command.kind(), asset.kind(), "{}", asset.id());
    Some(out)
}
