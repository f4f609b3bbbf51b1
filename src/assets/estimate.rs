//! Capacity and risk estimators shared by the decision engine.
//!
//! These are budgeting heuristics computed from the current state only. The
//! measured contribution of an asset always comes from its model.

use super::types::{Asset, AssetKind, Conditions};

/// Battery risk is scaled down since batteries have no drop mode.
const BATTERY_RISK_SCALE: f32 = 0.2;

fn ratio(num: f32, den: f32) -> f32 {
    if den > 0.0 && num.is_finite() {
        (num / den).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Load reduction the asset could deliver this tick if fully dispatched (kW).
pub fn capacity_kw(asset: &Asset, cond: &Conditions) -> f32 {
    if asset.is_dropped() {
        return 0.0;
    }
    let kw = match asset {
        Asset::Hvac(h) => h.baseline_kw(cond.outdoor_temp_f),
        Asset::Battery(b) => b.available_discharge_kw(),
        Asset::Ev(ev) => {
            if ev.state.override_active || ev.deadline_tight(cond.tick) {
                0.0
            } else {
                ev.baseline_kw(cond.tick)
            }
        }
        Asset::FleetSite(f) => f.baseline_kw(cond.tick) - f.required_rate_kw(cond.tick),
        Asset::CiBuilding(c) => {
            let process = if c.state.process_on && c.toggle_permitted(cond.hour_of_day) {
                c.params.process_kw
            } else {
                0.0
            };
            c.shed_capacity_kw() + process
        }
    };
    kw.max(0.0)
}

/// Nameplate size used to normalize capacity into headroom (kW).
pub fn nominal_kw(asset: &Asset) -> f32 {
    match asset {
        Asset::Hvac(h) => h.params.rated_kw,
        Asset::Battery(b) => b.params.p_dis_kw,
        Asset::Ev(ev) => ev.params.p_max_kw,
        Asset::FleetSite(f) => f.params.default_cap_kw,
        Asset::CiBuilding(c) => c.params.shed_max_kw + c.params.process_kw,
    }
}

/// Current capacity as a fraction of nameplate, in `[0, 1]`.
pub fn headroom(asset: &Asset, cond: &Conditions) -> f32 {
    ratio(capacity_kw(asset, cond), nominal_kw(asset))
}

/// Normalized distance to the asset's terminal limit, in `[0, 1]`.
///
/// 1.0 means far from any limit, 0.0 means at the limit.
pub fn margin(asset: &Asset, cond: &Conditions) -> f32 {
    match asset {
        Asset::Hvac(h) => ratio(h.comfort_margin_f(), h.comfort_span_f()),
        Asset::Battery(b) => ratio(
            b.state.soc - b.params.soc_reserve,
            1.0 - b.params.soc_reserve,
        ),
        Asset::Ev(ev) => {
            let remaining = ev.remaining_kwh();
            let feasible = ev.max_feasible_kwh(cond.tick);
            if remaining <= 0.0 {
                1.0
            } else if feasible <= 0.0 {
                0.0
            } else {
                1.0 - ratio(remaining, feasible)
            }
        }
        Asset::FleetSite(f) => {
            let baseline = f.baseline_kw(cond.tick);
            if baseline <= 0.0 {
                1.0
            } else {
                1.0 - ratio(f.required_rate_kw(cond.tick), baseline)
            }
        }
        Asset::CiBuilding(c) => 1.0 - ratio(c.state.fatigue, 2.0),
    }
}

/// Heuristic probability that dispatching the asset leads to a drop.
pub fn drop_risk(asset: &Asset, cond: &Conditions, conservation: f32) -> f32 {
    if asset.is_dropped() {
        return 1.0;
    }
    let risk = ((1.0 - margin(asset, cond)) * conservation).clamp(0.0, 1.0);
    match asset.kind() {
        AssetKind::Battery => risk * BATTERY_RISK_SCALE,
        _ => risk,
    }
}

/// Occupant or customer cost of curtailment, in `[0, 1]`.
pub fn comfort_cost(asset: &Asset, cond: &Conditions) -> f32 {
    match asset {
        Asset::Battery(_) => 0.0,
        Asset::Hvac(_) | Asset::Ev(_) | Asset::FleetSite(_) => 1.0 - margin(asset, cond),
        Asset::CiBuilding(c) => ratio(c.state.fatigue, 2.0),
    }
}

/// Stored-energy buffer, in `[0, 1]`. Non-storage assets report their margin.
pub fn soc_buffer(asset: &Asset, cond: &Conditions) -> f32 {
    match asset {
        Asset::Battery(b) => ratio(
            b.state.soc - b.params.soc_reserve,
            1.0 - b.params.soc_reserve,
        ),
        Asset::Ev(ev) => {
            if ev.params.e_req_kwh <= 0.0 {
                1.0
            } else {
                ratio(ev.state.e_kwh, ev.params.e_req_kwh)
            }
        }
        _ => margin(asset, cond),
    }
}

/// Accumulated curtailment fatigue, in `[0, 1]`.
pub fn fatigue_level(asset: &Asset) -> f32 {
    match asset {
        Asset::CiBuilding(c) => ratio(c.state.fatigue, 2.0),
        _ => 0.0,
    }
}

/// Typical spread of the realized response around the request.
pub fn response_variance(kind: AssetKind) -> f32 {
    match kind {
        AssetKind::Hvac => 0.3,
        AssetKind::Battery => 0.05,
        AssetKind::Ev => 0.15,
        AssetKind::FleetSite => 0.1,
        AssetKind::CiBuilding => 0.2,
    }
}

/// Static preference used by the asset-type-priority ordering.
pub fn type_priority(kind: AssetKind) -> f32 {
    match kind {
        AssetKind::Battery => 1.0,
        AssetKind::CiBuilding => 0.8,
        AssetKind::FleetSite => 0.6,
        AssetKind::Ev => 0.4,
        AssetKind::Hvac => 0.2,
    }
}
