//! Per-asset state-transition models and the estimators built on them.

pub mod battery;
pub mod ci_building;
pub mod estimate;
pub mod ev;
pub mod fleet;
pub mod hvac;
pub mod noise;
pub mod types;

pub use battery::{Battery, BatteryCommand, BatteryParams, BatteryState};
pub use ci_building::{CiBuilding, CiCommand, CiParams, CiState};
pub use ev::{Ev, EvCommand, EvParams, EvState};
pub use fleet::{FleetCommand, FleetParams, FleetSite, FleetState, FleetVehicle};
pub use hvac::{Hvac, HvacCommand, HvacMode, HvacParams, HvacState};
pub use types::{
    Asset, AssetCommand, AssetContext, AssetKind, AssetModel, AssetStep, BaselineErrorParams,
    Command, CommonState, Conditions, TICK_HOURS, TICK_MINUTES,
};
