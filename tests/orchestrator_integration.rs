//! End-to-end behavior of the tick orchestrator on small hand-built
//! portfolios.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::DateTime;
use der_dispatch_sim::assets::{Asset, CiBuilding, CiParams, Ev, EvParams};
use der_dispatch_sim::dispatch::strategy::{RiskPosture, StrategyConfig, StrategyPatch};
use der_dispatch_sim::error::SimError;
use der_dispatch_sim::sim::{RunStatus, Simulation, SimulationObserver, SimulationState};

#[test]
fn zero_target_scenario_has_no_penalty_and_no_dispatch() {
    let config = common::quiet_config(24, vec![0.0; 24], vec![90.0; 24]);
    let assets = vec![
        common::battery("b1", 0.9),
        common::battery("b2", 0.9),
        common::fast_hvac("h1", 74.0),
    ];
    let mut sim = Simulation::new(common::scenario(config, assets), StrategyConfig::default());
    let history = common::run(&mut sim);

    assert_eq!(history.len(), 24);
    assert_eq!(sim.state().cumulative_penalty, 0.0);
    assert!(history.iter().all(|r| r.penalty == 0.0));
    assert!(history.iter().all(|r| r.dispatch_counts.total() == 0));
    assert!(history.iter().all(|r| r.effective_target_kw == 0.0));
}

#[test]
fn empty_portfolio_runs_with_full_shortfall() {
    let config = common::quiet_config(6, vec![10.0; 6], vec![]);
    let mut sim = Simulation::new(common::scenario(config, vec![]), StrategyConfig::default());
    let history = common::run(&mut sim);
    for r in &history {
        assert_eq!(r.achieved_kw, 0.0);
        assert_eq!(r.shortfall_kw, 10.0);
        assert!(r.penalty.is_finite());
    }
}

#[test]
fn hvac_drops_after_crossing_comfort_bound() {
    // Tin 75 °F at 90 °F outdoors, shifted +2 °F: off at 75 → 76.5,
    // held off inside the deadband → 77.85, then on → 78.565 > 78.
    let config = common::quiet_config(6, vec![3.0; 6], vec![90.0; 6]);
    let mut strategy = common::strategy_with_dials(100.0);
    strategy.orderings = vec![der_dispatch_sim::dispatch::SelectionOrdering::Headroom];
    let mut sim = Simulation::new(
        common::scenario(config, vec![common::fast_hvac("h1", 75.0)]),
        strategy,
    );

    let t0 = sim.step().expect("tick 0").result;
    assert_eq!(t0.dispatch_counts.hvac, 1);
    assert_eq!(t0.dropped_count, 0);
    assert!((t0.achieved_kw - 3.0).abs() <= 3.0 * 0.02 + 1e-4);

    let t1 = sim.step().expect("tick 1").result;
    assert_eq!(t1.dropped_count, 0);
    assert_eq!(t1.continued_dispatches, 1);

    let t2 = sim.step().expect("tick 2").result;
    assert_eq!(t2.dropped_count, 1);
    assert_eq!(t2.achieved_kw, 0.0);

    // Trust: two clean ticks then a drop.
    let trust = sim.state().feedback.trust("h1");
    assert!((trust - (0.8 + 0.02 + 0.02 - 0.1)).abs() < 1e-5);

    let t3 = sim.step().expect("tick 3").result;
    assert_eq!(t3.dispatch_counts.total(), 0);
    assert_eq!(t3.achieved_kw, 0.0);
    assert_eq!(t3.shortfall_kw, 3.0);
}

#[test]
fn batteries_never_leave_their_soc_window() {
    let config = common::quiet_config(48, vec![20.0; 48], vec![]);
    let assets: Vec<_> = (0..4)
        .map(|i| common::battery(&format!("b{i}"), 0.9))
        .collect();
    let mut sim = Simulation::new(
        common::scenario(config, assets),
        common::strategy_with_dials(100.0),
    );
    common::run(&mut sim);
    for asset in &sim.state().assets {
        if let der_dispatch_sim::assets::Asset::Battery(b) = asset {
            assert!(b.state.soc >= 0.2 - 1e-5, "{} soc {}", b.id, b.state.soc);
            assert!(b.state.soc <= 1.0 + 1e-5);
            assert!(!b.state.common.dropped);
        }
    }
}

#[test]
fn illegal_transitions_are_reported() {
    let mut sim = common::baseline_simulation();
    assert!(matches!(
        sim.pause(),
        Err(SimError::InvalidTransition { action: "pause", status: RunStatus::NotStarted })
    ));
    sim.start().expect("start");
    assert!(matches!(
        sim.start(),
        Err(SimError::InvalidTransition { action: "start", .. })
    ));
    assert!(matches!(sim.step(), Err(SimError::InvalidTransition { .. })));
    sim.pause().expect("pause");
    assert_eq!(sim.status(), RunStatus::Paused);
}

#[test]
fn strategy_updates_apply_between_ticks() {
    let mut sim = common::baseline_simulation();
    sim.step().expect("tick 0");

    sim.update_risk_posture(RiskPosture::OpportunitySeeking);
    assert_eq!(sim.strategy().risk_posture, RiskPosture::OpportunitySeeking);

    let patch = StrategyPatch {
        framework: Some("stochastic".into()),
        subtype: Some("probabilistic_guarantee".into()),
        ..StrategyPatch::default()
    };
    sim.update_strategy_config(&patch).expect("valid patch");
    assert_eq!(sim.strategy().framework.name(), "stochastic");

    let bad = StrategyPatch {
        orderings: Some(vec![]),
        ..StrategyPatch::default()
    };
    assert!(matches!(sim.update_strategy_config(&bad), Err(SimError::Strategy(_))));
    assert_eq!(sim.strategy().framework.name(), "stochastic");

    sim.step().expect("tick 1 under the new strategy");
    assert_eq!(sim.state().history.len(), 2);
}

#[derive(Default)]
struct Recorder {
    ticks: AtomicUsize,
    completions: AtomicUsize,
}

impl SimulationObserver for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_tick(&self, snapshot: SimulationState) {
        assert_eq!(snapshot.history.len(), snapshot.tick);
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn on_complete(&self, snapshot: SimulationState) {
        assert_eq!(snapshot.status, RunStatus::Complete);
        self.completions.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn observers_see_every_tick_and_one_completion() {
    let recorder = Arc::new(Recorder::default());
    let mut sim = common::baseline_simulation();
    sim.add_observer(recorder.clone());
    common::run(&mut sim);
    assert!(sim.step().is_err());

    assert_eq!(recorder.ticks.load(Ordering::SeqCst), 72);
    assert_eq!(recorder.completions.load(Ordering::SeqCst), 1);
}

#[test]
fn shed_process_stays_off_for_the_whole_event() {
    let mut config = common::quiet_config(6, vec![80.0; 6], vec![]);
    config.start_time =
        DateTime::parse_from_rfc3339("2024-07-15T20:00:00-05:00").expect("valid timestamp");
    let building = Asset::CiBuilding(CiBuilding::new(
        "plant",
        CiParams {
            base_load_kw: 150.0,
            shed_max_kw: 40.0,
            fatigue_decay: 0.5,
            fatigue_gain: 0.05,
            fatigue_recovery: 0.1,
            process_kw: 30.0,
            max_process_toggles: 2,
            business_start_hour: 8,
            business_end_hour: 18,
        },
        0.0,
    ));
    let mut sim = Simulation::new(
        common::scenario(config, vec![building]),
        common::strategy_with_dials(100.0),
    );

    for tick in 0..6 {
        let r = sim.step().expect("tick applies").result;
        assert_eq!(r.dispatch_counts.ci_building, 1, "tick {tick}");
        let Asset::CiBuilding(b) = &sim.state().assets[0] else {
            panic!("portfolio changed kind");
        };
        assert!(!b.state.process_on, "process back on at tick {tick}");
        assert_eq!(b.state.toggles_used, 1, "tick {tick}");
        // held-off process plus a lightly fatigued shed
        assert!(r.achieved_kw > 60.0, "tick {tick}: {}", r.achieved_kw);
    }
}

#[test]
fn nearly_full_ev_still_delivers_its_reduction() {
    let config = common::quiet_config(1, vec![5.0], vec![]);
    let ev = Asset::Ev(Ev::new(
        "ev1",
        EvParams {
            t_arrive: 0,
            t_depart: 40,
            p_max_kw: 7.2,
            e_req_kwh: 12.0,
        },
        11.7,
        0.0,
    ));
    let mut sim = Simulation::new(
        common::scenario(config, vec![ev]),
        common::strategy_with_dials(100.0),
    );

    let r = sim.step().expect("tick applies").result;
    assert_eq!(r.dispatch_counts.ev, 1);
    // the whole 3.6 kW tapering charge is curtailed
    assert!((r.achieved_kw - 3.6).abs() <= 3.6 * 0.02 + 1e-3, "{}", r.achieved_kw);
}
