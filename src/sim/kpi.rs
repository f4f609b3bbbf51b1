//! Post-hoc KPI computation from simulation results.

use std::fmt;

use super::types::{DispatchCounts, TimestepResult};
use crate::assets::TICK_HOURS;

/// Aggregate key performance indicators derived from a run's history.
///
/// Computed post-hoc from the `TimestepResult` history so the report can
/// never disagree with the per-tick records.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiReport {
    pub ticks: usize,
    /// Sum of per-tick penalties.
    pub total_penalty: f32,
    /// Mean penalty over ticks with a positive target.
    pub mean_event_penalty: f32,
    /// Root-mean-square of `target - achieved` over event ticks (kW).
    pub rmse_tracking_kw: f32,
    /// Mean absolute tracking error over event ticks (kW).
    pub mae_tracking_kw: f32,
    /// Delivered energy over requested energy during the event (%).
    pub delivery_pct: f32,
    /// Requested load-reduction energy (kWh).
    pub requested_kwh: f32,
    /// Delivered load-reduction energy during event ticks (kWh).
    pub delivered_kwh: f32,
    /// Largest single-tick shortfall (kW).
    pub peak_shortfall_kw: f32,
    /// Assets dropped at the end of the run.
    pub final_dropped: usize,
    /// Asset-ticks of dispatch per type, summed over the run.
    pub dispatches: DispatchCounts,
    /// Dispatches that started a new participation.
    pub new_dispatches: usize,
}

impl KpiReport {
    /// Computes all KPIs from the complete history.
    pub fn from_results(results: &[TimestepResult]) -> Self {
        let mut dispatches = DispatchCounts::default();
        let mut new_dispatches = 0_usize;
        let mut total_penalty = 0.0_f32;
        let mut event_ticks = 0_usize;
        let mut sq_sum = 0.0_f32;
        let mut abs_sum = 0.0_f32;
        let mut requested = 0.0_f32;
        let mut delivered = 0.0_f32;
        let mut peak_shortfall = 0.0_f32;

        for r in results {
            total_penalty += r.penalty;
            peak_shortfall = peak_shortfall.max(r.shortfall_kw);
            new_dispatches += r.new_dispatches;
            dispatches.hvac += r.dispatch_counts.hvac;
            dispatches.battery += r.dispatch_counts.battery;
            dispatches.ev += r.dispatch_counts.ev;
            dispatches.fleet_site += r.dispatch_counts.fleet_site;
            dispatches.ci_building += r.dispatch_counts.ci_building;

            if r.target_kw > 0.0 {
                event_ticks += 1;
                let err = r.target_kw - r.achieved_kw;
                sq_sum += err * err;
                abs_sum += err.abs();
                requested += r.target_kw * TICK_HOURS;
                delivered += r.achieved_kw * TICK_HOURS;
            }
        }

        let (rmse, mae, mean_penalty) = if event_ticks > 0 {
            let n = event_ticks as f32;
            let event_penalty: f32 = results
                .iter()
                .filter(|r| r.target_kw > 0.0)
                .map(|r| r.penalty)
                .sum();
            ((sq_sum / n).sqrt(), abs_sum / n, event_penalty / n)
        } else {
            (0.0, 0.0, 0.0)
        };

        let delivery_pct = if requested > 0.0 {
            100.0 * delivered / requested
        } else {
            0.0
        };

        Self {
            ticks: results.len(),
            total_penalty,
            mean_event_penalty: mean_penalty,
            rmse_tracking_kw: rmse,
            mae_tracking_kw: mae,
            delivery_pct,
            requested_kwh: requested,
            delivered_kwh: delivered,
            peak_shortfall_kw: peak_shortfall,
            final_dropped: results.last().map_or(0, |r| r.dropped_count),
            dispatches,
            new_dispatches,
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Ticks:                 {}", self.ticks)?;
        writeln!(f, "Total penalty:         {:.4}", self.total_penalty)?;
        writeln!(f, "Mean event penalty:    {:.4}", self.mean_event_penalty)?;
        writeln!(f, "RMSE tracking error:   {:.3} kW", self.rmse_tracking_kw)?;
        writeln!(f, "MAE tracking error:    {:.3} kW", self.mae_tracking_kw)?;
        writeln!(
            f,
            "Delivery:              {:.1}% ({:.2} of {:.2} kWh)",
            self.delivery_pct, self.delivered_kwh, self.requested_kwh
        )?;
        writeln!(f, "Peak shortfall:        {:.2} kW", self.peak_shortfall_kw)?;
        writeln!(f, "Dropped assets:        {}", self.final_dropped)?;
        write!(
            f,
            "Dispatches:            hvac={} battery={} ev={} fleet_site={} ci_building={} (new {})",
            self.dispatches.hvac,
            self.dispatches.battery,
            self.dispatches.ev,
            self.dispatches.fleet_site,
            self.dispatches.ci_building,
            self.new_dispatches
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(target_kw: f32, achieved_kw: f32, penalty: f32) -> TimestepResult {
        TimestepResult {
            tick: 0,
            timestamp: String::new(),
            outdoor_temp_f: 90.0,
            target_kw,
            effective_target_kw: target_kw,
            achieved_kw,
            shortfall_kw: (target_kw - achieved_kw).max(0.0),
            penalty,
            dropped_count: 0,
            dispatch_counts: DispatchCounts::default(),
            new_dispatches: 0,
            continued_dispatches: 0,
        }
    }

    #[test]
    fn rmse_over_event_ticks_only() {
        // errors: [1.0, -1.0, 2.0, -2.0] plus a zero-target tick
        // sq_sum = 10, mean = 2.5, sqrt = ~1.581
        let mut results: Vec<TimestepResult> = [1.0, -1.0, 2.0, -2.0]
            .iter()
            .map(|&e| make_result(10.0, 10.0 - e, 0.0))
            .collect();
        results.push(make_result(0.0, 7.0, 0.0));
        let kpi = KpiReport::from_results(&results);
        assert!((kpi.rmse_tracking_kw - 2.5_f32.sqrt()).abs() < 1e-4);
        assert!((kpi.mae_tracking_kw - 1.5).abs() < 1e-4);
        assert_eq!(kpi.ticks, 5);
    }

    #[test]
    fn delivery_and_shortfall() {
        let results = vec![make_result(12.0, 6.0, 0.25), make_result(12.0, 12.0, 0.0)];
        let kpi = KpiReport::from_results(&results);
        assert!((kpi.delivery_pct - 75.0).abs() < 1e-3);
        assert_eq!(kpi.peak_shortfall_kw, 6.0);
        assert!((kpi.total_penalty - 0.25).abs() < 1e-6);
        assert!((kpi.mean_event_penalty - 0.125).abs() < 1e-6);
    }

    #[test]
    fn dispatches_are_summed() {
        let mut a = make_result(5.0, 5.0, 0.0);
        a.dispatch_counts.battery = 2;
        a.new_dispatches = 2;
        let mut b = a.clone();
        b.dispatch_counts.hvac = 3;
        b.new_dispatches = 3;
        b.dropped_count = 1;
        let kpi = KpiReport::from_results(&[a, b]);
        assert_eq!(kpi.dispatches.battery, 4);
        assert_eq!(kpi.dispatches.hvac, 3);
        assert_eq!(kpi.new_dispatches, 5);
        assert_eq!(kpi.final_dropped, 1);
    }

    #[test]
    fn empty_results() {
        let kpi = KpiReport::from_results(&[]);
        assert_eq!(kpi.rmse_tracking_kw, 0.0);
        assert_eq!(kpi.delivery_pct, 0.0);
        assert_eq!(kpi.final_dropped, 0);
    }
}
