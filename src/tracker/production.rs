//! Hourly production target carry-over.
//!
//! Each hour's target is the base hourly rate plus whatever earlier hours of
//! the same header and production user left unmet. Over-production in an
//! earlier hour reduces the later targets by the same amount.

use super::models::{HeaderFigures, HourlyProduction};

pub const MINUTES_PER_HOUR: f64 = 60.0;

/// Base target per hour at plan efficiency.
///
/// Prefers `today_target / working_hour`; falls back to the capacity formula
/// `manpower × 60 × plan_efficiency% / smv` when the first is zero.
pub fn base_target_per_hour(header: &HeaderFigures) -> f64 {
    let from_today_target = if header.working_hour > 0.0 {
        header.today_target / header.working_hour
    } else {
        0.0
    };

    let from_capacity = if header.manpower_present > 0.0 && header.smv > 0.0 {
        header.manpower_present * MINUTES_PER_HOUR * (header.plan_efficiency / 100.0) / header.smv
    } else {
        0.0
    };

    if from_today_target != 0.0 {
        from_today_target
    } else {
        from_capacity
    }
}

/// Unmet quantity accumulated over the hours before `hour`.
pub fn carried_shortfall(previous: &[HourlyProduction], hour: i64) -> f64 {
    let mut earlier: Vec<&HourlyProduction> = previous.iter().filter(|r| r.hour < hour).collect();
    earlier.sort_by_key(|r| r.hour);
    earlier
        .iter()
        .map(|r| r.dynamic_target - r.achieved_qty)
        .sum()
}

/// Hourly efficiency percent: `achieved × smv × 100 / (manpower × 60)`.
pub fn hourly_efficiency(achieved: f64, manpower: f64, smv: f64) -> f64 {
    if manpower > 0.0 && smv > 0.0 {
        achieved * smv * 100.0 / (manpower * MINUTES_PER_HOUR)
    } else {
        0.0
    }
}

/// Achieve efficiency: `achieved × smv × hour / (manpower × 60)`.
pub fn achieve_efficiency(achieved: f64, manpower: f64, smv: f64, hour: i64) -> f64 {
    if manpower > 0.0 && smv > 0.0 && hour > 0 {
        achieved * smv * hour as f64 / (manpower * MINUTES_PER_HOUR)
    } else {
        0.0
    }
}

/// Computed columns of one hourly production row.
#[derive(Debug, Clone, PartialEq)]
pub struct HourFigures {
    pub base_target_per_hour: f64,
    pub dynamic_target: f64,
    pub variance_qty: f64,
    pub hourly_efficiency: f64,
    pub achieve_efficiency: f64,
    pub total_efficiency: f64,
}

/// Compute the figures for `hour` given the rows already saved for the same
/// header and production user. Rows at or after `hour` are ignored.
pub fn compute_hour(
    header: &HeaderFigures,
    previous: &[HourlyProduction],
    hour: i64,
    achieved: f64,
) -> HourFigures {
    let base = base_target_per_hour(header);
    let dynamic_target = base + carried_shortfall(previous, hour);
    let achieve = achieve_efficiency(achieved, header.manpower_present, header.smv, hour);

    HourFigures {
        base_target_per_hour: base,
        dynamic_target,
        variance_qty: dynamic_target - achieved,
        hourly_efficiency: hourly_efficiency(achieved, header.manpower_present, header.smv),
        achieve_efficiency: achieve,
        total_efficiency: achieve,
    }
}
