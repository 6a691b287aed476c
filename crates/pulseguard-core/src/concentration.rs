//! Blood-concentration decay model.
//!
//! Each dose contributes `100 * 0.5^((t - dose_time) / half_life)` percent
//! from the moment it is taken; contributions accumulate across every dose at
//! or before `t`. The curve is clamped to `[0, 120]` for display only.
//!
//! Everything here is a pure function of its inputs. A half-life or frequency
//! outside `(0, MAX_SCHEDULE_HOURS]` fails with `InvalidScheduleConfig`; the
//! half-life default is applied at intake, not here.

use chrono::{DateTime, Duration, Utc};

use pulseguard_contracts::{
    error::{PulseGuardError, PulseGuardResult},
    medication::{after_hours, hours, MAX_SCHEDULE_HOURS},
};

/// Concentration contributed by a single dose at the instant it is taken.
pub const DOSE_PEAK_PERCENT: f64 = 100.0;

/// Upper display bound for accumulated concentration.
pub const DISPLAY_CEILING_PERCENT: f64 = 120.0;

/// Default sample spacing for `curve`.
pub const DEFAULT_STEP_HOURS: f64 = 1.0;

/// The inputs the decay model needs for one medication.
#[derive(Debug, Clone, PartialEq)]
pub struct DosingSchedule {
    pub half_life_hours: f64,
    pub frequency_hours: f64,
    /// Doses already taken, in any order.
    pub taken_doses: Vec<DateTime<Utc>>,
    /// First projected dose. Further doses follow every `frequency_hours`.
    /// `None` projects nothing (e.g. a deactivated medication).
    pub next_dose_time: Option<DateTime<Utc>>,
}

/// One sample of the curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationPoint {
    /// Hours since the curve's `from` instant.
    pub elapsed_hours: f64,
    /// Accumulated concentration, clamped to `[0, DISPLAY_CEILING_PERCENT]`.
    pub concentration_percent: f64,
}

/// Reject half-life / frequency values that are not a positive number of
/// milliseconds up to `MAX_SCHEDULE_HOURS`.
pub fn validate_schedule(half_life_hours: f64, frequency_hours: f64) -> PulseGuardResult<()> {
    check_hours("half_life_hours", half_life_hours)?;
    check_hours("frequency_hours", frequency_hours)
}

fn check_hours(field: &str, value: f64) -> PulseGuardResult<()> {
    if !value.is_finite() || hours(value) <= Duration::zero() {
        return Err(PulseGuardError::InvalidScheduleConfig {
            reason: format!("{field} must be positive, got {value}"),
        });
    }
    if value > MAX_SCHEDULE_HOURS {
        return Err(PulseGuardError::InvalidScheduleConfig {
            reason: format!("{field} must be at most {MAX_SCHEDULE_HOURS}, got {value}"),
        });
    }
    Ok(())
}

/// `last_dose_time + frequency_hours`, or `anchor` when nothing was logged.
///
/// Independent of the time of the call.
pub fn next_dose_time(
    last_dose_time: Option<DateTime<Utc>>,
    anchor: DateTime<Utc>,
    frequency_hours: f64,
) -> PulseGuardResult<DateTime<Utc>> {
    check_hours("frequency_hours", frequency_hours)?;
    match last_dose_time {
        Some(last) => after_hours(last, frequency_hours),
        None => Ok(anchor),
    }
}

/// Every dose time (taken and projected) at or before `until`.
///
/// Projection stops after `(until - first) / frequency + 1` doses.
fn dose_times_until(schedule: &DosingSchedule, until: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut doses: Vec<DateTime<Utc>> =
        schedule.taken_doses.iter().copied().filter(|t| *t <= until).collect();

    let step = hours(schedule.frequency_hours);
    let Some(first) = schedule.next_dose_time else {
        return doses;
    };
    if first > until || step <= Duration::zero() {
        return doses;
    }
    let limit = (until - first).num_milliseconds() / step.num_milliseconds() + 1;
    let mut projected = Some(first);
    for _ in 0..limit {
        match projected {
            Some(t) if t <= until => {
                doses.push(t);
                projected = t.checked_add_signed(step);
            }
            _ => break,
        }
    }
    doses
}

/// Unclamped accumulated concentration at instant `t`.
pub fn concentration_at(schedule: &DosingSchedule, t: DateTime<Utc>) -> PulseGuardResult<f64> {
    validate_schedule(schedule.half_life_hours, schedule.frequency_hours)?;
    Ok(accumulate(&dose_times_until(schedule, t), schedule.half_life_hours, t))
}

fn accumulate(doses: &[DateTime<Utc>], half_life_hours: f64, t: DateTime<Utc>) -> f64 {
    doses
        .iter()
        .filter(|d| **d <= t)
        .map(|d| {
            let elapsed = (t - *d).num_milliseconds() as f64 / 3_600_000.0;
            DOSE_PEAK_PERCENT * 0.5_f64.powf(elapsed / half_life_hours)
        })
        .sum()
}

/// Sample the curve hourly from `from` over `horizon_hours`.
pub fn curve(
    schedule: &DosingSchedule,
    from: DateTime<Utc>,
    horizon_hours: f64,
) -> PulseGuardResult<Vec<ConcentrationPoint>> {
    curve_with_step(schedule, from, horizon_hours, DEFAULT_STEP_HOURS)
}

/// Sample the curve every `step_hours` from `from` over `horizon_hours`.
///
/// Samples are taken at `0, step, 2*step, …` and always include the horizon
/// itself as the final point.
pub fn curve_with_step(
    schedule: &DosingSchedule,
    from: DateTime<Utc>,
    horizon_hours: f64,
    step_hours: f64,
) -> PulseGuardResult<Vec<ConcentrationPoint>> {
    validate_schedule(schedule.half_life_hours, schedule.frequency_hours)?;
    if !horizon_hours.is_finite() || horizon_hours < 0.0 {
        return Err(PulseGuardError::InvalidScheduleConfig {
            reason: format!("horizon_hours must be non-negative, got {horizon_hours}"),
        });
    }
    if !step_hours.is_finite() || step_hours <= 0.0 {
        return Err(PulseGuardError::InvalidScheduleConfig {
            reason: format!("step_hours must be positive, got {step_hours}"),
        });
    }

    let until = after_hours(from, horizon_hours)?;
    let doses = dose_times_until(schedule, until);

    let samples = (horizon_hours / step_hours).floor() as usize;
    let mut offsets: Vec<f64> = (0..=samples).map(|i| i as f64 * step_hours).collect();
    if offsets.last().map_or(true, |last| (horizon_hours - last).abs() > 1e-9) {
        offsets.push(horizon_hours);
    }

    Ok(offsets
        .into_iter()
        .map(|elapsed_hours| {
            let at = from.checked_add_signed(hours(elapsed_hours)).unwrap_or(until);
            let raw = accumulate(&doses, schedule.half_life_hours, at);
            ConcentrationPoint {
                elapsed_hours,
                concentration_percent: raw.clamp(0.0, DISPLAY_CEILING_PERCENT),
            }
        })
        .collect())
}
