use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleContext {
    pub period: u32,
    pub total_periods: u32,
    pub age: f64,
}

/// Annual return assumption as a function of the period being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RateSchedule {
    Constant {
        rate: f64,
    },
    Glide {
        start: f64,
        end: f64,
    },
    #[serde(rename_all = "camelCase")]
    Shock {
        baseline: f64,
        drop_fraction: f64,
        shock_period: u32,
        compounding_periods: u32,
    },
}

impl RateSchedule {
    pub fn annual_rate(&self, ctx: ScheduleContext) -> f64 {
        match *self {
            RateSchedule::Constant { rate } => rate,
            RateSchedule::Glide { start, end } => {
                if ctx.period == 0 {
                    return start;
                }
                let last = ctx.total_periods.saturating_sub(1).max(1);
                if ctx.period == last {
                    return end;
                }
                start + (end - start) * (ctx.period as f64 / last as f64)
            }
            RateSchedule::Shock {
                baseline,
                drop_fraction,
                shock_period,
                compounding_periods,
            } => {
                if ctx.period == shock_period {
                    (1.0 - drop_fraction).powi(compounding_periods as i32) - 1.0
                } else {
                    baseline
                }
            }
        }
    }

    pub fn periodic_rate(&self, ctx: ScheduleContext, periods_per_year: u32) -> f64 {
        periodic_rate(self.annual_rate(ctx), periods_per_year)
    }
}

/// Equivalent per-period rate of an annual rate, `(1 + r)^(1/p) - 1`.
pub fn periodic_rate(annual_rate: f64, periods_per_year: u32) -> f64 {
    if periods_per_year <= 1 {
        return annual_rate;
    }
    (1.0 + annual_rate).powf(1.0 / periods_per_year as f64) - 1.0
}

pub fn shock_period(total_periods: u32, shock_position: f64) -> u32 {
    ((total_periods as f64 * shock_position).floor() as u32).max(1)
}
