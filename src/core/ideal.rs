use super::error::{EngineError, Result};
use super::schedule::{RateSchedule, ScheduleContext};
use super::types::{EngineConfig, IdealCurve, IdealCurveMethod, IdealPoint, MAX_AGE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealCurveRequest {
    pub current_age: u32,
    pub retirement_age: u32,
    pub terminal_age: u32,
    pub target_monthly_expense: f64,
    pub annual_income: f64,
}

impl IdealCurveRequest {
    pub fn new(
        current_age: u32,
        retirement_age: u32,
        terminal_age: u32,
        target_monthly_expense: f64,
        annual_income: f64,
    ) -> Result<Self> {
        if current_age == 0 {
            return Err(EngineError::invalid("currentAge", "must be > 0"));
        }
        for (field, age) in [
            ("currentAge", current_age),
            ("retirementAge", retirement_age),
            ("terminalAge", terminal_age),
        ] {
            if age > MAX_AGE {
                return Err(EngineError::invalid(field, format!("must be <= {MAX_AGE}")));
            }
        }
        if retirement_age <= current_age {
            return Err(EngineError::invalid(
                "retirementAge",
                format!("must be > currentAge ({current_age})"),
            ));
        }
        if !target_monthly_expense.is_finite() || target_monthly_expense < 0.0 {
            return Err(EngineError::invalid(
                "targetMonthlyExpense",
                "must be a finite number >= 0",
            ));
        }
        if !annual_income.is_finite() {
            return Err(EngineError::invalid("annualIncome", "must be a finite number"));
        }
        Ok(Self {
            current_age,
            retirement_age,
            terminal_age,
            target_monthly_expense,
            annual_income,
        })
    }

    fn annual_need(&self) -> f64 {
        self.target_monthly_expense * 12.0
    }

    fn rate_at(&self, schedule: &RateSchedule, age: u32) -> f64 {
        schedule.annual_rate(ScheduleContext {
            period: age.saturating_sub(self.current_age),
            total_periods: self.terminal_age.saturating_sub(self.current_age),
            age: age as f64,
        })
    }
}

pub fn solve(request: &IdealCurveRequest, config: &EngineConfig) -> IdealCurve {
    let policy = &config.policy;
    match config.ideal_method {
        IdealCurveMethod::BackwardRecursion => backward_recursion(
            request,
            &policy.ideal_pre_retirement,
            &policy.ideal_post_retirement,
        ),
        IdealCurveMethod::BenchmarkMultiple => {
            benchmark_curve(request, &policy.benchmark_knots, &policy.ideal_post_retirement)
        }
    }
}

/// Balance needed at retirement to fund `target * 12` a year until the
/// terminal age, discounted back through the pre-retirement years.
///
/// Each half of the curve is solved under its own schedule: the
/// pre-retirement series discounts a required balance computed with
/// `pre_retirement`, and the post-retirement series draws down a required
/// balance computed with `post_retirement`. The reported
/// `required_balance_at_retirement` is the pre-retirement one, the value the
/// accumulation curve climbs towards.
pub fn backward_recursion(
    request: &IdealCurveRequest,
    pre_retirement: &RateSchedule,
    post_retirement: &RateSchedule,
) -> IdealCurve {
    let required = required_at_retirement(request, pre_retirement);
    let post_required = required_at_retirement(request, post_retirement);

    let mut pre_retirement_series = Vec::with_capacity(
        request
            .retirement_age
            .saturating_sub(request.current_age + 1) as usize,
    );
    let mut val = required;
    for age in (request.current_age + 1..request.retirement_age).rev() {
        val /= 1.0 + request.rate_at(pre_retirement, age);
        pre_retirement_series.push(IdealPoint {
            age,
            ideal_balance: val,
        });
    }
    pre_retirement_series.reverse();

    IdealCurve {
        method: IdealCurveMethod::BackwardRecursion,
        required_balance_at_retirement: required,
        pre_retirement_series,
        post_retirement_series: project_post_retirement(request, post_required, post_retirement),
    }
}

pub fn required_at_retirement(request: &IdealCurveRequest, schedule: &RateSchedule) -> f64 {
    let annual_need = request.annual_need();
    (request.retirement_age..request.terminal_age)
        .rev()
        .fold(0.0, |future_need, age| {
            (future_need + annual_need) / (1.0 + request.rate_at(schedule, age))
        })
}

pub fn benchmark_curve(
    request: &IdealCurveRequest,
    knots: &[(u32, f64)],
    post_retirement: &RateSchedule,
) -> IdealCurve {
    let pre_retirement_series = (request.current_age..=request.retirement_age)
        .map(|age| IdealPoint {
            age,
            ideal_balance: benchmark_multiple(knots, age as f64) * request.annual_income,
        })
        .collect::<Vec<_>>();
    let required = pre_retirement_series
        .last()
        .map(|point| point.ideal_balance)
        .unwrap_or(0.0);

    IdealCurve {
        method: IdealCurveMethod::BenchmarkMultiple,
        required_balance_at_retirement: required,
        pre_retirement_series,
        post_retirement_series: project_post_retirement(request, required, post_retirement),
    }
}

/// Target savings as a multiple of annual income, linearly interpolated
/// between knots and clamped to the end knots outside their range.
pub fn benchmark_multiple(knots: &[(u32, f64)], age: f64) -> f64 {
    let (Some(&(first_age, first)), Some(&(last_age, last))) = (knots.first(), knots.last())
    else {
        return 0.0;
    };
    if age <= first_age as f64 {
        return first;
    }
    if age >= last_age as f64 {
        return last;
    }

    for pair in knots.windows(2) {
        let (lo_age, lo) = pair[0];
        let (hi_age, hi) = pair[1];
        let (lo_age, hi_age) = (lo_age as f64, hi_age as f64);
        if age == lo_age {
            return lo;
        }
        if age > lo_age && age < hi_age {
            return lo + (hi - lo) * (age - lo_age) / (hi_age - lo_age);
        }
    }
    last
}

fn project_post_retirement(
    request: &IdealCurveRequest,
    required: f64,
    schedule: &RateSchedule,
) -> Vec<IdealPoint> {
    let annual_need = request.annual_need();
    let mut balance = required;
    (request.retirement_age..=request.terminal_age)
        .map(|age| {
            balance = balance * (1.0 + request.rate_at(schedule, age)) - annual_need;
            IdealPoint {
                age,
                ideal_balance: balance.max(0.0),
            }
        })
        .collect()
}
