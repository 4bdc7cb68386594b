#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::catalog::{Strategy, StrategyCatalog};
use super::error::{EngineError, Result};
use super::ideal::{self, IdealCurveRequest};
use super::schedule::{RateSchedule, ScheduleContext, periodic_rate};
use super::types::{
    AccumulationPoint, DecumulationPoint, EngineConfig, IdealCurve, PeriodGranularity,
    PolicyConstants, SimulationInput, SimulationResult,
};

pub const MAX_ACHIEVEMENT_PERCENT: f64 = 999.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AccumulationOutcome {
    pub series: Vec<AccumulationPoint>,
    pub final_balance: f64,
    pub periods: u32,
    pub last_period_monthly_income: f64,
}

/// One engine invocation: the validated input, the configuration it ran with,
/// and one result per catalog strategy in declaration order.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub input: SimulationInput,
    pub config: EngineConfig,
    pub results: Vec<SimulationResult>,
}

impl SimulationRun {
    pub fn result(&self, key: &str) -> Option<&SimulationResult> {
        self.results
            .iter()
            .find(|r| r.strategy_id == key || r.strategy_name == key)
    }

    pub fn target_monthly_expense(&self) -> f64 {
        self.results
            .first()
            .map(|r| r.target_monthly_expense)
            .unwrap_or(0.0)
    }

    pub fn ideal_curve(&self) -> Result<IdealCurve> {
        self.ideal_curve_for(self.target_monthly_expense())
    }

    pub fn ideal_curve_for(&self, target_monthly_expense: f64) -> Result<IdealCurve> {
        let request = IdealCurveRequest::new(
            self.input.current_age,
            self.input.retirement_age,
            self.input.terminal_age,
            target_monthly_expense,
            self.input.initial_monthly_income * 12.0,
        )?;
        Ok(ideal::solve(&request, &self.config))
    }
}

pub fn run_simulation(input: &SimulationInput, config: &EngineConfig) -> Result<SimulationRun> {
    input.validate()?;

    let periods = input.accumulation_periods(config.granularity)?;
    let strategies = StrategyCatalog::instantiate(periods, config);

    #[cfg(feature = "parallel")]
    let results = strategies
        .par_iter()
        .map(|strategy| simulate_strategy(input, strategy, config))
        .collect::<Result<Vec<SimulationResult>>>()?;

    #[cfg(not(feature = "parallel"))]
    let results = strategies
        .iter()
        .map(|strategy| simulate_strategy(input, strategy, config))
        .collect::<Result<Vec<SimulationResult>>>()?;

    Ok(SimulationRun {
        input: input.clone(),
        config: config.clone(),
        results,
    })
}

pub fn simulate_strategy(
    input: &SimulationInput,
    strategy: &Strategy,
    config: &EngineConfig,
) -> Result<SimulationResult> {
    let accumulation = accumulate(
        input,
        &strategy.accumulation,
        config.granularity,
        &config.policy,
    )?;
    let monthly_retirement_income = accumulation.final_balance / config.policy.annuity_months();
    let target_monthly_expense =
        accumulation.last_period_monthly_income * input.expense_replacement_rate;
    let decumulation_series = decumulate(
        input,
        accumulation.final_balance,
        monthly_retirement_income,
        &strategy.decumulation,
        config.granularity,
        accumulation.periods,
    )?;
    let achievement_percent = achievement_percent(monthly_retirement_income, target_monthly_expense);

    tracing::debug!(
        strategy = strategy.kind.id(),
        final_balance = accumulation.final_balance,
        achievement_percent,
        depleted_at = ?decumulation_series
            .last()
            .filter(|p| p.age < input.terminal_age)
            .map(|p| p.age),
        "strategy simulated"
    );

    Ok(SimulationResult {
        strategy_name: strategy.name.clone(),
        strategy_id: strategy.kind.id(),
        accumulation_series: accumulation.series,
        decumulation_series,
        final_balance_at_retirement: accumulation.final_balance,
        monthly_retirement_income,
        target_monthly_expense,
        achievement_percent,
    })
}

pub fn accumulate(
    input: &SimulationInput,
    schedule: &RateSchedule,
    granularity: PeriodGranularity,
    policy: &PolicyConstants,
) -> Result<AccumulationOutcome> {
    let per_year = granularity.periods_per_year();
    let periods = input.accumulation_periods(granularity)?;
    let months_per_period = granularity.months_per_period();
    let income_growth = periodic_rate(input.income_growth_rate, per_year);
    let inflation = periodic_rate(input.inflation_rate, per_year);
    let annuity_months = policy.annuity_months();

    let mut balance = 0.0;
    let mut monthly_income = input.initial_monthly_income;
    let mut last_period_monthly_income = monthly_income;
    let mut inflation_index = 1.0;
    let mut series = Vec::with_capacity(input.accumulation_years() as usize);

    for period in 0..periods {
        balance += monthly_income * months_per_period * input.savings_rate;
        let ctx = ScheduleContext {
            period,
            total_periods: periods,
            age: input.current_age as f64 + period as f64 / per_year as f64,
        };
        balance *= 1.0 + schedule.periodic_rate(ctx, per_year);
        inflation_index *= 1.0 + inflation;

        if (period + 1) % per_year == 0 {
            series.push(AccumulationPoint {
                age: input.current_age + (period + 1) / per_year,
                nominal_balance: balance,
                real_balance: balance / inflation_index,
                implied_monthly_income: balance / annuity_months,
            });
        }

        last_period_monthly_income = monthly_income;
        monthly_income *= 1.0 + income_growth;
    }

    Ok(AccumulationOutcome {
        series,
        final_balance: balance,
        periods,
        last_period_monthly_income,
    })
}

/// Draws `monthly_income` from the retirement balance until the terminal age,
/// stopping at the first period that leaves nothing behind.
pub fn decumulate(
    input: &SimulationInput,
    starting_balance: f64,
    monthly_income: f64,
    schedule: &RateSchedule,
    granularity: PeriodGranularity,
    accumulation_periods: u32,
) -> Result<Vec<DecumulationPoint>> {
    if input.retirement_age > input.terminal_age {
        return Ok(Vec::new());
    }

    let per_year = granularity.periods_per_year();
    let periods = input.decumulation_periods(granularity)?;
    let total_periods = accumulation_periods
        .checked_add(periods)
        .ok_or_else(|| EngineError::invalid("terminalAge", "period count overflows"))?;
    let withdrawal = monthly_income * granularity.months_per_period();

    let mut series = Vec::with_capacity(input.decumulation_years() as usize + 1);
    let mut balance = starting_balance;
    series.push(DecumulationPoint {
        age: input.retirement_age,
        balance: balance.max(0.0),
    });
    if balance <= 0.0 {
        return Ok(series);
    }

    for period in 0..periods {
        let ctx = ScheduleContext {
            period: accumulation_periods + period,
            total_periods,
            age: input.retirement_age as f64 + period as f64 / per_year as f64,
        };
        balance *= 1.0 + schedule.periodic_rate(ctx, per_year);
        balance -= withdrawal;

        if (period + 1) % per_year == 0 {
            series.push(DecumulationPoint {
                age: input.retirement_age + (period + 1) / per_year,
                balance: balance.max(0.0),
            });
        }
        if balance <= 0.0 {
            break;
        }
    }

    Ok(series)
}

pub fn achievement_percent(monthly_retirement_income: f64, target_monthly_expense: f64) -> f64 {
    if target_monthly_expense <= 0.0 || !target_monthly_expense.is_finite() {
        return MAX_ACHIEVEMENT_PERCENT;
    }
    let percent = (monthly_retirement_income / target_monthly_expense * 100.0)
        .clamp(0.0, MAX_ACHIEVEMENT_PERCENT);
    if percent.is_nan() {
        return 0.0;
    }
    (percent * 10.0).round() / 10.0
}
