use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};
use super::schedule::RateSchedule;

pub const DEFAULT_TERMINAL_AGE: u32 = 85;

/// Upper bound on every age the engine accepts. Keeps period counts and
/// series allocations proportional to a human lifetime.
pub const MAX_AGE: u32 = 150;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub terminal_age: u32,
    pub initial_monthly_income: f64,
    pub income_growth_rate: f64,
    pub savings_rate: f64,
    pub inflation_rate: f64,
    pub expense_replacement_rate: f64,
}

impl SimulationInput {
    pub fn validate(&self) -> Result<()> {
        if self.current_age == 0 {
            return Err(EngineError::invalid("currentAge", "must be > 0"));
        }
        for (field, age) in [
            ("currentAge", self.current_age),
            ("retirementAge", self.retirement_age),
            ("terminalAge", self.terminal_age),
        ] {
            if age > MAX_AGE {
                return Err(EngineError::invalid(field, format!("must be <= {MAX_AGE}")));
            }
        }
        if self.retirement_age <= self.current_age {
            return Err(EngineError::invalid(
                "retirementAge",
                format!("must be > currentAge ({})", self.current_age),
            ));
        }
        for (name, value) in [
            ("initialMonthlyIncome", self.initial_monthly_income),
            ("incomeGrowthRate", self.income_growth_rate),
            ("savingsRate", self.savings_rate),
            ("inflationRate", self.inflation_rate),
            ("expenseReplacementRate", self.expense_replacement_rate),
        ] {
            if !value.is_finite() {
                return Err(EngineError::invalid(name, "must be a finite number"));
            }
        }
        Ok(())
    }

    pub fn accumulation_years(&self) -> u32 {
        self.retirement_age.saturating_sub(self.current_age)
    }

    pub fn decumulation_years(&self) -> u32 {
        self.terminal_age.saturating_sub(self.retirement_age)
    }

    /// Number of compounding periods between `currentAge` and `retirementAge`.
    pub fn accumulation_periods(&self, granularity: PeriodGranularity) -> Result<u32> {
        horizon_periods("retirementAge", self.accumulation_years(), granularity)
    }

    /// Number of compounding periods between `retirementAge` and `terminalAge`.
    pub fn decumulation_periods(&self, granularity: PeriodGranularity) -> Result<u32> {
        horizon_periods("terminalAge", self.decumulation_years(), granularity)
    }
}

fn horizon_periods(field: &'static str, years: u32, granularity: PeriodGranularity) -> Result<u32> {
    if years > MAX_AGE {
        return Err(EngineError::invalid(
            field,
            format!("horizon of {years} years exceeds {MAX_AGE}"),
        ));
    }
    years
        .checked_mul(granularity.periods_per_year())
        .ok_or_else(|| EngineError::invalid(field, "period count overflows"))
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodGranularity {
    #[default]
    Monthly,
    Annual,
}

impl PeriodGranularity {
    pub fn periods_per_year(self) -> u32 {
        match self {
            PeriodGranularity::Monthly => 12,
            PeriodGranularity::Annual => 1,
        }
    }

    /// Months of income covered by one period.
    pub fn months_per_period(self) -> f64 {
        12.0 / self.periods_per_year() as f64
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdealCurveMethod {
    #[default]
    #[serde(alias = "backwardRecursion", alias = "backward_recursion")]
    BackwardRecursion,
    #[serde(alias = "benchmarkMultiple", alias = "benchmark_multiple")]
    BenchmarkMultiple,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConstants {
    pub annuity_years: u32,
    pub shock_position: f64,
    pub equity_shock_drop: f64,
    pub ideal_pre_retirement: RateSchedule,
    pub ideal_post_retirement: RateSchedule,
    pub benchmark_knots: Vec<(u32, f64)>,
}

impl PolicyConstants {
    pub fn annuity_months(&self) -> f64 {
        (self.annuity_years.max(1) * 12) as f64
    }
}

impl Default for PolicyConstants {
    fn default() -> Self {
        Self {
            annuity_years: 20,
            shock_position: 0.65,
            equity_shock_drop: 0.30,
            ideal_pre_retirement: RateSchedule::Constant { rate: 0.04 },
            ideal_post_retirement: RateSchedule::Constant { rate: 0.03 },
            benchmark_knots: vec![
                (25, 0.2),
                (30, 0.4),
                (35, 1.1),
                (40, 2.0),
                (45, 3.0),
                (50, 4.3),
                (55, 5.6),
                (60, 7.1),
                (65, 8.9),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub granularity: PeriodGranularity,
    pub ideal_method: IdealCurveMethod,
    pub shock_enabled: bool,
    pub policy: PolicyConstants,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            granularity: PeriodGranularity::Monthly,
            ideal_method: IdealCurveMethod::BackwardRecursion,
            shock_enabled: true,
            policy: PolicyConstants::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationPoint {
    pub age: u32,
    pub nominal_balance: f64,
    pub real_balance: f64,
    pub implied_monthly_income: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecumulationPoint {
    pub age: u32,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub strategy_name: String,
    pub strategy_id: &'static str,
    pub accumulation_series: Vec<AccumulationPoint>,
    pub decumulation_series: Vec<DecumulationPoint>,
    pub final_balance_at_retirement: f64,
    pub monthly_retirement_income: f64,
    pub target_monthly_expense: f64,
    pub achievement_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdealPoint {
    pub age: u32,
    pub ideal_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdealCurve {
    pub method: IdealCurveMethod,
    pub required_balance_at_retirement: f64,
    pub pre_retirement_series: Vec<IdealPoint>,
    pub post_retirement_series: Vec<IdealPoint>,
}
