mod catalog;
mod engine;
mod error;
mod ideal;
mod schedule;
mod types;

pub use catalog::{Strategy, StrategyCatalog, StrategyKind};
pub use engine::{
    AccumulationOutcome, MAX_ACHIEVEMENT_PERCENT, SimulationRun, accumulate, achievement_percent,
    decumulate, run_simulation, simulate_strategy,
};
pub use error::EngineError;
pub use ideal::{
    IdealCurveRequest, backward_recursion, benchmark_curve, benchmark_multiple,
    required_at_retirement, solve as solve_ideal_curve,
};
pub use schedule::{RateSchedule, ScheduleContext, periodic_rate, shock_period};
pub use types::{
    AccumulationPoint, DEFAULT_TERMINAL_AGE, DecumulationPoint, EngineConfig, IdealCurve,
    IdealCurveMethod, IdealPoint, MAX_AGE, PeriodGranularity, PolicyConstants,
    SimulationInput, SimulationResult,
};
