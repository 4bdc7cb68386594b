use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::{IdealCurve, SimulationResult};

pub const IDEAL_SERIES_KEY: &str = "ideal";

/// One chart row per age. Series without a point at this age are left out of
/// `values` rather than reported as zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRow {
    pub age: u32,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

pub fn merge_series<'a, I, P>(series: I) -> Vec<ChartRow>
where
    I: IntoIterator<Item = (&'a str, P)>,
    P: IntoIterator<Item = (u32, f64)>,
{
    let mut by_age: BTreeMap<u32, BTreeMap<String, f64>> = BTreeMap::new();
    for (key, points) in series {
        for (age, value) in points {
            by_age.entry(age).or_default().insert(key.to_string(), value);
        }
    }
    by_age
        .into_iter()
        .map(|(age, values)| ChartRow { age, values })
        .collect()
}

pub fn accumulation_rows(results: &[SimulationResult], ideal: &IdealCurve) -> Vec<ChartRow> {
    let strategies = results.iter().map(|r| {
        (
            r.strategy_name.as_str(),
            r.accumulation_series
                .iter()
                .map(|p| (p.age, p.nominal_balance))
                .collect::<Vec<_>>(),
        )
    });
    let ideal = std::iter::once((
        IDEAL_SERIES_KEY,
        ideal
            .pre_retirement_series
            .iter()
            .map(|p| (p.age, p.ideal_balance))
            .collect::<Vec<_>>(),
    ));
    merge_series(strategies.chain(ideal))
}

pub fn decumulation_rows(results: &[SimulationResult], ideal: &IdealCurve) -> Vec<ChartRow> {
    let strategies = results.iter().map(|r| {
        (
            r.strategy_name.as_str(),
            r.decumulation_series
                .iter()
                .map(|p| (p.age, p.balance))
                .collect::<Vec<_>>(),
        )
    });
    let ideal = std::iter::once((
        IDEAL_SERIES_KEY,
        ideal
            .post_retirement_series
            .iter()
            .map(|p| (p.age, p.ideal_balance))
            .collect::<Vec<_>>(),
    ));
    merge_series(strategies.chain(ideal))
}
