use serde::Serialize;

use super::schedule::{RateSchedule, shock_period};
use super::types::EngineConfig;

const FIXED_DEPOSIT_RATE: f64 = 0.018;
const EQUITY_RATE: f64 = 0.07;
const BOND_RATE: f64 = 0.03;
const FOF_START_RATE: f64 = 0.06;
const FOF_END_RATE: f64 = 0.03;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    FixedDeposit,
    Equities,
    Bonds,
    PensionFof,
}

impl StrategyKind {
    /// Catalog declaration order; results are always reported in this order.
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::FixedDeposit,
        StrategyKind::Equities,
        StrategyKind::Bonds,
        StrategyKind::PensionFof,
    ];

    pub fn id(self) -> &'static str {
        match self {
            StrategyKind::FixedDeposit => "fixed-deposit",
            StrategyKind::Equities => "equities",
            StrategyKind::Bonds => "bonds",
            StrategyKind::PensionFof => "pension-fof",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            StrategyKind::FixedDeposit => "定存/储蓄",
            StrategyKind::Equities => "全部股票",
            StrategyKind::Bonds => "全部债券",
            StrategyKind::PensionFof => "养老FOF",
        }
    }

    /// Resolves either the kebab-case id or the display name.
    pub fn lookup(key: &str) -> Option<StrategyKind> {
        let key = key.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(key) || kind.display_name() == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub kind: StrategyKind,
    pub name: String,
    pub accumulation: RateSchedule,
    pub decumulation: RateSchedule,
}

impl Strategy {
    fn uniform(kind: StrategyKind, schedule: RateSchedule) -> Self {
        Self {
            kind,
            name: kind.display_name().to_string(),
            accumulation: schedule,
            decumulation: schedule,
        }
    }
}

pub struct StrategyCatalog;

impl StrategyCatalog {
    /// Binds every catalog strategy to schedules for an accumulation horizon of
    /// `accumulation_periods` periods.
    pub fn instantiate(accumulation_periods: u32, config: &EngineConfig) -> Vec<Strategy> {
        Self::kinds()
            .iter()
            .map(|&kind| Self::strategy(kind, accumulation_periods, config))
            .collect()
    }

    pub fn kinds() -> &'static [StrategyKind] {
        &StrategyKind::ALL
    }

    pub fn strategy(
        kind: StrategyKind,
        accumulation_periods: u32,
        config: &EngineConfig,
    ) -> Strategy {
        let schedule = match kind {
            StrategyKind::FixedDeposit => RateSchedule::Constant {
                rate: FIXED_DEPOSIT_RATE,
            },
            StrategyKind::Equities if config.shock_enabled => RateSchedule::Shock {
                baseline: EQUITY_RATE,
                drop_fraction: config.policy.equity_shock_drop,
                shock_period: shock_period(accumulation_periods, config.policy.shock_position),
                compounding_periods: config.granularity.periods_per_year(),
            },
            StrategyKind::Equities => RateSchedule::Constant { rate: EQUITY_RATE },
            StrategyKind::Bonds => RateSchedule::Constant { rate: BOND_RATE },
            StrategyKind::PensionFof => RateSchedule::Glide {
                start: FOF_START_RATE,
                end: FOF_END_RATE,
            },
        };
        Strategy::uniform(kind, schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PeriodGranularity;

    #[test]
    fn catalog_preserves_declaration_order_and_unique_names() {
        let strategies = StrategyCatalog::instantiate(420, &EngineConfig::default());
        let names = strategies.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["定存/储蓄", "全部股票", "全部债券", "养老FOF"]);

        let mut ids = strategies.iter().map(|s| s.kind.id()).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn equities_shock_uses_policy_position() {
        let strategy = StrategyCatalog::strategy(StrategyKind::Equities, 420, &EngineConfig::default());
        assert_eq!(
            strategy.accumulation,
            RateSchedule::Shock {
                baseline: 0.07,
                drop_fraction: 0.3,
                shock_period: 273,
                compounding_periods: 12,
            }
        );
    }

    #[test]
    fn equities_without_shock_is_flat() {
        let config = EngineConfig {
            shock_enabled: false,
            ..EngineConfig::default()
        };
        let strategy = StrategyCatalog::strategy(StrategyKind::Equities, 420, &config);
        assert_eq!(strategy.accumulation, RateSchedule::Constant { rate: 0.07 });
    }

    #[test]
    fn annual_granularity_shocks_a_single_year() {
        let config = EngineConfig {
            granularity: PeriodGranularity::Annual,
            ..EngineConfig::default()
        };
        let strategy = StrategyCatalog::strategy(StrategyKind::Equities, 35, &config);
        assert_eq!(
            strategy.accumulation,
            RateSchedule::Shock {
                baseline: 0.07,
                drop_fraction: 0.3,
                shock_period: 22,
                compounding_periods: 1,
            }
        );
    }

    #[test]
    fn lookup_accepts_id_or_display_name() {
        assert_eq!(StrategyKind::lookup("bonds"), Some(StrategyKind::Bonds));
        assert_eq!(StrategyKind::lookup("全部债券"), Some(StrategyKind::Bonds));
        assert_eq!(StrategyKind::lookup("Pension-FOF"), Some(StrategyKind::PensionFof));
        assert_eq!(StrategyKind::lookup("crypto"), None);
    }
}
