mod chart;
mod error;

use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    DEFAULT_TERMINAL_AGE, EngineConfig, MAX_AGE, IdealCurve, IdealCurveMethod, IdealCurveRequest,
    PeriodGranularity, SimulationInput, SimulationResult, StrategyCatalog, StrategyKind,
    run_simulation, solve_ideal_curve,
};

pub use chart::{ChartRow, IDEAL_SERIES_KEY, accumulation_rows, decumulation_rows, merge_series};
pub use error::{ApiError, ApiResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliGranularity {
    Monthly,
    Annual,
}

impl From<CliGranularity> for PeriodGranularity {
    fn from(value: CliGranularity) -> Self {
        match value {
            CliGranularity::Monthly => PeriodGranularity::Monthly,
            CliGranularity::Annual => PeriodGranularity::Annual,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliIdealMethod {
    BackwardRecursion,
    BenchmarkMultiple,
}

impl From<CliIdealMethod> for IdealCurveMethod {
    fn from(value: CliIdealMethod) -> Self {
        match value {
            CliIdealMethod::BackwardRecursion => IdealCurveMethod::BackwardRecursion,
            CliIdealMethod::BenchmarkMultiple => IdealCurveMethod::BenchmarkMultiple,
        }
    }
}

/// A form field as submitted: JSON numbers, or text from a query string or a
/// text input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum FormValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    #[serde(alias = "age")]
    current_age: Option<FormValue>,
    retirement_age: Option<FormValue>,
    terminal_age: Option<FormValue>,
    #[serde(alias = "initIncome", alias = "initialMonthlyIncome")]
    monthly_income: Option<FormValue>,
    income_growth: Option<FormValue>,
    #[serde(alias = "saveRate")]
    savings_rate: Option<FormValue>,
    inflation: Option<FormValue>,
    #[serde(alias = "expenseReplacementRate")]
    expense_rate: Option<FormValue>,

    period_granularity: Option<PeriodGranularity>,
    ideal_curve_method: Option<IdealCurveMethod>,
    shock_enabled: Option<bool>,
    strategy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IdealPayload {
    #[serde(alias = "age")]
    current_age: Option<FormValue>,
    retirement_age: Option<FormValue>,
    terminal_age: Option<FormValue>,
    target_monthly_expense: Option<FormValue>,
    #[serde(alias = "initIncome", alias = "initialMonthlyIncome")]
    monthly_income: Option<FormValue>,
    ideal_curve_method: Option<IdealCurveMethod>,
}

/// Percent-valued form fields, as on the input form; the engine works in
/// fractions.
#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    #[arg(long)]
    pub current_age: f64,
    #[arg(long, default_value_t = 65.0)]
    pub retirement_age: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_TERMINAL_AGE as f64,
        help = "Age the retirement balance has to last until"
    )]
    pub terminal_age: f64,
    #[arg(long, help = "Current monthly income")]
    pub monthly_income: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Annual income growth in percent"
    )]
    pub income_growth: f64,
    #[arg(long, help = "Share of monthly income saved, in percent")]
    pub savings_rate: f64,
    #[arg(
        long,
        default_value_t = 2.5,
        help = "Expected annual inflation in percent"
    )]
    pub inflation: f64,
    #[arg(
        long,
        default_value_t = 70.0,
        help = "Retirement spending as percent of final monthly income"
    )]
    pub expense_rate: f64,
    #[arg(long, value_enum, default_value_t = CliGranularity::Monthly)]
    pub granularity: CliGranularity,
    #[arg(long, value_enum, default_value_t = CliIdealMethod::BackwardRecursion)]
    pub ideal_method: CliIdealMethod,
    #[arg(long, help = "Disable the one-off equity crash")]
    pub no_shock: bool,
    #[arg(long, help = "Only report this strategy (id or name)")]
    pub strategy: Option<String>,
}

#[derive(Debug)]
struct ApiRequest {
    input: SimulationInput,
    config: EngineConfig,
    strategy: Option<StrategyKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    input: SimulationInput,
    period_granularity: PeriodGranularity,
    ideal_curve_method: IdealCurveMethod,
    shock_enabled: bool,
    target_monthly_expense: f64,
    strategies: Vec<SimulationResult>,
    ideal_curve: IdealCurve,
    accumulation_chart: Vec<ChartRow>,
    decumulation_chart: Vec<ChartRow>,
}

#[derive(Debug, Serialize)]
struct StrategyListing {
    id: &'static str,
    name: &'static str,
}

fn build_request(args: SimulateArgs) -> ApiResult<ApiRequest> {
    let input = SimulationInput {
        current_age: whole_age("currentAge", args.current_age)?,
        retirement_age: whole_age("retirementAge", args.retirement_age)?,
        terminal_age: whole_age("terminalAge", args.terminal_age)?,
        initial_monthly_income: args.monthly_income,
        income_growth_rate: args.income_growth / 100.0,
        savings_rate: args.savings_rate / 100.0,
        inflation_rate: args.inflation / 100.0,
        expense_replacement_rate: args.expense_rate / 100.0,
    };
    input.validate()?;

    let strategy = match args.strategy {
        Some(key) => Some(StrategyKind::lookup(&key).ok_or(ApiError::UnknownStrategy(key))?),
        None => None,
    };

    let config = EngineConfig {
        granularity: args.granularity.into(),
        ideal_method: args.ideal_method.into(),
        shock_enabled: !args.no_shock,
        ..EngineConfig::default()
    };

    Ok(ApiRequest {
        input,
        config,
        strategy,
    })
}

fn whole_age(field: &'static str, value: f64) -> ApiResult<u32> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > MAX_AGE as f64 {
        return Err(ApiError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(value as u32)
}

fn parse_number(field: &'static str, value: Option<FormValue>) -> ApiResult<Option<f64>> {
    let number = match value {
        None => return Ok(None),
        Some(FormValue::Number(n)) => n,
        Some(FormValue::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed.parse::<f64>().map_err(|_| ApiError::InvalidField {
                field,
                value: text.clone(),
            })?
        }
    };
    if !number.is_finite() {
        return Err(ApiError::InvalidField {
            field,
            value: number.to_string(),
        });
    }
    Ok(Some(number))
}

fn required_number(field: &'static str, value: Option<FormValue>) -> ApiResult<f64> {
    parse_number(field, value)?.ok_or(ApiError::MissingField(field))
}

fn default_args_for_api() -> SimulateArgs {
    SimulateArgs {
        current_age: 0.0,
        retirement_age: 65.0,
        terminal_age: DEFAULT_TERMINAL_AGE as f64,
        monthly_income: 0.0,
        income_growth: 3.0,
        savings_rate: 0.0,
        inflation: 2.5,
        expense_rate: 70.0,
        granularity: CliGranularity::Monthly,
        ideal_method: CliIdealMethod::BackwardRecursion,
        no_shock: false,
        strategy: None,
    }
}

fn api_request_from_payload(payload: SimulatePayload) -> ApiResult<ApiRequest> {
    let mut args = default_args_for_api();

    args.current_age = required_number("currentAge", payload.current_age)?;
    args.monthly_income = required_number("monthlyIncome", payload.monthly_income)?;
    args.savings_rate = required_number("savingsRate", payload.savings_rate)?;

    if let Some(v) = parse_number("retirementAge", payload.retirement_age)? {
        args.retirement_age = v;
    }
    if let Some(v) = parse_number("terminalAge", payload.terminal_age)? {
        args.terminal_age = v;
    }
    if let Some(v) = parse_number("incomeGrowth", payload.income_growth)? {
        args.income_growth = v;
    }
    if let Some(v) = parse_number("inflation", payload.inflation)? {
        args.inflation = v;
    }
    if let Some(v) = parse_number("expenseRate", payload.expense_rate)? {
        args.expense_rate = v;
    }

    let mut request = build_request(SimulateArgs {
        strategy: payload.strategy.filter(|s| !s.trim().is_empty()),
        ..args
    })?;
    if let Some(v) = payload.period_granularity {
        request.config.granularity = v;
    }
    if let Some(v) = payload.ideal_curve_method {
        request.config.ideal_method = v;
    }
    if let Some(v) = payload.shock_enabled {
        request.config.shock_enabled = v;
    }
    Ok(request)
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> ApiResult<ApiRequest> {
    let payload = serde_json::from_str::<SimulatePayload>(json)?;
    api_request_from_payload(payload)
}

fn simulate(request: &ApiRequest) -> ApiResult<SimulateResponse> {
    let run = run_simulation(&request.input, &request.config)?;
    let ideal_curve = run.ideal_curve()?;
    let target_monthly_expense = run.target_monthly_expense();

    let strategies = match request.strategy {
        Some(kind) => run
            .results
            .iter()
            .filter(|r| r.strategy_id == kind.id())
            .cloned()
            .collect::<Vec<_>>(),
        None => run.results.clone(),
    };

    Ok(SimulateResponse {
        input: run.input.clone(),
        period_granularity: run.config.granularity,
        ideal_curve_method: run.config.ideal_method,
        shock_enabled: run.config.shock_enabled,
        target_monthly_expense,
        accumulation_chart: accumulation_rows(&strategies, &ideal_curve),
        decumulation_chart: decumulation_rows(&strategies, &ideal_curve),
        strategies,
        ideal_curve,
    })
}

fn ideal_curve_from_payload(payload: IdealPayload) -> ApiResult<IdealCurve> {
    let current_age = whole_age(
        "currentAge",
        required_number("currentAge", payload.current_age)?,
    )?;
    let retirement_age = whole_age(
        "retirementAge",
        parse_number("retirementAge", payload.retirement_age)?.unwrap_or(65.0),
    )?;
    let terminal_age = whole_age(
        "terminalAge",
        parse_number("terminalAge", payload.terminal_age)?
            .unwrap_or(DEFAULT_TERMINAL_AGE as f64),
    )?;
    let target = required_number("targetMonthlyExpense", payload.target_monthly_expense)?;

    let config = EngineConfig {
        ideal_method: payload.ideal_curve_method.unwrap_or_default(),
        ..EngineConfig::default()
    };
    let monthly_income = match config.ideal_method {
        IdealCurveMethod::BenchmarkMultiple => {
            required_number("monthlyIncome", payload.monthly_income)?
        }
        IdealCurveMethod::BackwardRecursion => {
            parse_number("monthlyIncome", payload.monthly_income)?.unwrap_or(0.0)
        }
    };

    let request = IdealCurveRequest::new(
        current_age,
        retirement_age,
        terminal_age,
        target,
        monthly_income * 12.0,
    )?;
    Ok(solve_ideal_curve(&request, &config))
}

/// Runs one simulation from command-line arguments and renders the same JSON
/// body the HTTP API returns.
pub fn run_cli_simulation(args: SimulateArgs) -> ApiResult<String> {
    let request = build_request(args)?;
    let response = simulate(&request)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/strategies", get(strategies_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/ideal", get(ideal_get_handler).post(ideal_post_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "pension simulator API listening");
    tracing::info!("local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn strategies_handler() -> Response {
    let listing = StrategyCatalog::kinds()
        .iter()
        .map(|kind| StrategyListing {
            id: kind.id(),
            name: kind.display_name(),
        })
        .collect::<Vec<_>>();
    json_response(StatusCode::OK, listing)
}

async fn not_found_handler() -> Response {
    ApiError::NotFound.into_response()
}

async fn simulate_get_handler(
    payload: Result<Query<SimulatePayload>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(payload) = payload?;
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(
    payload: Result<Json<SimulatePayload>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(payload) = payload?;
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> ApiResult<Response> {
    let request = api_request_from_payload(payload)?;
    tracing::info!(
        current_age = request.input.current_age,
        retirement_age = request.input.retirement_age,
        granularity = ?request.config.granularity,
        ideal_method = ?request.config.ideal_method,
        "simulate request"
    );
    let response = simulate(&request)?;
    Ok(json_response(StatusCode::OK, response))
}

async fn ideal_get_handler(
    payload: Result<Query<IdealPayload>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(payload) = payload?;
    ideal_handler_impl(payload).await
}

async fn ideal_post_handler(
    payload: Result<Json<IdealPayload>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(payload) = payload?;
    ideal_handler_impl(payload).await
}

async fn ideal_handler_impl(payload: IdealPayload) -> ApiResult<Response> {
    let curve = ideal_curve_from_payload(payload)?;
    tracing::info!(
        method = ?curve.method,
        required = curve.required_balance_at_retirement,
        "ideal curve request"
    );
    Ok(json_response(StatusCode::OK, curve))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineError;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, Uri};
    use tower::ServiceExt;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router().oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        let json = serde_json::from_slice(&bytes).expect("json body");
        (status, json)
    }

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("valid request")
    }

    fn sample_args() -> SimulateArgs {
        SimulateArgs {
            current_age: 30.0,
            monthly_income: 10_000.0,
            savings_rate: 10.0,
            ..default_args_for_api()
        }
    }

    #[test]
    fn build_request_converts_percent_fields() {
        let request = build_request(sample_args()).expect("valid args");
        let input = &request.input;
        assert_eq!(input.current_age, 30);
        assert_eq!(input.retirement_age, 65);
        assert_eq!(input.terminal_age, 85);
        assert_approx(input.income_growth_rate, 0.03);
        assert_approx(input.savings_rate, 0.10);
        assert_approx(input.inflation_rate, 0.025);
        assert_approx(input.expense_replacement_rate, 0.70);
        assert_eq!(request.config, EngineConfig::default());
    }

    #[test]
    fn build_request_rejects_retirement_before_current_age() {
        let mut args = sample_args();
        args.current_age = 40.0;
        args.retirement_age = 30.0;
        let err = build_request(args).expect_err("must reject");
        assert!(matches!(
            err,
            ApiError::Engine(EngineError::InvalidParameters {
                field: "retirementAge",
                ..
            })
        ));
    }

    #[test]
    fn build_request_rejects_fractional_age() {
        let mut args = sample_args();
        args.current_age = 30.5;
        let err = build_request(args).expect_err("must reject");
        assert!(matches!(
            err,
            ApiError::InvalidField {
                field: "currentAge",
                ..
            }
        ));
    }

    #[test]
    fn build_request_rejects_ages_past_the_cap() {
        let mut args = sample_args();
        args.retirement_age = 1e9;
        let err = build_request(args).expect_err("must reject");
        assert!(matches!(
            err,
            ApiError::InvalidField {
                field: "retirementAge",
                ..
            }
        ));

        let mut args = sample_args();
        args.terminal_age = (MAX_AGE + 1) as f64;
        assert!(build_request(args).is_err());
    }

    #[test]
    fn api_request_from_json_parses_numbers_and_text() {
        let request = api_request_from_json(
            r#"{
                "age": "35",
                "retirementAge": 60,
                "initIncome": "12000",
                "incomeGrowth": 2,
                "saveRate": "15",
                "inflation": "3",
                "expenseRate": 80,
                "periodGranularity": "annual",
                "idealCurveMethod": "benchmarkMultiple",
                "shockEnabled": false,
                "strategy": "bonds"
            }"#,
        )
        .expect("valid payload");

        assert_eq!(request.input.current_age, 35);
        assert_eq!(request.input.retirement_age, 60);
        assert_approx(request.input.initial_monthly_income, 12_000.0);
        assert_approx(request.input.income_growth_rate, 0.02);
        assert_approx(request.input.savings_rate, 0.15);
        assert_approx(request.input.inflation_rate, 0.03);
        assert_approx(request.input.expense_replacement_rate, 0.8);
        assert_eq!(request.config.granularity, PeriodGranularity::Annual);
        assert_eq!(
            request.config.ideal_method,
            IdealCurveMethod::BenchmarkMultiple
        );
        assert!(!request.config.shock_enabled);
        assert_eq!(request.strategy, Some(StrategyKind::Bonds));
    }

    #[test]
    fn api_request_from_json_applies_form_defaults() {
        let request =
            api_request_from_json(r#"{"currentAge": 30, "monthlyIncome": 8000, "savingsRate": 10}"#)
                .expect("valid payload");
        assert_eq!(request.input.retirement_age, 65);
        assert_eq!(request.input.terminal_age, 85);
        assert_approx(request.input.income_growth_rate, 0.03);
        assert_approx(request.input.expense_replacement_rate, 0.7);
        assert!(request.config.shock_enabled);
        assert_eq!(request.strategy, None);
    }

    #[test]
    fn api_request_from_json_reports_missing_fields() {
        let err = api_request_from_json(r#"{"currentAge": 30, "savingsRate": 10}"#)
            .expect_err("must reject");
        assert!(matches!(err, ApiError::MissingField("monthlyIncome")));

        let err = api_request_from_json(r#"{"currentAge": " ", "monthlyIncome": 1, "savingsRate": 1}"#)
            .expect_err("must reject");
        assert!(matches!(err, ApiError::MissingField("currentAge")));
    }

    #[test]
    fn api_request_from_json_reports_non_numeric_fields() {
        let err = api_request_from_json(
            r#"{"currentAge": 30, "monthlyIncome": 8000, "savingsRate": "ten"}"#,
        )
        .expect_err("must reject");
        assert!(matches!(
            err,
            ApiError::InvalidField {
                field: "savingsRate",
                ..
            }
        ));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_request_from_json_rejects_unknown_strategy() {
        let err = api_request_from_json(
            r#"{"currentAge": 30, "monthlyIncome": 8000, "savingsRate": 10, "strategy": "gold"}"#,
        )
        .expect_err("must reject");
        assert!(matches!(err, ApiError::UnknownStrategy(ref s) if s == "gold"));
    }

    #[test]
    fn query_string_payload_parses_text_fields() {
        let uri: Uri = "http://localhost/api/simulate?currentAge=30&monthlyIncome=10000&savingsRate=10&shockEnabled=false&periodGranularity=monthly"
            .parse()
            .expect("valid uri");
        let Query(payload) = Query::<SimulatePayload>::try_from_uri(&uri).expect("valid query");
        let request = api_request_from_payload(payload).expect("valid payload");
        assert_eq!(request.input.current_age, 30);
        assert_approx(request.input.savings_rate, 0.10);
        assert!(!request.config.shock_enabled);
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let request = build_request(sample_args()).expect("valid args");
        let response = simulate(&request).expect("simulation runs");
        let json = serde_json::to_value(&response).expect("serializable");

        for key in [
            "input",
            "periodGranularity",
            "idealCurveMethod",
            "shockEnabled",
            "targetMonthlyExpense",
            "strategies",
            "idealCurve",
            "accumulationChart",
            "decumulationChart",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["periodGranularity"], "monthly");
        assert_eq!(json["idealCurveMethod"], "backward-recursion");

        let strategies = json["strategies"].as_array().expect("array");
        assert_eq!(strategies.len(), 4);
        assert_eq!(strategies[2]["strategyName"], "全部债券");
        assert_eq!(strategies[2]["strategyId"], "bonds");
        assert_eq!(
            strategies[2]["accumulationSeries"]
                .as_array()
                .expect("array")
                .len(),
            35
        );

        let chart = json["accumulationChart"].as_array().expect("array");
        assert_eq!(chart.first().expect("rows")["age"], 31);
        assert_eq!(chart.last().expect("rows")["age"], 65);
    }

    #[test]
    fn accumulation_chart_omits_ideal_at_retirement_age() {
        let request = build_request(sample_args()).expect("valid args");
        let response = simulate(&request).expect("simulation runs");
        let last = response.accumulation_chart.last().expect("rows");
        assert_eq!(last.age, 65);
        assert_eq!(last.values.len(), 4);
        assert!(!last.values.contains_key(IDEAL_SERIES_KEY));

        let first = response.accumulation_chart.first().expect("rows");
        assert_eq!(first.values.len(), 5);
    }

    #[test]
    fn benchmark_charts_merge_ideal_from_current_age() {
        let mut args = sample_args();
        args.ideal_method = CliIdealMethod::BenchmarkMultiple;
        let request = build_request(args).expect("valid args");
        let response = simulate(&request).expect("simulation runs");
        assert_eq!(
            response.ideal_curve.method,
            IdealCurveMethod::BenchmarkMultiple
        );

        let accumulation = &response.accumulation_chart;
        let ages = accumulation.iter().map(|row| row.age).collect::<Vec<_>>();
        assert_eq!(ages, (30..=65).collect::<Vec<_>>());
        let first = &accumulation[0];
        assert_eq!(first.values.len(), 1);
        assert_approx(first.values[IDEAL_SERIES_KEY], 0.4 * 120_000.0);
        let last = accumulation.last().expect("rows");
        assert_eq!(last.values.len(), 5);
        assert_approx(last.values[IDEAL_SERIES_KEY], 8.9 * 120_000.0);

        let decumulation = &response.decumulation_chart;
        assert_eq!(decumulation.first().map(|row| row.age), Some(65));
        assert_eq!(decumulation.last().map(|row| row.age), Some(85));
        assert!(
            decumulation
                .iter()
                .all(|row| row.values.contains_key(IDEAL_SERIES_KEY))
        );
    }

    #[test]
    fn strategy_filter_limits_series_but_not_target() {
        let mut args = sample_args();
        args.strategy = Some("养老FOF".to_string());
        let request = build_request(args).expect("valid args");
        let response = simulate(&request).expect("simulation runs");
        assert_eq!(response.strategies.len(), 1);
        assert_eq!(response.strategies[0].strategy_id, "pension-fof");
        assert!(response.target_monthly_expense > 0.0);
        assert!(
            response
                .accumulation_chart
                .iter()
                .all(|row| row.values.len() <= 2)
        );
    }

    #[test]
    fn ideal_payload_solves_for_caller_target() {
        let payload = serde_json::from_str::<IdealPayload>(
            r#"{"currentAge": 30, "retirementAge": 65, "targetMonthlyExpense": "7000"}"#,
        )
        .expect("valid json");
        let curve = ideal_curve_from_payload(payload).expect("valid payload");
        assert_eq!(curve.method, IdealCurveMethod::BackwardRecursion);
        assert!(curve.required_balance_at_retirement > 0.0);
        assert_eq!(curve.post_retirement_series.len(), 21);
    }

    #[test]
    fn ideal_payload_requires_income_for_benchmark_method() {
        let payload = serde_json::from_str::<IdealPayload>(
            r#"{"currentAge": 30, "targetMonthlyExpense": 7000, "idealCurveMethod": "benchmark-multiple"}"#,
        )
        .expect("valid json");
        let err = ideal_curve_from_payload(payload).expect_err("must reject");
        assert!(matches!(err, ApiError::MissingField("monthlyIncome")));
    }

    #[test]
    fn error_response_uses_json_body_and_status() {
        let response = ApiError::MissingField("currentAge").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_json_body_gets_json_error() {
        let (status, json) = send(post_json("/api/simulate", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = json["error"].as_str().expect("error message");
        assert!(message.starts_with("invalid payload"), "{message}");

        let (status, json) = send(post_json("/api/ideal", "[1, 2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_enum_value_gets_json_error() {
        let (status, json) = send(post_json(
            "/api/simulate",
            r#"{"currentAge": 30, "monthlyIncome": 8000, "savingsRate": 10, "periodGranularity": "weekly"}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let request = Request::builder()
            .uri("/api/simulate?currentAge=30&monthlyIncome=8000&savingsRate=10&periodGranularity=weekly")
            .body(Body::empty())
            .expect("valid request");
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn router_serves_simulation_and_rejects_huge_ages() {
        let (status, json) = send(post_json(
            "/api/simulate",
            r#"{"currentAge": 30, "monthlyIncome": 10000, "savingsRate": 10}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["strategies"].as_array().map(Vec::len), Some(4));

        let (status, json) = send(post_json(
            "/api/simulate",
            r#"{"currentAge": 30, "retirementAge": 1e9, "terminalAge": 1e9, "monthlyIncome": 10000, "savingsRate": 10}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().expect("message").contains("retirementAge"));

        let (status, _) = send(post_json(
            "/api/ideal",
            r#"{"currentAge": 30, "retirementAge": 400000000, "targetMonthlyExpense": 7000}"#,
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let request = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .expect("valid request");
        let (status, json) = send(request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "not found");
    }

    #[test]
    fn cli_simulation_renders_json() {
        let rendered = run_cli_simulation(sample_args()).expect("simulation runs");
        let json: serde_json::Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(json["strategies"].as_array().map(Vec::len), Some(4));
    }
}
