//! JSON over HTTP.
//!
//! `POST /calculate`, `POST /optimize` and `POST /integrate` run the pipeline on tokio's
//! blocking pool; `GET /health` answers immediately. Hard failures come back as
//! `{"error": message}` with status 400.
use crate::application::{
    ApplicationSource, DISABLED_TEXT, PresetCatalog, describe_with_timeout,
};
use crate::config::CalculatorConfig;
use crate::outcome::Outcome;
use crate::pipeline::{
    CalculateResponse, DomainInput, ExpressionEvaluationPipeline, IntegrateResponse,
    OptimizeResponse, PipelineError,
};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{Method, StatusCode};
use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<ExpressionEvaluationPipeline>,
    application: Arc<dyn ApplicationSource>,
}

/// Router with the local preset catalog as application text source.
pub fn app(config: CalculatorConfig) -> Router {
    app_with_source(config, Arc::new(PresetCatalog::new()))
}

pub fn app_with_source(config: CalculatorConfig, application: Arc<dyn ApplicationSource>) -> Router {
    let state = AppState {
        pipeline: Arc::new(ExpressionEvaluationPipeline::new(config)),
        application,
    };
    Router::new()
        .route("/health", get(health))
        .route("/calculate", post(calculate))
        .route("/optimize", post(optimize))
        .route("/integrate", post(integrate))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Binds `config.server.bind` and serves until the process ends.
pub async fn serve(config: CalculatorConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(config)).await
}

/// Accepts a number, a numeric string, an empty string or null; anything unusable is `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct CalculateRequest {
    function: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    x_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    x_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    y_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    y_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    point_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    point_y: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OptimizeRequest {
    function: String,
    #[serde(default)]
    constraint: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    x_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    x_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    y_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    y_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct IntegrateRequest {
    function: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    x_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    x_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    y_min: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    y_max: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("request failed ({}): {}", self.status, self.message);
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("request body is required"));
    }

    serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))
}

async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| ApiError::internal(format!("computation aborted: {err}")))?
        .map_err(ApiError::from)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn calculate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CalculateResponse>, ApiError> {
    let request: CalculateRequest = parse_json(&body)?;
    let domain = DomainInput {
        x_min: request.x_min,
        x_max: request.x_max,
        y_min: request.y_min,
        y_max: request.y_max,
    };
    let point = (request.point_x, request.point_y);
    let pipeline = state.pipeline.clone();
    let function = request.function.clone();
    let report = run_blocking(move || pipeline.calculate(&function, domain, point)).await?;

    let config = state.pipeline.config();
    let application = if config.application.enabled {
        describe_with_timeout(
            state.application.clone(),
            request.function,
            config.application_timeout(),
        )
        .await
    } else {
        Outcome::degenerate(DISABLED_TEXT.to_string(), "application text source disabled")
    };
    Ok(Json(report.into_response(
        application,
        state.pipeline.diagnostics_enabled(),
    )))
}

async fn optimize(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<OptimizeResponse>, ApiError> {
    let request: OptimizeRequest = parse_json(&body)?;
    let domain = DomainInput {
        x_min: request.x_min,
        x_max: request.x_max,
        y_min: request.y_min,
        y_max: request.y_max,
    };
    let pipeline = state.pipeline.clone();
    let report = run_blocking(move || {
        pipeline.optimize(&request.function, request.constraint.as_deref(), domain)
    })
    .await?;
    Ok(Json(report.to_response(state.pipeline.diagnostics_enabled())))
}

async fn integrate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IntegrateResponse>, ApiError> {
    let request: IntegrateRequest = parse_json(&body)?;
    let domain = DomainInput {
        x_min: request.x_min,
        x_max: request.x_max,
        y_min: request.y_min,
        y_max: request.y_max,
    };
    let pipeline = state.pipeline.clone();
    let report = run_blocking(move || pipeline.integrate(&request.function, domain)).await?;
    Ok(Json(report.to_response(state.pipeline.diagnostics_enabled())))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::response::Response;
    use http::header::CONTENT_TYPE;
    use http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::app;
    use crate::config::CalculatorConfig;

    fn test_app() -> axum::Router {
        app(CalculatorConfig::default())
    }

    async fn send_json(router: axum::Router, uri: &str, payload: Value) -> Response {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request should build");
        router.oneshot(request).await.expect("request should complete")
    }

    async fn parse_json_value(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .expect("request should build");
        let response = test_app().oneshot(request).await.expect("request should complete");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(parse_json_value(response).await, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn calculate_returns_partials_and_gradient() {
        let response = send_json(
            test_app(),
            "/calculate",
            json!({"function": "x**2 + y**2", "point_x": 1, "point_y": "1"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_json_value(response).await;
        assert_eq!(body["partial_x"], "2*x");
        assert_eq!(body["partial_y"], "2*y");
        assert_eq!(body["value_at_point"], "2.000000");
        assert_eq!(body["gradient"], json!(["2.000000", "2.000000"]));
        assert_eq!(body["gradient_magnitude"], "2.828427");
        assert_eq!(body["range"], "[0.0051, 50.0000]");
        assert!(body["application"].as_str().unwrap().starts_with("El paraboloide"));
        assert!(body.get("diagnostics").is_none());
        let figure: Value = serde_json::from_str(body["plot_data"].as_str().unwrap()).unwrap();
        assert_eq!(figure["data"][0]["z"].as_array().unwrap().len(), 100);
    }

    #[tokio::test]
    async fn calculate_accepts_lenient_numbers() {
        let response = send_json(
            test_app(),
            "/calculate",
            json!({"function": "x", "x_min": "-2", "x_max": "", "y_min": null, "point_x": "abc"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_json_value(response).await;
        let figure: Value = serde_json::from_str(body["plot_data"].as_str().unwrap()).unwrap();
        let xs = figure["data"][0]["x"].as_array().unwrap();
        assert_eq!(xs[0], -2.0);
        assert_eq!(xs.len(), 100);
        // point_x falls back to 1
        assert_eq!(body["value_at_point"], "1.000000");
    }

    #[tokio::test]
    async fn optimize_returns_critical_points_and_lagrange() {
        let response = send_json(
            test_app(),
            "/optimize",
            json!({
                "function": "x**2 + y**2",
                "constraint": "x + y - 2",
                "x_min": -5, "x_max": 5, "y_min": -5, "y_max": 5
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_json_value(response).await;
        assert_eq!(body["critical_points"], json!([["0.000000", "0.000000", "0.000000"]]));
        assert_eq!(body["lagrange"]["point"], json!(["1.000000", "1.000000"]));
        assert_eq!(body["lagrange"]["value"], "2.000000");
        assert_eq!(body["lagrange"]["lambda"], "2.000000");
    }

    #[tokio::test]
    async fn optimize_without_constraint_omits_lagrange() {
        let response = send_json(
            test_app(),
            "/optimize",
            json!({"function": "x**2 - y**2", "constraint": ""}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_json_value(response).await;
        assert!(body.get("lagrange").is_none());
    }

    #[tokio::test]
    async fn integrate_labels_numeric_results() {
        let symbolic = parse_json_value(
            send_json(
                test_app(),
                "/integrate",
                json!({"function": "1", "x_min": 0, "x_max": 1, "y_min": 0, "y_max": 1}),
            )
            .await,
        )
        .await;
        assert_eq!(symbolic["integral_value"], "1.00000000");
        assert_eq!(symbolic["method"], "symbolic");

        let numeric = parse_json_value(
            send_json(test_app(), "/integrate", json!({"function": "exp(-(x**2 + y**2))"})).await,
        )
        .await;
        assert_eq!(numeric["integral_value"], "0.55774629 (numérico)");
        assert_eq!(numeric["method"], "numeric");
        assert!(numeric["error_estimate"].is_string());
    }

    #[tokio::test]
    async fn malformed_expressions_return_400_on_every_endpoint() {
        for uri in ["/calculate", "/optimize", "/integrate"] {
            let response = send_json(test_app(), uri, json!({"function": "sin(x"})).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            let body = parse_json_value(response).await;
            assert!(!body["error"].as_str().unwrap_or_default().is_empty());
        }
    }

    #[tokio::test]
    async fn deep_and_oversized_expressions_return_400_on_every_endpoint() {
        let deep_signs = format!("{}x", "-".repeat(200));
        let deep_groups = format!("{}x{}", "(".repeat(200), ")".repeat(200));
        let oversized = format!("{}x", "-".repeat(10_000));
        for function in [deep_signs, deep_groups, oversized] {
            for uri in ["/calculate", "/optimize", "/integrate"] {
                let response = send_json(test_app(), uri, json!({"function": function})).await;
                assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
                let body = parse_json_value(response).await;
                assert!(!body["error"].as_str().unwrap_or_default().is_empty());
            }
        }
        let response = send_json(
            test_app(),
            "/optimize",
            json!({"function": "x^2", "constraint": format!("{}y", "-".repeat(200))}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn constrained_maximum_omits_lagrange() {
        let response = send_json(
            test_app(),
            "/optimize",
            json!({"function": "-(x^2 + y^2)", "constraint": "x + y - 2"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_json_value(response).await;
        assert!(body.get("lagrange").is_none());
    }

    #[tokio::test]
    async fn unknown_variable_returns_400() {
        let response = send_json(test_app(), "/calculate", json!({"function": "x + z"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = parse_json_value(response).await;
        assert!(body["error"].as_str().unwrap().contains('z'));
    }

    #[tokio::test]
    async fn missing_function_and_empty_body_return_400() {
        let response = send_json(test_app(), "/integrate", json!({"x_min": 0})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = parse_json_value(response).await;
        assert!(body["error"].as_str().unwrap().contains("function"));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/optimize")
            .body(Body::empty())
            .expect("request should build");
        let response = test_app().oneshot(request).await.expect("request should complete");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = parse_json_value(response).await;
        assert!(body["error"].as_str().unwrap().contains("request body"));
    }

    #[tokio::test]
    async fn diagnostics_follow_configuration() {
        let mut config = CalculatorConfig::default();
        config.output.diagnostics = true;
        let response = send_json(
            app(config),
            "/calculate",
            json!({"function": "log(x)", "point_x": 0, "point_y": 0}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = parse_json_value(response).await;
        assert_eq!(body["value_at_point"], "0.000000");
        let diagnostics = body["diagnostics"].as_array().unwrap();
        assert!(diagnostics.iter().any(|d| d["field"] == "value_at_point"));
    }
}
