//! REST API for the pack planner.
//!
//! Exposes planning over HTTP using Axum, with CORS enabled and an OpenAPI
//! document served under `/docs`.

use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, PlannerDefaults};
use crate::model::{Item, Pack, ValidationError};
use crate::planner::{PlanConfig, PlanResult, Planner};
use crate::sort::SortBackend;
use crate::strategy::{StrategyKind, UnplacedItem, UnplacedReason};
use crate::types::{MAX_THREADS, SortOrder};

#[derive(Clone)]
struct ApiState {
    defaults: PlannerDefaults,
    planner: Arc<Planner>,
}

impl ApiState {
    fn new(defaults: PlannerDefaults) -> Self {
        Self {
            defaults,
            planner: Arc::new(Planner::new()),
        }
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>pack-planner API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Item as sent by clients; validated into an [`Item`].
#[derive(Deserialize, Clone, ToSchema)]
#[schema(example = json!({ "id": 1, "length": 100, "quantity": 5, "weight": 2.0 }))]
pub struct ItemRequest {
    pub id: i64,
    pub length: i64,
    pub quantity: i64,
    pub weight: f64,
}

impl ItemRequest {
    fn into_item(self) -> Result<Item, ValidationError> {
        Item::new(self.id, self.length, self.quantity, self.weight)
    }
}

/// Request structure for the planning endpoint.
///
/// `strategy`, `threads` and `sort_backend` fall back to the server defaults.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "sort_order": "NATURAL",
        "max_items": 10,
        "max_weight": 25.0,
        "strategy": "best_fit",
        "items": [
            { "id": 1, "length": 100, "quantity": 5, "weight": 2.0 },
            { "id": 2, "length": 200, "quantity": 3, "weight": 3.0 }
        ]
    })
)]
pub struct PlanRequest {
    #[serde(default)]
    pub sort_order: SortOrder,
    pub max_items: i64,
    pub max_weight: f64,
    #[serde(default)]
    #[schema(nullable = true)]
    pub strategy: Option<StrategyKind>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub threads: Option<usize>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub sort_backend: Option<SortBackend>,
    pub items: Vec<ItemRequest>,
}

#[derive(Debug)]
enum PlanRequestValidationError {
    InvalidLimits(String),
    InvalidThreads(usize),
    InvalidItem(ValidationError),
}

impl PlanRequest {
    fn into_validated(
        self,
        defaults: &PlannerDefaults,
    ) -> Result<(PlanConfig, Vec<Item>), PlanRequestValidationError> {
        if self.max_items <= 0 {
            return Err(PlanRequestValidationError::InvalidLimits(format!(
                "max_items must be positive, got: {}",
                self.max_items
            )));
        }
        if !(self.max_weight.is_finite() && self.max_weight > 0.0) {
            return Err(PlanRequestValidationError::InvalidLimits(format!(
                "max_weight must be a positive number, got: {}",
                self.max_weight
            )));
        }
        if let Some(threads) = self
            .threads
            .filter(|threads| !(1..=MAX_THREADS).contains(threads))
        {
            return Err(PlanRequestValidationError::InvalidThreads(threads));
        }

        let items = self
            .items
            .into_iter()
            .map(ItemRequest::into_item)
            .collect::<Result<Vec<_>, ValidationError>>()
            .map_err(PlanRequestValidationError::InvalidItem)?;

        let mut config = defaults.plan_config(
            self.sort_order,
            self.max_items,
            self.max_weight,
            self.strategy,
            self.threads,
        );
        if let Some(backend) = self.sort_backend {
            config = config.with_sort_backend(backend);
        }
        Ok((config, items))
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn limits_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid pack limits",
        details,
    )
}

fn parse_plan_request(
    payload: Result<Json<PlanRequest>, JsonRejection>,
    defaults: &PlannerDefaults,
) -> Result<(PlanConfig, Vec<Item>), Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated(defaults) {
        Ok(validated) => Ok(validated),
        Err(PlanRequestValidationError::InvalidLimits(details)) => Err(limits_error(details)),
        Err(PlanRequestValidationError::InvalidThreads(threads)) => Err(validation_error(
            format!("threads must be between 1 and {MAX_THREADS}, got: {threads}"),
        )),
        Err(PlanRequestValidationError::InvalidItem(err)) => Err(validation_error(err.to_string())),
    }
}

/// One pack in the response.
#[derive(Serialize, ToSchema)]
pub struct PackEntry {
    pub number: usize,
    pub total_items: u32,
    pub total_weight: f64,
    pub max_length: u32,
    pub items: Vec<Item>,
}

impl From<Pack> for PackEntry {
    fn from(pack: Pack) -> Self {
        Self {
            number: pack.number(),
            total_items: pack.total_items(),
            total_weight: pack.total_weight(),
            max_length: pack.max_length(),
            items: pack.items().to_vec(),
        }
    }
}

/// Quantity that was left out, with a readable reason.
#[derive(Serialize, ToSchema)]
pub struct UnplacedEntry {
    pub id: i64,
    pub quantity: u32,
    pub reason_code: UnplacedReason,
    pub reason: String,
}

impl From<UnplacedItem> for UnplacedEntry {
    fn from(item: UnplacedItem) -> Self {
        Self {
            id: item.id,
            quantity: item.quantity,
            reason_code: item.reason,
            reason: item.reason.to_string(),
        }
    }
}

/// Phase timings in milliseconds.
#[derive(Serialize, ToSchema)]
pub struct PlanTimings {
    pub sort_ms: f64,
    pub pack_ms: f64,
    pub total_ms: f64,
}

/// Response of the planning endpoint.
#[derive(Serialize, ToSchema)]
pub struct PlanResponse {
    pub packs: Vec<PackEntry>,
    pub unplaced: Vec<UnplacedEntry>,
    pub is_complete: bool,
    pub pack_count: usize,
    pub total_items: u64,
    pub utilization_percent: f64,
    pub strategy: String,
    #[schema(nullable = true)]
    pub sort_backend: Option<SortBackend>,
    pub timings: PlanTimings,
}

impl From<PlanResult> for PlanResponse {
    fn from(result: PlanResult) -> Self {
        let timings = PlanTimings {
            sort_ms: result.sort_duration.as_secs_f64() * 1000.0,
            pack_ms: result.pack_duration.as_secs_f64() * 1000.0,
            total_ms: result.total_duration.as_secs_f64() * 1000.0,
        };
        let pack_count = result.pack_count();
        let is_complete = result.unplaced.is_empty();

        Self {
            packs: result
                .packs
                .into_iter()
                .filter(|pack| !pack.is_empty())
                .map(PackEntry::from)
                .collect(),
            unplaced: result.unplaced.into_iter().map(UnplacedEntry::from).collect(),
            is_complete,
            pack_count,
            total_items: result.total_items,
            utilization_percent: result.utilization_percent,
            strategy: result.strategy_name,
            sort_backend: result.sort_backend,
            timings,
        }
    }
}

/// Strategy listing entry.
#[derive(Serialize, ToSchema)]
pub struct StrategyInfo {
    pub id: StrategyKind,
    pub name: String,
    pub parallel: bool,
    pub default_threads: usize,
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_plan, handle_strategies),
    components(
        schemas(
            PlanRequest,
            ItemRequest,
            PlanResponse,
            PackEntry,
            UnplacedEntry,
            PlanTimings,
            StrategyInfo,
            ErrorResponse,
            Item,
            SortOrder,
            SortBackend,
            StrategyKind,
            UnplacedReason
        )
    ),
    tags((name = "planning", description = "Endpoints for pack planning"))
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/plan", post(handle_plan))
        .route("/strategies", get(handle_strategies))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, defaults: PlannerDefaults) -> std::io::Result<()> {
    let app = router(ApiState::new(defaults));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    println!(
        "🚀 Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        println!("💡 Local access: http://localhost:{}", config.port());
    }
    println!("📦 API Endpoints:");
    println!("   - POST /plan");
    println!("   - GET /strategies");
    println!("📑 Documentation:");
    println!("   - GET /docs");
    println!("   - GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /plan.
///
/// Validates the request, then sorts and packs the items on a blocking
/// thread with the shared planner.
///
/// # Returns
/// JSON response with the packs, the unplaced quantities and statistics
#[utoipa::path(
    post,
    path = "/plan",
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Successfully planned packs", body = PlanResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request, item or pack limits",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Planning task failed", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Response {
    let (config, items) = match parse_plan_request(payload, &state.defaults) {
        Ok(request) => request,
        Err(response) => return response,
    };

    info!(
        items = items.len(),
        strategy = config.strategy.id(),
        threads = config.threads,
        "New plan request"
    );

    let planner = Arc::clone(&state.planner);
    let result =
        tokio::task::spawn_blocking(move || planner.plan(&config, items)).await;

    match result {
        Ok(result) => (StatusCode::OK, Json(PlanResponse::from(result))).into_response(),
        Err(err) => {
            error!("Planning task failed: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Planning failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for GET /strategies.
#[utoipa::path(
    get,
    path = "/strategies",
    responses((status = 200, description = "Available strategies", body = [StrategyInfo])),
    tag = "planning"
)]
async fn handle_strategies() -> Json<Vec<StrategyInfo>> {
    Json(
        StrategyKind::ALL
            .into_iter()
            .map(|kind| StrategyInfo {
                id: kind,
                name: kind.display_name().to_string(),
                parallel: kind.is_parallel(),
                default_threads: kind.default_threads(),
            })
            .collect(),
    )
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
