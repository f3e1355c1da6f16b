use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::collectors::CollectorRegistration;
use crate::context::AppContext;
use crate::inventory::Inventory;

type SharedContext = Arc<AppContext>;

/// Create the HTTP server router
pub fn create_router(app_context: SharedContext) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/vrops_list", get(vrops_list_handler))
        .route("/vcenters", get(|s| mapping_handler(s, "vcenters", |i| render(&i.vcenters))))
        .route(
            "/datacenters",
            get(|s| mapping_handler(s, "datacenters", |i| render(&i.datacenters))),
        )
        .route("/clusters", get(|s| mapping_handler(s, "clusters", |i| render(&i.clusters))))
        .route("/hosts", get(|s| mapping_handler(s, "hosts", |i| render(&i.hosts))))
        .route(
            "/datastores",
            get(|s| mapping_handler(s, "datastores", |i| render(&i.datastores))),
        )
        .route("/vms", get(|s| mapping_handler(s, "vms", |i| render(&i.vms))))
        .route("/iteration", get(iteration_handler))
        .route("/target_tokens", get(target_tokens_handler))
        .route(
            "/register",
            get(registered_collectors_handler).post(register_collector_handler),
        )
        .route(
            "/metrics",
            get(metric_names_handler)
                .post(add_metric_name_handler)
                .delete(clear_metric_names_handler),
        )
        .with_state(app_context)
}

/// Index page handler
async fn index_page() -> impl IntoResponse {
    info!("Index page request received");
    let html = r#"<html>
    <head><title>vROps Inventory</title></head>
    <body>
    <h1>Available HTTP endpoints:</h1>
    <ul>
    <li><b><a href='/vrops_list'>/vrops_list</a></b>: Configured vROps targets</li>
    <li><b><a href='/vcenters'>/vcenters</a></b>: vCenters by uuid</li>
    <li><b><a href='/datacenters'>/datacenters</a></b>: Datacenters by uuid</li>
    <li><b><a href='/clusters'>/clusters</a></b>: Clusters by uuid</li>
    <li><b><a href='/hosts'>/hosts</a></b>: Hosts by uuid</li>
    <li><b><a href='/datastores'>/datastores</a></b>: Datastores by uuid</li>
    <li><b><a href='/vms'>/vms</a></b>: Virtual machines by uuid</li>
    <li><b><a href='/iteration'>/iteration</a></b>: Number of published inventories</li>
    <li><b><a href='/target_tokens'>/target_tokens</a></b>: Current token per target</li>
    <li><b><a href='/register'>/register</a></b>: Registered collectors (POST to register)</li>
    <li><b><a href='/metrics'>/metrics</a></b>: Exported metric names (POST to add, DELETE to clear)</li>
    </ul>
    </body>
    </html>"#;
    Html(html).into_response()
}

fn render<T: Serialize>(value: &T) -> Response {
    Json(value).into_response()
}

fn bad_request(rejection: JsonRejection) -> Response {
    warn!(error = %rejection, "Rejecting request body");
    (StatusCode::BAD_REQUEST, rejection.body_text()).into_response()
}

/// Serve one uuid-keyed mapping of the current generation
async fn mapping_handler(
    State(ctx): State<SharedContext>,
    kind: &'static str,
    view: impl FnOnce(&Inventory) -> Response,
) -> Response {
    let generation = ctx.store().snapshot();
    debug!(kind, iteration = ctx.store().iteration(), "Serving inventory mapping");
    view(&generation.inventory)
}

async fn vrops_list_handler(State(ctx): State<SharedContext>) -> Json<Vec<String>> {
    info!("Target listing request received");
    Json(ctx.store().targets().to_vec())
}

async fn iteration_handler(State(ctx): State<SharedContext>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        ctx.store().iteration().to_string(),
    )
}

async fn target_tokens_handler(State(ctx): State<SharedContext>) -> Response {
    render(&ctx.store().target_tokens())
}

#[derive(Deserialize)]
struct RegisterRequest {
    collector: String,
    metric_names: Vec<String>,
}

#[derive(Deserialize)]
struct MetricNameRequest {
    metric_name: String,
}

async fn register_collector_handler(
    State(ctx): State<SharedContext>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection),
    };
    info!(collector = %request.collector, "Collector registration received");
    let collectors = ctx
        .registry()
        .register(CollectorRegistration {
            collector: request.collector,
            metrics: request.metric_names,
        })
        .await;
    render(&json!({ "collectors registered": collectors }))
}

async fn registered_collectors_handler(State(ctx): State<SharedContext>) -> Response {
    let collectors = ctx.registry().collectors().await;
    render(&json!({ "collectors registered": collectors }))
}

async fn add_metric_name_handler(
    State(ctx): State<SharedContext>,
    payload: Result<Json<MetricNameRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request(rejection),
    };
    let metrics = ctx.registry().add_metric_name(request.metric_name).await;
    render(&json!({ "metrics": metrics }))
}

async fn metric_names_handler(State(ctx): State<SharedContext>) -> Response {
    render(&json!({ "metrics": ctx.registry().metric_names().await }))
}

async fn clear_metric_names_handler(State(ctx): State<SharedContext>) -> Response {
    info!("Clearing metric names");
    ctx.registry().clear_metric_names().await;
    render(&json!({ "metrics": [] }))
}

/// Start the HTTP server and serve until `shutdown` resolves
pub async fn start_server(
    listen_address: &str,
    app_context: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let router = create_router(Arc::new(app_context));

    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    info!("Server listening on {}", listen_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Run the sync loop and the HTTP server until `shutdown` resolves
///
/// Whichever way the server ends, the sync loop is stopped and joined before
/// returning, so a failed bind surfaces as an error instead of a headless loop.
pub async fn run(
    listen_address: &str,
    app_context: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let (stop_sync, sync_stopped) = watch::channel(false);
    let synchronizer = app_context.start(sync_stopped);

    let served = start_server(listen_address, app_context, shutdown).await;
    if let Err(e) = &served {
        error!(error = %e, "Server error");
    }

    stop_sync.send_replace(true);
    if let Err(e) = synchronizer.await {
        error!(error = %e, "Inventory synchronizer task failed");
    }
    served
}
