use crate::handlers::{hosts, jobs, projects, snapshots, targets, volumes};
use crate::AppState;
use axum::routing::{get, post, put};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tower_http::validate_request::ValidateRequestHeaderLayer;
use tracing::info;

/// Default port of the storage API
pub const DEFAULT_PORT: u16 = 10987;

/// Credentials required on `/api` routes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// API server configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Address to listen on
    pub listen_addr: SocketAddr,

    /// Basic authentication; `None` leaves the API open
    pub auth: Option<BasicCredentials>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            auth: None,
        }
    }
}

/// API server
pub struct ApiServer {
    config: Config,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: Config, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let project = "/api/v1/storage/domains/{domain}/pools/{pool}/projects/{project}";
        let volume = format!("{project}/volumes/{{volume}}");
        let snapshot = format!("{volume}/snapshots/{{snapshot}}");

        let api = Router::new()
            // Projects
            .route(
                "/api/v1/storage/domains/{domain}/pools/{pool}/projects",
                get(projects::list_projects),
            )
            .route(
                project,
                get(projects::get_project)
                    .post(projects::create_project)
                    .put(projects::modify_project)
                    .delete(projects::delete_project),
            )
            .route(&format!("{project}/exists"), get(projects::project_exists))
            .route(
                &format!("{project}/force"),
                axum::routing::delete(projects::force_delete_project),
            )
            // Volumes
            .route(
                &format!("{project}/volumes"),
                get(volumes::list_volumes).post(volumes::create_volume),
            )
            .route(
                &volume,
                get(volumes::get_volume).delete(volumes::delete_volume),
            )
            .route(&format!("{volume}/resize"), put(volumes::resize_volume))
            .route(
                &format!("{volume}/compression/{{compression}}"),
                put(volumes::set_compression),
            )
            .route(&format!("{volume}/online"), put(volumes::online_volume))
            .route(&format!("{volume}/offline"), put(volumes::offline_volume))
            .route(&format!("{volume}/export"), put(volumes::export_volume))
            .route(
                &format!("{volume}/exports"),
                get(volumes::list_exports).delete(volumes::unexport_all),
            )
            .route(&format!("{volume}/unexport"), put(volumes::unexport_volume))
            // Snapshots
            .route(
                &format!("{volume}/snapshots"),
                get(snapshots::list_snapshots),
            )
            .route(
                &snapshot,
                get(snapshots::get_snapshot)
                    .post(snapshots::create_snapshot)
                    .delete(snapshots::delete_snapshot),
            )
            .route(&format!("{snapshot}/rollback"), put(snapshots::rollback))
            .route(
                &format!("{snapshot}/clone"),
                post(snapshots::clone_snapshot),
            )
            // Host groups
            .route("/api/v1/storage/hosts", get(hosts::list_host_groups))
            .route(
                "/api/v1/storage/hosts/{name}",
                get(hosts::get_host_group)
                    .post(hosts::create_host_group)
                    .delete(hosts::delete_host_group),
            )
            .route(
                "/api/v1/storage/hosts/{name}/add/{member}",
                put(hosts::add_member),
            )
            .route(
                "/api/v1/storage/hosts/{name}/add/{member}/force",
                put(hosts::force_add_member),
            )
            .route(
                "/api/v1/storage/hosts/{name}/remove/{member}",
                put(hosts::remove_member),
            )
            // Target groups
            .route(
                "/api/v1/storage/targets/tg",
                get(targets::list_target_groups),
            )
            .route(
                "/api/v1/storage/targets/tg/{name}",
                get(targets::get_target_group)
                    .post(targets::create_target_group)
                    .delete(targets::delete_target_group),
            )
            .route(
                "/api/v1/storage/targets/tg/{name}/add/{member}",
                put(targets::add_target_group_member),
            )
            .route(
                "/api/v1/storage/targets/tg/{name}/remove/{member}",
                put(targets::remove_target_group_member),
            )
            // Target port groups
            .route(
                "/api/v1/storage/targets/tpg",
                get(targets::list_port_groups),
            )
            .route(
                "/api/v1/storage/targets/tpg/{name}",
                get(targets::get_port_group)
                    .post(targets::create_port_group)
                    .delete(targets::delete_port_group),
            )
            .route(
                "/api/v1/storage/targets/tpg/{name}/force",
                axum::routing::delete(targets::force_delete_port_group),
            )
            // Targets
            .route(
                "/api/v1/storage/targets",
                get(targets::list_targets).post(targets::create_target),
            )
            .route(
                "/api/v1/storage/targets/{iqn}",
                get(targets::get_target)
                    .post(targets::create_named_target)
                    .delete(targets::delete_target),
            )
            .route(
                "/api/v1/storage/targets/{iqn}/force",
                axum::routing::delete(targets::force_delete_target),
            )
            // Jobs
            .route("/api/v1/storage/jobs/{id}", get(jobs::get_job));

        let api = match &self.config.auth {
            Some(credentials) => {
                #[allow(deprecated)]
                let layer =
                    ValidateRequestHeaderLayer::basic(&credentials.username, &credentials.password);
                api.layer(layer)
            }
            None => api,
        };

        Router::new()
            .route("/healthz", get(healthz))
            .merge(api)
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), std::io::Error> {
        let app = self.build_router();

        info!("Starting API server on {}", self.config.listen_addr);
        if self.config.auth.is_none() {
            info!("Basic authentication disabled");
        }

        let listener = TcpListener::bind(self.config.listen_addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    }
}

/// Health check endpoint
async fn healthz() -> &'static str {
    "ok"
}
