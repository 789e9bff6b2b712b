use crate::commands::handle_command;
use crate::config::Config;
use crate::db::{
    AnswerStore, MemoryAnswerStore, MemoryPollStore, PgAnswerRepository, PgPollRepository,
    PollStore, init_db, pool_stats,
};
use crate::polls::{VotingEngine, get_poll, reconcile_poll};
use axum::{
    Router,
    extract::Extension,
    http::{
        StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<VotingEngine>,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, sqlx::Error> {
        let (polls, answers): (Arc<dyn PollStore>, Arc<dyn AnswerStore>) =
            match &config.database_url {
                Some(url) => {
                    let pool = init_db(url, config.max_connections).await?;
                    info!("Connected to postgres. {}", pool_stats(&pool));
                    (
                        Arc::new(PgPollRepository::new(pool.clone())),
                        Arc::new(PgAnswerRepository::new(pool)),
                    )
                }
                None => {
                    warn!("DATABASE_URL is not set, polls are kept in memory");
                    (
                        Arc::new(MemoryPollStore::new()),
                        Arc::new(MemoryAnswerStore::new()),
                    )
                }
            };

        Ok(Self::with_stores(polls, answers, config))
    }

    pub fn with_stores(
        polls: Arc<dyn PollStore>,
        answers: Arc<dyn AnswerStore>,
        config: &Config,
    ) -> Self {
        AppState {
            engine: Arc::new(VotingEngine::new(polls, answers, config.store_timeout)),
        }
    }
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/commands", post(handle_command))
        .route("/polls/:poll_id", get(get_poll))
        .route("/polls/:poll_id/reconcile", post(reconcile_poll))
        .layer(Extension(app_state))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_methods([
                    axum::http::Method::POST,
                    axum::http::Method::GET,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([CONTENT_TYPE, ACCEPT]),
        )
        .layer(TraceLayer::new_for_http())
        .fallback(handler_404)
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
