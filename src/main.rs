use std::{process, sync::Arc, time::Duration};

use foglio::{
    application::{
        auth::AuthService,
        content::ContentService,
        error::AppError,
        feed::FeedService,
        repos::{
            PostsRepo, PostsWriteRepo, SessionsRepo, SettingsRepo, TagsRepo, TagsWriteRepo,
            UsersRepo,
        },
        settings::SettingsService,
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState},
        telemetry,
        uploads::UploadStorage,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const SESSION_REAP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    if settings.auth.uses_dev_secret() {
        warn!(
            target = "foglio::startup",
            "SECRET_KEY is unset; using the insecure development key"
        );
    }

    let repositories = init_repositories(&settings).await?;
    let state = build_app_state(repositories, &settings)?;

    state
        .auth
        .ensure_seed_admin(&settings.auth.seed_username, &settings.auth.seed_password)
        .await
        .map_err(|err| AppError::unexpected(format!("failed to seed admin user: {err}")))?;

    let reaper_handle = spawn_session_reaper(state.auth.clone());

    let result = serve_http(&settings, state).await;

    reaper_handle.abort();
    let _ = reaper_handle.await;

    result
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_app_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<AppState, AppError> {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let tags_repo: Arc<dyn TagsRepo> = repositories.clone();
    let tags_write_repo: Arc<dyn TagsWriteRepo> = repositories.clone();
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let sessions_repo: Arc<dyn SessionsRepo> = repositories.clone();
    let settings_repo: Arc<dyn SettingsRepo> = repositories.clone();

    let upload_storage = Arc::new(
        UploadStorage::new(
            settings.uploads.directory.clone(),
            settings.uploads.max_request_bytes,
        )
        .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let feed = Arc::new(FeedService::new(
        posts_repo.clone(),
        posts_write_repo.clone(),
        tags_repo.clone(),
    ));
    let content = Arc::new(ContentService::new(
        posts_repo,
        posts_write_repo,
        tags_repo,
        tags_write_repo,
    ));
    let auth = Arc::new(AuthService::new(
        users_repo,
        sessions_repo,
        settings.auth.session_ttl,
    ));
    let site_settings = Arc::new(SettingsService::new(settings_repo));

    let upload_body_limit = usize::try_from(settings.uploads.max_request_bytes)
        .map_err(|_| AppError::unexpected("upload limit exceeds usize"))?;

    Ok(AppState::new(
        feed,
        content,
        auth,
        site_settings,
        upload_storage,
        Some(repositories),
        settings.site.clone(),
        settings.pagination.clone(),
        upload_body_limit,
        &settings.auth.secret_key,
    ))
}

fn spawn_session_reaper(auth: Arc<AuthService>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_REAP_INTERVAL);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            match auth.reap_expired_sessions().await {
                Ok(0) => {}
                Ok(count) => info!(target = "foglio::sessions", count, "reaped expired sessions"),
                Err(err) => warn!(
                    target = "foglio::sessions",
                    error = %err,
                    "failed to reap expired sessions"
                ),
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "foglio::startup",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
