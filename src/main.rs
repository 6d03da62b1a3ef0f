use std::future::IntoFuture;
use std::process;
use std::sync::Arc;

use clap::Parser;
use pixie::{
    application::{
        AccountService, AppError, ContentService, FeedService, MutationService, SearchService,
        StatsService,
        repos::{
            BlogsRepo, BlogsWriteRepo, CommentsRepo, CommentsWriteRepo, EngagementRepo,
            FollowsRepo, StatsRepo, UsersRepo,
        },
    },
    cache::{CacheInvalidator, CacheTrigger, EventQueue, ObjectCache},
    config::{self, CliArgs, Settings},
    infra::{
        auth::HttpTokenVerifier,
        compose::{GeminiComposer, SocialComposer},
        db::PostgresRepositories,
        error::InfraError,
        http::{AppState, build_router},
        telemetry,
        uploads::FsImageStore,
    },
};
use tokio::signal;
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        report_application_error(&err);
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
    let cli = CliArgs::parse();
    let settings = config::load(&cli)
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let repositories = init_repositories(&settings).await?;
    let state = build_state(repositories, &settings)?;

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(addr = %settings.server.addr, "listening");

    let grace = settings.server.graceful_shutdown;
    let signalled = Arc::new(Notify::new());
    let on_signal = signalled.clone();
    let server = axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            on_signal.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result.map_err(InfraError::from)?,
        () = signalled.notified() => {
            // The drain is bounded; a hung client must not block exit.
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result.map_err(InfraError::from)?,
                Err(_) => warn!(
                    grace_secs = grace.as_secs(),
                    "graceful shutdown timed out, closing remaining connections"
                ),
            }
        }
    }

    info!("shutdown complete");
    Ok(())
}

async fn init_repositories(settings: &Settings) -> Result<PostgresRepositories, AppError> {
    let pool = PostgresRepositories::connect(
        &settings.database.url,
        settings.database.max_connections.get(),
    )
    .await
    .map_err(|err| InfraError::database(format!("failed to connect: {err}")))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| InfraError::database(format!("failed to run migrations: {err}")))?;

    Ok(PostgresRepositories::new(pool))
}

fn build_state(
    repositories: PostgresRepositories,
    settings: &Settings,
) -> Result<AppState, AppError> {
    let blogs: Arc<dyn BlogsRepo> = Arc::new(repositories.clone());
    let blogs_write: Arc<dyn BlogsWriteRepo> = Arc::new(repositories.clone());
    let comments: Arc<dyn CommentsRepo> = Arc::new(repositories.clone());
    let comments_write: Arc<dyn CommentsWriteRepo> = Arc::new(repositories.clone());
    let engagement: Arc<dyn EngagementRepo> = Arc::new(repositories.clone());
    let follows: Arc<dyn FollowsRepo> = Arc::new(repositories.clone());
    let users: Arc<dyn UsersRepo> = Arc::new(repositories.clone());
    let stats_repo: Arc<dyn StatsRepo> = Arc::new(repositories.clone());

    let store = Arc::new(ObjectCache::new(&settings.cache));
    let queue = Arc::new(EventQueue::new());
    let invalidator = Arc::new(CacheInvalidator::new(
        settings.cache.clone(),
        store.clone(),
        queue.clone(),
    ));
    let trigger = Arc::new(CacheTrigger::new(settings.cache.clone(), queue, invalidator));

    let verify_url = reqwest::Url::parse(&settings.auth.verify_url)
        .map_err(|err| InfraError::configuration(format!("auth.verify_url: {err}")))?;
    let verifier = Arc::new(HttpTokenVerifier::new(verify_url)?);

    let composer: Option<Arc<dyn SocialComposer>> = match (
        settings.compose.endpoint.as_ref(),
        settings.compose.api_key.as_ref(),
    ) {
        (Some(endpoint), Some(api_key)) => {
            let endpoint = reqwest::Url::parse(endpoint)
                .map_err(|err| InfraError::configuration(format!("compose.endpoint: {err}")))?;
            Some(Arc::new(GeminiComposer::new(endpoint, api_key.clone())?))
        }
        _ => {
            info!("social composition disabled: no endpoint configured");
            None
        }
    };

    let images = Arc::new(FsImageStore::new(
        settings.uploads.directory.clone(),
        settings.uploads.url_prefix.clone(),
    ));

    Ok(AppState {
        content: Arc::new(ContentService::new(
            blogs.clone(),
            comments.clone(),
            store.clone(),
        )),
        feeds: Arc::new(FeedService::new(
            blogs.clone(),
            follows.clone(),
            engagement.clone(),
        )),
        search: Arc::new(SearchService::new(
            blogs.clone(),
            users.clone(),
            store.clone(),
        )),
        stats: Arc::new(StatsService::new(stats_repo, store)),
        mutations: Arc::new(MutationService::new(
            blogs,
            blogs_write,
            comments,
            comments_write,
            engagement,
            follows,
            users.clone(),
            verifier.clone(),
            trigger,
        )),
        accounts: Arc::new(AccountService::new(users, verifier)),
        images,
        composer,
        repositories,
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
