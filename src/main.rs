use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod reconcile;
mod routes;
mod services;

use config::{AppConfig, Command};
use routes::routes::AppState;
use services::{
    asset_deleter::HttpAssetDeleter, identity_store::IdentityStore,
    moderation_service::ModerationService, photo_store::PhotoStore, role_service::RoleService,
    user_store::UserStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_moderation=info,tower_http=info".into()),
        )
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    tracing::info!(
        host = %cfg.host,
        port = cfg.port,
        database_url = %cfg.database_url,
        asset_store_url = %cfg.asset_store_url,
        "Starting photo-moderation"
    );

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url, cfg.max_connections).await?);

    match command {
        Command::Migrate => {
            db::run_migrations(&db).await?;
            tracing::info!("Database migration complete.");
            return Ok(());
        }
        Command::IssueToken(username) => {
            return issue_token(&cfg, IdentityStore::new(db.clone()), &username).await;
        }
        Command::Serve => {}
    }

    // --- Initialize core services ---
    let assets = Arc::new(HttpAssetDeleter::new(
        &cfg.asset_store_url,
        cfg.asset_timeout(),
    )?);
    let moderation = ModerationService::new(
        PhotoStore::new(db.clone()),
        UserStore::new(db.clone()),
        assets,
    );
    let state = AppState {
        db: db.clone(),
        moderation: moderation.clone(),
        roles: RoleService::new(IdentityStore::new(db.clone())),
        auth: auth::AuthKeys::from_secret(&cfg.jwt_secret),
    };

    if cfg.reconcile_interval_secs > 0 {
        tokio::spawn(reconcile::run_reconcile_loop(
            moderation,
            cfg.reconcile_interval_secs,
            Duration::from_secs(cfg.reconcile_stale_after_secs),
        ));
    }

    // --- Build router ---
    let app: Router = routes::routes::routes(state).layer(TraceLayer::new_for_http());

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Print a bearer token for `username` carrying the roles they hold right now.
async fn issue_token(cfg: &AppConfig, identity: IdentityStore, username: &str) -> Result<()> {
    let user = identity
        .find_by_username(username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user `{}` not found", username))?;
    let roles = identity.roles_of(&user).await?;
    let token = auth::AuthKeys::from_secret(&cfg.jwt_secret).issue(user.id, &user.username, roles)?;
    println!("{}", token);
    Ok(())
}
