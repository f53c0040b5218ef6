use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookship::config::Config;
use bookship::crypto::ClaimKey;
use bookship::db::{create_pool, init_db, queries, AppState};
use bookship::email::EmailService;
use bookship::handlers;
use bookship::models::CreateProduct;
use bookship::payments::{SettleLocks, XenditClient};

#[derive(Parser, Debug)]
#[command(name = "bookship")]
#[command(about = "E-book store backend")]
struct Cli {
    /// Seed the database with a dev product (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Print a freshly generated claim master key and exit
    #[arg(long)]
    gen_key: bool,
}

/// Seeds the database with a sample product for local testing.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))
        .expect("Failed to count products");
    if existing > 0 {
        tracing::info!("Database already has products, skipping seed");
        return;
    }

    let product = queries::create_product(
        &conn,
        &CreateProduct {
            title: "The Pragmatic Sourdough".to_string(),
            description: "A field guide to baking under deadline pressure.".to_string(),
            original_price: 150_000,
            discount_price: 99_000,
            image: "sourdough.png".to_string(),
            zip_path: "sourdough.zip".to_string(),
            is_offer: true,
        },
    )
    .expect("Failed to create dev product");

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED");
    tracing::info!("Product: {} (id: {})", product.title, product.id);
    tracing::info!("Price: {} -> {}", product.original_price, product.discount_price);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.gen_key {
        println!("{}", ClaimKey::generate());
        return;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookship=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration - refuses to serve with anything missing
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    // Create database connection pool and schema
    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let gateway = XenditClient::new(
        config.gateway_api_key.clone(),
        config.success_redirect_url.clone(),
        config.failure_redirect_url.clone(),
    );
    let mailer = EmailService::new(
        config.mail_api_key.clone(),
        config.mail_from.clone(),
        config.mail_subject.clone(),
    );

    let state = AppState {
        db: db_pool,
        gateway: Arc::new(gateway),
        mailer: Arc::new(mailer),
        claim_key: config.claim_key.clone(),
        callback_token: config.callback_token.clone(),
        server_origin: config.server_origin.clone(),
        frontend_origin: config.frontend_origin.clone(),
        zip_dir: config.zip_dir.clone(),
        settle_locks: Arc::new(SettleLocks::default()),
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set BOOKSHIP_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    // Build the application router
    let app = Router::new()
        .merge(handlers::router())
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Bookship server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
