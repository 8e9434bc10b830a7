use clap::Parser;
use teamhire::cli::{
    Args, build_config, build_oauth_settings, init_logging, load_jwt_secret, open_database,
    validate_public_url,
};
use teamhire::{init_cleanup, run_server};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(jwt_secret) = load_jwt_secret(args.jwt_secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(public_url) = validate_public_url(&args.public_url) else {
        std::process::exit(1);
    };

    let oauth = build_oauth_settings(&args.oauth, &public_url).unwrap_or_else(|e| {
        error!(error = %e, "Invalid OAuth2 configuration");
        std::process::exit(1);
    });
    if oauth.is_none() {
        info!("No OAuth2 provider configured, login is disabled");
    }

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    init_cleanup(&db).await;

    let config = build_config(
        db,
        &public_url,
        jwt_secret,
        args.access_token_ttl,
        args.refresh_token_ttl,
        oauth,
    );

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(_) => info!(address = %addr, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
