use std::fs;
use std::sync::Arc;
use storefront::api;
use storefront::logger::*;
use storefront::server::*;
use storefront::settings::*;
use tokio::signal;
use warp::Filter;

fn ensure_file(path: &str, what: &str) -> anyhow::Result<()> {
    if !fs::metadata(path)?.is_file() {
        return Err(anyhow::anyhow!("TLS {} is not a regular file: {:?}", what, path));
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("could not register SIGINT: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let address: std::net::SocketAddr = project_settings.http.address.parse()?;

    let server = Arc::new(Server::try_new(&project_settings).await?);

    let api_v1 = warp::path("api")
        .and(warp::path("v1"))
        .and(api::v1::routes(server.clone()))
        .recover(api::v1::recover_error);

    match (
        project_settings.http.cert_path.as_deref(),
        project_settings.http.key_path.as_deref(),
    ) {
        (Some(cert_path), Some(key_path)) => {
            ensure_file(cert_path, "cert")?;
            ensure_file(key_path, "key")?;
            info!(%address, "listening with TLS");
            warp::serve(api_v1)
                .tls()
                .cert_path(cert_path)
                .key_path(key_path)
                .bind_with_graceful_shutdown(address, shutdown_signal())
                .1
                .await;
        }
        (None, None) => {
            warn!(%address, "listening without TLS");
            let (_, serving) =
                warp::serve(api_v1).try_bind_with_graceful_shutdown(address, shutdown_signal())?;
            serving.await;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "http.cert_path and http.key_path must be set together"
            ));
        }
    }

    let shutdown_timeout = std::time::Duration::from_secs(100);
    match tokio::time::timeout(shutdown_timeout, server.shutdown()).await {
        Ok(_) => info!("server shutdown successfully"),
        Err(_) => error!("server shutdown timed out"),
    }

    Ok(())
}
