use std::sync::Arc;
use tracing::{error, info};

use caixa::application::Dispatcher;
use caixa::config::AppConfig;
use caixa::infrastructure::ledger::AccountLedger;
use caixa::infrastructure::logging::init_logging;
use caixa::infrastructure::metrics::ServerMetrics;
use caixa::infrastructure::server::Server;
use caixa::infrastructure::store::JsonFileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = init_logging(None).map_err(|err| anyhow::anyhow!(err.to_string()))?;

    let config = AppConfig::from_env();
    info!("Iniciando servidor bancário na porta {}", config.port);

    let store = JsonFileStore::new(&config.accounts_file);
    let ledger = Arc::new(AccountLedger::from_store(&store).await?);
    let metrics = ServerMetrics::new();
    let dispatcher = Arc::new(Dispatcher::new(ledger, Arc::clone(&metrics)));

    let server = Server::bind(&config, dispatcher, Arc::clone(&metrics)).await?;
    let _reporter =
        metrics.spawn_reporter(config.metrics_report_interval, server.shutdown_token());

    // SIGINT stops accepting, closes every live connection, and releases
    // the port.
    let handle = server.handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Sinal de encerramento recebido");
                handle.shutdown();
            }
            Err(err) => error!("Falha ao instalar handler de sinal: {}", err),
        }
    });

    server.run().await?;
    Ok(())
}
