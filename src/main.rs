use bundle_rescue::utils::load_from_file;
use bundle_rescue::{
    BundleError, BundlePipeline, ChainClient, EthereumClient, FlashbotsRelay, Identities, OuterSupervisor, RescueConfig,
    RescueStrategy, RetryPolicy, SignerRole, StrategyFile,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run() -> eyre::Result<u8> {
    let config = RescueConfig::from_env()?;
    info!(?config, "Configuration loaded");

    let strategy_file: StrategyFile = load_from_file(config.strategy_config_path.clone())
        .await
        .map_err(BundleError::from)?;

    let chain = Arc::new(EthereumClient::from_config(&config)?);
    let strategy = RescueStrategy::new(
        strategy_file.strategy,
        config.executor_key.address(),
        config.recipient,
        Arc::clone(&chain) as Arc<dyn ChainClient>,
    )?;

    let relay = Arc::new(FlashbotsRelay::from_config(&config, Arc::clone(&chain))?);
    let pipeline = BundlePipeline::from_config(&config, chain, relay, Arc::new(strategy));
    let identities = Identities::from_config(&config);
    info!(
        sponsor = %identities.address(SignerRole::Sponsor),
        executor = %identities.address(SignerRole::Executor),
        recipient = %config.recipient,
        "Starting bundle rescue"
    );

    let outcome = OuterSupervisor::new(pipeline, RetryPolicy::from_config(&config)).run().await?;
    info!(?outcome, "Done");
    Ok(outcome.exit_code())
}

