use presence_monitor::config::MonitorConfig;
use presence_monitor::{presence_monitor, MonitorError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), MonitorError> {
    // construct a subscriber that prints formatted traces to stderr,
    // leaving stdout to the status stream
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    // use that subscriber to process traces emitted after this point
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global tracing subscriber.");

    let config = MonitorConfig::from_env()?;
    presence_monitor(config).await
}
