//! Command handlers.

use crate::config::AggregatorConfig;
use console::style;
use jobrun_cache::{CacheBuilder, rebuild_index};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Token cancelled on Ctrl-C or once `timeout_secs` elapse.
pub fn cancellation_token(timeout_secs: Option<u64>) -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        let deadline = async {
            match timeout_secs {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            _ = trigger.cancelled() => return,
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
                warn!("Interrupted, cancelling");
            }
            _ = deadline => warn!(timeout_secs, "Deadline reached, cancelling"),
        }
        trigger.cancel();
    });
    cancel
}

/// Cache recent runs of the configured job.
pub async fn cache(config: &AggregatorConfig) -> anyhow::Result<()> {
    config.validate()?;
    let store = config.object_store()?;
    let cancel = cancellation_token(config.timeout_secs);

    println!(
        "{} Caching job runs of {}",
        style("▶").cyan(),
        style(&config.job_name).bold()
    );

    let builder = CacheBuilder::new(store, config.builder_options());
    let summary = builder.run(&cancel).await;
    cancel.cancel();
    let summary = summary?;

    println!(
        "{} Cached {} of {} runs into {}",
        style("✓").green(),
        summary.cached,
        summary.discovered,
        config.working_dir.display()
    );
    println!("  by-name entries: {}", summary.indexed);
    Ok(())
}

/// Rebuild the by-name index of the configured job.
pub async fn index(config: &AggregatorConfig) -> anyhow::Result<()> {
    if config.job_name.trim().is_empty() {
        return Err(jobrun_core::Error::Config("job name must not be empty".to_string()).into());
    }
    let cancel = cancellation_token(config.timeout_secs);

    let indexed = rebuild_index(&config.working_dir, &config.job_name, &cancel).await;
    cancel.cancel();
    let indexed = indexed?;

    println!(
        "{} Wrote {} by-name entries for {}",
        style("✓").green(),
        indexed,
        style(&config.job_name).bold()
    );
    Ok(())
}

/// Show effective configuration.
pub fn show_config(config: &AggregatorConfig) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&config.redacted())?);

    if let Ok(path) = AggregatorConfig::config_path() {
        println!("\n# Config file: {}", path.display());
    }
    Ok(())
}
