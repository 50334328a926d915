use clap::Parser;
use cricket::config::Config;
use cricket::scheduler::Scheduler;
use cricket::sink::{JsonSink, Sink, TracingSink};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    cricket::logging::init(config.json_logs);

    // reject bad durations before any family starts
    let intervals = config.intervals().map_err(|e| {
        error!(error = %e, "invalid configuration");
        e
    })?;

    let agent_id = config.resolved_agent_id();
    info!(agent_id = %agent_id, proc_root = %config.proc_root.display(), "cricket starting");

    let sink: Arc<dyn Sink> = if config.json_logs {
        Arc::new(JsonSink::stdout(agent_id))
    } else {
        Arc::new(TracingSink::new(agent_id))
    };
    let mut scheduler = Scheduler::new(sink, config.tick_limit());
    cricket::schedule_families(
        &mut scheduler,
        &intervals,
        &config.proc_root,
        config.ping_targets(),
        config.ping_count,
    );

    if scheduler.is_empty() {
        info!("no families enabled, nothing to do");
        return Ok(());
    }

    let reports = scheduler.wait().await?;
    info!(families = reports.len(), "all families finished");
    Ok(())
}
