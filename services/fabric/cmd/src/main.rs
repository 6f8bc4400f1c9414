//! Fabric router binary.
//!
//! Reads controller events as JSON lines from a file or stdin, runs the
//! topology-aware forwarding engine over them and writes the resulting
//! switch commands as JSON lines to stdout.

use anyhow::Context;
use clap::Parser;
use fabric_routing::{MemoryFdb, PathResolver, Router, ShortestPathResolver, StaticPathResolver};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod controller;
mod logging;

use config::RouterSettings;
use controller::{read_events, run_router, write_commands, ChannelSender, EVENT_CHANNEL_CAPACITY};
use logging::FabricLogFormatter;

/// Topology-aware OpenFlow forwarding engine
#[derive(Parser, Debug)]
#[command(name = "fabric-router", version, about = "Topology-aware OpenFlow forwarding engine")]
struct Args {
    /// Base idle timeout for installed paths, in seconds [default: 60]
    #[arg(short = 'i', long, value_name = "TIMEOUT")]
    idle_timeout: Option<u16>,

    /// Hard timeout for installed paths, in seconds (0 = none)
    #[arg(long)]
    hard_timeout: Option<u16>,

    /// Priority for installed paths
    #[arg(long)]
    priority: Option<u16>,

    /// How long a learned host stays valid, e.g. 5m
    #[arg(long)]
    fdb_max_age: Option<humantime::Duration>,

    /// How often stale hosts are purged
    #[arg(long, default_value = "10s")]
    age_interval: humantime::Duration,

    /// JSON file of operator-pinned paths; shortest paths are used otherwise
    #[arg(long)]
    static_paths: Option<PathBuf>,

    /// Event input file (JSON lines); stdin when omitted
    #[arg(long)]
    events: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Configuration file path
    #[arg(long, default_value = "fabric.yaml")]
    config: PathBuf,
}

impl Args {
    /// Explicit flags win over file and environment
    fn apply_to(&self, settings: &mut RouterSettings) {
        if let Some(idle_timeout) = self.idle_timeout {
            settings.idle_timeout = idle_timeout;
        }
        if let Some(hard_timeout) = self.hard_timeout {
            settings.hard_timeout = hard_timeout;
        }
        if let Some(priority) = self.priority {
            settings.priority = priority;
        }
        if let Some(fdb_max_age) = &self.fdb_max_age {
            settings.fdb_max_age = **fdb_max_age;
        }
        if let Some(static_paths) = &self.static_paths {
            settings.static_paths = Some(static_paths.clone());
        }
    }
}

fn build_resolver(settings: &RouterSettings) -> anyhow::Result<Box<dyn PathResolver + Send>> {
    match &settings.static_paths {
        Some(path) => {
            let resolver = StaticPathResolver::from_file(path)
                .with_context(|| format!("failed to load static paths from {:?}", path))?;
            Ok(Box::new(resolver))
        }
        None => Ok(Box::new(ShortestPathResolver::new())),
    }
}

async fn open_events(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open event file {:?}", path))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
    }
}

async fn shutdown_signal() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received SIGINT"),
            Err(e) => {
                warn!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        },
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("info")
        .add_directive(format!("fabric_router={}", args.log_level).parse()?)
        .add_directive(format!("fabric_routing={}", args.log_level).parse()?)
        .add_directive(format!("fabric_topology={}", args.log_level).parse()?)
        .add_directive(format!("fabric_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(FabricLogFormatter::new("fabric"))
        .init();

    info!("Starting fabric router v{}", env!("CARGO_PKG_VERSION"));

    let mut settings = RouterSettings::load_from_file(&args.config)?;
    args.apply_to(&mut settings);

    let resolver = build_resolver(&settings)?;
    let input = open_events(args.events.as_ref()).await?;

    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let reader = tokio::spawn(read_events(input, event_tx));
    let writer = tokio::spawn(write_commands(command_rx, tokio::io::stdout()));

    let router = Router::new(
        MemoryFdb::new(settings.fdb_max_age),
        resolver,
        ChannelSender::new(command_tx),
        settings.router_config(),
    );

    info!(
        "Router started: idle_timeout={}s, fdb_max_age={:?}",
        settings.idle_timeout, settings.fdb_max_age
    );

    let router = run_router(
        router,
        event_rx,
        *args.age_interval,
        shutdown_signal(),
    )
    .await;

    let topology = router.topology().stats();
    info!(
        "Router stopped: {} switches, {} ports ({} forwarding)",
        topology.total_switches, topology.total_ports, topology.forwarding_ports
    );
    info!("Router stats: {}", serde_json::to_string(router.stats())?);

    // closes the command channel so the writer drains and exits
    drop(router);
    reader.abort();

    let written = writer.await??;
    info!("Fabric router shutdown complete ({} commands written)", written);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_defaults() {
        let args = Args::try_parse_from(["fabric-router"]).unwrap();
        assert_eq!(args.idle_timeout, None);
        assert_eq!(args.events, None);
        assert_eq!(*args.age_interval, Duration::from_secs(10));

        let mut settings = RouterSettings::default();
        args.apply_to(&mut settings);
        assert_eq!(settings, RouterSettings::default());
    }

    #[test]
    fn test_cli_flags_win() {
        let args = Args::try_parse_from([
            "fabric-router",
            "-i",
            "90",
            "--fdb-max-age",
            "2m",
            "--static-paths",
            "paths.json",
        ])
        .unwrap();

        let mut settings = RouterSettings {
            idle_timeout: 30,
            priority: 10,
            ..RouterSettings::default()
        };
        args.apply_to(&mut settings);

        assert_eq!(settings.idle_timeout, 90);
        assert_eq!(settings.priority, 10);
        assert_eq!(settings.fdb_max_age, Duration::from_secs(120));
        assert_eq!(settings.static_paths, Some(PathBuf::from("paths.json")));
    }

    #[test]
    fn test_idle_timeout_must_fit_u16() {
        assert!(Args::try_parse_from(["fabric-router", "--idle-timeout", "70000"]).is_err());
        assert!(Args::try_parse_from(["fabric-router", "-i", "-5"]).is_err());
    }

    #[test]
    fn test_build_resolver_from_static_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"[{"from":[1,1],"to":[2,2],"hops":[
                {"datapath_id":1,"in_port":1,"out_port":3},
                {"datapath_id":2,"in_port":1,"out_port":2}]}]"#,
        )
        .unwrap();

        let settings = RouterSettings {
            static_paths: Some(file.path().to_path_buf()),
            ..RouterSettings::default()
        };
        let resolver = build_resolver(&settings).unwrap();
        let topology = fabric_topology::SwitchDs::new();
        let hops = resolver.resolve(&topology, 1, 1, 2, 2).unwrap();
        assert_eq!(hops.len(), 2);

        let missing = RouterSettings {
            static_paths: Some(PathBuf::from("/nonexistent/paths.json")),
            ..RouterSettings::default()
        };
        assert!(build_resolver(&missing).is_err());
    }
}
