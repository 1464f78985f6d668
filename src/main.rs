use anyhow::{Context, Result};
use clap::Parser;
use dnssd_client::{MdnsClient, TxtRecord};
use dnssd_harness::{HarnessConfig, Session};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// dnssd-exerciser - one-shot exercise run against the local DNS-SD facility
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to an optional YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the run timeout (seconds)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Skip resolving repeat appearances of an instance already seen
    #[arg(long)]
    dedup_resolves: bool,
}

fn load_config(args: &Args) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {:?}", path))?;
            serde_yaml::from_str(&content).context("failed to parse config file")?
        }
        None => HarnessConfig::default(),
    };

    if let Some(timeout_secs) = args.timeout_secs {
        config.run_timeout_secs = timeout_secs;
    }
    if args.dedup_resolves {
        config.dedup_resolves = true;
    }

    Ok(config)
}

/// Exercises the attribute-record codec once and logs the outcome,
/// the same way the run's resolve step will decode live records.
fn exercise_txt_codec() -> Result<()> {
    let src = [6, b'a', b't', b'=', b'X', b'Y', b'Z'];
    let mut txt = TxtRecord::decode(&src).context("attribute record self-check failed")?;
    txt.set("path", "~/names");
    txt.set("ttl", "4");

    let pairs: Vec<String> = txt
        .iter()
        .map(|(key, value)| {
            let value = value
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            format!("{}={}", key, value)
        })
        .collect();
    info!(
        count = txt.len(),
        encoded_len = txt.encode().len(),
        pairs = %pairs.join(" "),
        ttl_present = txt.contains("ttl"),
        timeout_present = txt.contains("timeout"),
        "attribute record codec exercised"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(host = %host, "starting dns-sd exercise run");

    exercise_txt_codec()?;

    let client = Arc::new(MdnsClient::new().context("failed to create discovery client")?);
    let session = Arc::new(Session::new(client, config.clone())?);
    session.start().context("failed to start exercise session")?;

    let last = session.current_stage();
    match tokio::time::timeout(config.run_timeout(), session.wait_for_change(last)).await {
        Ok(stage) => info!(
            stage,
            failures = session.failure_count(),
            "exercise run concluded"
        ),
        Err(_) => warn!(
            timeout_secs = config.run_timeout_secs,
            failures = session.failure_count(),
            "exercise run did not conclude before the timeout"
        ),
    }

    session.stop();
    Ok(())
}
