//!
//! tablegate server binary
//! -----------------------
//! Command-line entry point for the tablegate HTTP gateway. Settings come from an
//! optional JSON config file, environment variables and CLI flags (highest wins).

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use tablegate::config::{ConfigOverrides, GatewayConfig};

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn cli_overrides(args: &[String]) -> ConfigOverrides {
    ConfigOverrides {
        http_port: arg_value(args, "--http-port").and_then(|v| v.parse().ok()),
        bind_addr: arg_value(args, "--bind"),
        chunk_size: arg_value(args, "--chunk-size").and_then(|v| v.parse().ok()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("tablegate Server\n\nUSAGE:\n  tablegate_server [--config PATH] [--http-port N] [--bind ADDR] [--chunk-size N]\n  tablegate_server --hash-secret SECRET\n\nOPTIONS:\n  --config PATH       JSON config file (env: TABLEGATE_CONFIG)\n  --http-port N       HTTP port (env: TABLEGATE_HTTP_PORT, default 5000)\n  --bind ADDR         Bind address (env: TABLEGATE_BIND, default 0.0.0.0)\n  --chunk-size N      Rows per CSV chunk (env: TABLEGATE_CHUNK_SIZE, default 100000)\n  --hash-secret S     Print an argon2 PHC string for the credentials table and exit\n");
        return Ok(());
    }

    if let Some(secret) = arg_value(&args, "--hash-secret") {
        println!("{}", tablegate::identity::hash_secret(&secret)?);
        return Ok(());
    }

    println!(r"  __        __    __                 __
 / /_____ _/ /_  / /__  ____ _____ _/ /____
/ __/ __ `/ __ \/ / _ \/ __ `/ __ `/ __/ _ \
/ /_/ /_/ / /_/ / /  __/ /_/ / /_/ / /_/  __/
\__/\__,_/_.___/_/\___/\__, /\__,_/\__/\___/
                      /____/");

    // RUST_LOG wins; info otherwise
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config_path = arg_value(&args, "--config")
        .or_else(|| env::var("TABLEGATE_CONFIG").ok())
        .map(PathBuf::from);
    let mut cfg = match &config_path {
        Some(path) => GatewayConfig::load(path).with_context(|| format!("While loading config {}", path.display()))?,
        None => {
            tracing::warn!(target: "startup", "no config file given; every identity will be denied");
            GatewayConfig::default()
        }
    };
    cfg.apply(&ConfigOverrides::from_env().merge(cli_overrides(&args)));

    println!("tablegate starting: bind={}, http={}, config={:?}", cfg.bind_addr, cfg.http_port, config_path);
    tablegate::server::run_with_config(cfg).await
}
