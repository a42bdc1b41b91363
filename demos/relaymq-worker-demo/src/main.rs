//! relaymq worker demo - connects to a dispatcher and echoes every
//! request back wrapped as `Handled(<payload>)`, until Ctrl-C.
//!
//! Usage: cargo run -p relaymq-worker-demo -- [OPTIONS]
//!
//! Options:
//!   -e, --endpoint <ENDPOINT>   Dispatcher ROUTER endpoint [default: from relaymq config]
//!   -H, --heartbeat-ms <MS>     Idle heartbeat interval [default: from relaymq config]
//!
//! Falls back to `RelaymqConfig::load()` for the endpoint and heartbeat
//! interval when not given on the command line, same as the dispatcher demo.

use std::time::Duration;

use bytes::Bytes;
use relaymq_config::RelaymqConfig;
use relaymq_worker::Worker;

fn parse_args(default_endpoint: &str, default_heartbeat_ms: u64) -> (String, u64) {
    let args: Vec<String> = std::env::args().collect();
    let mut endpoint = default_endpoint.to_string();
    let mut heartbeat_ms = default_heartbeat_ms;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-e" | "--endpoint" => {
                i += 1;
                if i < args.len() {
                    endpoint = args[i].clone();
                }
            }
            "-H" | "--heartbeat-ms" => {
                i += 1;
                if i < args.len() {
                    heartbeat_ms = args[i].parse().unwrap_or(3000);
                }
            }
            "-h" | "--help" => {
                println!("relaymq worker demo");
                println!();
                println!("Usage: cargo run -p relaymq-worker-demo -- [OPTIONS]");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    (endpoint, heartbeat_ms)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = RelaymqConfig::load().unwrap_or_default();
    // The shared config's bind endpoint is a ROUTER bind address (may be
    // 0.0.0.0); a worker needs something it can connect *to*, so swap in
    // loopback unless the operator gave us an explicit endpoint.
    let default_endpoint = config.dispatcher_bind.replacen("0.0.0.0", "127.0.0.1", 1);
    let (endpoint, heartbeat_ms) = parse_args(&default_endpoint, config.heartbeat_interval_ms);

    println!("connecting worker to {endpoint}");
    let worker = Worker::connect_with_heartbeat(&endpoint, Duration::from_millis(heartbeat_ms)).await?;
    println!("connected as {}", String::from_utf8_lossy(worker.identity()));

    worker.set_request_handler(|payload: Bytes| {
        let mut out = b"Handled(".to_vec();
        out.extend_from_slice(&payload);
        out.push(b')');
        Bytes::from(out)
    });

    println!("serving requests, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    println!("shutting down");
    worker.unbind().await;
    Ok(())
}
