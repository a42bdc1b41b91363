//! relaymq dispatcher demo - binds a broker and submits a handful of
//! requests against whatever workers connect to it.
//!
//! Usage: cargo run -p relaymq-dispatcher-demo -- [OPTIONS]
//!
//! Options:
//!   -e, --endpoint <ENDPOINT>  ROUTER bind endpoint [default: from relaymq config]
//!   -n, --count <N>            Number of requests to submit [default: 5]
//!   -w, --wait-workers <MS>    Milliseconds to wait for a worker before submitting [default: 2000]
//!
//! The bind endpoint and request timeout fall back to `RelaymqConfig::load()`
//! (see `relaymq-config`) when not given on the command line, so an operator
//! can point every dispatcher/worker pair at the same `relaymq.toml` instead
//! of repeating `--endpoint` everywhere.

use std::time::Duration;

use bytes::Bytes;
use relaymq_config::RelaymqConfig;
use relaymq_dispatcher::Dispatcher;

fn parse_args(default_endpoint: &str) -> (String, usize, u64) {
    let args: Vec<String> = std::env::args().collect();
    let mut endpoint = default_endpoint.to_string();
    let mut count = 5usize;
    let mut wait_workers_ms = 2000u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-e" | "--endpoint" => {
                i += 1;
                if i < args.len() {
                    endpoint = args[i].clone();
                }
            }
            "-n" | "--count" => {
                i += 1;
                if i < args.len() {
                    count = args[i].parse().unwrap_or(5);
                }
            }
            "-w" | "--wait-workers" => {
                i += 1;
                if i < args.len() {
                    wait_workers_ms = args[i].parse().unwrap_or(2000);
                }
            }
            "-h" | "--help" => {
                println!("relaymq dispatcher demo");
                println!();
                println!("Usage: cargo run -p relaymq-dispatcher-demo -- [OPTIONS]");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    (endpoint, count, wait_workers_ms)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = RelaymqConfig::load().unwrap_or_default();
    let (endpoint, count, wait_workers_ms) = parse_args(&config.dispatcher_bind);

    println!("binding dispatcher at {endpoint}");
    let dispatcher =
        Dispatcher::bind_with_config(&endpoint, config.request_timeout(), config.inactivity_cutoff())
            .await?;

    println!("waiting up to {wait_workers_ms}ms for a worker to connect...");
    let deadline = tokio::time::Instant::now() + Duration::from_millis(wait_workers_ms);
    while dispatcher.active_worker_count().await == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let workers = dispatcher.active_worker_count().await;
    println!("{workers} worker(s) connected");
    if workers == 0 {
        println!("no workers connected, submitting anyway to demonstrate the NoWorkers error");
    }

    for i in 0..count {
        let correlation_id = Bytes::from(format!("demo-{i}"));
        let payload = Bytes::from(format!("job-{i}"));
        match dispatcher.submit(correlation_id, payload).await {
            Ok(deferred) => match tokio::time::timeout(Duration::from_secs(5), deferred).await {
                Ok(Ok(Ok(reply))) => {
                    println!("  request {i}: {}", String::from_utf8_lossy(&reply));
                }
                Ok(Ok(Err(e))) => println!("  request {i}: failed: {e}"),
                Ok(Err(_)) => println!("  request {i}: deferred dropped"),
                Err(_) => println!("  request {i}: timed out waiting on the join handle"),
            },
            Err(e) => println!("  request {i}: rejected: {e}"),
        }
    }

    dispatcher.shutdown().await;
    Ok(())
}
