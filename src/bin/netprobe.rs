use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use netprobe::http::HttpGetScenario;
use netprobe::{ConsoleSink, Engine, MetricsSink, Orchestrator};

const DEFAULT_URL: &str = "http://example.com/";

#[derive(Parser, Debug)]
#[command(version, about = "Observable network probe")]
struct Args {
    /// URL to probe
    #[arg(value_name = "url", default_value = DEFAULT_URL)]
    url: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let scenario = match HttpGetScenario::new(&args.url) {
        Ok(scenario) => scenario,
        Err(err) => {
            eprintln!("invalid url: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let orch = Arc::new(Orchestrator::new());
    let metrics = Arc::new(MetricsSink::new());
    orch.attach(Arc::new(ConsoleSink));
    orch.attach(metrics.clone());

    let engine = Engine::new(orch.clone());
    engine.execute(Box::new(scenario));

    // Observe from this thread until the worker is done.
    while engine.is_running() {
        std::thread::sleep(Duration::from_millis(20));
    }
    engine.join();

    let summary = metrics.metrics();
    println!(
        "{} events observed, {} errors",
        summary.total_events, summary.errors
    );

    ExitCode::SUCCESS
}
