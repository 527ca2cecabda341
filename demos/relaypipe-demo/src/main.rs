//! relaypipe-demo — a runnable illustration of the facade API: a three-stage
//! arithmetic pipeline, fed `--count` integers and printed as they drain.
//!
//! Not part of the library's contract (see `relaypipe`'s crate docs) — this
//! is the same kind of thin CLI wrapper `ingest-worker` is over the ingest
//! library, just for the pipeline facade instead.

use clap::Parser;
use futures::StreamExt;
use tracing::info;

use relaypipe::{Pipeline, PipelineDefaults, TransformError, TransformOutput};

/// Feed `--count` integers through `(x+1, x-3, x*5)` and print the results.
#[derive(Parser, Debug)]
#[command(name = "relaypipe-demo", version, about)]
struct Cli {
    /// How many integers (0..count) to feed into the pipeline.
    #[arg(long, default_value_t = 100)]
    count: i64,

    /// Optional `relaypipe.toml` with a `[pipeline]` table of defaults.
    #[arg(long, env = "RELAYPIPE_CONFIG")]
    config: Option<String>,

    /// Worker count for every stage that doesn't set its own.
    #[arg(long)]
    workers: Option<usize>,
}

fn one<T>(v: T) -> Result<TransformOutput<T>, TransformError> {
    Ok(TransformOutput::One(v))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut defaults = match &cli.config {
        Some(path) => match PipelineDefaults::from_file(path) {
            Ok(defaults) => {
                info!(path, "loaded pipeline defaults");
                defaults
            }
            Err(e) => {
                tracing::warn!(error = %e, path, "failed to load config, using built-in defaults");
                PipelineDefaults::default()
            }
        },
        None => PipelineDefaults::from_env(),
    };
    if let Some(workers) = cli.workers {
        defaults.workers = Some(workers);
    }

    let mut pipe: Pipeline<i64> = Pipeline::with_config(None::<String>, defaults);
    pipe.add_origin(
        "source",
        |up_to: i64| -> Result<TransformOutput<i64>, TransformError> {
            Ok(TransformOutput::Many(Box::new(0..up_to)))
        },
        Some(1),
        None,
    )?;
    pipe.add_task("plus-one", |v: i64| one(v + 1), None, None)?;
    pipe.add_task("minus-three", |v: i64| one(v - 3), None, None)?;
    pipe.add_destination("times-five", |v: i64| one(v * 5), None, None)?;

    pipe.start()?;
    pipe.feed(cli.count).await?;
    pipe.join().await?;

    let mut output: Vec<i64> = pipe.as_completed()?.collect().await;
    output.sort_unstable();
    info!(produced = output.len(), "pipeline drained");
    println!("{output:?}");
    Ok(())
}
