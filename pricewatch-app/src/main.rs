use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use pricewatch_common::observability::init_logging;
use std::fs::File;
use std::io::{self, BufWriter, Write};

mod batch;
mod cli;
mod commands;
mod pipeline;
mod render;
mod wiring;

#[cfg(test)]
mod test_support;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Config: defaults < file < PRICEWATCH__* env
    let cfg = wiring::load_config(cli.config.as_deref())?;

    // 2) Logging: config section, CLI flags win
    let log_path = init_logging(wiring::log_config(&cfg.logging, &cli)?)?;
    tracing::info!(
        log = %log_path.display(),
        config_version = cfg.version.as_deref().unwrap_or("-"),
        "app.start"
    );

    let stdout = io::stdout();
    let stderr = io::stderr();
    match cli.command {
        Command::Search {
            query,
            pipeline,
            json,
        } => {
            let pipeline = wiring::build_pipeline(&cfg, &pipeline)?;
            commands::search_once(
                &pipeline,
                &query.join(" "),
                json,
                &mut stdout.lock(),
                &mut stderr.lock(),
            )
            .await
        }
        Command::Interactive { pipeline } => {
            let pipeline = wiring::build_pipeline(&cfg, &pipeline)?;
            commands::interactive(
                &pipeline,
                io::stdin().lock(),
                &mut stdout.lock(),
                &mut stderr.lock(),
            )
            .await
            .map(|_| ())
        }
        Command::Batch {
            input,
            output,
            pipeline,
        } => {
            let pipeline = wiring::build_pipeline(&cfg, &pipeline)?;
            let reader = File::open(&input)
                .with_context(|| format!("opening {}", input.display()))?;
            let writer: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path).with_context(|| format!("creating {}", path.display()))?,
                )),
                None => Box::new(stdout.lock()),
            };
            let summary = batch::run_batch(&pipeline, &cfg.batch, reader, writer).await?;
            writeln!(
                stderr.lock(),
                "{} rows: {} priced, {} without prices, {} failed, {} skipped",
                summary.rows,
                summary.priced,
                summary.empty,
                summary.failed,
                summary.skipped
            )?;
            Ok(())
        }
        Command::Selectors => commands::list_selectors(&cfg, &mut stdout.lock()),
    }
}
