use anyhow::Result;
use clap::Parser;
use rendermux_cli::commands;
use rendermux_cli::{Cli, Commands, RendermuxConfig};
use rendermux_core::TokioScheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let mut config = RendermuxConfig::load(cli.config.as_deref())?;
    debug!(?config, "Configuration loaded");

    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Detect {
            input,
            origin,
            json,
        } => {
            let sample = commands::sample(commands::read_input(&input)?, origin.map(Into::into));
            commands::detect(&config, &sample, json, &mut stdout)?;
        }

        Commands::Render { input, origin } => {
            let sample = commands::sample(commands::read_input(&input)?, origin.map(Into::into));
            let orchestrator =
                commands::build_orchestrator(&config, Arc::new(TokioScheduler::new()?))?;
            let errored = commands::render(&orchestrator, &sample, &mut stdout).await?;
            if errored {
                std::process::exit(2);
            }
        }

        Commands::Stream {
            input,
            chunk_size,
            delay_ms,
            pre_buffer,
            throttle_ms,
            origin,
        } => {
            config.apply_stream_overrides(pre_buffer, throttle_ms);
            config.validate()?;

            let text = commands::read_input(&input)?;
            let orchestrator =
                commands::build_orchestrator(&config, Arc::new(TokioScheduler::new()?))?;
            let report = commands::stream(
                &orchestrator,
                &text,
                origin.map(Into::into),
                chunk_size as usize,
                Duration::from_millis(delay_ms),
                &mut stdout,
            )
            .await?;

            let summary = &report.summary;
            debug!(
                stream_id = %summary.stream_id,
                category = %report.category,
                renderer = %report.renderer,
                state = %summary.state,
                errored = summary.errored,
                "Stream finished"
            );
            if summary.errored {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("rendermux=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rendermux=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
