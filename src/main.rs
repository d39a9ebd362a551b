//! Satisfaction pipeline - main entry point

use clap::Parser;
use satisfaction_pipeline::cli::{
    cmd_compare, cmd_evaluate, cmd_ingest, cmd_predict, cmd_run, cmd_train, load_config, Cli, Commands,
};
use satisfaction_pipeline::pipeline::PipelineRunner;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "satisfaction_pipeline=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let runner = PipelineRunner::new(config);

    match cli.command {
        Commands::Ingest => cmd_ingest(&runner)?,
        Commands::Train => cmd_train(&runner)?,
        Commands::Evaluate => cmd_evaluate(&runner)?,
        Commands::Compare => cmd_compare(&runner)?,
        Commands::Predict { input, output } => cmd_predict(&runner, &input, output.as_deref())?,
        Commands::Run => cmd_run(&runner)?,
    }

    Ok(())
}
