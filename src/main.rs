//! ae-anomaly command-line entry point

use autoencoder_anomaly::cli::{cmd_fit, cmd_predict, cmd_search, Cli, Commands};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autoencoder_anomaly=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fit {
            data,
            label,
            model,
            encoder,
            decoder,
            hidden,
            latent,
            test_ratio,
            train,
            output,
        } => {
            cmd_fit(
                &data,
                &label,
                model,
                &encoder,
                &decoder,
                hidden,
                latent,
                test_ratio,
                &train,
                output.as_deref(),
            )?;
        }
        Commands::Predict { model, kind, data, label, output } => {
            cmd_predict(&model, kind, &data, label.as_deref(), output.as_deref())?;
        }
        Commands::Search {
            data,
            label,
            pairs,
            test_ratio,
            hidden,
            latent,
            k,
            train,
            output,
        } => {
            cmd_search(&data, &label, pairs, test_ratio, hidden, latent, k, &train, output.as_deref())?;
        }
    }

    Ok(())
}
