//! `imagegen` -- generate images from text prompts and manage recent history.
//!
//! # Environment variables
//!
//! | Variable           | Default                 | Description                  |
//! |--------------------|-------------------------|------------------------------|
//! | `IMAGEGEN_API_URL` | `http://localhost:8001` | Base URL of the image service |
//! | `RUST_LOG`         | `imagegen=info,...`     | Log filter (logs go to stderr) |

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use imagegen_cli::{export, Shell};
use imagegen_shared::api::DEFAULT_API_BASE_URL;
use imagegen_shared::{BackendStatus, Event, ImageCard, ImageId, IMAGE_DELETED_TOAST};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "imagegen")]
#[command(version)]
#[command(about = "Generate images from text prompts and manage the recent history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the image service
    #[arg(long, global = true, env = "IMAGEGEN_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a prompt
    Generate {
        prompt: String,

        /// Also write the image to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// List the most recent generations
    History,

    /// Delete a generation by id
    Delete { id: String },

    /// Write a generation from the recent history to a file
    Export { id: String, path: PathBuf },

    /// Check that the backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imagegen=info,imagegen_cli=info,imagegen_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let shell = Shell::new(&cli.api_url)?;
    let format = cli.format;

    match cli.command {
        Commands::Generate { prompt, save } => {
            shell.dispatch(Event::PromptChanged { text: prompt }).await;
            shell.dispatch(Event::GenerateRequested).await;

            let view = shell.view();
            if let Some(error) = view.error {
                match format {
                    OutputFormat::Json => print_json(&error)?,
                    OutputFormat::Text => eprintln!("{}", error.message),
                }
                return Ok(ExitCode::FAILURE);
            }

            let image = view.latest.context("backend returned no image")?;
            match format {
                OutputFormat::Json => print_json(&image)?,
                OutputFormat::Text => print_card(&image),
            }

            if let Some(path) = save {
                let exported = export::export_image(shell.client(), &image.image_url, &path).await?;
                if format == OutputFormat::Text {
                    println!("saved {:?} image to {}", exported.format, exported.path.display());
                }
            }
        }

        Commands::History => {
            shell.dispatch(Event::RefreshHistory).await;

            let view = shell.view();
            if !view.history_loaded {
                bail!("could not load history from {}", view.api_base_url);
            }

            match format {
                OutputFormat::Json => print_json(&view.history)?,
                OutputFormat::Text if view.history.is_empty() => println!("no images yet"),
                OutputFormat::Text => view.history.iter().for_each(print_row),
            }
        }

        Commands::Delete { id } => {
            shell
                .dispatch(Event::DeleteRequested { id: ImageId::new(id.as_str()) })
                .await;

            let deleted = shell
                .view()
                .toast
                .is_some_and(|toast| toast.message == IMAGE_DELETED_TOAST);
            if !deleted {
                bail!("could not delete image {id}");
            }

            match format {
                OutputFormat::Json => print_json(&serde_json::json!({ "deleted": id }))?,
                OutputFormat::Text => println!("deleted {id}"),
            }
        }

        Commands::Export { id, path } => {
            shell.dispatch(Event::RefreshHistory).await;
            shell
                .dispatch(Event::FullscreenOpened { id: ImageId::new(id.as_str()) })
                .await;

            let image = shell
                .view()
                .fullscreen
                .with_context(|| format!("image {id} is not in the recent history"))?;
            let exported = export::export_image(shell.client(), &image.image_url, &path).await?;

            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "id": image.id,
                    "path": exported.path,
                    "format": format!("{:?}", exported.format).to_lowercase(),
                    "bytes": exported.bytes,
                }))?,
                OutputFormat::Text => println!(
                    "wrote {} bytes of {:?} to {}",
                    exported.bytes,
                    exported.format,
                    exported.path.display()
                ),
            }
        }

        Commands::Health => {
            shell.dispatch(Event::HealthCheckRequested).await;

            let status = shell.view().backend_status;
            match format {
                OutputFormat::Json => print_json(&status)?,
                OutputFormat::Text => match &status {
                    BackendStatus::Healthy { timestamp } => {
                        println!("healthy ({})", timestamp.as_deref().unwrap_or("no timestamp"));
                    }
                    BackendStatus::Unhealthy { reason } => println!("unhealthy: {reason}"),
                    BackendStatus::Unknown | BackendStatus::Checking => println!("unknown"),
                },
            }

            if !matches!(status, BackendStatus::Healthy { .. }) {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe_source(image: &ImageCard) -> String {
    if image.is_embedded {
        format!("embedded data URL ({} chars)", image.image_url.len())
    } else {
        image.image_url.clone()
    }
}

fn print_card(image: &ImageCard) {
    println!("id:      {}", image.id);
    println!("prompt:  {}", image.prompt);
    println!("created: {}", image.created_label);
    println!("image:   {}", describe_source(image));
}

fn print_row(image: &ImageCard) {
    println!("{}\t{}\t{}", image.id, image.created_label, image.prompt);
}
