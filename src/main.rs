use anyhow::Result;
use clap::Parser;
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_digest::cli::{Cli, Commands};
use media_digest::config::Config;
use media_digest::sources::vimeo::RetryPolicy;
use media_digest::{utils, DigestPipeline, SourceRegistry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "media_digest=debug"
    } else {
        "media_digest=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Run(args) => {
            // Missing tools only matter for the steps that use them
            let missing_deps = utils::check_dependencies().await;
            if !missing_deps.is_empty() {
                eprintln!("{}", style("⚠️  Dependency check warnings:").yellow());
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - tools may be available)");
            }

            if let Err(err) = run(args, !cli.quiet).await {
                tracing::error!("❌ {:#}", err);
            }
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Use {} to print it", style("media-digest config --show").cyan());
            }
        }
        Commands::Sources => {
            let registry = SourceRegistry::with_defaults(
                reqwest::Client::new(),
                RetryPolicy::default(),
                false,
            );
            println!("Supported sources:");
            for platform in registry.list_platforms() {
                println!("  • {}", platform);
            }
            println!("  Vimeo: master.json / playlist.json manifest links (vimeo.com, vimeocdn.com)");
            println!("  YouTube: watch, youtu.be, embed and shorts links (needs yt-dlp)");
        }
    }

    Ok(())
}

async fn run(args: media_digest::cli::RunArgs, show_progress: bool) -> Result<()> {
    let mut config = Config::load().await?;
    if let Some(key) = args.openai_key.clone() {
        config.openai.api_key = Some(key);
    }
    if let Some(topic) = args.topic.clone() {
        config.openai.summary_topic = Some(topic);
    }

    let pipeline = DigestPipeline::new(config, show_progress)?;
    let report = pipeline.run(&args.run_config()).await?;

    println!("{} {}", style("Audio:").green().bold(), report.media.audio.display());
    if let Some(video) = &report.media.video {
        println!("{} {}", style("Video:").green().bold(), video.display());
    }
    if let Some(archived) = &report.archived {
        println!("{} {}", style("Stored:").green().bold(), archived.display());
    }
    if let Some(pdf) = &report.pdf {
        println!("{} {}", style("PDF:").green().bold(), pdf.display());
    }

    Ok(())
}
