use std::io::Write as _;

use anyhow::Context as _;
use clap::Parser;
use story_extractor::{
    ExtractorUpdate, StoryClient, Theme, ToolActivity, display_partial, story_prompt,
};
use story_protocol::ImageSource;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::EnvFilter;

/// Generate a children's story through a running story relay.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the story relay
    #[arg(long, env = "STORY_RELAY_URL", default_value = "http://127.0.0.1:3000")]
    relay_url: String,

    /// Story theme: divertido, dormir, emocionante or educativa
    #[arg(short, long, default_value_t = Theme::Divertido)]
    theme: Theme,

    /// What the story should be about
    #[arg(required = true, num_args = 1..)]
    description: Vec<String>,
}

fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()
        .context("invalid RUST_LOG filter")?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to initialize logging")?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging()?;
    let args = Args::parse();

    let description = args.description.join(" ");
    if description.trim().is_empty() {
        anyhow::bail!("describe the story before generating it");
    }
    let client = StoryClient::new(&args.relay_url)?;
    let prompt = story_prompt(args.theme, &description);

    let mut shown = String::new();
    let session = client
        .stream_story(&prompt, |update| match update {
            ExtractorUpdate::Started { thread_id } => {
                eprintln!(
                    "Generando tu cuento mágico... ({})",
                    thread_id.as_deref().unwrap_or("sin hilo")
                );
            }
            ExtractorUpdate::Partial(partial) => {
                let text = display_partial(partial);
                match text.strip_prefix(shown.as_str()) {
                    Some(suffix) => print!("{suffix}"),
                    None => print!("\n{text}"),
                }
                let _ = std::io::stdout().flush();
                shown = text;
            }
            ExtractorUpdate::Tool(ToolActivity::Invoked(tool)) => eprintln!("\n[{tool}]"),
            ExtractorUpdate::Tool(_) => {}
            ExtractorUpdate::Completed(_) => println!(),
            ExtractorUpdate::ImageRequested(_) => eprintln!("Creando ilustración..."),
            ExtractorUpdate::Failed(error) => {
                eprintln!("\n{}", error.user_message());
            }
        })
        .await?;

    println!("\n{}\n", session.story.title);
    for paragraph in &session.story.history {
        println!("{paragraph}\n");
    }
    match session.image {
        Some(ImageSource::DataUrl(url)) => {
            let preview: String = url.chars().take(48).collect();
            println!("Ilustración: {preview}... ({} bytes)", url.len());
        }
        Some(ImageSource::Path(path)) => println!("Ilustración: {path}"),
        None => {}
    }
    Ok(())
}
