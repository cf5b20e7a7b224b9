use std::sync::Arc;

use story_harness::prelude::*;
use story_harness::vendors::openai::OpenAiAssistantsProvider;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    let assistant_id = std::env::var("OPENAI_ASSISTANT_ID")
        .map_err(|_| HarnessError::Config("missing OPENAI_ASSISTANT_ID".into()))?;
    let harness = Harness::builder()
        .text_provider(Arc::new(OpenAiAssistantsProvider::from_env()?))
        .build()?;

    let mut run = harness
        .session(SessionConfig::assistant(assistant_id))
        .run()
        .user_text("Escribe un cuento infantil corto sobre una tortuga valiente.")
        .start_stream()
        .await?;
    eprintln!("thread: {}", run.thread_id());

    while let Some(event) = run.next_event().await {
        match event {
            UpstreamEvent::TextDelta { text } => print!("{text}"),
            UpstreamEvent::ToolCallCreated { tool } => eprintln!("[tool: {tool}]"),
            UpstreamEvent::Error { message } => eprintln!("run error: {message}"),
            UpstreamEvent::End => println!(),
            UpstreamEvent::TextCreated | UpstreamEvent::ToolCallDelta { .. } => {}
        }
    }
    Ok(())
}
