/// Google Gemini image generation.
pub mod gemini;
/// OpenAI Assistants streaming runs.
pub mod openai;
