use serde::{Deserialize, Deserializer};

/// The finished story, parsed once from the complete stream text.
///
/// `history` holds the body as paragraphs. A document that carries the body
/// as one string yields a single paragraph with its text untouched.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoryResult {
    pub title: String,
    #[serde(deserialize_with = "paragraphs")]
    pub history: Vec<String>,
    /// Prompt for the illustration. Empty when the assistant left it out.
    #[serde(default)]
    pub image_prompt: String,
}

impl StoryResult {
    /// Strictly parses the accumulated stream text.
    pub fn parse(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }

    /// Paragraphs joined with blank lines.
    pub fn body_text(&self) -> String {
        self.history.join("\n\n")
    }
}

fn paragraphs<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Body {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Body::deserialize(deserializer)? {
        Body::One(text) => vec![text],
        Body::Many(paragraphs) => paragraphs,
    })
}
