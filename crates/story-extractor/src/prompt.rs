use std::fmt;
use std::str::FromStr;

/// Tone of the requested story.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Divertido,
    Dormir,
    Emocionante,
    Educativa,
}

impl Theme {
    pub const ALL: [Theme; 4] = [
        Theme::Divertido,
        Theme::Dormir,
        Theme::Emocionante,
        Theme::Educativa,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Divertido => "divertido",
            Theme::Dormir => "dormir",
            Theme::Emocionante => "emocionante",
            Theme::Educativa => "educativa",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme `{0}` (expected divertido, dormir, emocionante or educativa)")]
pub struct ThemeError(String);

impl FromStr for Theme {
    type Err = ThemeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        Theme::ALL
            .into_iter()
            .find(|theme| theme.as_str() == value)
            .ok_or(ThemeError(value))
    }
}

/// Builds the user message sent to the story assistant.
pub fn story_prompt(theme: Theme, description: &str) -> String {
    format!(
        "Escribe un cuento infantil corto que sea {theme} sobre {}. \n    Escribe un título atractivo y luego el contenido del cuento en varios párrafos. \n    Usa un lenguaje sencillo y apropiado para niños.",
        description.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn themes_parse_case_insensitively() {
        assert_eq!("Dormir".parse::<Theme>(), Ok(Theme::Dormir));
        assert_eq!(" educativa ".parse::<Theme>(), Ok(Theme::Educativa));
        assert!("scary".parse::<Theme>().is_err());
    }

    #[test]
    fn prompt_names_theme_and_description() {
        let prompt = story_prompt(Theme::Emocionante, " un dragón que aprende a volar ");
        assert!(prompt.starts_with(
            "Escribe un cuento infantil corto que sea emocionante sobre un dragón que aprende a volar. "
        ));
        assert!(prompt.ends_with("Usa un lenguaje sencillo y apropiado para niños."));
        assert_eq!(prompt.lines().count(), 3);
    }
}
