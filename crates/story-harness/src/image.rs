use crate::errors::ProviderError;
use crate::model::ProviderId;

/// Image produced by an `ImageProvider`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    /// MIME type reported by the provider (for example `image/png`).
    pub mime_type: String,
    /// Base64-encoded image bytes, as returned by the provider.
    pub data: String,
}

impl GeneratedImage {
    /// File extension matching the MIME type.
    pub fn extension(&self) -> &str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Contract implemented by image generation vendors.
#[async_trait::async_trait]
pub trait ImageProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Generates one image for a text prompt.
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_mime_type() {
        let image = |mime: &str| GeneratedImage {
            mime_type: mime.into(),
            data: String::new(),
        };
        assert_eq!(image("image/jpeg").extension(), "jpg");
        assert_eq!(image("image/webp").extension(), "webp");
        assert_eq!(image("application/octet-stream").extension(), "png");
    }
}
