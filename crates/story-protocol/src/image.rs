use crate::errors::ProtocolError;

/// Body of `POST /api/gemini/image`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImageRequest {
    #[serde(rename = "imagePrompt", default)]
    pub image_prompt: String,
}

impl ImageRequest {
    pub fn new(image_prompt: impl Into<String>) -> Self {
        Self {
            image_prompt: image_prompt.into(),
        }
    }
}

/// Reply of `POST /api/gemini/image`.
///
/// A successful reply carries either inline base64 data (`imageData`,
/// `mimeType`, `dataUrl`) or a `path` to an image the relay saved.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageResponse {
    /// Successful reply with inline base64 image data.
    pub fn inline(mime_type: impl Into<String>, image_data: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        let image_data = image_data.into();
        Self {
            success: true,
            data_url: Some(data_url(&mime_type, &image_data)),
            image_data: Some(image_data),
            mime_type: Some(mime_type),
            message: Some("Image generated successfully".into()),
            ..Self::default()
        }
    }

    /// Successful reply pointing at an image persisted by the relay.
    pub fn saved(mime_type: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            success: true,
            mime_type: Some(mime_type.into()),
            path: Some(path.into()),
            message: Some("Image generated successfully".into()),
            ..Self::default()
        }
    }

    /// Failed reply.
    pub fn failure(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            error,
            ..Self::default()
        }
    }

    /// Converts either reply shape into something a display layer can load.
    pub fn into_source(self) -> Result<ImageSource, ProtocolError> {
        if !self.success {
            let reason = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "image generation failed".into());
            return Err(ProtocolError::ImageUnavailable(reason));
        }
        if let Some(url) = self.data_url.filter(|u| !u.is_empty()) {
            return Ok(ImageSource::DataUrl(url));
        }
        if let Some(data) = self.image_data.filter(|d| !d.is_empty()) {
            let mime = self.mime_type.as_deref().unwrap_or("image/png");
            return Ok(ImageSource::DataUrl(data_url(mime, &data)));
        }
        if let Some(path) = self.path.filter(|p| !p.is_empty()) {
            return Ok(ImageSource::Path(path));
        }
        Err(ProtocolError::ImageUnavailable(
            "reply carried neither image data nor a path".into(),
        ))
    }
}

/// Displayable image location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// `data:<mime>;base64,<data>`
    DataUrl(String),
    /// Path or reference to an image persisted by the relay.
    Path(String),
}

impl ImageSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DataUrl(url) => url,
            Self::Path(path) => path,
        }
    }
}

/// Builds a data URL from a MIME type and base64 payload.
pub fn data_url(mime_type: &str, base64_data: &str) -> String {
    format!("data:{mime_type};base64,{base64_data}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_and_saved_replies_both_become_sources() {
        let inline = ImageResponse::inline("image/jpeg", "AAAA");
        assert_eq!(
            inline.into_source(),
            Ok(ImageSource::DataUrl("data:image/jpeg;base64,AAAA".into()))
        );

        let saved = ImageResponse::saved("image/png", "/images/abc.png");
        assert_eq!(
            saved.into_source(),
            Ok(ImageSource::Path("/images/abc.png".into()))
        );
    }

    #[test]
    fn raw_image_data_without_data_url_is_wrapped() {
        let reply: ImageResponse =
            serde_json::from_value(serde_json::json!({"success": true, "imageData": "QUJD"}))
                .expect("reply");
        assert_eq!(
            reply.into_source().expect("source").as_str(),
            "data:image/png;base64,QUJD"
        );
    }

    #[test]
    fn failed_reply_reports_reason() {
        let reply: ImageResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "message": "Error generating image",
            "error": "quota"
        }))
        .expect("reply");
        assert_eq!(
            reply.into_source(),
            Err(ProtocolError::ImageUnavailable("quota".into()))
        );
    }

    #[test]
    fn request_uses_camel_case_prompt_field() {
        let value = serde_json::to_value(ImageRequest::new("a dragon")).expect("json");
        assert_eq!(value, serde_json::json!({"imagePrompt": "a dragon"}));
    }
}
