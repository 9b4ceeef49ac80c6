use crate::mode::{self, ProcessingMode, RequestedMode};

/// A raw multimodal request as received from any surface: optional free
/// text, an optional mode override, and an optional uploaded image.
#[derive(Debug, Default)]
pub struct ChatQuery {
    pub text: Option<String>,
    pub mode: Option<String>,
    pub image: Option<UploadedImage>,
}

/// An image upload captured before routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: Option<String>,
}

/// Client input errors. The only failures a caller ever sees as a rejected
/// request; everything past validation degrades instead of failing.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please provide a text query.")]
    MissingText,

    #[error("Please upload an image.")]
    MissingImage,

    #[error("Unknown mode: '{0}'.")]
    UnknownMode(String),
}

/// A validated request: the concrete mode plus exactly the inputs that
/// mode consumes. Adding a mode forces every match over this to grow.
#[derive(Debug)]
pub enum ResolvedRequest {
    TextToText { text: String },
    TextToImage { text: String },
    ImageToText { image: UploadedImage },
    ImageAndText { text: String, image: UploadedImage },
}

impl ResolvedRequest {
    pub fn mode(&self) -> ProcessingMode {
        match self {
            Self::TextToText { .. } => ProcessingMode::TextToText,
            Self::TextToImage { .. } => ProcessingMode::TextToImage,
            Self::ImageToText { .. } => ProcessingMode::ImageToText,
            Self::ImageAndText { .. } => ProcessingMode::ImageAndText,
        }
    }

    /// Validate a raw query and pin down its processing mode.
    ///
    /// An explicit mode must name a known value and have its required
    /// inputs present; `auto` (or no mode at all) resolves from the inputs
    /// themselves. Blank text counts as absent everywhere.
    pub fn from_query(query: ChatQuery) -> Result<Self, ValidationError> {
        let requested = match query.mode.as_deref().map(str::trim) {
            None | Some("") => RequestedMode::Auto,
            Some(raw) => RequestedMode::parse(raw)
                .ok_or_else(|| ValidationError::UnknownMode(raw.to_string()))?,
        };

        let text = query
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let image = query.image;

        let mode = requested
            .concrete()
            .unwrap_or_else(|| mode::resolve(text.as_deref(), image.is_some()));

        match mode {
            ProcessingMode::TextToText => Ok(Self::TextToText {
                text: text.ok_or(ValidationError::MissingText)?,
            }),
            ProcessingMode::TextToImage => Ok(Self::TextToImage {
                text: text.ok_or(ValidationError::MissingText)?,
            }),
            ProcessingMode::ImageToText => Ok(Self::ImageToText {
                image: image.ok_or(ValidationError::MissingImage)?,
            }),
            ProcessingMode::ImageAndText => Ok(Self::ImageAndText {
                text: text.ok_or(ValidationError::MissingText)?,
                image: image.ok_or(ValidationError::MissingImage)?,
            }),
        }
    }
}
