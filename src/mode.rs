//! Processing-mode resolution: maps the presence and content of request
//! inputs onto one of four concrete processing paths.

use serde::Serialize;

/// Mode requested by the caller. `Auto` defers the choice to [`resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestedMode {
    #[default]
    Auto,
    TextToText,
    TextToImage,
    ImageToText,
    ImageAndText,
}

impl RequestedMode {
    /// Parse a caller-supplied mode string. Unknown values return `None` so
    /// typos surface as rejected requests instead of silently running `auto`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(Self::Auto),
            "text_to_text" => Some(Self::TextToText),
            "text_to_image" => Some(Self::TextToImage),
            "image_to_text" => Some(Self::ImageToText),
            "image_and_text" => Some(Self::ImageAndText),
            _ => None,
        }
    }

    pub fn concrete(self) -> Option<ProcessingMode> {
        match self {
            Self::Auto => None,
            Self::TextToText => Some(ProcessingMode::TextToText),
            Self::TextToImage => Some(ProcessingMode::TextToImage),
            Self::ImageToText => Some(ProcessingMode::ImageToText),
            Self::ImageAndText => Some(ProcessingMode::ImageAndText),
        }
    }
}

/// Concrete processing path. Resolution never yields `auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    TextToText,
    TextToImage,
    ImageToText,
    ImageAndText,
}

impl ProcessingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextToText => "text_to_text",
            Self::TextToImage => "text_to_image",
            Self::ImageToText => "image_to_text",
            Self::ImageAndText => "image_and_text",
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Words that steer a text-only request toward image retrieval. Matched by
/// substring containment on the lower-cased text, so triggers embedded in
/// longer words count as well.
const IMAGE_TRIGGERS: [&str; 5] = ["image", "picture", "photo", "show me", "see"];

/// Resolve request inputs to a concrete mode. Blank text counts as absent.
///
/// The no-text no-image case falls through to `TextToText`, where required
/// input validation rejects it before any remote call.
pub fn resolve(text: Option<&str>, has_image: bool) -> ProcessingMode {
    let text = text.map(str::trim).filter(|t| !t.is_empty());
    match (has_image, text) {
        (true, None) => ProcessingMode::ImageToText,
        (true, Some(_)) => ProcessingMode::ImageAndText,
        (false, Some(t)) => {
            let lowered = t.to_lowercase();
            if IMAGE_TRIGGERS.iter().any(|w| lowered.contains(w)) {
                ProcessingMode::TextToImage
            } else {
                ProcessingMode::TextToText
            }
        }
        (false, None) => ProcessingMode::TextToText,
    }
}
