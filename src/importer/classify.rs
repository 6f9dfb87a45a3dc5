//! Rule-based work type and medium classification.
//!
//! Rules are tried in a fixed order and the first match wins:
//! explicit metadata, MIME type, URL file extension, title/tag keywords,
//! then the `other`/`unknown` default. The same record always yields the same
//! classification.

use super::item::RawRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    Artwork,
    Photograph,
    Music,
    Video,
    Writing,
    Software,
    Model3d,
    Other,
}

impl WorkType {
    pub const SLUGS: &'static [&'static str] = &[
        "artwork",
        "photograph",
        "music",
        "video",
        "writing",
        "software",
        "model3d",
        "other",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::Artwork => "artwork",
            WorkType::Photograph => "photograph",
            WorkType::Music => "music",
            WorkType::Video => "video",
            WorkType::Writing => "writing",
            WorkType::Software => "software",
            WorkType::Model3d => "model3d",
            WorkType::Other => "other",
        }
    }

    /// Medium implied by the work type when nothing more specific is known.
    pub fn default_medium(&self) -> Medium {
        match self {
            WorkType::Artwork | WorkType::Photograph => Medium::Image,
            WorkType::Music => Medium::Audio,
            WorkType::Video => Medium::Video,
            WorkType::Writing => Medium::Text,
            WorkType::Software => Medium::Code,
            WorkType::Model3d => Medium::Model,
            WorkType::Other => Medium::Unknown,
        }
    }

    /// Parse a slug or one of its common synonyms.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        let work_type = match label.as_str() {
            "artwork" | "art" | "painting" | "illustration" | "drawing" | "image" => {
                WorkType::Artwork
            }
            "photograph" | "photo" | "photography" => WorkType::Photograph,
            "music" | "song" | "track" | "album" | "audio" => WorkType::Music,
            "video" | "film" | "animation" | "movie" => WorkType::Video,
            "writing" | "essay" | "poem" | "story" | "article" | "text" => WorkType::Writing,
            "software" | "app" | "code" | "tool" | "game" => WorkType::Software,
            "model3d" | "3d" | "model" | "sculpture" => WorkType::Model3d,
            "other" => WorkType::Other,
            _ => return None,
        };
        Some(work_type)
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Medium {
    Image,
    Audio,
    Video,
    Text,
    Code,
    Model,
    Interactive,
    Unknown,
}

impl Medium {
    pub const SLUGS: &'static [&'static str] = &[
        "image",
        "audio",
        "video",
        "text",
        "code",
        "model",
        "interactive",
        "unknown",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Medium::Image => "image",
            Medium::Audio => "audio",
            Medium::Video => "video",
            Medium::Text => "text",
            Medium::Code => "code",
            Medium::Model => "model",
            Medium::Interactive => "interactive",
            Medium::Unknown => "unknown",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let medium = match label.trim().to_ascii_lowercase().as_str() {
            "image" | "visual" => Medium::Image,
            "audio" | "sound" => Medium::Audio,
            "video" => Medium::Video,
            "text" => Medium::Text,
            "code" => Medium::Code,
            "model" | "3d" => Medium::Model,
            "interactive" | "web" => Medium::Interactive,
            "unknown" => Medium::Unknown,
            _ => return None,
        };
        Some(medium)
    }
}

impl fmt::Display for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationRule {
    ExplicitMetadata,
    MimeType,
    FileExtension,
    Keyword,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub work_type: WorkType,
    pub medium: Medium,
    pub rule: ClassificationRule,
}

impl Classification {
    fn new(work_type: WorkType, medium: Medium, rule: ClassificationRule) -> Self {
        Self {
            work_type,
            medium,
            rule,
        }
    }
}

/// Keyword lists, checked in this order.
const KEYWORDS: &[(WorkType, &[&str])] = &[
    (WorkType::Photograph, &["photo", "photograph", "photography", "snapshot", "portrait"]),
    (WorkType::Music, &["song", "track", "album", "ep", "beat", "remix", "music"]),
    (WorkType::Video, &["video", "film", "short", "clip", "animation", "documentary"]),
    (WorkType::Model3d, &["3d", "sculpt", "sculpture", "mesh", "model"]),
    (WorkType::Software, &["app", "tool", "library", "plugin", "game", "bot", "script"]),
    (WorkType::Writing, &["essay", "poem", "poetry", "story", "article", "novel", "zine"]),
    (WorkType::Artwork, &["painting", "drawing", "illustration", "sketch", "artwork", "collage"]),
];

/// Classify a raw record.
pub fn classify(raw: &RawRecord) -> Classification {
    from_metadata(raw)
        .or_else(|| raw.mime_type.as_deref().and_then(from_mime_type))
        .or_else(|| raw.url.as_deref().and_then(from_extension))
        .or_else(|| from_keywords(raw))
        .unwrap_or_else(|| {
            Classification::new(WorkType::Other, Medium::Unknown, ClassificationRule::Default)
        })
}

fn from_metadata(raw: &RawRecord) -> Option<Classification> {
    let work_type = ["work_type", "type"]
        .iter()
        .filter_map(|key| raw.metadata.get(*key).and_then(|v| v.as_str()))
        .find_map(WorkType::from_label)?;
    let medium = raw
        .metadata
        .get("medium")
        .and_then(|v| v.as_str())
        .and_then(Medium::from_label)
        .unwrap_or_else(|| work_type.default_medium());
    Some(Classification::new(
        work_type,
        medium,
        ClassificationRule::ExplicitMetadata,
    ))
}

fn from_mime_type(mime: &str) -> Option<Classification> {
    let mime = mime.trim().to_ascii_lowercase();
    let (major, minor) = mime.split_once('/')?;
    let minor = minor.split(';').next().unwrap_or_default().trim();

    let (work_type, medium) = match (major, minor) {
        ("application", "javascript" | "wasm" | "x-python" | "x-sh")
        | ("text", "javascript" | "x-python" | "x-rust" | "x-shellscript") => {
            (WorkType::Software, Medium::Code)
        }
        ("text", "html") => (WorkType::Software, Medium::Interactive),
        ("image", "jpeg" | "heic" | "x-canon-cr2" | "x-nikon-nef") => {
            (WorkType::Photograph, Medium::Image)
        }
        ("image", _) => (WorkType::Artwork, Medium::Image),
        ("audio", _) => (WorkType::Music, Medium::Audio),
        ("video", _) => (WorkType::Video, Medium::Video),
        ("model", _) => (WorkType::Model3d, Medium::Model),
        ("text", _) | ("application", "pdf" | "epub+zip") => (WorkType::Writing, Medium::Text),
        _ => return None,
    };
    Some(Classification::new(work_type, medium, ClassificationRule::MimeType))
}

fn from_extension(url: &str) -> Option<Classification> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    let (_, extension) = file.rsplit_once('.')?;

    let (work_type, medium) = match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "heic" | "cr2" | "nef" => (WorkType::Photograph, Medium::Image),
        "png" | "gif" | "webp" | "svg" | "bmp" | "tiff" => (WorkType::Artwork, Medium::Image),
        "mp3" | "wav" | "flac" | "ogg" | "m4a" | "aiff" => (WorkType::Music, Medium::Audio),
        "mp4" | "mov" | "webm" | "mkv" | "avi" => (WorkType::Video, Medium::Video),
        "md" | "txt" | "pdf" | "epub" | "rtf" => (WorkType::Writing, Medium::Text),
        "glb" | "gltf" | "obj" | "stl" | "fbx" | "usdz" => (WorkType::Model3d, Medium::Model),
        "rs" | "js" | "ts" | "py" | "wasm" | "zip" => (WorkType::Software, Medium::Code),
        "html" | "htm" => (WorkType::Software, Medium::Interactive),
        _ => return None,
    };
    Some(Classification::new(
        work_type,
        medium,
        ClassificationRule::FileExtension,
    ))
}

fn from_keywords(raw: &RawRecord) -> Option<Classification> {
    let mut words: Vec<String> = Vec::new();
    let sources = raw.title.iter().chain(raw.tags.iter());
    for text in sources {
        words.extend(
            text.split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase),
        );
    }

    KEYWORDS.iter().find_map(|(work_type, keywords)| {
        words
            .iter()
            .any(|w| keywords.contains(&w.as_str()))
            .then(|| {
                Classification::new(
                    *work_type,
                    work_type.default_medium(),
                    ClassificationRule::Keyword,
                )
            })
    })
}
