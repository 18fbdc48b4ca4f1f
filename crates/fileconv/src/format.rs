//! File categories and output formats.
//!
//! A [`SourceCategory`] decides which converter family handles a file; an
//! [`OutputFormat`] is the target the user asked for. Both sets are closed.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Number of header bytes read when sniffing file content.
const SNIFF_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    Image,
    Video,
    Document,
    Audio,
}

impl SourceCategory {
    pub const ALL: [SourceCategory; 4] = [
        SourceCategory::Image,
        SourceCategory::Video,
        SourceCategory::Document,
        SourceCategory::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Document => "document",
            Self::Audio => "audio",
        }
    }

    /// Extensions accepted as input for this category (lowercase, no dot).
    pub fn input_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Image => &["png", "jpg", "jpeg", "gif", "webp", "tiff", "tif", "bmp", "svg"],
            Self::Video => &["mp4", "avi", "mkv", "mov", "webm", "flv", "wmv", "m4v", "3gp"],
            Self::Document => &[
                "pdf", "docx", "doc", "txt", "rtf", "odt", "xlsx", "xls", "csv", "pptx", "ppt",
                "html",
            ],
            Self::Audio => &["mp3", "wav", "flac", "aac", "ogg", "wma", "m4a"],
        }
    }

    /// Formats a file of this category may be converted to.
    pub fn output_formats(&self) -> &'static [OutputFormat] {
        use OutputFormat::*;
        match self {
            Self::Image => &[Png, Jpg, Jpeg, Gif, Webp, Tiff, Bmp],
            Self::Video => &[Mp4, Avi, Mkv, Mov, Webm, Gif],
            Self::Document => &[Pdf, Docx, Txt, Rtf, Odt, Xlsx, Csv, Pptx, Html],
            Self::Audio => &[Mp3, Wav, Flac, Aac, Ogg],
        }
    }

    pub fn supports_output(&self, format: OutputFormat) -> bool {
        self.output_formats().contains(&format)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.input_extensions().contains(&ext.as_str()))
    }

    /// Detects the category of a file: extension first, then the MIME type
    /// guessed from the path, then a sniff of the file header for images.
    pub fn detect(path: &Path) -> Option<Self> {
        if let Some(category) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
        {
            return Some(category);
        }

        if let Some(mime) = mime_guess::from_path(path).first() {
            match mime.type_().as_str() {
                "image" => return Some(Self::Image),
                "video" => return Some(Self::Video),
                "audio" => return Some(Self::Audio),
                "text" | "application" => return Some(Self::Document),
                _ => {}
            }
        }

        sniff_image(path).then_some(Self::Image)
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn sniff_image(path: &Path) -> bool {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    let read = std::fs::File::open(path)
        .and_then(|file| file.take(SNIFF_LEN as u64).read_to_end(&mut header));
    if read.is_err() || header.is_empty() {
        return false;
    }
    image::guess_format(&header).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    // Images
    Png,
    Jpg,
    Jpeg,
    Gif,
    Webp,
    Tiff,
    Bmp,
    // Video containers
    Mp4,
    Avi,
    Mkv,
    Mov,
    Webm,
    // Documents
    Pdf,
    Docx,
    Txt,
    Rtf,
    Odt,
    Xlsx,
    Csv,
    Pptx,
    Html,
    // Audio
    Mp3,
    Wav,
    Flac,
    Aac,
    Ogg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 26] = [
        OutputFormat::Png,
        OutputFormat::Jpg,
        OutputFormat::Jpeg,
        OutputFormat::Gif,
        OutputFormat::Webp,
        OutputFormat::Tiff,
        OutputFormat::Bmp,
        OutputFormat::Mp4,
        OutputFormat::Avi,
        OutputFormat::Mkv,
        OutputFormat::Mov,
        OutputFormat::Webm,
        OutputFormat::Pdf,
        OutputFormat::Docx,
        OutputFormat::Txt,
        OutputFormat::Rtf,
        OutputFormat::Odt,
        OutputFormat::Xlsx,
        OutputFormat::Csv,
        OutputFormat::Pptx,
        OutputFormat::Html,
        OutputFormat::Mp3,
        OutputFormat::Wav,
        OutputFormat::Flac,
        OutputFormat::Aac,
        OutputFormat::Ogg,
    ];

    /// File extension written for this format, which is also its name.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Tiff => "tiff",
            Self::Bmp => "bmp",
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
            Self::Mkv => "mkv",
            Self::Mov => "mov",
            Self::Webm => "webm",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Rtf => "rtf",
            Self::Odt => "odt",
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Pptx => "pptx",
            Self::Html => "html",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Flac => "flac",
            Self::Aac => "aac",
            Self::Ogg => "ogg",
        }
    }

    pub fn is_lossy_image(&self) -> bool {
        matches!(self, Self::Jpg | Self::Jpeg | Self::Webp)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().trim_start_matches('.').to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == normalized)
            .ok_or_else(|| TaskError::UnknownFormat(s.to_string()))
    }
}
