//! Capability table mapping (category, output format) to a converter.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::config::schema::ToolsConfig;
use crate::error::ConversionError;
use crate::format::{OutputFormat, SourceCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolFamily {
    ImageMagick,
    Ffmpeg,
    LibreOffice,
}

impl ToolFamily {
    pub const ALL: [ToolFamily; 3] = [Self::ImageMagick, Self::Ffmpeg, Self::LibreOffice];

    pub fn default_program(&self) -> &'static str {
        match self {
            Self::ImageMagick => "magick",
            Self::Ffmpeg => "ffmpeg",
            Self::LibreOffice if cfg!(windows) => "soffice",
            Self::LibreOffice => "libreoffice",
        }
    }

    /// Argument that makes the program print its version and exit.
    pub fn version_flag(&self) -> &'static str {
        match self {
            Self::ImageMagick | Self::Ffmpeg => "-version",
            Self::LibreOffice => "--version",
        }
    }

    pub fn for_category(category: SourceCategory) -> Self {
        match category {
            SourceCategory::Image => Self::ImageMagick,
            SourceCategory::Video | SourceCategory::Audio => Self::Ffmpeg,
            SourceCategory::Document => Self::LibreOffice,
        }
    }
}

impl fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageMagick => write!(f, "imagemagick"),
            Self::Ffmpeg => write!(f, "ffmpeg"),
            Self::LibreOffice => write!(f, "libreoffice"),
        }
    }
}

/// Which adapter variant builds the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Image,
    Video,
    Document,
    Audio,
}

impl From<SourceCategory> for AdapterKind {
    fn from(category: SourceCategory) -> Self {
        match category {
            SourceCategory::Image => Self::Image,
            SourceCategory::Video => Self::Video,
            SourceCategory::Document => Self::Document,
            SourceCategory::Audio => Self::Audio,
        }
    }
}

/// How a finished run is judged successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessSignal {
    /// Exit status 0 is enough.
    ExitCode,
    /// Exit status 0 and the expected output file exists.
    ExitCodeAndOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDescriptor {
    pub category: SourceCategory,
    pub format: OutputFormat,
    pub adapter: AdapterKind,
    pub tool: ToolFamily,
    pub program: String,
    /// Arguments placed in front of the generated ones.
    pub extra_args: Vec<String>,
    pub success: SuccessSignal,
}

impl CapabilityDescriptor {
    /// Descriptor using the tool's default program and no extra arguments.
    pub fn new(category: SourceCategory, format: OutputFormat) -> Self {
        let tool = ToolFamily::for_category(category);
        Self {
            category,
            format,
            adapter: AdapterKind::from(category),
            tool,
            program: tool.default_program().to_string(),
            extra_args: Vec::new(),
            success: SuccessSignal::ExitCodeAndOutput,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

/// Fixed lookup table of supported conversions.
///
/// Built once and never modified afterwards; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ConverterRegistry {
    descriptors: BTreeMap<(SourceCategory, OutputFormat), CapabilityDescriptor>,
}

impl ConverterRegistry {
    /// Registers every category/format pair whose tool is enabled.
    pub fn from_config(tools: &ToolsConfig) -> Self {
        let mut descriptors = Vec::new();

        for category in SourceCategory::ALL {
            let family = ToolFamily::for_category(category);
            let tool = tools.get(family);
            if !tool.enabled {
                log::debug!("{} disabled, skipping {} conversions", family, category);
                continue;
            }

            let success = if tool.require_output {
                SuccessSignal::ExitCodeAndOutput
            } else {
                SuccessSignal::ExitCode
            };

            for &format in category.output_formats() {
                descriptors.push(CapabilityDescriptor {
                    category,
                    format,
                    adapter: AdapterKind::from(category),
                    tool: family,
                    program: tools.program(family),
                    extra_args: tool.extra_args.clone(),
                    success,
                });
            }
        }

        Self::from_descriptors(descriptors)
    }

    /// Later descriptors replace earlier ones for the same pair.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = CapabilityDescriptor>) -> Self {
        let descriptors = descriptors
            .into_iter()
            .map(|d| ((d.category, d.format), d))
            .collect();
        Self { descriptors }
    }

    pub fn resolve(
        &self,
        category: SourceCategory,
        format: OutputFormat,
    ) -> Result<&CapabilityDescriptor, ConversionError> {
        self.descriptors
            .get(&(category, format))
            .ok_or(ConversionError::UnsupportedConversion { category, format })
    }

    pub fn supports(&self, category: SourceCategory, format: OutputFormat) -> bool {
        self.descriptors.contains_key(&(category, format))
    }

    /// All registered descriptors, ordered by category then format.
    pub fn conversions(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.descriptors.values()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
