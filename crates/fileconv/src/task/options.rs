use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, TaskError};

pub const QUALITY: &str = "quality";
pub const RESOLUTION: &str = "resolution";
pub const KEEP_ASPECT: &str = "keep_aspect";
pub const BITRATE: &str = "bitrate";
pub const AUDIO_BITRATE: &str = "audio_bitrate";
pub const FPS: &str = "fps";
pub const SAMPLE_RATE: &str = "sample_rate";
pub const CHANNELS: &str = "channels";
pub const START: &str = "start";
pub const END: &str = "end";

const MAX_DIMENSION: u32 = 16_384;

static RE_BITRATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<value>-?\d+)(?P<unit>[kKmM]?)$").unwrap());

/// `SS[.fff]`, `MM:SS[.fff]` or `HH:MM:SS[.fff]`.
static RE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:(?P<h>\d+):)?(?P<m>\d{1,2}):)?(?P<s>\d+(?:\.\d{1,3})?)$").unwrap()
});

/// Free-form conversion settings. Each adapter decides which keys it accepts
/// and validates values when the task is prepared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionOptions(BTreeMap<String, String>);

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0
            .insert(key.into().trim().to_lowercase(), value.into().trim().to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parses a `key=value` pair as given on the command line.
    pub fn parse_pair(raw: &str) -> Result<(String, String), TaskError> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| TaskError::MalformedOption(raw.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(TaskError::MalformedOption(raw.to_string()));
        }
        Ok((key.to_string(), value.trim().to_string()))
    }

    /// Rejects any key outside `accepted`.
    pub fn ensure_only(&self, accepted: &[&str], family: &str) -> Result<(), ConversionError> {
        match self.keys().find(|key| !accepted.contains(key)) {
            Some(key) => Err(invalid(
                key,
                format!("not supported for {} conversions", family),
            )),
            None => Ok(()),
        }
    }

    pub fn quality(&self) -> Result<Option<Quality>, ConversionError> {
        self.get(QUALITY).map(Quality::parse).transpose()
    }

    pub fn resolution(&self) -> Result<Option<Resolution>, ConversionError> {
        self.get(RESOLUTION).map(Resolution::parse).transpose()
    }

    pub fn keep_aspect(&self) -> Result<bool, ConversionError> {
        match self.get(KEEP_ASPECT) {
            None => Ok(true),
            Some(raw) => match raw.to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(invalid(KEEP_ASPECT, format!("expected a boolean, got '{}'", raw))),
            },
        }
    }

    pub fn bitrate(&self, key: &str) -> Result<Option<Bitrate>, ConversionError> {
        self.get(key).map(|raw| Bitrate::parse(key, raw)).transpose()
    }

    pub fn bounded_int(&self, key: &str, min: u32, max: u32) -> Result<Option<u32>, ConversionError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        let value: i64 = raw
            .parse()
            .map_err(|_| invalid(key, format!("expected an integer, got '{}'", raw)))?;
        if value < i64::from(min) || value > i64::from(max) {
            return Err(invalid(
                key,
                format!("{} is outside the accepted range {}..={}", value, min, max),
            ));
        }
        Ok(Some(value as u32))
    }

    /// Position inside a media file, as seconds or `[HH:]MM:SS[.fff]`.
    pub fn timestamp(&self, key: &str) -> Result<Option<Duration>, ConversionError> {
        self.get(key).map(|raw| parse_timestamp(key, raw)).transpose()
    }

    /// The `start`/`end` pair cutting a clip out of the source. Either bound
    /// may be omitted; when both are given, start must come before end.
    pub fn clip_range(&self) -> Result<ClipRange, ConversionError> {
        let range = ClipRange {
            start: self.timestamp(START)?,
            end: self.timestamp(END)?,
        };
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start >= end {
                return Err(invalid(
                    END,
                    format!(
                        "end ({:.3}s) must be after start ({:.3}s)",
                        end.as_secs_f64(),
                        start.as_secs_f64()
                    ),
                ));
            }
        }
        Ok(range)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConversionOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (key, value) in iter {
            options.insert(key, value);
        }
        options
    }
}

pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> ConversionError {
    ConversionError::InvalidOptions {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Requested output quality: one of the named presets or an explicit level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    High,
    Medium,
    Low,
    Level(u8),
}

impl Quality {
    pub fn parse(raw: &str) -> Result<Self, ConversionError> {
        match raw.to_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => {
                let level: i64 = other.parse().map_err(|_| {
                    invalid(QUALITY, format!("expected high, medium, low or 1-100, got '{}'", raw))
                })?;
                if !(1..=100).contains(&level) {
                    return Err(invalid(
                        QUALITY,
                        format!("{} is outside the accepted range 1..=100", level),
                    ));
                }
                Ok(Self::Level(level as u8))
            }
        }
    }

    /// Collapses explicit levels onto the three presets.
    pub fn preset(&self) -> Quality {
        match self {
            Self::Level(level) if *level >= 80 => Self::High,
            Self::Level(level) if *level >= 50 => Self::Medium,
            Self::Level(_) => Self::Low,
            preset => *preset,
        }
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::High
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn parse(raw: &str) -> Result<Self, ConversionError> {
        let malformed = || invalid(RESOLUTION, format!("expected WIDTHxHEIGHT, got '{}'", raw));
        let (width, height) = raw.to_lowercase().split_once('x').ok_or_else(malformed).and_then(
            |(w, h)| {
                let w: i64 = w.trim().parse().map_err(|_| malformed())?;
                let h: i64 = h.trim().parse().map_err(|_| malformed())?;
                Ok((w, h))
            },
        )?;
        let max = i64::from(MAX_DIMENSION);
        if width < 1 || height < 1 || width > max || height > max {
            return Err(invalid(
                RESOLUTION,
                format!("{}x{} is outside the accepted range 1..={}", width, height, max),
            ));
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
        })
    }
}

/// Bitrate in kilobits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitrate(pub u32);

impl Bitrate {
    pub fn parse(key: &str, raw: &str) -> Result<Self, ConversionError> {
        let caps = RE_BITRATE
            .captures(raw.trim())
            .ok_or_else(|| invalid(key, format!("expected a bitrate like 192k or 4M, got '{}'", raw)))?;
        let value: i64 = caps["value"]
            .parse()
            .map_err(|_| invalid(key, format!("bitrate '{}' is too large", raw)))?;
        let kbps = match &caps["unit"] {
            "m" | "M" => value.saturating_mul(1000),
            "k" | "K" => value,
            // Bare numbers are bits per second, as ffmpeg reads them.
            _ => value / 1000,
        };
        if kbps < 1 || kbps > 500_000 {
            return Err(invalid(key, format!("{} is outside the accepted range", raw)));
        }
        Ok(Self(kbps as u32))
    }

    pub fn to_ffmpeg(self) -> String {
        format!("{}k", self.0)
    }
}

/// Portion of a media source to keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipRange {
    pub start: Option<Duration>,
    pub end: Option<Duration>,
}

impl ClipRange {
    pub fn is_full(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// `-ss`/`-to` output options for ffmpeg.
    pub fn to_ffmpeg(self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(start) = self.start {
            args.push("-ss".to_string());
            args.push(format!("{:.3}", start.as_secs_f64()));
        }
        if let Some(end) = self.end {
            args.push("-to".to_string());
            args.push(format!("{:.3}", end.as_secs_f64()));
        }
        args
    }
}

fn parse_timestamp(key: &str, raw: &str) -> Result<Duration, ConversionError> {
    let caps = RE_TIMESTAMP.captures(raw).ok_or_else(|| {
        invalid(key, format!("expected seconds or [HH:]MM:SS[.fff], got '{}'", raw))
    })?;
    let unit = |name: &str| -> Result<u64, ConversionError> {
        match caps.name(name) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| invalid(key, format!("timestamp '{}' is too large", raw))),
            None => Ok(0),
        }
    };
    let hours = unit("h")?;
    let minutes = unit("m")?;
    if caps.name("h").is_some() && minutes >= 60 {
        return Err(invalid(key, format!("minutes must be below 60 in '{}'", raw)));
    }
    let seconds: f64 = caps["s"]
        .parse()
        .map_err(|_| invalid(key, format!("timestamp '{}' is too large", raw)))?;
    if caps.name("m").is_some() && seconds >= 60.0 {
        return Err(invalid(key, format!("seconds must be below 60 in '{}'", raw)));
    }

    let whole = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60))
        .ok_or_else(|| invalid(key, format!("timestamp '{}' is too large", raw)))?;
    let total = whole as f64 + seconds;
    Duration::try_from_secs_f64(total)
        .map_err(|_| invalid(key, format!("timestamp '{}' is too large", raw)))
}
