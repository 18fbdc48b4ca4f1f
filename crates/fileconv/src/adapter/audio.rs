//! FFmpeg command lines for audio sources.

use std::path::Path;

use crate::error::ConversionError;
use crate::format::OutputFormat;
use crate::task::options::{BITRATE, CHANNELS, QUALITY, SAMPLE_RATE};
use crate::task::{Bitrate, ConversionTask, Quality};

use super::{ffmpeg_prelude, path_arg};

pub const ACCEPTED_OPTIONS: &[&str] = &[QUALITY, BITRATE, SAMPLE_RATE, CHANNELS];

/// Sample rate used for lossless outputs when none is requested.
const LOSSLESS_SAMPLE_RATE: u32 = 44_100;

pub(super) fn command_args(
    task: &ConversionTask,
    output_path: &Path,
) -> Result<Vec<String>, ConversionError> {
    let options = task.options();
    options.ensure_only(ACCEPTED_OPTIONS, "audio")?;
    let quality = options.quality()?.unwrap_or_default().preset();
    let bitrate = options.bitrate(BITRATE)?.unwrap_or_else(|| preset_bitrate(quality));
    let sample_rate = options.bounded_int(SAMPLE_RATE, 8_000, 384_000)?;
    let channels = options.bounded_int(CHANNELS, 1, 8)?;

    let mut args = ffmpeg_prelude(task.input_path());
    args.push("-vn".to_string());

    let mut sample_rate = sample_rate;
    match task.output_format() {
        OutputFormat::Wav => {
            args.extend(["-c:a", "pcm_s16le"].map(String::from));
            sample_rate.get_or_insert(LOSSLESS_SAMPLE_RATE);
        }
        OutputFormat::Flac => {
            args.extend(["-c:a", "flac", "-sample_fmt", "s16"].map(String::from));
            sample_rate.get_or_insert(LOSSLESS_SAMPLE_RATE);
        }
        OutputFormat::Aac => {
            args.extend(["-c:a", "aac", "-b:a"].map(String::from));
            args.push(bitrate.to_ffmpeg());
            args.extend(["-f", "adts"].map(String::from));
        }
        OutputFormat::Ogg => {
            args.extend(["-c:a", "libvorbis", "-b:a"].map(String::from));
            args.push(bitrate.to_ffmpeg());
        }
        // mp3
        _ => {
            args.extend(["-c:a", "libmp3lame", "-b:a"].map(String::from));
            args.push(bitrate.to_ffmpeg());
        }
    }

    if let Some(rate) = sample_rate {
        args.push("-ar".to_string());
        args.push(rate.to_string());
    }
    if let Some(channels) = channels {
        args.push("-ac".to_string());
        args.push(channels.to_string());
    }

    args.push(path_arg(output_path));
    Ok(args)
}

fn preset_bitrate(quality: Quality) -> Bitrate {
    match quality {
        Quality::High => Bitrate(320),
        Quality::Medium => Bitrate(192),
        _ => Bitrate(128),
    }
}
