//! FFmpeg command lines for video sources.

use std::path::Path;

use crate::error::ConversionError;
use crate::format::OutputFormat;
use crate::task::options::{
    AUDIO_BITRATE, BITRATE, END, FPS, KEEP_ASPECT, QUALITY, RESOLUTION, START,
};
use crate::task::{Bitrate, ConversionTask, Quality, Resolution};

use super::{ffmpeg_prelude, path_arg};

pub const ACCEPTED_OPTIONS: &[&str] = &[
    QUALITY, RESOLUTION, KEEP_ASPECT, BITRATE, AUDIO_BITRATE, FPS, START, END,
];

const GIF_FPS: u32 = 15;
const DEFAULT_AUDIO_BITRATE: Bitrate = Bitrate(192);

pub(super) fn command_args(
    task: &ConversionTask,
    output_path: &Path,
) -> Result<Vec<String>, ConversionError> {
    let options = task.options();
    options.ensure_only(ACCEPTED_OPTIONS, "video")?;
    let quality = options.quality()?.unwrap_or_default().preset();
    let resolution = options.resolution()?;
    let keep_aspect = options.keep_aspect()?;
    let bitrate = options.bitrate(BITRATE)?;
    let audio_bitrate = options.bitrate(AUDIO_BITRATE)?.unwrap_or(DEFAULT_AUDIO_BITRATE);
    let fps = options.bounded_int(FPS, 1, 240)?;
    let clip = options.clip_range()?;

    let mut args = ffmpeg_prelude(task.input_path());
    // Output-side seeking: slower than seeking the input, but frame accurate.
    args.extend(clip.to_ffmpeg());
    let scale = resolution.map(|r| scale_filter(r, keep_aspect));

    if task.output_format() == OutputFormat::Gif {
        let mut filters = vec![format!("fps={}", fps.unwrap_or(GIF_FPS))];
        filters.extend(scale);
        args.push("-vf".to_string());
        args.push(filters.join(","));
        args.extend(["-loop", "0", "-an"].map(String::from));
        args.push(path_arg(output_path));
        return Ok(args);
    }

    if let Some(scale) = scale {
        args.push("-vf".to_string());
        args.push(scale);
    }
    if let Some(fps) = fps {
        args.push("-r".to_string());
        args.push(fps.to_string());
    }

    let video_bitrate = bitrate.unwrap_or_else(|| preset_bitrate(quality));
    let (video_codec, audio_codec) = codecs(task.output_format());

    args.push("-c:v".to_string());
    args.push(video_codec.to_string());
    if video_codec == "libx264" {
        let preset = if quality == Quality::High { "slow" } else { "medium" };
        args.extend(["-preset".to_string(), preset.to_string()]);
        args.extend(["-pix_fmt", "yuv420p"].map(String::from));
    }
    args.push("-b:v".to_string());
    args.push(video_bitrate.to_ffmpeg());

    args.push("-c:a".to_string());
    args.push(audio_codec.to_string());
    args.push("-b:a".to_string());
    args.push(audio_bitrate.to_ffmpeg());

    if task.output_format() == OutputFormat::Mp4 {
        args.extend(["-movflags", "+faststart"].map(String::from));
    }

    args.push(path_arg(output_path));
    Ok(args)
}

fn preset_bitrate(quality: Quality) -> Bitrate {
    match quality {
        Quality::High => Bitrate(8000),
        Quality::Medium => Bitrate(4000),
        _ => Bitrate(1500),
    }
}

fn codecs(format: OutputFormat) -> (&'static str, &'static str) {
    match format {
        OutputFormat::Webm => ("libvpx-vp9", "libopus"),
        OutputFormat::Avi => ("mpeg4", "libmp3lame"),
        // mp4, mkv, mov
        _ => ("libx264", "aac"),
    }
}

fn scale_filter(resolution: Resolution, keep_aspect: bool) -> String {
    if keep_aspect {
        // -2 keeps the height even, which most encoders require.
        format!("scale={}:-2", resolution.width)
    } else {
        format!("scale={}:{}", resolution.width, resolution.height)
    }
}
