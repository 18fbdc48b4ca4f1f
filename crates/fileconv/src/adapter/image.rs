//! ImageMagick command lines.

use std::path::Path;

use crate::error::ConversionError;
use crate::format::OutputFormat;
use crate::task::options::{KEEP_ASPECT, QUALITY, RESOLUTION};
use crate::task::{ConversionTask, Quality};

use super::path_arg;

pub const ACCEPTED_OPTIONS: &[&str] = &[QUALITY, RESOLUTION, KEEP_ASPECT];

pub(super) fn command_args(
    task: &ConversionTask,
    output_path: &Path,
) -> Result<Vec<String>, ConversionError> {
    let options = task.options();
    options.ensure_only(ACCEPTED_OPTIONS, "image")?;
    let quality = options.quality()?.unwrap_or_default();
    let resolution = options.resolution()?;
    let keep_aspect = options.keep_aspect()?;

    let format = task.output_format();
    let mut args = Vec::new();

    let input = path_arg(task.input_path());
    let animated_input = task
        .input_path()
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gif"));
    if animated_input && format != OutputFormat::Gif {
        // Only the first frame of an animation.
        args.push(format!("{}[0]", input));
    } else {
        args.push(input);
    }

    args.push("-auto-orient".to_string());

    if format.is_lossy_image() || format == OutputFormat::Tiff {
        args.push("-quality".to_string());
        args.push(quality_level(quality).to_string());
    }

    if let Some(resolution) = resolution {
        let geometry = format!("{}x{}", resolution.width, resolution.height);
        args.push("-resize".to_string());
        args.push(if keep_aspect {
            geometry
        } else {
            format!("{}!", geometry)
        });
    }

    if matches!(
        format,
        OutputFormat::Jpg | OutputFormat::Jpeg | OutputFormat::Bmp
    ) {
        // No alpha channel in these formats; flatten onto white.
        args.extend(
            ["-background", "white", "-alpha", "remove", "-alpha", "off"]
                .map(String::from),
        );
    }

    args.push(path_arg(output_path));
    Ok(args)
}

fn quality_level(quality: Quality) -> u8 {
    match quality {
        Quality::High => 95,
        Quality::Medium => 75,
        Quality::Low => 50,
        Quality::Level(level) => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::ConversionOptions;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn task(dir: &Path, name: &str, format: OutputFormat, options: ConversionOptions) -> ConversionTask {
        let input = dir.join(name);
        std::fs::write(&input, b"img").unwrap();
        ConversionTask::new(&input, format, dir)
            .unwrap()
            .with_options(options)
    }

    fn out(dir: &Path, name: &str) -> PathBuf {
        dir.join(name)
    }

    #[test]
    fn test_png_to_jpeg_flattens_and_sets_quality() {
        let temp_dir = TempDir::new().unwrap();
        let task = task(temp_dir.path(), "a.png", OutputFormat::Jpeg, ConversionOptions::new());
        let output = out(temp_dir.path(), "a.jpeg");

        let args = command_args(&task, &output).unwrap();

        assert_eq!(args.first().unwrap(), &path_arg(task.input_path()));
        assert_eq!(args.last().unwrap(), &path_arg(&output));
        let joined = args.join(" ");
        assert!(joined.contains("-auto-orient"));
        assert!(joined.contains("-quality 95"));
        assert!(joined.contains("-background white -alpha remove -alpha off"));
    }

    #[test]
    fn test_quality_presets_and_levels() {
        let temp_dir = TempDir::new().unwrap();
        let output = out(temp_dir.path(), "a.webp");

        let low = task(
            temp_dir.path(),
            "a.png",
            OutputFormat::Webp,
            ConversionOptions::new().with(QUALITY, "low"),
        );
        assert!(command_args(&low, &output).unwrap().join(" ").contains("-quality 50"));

        let level = task(
            temp_dir.path(),
            "b.png",
            OutputFormat::Webp,
            ConversionOptions::new().with(QUALITY, "82"),
        );
        assert!(command_args(&level, &output).unwrap().join(" ").contains("-quality 82"));
    }

    #[test]
    fn test_png_output_has_no_quality_flag() {
        let temp_dir = TempDir::new().unwrap();
        let task = task(temp_dir.path(), "a.bmp", OutputFormat::Png, ConversionOptions::new());

        let args = command_args(&task, &out(temp_dir.path(), "a.png")).unwrap();
        assert!(!args.contains(&"-quality".to_string()));
        assert!(!args.contains(&"-background".to_string()));
    }

    #[test]
    fn test_resize_respects_keep_aspect() {
        let temp_dir = TempDir::new().unwrap();
        let output = out(temp_dir.path(), "a.png");

        let keep = task(
            temp_dir.path(),
            "a.jpg",
            OutputFormat::Png,
            ConversionOptions::new().with(RESOLUTION, "800x600"),
        );
        let args = command_args(&keep, &output).unwrap();
        let pos = args.iter().position(|a| a == "-resize").unwrap();
        assert_eq!(args[pos + 1], "800x600");

        let stretch = task(
            temp_dir.path(),
            "b.jpg",
            OutputFormat::Png,
            ConversionOptions::new()
                .with(RESOLUTION, "800x600")
                .with(KEEP_ASPECT, "false"),
        );
        let args = command_args(&stretch, &output).unwrap();
        let pos = args.iter().position(|a| a == "-resize").unwrap();
        assert_eq!(args[pos + 1], "800x600!");
    }

    #[test]
    fn test_gif_input_takes_first_frame() {
        let temp_dir = TempDir::new().unwrap();
        let task = task(temp_dir.path(), "anim.gif", OutputFormat::Png, ConversionOptions::new());

        let args = command_args(&task, &out(temp_dir.path(), "anim.png")).unwrap();
        assert!(args[0].ends_with("anim.gif[0]"));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let task = task(
            temp_dir.path(),
            "a.png",
            OutputFormat::Jpg,
            ConversionOptions::new().with("fps", "30"),
        );

        let err = command_args(&task, &out(temp_dir.path(), "a.jpg")).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidOptions { key, .. } if key == "fps"));
    }

    #[test]
    fn test_out_of_range_resolution_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let task = task(
            temp_dir.path(),
            "a.png",
            OutputFormat::Jpg,
            ConversionOptions::new().with(RESOLUTION, "0x600"),
        );

        assert!(matches!(
            command_args(&task, &out(temp_dir.path(), "a.jpg")),
            Err(ConversionError::InvalidOptions { .. })
        ));
    }
}
