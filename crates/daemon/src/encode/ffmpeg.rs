//! FFmpeg encoder invoker.
//!
//! Runs one ffmpeg subprocess per (input, resolution) pair, scaling the
//! video and stream-copying the audio. The command is built as an argv
//! array, never through a shell, so filenames with metacharacters are
//! passed unambiguously as single arguments.

use super::Resolution;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::info;

/// Error type for transcode operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// ffmpeg process exited with non-zero status
    #[error("ffmpeg failed with exit code: {0}")]
    FfmpegFailed(i32),

    /// ffmpeg process was terminated by signal
    #[error("ffmpeg process was terminated by signal")]
    FfmpegTerminated,

    /// IO error while spawning or waiting on the subprocess
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for one ffmpeg transcode run
#[derive(Debug, Clone)]
pub struct TranscodeParams {
    /// Path to the accumulated upload file
    pub input_path: PathBuf,
    /// Target resolution for this run
    pub resolution: Resolution,
    /// Directory where the scaled output is written
    pub output_dir: PathBuf,
}

impl TranscodeParams {
    /// Create new transcode parameters
    pub fn new(input_path: PathBuf, resolution: Resolution, output_dir: PathBuf) -> Self {
        Self {
            input_path,
            resolution,
            output_dir,
        }
    }

    /// Deterministic destination path: the input filename prefixed with the
    /// resolution label, under the output directory.
    pub fn output_path(&self) -> PathBuf {
        let input_name = self
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output_dir
            .join(format!("{}_{}", self.resolution.label, input_name))
    }
}

/// Build the ffmpeg command for one transcode run.
///
/// `ffmpeg -i <input> -vf scale=<W:H> -c:a copy <output>`
pub fn build_ffmpeg_command(params: &TranscodeParams) -> Command {
    let mut cmd = Command::new("ffmpeg");

    cmd.arg("-i").arg(&params.input_path);
    cmd.arg("-vf")
        .arg(format!("scale={}", params.resolution.scale));
    cmd.arg("-c:a").arg("copy");
    cmd.arg(params.output_path());

    cmd
}

/// Execute one ffmpeg transcode run, waiting for the subprocess to exit.
///
/// Spawns exactly one subprocess per call. A non-zero exit or signal
/// termination is returned as an error for the caller to log; it never
/// propagates out of the parent job as a panic.
pub fn run_ffmpeg(params: &TranscodeParams) -> Result<(), EncodeError> {
    info!(
        label = params.resolution.label,
        input = %params.input_path.display(),
        "starting ffmpeg"
    );

    let mut cmd = build_ffmpeg_command(params);
    let status = cmd.status()?;

    if status.success() {
        info!(
            label = params.resolution.label,
            output = %params.output_path().display(),
            "ffmpeg finished"
        );
        Ok(())
    } else {
        match status.code() {
            Some(code) => Err(EncodeError::FfmpegFailed(code)),
            None => Err(EncodeError::FfmpegTerminated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::resolution_for_label;
    use proptest::prelude::*;
    use std::ffi::OsStr;

    /// Helper to convert Command args to a Vec of strings for easier testing
    fn get_command_args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .filter_map(|arg| arg.to_str().map(String::from))
            .collect()
    }

    /// Helper to check if args contain a flag with a specific value
    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2)
            .any(|pair| pair[0] == flag && pair[1] == value)
    }

    #[test]
    fn test_output_path_prefixes_label() {
        let params = TranscodeParams::new(
            PathBuf::from("./upload/abc_clip.mp4"),
            resolution_for_label("144p").unwrap(),
            PathBuf::from("./static/videostore"),
        );

        assert_eq!(
            params.output_path(),
            PathBuf::from("./static/videostore/144p_abc_clip.mp4")
        );
    }

    #[test]
    fn test_command_shape_for_144p() {
        let params = TranscodeParams::new(
            PathBuf::from("./upload/abc_clip.mp4"),
            resolution_for_label("144p").unwrap(),
            PathBuf::from("./static/videostore"),
        );

        let cmd = build_ffmpeg_command(&params);
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("ffmpeg"));
        assert!(has_flag_with_value(&args, "-i", "./upload/abc_clip.mp4"));
        assert!(has_flag_with_value(&args, "-vf", "scale=256:144"));
        assert!(has_flag_with_value(&args, "-c:a", "copy"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("./static/videostore/144p_abc_clip.mp4")
        );
    }

    #[test]
    fn test_filename_with_metacharacters_stays_one_argument() {
        let params = TranscodeParams::new(
            PathBuf::from("./upload/id_my clip; rm -rf.mp4"),
            resolution_for_label("144p").unwrap(),
            PathBuf::from("./static/videostore"),
        );

        let cmd = build_ffmpeg_command(&params);
        let args = get_command_args(&cmd);

        // The whole path is one argv entry, no shell quoting involved
        assert!(has_flag_with_value(&args, "-i", "./upload/id_my clip; rm -rf.mp4"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("./static/videostore/144p_id_my clip; rm -rf.mp4")
        );
    }

    // Strategy for generating file-name-like strings
    fn file_name_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9_. -]{1,40}")
            .unwrap()
            .prop_filter("plain file name", |s| {
                !s.trim().is_empty() && s != "." && s != ".."
            })
    }

    // *For any* input filename and resolution table entry, the built command
    // carries input, scale filter, audio stream-copy, and the label-prefixed
    // output path.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_ffmpeg_command_completeness(
            file_name in file_name_strategy(),
            resolution_idx in 0usize..crate::encode::RESOLUTION_TABLE.len(),
        ) {
            let resolution = crate::encode::RESOLUTION_TABLE[resolution_idx];
            let input_path = PathBuf::from("upload").join(&file_name);
            let params = TranscodeParams::new(
                input_path.clone(),
                resolution,
                PathBuf::from("videostore"),
            );

            let cmd = build_ffmpeg_command(&params);
            let args = get_command_args(&cmd);

            prop_assert_eq!(cmd.get_program(), OsStr::new("ffmpeg"));

            prop_assert!(
                has_flag_with_value(&args, "-i", &input_path.to_string_lossy()),
                "command should contain -i with input path, args: {:?}",
                args
            );

            let scale = format!("scale={}", resolution.scale);
            prop_assert!(
                has_flag_with_value(&args, "-vf", &scale),
                "command should contain -vf {}, args: {:?}",
                scale, args
            );

            prop_assert!(
                has_flag_with_value(&args, "-c:a", "copy"),
                "command should stream-copy audio, args: {:?}",
                args
            );

            let expected_output = PathBuf::from("videostore")
                .join(format!("{}_{}", resolution.label, file_name));
            prop_assert_eq!(
                args.last().map(String::as_str),
                expected_output.to_str(),
                "output path should be the final argument"
            );
        }
    }
}
