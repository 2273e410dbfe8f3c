//! Video resolution probing.

use super::SourceError;
use std::path::Path;
use std::process::{Command, Stdio};

/// Determines the frame size of a video before decoding starts.
pub trait ResolutionProbe {
    /// Returns `(width, height)` of the first video stream.
    fn resolution(&self, path: &Path) -> Result<(u32, u32), SourceError>;
}

/// Probes resolution with `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    program: String,
}

impl FfprobeProbe {
    /// Creates a probe running the given ffprobe binary.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl ResolutionProbe for FfprobeProbe {
    fn resolution(&self, path: &Path) -> Result<(u32, u32), SourceError> {
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height",
                "-of",
                "csv=s=x:p=0",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SourceError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SourceError::Probe(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let resolution = parse_resolution(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!(
            path = %path.display(),
            width = resolution.0,
            height = resolution.1,
            "Probed resolution"
        );
        Ok(resolution)
    }
}

/// Parses ffprobe's `WIDTHxHEIGHT` output.
pub fn parse_resolution(output: &str) -> Result<(u32, u32), SourceError> {
    let line = output.lines().next().unwrap_or_default().trim();
    let (width, height) = line
        .split_once('x')
        .ok_or_else(|| SourceError::Probe(format!("unexpected ffprobe output: {line:?}")))?;

    let parse = |value: &str| {
        value
            .trim()
            .parse::<u32>()
            .map_err(|e| SourceError::Probe(format!("invalid dimension {value:?}: {e}")))
    };
    Ok((parse(width)?, parse(height)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1920x1080\n").unwrap(), (1920, 1080));
        assert_eq!(parse_resolution("640x360").unwrap(), (640, 360));
    }

    #[test]
    fn test_parse_resolution_rejects_garbage() {
        assert!(matches!(parse_resolution(""), Err(SourceError::Probe(_))));
        assert!(matches!(parse_resolution("1920"), Err(SourceError::Probe(_))));
        assert!(matches!(parse_resolution("wide x tall"), Err(SourceError::Probe(_))));
    }

    #[test]
    fn test_missing_ffprobe() {
        let probe = FfprobeProbe::new("vqscore-no-such-ffprobe");
        assert!(matches!(
            probe.resolution(Path::new("video.mkv")),
            Err(SourceError::Spawn { .. })
        ));
    }
}
