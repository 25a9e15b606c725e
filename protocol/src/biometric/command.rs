//! External-process feature extractor.
//!
//! Runs a configured program, writes the image to its stdin, and reads iris
//! codes from its stdout. One code per line:
//!
//! ```text
//! right:0f3c...e1
//! left:88a0...04
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. A non-zero exit
//! status is an extraction failure; the first line of stderr becomes the
//! reason. The child is killed when the future is dropped, which is what
//! makes the caller's timeout actually stop the work.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{ExtractionError, EyeSide, FeatureExtractor, IrisCode};

/// Longest stderr excerpt carried into an error message, in characters.
const MAX_REASON_LEN: usize = 200;

/// A [`FeatureExtractor`] backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    args: Vec<String>,
    display_name: String,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let display_name = format!("command:{}", program.display());
        Self {
            program,
            args,
            display_name,
        }
    }

    /// Parse a shell-style command line, split on whitespace. No quoting
    /// support; point it at a wrapper script if you need any.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl FeatureExtractor for CommandExtractor {
    fn name(&self) -> &str {
        &self.display_name
    }

    async fn extract(&self, image: &[u8]) -> Result<Vec<IrisCode>, ExtractionError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractionError::Failed(format!("failed to spawn extractor: {e}")))?;

        // Feed stdin while stdout and stderr drain. A child that writes a lot
        // before it reads would otherwise block on a full pipe.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                // A child that exits before draining stdin closes the pipe on
                // us. Its exit status tells the real story, so the write error
                // is not interesting on its own.
                if let Err(e) = stdin.write_all(image).await {
                    tracing::debug!(error = %e, "extractor closed stdin early");
                }
            }
        };
        let ((), output) = tokio::join!(feed, child.wait_with_output());
        let output = output
            .map_err(|e| ExtractionError::Failed(format!("extractor did not complete: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(stderr.lines().next().unwrap_or("")));
        }

        parse_codes(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Map an extractor's stderr line onto a typed reason where one fits.
fn classify_failure(reason: &str) -> ExtractionError {
    let lowered = reason.to_ascii_lowercase();
    if lowered.contains("no eye") {
        return ExtractionError::NoEyeDetected;
    }
    if lowered.contains("resolution") {
        return ExtractionError::InsufficientResolution;
    }
    if lowered.contains("occlu") {
        return ExtractionError::Occluded;
    }
    if lowered.contains("decode") {
        return ExtractionError::UnreadableFormat;
    }
    let mut reason = reason.trim().to_string();
    let end = reason
        .char_indices()
        .nth(MAX_REASON_LEN)
        .map_or(reason.len(), |(i, _)| i);
    reason.truncate(end);
    if reason.is_empty() {
        reason = "non-zero exit status".into();
    }
    ExtractionError::Failed(reason)
}

/// Parse `side:hex` lines into iris codes, preserving line order.
pub(crate) fn parse_codes(stdout: &str) -> Result<Vec<IrisCode>, ExtractionError> {
    let mut codes = Vec::new();
    for (lineno, line) in stdout.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (side, payload) = line.split_once(':').ok_or_else(|| {
            ExtractionError::InvalidOutput(format!("line {}: missing ':'", lineno + 1))
        })?;
        let eye: EyeSide = side.parse()?;
        let bytes = hex::decode(payload.trim()).map_err(|e| {
            ExtractionError::InvalidOutput(format!("line {}: {e}", lineno + 1))
        })?;
        codes.push(IrisCode::new(eye, bytes));
    }
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometric::Extractor;
    use std::time::Duration;

    #[test]
    fn test_parse_codes_in_line_order() {
        let codes = parse_codes("# pipeline v1\nright:0a0b\n\nleft:ff\n").unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].eye(), EyeSide::Right);
        assert_eq!(codes[0].bytes(), &[0x0a, 0x0b]);
        assert_eq!(codes[1].eye(), EyeSide::Left);
    }

    #[test]
    fn test_parse_codes_rejects_garbage() {
        assert!(matches!(
            parse_codes("nonsense"),
            Err(ExtractionError::InvalidOutput(_))
        ));
        assert!(matches!(
            parse_codes("left:zz"),
            Err(ExtractionError::InvalidOutput(_))
        ));
        assert!(matches!(
            parse_codes("centre:00"),
            Err(ExtractionError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("error: No eye found"),
            ExtractionError::NoEyeDetected
        );
        assert_eq!(
            classify_failure("iris occluded by eyelid"),
            ExtractionError::Occluded
        );
        assert_eq!(
            classify_failure(""),
            ExtractionError::Failed("non-zero exit status".into())
        );
    }

    #[test]
    fn test_classify_failure_truncates_on_char_boundary() {
        let reason = format!("{}é trailing", "x".repeat(MAX_REASON_LEN - 1));
        let ExtractionError::Failed(kept) = classify_failure(&reason) else {
            panic!("expected a generic failure");
        };
        assert_eq!(kept.chars().count(), MAX_REASON_LEN);
        assert!(kept.ends_with('é'));

        let ExtractionError::Failed(kept) = classify_failure(&"ü".repeat(500)) else {
            panic!("expected a generic failure");
        };
        assert_eq!(kept, "ü".repeat(MAX_REASON_LEN));
    }

    #[test]
    fn test_from_command_line() {
        let ex = CommandExtractor::from_command_line("python3 -m iris_cli --eye right").unwrap();
        assert_eq!(ex.name(), "command:python3");
        assert_eq!(ex.args, vec!["-m", "iris_cli", "--eye", "right"]);
        assert!(CommandExtractor::from_command_line("   ").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_extractor_reads_stdout() {
        let ex = CommandExtractor::new(
            "sh",
            vec!["-c".into(), "cat >/dev/null; echo left:00ff; echo right:aa".into()],
        );
        let codes = ex.extract(b"fake image").await.unwrap();
        assert_eq!(codes.len(), 2);
        assert_eq!(codes[0].bytes(), &[0x00, 0xff]);
        assert_eq!(codes[1].eye(), EyeSide::Right);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_extractor_nonzero_exit() {
        let ex = CommandExtractor::new(
            "sh",
            vec!["-c".into(), "cat >/dev/null; echo 'no eye detected' >&2; exit 3".into()],
        );
        let err = ex.extract(b"fake image").await.unwrap_err();
        assert_eq!(err, ExtractionError::NoEyeDetected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_extractor_multibyte_stderr() {
        let script = format!("echo '{}' >&2; exit 1", "ñ".repeat(300));
        let ex = CommandExtractor::new("sh", vec!["-c".into(), script]);
        let err = ex.extract(b"fake image").await.unwrap_err();
        assert_eq!(err, ExtractionError::Failed("ñ".repeat(MAX_REASON_LEN)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_extractor_noisy_before_reading_stdin() {
        // 256 KiB of stderr before the child touches a 1 MiB image: both
        // pipes fill unless they are serviced at the same time.
        let ex = Extractor::new(CommandExtractor::new(
            "sh",
            vec![
                "-c".into(),
                "head -c 262144 /dev/zero >&2; cat >/dev/null; echo left:01".into(),
            ],
        ));
        let image = vec![0x5a; 1 << 20];
        let codes = ex.extract(&image, Duration::from_secs(20)).await.unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].bytes(), &[0x01]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_extractor_killed_on_timeout() {
        let ex = Extractor::new(CommandExtractor::new(
            "sh",
            vec!["-c".into(), "sleep 30".into()],
        ));
        let timeout = Duration::from_millis(200);
        let err = ex.extract(b"", timeout).await.unwrap_err();
        assert_eq!(err, ExtractionError::Timeout(timeout));
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let ex = CommandExtractor::new("/nonexistent/iris-extractor", vec![]);
        assert!(matches!(
            ex.extract(b"img").await,
            Err(ExtractionError::Failed(_))
        ));
    }
}
