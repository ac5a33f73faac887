use std::error::Error;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::domain::EncodedImage;

pub const DEFAULT_INSTRUCTION: &str =
    "Опиши этот арт-объект в двух-трёх предложениях: стиль, цвета, настроение.";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub enum DescriptionError {
    NoImage,
    NotConfigured,
    Spawn(std::io::Error),
    Failed { status: Option<i32>, stderr: String },
    Empty,
    Timeout(Duration),
}

impl fmt::Display for DescriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionError::NoImage => write!(f, "add a photo before asking for a description"),
            DescriptionError::NotConfigured => {
                write!(f, "no description service configured (set describe_command)")
            }
            DescriptionError::Spawn(err) => {
                write!(f, "could not start description service: {}", err)
            }
            DescriptionError::Failed { status, stderr } => match status {
                Some(code) => write!(f, "description service exited with {}: {}", code, stderr),
                None => write!(f, "description service was terminated: {}", stderr),
            },
            DescriptionError::Empty => write!(f, "description service returned no text"),
            DescriptionError::Timeout(limit) => {
                write!(f, "description service timed out after {}s", limit.as_secs())
            }
        }
    }
}

impl Error for DescriptionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DescriptionError::Spawn(err) => Some(err),
            _ => None,
        }
    }
}

/// Generates a text description for one encoded image.
#[async_trait]
pub trait DescriptionService: Send + Sync {
    async fn describe(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<String, DescriptionError>;
}

/// Delegates to an external program: the image data URL is written to its
/// stdin, the instruction is passed in `SPOTS_INSTRUCTION`, and trimmed stdout
/// is the description.
#[derive(Debug, Clone)]
pub struct CommandDescriber {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandDescriber {
    pub fn from_argv(argv: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            timeout,
        })
    }

    async fn run(&self, image: &EncodedImage, instruction: &str) -> Result<String, DescriptionError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("SPOTS_INSTRUCTION", instruction)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(DescriptionError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            // A service that ignores stdin may close it early.
            let _ = stdin.write_all(image.as_str().as_bytes()).await;
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(DescriptionError::Spawn)?;
        if !output.status.success() {
            return Err(DescriptionError::Failed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(DescriptionError::Empty);
        }
        Ok(text)
    }
}

#[async_trait]
impl DescriptionService for CommandDescriber {
    async fn describe(
        &self,
        image: &EncodedImage,
        instruction: &str,
    ) -> Result<String, DescriptionError> {
        tokio::time::timeout(self.timeout, self.run(image, instruction))
            .await
            .map_err(|_| DescriptionError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{CommandDescriber, DescriptionError, DescriptionService};
    use crate::domain::EncodedImage;

    fn describer(script: &str, timeout: Duration) -> CommandDescriber {
        let argv = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        CommandDescriber::from_argv(&argv, timeout).expect("argv should be accepted")
    }

    fn image() -> EncodedImage {
        EncodedImage::new("data:image/png;base64,AAAA")
    }

    #[tokio::test]
    async fn returns_trimmed_stdout() {
        let service = describer(
            "payload=$(cat); echo \"  $SPOTS_INSTRUCTION ${#payload}  \"",
            Duration::from_secs(10),
        );
        let text = service
            .describe(&image(), "describe")
            .await
            .expect("command should succeed");
        assert_eq!(text, "describe 26");
    }

    #[tokio::test]
    async fn reports_non_zero_exit_with_stderr() {
        let service = describer("cat >/dev/null; echo quota >&2; exit 3", Duration::from_secs(10));
        let err = service
            .describe(&image(), "x")
            .await
            .expect_err("command should fail");
        match err {
            DescriptionError::Failed { status, stderr } => {
                assert_eq!(status, Some(3));
                assert_eq!(stderr, "quota");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn blank_output_is_an_error() {
        let service = describer("cat >/dev/null; echo '   '", Duration::from_secs(10));
        assert!(matches!(
            service.describe(&image(), "x").await,
            Err(DescriptionError::Empty)
        ));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let service = describer("sleep 5", Duration::from_millis(100));
        assert!(matches!(
            service.describe(&image(), "x").await,
            Err(DescriptionError::Timeout(_))
        ));
    }

    #[test]
    fn empty_argv_is_rejected() {
        assert!(CommandDescriber::from_argv(&[], Duration::from_secs(1)).is_none());
        assert!(CommandDescriber::from_argv(&[" ".to_string()], Duration::from_secs(1)).is_none());
    }
}
