use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{Result, RollError};
use crate::retry::{PlandoValidator, ValidationOutcome};

const DIAGNOSTIC_LINES: usize = 20;

/// How to invoke the external generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub rom: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub compress_rom: String,
    pub create_spoiler: bool,
    /// Stderr marker after which the success summary starts.
    pub success_marker: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            args: vec!["randomizer/OoTRandomizer.py".to_string()],
            rom: None,
            output_dir: PathBuf::from("patches"),
            compress_rom: "Patch".to_string(),
            create_spoiler: true,
            success_marker: "Patching ROM".to_string(),
        }
    }
}

/// Settings document the generator reads from stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    pub rom: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub compress_rom: String,
    pub enable_distribution_file: String,
    pub distribution_file: PathBuf,
    pub create_spoiler: String,
    pub world_count: u32,
}

/// Runs the generator as a child process, one run per call.
#[derive(Debug, Clone)]
pub struct ExternalGenerator {
    config: GeneratorConfig,
    world_count: u32,
}

impl ExternalGenerator {
    pub fn new(config: GeneratorConfig, world_count: u32) -> Self {
        Self {
            config,
            world_count,
        }
    }

    pub fn settings_for(&self, plando: &Path) -> GeneratorSettings {
        let distribution_file =
            std::fs::canonicalize(plando).unwrap_or_else(|_| plando.to_path_buf());
        GeneratorSettings {
            rom: self.config.rom.clone(),
            output_dir: self.config.output_dir.clone(),
            compress_rom: self.config.compress_rom.clone(),
            enable_distribution_file: "True".to_string(),
            distribution_file,
            create_spoiler: if self.config.create_spoiler {
                "True".to_string()
            } else {
                "False".to_string()
            },
            world_count: self.world_count,
        }
    }
}

impl PlandoValidator for ExternalGenerator {
    fn validate(&mut self, plando: &Path) -> Result<ValidationOutcome> {
        let settings = serde_json::to_vec(&self.settings_for(plando))?;

        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg("--settings=-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(command = ?cmd, plando = %plando.display(), "running generator");

        let mut child = cmd.spawn().map_err(|err| {
            RollError::InvalidConfig(format!(
                "cannot start generator '{}': {err}",
                self.config.program.display()
            ))
        })?;
        if let Some(mut stdin) = child.stdin.take() {
            write_settings(&mut stdin, &settings)?;
        }
        let output = child.wait_with_output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            info!(plando = %plando.display(), "generator accepted plando");
            Ok(ValidationOutcome::Accepted {
                summary: success_summary(&stderr, &self.config.success_marker),
            })
        } else {
            Ok(ValidationOutcome::Rejected {
                diagnostic: diagnostic_tail(&stderr),
            })
        }
    }
}

/// A generator that exits without reading its settings is judged by its
/// exit status, so a closed pipe is not an error here.
fn write_settings(stdin: &mut impl Write, settings: &[u8]) -> io::Result<()> {
    match stdin.write_all(settings).and_then(|()| stdin.flush()) {
        Err(err) if err.kind() == ErrorKind::BrokenPipe => {
            debug!("generator closed stdin before reading its settings");
            Ok(())
        }
        other => other,
    }
}

/// Text after the last occurrence of `marker`, or the whole output.
pub fn success_summary(stderr: &str, marker: &str) -> String {
    let tail = match stderr.rfind(marker) {
        Some(idx) if !marker.is_empty() => &stderr[idx + marker.len()..],
        _ => stderr,
    };
    tail.trim().to_string()
}

fn error_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\S*(Error|Exception)\b.*$").ok())
        .as_ref()
}

/// Last lines of stderr, starting at the final error line when there is one.
pub fn diagnostic_tail(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if let Some(found) = error_line().and_then(|re| re.find_iter(trimmed).last()) {
        let from_error = &trimmed[found.start()..];
        if from_error.lines().count() <= DIAGNOSTIC_LINES {
            return from_error.to_string();
        }
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    let start = lines.len().saturating_sub(DIAGNOSTIC_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_starts_after_the_last_marker() {
        let stderr = "Generating\nPatching ROM\nCreating Patch File\nDone. Time taken: 12s\n";
        assert_eq!(
            success_summary(stderr, "Patching ROM"),
            "Creating Patch File\nDone. Time taken: 12s"
        );
        assert_eq!(success_summary("no marker", "Patching ROM"), "no marker");
    }

    #[test]
    fn diagnostic_starts_at_the_final_error() {
        let stderr = "Traceback (most recent call last):\n  File \"Main.py\"\nShuffleError: Placement failed\n";
        assert_eq!(diagnostic_tail(stderr), "ShuffleError: Placement failed");

        let noisy: String = (0..50).map(|i| format!("line {i}\n")).collect();
        let tail = diagnostic_tail(&noisy);
        assert_eq!(tail.lines().count(), DIAGNOSTIC_LINES);
        assert!(tail.ends_with("line 49"));
    }

    #[test]
    fn settings_point_at_the_plando() {
        let generator = ExternalGenerator::new(GeneratorConfig::default(), 2);
        let settings = generator.settings_for(Path::new("data/missing_plando.json"));
        assert_eq!(settings.distribution_file, PathBuf::from("data/missing_plando.json"));
        assert_eq!(settings.enable_distribution_file, "True");
        assert_eq!(settings.create_spoiler, "True");
        assert_eq!(settings.compress_rom, "Patch");
        assert_eq!(settings.world_count, 2);

        let json = serde_json::to_value(&settings).expect("json");
        assert_eq!(json["world_count"], serde_json::json!(2));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_stdin_is_left_to_the_exit_status() {
        write_settings(&mut ClosedPipe, b"{}").expect("broken pipe ignored");

        let mut full = io::Cursor::new([0u8; 1]);
        let err = write_settings(&mut full, b"{}").expect_err("short write");
        assert_eq!(err.kind(), ErrorKind::WriteZero);
    }

    #[cfg(unix)]
    #[test]
    fn generator_exiting_without_reading_is_rejected() {
        let config = GeneratorConfig {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".to_string(),
                "exec 0<&-; echo 'ShuffleError: no settings' >&2; exit 1".to_string(),
            ],
            ..GeneratorConfig::default()
        };
        let mut generator = ExternalGenerator::new(config, 1);
        let outcome = generator
            .validate(Path::new("plando.json"))
            .expect("outcome");
        assert_eq!(
            outcome,
            ValidationOutcome::Rejected {
                diagnostic: "ShuffleError: no settings".to_string(),
            }
        );
    }

    #[test]
    fn missing_program_is_not_retryable() {
        let config = GeneratorConfig {
            program: PathBuf::from(format!("plando-missing-{}", uuid::Uuid::new_v4())),
            args: Vec::new(),
            ..GeneratorConfig::default()
        };
        let mut generator = ExternalGenerator::new(config, 1);
        let err = generator
            .validate(Path::new("plando.json"))
            .expect_err("spawn failure");
        assert!(!err.is_retryable());
    }
}
