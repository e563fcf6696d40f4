//! Ghostscript wrapper used by the compress operation
//!
//! The program is always run with an explicit argument vector, never through a
//! shell. A run only counts as successful when the process exits with status
//! zero and leaves a non-empty output file behind.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

use crate::config::RasterizerConfig;

/// Ghostscript `PDFSETTINGS` preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Screen,
    Ebook,
    Printer,
}

impl QualityTier {
    pub fn preset(&self) -> &'static str {
        match self {
            QualityTier::Screen => "/screen",
            QualityTier::Ebook => "/ebook",
            QualityTier::Printer => "/printer",
        }
    }
}

impl FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('/').to_lowercase().as_str() {
            "screen" | "low" => Ok(QualityTier::Screen),
            "ebook" | "medium" => Ok(QualityTier::Ebook),
            "printer" | "high" => Ok(QualityTier::Printer),
            other => Err(format!(
                "Unknown quality '{}', expected screen, ebook or printer",
                other
            )),
        }
    }
}

#[derive(Error, Debug)]
pub enum RasterizerError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Rasterizer exited with status {code:?}: {stderr}")]
    Exited { code: Option<i32>, stderr: String },

    #[error("Rasterizer produced no output: {stderr}")]
    EmptyOutput { stderr: String },

    #[error("Rasterizer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rasterizer killed after {0:?}")]
    Timeout(Duration),
}

impl RasterizerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RasterizerError::Timeout(_))
    }
}

/// Runs the external PDF rewriter
#[derive(Debug, Clone)]
pub struct Rasterizer {
    program: PathBuf,
    prefix_args: Vec<String>,
    timeout: Duration,
}

impl Rasterizer {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            timeout,
        }
    }

    pub fn from_config(config: &RasterizerConfig) -> Self {
        Self::new(&config.program, config.timeout()).with_prefix_args(config.prefix_args.clone())
    }

    /// Arguments placed before the fixed Ghostscript arguments
    pub fn with_prefix_args(mut self, args: Vec<String>) -> Self {
        self.prefix_args = args;
        self
    }

    /// The complete argument vector for one run
    pub fn arguments(&self, input: &Path, output: &Path, tier: QualityTier) -> Vec<OsString> {
        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(output);

        let mut args: Vec<OsString> = self.prefix_args.iter().map(OsString::from).collect();
        args.extend([
            OsString::from("-sDEVICE=pdfwrite"),
            OsString::from("-dCompatibilityLevel=1.4"),
            OsString::from(format!("-dPDFSETTINGS={}", tier.preset())),
            OsString::from("-dNOPAUSE"),
            OsString::from("-dQUIET"),
            OsString::from("-dBATCH"),
            output_arg,
            input.as_os_str().to_os_string(),
        ]);
        args
    }

    /// Rewrite `input` into `output` with the given preset
    pub async fn compress(
        &self,
        input: &Path,
        output: &Path,
        tier: QualityTier,
    ) -> Result<(), RasterizerError> {
        let result = self.run(input, output, tier).await;
        if result.is_err() {
            // Never leave a half-written file where a result is expected
            let _ = tokio::fs::remove_file(output).await;
        }
        result
    }

    async fn run(&self, input: &Path, output: &Path, tier: QualityTier) -> Result<(), RasterizerError> {
        let child = Command::new(&self.program)
            .args(self.arguments(input, output, tier))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RasterizerError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        tracing::debug!(
            program = %self.program.display(),
            input = %input.display(),
            quality = tier.preset(),
            "Rasterizer started"
        );

        // Dropping the wait future on timeout drops the child, which kills it
        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, input = %input.display(), "Rasterizer timed out");
                return Err(RasterizerError::Timeout(self.timeout));
            }
        };

        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();

        if !result.status.success() {
            return Err(RasterizerError::Exited {
                code: result.status.code(),
                stderr,
            });
        }

        let written = tokio::fs::metadata(output)
            .await
            .map(|meta| meta.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(RasterizerError::EmptyOutput { stderr });
        }

        tracing::debug!(output = %output.display(), bytes = written, "Rasterizer finished");
        Ok(())
    }
}
