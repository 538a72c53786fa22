//! Converting office documents to PDF
//!
//! Conversion is an external collaborator: the session hands non-PDF uploads to
//! a [`DocumentConverter`] and only ever sees the resulting PDF bytes.

use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing::debug;

use crate::error::{Error, Result};

/// Turns an uploaded document into PDF bytes
pub trait DocumentConverter {
    fn convert(&self, name: &str, bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Whether an upload must be converted before it can be previewed
pub fn needs_conversion(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

/// Converts with a headless LibreOffice install
///
/// Tries `soffice` first, then `libreoffice`, unless a program was set
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct SofficeConverter {
    program: Option<String>,
}

impl SofficeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable instead of searching for one
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn candidates(&self) -> Vec<&str> {
        match &self.program {
            Some(program) => vec![program.as_str()],
            None => vec!["soffice", "libreoffice"],
        }
    }
}

impl DocumentConverter for SofficeConverter {
    fn convert(&self, name: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        let workdir = TempDir::new()?;
        let extension = Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "docx".to_string());
        let input = workdir.path().join(format!("input.{}", extension));
        std::fs::write(&input, bytes)?;

        let mut last_error = String::from("no converter program found");
        for program in self.candidates() {
            debug!(program, document = name, "converting to PDF");
            let status = Command::new(program)
                .arg("--headless")
                .arg("--convert-to")
                .arg("pdf")
                .arg("--outdir")
                .arg(workdir.path())
                .arg(&input)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();

            match status {
                Ok(status) if status.success() => {
                    let output = input.with_extension("pdf");
                    if output.exists() {
                        return Ok(std::fs::read(output)?);
                    }
                    last_error = format!("{} produced no PDF", program);
                }
                Ok(status) => last_error = format!("{} exited with {}", program, status),
                Err(e) => last_error = format!("{}: {}", program, e),
            }
        }

        Err(Error::Conversion(format!(
            "unable to convert {}: {}. Install LibreOffice (soffice)",
            name, last_error
        )))
    }
}
