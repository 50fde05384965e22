//! Signing Release files.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

use crate::error::{PublisherError, PublisherResult};

pub trait SigningService {
    /// Sign `release` with `key_id`, writing a detached armored signature to
    /// `detached` and an inline-signed copy to `inline`.
    fn sign_repository(
        &self,
        key_id: &str,
        release: &Path,
        detached: &Path,
        inline: &Path,
    ) -> PublisherResult<()>;
}

/// Signs with the `gpg` command line tool.
#[derive(Debug, Clone)]
pub struct GpgSigner {
    program: PathBuf,
    homedir: Option<PathBuf>,
}

impl GpgSigner {
    pub fn new(homedir: Option<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("gpg"),
            homedir,
        }
    }

    /// Use a different gpg binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, key_id: &str, mode: &[&str], input: &Path, output: &Path) -> PublisherResult<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--batch")
            .arg("--yes")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(homedir) = &self.homedir {
            cmd.arg("--homedir").arg(homedir);
        }

        cmd.arg("--local-user")
            .arg(key_id)
            .args(mode)
            .arg("--output")
            .arg(output)
            .arg(input);

        debug!("Running command: {:?}", cmd);

        let output_result = cmd.output()?;

        if output_result.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            let exit_code = output_result.status.code().unwrap_or(-1);

            error!(
                "Failed to sign {} (exit code {}): {}",
                input.display(),
                exit_code,
                stderr
            );

            Err(PublisherError::Signing(format!(
                "gpg exited with code {}: {}",
                exit_code,
                stderr.trim()
            )))
        }
    }
}

impl SigningService for GpgSigner {
    fn sign_repository(
        &self,
        key_id: &str,
        release: &Path,
        detached: &Path,
        inline: &Path,
    ) -> PublisherResult<()> {
        self.run(key_id, &["--detach-sign", "--armor"], release, detached)?;
        self.run(key_id, &["--clearsign"], release, inline)?;
        info!("Signed {} with {}", release.display(), key_id);
        Ok(())
    }
}
