//! Cipher adapter
//!
//! Encrypts and decrypts single files with a passphrase by driving an
//! external GnuPG compatible program in symmetric mode.
//!
//! The passphrase travels over the program's stdin (`--passphrase-fd 0`),
//! never as an argument or environment variable, and the program runs in
//! batch mode with loopback pinentry so it can never prompt.

use crate::error::{Result, StashError};
use crate::process;
use crate::progress::ProgressDisplay;
use crate::types::{Passphrase, ToolConfig};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Encrypts and decrypts files with a passphrase
///
/// Implementors provide [`Cipher::seal`] and [`Cipher::open`]; the provided
/// [`Cipher::encrypt`] and [`Cipher::decrypt`] add the overwrite guard and the
/// start/completion progress marker.
pub trait Cipher: Send + Sync {
    /// External programs this cipher needs on `PATH`
    fn required_programs(&self) -> Vec<String>;

    /// Encrypt `input` into `output`, which does not exist yet
    fn seal(&self, input: &Path, output: &Path, secret: &Passphrase) -> Result<()>;

    /// Decrypt `input` into `output`
    fn open(&self, input: &Path, output: &Path, secret: &Passphrase) -> Result<()>;

    /// Encrypt `input` into `output`
    ///
    /// # Errors
    ///
    /// - [`StashError::DestinationExists`] if `output` already exists; nothing
    ///   is invoked in that case
    /// - [`StashError::EncryptFailed`] if the cipher fails
    fn encrypt(
        &self,
        input: &Path,
        output: &Path,
        secret: &Passphrase,
        progress: &ProgressDisplay,
    ) -> Result<()> {
        if output.exists() {
            return Err(StashError::DestinationExists(output.to_path_buf()));
        }
        let mut marker = progress.marker("Encrypting backup...");
        self.seal(input, output, secret)?;
        marker.finish();
        Ok(())
    }

    /// Decrypt `input` into `output`
    ///
    /// # Errors
    ///
    /// [`StashError::DecryptFailed`] carrying the cipher's diagnostics.
    fn decrypt(
        &self,
        input: &Path,
        output: &Path,
        secret: &Passphrase,
        progress: &ProgressDisplay,
    ) -> Result<()> {
        let mut marker = progress.marker("Decrypting backup...");
        self.open(input, output, secret)?;
        marker.finish();
        Ok(())
    }
}

/// [`Cipher`] backed by GnuPG
#[derive(Debug, Clone)]
pub struct GpgCipher {
    program: String,
    algorithm: String,
    armor: bool,
    home: Option<PathBuf>,
}

impl Default for GpgCipher {
    fn default() -> Self {
        Self::from_config(&ToolConfig::default())
    }
}

impl GpgCipher {
    /// Build from tool configuration
    pub fn from_config(config: &ToolConfig) -> Self {
        Self {
            program: config.cipher_program.clone(),
            algorithm: config.cipher_algorithm.clone(),
            armor: config.armor,
            home: config.cipher_home.clone(),
        }
    }

    /// Use `home` as the GnuPG home directory
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(home) = &self.home {
            cmd.arg("--homedir").arg(home);
        }
        cmd
    }

    /// Arguments shared by both directions
    fn batch_args(cmd: &mut Command) {
        cmd.arg("--no-symkey-cache")
            .arg("--pinentry-mode=loopback")
            .arg("--batch")
            .arg("--passphrase-fd")
            .arg("0");
    }
}

impl Cipher for GpgCipher {
    fn required_programs(&self) -> Vec<String> {
        vec![self.program.clone()]
    }

    fn seal(&self, input: &Path, output: &Path, secret: &Passphrase) -> Result<()> {
        let mut cmd = self.command();
        if self.armor {
            cmd.arg("-a");
        }
        cmd.arg("--symmetric")
            .arg(format!("--cipher-algo={}", self.algorithm));
        Self::batch_args(&mut cmd);
        cmd.arg("--output").arg(output).arg(input);

        let result = process::run_captured(&mut cmd, Some(secret.expose()))?;
        if !result.success() {
            return Err(StashError::EncryptFailed(result.diagnostics()));
        }
        debug!("Encrypted {:?} into {:?}", input, output);
        Ok(())
    }

    fn open(&self, input: &Path, output: &Path, secret: &Passphrase) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("--quiet").arg("--decrypt");
        Self::batch_args(&mut cmd);
        cmd.arg("--output").arg(output).arg(input);

        let result = process::run_captured(&mut cmd, Some(secret.expose()))?;
        if !result.success() {
            return Err(StashError::DecryptFailed(result.diagnostics()));
        }
        debug!("Decrypted {:?} into {:?}", input, output);
        Ok(())
    }
}
