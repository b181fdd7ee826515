use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Output};
#[cfg(feature = "leptess")]
use std::sync::Arc;

#[cfg(feature = "leptess")]
use leptess::LepTess;
use tempfile::NamedTempFile;
#[cfg(feature = "leptess")]
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::profile::OcrProfile;
use super::OcrEngine;
use crate::config::{parse_provider_model, OcrConfig};
use crate::error::{Result, SignboardError};

/// Drives the `tesseract` executable through temporary files.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    languages: String,
}

impl TesseractCli {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            executable: PathBuf::from(&config.tesseract_path),
            tessdata_dir: config.tessdata_dir.as_ref().map(PathBuf::from),
            languages: config.languages.clone(),
        }
    }

    /// First line of `tesseract --version`, e.g. `tesseract 5.3.4`.
    pub fn version(&self) -> Result<String> {
        let output = self.run(Command::new(&self.executable).arg("--version"))?;
        // Tesseract 3.x printed the banner on stderr.
        let banner = if output.stdout.is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };
        String::from_utf8_lossy(banner)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| SignboardError::Ocr("tesseract printed no version".to_string()))
    }

    pub fn recognize(&self, png: &[u8], profile: &OcrProfile) -> Result<String> {
        let input = NamedTempFile::with_suffix(".png")?;
        std::fs::write(input.path(), png)?;

        let mut command = Command::new(&self.executable);
        command.arg(input.path()).arg("stdout");
        self.add_common_args(&mut command);
        command.args(profile.args());

        let output = self.run(&mut command)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Render `<image> + text layer` as PDF bytes.
    pub fn searchable_pdf(&self, png: &[u8]) -> Result<Vec<u8>> {
        let input = NamedTempFile::with_suffix(".png")?;
        std::fs::write(input.path(), png)?;

        let out_dir = tempfile::tempdir()?;
        let out_base = out_dir.path().join("searchable");

        let mut command = Command::new(&self.executable);
        command.arg(input.path()).arg(&out_base);
        self.add_common_args(&mut command);
        command.args(OcrProfile::AUTOMATIC.args()).arg("pdf");

        self.run(&mut command)?;

        std::fs::read(out_base.with_extension("pdf"))
            .map_err(|e| SignboardError::Ocr(format!("Failed to read tesseract PDF output: {e}")))
    }

    fn add_common_args(&self, command: &mut Command) {
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        command.arg("-l").arg(&self.languages);
    }

    fn run(&self, command: &mut Command) -> Result<Output> {
        let output = command.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound => SignboardError::OcrUnavailable(format!(
                "tesseract executable not found at '{}'",
                self.executable.display()
            )),
            _ => SignboardError::Ocr(format!("Failed to launch tesseract: {e}")),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SignboardError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output)
    }
}

#[cfg(feature = "leptess")]
fn create_tesseract(config: &OcrConfig) -> std::result::Result<LepTess, String> {
    LepTess::new(config.tessdata_dir.as_deref(), &config.languages).map_err(|e| e.to_string())
}

#[derive(Clone)]
enum OcrBackend {
    Cli {
        cli: TesseractCli,
        version: String,
    },
    #[cfg(feature = "leptess")]
    Local { tesseract: Arc<Mutex<LepTess>> },
    Unavailable { reason: String },
}

/// The configured OCR engine, or the reason there is none.
///
/// Construction never fails: a missing engine degrades to an unavailable
/// provider whose calls return [`SignboardError::OcrUnavailable`].
#[derive(Clone)]
pub struct OcrProvider {
    backend: OcrBackend,
}

impl OcrProvider {
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let (provider, _) = parse_provider_model(&config.model);

        let backend = match provider.as_str() {
            "cli" => {
                let cli = TesseractCli::new(config);
                match cli.version() {
                    Ok(version) => {
                        info!(%version, languages = %config.languages, "Tesseract binary OCR initialized");
                        OcrBackend::Cli { cli, version }
                    }
                    Err(e) => {
                        let reason = format!("Tesseract not available: {e}");
                        warn!("{}", reason);
                        OcrBackend::Unavailable { reason }
                    }
                }
            }
            #[cfg(feature = "leptess")]
            "local" => match create_tesseract(config) {
                Ok(lt) => {
                    info!(languages = %config.languages, "In-process Tesseract OCR initialized");
                    OcrBackend::Local {
                        tesseract: Arc::new(Mutex::new(lt)),
                    }
                }
                Err(e) => {
                    let reason = format!("Tesseract not available: {e}");
                    warn!("{}", reason);
                    OcrBackend::Unavailable { reason }
                }
            },
            #[cfg(not(feature = "leptess"))]
            "local" => {
                let reason =
                    "In-process Tesseract requires building with the `leptess` feature".to_string();
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
            other => {
                let reason = format!("Unknown OCR provider '{other}'");
                warn!("{}", reason);
                OcrBackend::Unavailable { reason }
            }
        };

        Ok(Self { backend })
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            backend: OcrBackend::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.backend, OcrBackend::Unavailable { .. })
    }

    pub fn version(&self) -> Option<&str> {
        match &self.backend {
            OcrBackend::Cli { version, .. } => Some(version.as_str()),
            _ => None,
        }
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.backend {
            OcrBackend::Unavailable { reason } => Some(reason.as_str()),
            _ => None,
        }
    }
}

impl OcrEngine for OcrProvider {
    fn recognize(&self, png: &[u8], profile: &OcrProfile) -> Result<String> {
        match &self.backend {
            OcrBackend::Cli { cli, .. } => cli.recognize(png, profile),
            #[cfg(feature = "leptess")]
            OcrBackend::Local { tesseract } => {
                let mut lt = tesseract.blocking_lock();
                lt.set_variable(
                    leptess::Variable::TesseditPagesegMode,
                    &profile.page_segmentation.to_string(),
                )
                .map_err(|e| SignboardError::Ocr(format!("Failed to set page segmentation: {e:?}")))?;
                lt.set_image_from_mem(png)
                    .map_err(|e| SignboardError::Ocr(format!("Failed to set image: {e}")))?;
                lt.get_utf8_text()
                    .map_err(|e| SignboardError::Ocr(format!("Failed to extract text: {e}")))
            }
            OcrBackend::Unavailable { reason } => {
                Err(SignboardError::OcrUnavailable(reason.clone()))
            }
        }
    }

    fn searchable_pdf(&self, png: &[u8]) -> Result<Vec<u8>> {
        match &self.backend {
            OcrBackend::Cli { cli, .. } => cli.searchable_pdf(png),
            #[cfg(feature = "leptess")]
            OcrBackend::Local { .. } => Err(SignboardError::OcrUnavailable(
                "Searchable PDFs need the tesseract binary (OCR_MODEL=cli/tesseract)".to_string(),
            )),
            OcrBackend::Unavailable { reason } => {
                Err(SignboardError::OcrUnavailable(reason.clone()))
            }
        }
    }

    fn name(&self) -> &str {
        match &self.backend {
            OcrBackend::Cli { .. } => "tesseract-cli",
            #[cfg(feature = "leptess")]
            OcrBackend::Local { .. } => "tesseract-local",
            OcrBackend::Unavailable { .. } => "unavailable",
        }
    }
}
