//! Tarball download with bounded exponential backoff, and unpacking

use crate::core::error::{PublishResult, RegistryError, ResultExt};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Retry schedule for downloads: `base * 2^n` between attempts
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
  pub attempts: u32,
  pub base_delay: Duration,
}

impl Default for Backoff {
  fn default() -> Self {
    Self {
      attempts: 10,
      base_delay: Duration::from_millis(100),
    }
  }
}

impl Backoff {
  /// Delay after the given (zero-based) failed attempt
  pub fn delay_after(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(1u32 << attempt.min(16))
  }
}

/// Run `op` until it succeeds or the schedule is exhausted.
///
/// On exhaustion returns the last error message.
pub fn retry<T, F>(backoff: Backoff, what: &str, mut op: F) -> Result<T, String>
where
  F: FnMut(u32) -> Result<T, String>,
{
  let mut last_error = String::from("no attempt made");
  for attempt in 0..backoff.attempts {
    match op(attempt) {
      Ok(value) => return Ok(value),
      Err(e) => {
        last_error = e;
        if attempt + 1 < backoff.attempts {
          let delay = backoff.delay_after(attempt);
          tracing::warn!(
            attempt = attempt + 1,
            of = backoff.attempts,
            delay_ms = delay.as_millis() as u64,
            "{} failed: {}",
            what,
            last_error
          );
          thread::sleep(delay);
        }
      }
    }
  }
  Err(last_error)
}

/// Blocking HTTP client for registry downloads
pub fn http_client() -> PublishResult<reqwest::blocking::Client> {
  reqwest::blocking::Client::builder()
    .user_agent(concat!("stable-publish/", env!("CARGO_PKG_VERSION")))
    .timeout(Duration::from_secs(120))
    .build()
    .map_err(|e| {
      RegistryError::Download {
        url: String::new(),
        attempts: 0,
        reason: format!("failed to build HTTP client: {}", e),
      }
      .into()
    })
}

/// Download `url` into `dest`, retrying on any failure
pub fn download_with_retry(
  client: &reqwest::blocking::Client,
  url: &str,
  dest: &Path,
  backoff: Backoff,
) -> PublishResult<()> {
  let bytes = retry(backoff, &format!("GET {}", url), |_| {
    let response = client.get(url).send().map_err(|e| e.to_string())?;
    if !response.status().is_success() {
      return Err(format!("download failed with status {}", response.status()));
    }
    response.bytes().map_err(|e| e.to_string())
  })
  .map_err(|reason| RegistryError::Download {
    url: url.to_string(),
    attempts: backoff.attempts,
    reason,
  })?;

  fs::write(dest, &bytes).with_context(|| format!("Failed to write {}", dest.display()))?;
  tracing::debug!(url, bytes = bytes.len(), "downloaded tarball");
  Ok(())
}

/// Unpack a gzip'd tarball under `dest` and return the package root
///
/// Registry tarballs put everything under `package/`; if the archive uses a
/// different single top-level directory, that one is the root.
pub fn unpack(archive: &Path, dest: &Path) -> PublishResult<PathBuf> {
  let extract_err = |reason: String| RegistryError::Extract {
    archive: archive.to_path_buf(),
    reason,
  };

  fs::create_dir_all(dest)?;
  let file = File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
  let mut tarball = tar::Archive::new(GzDecoder::new(file));
  tarball.unpack(dest).map_err(|e| extract_err(e.to_string()))?;

  let conventional = dest.join("package");
  if conventional.is_dir() {
    return Ok(conventional);
  }

  let mut top_level = Vec::new();
  for entry in fs::read_dir(dest)? {
    let entry = entry?;
    top_level.push(entry.path());
  }
  match top_level.as_slice() {
    [single] if single.is_dir() => Ok(single.clone()),
    _ => Ok(dest.to_path_buf()),
  }
}
