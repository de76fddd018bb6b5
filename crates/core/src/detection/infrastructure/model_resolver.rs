use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("download from {url} returned an empty body")]
    EmptyDownload { url: String },
    #[error("{name} not found locally and no download URL is configured")]
    NotFound { name: String },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model or cascade file by name, checking local locations before downloading.
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. Bundled directory (`--models-dir`, or files shipped next to the binary)
/// 3. Download from `url` into the cache, when a URL is given
pub fn resolve(
    name: &str,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, name, url, bundled_dir, progress)
}

fn resolve_in(
    cache_dir: &Path,
    name: &str,
    url: Option<&str>,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = url else {
        return Err(ModelResolveError::NotFound {
            name: name.to_string(),
        });
    };
    log::info!("Downloading {name} from {url}");
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/VisionX/models/`
/// - Linux: `$XDG_CACHE_HOME/VisionX/models/` or `~/.cache/VisionX/models/`
/// - Windows: `%LOCALAPPDATA%/VisionX/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("VisionX").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("VisionX").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

/// Downloads into `<dest>.part`, renaming only once the body is complete.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let part_path = dest.with_extension("part");
    let result = fetch_to(url, &part_path, progress).and_then(|()| {
        fs::rename(&part_path, dest).map_err(|e| write_error(dest, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&part_path);
    }
    result
}

fn fetch_to(url: &str, path: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let file = fs::File::create(path).map_err(|e| write_error(path, e))?;
    let mut writer = ProgressWriter {
        inner: io::BufWriter::new(file),
        written: 0,
        total: response.content_length().unwrap_or(0),
        progress,
    };
    io::copy(&mut response, &mut writer).map_err(|e| write_error(path, e))?;
    writer.flush().map_err(|e| write_error(path, e))?;
    if writer.written == 0 {
        return Err(ModelResolveError::EmptyDownload {
            url: url.to_string(),
        });
    }
    log::debug!("Fetched {} bytes into {}", writer.written, path.display());
    Ok(())
}

fn write_error(path: &Path, source: io::Error) -> ModelResolveError {
    ModelResolveError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Reports cumulative bytes to the progress callback as they are written.
struct ProgressWriter<W: Write> {
    inner: W,
    written: u64,
    total: u64,
    progress: Option<ProgressFn>,
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        if let Some(cb) = &self.progress {
            cb(self.written, self.total);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_prefers_cached_file() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&bundled).unwrap();
        fs::write(cache.join("eye.xml"), b"cached").unwrap();
        fs::write(bundled.join("eye.xml"), b"bundled").unwrap();

        let path = resolve_in(&cache, "eye.xml", None, Some(&bundled), None).unwrap();
        assert_eq!(path, cache.join("eye.xml"));
    }

    #[test]
    fn test_resolve_falls_back_to_bundled_file() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let bundled = tmp.path().join("bundled");
        fs::create_dir_all(&bundled).unwrap();
        fs::write(bundled.join("model.onnx"), b"bundled model").unwrap();

        let path = resolve_in(
            &cache,
            "model.onnx",
            Some("http://invalid.example.com/model.onnx"),
            Some(&bundled),
            None,
        )
        .unwrap();
        assert_eq!(path, bundled.join("model.onnx"));
        assert!(!cache.exists());
    }

    #[test]
    fn test_resolve_without_url_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_in(tmp.path(), "yolov8n.onnx", None, None, None).unwrap_err();
        assert!(matches!(err, ModelResolveError::NotFound { .. }));
        assert!(err.to_string().contains("yolov8n.onnx"));
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("VisionX"));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    #[ignore = "requires network access"]
    fn test_download_to_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("haarcascade_eye.xml");

        let progress_called = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = progress_called.clone();

        let result = download(
            &crate::shared::constants::cascade_url("haarcascade_eye.xml"),
            &dest,
            Some(Box::new(move |_downloaded, _total| {
                flag.store(true, std::sync::atomic::Ordering::Relaxed);
            })),
        );
        assert!(result.is_ok(), "download failed: {:?}", result.err());
        assert!(!fs::read(&dest).unwrap().is_empty());
        assert!(progress_called.load(std::sync::atomic::Ordering::Relaxed));
    }

    #[test]
    fn test_download_invalid_url_returns_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let _ = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
