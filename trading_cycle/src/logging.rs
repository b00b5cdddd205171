//! Tracing setup for the binary: stdout always, plus an optional log file.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::Path,
    sync::Mutex,
};

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Opens `path` for appending, creating it and its parent directories.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Plain-text fmt layer writing to the file at `path`.
pub fn file_layer(path: &Path) -> Result<BoxedLayer> {
    let file = open_log_file(path)
        .with_context(|| format!("opening log file {}", path.display()))?;
    Ok(fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .boxed())
}

/// Installs the global subscriber. The filter comes from `RUST_LOG` and
/// defaults to `info`; it applies to both outputs.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let file = log_file.map(file_layer).transpose()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(file)
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_appends_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("cycle.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "earlier run\n").unwrap();

        let subscriber = tracing_subscriber::registry().with(file_layer(&path).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(ticker = "AAPL", "cycle finished");
        });

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("earlier run\n"), "{written}");
        assert!(written.contains("cycle finished"), "{written}");
        assert!(written.contains("ticker=\"AAPL\""), "{written}");
        assert!(!written.contains('\u{1b}'), "no ansi escapes: {written:?}");
    }

    #[test]
    fn missing_parent_directories_are_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("cycle.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unopenable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_layer(dir.path()).err().unwrap();
        assert!(err.to_string().contains("opening log file"), "{err}");
    }
}
