use super::CliError;
use anyhow::Context;
use dendro_core::domain::DendroError;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so that stdout carries only the command summary.
pub(super) fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

pub(super) fn compute_error(error: impl Into<DendroError>) -> CliError {
    CliError::Compute(error.into())
}

pub(super) fn ensure_dir(path: &Path) -> Result<(), CliError> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory '{}'", path.display()))?;
    Ok(())
}

pub(super) fn ensure_parent_dir(path: &Path) -> Result<(), CliError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_parent_dir, init_tracing};
    use tempfile::TempDir;

    #[test]
    fn repeated_tracing_setup_keeps_the_first_subscriber() {
        init_tracing(false);
        init_tracing(true);
        tracing::info!("subscriber still accepts events");
    }

    #[test]
    fn parent_directories_are_created_for_nested_outputs() {
        let temp = TempDir::new().expect("tempdir should be created");
        let target = temp.path().join("a/b/out.csv");
        ensure_parent_dir(&target).expect("parent should be created");
        assert!(temp.path().join("a/b").is_dir());
        ensure_parent_dir(std::path::Path::new("bare.csv")).expect("no parent to create");
    }
}
