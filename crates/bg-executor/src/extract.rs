//! Package extraction (§4.6 step 3). Deployment packages are zip archives;
//! extraction is CPU/IO-bound synchronous work, so it runs on the blocking
//! pool the same way the teacher's `mqk-artifacts` writer uses plain
//! `std::fs` rather than an async file API.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExecutorError;

/// Extract the zip archive at `archive_path` into a fresh `dest_dir`,
/// creating it if needed. A malformed archive or a path entry that would
/// escape `dest_dir` (zip-slip) is reported as `ExecutorError::PackageError`.
pub async fn extract_package(archive_path: PathBuf, dest_dir: PathBuf) -> Result<(), ExecutorError> {
    tokio::task::spawn_blocking(move || extract_package_blocking(&archive_path, &dest_dir))
        .await
        .map_err(|e| ExecutorError::Internal(anyhow::anyhow!("extract task panicked: {e}")))?
}

fn extract_package_blocking(archive_path: &Path, dest_dir: &Path) -> Result<(), ExecutorError> {
    fs::create_dir_all(dest_dir)
        .map_err(|e| ExecutorError::PackageError(format!("create extract dir failed: {e}")))?;

    let file = fs::File::open(archive_path)
        .map_err(|e| ExecutorError::PackageError(format!("open package failed: {e}")))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ExecutorError::PackageError(format!("malformed package archive: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ExecutorError::PackageError(format!("malformed package archive: {e}")))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| ExecutorError::PackageError("package entry escapes extract dir".to_string()))?
            .to_owned();
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .map_err(|e| ExecutorError::PackageError(format!("create dir failed: {e}")))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ExecutorError::PackageError(format!("create dir failed: {e}")))?;
        }
        let mut out_file = fs::File::create(&out_path)
            .map_err(|e| ExecutorError::PackageError(format!("write entry failed: {e}")))?;
        std::io::copy(&mut entry, &mut out_file)
            .map_err(|e| ExecutorError::PackageError(format!("write entry failed: {e}")))?;
    }

    Ok(())
}

/// Best-effort removal of a run's extract directory on any exit path (§4.6
/// step 3: "the directory is unlinked on any exit path").
pub fn cleanup_extract_dir(dest_dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dest_dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(dir = %dest_dir.display(), error = %e, "failed to clean up extract dir");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_nested_entries() {
        let tmp = tempdir();
        let archive_path = tmp.join("pkg.zip");
        write_test_zip(&archive_path, &[("src/main.js", b"console.log(1)")]);

        let dest = tmp.join("extracted");
        extract_package(archive_path, dest.clone()).await.unwrap();

        let content = fs::read_to_string(dest.join("src/main.js")).unwrap();
        assert_eq!(content, "console.log(1)");
    }

    #[tokio::test]
    async fn malformed_archive_reports_package_error() {
        let tmp = tempdir();
        let archive_path = tmp.join("bad.zip");
        fs::write(&archive_path, b"not a zip file").unwrap();

        let dest = tmp.join("extracted");
        let err = extract_package(archive_path, dest).await.unwrap_err();
        assert!(matches!(err, ExecutorError::PackageError(_)));
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bg-executor-test-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }
}
