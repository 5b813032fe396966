//! Builds the zip package `deploy` uploads. The inverse of
//! `bg-executor::extract`'s unpacking, so entry paths are relative and
//! forward-slash-separated the same way that reader expects.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::FileOptions;

/// Directories/files never bundled into a deployment package.
const SKIP: &[&str] = &[".git", "target", "node_modules", crate::manifest::MANIFEST_FILE];

/// Zips every file under `dir` (recursively, skipping [`SKIP`] entries) and
/// returns the archive bytes. Runs on the blocking pool — this is CPU/IO
/// work, same rationale as `bg-executor`'s extraction.
pub async fn build_package(dir: PathBuf) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || build_package_blocking(&dir))
        .await
        .context("package build task panicked")?
}

fn build_package_blocking(dir: &Path) -> Result<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    let mut writer = zip::ZipWriter::new(&mut buf);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    add_dir(&mut writer, dir, dir, &options)?;
    writer.finish().context("finalizing package archive")?;
    Ok(buf.into_inner())
}

fn add_dir<W: Write + std::io::Seek>(
    writer: &mut zip::ZipWriter<W>,
    root: &Path,
    current: &Path,
    options: &FileOptions,
) -> Result<()> {
    for entry in fs::read_dir(current).with_context(|| format!("reading {}", current.display()))? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        if SKIP.iter().any(|s| name.to_string_lossy() == *s) {
            continue;
        }

        if path.is_dir() {
            add_dir(writer, root, &path, options)?;
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .context("entry escaped package root")?
            .to_string_lossy()
            .replace('\\', "/");
        writer
            .start_file(relative, options.clone())
            .context("starting zip entry")?;
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        writer.write_all(&bytes).context("writing zip entry")?;
    }
    Ok(())
}
