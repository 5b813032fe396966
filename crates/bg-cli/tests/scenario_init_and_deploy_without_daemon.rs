use assert_cmd::prelude::*;
use predicates::prelude::*;

/// `init` scaffolds `browsergrid.json` without touching the network.
#[test]
fn init_scaffolds_manifest() -> anyhow::Result<()> {
    let dir = tempdir()?;

    let mut cmd = assert_cmd::Command::cargo_bin("browsergrid")?;
    cmd.args(["init"]).current_dir(dir.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("scaffolded="));

    assert!(dir.path().join("browsergrid.json").exists());
    Ok(())
}

/// `init` refuses to clobber an existing manifest.
#[test]
fn init_refuses_to_overwrite_existing_manifest() -> anyhow::Result<()> {
    let dir = tempdir()?;
    std::fs::write(dir.path().join("browsergrid.json"), "{}")?;

    let mut cmd = assert_cmd::Command::cargo_bin("browsergrid")?;
    cmd.args(["init"]).current_dir(dir.path());
    cmd.assert().failure();
    Ok(())
}

/// `deploy` without a manifest fails with a guiding message, before ever
/// reaching out over the network.
#[test]
fn deploy_without_manifest_fails_fast() -> anyhow::Result<()> {
    let dir = tempdir()?;

    let mut cmd = assert_cmd::Command::cargo_bin("browsergrid")?;
    cmd.args(["deploy"]).current_dir(dir.path());
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("browsergrid init"));
    Ok(())
}

/// Minimal temp-dir helper; avoids pulling in the `tempfile` crate for three tests.
fn tempdir() -> anyhow::Result<TempDir> {
    let path = std::env::temp_dir().join(format!("bg-cli-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&path)?;
    Ok(TempDir(path))
}

struct TempDir(std::path::PathBuf);

impl TempDir {
    fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
