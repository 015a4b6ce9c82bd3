//! Filesystem exporter: copies artifact files into `<export_dir>/<export_name>/`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use buildmux_core::{Artifact, ArtifactExporter, ExportName};
use tracing::info;

#[derive(Debug, Clone)]
pub struct FsExporter {
    export_dir: PathBuf,
}

impl FsExporter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    /// Directory an export name is published into.
    pub fn destination(&self, name: &ExportName) -> PathBuf {
        self.export_dir.join(name.as_str())
    }

    async fn copy_all(&self, name: &ExportName, artifact: &Artifact) -> anyhow::Result<Vec<PathBuf>> {
        if artifact.files.is_empty() {
            anyhow::bail!("artifact for {name} contains no files");
        }

        let dest = self.destination(name);
        tokio::fs::create_dir_all(&dest)
            .await
            .with_context(|| format!("cannot create {}", dest.display()))?;

        let mut written = Vec::with_capacity(artifact.files.len());
        for file in &artifact.files {
            let target = dest.join(file_name(file)?);
            tokio::fs::copy(file, &target).await.with_context(|| {
                format!("cannot copy {} to {}", file.display(), target.display())
            })?;
            written.push(target);
        }
        Ok(written)
    }
}

fn file_name(path: &Path) -> anyhow::Result<&std::ffi::OsStr> {
    path.file_name()
        .with_context(|| format!("{} has no file name", path.display()))
}

#[async_trait]
impl ArtifactExporter for FsExporter {
    async fn export(&self, name: &ExportName, artifact: &Artifact) -> Result<(), String> {
        let written = self
            .copy_all(name, artifact)
            .await
            .map_err(|e| format!("{e:#}"))?;
        info!(
            export_name = %name,
            files = written.len(),
            dest = %self.destination(name).display(),
            "exported"
        );
        Ok(())
    }
}
