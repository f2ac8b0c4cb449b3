use crate::agents::manifest::ManifestSnapshot;
use crate::agents::version_control::VersionControlAgent;
use crate::error::Result;

/// Undoes a manifest mutation after a failed or isolated attempt.
pub trait ManifestRestorer {
    fn restore(&self, snapshot: &ManifestSnapshot) -> Result<()>;

    /// Record the manifest on disk as the state later restores return to.
    fn checkpoint(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes the bytes captured before the attempt back to disk.
#[derive(Debug, Default)]
pub struct SnapshotRestorer;

impl ManifestRestorer for SnapshotRestorer {
    fn restore(&self, snapshot: &ManifestSnapshot) -> Result<()> {
        snapshot.write_back()
    }
}

/// Reverts the manifest with `git checkout -- package.json`, which reads
/// from the index. Checkpoints stage the manifest so that a restore returns
/// to the last accepted state rather than the last commit.
///
/// The snapshot is ignored.
pub struct GitRestorer {
    agent: VersionControlAgent,
}

impl GitRestorer {
    pub fn new(agent: VersionControlAgent) -> Self {
        Self { agent }
    }
}

impl ManifestRestorer for GitRestorer {
    fn restore(&self, _snapshot: &ManifestSnapshot) -> Result<()> {
        self.agent.restore_manifest()
    }

    fn checkpoint(&self) -> Result<()> {
        self.agent.stage_manifest()
    }
}
