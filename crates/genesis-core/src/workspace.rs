//! Per-message workspace tree.
//!
//! Each processed message owns a directory
//! `<root>/<conversation_id>/<message_id>/` with one subdirectory per
//! executed step, `<step_index>_<tool_name>/`. Conversations never share
//! paths. Cleanup is deferred until the message completes and is skipped
//! entirely when the keep-workspace flag is set.

use std::path::{Path, PathBuf};

use tracing::debug;

use genesis_types::{GenesisError, Result};

/// Reject identifiers that could escape the tree.
fn validate_component(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(GenesisError::InvariantViolation {
            reason: format!("unsafe path component '{name}'"),
        });
    }
    Ok(())
}

/// The workspace for one message.
#[derive(Debug, Clone)]
pub struct MessageWorkspace {
    root: PathBuf,
}

impl MessageWorkspace {
    /// Create (and mkdir) the workspace for a message.
    pub async fn create(
        workspace_root: &Path,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Self> {
        validate_component(conversation_id)?;
        validate_component(message_id)?;
        let root = workspace_root.join(conversation_id).join(message_id);
        tokio::fs::create_dir_all(&root).await?;
        debug!(path = %root.display(), "message workspace created");
        Ok(Self { root })
    }

    /// The message-level root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory for one step, `<step_index>_<tool_name>/`.
    pub fn step_dir(&self, step_index: usize, tool_name: &str) -> PathBuf {
        self.root.join(format!("{step_index}_{tool_name}"))
    }

    /// Create and return a step directory.
    pub async fn ensure_step_dir(&self, step_index: usize, tool_name: &str) -> Result<PathBuf> {
        validate_component(tool_name)?;
        let dir = self.step_dir(step_index, tool_name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Remove the tree unless `keep` is set. Missing trees are fine.
    pub async fn cleanup(&self, keep: bool) -> Result<()> {
        if keep {
            debug!(path = %self.root.display(), "keeping workspace");
            return Ok(());
        }
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_nested_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = MessageWorkspace::create(tmp.path(), "conv-1", "msg-1")
            .await
            .unwrap();
        assert!(ws.root().is_dir());

        let step = ws.ensure_step_dir(0, "image_ocr").await.unwrap();
        assert!(step.is_dir());
        assert!(step.ends_with("0_image_ocr"));
    }

    #[tokio::test]
    async fn distinct_conversations_get_disjoint_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let a = MessageWorkspace::create(tmp.path(), "conv-a", "msg-1")
            .await
            .unwrap();
        let b = MessageWorkspace::create(tmp.path(), "conv-b", "msg-1")
            .await
            .unwrap();
        assert_ne!(a.root(), b.root());
        assert!(!a.root().starts_with(b.root()));
        assert!(!b.root().starts_with(a.root()));
    }

    #[tokio::test]
    async fn cleanup_removes_unless_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = MessageWorkspace::create(tmp.path(), "conv-1", "msg-1")
            .await
            .unwrap();
        ws.ensure_step_dir(0, "save_text").await.unwrap();

        ws.cleanup(true).await.unwrap();
        assert!(ws.root().exists());

        ws.cleanup(false).await.unwrap();
        assert!(!ws.root().exists());

        // Second cleanup of a missing tree is not an error.
        ws.cleanup(false).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_traversal_components() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(MessageWorkspace::create(tmp.path(), "../evil", "msg")
            .await
            .is_err());
        assert!(MessageWorkspace::create(tmp.path(), "conv", "a/b")
            .await
            .is_err());

        let ws = MessageWorkspace::create(tmp.path(), "conv", "msg")
            .await
            .unwrap();
        assert!(ws.ensure_step_dir(0, "..").await.is_err());
    }
}
