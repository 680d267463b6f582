//! Semantic artifact types that tools transform between.
//!
//! A [`WorkflowType`] tags the kind of artifact flowing through a tool
//! chain. Tools are edges in a graph whose vertices are these types, so
//! the set is deliberately small and closed.

use serde::{Deserialize, Serialize};

/// The semantic kind of an artifact.
///
/// `None` is reserved for the request boundary (a message with no
/// attachments); no tool may declare it as input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowType {
    Image,
    Audio,
    Video,
    Text,
    Pdf,
    TextFile,
    Table,
    Json,
    None,
}

impl WorkflowType {
    /// All concrete (non-`None`) types, in declaration order.
    pub const ALL: [WorkflowType; 8] = [
        WorkflowType::Image,
        WorkflowType::Audio,
        WorkflowType::Video,
        WorkflowType::Text,
        WorkflowType::Pdf,
        WorkflowType::TextFile,
        WorkflowType::Table,
        WorkflowType::Json,
    ];

    /// Human-readable display name.
    pub fn display_name(self) -> &'static str {
        match self {
            WorkflowType::Image => "image",
            WorkflowType::Audio => "audio",
            WorkflowType::Video => "video",
            WorkflowType::Text => "text",
            WorkflowType::Pdf => "PDF document",
            WorkflowType::TextFile => "text file",
            WorkflowType::Table => "table",
            WorkflowType::Json => "JSON",
            WorkflowType::None => "none",
        }
    }

    /// MIME prefixes that map to this type during attachment detection.
    pub fn mime_prefixes(self) -> &'static [&'static str] {
        match self {
            WorkflowType::Image => &["image/"],
            WorkflowType::Audio => &["audio/"],
            WorkflowType::Video => &["video/"],
            WorkflowType::Text => &[],
            WorkflowType::Pdf => &["application/pdf"],
            WorkflowType::TextFile => &["text/plain", "text/markdown"],
            WorkflowType::Table => &["text/csv", "application/vnd.ms-excel"],
            WorkflowType::Json => &["application/json"],
            WorkflowType::None => &[],
        }
    }

    /// Detect a type from a MIME string, if any prefix matches.
    ///
    /// Longer prefixes win so that `text/csv` resolves to [`Table`] rather
    /// than falling through to a generic text match.
    ///
    /// [`Table`]: WorkflowType::Table
    pub fn from_mime(mime: &str) -> Option<WorkflowType> {
        let mut best: Option<(usize, WorkflowType)> = None;
        for ty in WorkflowType::ALL {
            for prefix in ty.mime_prefixes() {
                if mime.starts_with(prefix) {
                    let better = match best {
                        Some((len, _)) => prefix.len() > len,
                        None => true,
                    };
                    if better {
                        best = Some((prefix.len(), ty));
                    }
                }
            }
        }
        best.map(|(_, ty)| ty)
    }

    /// File extensions a produced artifact of this type may carry.
    ///
    /// The executor checks a handler's output file against this set and
    /// treats a mismatch as a broken invariant.
    pub fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            WorkflowType::Image => &["png", "jpg", "jpeg", "gif", "webp", "bmp"],
            WorkflowType::Audio => &["wav", "mp3", "flac", "ogg", "m4a"],
            WorkflowType::Video => &["mp4", "mov", "mkv", "webm"],
            WorkflowType::Text | WorkflowType::TextFile => &["txt", "md"],
            WorkflowType::Pdf => &["pdf"],
            WorkflowType::Table => &["csv", "tsv"],
            WorkflowType::Json => &["json"],
            WorkflowType::None => &[],
        }
    }

    /// File extension used when an in-memory tool output of this type is
    /// serialized to the step workspace.
    pub fn extension(self) -> &'static str {
        match self {
            WorkflowType::Image => "png",
            WorkflowType::Audio => "wav",
            WorkflowType::Video => "mp4",
            WorkflowType::Text | WorkflowType::TextFile => "txt",
            WorkflowType::Pdf => "pdf",
            WorkflowType::Table => "csv",
            WorkflowType::Json => "json",
            WorkflowType::None => "bin",
        }
    }

    /// Whether this type can carry user-facing content.
    ///
    /// Used by the planner as the fallback sink set when the classifier
    /// cannot decide which output types would satisfy the request.
    pub fn is_content_bearing(self) -> bool {
        !matches!(self, WorkflowType::None)
    }
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mime_basic_detection() {
        assert_eq!(WorkflowType::from_mime("image/png"), Some(WorkflowType::Image));
        assert_eq!(WorkflowType::from_mime("audio/wav"), Some(WorkflowType::Audio));
        assert_eq!(
            WorkflowType::from_mime("application/pdf"),
            Some(WorkflowType::Pdf)
        );
    }

    #[test]
    fn from_mime_longest_prefix_wins() {
        // text/csv is a Table, not a TextFile.
        assert_eq!(WorkflowType::from_mime("text/csv"), Some(WorkflowType::Table));
        assert_eq!(
            WorkflowType::from_mime("text/plain"),
            Some(WorkflowType::TextFile)
        );
    }

    #[test]
    fn from_mime_unknown_returns_none() {
        assert_eq!(WorkflowType::from_mime("application/x-xyz"), None);
    }

    #[test]
    fn serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&WorkflowType::TextFile).unwrap();
        assert_eq!(json, "\"TEXT_FILE\"");
        let back: WorkflowType = serde_json::from_str("\"IMAGE\"").unwrap();
        assert_eq!(back, WorkflowType::Image);
    }

    #[test]
    fn serialization_extension_is_always_accepted() {
        for ty in WorkflowType::ALL {
            assert!(
                ty.accepted_extensions().contains(&ty.extension()),
                "{ty} serializes to an extension it would reject"
            );
        }
    }

    #[test]
    fn none_is_not_content_bearing() {
        assert!(!WorkflowType::None.is_content_bearing());
        for ty in WorkflowType::ALL {
            assert!(ty.is_content_bearing());
        }
    }
}
