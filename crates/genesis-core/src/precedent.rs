//! Precedent cache: embed-and-search over past objectives.
//!
//! A [`PrecedentStore`] holds saved (objective, path) pairs and answers
//! "have we solved something like this before?". Retrieval is a hybrid
//! of embedding cosine similarity and lexical token overlap, filtered to
//! the same input type. Writes are serialized behind an `RwLock`; reads
//! are concurrent. When a JSONL path is configured, records are loaded
//! at startup and appended on save, one object per line.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use genesis_types::{PathCandidate, PrecedentRecord, Result, WorkflowType};

use crate::embeddings::{cosine_similarity, Embedder};
use crate::registry::ToolRegistry;

/// Weight of the embedding similarity in the hybrid score.
const VECTOR_WEIGHT: f32 = 0.7;

/// Weight of the lexical overlap in the hybrid score.
const LEXICAL_WEIGHT: f32 = 0.3;

/// A retrieval hit.
#[derive(Debug, Clone)]
pub struct PrecedentMatch {
    pub record: PrecedentRecord,
    /// Hybrid similarity in [0, 1]; higher is closer.
    pub score: f32,
}

/// The precedent store.
pub struct PrecedentStore {
    embedder: Arc<dyn Embedder>,
    records: RwLock<Vec<PrecedentRecord>>,
    path: Option<PathBuf>,
}

impl PrecedentStore {
    /// Create an empty in-memory store.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            records: RwLock::new(Vec::new()),
            path: None,
        }
    }

    /// Open a store backed by a JSONL file, loading any existing
    /// records. Unparsable lines are skipped with a warning rather than
    /// failing startup.
    pub async fn open(embedder: Arc<dyn Embedder>, path: PathBuf) -> Result<Self> {
        let mut records = Vec::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for (lineno, line) in content.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<PrecedentRecord>(line) {
                        Ok(record) => records.push(record),
                        Err(e) => warn!(
                            path = %path.display(),
                            line = lineno + 1,
                            error = %e,
                            "skipping unparsable precedent line"
                        ),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        debug!(count = records.len(), path = %path.display(), "precedent store loaded");
        Ok(Self {
            embedder,
            records: RwLock::new(records),
            path: Some(path),
        })
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Save a new precedent after a successful end-to-end run.
    ///
    /// The objective is embedded at save time; the full chosen path is
    /// inlined so the record survives registry changes (stale records
    /// are filtered at retrieval instead).
    pub async fn save(
        &self,
        objective: &str,
        input_type: WorkflowType,
        output_type: WorkflowType,
        path: PathCandidate,
        chat_id: &str,
    ) -> Result<PrecedentRecord> {
        let embedding = self.embedder.embed(objective).await?;
        let record = PrecedentRecord::new(
            objective,
            embedding,
            input_type,
            output_type,
            path,
            chat_id,
        );

        if let Some(file) = &self.path {
            if let Some(parent) = file.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');
            let mut f = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .await?;
            f.write_all(line.as_bytes()).await?;
        }

        let mut records = self.records.write().await;
        records.push(record.clone());
        debug!(objective, "precedent saved");
        Ok(record)
    }

    /// Delete a record by UUID. Returns `true` if it existed. When the
    /// store is file-backed the file is rewritten without the record.
    pub async fn delete(&self, uuid: Uuid) -> Result<bool> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.uuid != uuid);
        let removed = records.len() < before;
        if removed {
            if let Some(file) = &self.path {
                let mut content = String::new();
                for record in records.iter() {
                    content.push_str(&serde_json::to_string(record)?);
                    content.push('\n');
                }
                tokio::fs::write(file, content).await?;
            }
        }
        Ok(removed)
    }

    /// Find the best precedent for an objective, filtered to the same
    /// input type. Records referencing tools no longer in the registry
    /// are silently dropped from results.
    ///
    /// Scores are similarities in [0, 1]; callers compare the top hit
    /// against the configured threshold to decide whether to bypass
    /// planning.
    pub async fn best_match(
        &self,
        objective: &str,
        input_type: WorkflowType,
        registry: &ToolRegistry,
    ) -> Result<Option<PrecedentMatch>> {
        let query = self.embedder.embed(objective).await?;
        let records = self.records.read().await;

        let mut best: Option<PrecedentMatch> = None;
        for record in records.iter() {
            if record.input_type != input_type {
                continue;
            }
            if record
                .path
                .steps
                .iter()
                .any(|step| !registry.contains(&step.name))
            {
                debug!(objective = %record.objective, "dropping precedent with unregistered tool");
                continue;
            }

            let vector = cosine_similarity(&query, &record.embedding).clamp(0.0, 1.0);
            let lexical = lexical_overlap(objective, &record.objective);
            let score = (VECTOR_WEIGHT * vector + LEXICAL_WEIGHT * lexical).clamp(0.0, 1.0);

            let better = match &best {
                Some(current) => score > current.score,
                None => true,
            };
            if better {
                best = Some(PrecedentMatch {
                    record: record.clone(),
                    score,
                });
            }
        }
        Ok(best)
    }
}

/// Token-set overlap between two texts: |intersection| / |smaller set|,
/// case-insensitive. 1.0 for identical token sets, 0.0 for disjoint.
fn lexical_overlap(a: &str, b: &str) -> f32 {
    let set_a: std::collections::HashSet<String> =
        a.split_whitespace().map(|w| w.to_lowercase()).collect();
    let set_b: std::collections::HashSet<String> =
        b.split_whitespace().map(|w| w.to_lowercase()).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let common = set_a.intersection(&set_b).count();
    common as f32 / set_a.len().min(set_b.len()) as f32
}
