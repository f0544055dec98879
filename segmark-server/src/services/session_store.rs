//! Per-entity inference context cache
//!
//! Maps an entity id (uploaded image or video) to the engine context handle
//! produced by its first prompt. Exactly one live state per id: re-segmenting
//! replaces silently, explicit clear removes. Entries live for the process
//! lifetime only and are never serialized.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use segmark_common::{Error, Result};

use crate::engine::{InferenceEngine, StateHandle};

/// Cached engine context for one entity
#[derive(Debug, Clone)]
pub enum EntityState {
    /// Image context: engine state token reused across refinement calls
    Image(StateHandle),
    /// Video session: engine session id that must be explicitly ended
    Video { session_id: String },
}

/// Internally synchronized session state store, injected into the API layer
/// and the batch engine
pub struct SessionStore {
    engine: Arc<dyn InferenceEngine>,
    entries: RwLock<HashMap<String, EntityState>>,
}

impl SessionStore {
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self {
            engine,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store or silently replace the state for an entity
    pub async fn put(&self, entity_id: &str, state: EntityState) {
        let replaced = self
            .entries
            .write()
            .await
            .insert(entity_id.to_string(), state);
        if replaced.is_some() {
            tracing::debug!(entity_id = %entity_id, "Replaced cached segmentation state");
        }
    }

    /// Fetch the state for an entity
    pub async fn get(&self, entity_id: &str) -> Result<EntityState> {
        self.entries
            .read()
            .await
            .get(entity_id)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "No segmentation state for {}; segment with a text prompt first",
                    entity_id
                ))
            })
    }

    /// Remove the entity's state if present; a no-op otherwise. Video
    /// sessions additionally get their engine-side session ended — an
    /// end-session failure is logged as a warning and the local entry stays
    /// removed (local cache consistency takes priority over remote cleanup).
    pub async fn clear(&self, entity_id: &str) {
        let removed = self.entries.write().await.remove(entity_id);

        match removed {
            None => {
                tracing::debug!(entity_id = %entity_id, "Clear on absent state (no-op)");
            }
            Some(EntityState::Image(_)) => {
                tracing::debug!(entity_id = %entity_id, "Cleared image segmentation state");
            }
            Some(EntityState::Video { session_id }) => {
                if let Err(e) = self.engine.end_video_session(&session_id).await {
                    tracing::warn!(
                        entity_id = %entity_id,
                        session_id = %session_id,
                        error = %e,
                        "Failed to end engine video session; local state dropped anyway"
                    );
                } else {
                    tracing::debug!(entity_id = %entity_id, "Cleared video session");
                }
            }
        }
    }

    /// Number of live entries (diagnostics)
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SegmentOutputs;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    /// Records end-session calls; optionally fails them
    struct RecordingEngine {
        ended: Mutex<Vec<String>>,
        fail_end: bool,
    }

    impl RecordingEngine {
        fn new(fail_end: bool) -> Arc<Self> {
            Arc::new(Self {
                ended: Mutex::new(Vec::new()),
                fail_end,
            })
        }
    }

    #[async_trait]
    impl InferenceEngine for RecordingEngine {
        async fn segment_with_text(
            &self,
            _image: &[u8],
            _prompt: &str,
            _confidence_threshold: f32,
        ) -> Result<SegmentOutputs> {
            Ok(SegmentOutputs::default())
        }

        async fn refine_with_points(
            &self,
            _state: &StateHandle,
            _points: &[crate::models::PointPrompt],
        ) -> Result<SegmentOutputs> {
            Ok(SegmentOutputs::default())
        }

        async fn refine_with_box(
            &self,
            _state: &StateHandle,
            _bbox: crate::models::BBox,
        ) -> Result<SegmentOutputs> {
            Ok(SegmentOutputs::default())
        }

        async fn start_video_session(&self, _resource_path: &Path) -> Result<String> {
            Ok("vs-1".to_string())
        }

        async fn add_video_prompt(
            &self,
            _session_id: &str,
            _frame_index: u32,
            _text: &str,
            _confidence_threshold: f32,
        ) -> Result<SegmentOutputs> {
            Ok(SegmentOutputs::default())
        }

        async fn end_video_session(&self, session_id: &str) -> Result<()> {
            self.ended.lock().unwrap().push(session_id.to_string());
            if self.fail_end {
                return Err(Error::Upstream("engine down".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let store = SessionStore::new(RecordingEngine::new(false));
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn put_replaces_existing_state() {
        let store = SessionStore::new(RecordingEngine::new(false));
        store
            .put("img", EntityState::Image(StateHandle("a".to_string())))
            .await;
        store
            .put("img", EntityState::Image(StateHandle("b".to_string())))
            .await;

        match store.get("img").await.unwrap() {
            EntityState::Image(handle) => assert_eq!(handle.0, "b"),
            other => panic!("unexpected state: {:?}", other),
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn clear_is_idempotent_and_never_errors() {
        let store = SessionStore::new(RecordingEngine::new(false));
        // never-created id
        store.clear("ghost").await;

        store
            .put("img", EntityState::Image(StateHandle("a".to_string())))
            .await;
        store.clear("img").await;
        store.clear("img").await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn clear_video_ends_engine_session() {
        let engine = RecordingEngine::new(false);
        let store = SessionStore::new(engine.clone());
        store
            .put(
                "vid",
                EntityState::Video {
                    session_id: "vs-7".to_string(),
                },
            )
            .await;

        store.clear("vid").await;
        assert_eq!(*engine.ended.lock().unwrap(), vec!["vs-7".to_string()]);
        assert!(store.is_empty().await);

        // second clear finds nothing; end-session is not repeated
        store.clear("vid").await;
        assert_eq!(engine.ended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_end_session_still_removes_entry() {
        let engine = RecordingEngine::new(true);
        let store = SessionStore::new(engine.clone());
        store
            .put(
                "vid",
                EntityState::Video {
                    session_id: "vs-9".to_string(),
                },
            )
            .await;

        store.clear("vid").await;
        assert!(store.is_empty().await);
        assert!(store.get("vid").await.is_err());
    }
}
