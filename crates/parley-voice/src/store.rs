//! Bounded in-memory store for synthesized clips.
//!
//! Clips are served once or twice by the HTTP layer and then forgotten; the
//! oldest clip is evicted when the store is full.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::SynthesizedAudio;

/// A stored clip, cheap to clone.
#[derive(Debug, Clone)]
pub struct StoredClip {
    pub bytes: Arc<[u8]>,
    pub content_type: String,
}

#[derive(Debug, Default)]
struct Inner {
    clips: HashMap<String, StoredClip>,
    order: VecDeque<String>,
}

/// Thread-safe clip store shared between sessions and the HTTP router.
#[derive(Debug)]
pub struct AudioStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl AudioStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Store a clip and return its id.
    pub fn insert(&self, audio: SynthesizedAudio) -> String {
        let id = Uuid::new_v4().to_string();
        let clip = StoredClip {
            bytes: Arc::from(audio.bytes.into_boxed_slice()),
            content_type: audio.content_type,
        };
        let mut inner = self.lock();
        inner.clips.insert(id.clone(), clip);
        inner.order.push_back(id.clone());
        while inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.clips.remove(&oldest);
            }
        }
        id
    }

    pub fn get(&self, id: &str) -> Option<StoredClip> {
        self.lock().clips.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Public path under which a clip is served.
    pub fn url_for(id: &str) -> String {
        format!("/audio/{}", id)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
