//! In-memory fakes for the pipeline seams.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use altpipe::{
    api_language, AssetMetadata, Describe, DescribeError, DescribeRequest, Description,
    ObjectStore, StorageError, Translate, TranslateError,
};
use async_trait::async_trait;

/// Object store over a mutex-guarded map, with call counters so tests can
/// assert that skipped events never touch storage.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<(String, String), (Vec<u8>, String)>>,
    tags: Mutex<HashMap<(String, String), BTreeMap<String, String>>>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, container: &str, blob: &str, bytes: &[u8]) {
        self.blobs.lock().unwrap().insert(
            (container.to_string(), blob.to_string()),
            (bytes.to_vec(), "application/octet-stream".to_string()),
        );
    }

    pub fn get(&self, container: &str, blob: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(container.to_string(), blob.to_string()))
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn tags_for(&self, container: &str, blob: &str) -> Option<BTreeMap<String, String>> {
        self.tags
            .lock()
            .unwrap()
            .get(&(container.to_string(), blob.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn read(&self, container: &str, blob: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(container, blob))
    }

    async fn write(
        &self,
        container: &str,
        blob: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.blobs.lock().unwrap().insert(
            (container.to_string(), blob.to_string()),
            (bytes, content_type.to_string()),
        );
        Ok(())
    }

    async fn set_tags(
        &self,
        container: &str,
        blob: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.tags
            .lock()
            .unwrap()
            .insert((container.to_string(), blob.to_string()), tags.clone());
        Ok(())
    }

    async fn copy(
        &self,
        src_container: &str,
        src_blob: &str,
        dst_container: &str,
        dst_blob: &str,
    ) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let source = self.get(src_container, src_blob).ok_or_else(|| {
            StorageError::NotFound {
                container: src_container.to_string(),
                blob: src_blob.to_string(),
            }
        })?;
        self.blobs.lock().unwrap().insert(
            (dst_container.to_string(), dst_blob.to_string()),
            (source, "application/octet-stream".to_string()),
        );
        Ok(())
    }
}

/// Describer that answers a canned reply and records what it was asked.
#[derive(Default)]
pub struct ScriptedDescriber {
    pub reply: String,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<DescribeRequest>>,
}

impl ScriptedDescriber {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Describe for ScriptedDescriber {
    async fn describe(&self, request: &DescribeRequest) -> Result<Description, DescribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(Description {
            content: self.reply.clone(),
            usage: None,
        })
    }
}

/// Translator with canned answers keyed by API language code, and an
/// optional set of codes that fail.
#[derive(Default)]
pub struct ScriptedTranslator {
    pub by_api_code: HashMap<String, String>,
    pub failing: HashSet<String>,
}

impl ScriptedTranslator {
    pub fn with_translations(entries: &[(&str, &str)]) -> Self {
        Self {
            by_api_code: entries
                .iter()
                .map(|(code, text)| (code.to_string(), text.to_string()))
                .collect(),
            failing: HashSet::new(),
        }
    }

    pub fn failing_on(mut self, api_code: &str) -> Self {
        self.failing.insert(api_code.to_string());
        self
    }
}

#[async_trait]
impl Translate for ScriptedTranslator {
    async fn translate_one(
        &self,
        text: &str,
        lang: &str,
        _metadata: &AssetMetadata,
    ) -> Result<String, TranslateError> {
        let api_code = api_language(lang);
        if self.failing.contains(api_code) {
            return Err(TranslateError::Service {
                status: 503,
                body: "scripted failure".to_string(),
            });
        }
        Ok(self
            .by_api_code
            .get(api_code)
            .cloned()
            .unwrap_or_else(|| format!("[{api_code}] {text}")))
    }
}
