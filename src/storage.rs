//! Reference collaborators: fragment files on disk and a JSON catalog sink.
//!
//! The pipeline core only sees the `FragmentSource`/`CatalogSink` contracts;
//! these implementations exist so the CLI can drive a full run from files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{CanonicalEvent, Fragment, SourceContext, SourceType};
use crate::error::{PipelineError, Result};
use crate::pipeline::RunStats;
use crate::pipeline::processing::segment;
use crate::ports::{CatalogSink, FragmentSource};

/// On-disk description of one source and its retrieved content. Websites
/// supply pre-cut fragments; newsletters supply a whole body for the
/// segmenter.
#[derive(Debug, Deserialize)]
pub struct SourceFile {
    pub source_id: String,
    pub source_name: String,
    #[serde(default)]
    pub source_url: String,
    pub source_type: SourceType,
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub fragments: Vec<String>,
    pub newsletter_html: Option<String>,
    pub newsletter_text: Option<String>,
}

impl SourceFile {
    fn context(&self) -> SourceContext {
        SourceContext {
            source_id: self.source_id.clone(),
            source_name: self.source_name.clone(),
            source_url: self.source_url.clone(),
            source_type: self.source_type,
            fetched_at: self.fetched_at.unwrap_or_else(Utc::now),
        }
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        let context = self.context();
        let mut fragments: Vec<Fragment> = self
            .fragments
            .iter()
            .map(|html| Fragment {
                html: html.clone(),
                source: context.clone(),
            })
            .collect();

        if let Some(body) = &self.newsletter_html {
            fragments.extend(segment::segment_html(body, &context));
        }
        if let Some(text) = &self.newsletter_text {
            fragments.extend(segment::segment_plain_text(text, &context));
        }
        fragments
    }
}

pub fn load_source_file(path: &Path) -> Result<Vec<Fragment>> {
    let content = fs::read_to_string(path)?;
    let source: SourceFile = serde_json::from_str(&content).map_err(|e| {
        PipelineError::MalformedFragment(format!("{}: {}", path.display(), e))
    })?;
    Ok(source.into_fragments())
}

/// Load every `*.json` source file in a directory, in name order. A corrupt
/// file is logged and skipped; it never aborts the run.
pub fn load_fragments_from_dir(dir: &Path) -> Result<Vec<Fragment>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut fragments = Vec::new();
    for path in paths {
        match load_source_file(&path) {
            Ok(batch) => fragments.extend(batch),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable source file"),
        }
    }
    info!(count = fragments.len(), dir = %dir.display(), "loaded fragments");
    Ok(fragments)
}

/// One source file exposed through the fragment-producing capability.
pub struct FileFragmentSource {
    path: PathBuf,
}

impl FileFragmentSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl FragmentSource for FileFragmentSource {
    fn source_name(&self) -> &str {
        self.path.to_str().unwrap_or("source-file")
    }

    async fn fetch_fragments(&self) -> anyhow::Result<Vec<Fragment>> {
        Ok(load_source_file(&self.path)?)
    }
}

#[derive(Serialize)]
struct CatalogMetadata {
    last_updated: DateTime<Utc>,
    count: usize,
}

#[derive(Serialize)]
struct CatalogFileOut<'a> {
    metadata: CatalogMetadata,
    stats: &'a RunStats,
    events: &'a [CanonicalEvent],
}

#[derive(Deserialize)]
struct CatalogFileIn {
    #[serde(default)]
    events: Vec<CanonicalEvent>,
}

/// Read a previously written catalog file; a missing file is an empty
/// catalog, not an error.
pub fn load_catalog(path: &Path) -> Result<Vec<CanonicalEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    let parsed: CatalogFileIn = serde_json::from_str(&content)?;
    Ok(parsed.events)
}

/// Catalog sink backed by a JSON file, written atomically via a temp file
/// and rename.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl CatalogSink for JsonFileSink {
    async fn write_catalog(
        &self,
        events: &[CanonicalEvent],
        stats: &RunStats,
    ) -> anyhow::Result<()> {
        let file = CatalogFileOut {
            metadata: CatalogMetadata {
                last_updated: Utc::now(),
                count: events.len(),
            },
            stats,
            events,
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        info!(count = events.len(), path = %self.path.display(), "catalog written");
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct InMemorySink {
    pub written: Mutex<Vec<CanonicalEvent>>,
}

#[async_trait]
impl CatalogSink for InMemorySink {
    async fn write_catalog(
        &self,
        events: &[CanonicalEvent],
        _stats: &RunStats,
    ) -> anyhow::Result<()> {
        self.written.lock().unwrap().extend_from_slice(events);
        Ok(())
    }
}
