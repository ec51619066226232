//! Generated artifacts.
//!
//! Layout under `{output}/generated`:
//!
//! ```text
//! {type}/{id}.json     one document
//! {type}/_index.json   every document of the collection
//! index.json           summary of all collections
//! all.json             every document of every collection
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    fs, io,
    path::{Path, PathBuf},
};

use inklayer_core::{Document, slug};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub const GENERATED_DIR: &str = "generated";
pub const COLLECTION_INDEX: &str = "_index.json";
pub const SUMMARY_FILE: &str = "index.json";
pub const ALL_FILE: &str = "all.json";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OutputError>;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Summary entry for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub variable: String,
    pub count: usize,
    pub documents: Vec<String>,
}

/// Contents of `index.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub version: String,
    pub config_hash: String,
    pub types: Vec<String>,
    pub collections: BTreeMap<String, CollectionSummary>,
}

impl Summary {
    pub fn new(version: impl Into<String>, config_hash: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            config_hash: config_hash.into(),
            types: Vec::new(),
            collections: BTreeMap::new(),
        }
    }

    /// Add a collection; `documents` are listed by id.
    pub fn add(&mut self, doc_type: &str, documents: &[Document]) {
        self.types.push(doc_type.to_string());
        self.collections.insert(
            doc_type.to_string(),
            CollectionSummary {
                variable: slug::data_variable_name(doc_type),
                count: documents.len(),
                documents: documents.iter().map(|d| d.id.clone()).collect(),
            },
        );
    }
}

fn to_pretty<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `bytes` unless the file already holds them. Returns whether the
/// file was written.
fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<bool> {
    if fs::read(path).is_ok_and(|existing| existing == bytes) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    fs::write(path, bytes).map_err(io_err(path))?;
    Ok(true)
}

/// Writes artifacts below `{output}/generated`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            root: output_dir.join(GENERATED_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn collection_dir(&self, doc_type: &str) -> PathBuf {
        self.root.join(doc_type)
    }

    pub fn document_path(&self, doc_type: &str, id: &str) -> PathBuf {
        self.collection_dir(doc_type)
            .join(format!("{}.json", slug::id_to_file_name(id)))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    /// Whether the on-disk collection index differs from `documents`.
    pub fn collection_changed(&self, doc_type: &str, documents: &[Document]) -> Result<bool> {
        let rendered = to_pretty(documents)?;
        let path = self.collection_dir(doc_type).join(COLLECTION_INDEX);
        Ok(!fs::read(path).is_ok_and(|existing| existing == rendered))
    }

    /// Write every document and the collection index, then delete document
    /// files that no longer belong to the collection.
    pub fn write_collection(&self, doc_type: &str, documents: &[Document]) -> Result<usize> {
        let dir = self.collection_dir(doc_type);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let mut written = 0;
        let mut keep = HashSet::new();
        for document in documents {
            let path = self.document_path(doc_type, &document.id);
            if write_if_changed(&path, &to_pretty(document)?)? {
                written += 1;
            }
            keep.insert(path);
        }

        let index = dir.join(COLLECTION_INDEX);
        write_if_changed(&index, &to_pretty(documents)?)?;
        keep.insert(index);

        for entry in fs::read_dir(&dir).map_err(io_err(&dir))? {
            let path = entry.map_err(io_err(&dir))?.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            if is_json && !keep.contains(&path) {
                debug!(path = %path.display(), "removing stale artifact");
                fs::remove_file(&path).map_err(io_err(&path))?;
            }
        }

        debug!(doc_type, written, total = documents.len(), "wrote collection");
        Ok(written)
    }

    /// Write `index.json` and `all.json`, and drop directories of
    /// collections that are no longer defined.
    pub fn write_summary<'d>(
        &self,
        summary: &Summary,
        documents: impl IntoIterator<Item = &'d Document>,
    ) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(io_err(&self.root))?;

        let all: Vec<&Document> = documents.into_iter().collect();
        write_if_changed(&self.root.join(ALL_FILE), &to_pretty(&all)?)?;
        write_if_changed(&self.summary_path(), &to_pretty(summary)?)?;

        for entry in fs::read_dir(&self.root).map_err(io_err(&self.root))? {
            let entry = entry.map_err(io_err(&self.root))?;
            let path = entry.path();
            let known = entry
                .file_name()
                .to_str()
                .is_some_and(|name| summary.collections.contains_key(name));
            if path.is_dir() && !known {
                debug!(path = %path.display(), "removing stale collection");
                fs::remove_dir_all(&path).map_err(io_err(&path))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use inklayer_core::{DocumentBody, DocumentFormat};
    use serde_json::{Map, Value};
    use tempfile::TempDir;

    use super::*;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            slug: id.trim_end_matches(".md").to_string(),
            doc_type: "post".to_string(),
            format: DocumentFormat::Md,
            body: DocumentBody {
                raw: "x".to_string(),
                compiled_code: "<p>x</p>\n".to_string(),
            },
            table_of_contents: None,
            read_time: None,
            git_info: None,
            fields: Map::new(),
        }
    }

    #[test]
    fn test_write_collection() {
        let dir = TempDir::new().expect("tempdir");
        let writer = ArtifactWriter::new(dir.path());
        let docs = vec![doc("a.md"), doc("2024/b.md")];

        assert!(writer.collection_changed("post", &docs).expect("changed"));
        assert_eq!(writer.write_collection("post", &docs).expect("write"), 2);
        assert!(!writer.collection_changed("post", &docs).expect("changed"));

        let post_dir = dir.path().join("generated/post");
        assert!(post_dir.join("a.md.json").exists());
        assert!(post_dir.join("_2024__b.md.json").exists());

        let index: Vec<Value> =
            serde_json::from_slice(&fs::read(post_dir.join("_index.json")).expect("read"))
                .expect("json");
        assert_eq!(index.len(), 2);
        assert_eq!(index[0]["body"]["compiledCode"], "<p>x</p>\n");

        assert_eq!(writer.write_collection("post", &docs).expect("write"), 0);
    }

    #[test]
    fn test_stale_documents_removed() {
        let dir = TempDir::new().expect("tempdir");
        let writer = ArtifactWriter::new(dir.path());

        writer
            .write_collection("post", &[doc("a.md"), doc("b.md")])
            .expect("write");
        writer.write_collection("post", &[doc("a.md")]).expect("write");

        assert!(writer.document_path("post", "a.md").exists());
        assert!(!writer.document_path("post", "b.md").exists());
    }

    #[test]
    fn test_summary() {
        let dir = TempDir::new().expect("tempdir");
        let writer = ArtifactWriter::new(dir.path());
        let docs = vec![doc("a.md")];
        writer.write_collection("post", &docs).expect("write");
        writer.write_collection("old", &docs).expect("write");

        let mut summary = Summary::new("0.1.0", "abc");
        summary.add("post", &docs);
        writer.write_summary(&summary, &docs).expect("summary");

        let index: Value =
            serde_json::from_slice(&fs::read(writer.summary_path()).expect("read")).expect("json");
        assert_eq!(index["configHash"], "abc");
        assert_eq!(index["types"][0], "post");
        assert_eq!(index["collections"]["post"]["variable"], "allPosts");
        assert_eq!(index["collections"]["post"]["documents"][0], "a.md");
        assert!(writer.root().join("all.json").exists());
        assert!(!writer.collection_dir("old").exists());
    }
}
