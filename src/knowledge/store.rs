//! Knowledge Store facade: every read, write, and search a front-end can ask for.
//!
//! Write path for every mutation: resolve (or register) the project, validate
//! the file path through the sandbox, then under the file's lock read current
//! state, apply the change, write atomically, and commit. Push runs detached
//! after the commit. Each mutation appends an activity entry.

use std::path::{Path, PathBuf};

use crate::config::KnowledgeConfig;
use crate::error::{KnowledgeError, ResourceKind, Result};
use crate::knowledge::search::{self, SearchHit};
use crate::knowledge::types::{
    Chapter, ChapterRef, Document, DocumentSummary, InsertPosition, Metadata, NewChapter,
    NewDocument,
};
use crate::knowledge::{document, main_doc, markdown_files, KNOWLEDGE_DIR, MAIN_FILE};
use crate::storage::{atomic_write, sandbox, slug, StorageRoot};

pub struct KnowledgeStore {
    storage: StorageRoot,
}

impl KnowledgeStore {
    /// Open (bootstrapping if needed) the storage root described by `config`.
    pub async fn open(config: &KnowledgeConfig) -> Result<Self> {
        Ok(Self {
            storage: StorageRoot::open(config).await?,
        })
    }

    pub fn storage(&self) -> &StorageRoot {
        &self.storage
    }

    // Projects

    pub async fn list_projects(&self) -> Vec<String> {
        self.storage.index().project_ids().await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.storage.index().remove(project_id).await?;
        self.record("delete_project", project_id, None).await;
        Ok(())
    }

    // Main document

    pub async fn get_main(&self, project_id: &str) -> Result<String> {
        let dir = self.storage.index().resolve(project_id).await?;
        let path = main_path(&dir)?;
        read_file(&path, ResourceKind::MainDocument, project_id).await
    }

    pub async fn replace_main(&self, project_id: &str, content: &str) -> Result<()> {
        let dir = self.storage.index().get_or_create(project_id).await?;
        let path = main_path(&dir)?;
        let message = format!("Update main document for {project_id}");
        self.storage
            .locks()
            .with_path_lock(&path, || self.write_and_commit(&path, content.to_string(), &message))
            .await?;

        tracing::info!(project_id, "main document replaced");
        self.record("replace_main", project_id, None).await;
        Ok(())
    }

    pub async fn get_main_section(&self, project_id: &str, header: &str) -> Result<String> {
        let text = self.get_main(project_id).await?;
        main_doc::get_section(&text, header)
    }

    /// Replace a `##` section of the main document, appending it when absent.
    pub async fn replace_main_section(
        &self,
        project_id: &str,
        header: &str,
        content: &str,
    ) -> Result<()> {
        self.edit_main(project_id, "replace_main_section", header, |text| {
            main_doc::replace_section(text, header, content)
        })
        .await
    }

    pub async fn remove_main_section(&self, project_id: &str, header: &str) -> Result<()> {
        self.edit_main(project_id, "remove_main_section", header, |text| {
            main_doc::remove_section(text, header)
        })
        .await
    }

    async fn edit_main<F>(&self, project_id: &str, operation: &str, header: &str, edit: F) -> Result<()>
    where
        F: FnOnce(&str) -> Result<String>,
    {
        let dir = self.storage.index().resolve(project_id).await?;
        let path = main_path(&dir)?;
        let message = format!("Update section {header} of main document for {project_id}");
        self.storage
            .locks()
            .with_path_lock(&path, || async {
                let current = read_file(&path, ResourceKind::MainDocument, project_id).await?;
                let updated = edit(&current)?;
                self.write_and_commit(&path, updated, &message).await
            })
            .await?;

        tracing::info!(project_id, header, operation, "main document section edited");
        self.record_section(operation, project_id, header).await;
        Ok(())
    }

    // Knowledge documents

    /// Create a knowledge document and return its normalised filename.
    ///
    /// Input is validated before the project is registered, so a rejected
    /// create leaves no trace.
    pub async fn create_document(&self, project_id: &str, request: &NewDocument) -> Result<String> {
        let filename = slug::document_filename(&request.filename);
        let metadata = Metadata::new(request.title.trim(), &request.keywords);
        let doc = Document::new(metadata, &request.introduction, &request.chapters)?;
        let rendered = doc.render()?;

        let dir = self.storage.index().get_or_create(project_id).await?;
        let path = document_path(&dir, &filename)?;
        let message = format!("Create knowledge document {filename} in {project_id}");
        self.storage
            .locks()
            .with_path_lock(&path, || async {
                let exists = tokio::fs::try_exists(&path)
                    .await
                    .map_err(|e| KnowledgeError::fs("check for an existing document", e))?;
                if exists {
                    return Err(KnowledgeError::already_exists(ResourceKind::Document, &filename));
                }
                self.write_and_commit(&path, rendered, &message).await
            })
            .await?;

        tracing::info!(project_id, file = %filename, chapters = doc.chapters.len(), "knowledge document created");
        self.record("create_document", project_id, Some(&filename)).await;
        Ok(filename)
    }

    pub async fn get_document(&self, project_id: &str, filename: &str) -> Result<Document> {
        let (path, name) = self.locate_document(project_id, filename).await?;
        let text = read_file(&path, ResourceKind::Document, &name).await?;
        document::parse(&text)
    }

    pub async fn get_chapter(
        &self,
        project_id: &str,
        filename: &str,
        target: &ChapterRef,
    ) -> Result<Chapter> {
        let doc = self.get_document(project_id, filename).await?;
        doc.chapter(target).cloned()
    }

    /// Every parseable document of a project, sorted by filename. An unknown
    /// project has no documents.
    pub async fn list_documents(&self, project_id: &str) -> Result<Vec<DocumentSummary>> {
        let dir = match self.storage.index().resolve(project_id).await {
            Ok(dir) => dir,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut summaries = Vec::new();
        for (filename, path) in markdown_files(&dir).await? {
            let parsed = match tokio::fs::read_to_string(&path).await {
                Ok(text) => document::parse(&text),
                Err(e) => Err(KnowledgeError::fs("read a knowledge document", e)),
            };
            match parsed {
                Ok(doc) => summaries.push(DocumentSummary {
                    filename,
                    title: doc.metadata.title,
                    keywords: doc.metadata.keywords,
                    created: doc.metadata.created,
                    updated: doc.metadata.updated,
                    chapter_count: doc.chapters.len(),
                }),
                Err(e) => tracing::warn!(file = %filename, error = %e, "skipping knowledge file"),
            }
        }
        Ok(summaries)
    }

    /// Delete a knowledge document and return its normalised filename.
    pub async fn delete_document(&self, project_id: &str, filename: &str) -> Result<String> {
        let (path, name) = self.locate_document(project_id, filename).await?;
        let message = format!("Delete knowledge document {name} from {project_id}");
        self.storage
            .locks()
            .with_path_lock(&path, || async {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Err(KnowledgeError::not_found(ResourceKind::Document, &name));
                    }
                    Err(e) => return Err(KnowledgeError::fs("delete a knowledge document", e)),
                }
                self.storage.git().commit_and_push(&message).await
            })
            .await?;

        tracing::info!(project_id, file = %name, "knowledge document deleted");
        self.record("delete_document", project_id, Some(&name)).await;
        Ok(name)
    }

    // Chapters

    /// Replace a chapter's body and return the updated chapter.
    pub async fn replace_chapter(
        &self,
        project_id: &str,
        filename: &str,
        target: &ChapterRef,
        content: &str,
    ) -> Result<Chapter> {
        self.edit_document(project_id, filename, "replace_chapter", |doc| {
            let index = doc.position(target)?;
            let doc = doc.replace_chapter(&ChapterRef::Index(index), content)?;
            let chapter = doc.chapters[index].clone();
            Ok((doc, chapter))
        })
        .await
    }

    /// Insert a new chapter and return it.
    pub async fn add_chapter(
        &self,
        project_id: &str,
        filename: &str,
        chapter: &NewChapter,
        at: &InsertPosition,
    ) -> Result<Chapter> {
        self.edit_document(project_id, filename, "add_chapter", |doc| {
            let doc = doc.insert_chapter(chapter, at)?;
            let title = chapter.title.trim();
            let added = doc
                .chapters
                .iter()
                .find(|c| c.title == title)
                .cloned()
                .ok_or_else(|| KnowledgeError::not_found(ResourceKind::Chapter, title))?;
            Ok((doc, added))
        })
        .await
    }

    /// Remove a chapter and return what was removed.
    pub async fn remove_chapter(
        &self,
        project_id: &str,
        filename: &str,
        target: &ChapterRef,
    ) -> Result<Chapter> {
        self.edit_document(project_id, filename, "remove_chapter", |doc| {
            let removed = doc.chapter(target)?.clone();
            let doc = doc.remove_chapter(target)?;
            Ok((doc, removed))
        })
        .await
    }

    /// Read, change, and write back one document under its lock, refreshing
    /// its `updated` timestamp.
    async fn edit_document<F, T>(
        &self,
        project_id: &str,
        filename: &str,
        operation: &str,
        edit: F,
    ) -> Result<T>
    where
        F: FnOnce(Document) -> Result<(Document, T)>,
    {
        let (path, name) = self.locate_document(project_id, filename).await?;
        let message = format!("Update knowledge document {name} in {project_id} ({operation})");
        let output = self
            .storage
            .locks()
            .with_path_lock(&path, || async {
                let text = read_file(&path, ResourceKind::Document, &name).await?;
                let (mut doc, output) = edit(document::parse(&text)?)?;
                doc.metadata.touch();
                self.write_and_commit(&path, doc.render()?, &message).await?;
                Ok::<_, KnowledgeError>(output)
            })
            .await?;

        tracing::info!(project_id, file = %name, operation, "knowledge document edited");
        self.record(operation, project_id, Some(&name)).await;
        Ok(output)
    }

    // Search

    /// Keyword search across a project's documents. An unknown project has
    /// no hits.
    pub async fn search(&self, project_id: &str, query: &str) -> Result<Vec<SearchHit>> {
        match self.storage.index().resolve(project_id).await {
            Ok(dir) => search::search(&dir, query).await,
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    // Helpers

    /// Validated path and normalised filename of a document in an existing
    /// project.
    async fn locate_document(&self, project_id: &str, filename: &str) -> Result<(PathBuf, String)> {
        let dir = self.storage.index().resolve(project_id).await?;
        let name = slug::document_filename(filename);
        let path = document_path(&dir, &name)?;
        Ok((path, name))
    }

    async fn write_and_commit(&self, path: &Path, contents: String, message: &str) -> Result<()> {
        atomic_write(path, contents).await?;
        self.storage.git().commit_and_push(message).await
    }

    async fn record(&self, operation: &str, project_id: &str, filename: Option<&str>) {
        self.storage
            .activity()
            .record(operation, project_id, filename, None)
            .await;
    }

    async fn record_section(&self, operation: &str, project_id: &str, header: &str) {
        self.storage
            .activity()
            .record(operation, project_id, Some(MAIN_FILE), Some(header))
            .await;
    }
}

fn main_path(project_dir: &Path) -> Result<PathBuf> {
    sandbox::validate(project_dir, MAIN_FILE)
}

fn document_path(project_dir: &Path, filename: &str) -> Result<PathBuf> {
    sandbox::validate(project_dir, &format!("{KNOWLEDGE_DIR}/{filename}"))
}

/// Read a file, mapping a missing file to `NotFound(kind, name)`.
async fn read_file(path: &Path, kind: ResourceKind, name: &str) -> Result<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(KnowledgeError::not_found(kind, name))
        }
        Err(e) => Err(KnowledgeError::fs(format!("read the {kind}"), e)),
    }
}
