pub mod chapter_params;
pub mod file_params;
pub mod main_params;
pub mod search_params;

use std::sync::Arc;

use chapter_params::{AddChapterParams, RemoveChapterParams, UpdateChapterParams};
use file_params::{CreateFileParams, FileParams};
use main_params::{ProjectParams, SectionParams, UpdateMainParams, UpdateSectionParams};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_params::SearchParams;
use serde_json::json;

use knowledge_mcp::error::{ErrorPayload, KnowledgeError};
use knowledge_mcp::knowledge::types::{ChapterRef, InsertPosition, NewChapter, NewDocument};
use knowledge_mcp::knowledge::{KnowledgeStore, KNOWLEDGE_DIR};

/// The MCP tool handler. Every tool is a thin call into [`KnowledgeStore`];
/// failures come back as an [`ErrorPayload`] JSON string.
#[derive(Clone)]
pub struct KnowledgeTools {
    tool_router: ToolRouter<Self>,
    store: Arc<KnowledgeStore>,
}

fn failure(err: &KnowledgeError, project_id: &str, filename: Option<&str>) -> String {
    ErrorPayload::new(err, Some(project_id), filename).to_json()
}

/// Exactly one of a title or an index.
fn chapter_ref(title: Option<String>, index: Option<usize>) -> Result<ChapterRef, KnowledgeError> {
    match (title, index) {
        (Some(title), None) => Ok(ChapterRef::Title(title)),
        (None, Some(index)) => Ok(ChapterRef::Index(index)),
        (Some(_), Some(_)) => Err(KnowledgeError::invalid_content(
            "give either chapter_title or chapter_index, not both",
        )),
        (None, None) => Err(KnowledgeError::invalid_content(
            "chapter_title or chapter_index is required",
        )),
    }
}

fn insert_position(
    position: Option<&str>,
    reference: Option<String>,
) -> Result<InsertPosition, KnowledgeError> {
    let reference = || {
        reference
            .clone()
            .map(ChapterRef::Title)
            .ok_or_else(|| KnowledgeError::invalid_content("reference_chapter is required"))
    };
    match position.map(str::trim).unwrap_or("end") {
        "start" => Ok(InsertPosition::Start),
        "end" => Ok(InsertPosition::End),
        "before" => Ok(InsertPosition::Before(reference()?)),
        "after" => Ok(InsertPosition::After(reference()?)),
        other => Err(KnowledgeError::invalid_content(format!(
            "unknown position '{other}', expected start, end, before or after"
        ))),
    }
}

#[tool_router]
impl KnowledgeTools {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            store,
        }
    }

    #[tool(description = "Get a project's main instructions document. Returns {exists, content}; exists is false when the project or its main document is missing.")]
    async fn get_project_main(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, "get_project_main called");
        match self.store.get_main(&params.project_id).await {
            Ok(content) => Ok(json!({"success": true, "exists": true, "content": content}).to_string()),
            Err(e) if e.is_not_found() => {
                Ok(json!({"success": true, "exists": false, "content": ""}).to_string())
            }
            Err(e) => Err(failure(&e, &params.project_id, None)),
        }
    }

    #[tool(description = "Replace or create a project's main instructions document. Creates the project if needed.")]
    async fn update_project_main(
        &self,
        Parameters(params): Parameters<UpdateMainParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, content_len = params.content.len(), "update_project_main called");
        self.store
            .replace_main(&params.project_id, &params.content)
            .await
            .map_err(|e| failure(&e, &params.project_id, None))?;
        Ok(json!({"success": true, "message": "Project main document updated"}).to_string())
    }

    #[tool(description = "Get one '## ' section of a project's main document by its exact header.")]
    async fn get_main_section(
        &self,
        Parameters(params): Parameters<SectionParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, header = %params.section_header, "get_main_section called");
        let content = self
            .store
            .get_main_section(&params.project_id, &params.section_header)
            .await
            .map_err(|e| failure(&e, &params.project_id, None))?;
        Ok(json!({
            "success": true,
            "section_header": params.section_header,
            "content": content,
        })
        .to_string())
    }

    #[tool(description = "Replace one '## ' section of a project's main document; the section is appended if missing. The main document must exist.")]
    async fn update_main_section(
        &self,
        Parameters(params): Parameters<UpdateSectionParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, header = %params.section_header, "update_main_section called");
        self.store
            .replace_main_section(&params.project_id, &params.section_header, &params.new_content)
            .await
            .map_err(|e| failure(&e, &params.project_id, None))?;
        Ok(json!({"success": true, "message": format!("Section '{}' updated", params.section_header)}).to_string())
    }

    #[tool(description = "Remove one '## ' section (header and body) from a project's main document.")]
    async fn remove_main_section(
        &self,
        Parameters(params): Parameters<SectionParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, header = %params.section_header, "remove_main_section called");
        self.store
            .remove_main_section(&params.project_id, &params.section_header)
            .await
            .map_err(|e| failure(&e, &params.project_id, None))?;
        Ok(json!({"success": true, "message": format!("Section '{}' removed", params.section_header)}).to_string())
    }

    #[tool(description = "Create a structured knowledge document with front matter (title, keywords), an introduction, and chapters. The filename is slugified. At least one keyword is required; fails if the document already exists.")]
    async fn create_knowledge_file(
        &self,
        Parameters(params): Parameters<CreateFileParams>,
    ) -> Result<String, String> {
        tracing::info!(
            project_id = %params.project_id,
            file = %params.filename,
            chapters = params.chapters.len(),
            "create_knowledge_file called"
        );
        let request = NewDocument {
            filename: params.filename.clone(),
            title: params.title,
            introduction: params.introduction,
            keywords: params.keywords,
            chapters: params
                .chapters
                .into_iter()
                .map(|c| NewChapter::new(c.title, c.content))
                .collect(),
        };
        let filename = self
            .store
            .create_document(&params.project_id, &request)
            .await
            .map_err(|e| failure(&e, &params.project_id, Some(&params.filename)))?;
        Ok(json!({
            "success": true,
            "document_id": filename,
            "filepath": format!("{KNOWLEDGE_DIR}/{filename}"),
            "message": "Knowledge document created",
        })
        .to_string())
    }

    #[tool(description = "Read a knowledge document: metadata, introduction, and every chapter with its level, summary, and content.")]
    async fn read_knowledge_file(
        &self,
        Parameters(params): Parameters<FileParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, file = %params.filename, "read_knowledge_file called");
        let doc = self
            .store
            .get_document(&params.project_id, &params.filename)
            .await
            .map_err(|e| failure(&e, &params.project_id, Some(&params.filename)))?;
        Ok(json!({"success": true, "document": doc}).to_string())
    }

    #[tool(description = "List a project's knowledge documents with title, keywords, timestamps, and chapter count.")]
    async fn list_knowledge_files(
        &self,
        Parameters(params): Parameters<ProjectParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, "list_knowledge_files called");
        let files = self
            .store
            .list_documents(&params.project_id)
            .await
            .map_err(|e| failure(&e, &params.project_id, None))?;
        Ok(json!({"success": true, "count": files.len(), "files": files}).to_string())
    }

    #[tool(description = "Delete a knowledge document.")]
    async fn delete_knowledge_file(
        &self,
        Parameters(params): Parameters<FileParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, file = %params.filename, "delete_knowledge_file called");
        let filename = self
            .store
            .delete_document(&params.project_id, &params.filename)
            .await
            .map_err(|e| failure(&e, &params.project_id, Some(&params.filename)))?;
        Ok(json!({"success": true, "message": format!("Deleted {filename}")}).to_string())
    }

    #[tool(description = "Replace the body of one chapter, addressed by exact title or zero-based index. The heading is kept; other chapters are untouched.")]
    async fn update_chapter(
        &self,
        Parameters(params): Parameters<UpdateChapterParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, file = %params.filename, "update_chapter called");
        let fail = |e: KnowledgeError| failure(&e, &params.project_id, Some(&params.filename));
        let target = chapter_ref(params.chapter_title.clone(), params.chapter_index).map_err(fail)?;
        let chapter = self
            .store
            .replace_chapter(&params.project_id, &params.filename, &target, &params.new_content)
            .await
            .map_err(fail)?;
        Ok(json!({"success": true, "chapter": chapter}).to_string())
    }

    #[tool(description = "Add a chapter to a knowledge document at the start, the end (default), or before/after a named chapter. Titles must be unique; a document holds at most 50 chapters.")]
    async fn add_chapter(
        &self,
        Parameters(params): Parameters<AddChapterParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, file = %params.filename, title = %params.chapter_title, "add_chapter called");
        let fail = |e: KnowledgeError| failure(&e, &params.project_id, Some(&params.filename));
        let at = insert_position(params.position.as_deref(), params.reference_chapter.clone())
            .map_err(fail)?;
        let chapter = NewChapter::new(params.chapter_title.clone(), params.content.clone());
        let added = self
            .store
            .add_chapter(&params.project_id, &params.filename, &chapter, &at)
            .await
            .map_err(fail)?;
        Ok(json!({"success": true, "chapter": added}).to_string())
    }

    #[tool(description = "Remove one chapter, addressed by exact title or zero-based index.")]
    async fn remove_chapter(
        &self,
        Parameters(params): Parameters<RemoveChapterParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, file = %params.filename, "remove_chapter called");
        let fail = |e: KnowledgeError| failure(&e, &params.project_id, Some(&params.filename));
        let target = chapter_ref(params.chapter_title.clone(), params.chapter_index).map_err(fail)?;
        let removed = self
            .store
            .remove_chapter(&params.project_id, &params.filename, &target)
            .await
            .map_err(fail)?;
        Ok(json!({"success": true, "message": format!("Removed chapter '{}'", removed.title)}).to_string())
    }

    #[tool(description = "Search a project's knowledge documents for space-separated keywords (case-insensitive). Results are grouped by document, with matching chapters and context excerpts.")]
    async fn search_knowledge(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<String, String> {
        tracing::info!(project_id = %params.project_id, query = %params.query, "search_knowledge called");
        let results = self
            .store
            .search(&params.project_id, &params.query)
            .await
            .map_err(|e| failure(&e, &params.project_id, None))?;
        let total_matches: usize = results.iter().map(|hit| hit.match_count).sum();
        Ok(json!({
            "success": true,
            "total_documents": results.len(),
            "total_matches": total_matches,
            "results": results,
        })
        .to_string())
    }
}

#[tool_handler]
impl ServerHandler for KnowledgeTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Knowledge MCP stores per-project instructions and structured knowledge documents. \
                 Start with get_project_main, use search_knowledge to find documents, and \
                 read_knowledge_file to read one."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chapter_ref_needs_exactly_one() {
        assert_eq!(
            chapter_ref(Some("Intro".into()), None).unwrap(),
            ChapterRef::Title("Intro".into())
        );
        assert_eq!(chapter_ref(None, Some(2)).unwrap(), ChapterRef::Index(2));
        assert!(chapter_ref(None, None).is_err());
        assert!(chapter_ref(Some("x".into()), Some(0)).is_err());
    }

    #[test]
    fn insert_positions_parse() {
        assert_eq!(insert_position(None, None).unwrap(), InsertPosition::End);
        assert_eq!(insert_position(Some("start"), None).unwrap(), InsertPosition::Start);
        assert_eq!(
            insert_position(Some("after"), Some("Setup".into())).unwrap(),
            InsertPosition::After(ChapterRef::Title("Setup".into()))
        );
        assert!(insert_position(Some("before"), None).is_err());
        assert!(insert_position(Some("middle"), None).is_err());
    }
}
