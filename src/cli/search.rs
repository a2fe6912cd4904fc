use anyhow::Result;

use knowledge_mcp::config::KnowledgeConfig;

const PREVIEW_CHARS: usize = 120;

/// Run a keyword search from the terminal.
pub async fn search(config: &KnowledgeConfig, project_id: &str, query: &str) -> Result<()> {
    let store = super::open_store(config).await?;
    let hits = store.search(project_id, query).await?;

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    let sections: usize = hits.iter().map(|hit| hit.match_count).sum();
    println!("Found {sections} matching section(s) in {} document(s)\n", hits.len());

    for (i, hit) in hits.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, hit.file, hit.metadata.title);
        for chapter in &hit.matching_chapters {
            let label = if chapter.chapter.is_empty() {
                "(introduction)"
            } else {
                chapter.chapter.as_str()
            };
            println!("     - {label}: {}", chapter.keywords_found.join(", "));
            let first = chapter.match_context.values().flatten().next();
            if let Some(excerpt) = first {
                let preview: String = excerpt.chars().take(PREVIEW_CHARS).collect();
                println!("       {}", preview.replace('\n', " "));
            }
        }
        println!();
    }

    Ok(())
}
