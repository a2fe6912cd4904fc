//! CLI `projects` command: list registered projects and their documents.

use anyhow::Result;

use knowledge_mcp::config::KnowledgeConfig;

pub async fn projects(config: &KnowledgeConfig) -> Result<()> {
    let store = super::open_store(config).await?;
    let ids = store.list_projects().await;

    if ids.is_empty() {
        println!("No projects yet.");
        return Ok(());
    }

    println!("{} project(s)\n", ids.len());
    for id in &ids {
        let docs = store.list_documents(id).await?;
        let has_main = store.get_main(id).await.is_ok();
        println!(
            "  {id}  ({} document(s){})",
            docs.len(),
            if has_main { ", main.md" } else { "" }
        );
        for doc in docs {
            println!("      {}  {}", doc.filename, doc.title);
        }
    }
    Ok(())
}
