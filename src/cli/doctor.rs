//! CLI `doctor` command: check the storage root and print a health report.

use anyhow::Result;

use knowledge_mcp::config::KnowledgeConfig;
use knowledge_mcp::storage::git;

/// Inspect the storage root, git, and the project index.
pub async fn doctor(config: &KnowledgeConfig) -> Result<()> {
    let root = config.resolved_root();
    let git_installed = git::git_available().await;

    println!("Knowledge MCP Health Report");
    println!("===========================");
    println!();
    println!("Storage root:      {}", root.display());
    println!("git executable:    {}", if git_installed { "found" } else { "NOT FOUND" });
    println!("git sync:          {}", if config.git.enabled { "enabled" } else { "disabled" });

    if !root.exists() {
        println!();
        println!("Storage root does not exist yet. Run `knowledge-mcp serve` to initialize.");
        return Ok(());
    }

    let store = super::open_store(config).await?;
    let storage = store.storage();

    if storage.git().is_enabled() {
        let remote = storage.git().has_remote().await;
        println!("git remote:        {}", if remote { config.git.remote.as_str() } else { "(none)" });
        match storage.git().recent_subjects(1).await {
            Ok(subjects) => println!(
                "Last commit:       {}",
                subjects.first().map_or("(none)", String::as_str)
            ),
            Err(e) => println!("Last commit:       unavailable ({e})"),
        }
    }

    let health = storage.index().health().await;
    println!();
    println!("Project index:");
    println!("  File:            {}", if health.present { "present" } else { "missing (empty)" });
    println!("  Parses:          {}", if health.valid { "OK" } else { "FAILED" });
    println!("  Projects:        {}", health.projects);
    if !health.missing_dirs.is_empty() {
        println!("  Missing dirs:    {}", health.missing_dirs.join(", "));
    }
    if !health.orphan_dirs.is_empty() {
        println!("  Orphan dirs:     {}", health.orphan_dirs.join(", "));
    }
    println!("Activity entries:  {}", storage.activity().entries().await.len());

    if !health.valid || (config.git.enabled && !git_installed) {
        println!();
        println!("Recovery steps:");
        if !health.valid {
            println!("  - index.json is unreadable and is treated as empty; restore it from git history");
        }
        if config.git.enabled && !git_installed {
            println!("  - install git, or set git.enabled = false in config.toml");
        }
    }

    Ok(())
}
