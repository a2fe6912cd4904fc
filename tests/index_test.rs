mod helpers;

use std::collections::HashSet;
use std::sync::Arc;

use knowledge_mcp::config::KnowledgeConfig;
use knowledge_mcp::knowledge::KnowledgeStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_get_distinct_slugs() {
    let tmp = tempfile::TempDir::new().unwrap();
    let store = Arc::new(
        KnowledgeStore::open(&KnowledgeConfig::for_root(tmp.path()))
            .await
            .unwrap(),
    );

    let ids = ["My Project", "my-project", "MY PROJECT", "my project", "My_Project"];
    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let store = Arc::clone(&store);
            let id = id.to_string();
            tokio::spawn(async move { store.storage().index().get_or_create(&id).await.unwrap() })
        })
        .collect();

    let mut dirs = HashSet::new();
    for handle in handles {
        dirs.insert(handle.await.unwrap());
    }
    assert_eq!(dirs.len(), ids.len());

    // Repeat calls keep their slug.
    for id in ids {
        let again = store.storage().index().get_or_create(id).await.unwrap();
        assert!(dirs.contains(&again));
    }
}

#[tokio::test]
async fn index_survives_reopen() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = KnowledgeConfig::for_root(tmp.path());

    let first = KnowledgeStore::open(&config).await.unwrap();
    first.replace_main("Café Notes", "# Notes\n").await.unwrap();
    drop(first);

    let second = KnowledgeStore::open(&config).await.unwrap();
    assert_eq!(second.list_projects().await, vec!["Café Notes".to_string()]);
    assert_eq!(second.get_main("Café Notes").await.unwrap(), "# Notes\n");
}

#[tokio::test]
async fn index_mutations_are_committed() {
    let Some((_tmp, store)) = helpers::git_store().await else {
        return;
    };
    store.replace_main("Demo", "# Demo\n").await.unwrap();
    store.delete_project("Demo").await.unwrap();

    let subjects = store.storage().git().recent_subjects(10).await.unwrap();
    assert!(subjects.iter().any(|s| s == "Register project: Demo"));
    assert!(subjects.iter().any(|s| s == "Remove project: Demo"));
    assert!(subjects.iter().any(|s| s == "Update main document for Demo"));
}
