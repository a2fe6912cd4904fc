mod helpers;

use knowledge_mcp::knowledge::types::{ChapterRef, InsertPosition, NewChapter};

#[tokio::test]
async fn api_guide_scenario() {
    let (_tmp, store) = helpers::test_store().await;

    let request = helpers::new_document(
        "api-guide",
        &["api", "rest"],
        &[("Getting Started", "Point the client at the server.")],
    );
    let filename = store.create_document("Demo", &request).await.unwrap();
    assert_eq!(filename, "api-guide.md");

    store
        .replace_chapter(
            "Demo",
            "api-guide.md",
            &"Getting Started".into(),
            "Send REST requests with a bearer token.",
        )
        .await
        .unwrap();

    let hits = store.search("Demo", "rest").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file, "api-guide.md");
    let chapter = &hits[0].matching_chapters[0];
    assert_eq!(chapter.chapter, "Getting Started");
    assert!(chapter.match_context["rest"][0].contains("REST"));

    store.delete_document("Demo", "api-guide.md").await.unwrap();
    let err = store.get_document("Demo", "api-guide.md").await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(err.to_string(), "document not found: api-guide.md");
}

#[tokio::test]
async fn chapter_isolation_on_disk() {
    let (_tmp, store) = helpers::test_store().await;
    let request = helpers::new_document(
        "guide",
        &["guide"],
        &[("A", "alpha text"), ("B", "beta text"), ("C", "gamma text")],
    );
    store.create_document("Demo", &request).await.unwrap();
    let before = store.get_document("Demo", "guide").await.unwrap();

    store
        .replace_chapter("Demo", "guide", &ChapterRef::Index(1), "new beta")
        .await
        .unwrap();
    store
        .add_chapter("Demo", "guide", &NewChapter::new("D", "delta"), &InsertPosition::Start)
        .await
        .unwrap();
    store
        .remove_chapter("Demo", "guide", &"D".into())
        .await
        .unwrap();

    let after = store.get_document("Demo", "guide").await.unwrap();
    assert_eq!(after.chapters[0], before.chapters[0]);
    assert_eq!(after.chapters[2], before.chapters[2]);
    assert_eq!(after.chapters[1].content.trim_end(), "## B\n\nnew beta");
}

#[tokio::test]
async fn missing_things_are_not_found() {
    let (_tmp, store) = helpers::test_store().await;
    store
        .create_document("Demo", &helpers::new_document("guide", &["g"], &[("A", "a")]))
        .await
        .unwrap();

    let chapter_err = store
        .get_chapter("Demo", "guide", &"Missing".into())
        .await
        .unwrap_err();
    assert_eq!(chapter_err.to_string(), "chapter not found: Missing");

    let index_err = store
        .remove_chapter("Demo", "guide", &ChapterRef::Index(5))
        .await
        .unwrap_err();
    assert!(index_err.is_not_found());

    assert!(store.delete_document("Demo", "nope").await.unwrap_err().is_not_found());
    assert!(store.get_main("Demo").await.unwrap_err().is_not_found());
    assert!(store.delete_project("Unknown").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn duplicate_chapter_and_chapter_limit() {
    let (_tmp, store) = helpers::test_store().await;
    let titles: Vec<String> = (0..50).map(|i| format!("Chapter {i}")).collect();
    let chapters: Vec<(&str, &str)> = titles.iter().map(|t| (t.as_str(), "x")).collect();
    store
        .create_document("Demo", &helpers::new_document("big", &["big"], &chapters))
        .await
        .unwrap();

    let dup = store
        .add_chapter("Demo", "big", &NewChapter::new("Chapter 3", "x"), &InsertPosition::End)
        .await
        .unwrap_err();
    assert_eq!(dup.code(), "ALREADY_EXISTS");

    let full = store
        .add_chapter("Demo", "big", &NewChapter::new("Chapter 50", "x"), &InsertPosition::End)
        .await
        .unwrap_err();
    assert_eq!(full.code(), "INVALID_CONTENT");

    let too_many: Vec<String> = (0..51).map(|i| format!("C{i}")).collect();
    let chapters: Vec<(&str, &str)> = too_many.iter().map(|t| (t.as_str(), "x")).collect();
    let err = store
        .create_document("Demo", &helpers::new_document("bigger", &["b"], &chapters))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_CONTENT");
}

#[tokio::test]
async fn traversal_filenames_stay_in_knowledge_dir() {
    let (tmp, store) = helpers::test_store().await;
    let name = store
        .create_document("Demo", &helpers::new_document("../../../etc/passwd", &["x"], &[]))
        .await
        .unwrap();
    assert_eq!(name, "etc_passwd.md");
    assert!(!tmp.path().join("etc").exists());
    assert_eq!(store.list_documents("Demo").await.unwrap()[0].filename, "etc_passwd.md");
}

#[tokio::test]
async fn unsafe_front_matter_is_rejected_on_read() {
    let (_tmp, store) = helpers::test_store().await;
    store
        .create_document("Demo", &helpers::new_document("safe", &["s"], &[]))
        .await
        .unwrap();

    let dir = store.storage().index().resolve("Demo").await.unwrap();
    std::fs::write(
        dir.join("knowledge/evil.md"),
        "---\ntitle: !!python/object/apply:os.system ['touch /tmp/pwned']\n---\nbody\n",
    )
    .unwrap();

    let err = store.get_document("Demo", "evil.md").await.unwrap_err();
    assert_eq!(err.code(), "INVALID_CONTENT");
    // Listing and search skip it instead of failing.
    assert_eq!(store.list_documents("Demo").await.unwrap().len(), 1);
    assert!(store.search("Demo", "body").await.unwrap().is_empty());
}

#[tokio::test]
async fn writes_are_committed_with_git() {
    let Some((_tmp, store)) = helpers::git_store().await else {
        return;
    };
    store
        .create_document("Demo", &helpers::new_document("guide", &["g"], &[("A", "a")]))
        .await
        .unwrap();
    store
        .replace_chapter("Demo", "guide", &"A".into(), "b")
        .await
        .unwrap();

    let subjects = store.storage().git().recent_subjects(10).await.unwrap();
    assert!(subjects.iter().any(|s| s == "Create knowledge document guide.md in Demo"));
    assert!(subjects
        .iter()
        .any(|s| s == "Update knowledge document guide.md in Demo (replace_chapter)"));
}

#[tokio::test]
async fn unclosed_fence_cannot_swallow_later_chapters() {
    let (_tmp, store) = helpers::test_store().await;

    let request = helpers::new_document(
        "fenced",
        &["code"],
        &[("A", "```\nlet x = 1;"), ("B", "beta text"), ("C", "gamma text")],
    );
    let err = store.create_document("Demo", &request).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_CONTENT");
    assert!(store.list_projects().await.is_empty());

    let request = helpers::new_document(
        "fenced",
        &["code"],
        &[("A", "```\nlet x = 1;\n```"), ("B", "beta text"), ("C", "gamma text")],
    );
    store.create_document("Demo", &request).await.unwrap();

    let err = store
        .replace_chapter("Demo", "fenced", &"A".into(), "~~~\nopen")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_CONTENT");

    store
        .replace_chapter("Demo", "fenced", &"B".into(), "beta, revised")
        .await
        .unwrap();
    let doc = store.get_document("Demo", "fenced").await.unwrap();
    let titles: Vec<_> = doc.chapters.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn long_names_stay_usable() {
    let (_tmp, store) = helpers::test_store().await;
    let project = "a".repeat(300);

    store.replace_main(&project, "hello").await.unwrap();
    assert_eq!(store.get_main(&project).await.unwrap(), "hello");

    let long_file = "b".repeat(300);
    let request = helpers::new_document(&long_file, &["k"], &[("One", "x")]);
    let filename = store.create_document(&project, &request).await.unwrap();
    assert!(filename.len() <= 255);
    assert!(filename.ends_with(".md"));

    let doc = store.get_document(&project, &long_file).await.unwrap();
    assert_eq!(doc.chapters.len(), 1);
}
