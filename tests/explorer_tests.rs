//! Node cache and generation tests through the public API

use knowledge_explorer::llm::{ChildSpec, LlmError, MockGenerator};
use knowledge_explorer::taxonomy::Taxonomy;
use knowledge_explorer::tree::{
    Explorer, GenerationOutcome, InMemoryNodeStore, Node, NodeCache, NodeStore, PageInfo,
};
use std::sync::Arc;
use tokio::sync::Notify;

fn specs(prefix: &str, n: usize) -> Vec<ChildSpec> {
    (1..=n)
        .map(|i| ChildSpec::new(format!("{} {}", prefix, i), format!("hook {}", i)))
        .collect()
}

fn seeded_store() -> Arc<InMemoryNodeStore> {
    let roots = vec![
        Node::leaf("history", "History", "What happened"),
        Node::leaf("art", "Art", "What was made"),
    ];
    Arc::new(InMemoryNodeStore::new(NodeCache::new(roots, Vec::new(), 20)))
}

fn explorer_with(store: Arc<InMemoryNodeStore>, generator: Arc<MockGenerator>) -> Explorer {
    Explorer::new(store, generator, 5)
}

#[tokio::test]
async fn test_select_root_stores_five_children_in_response_order() {
    let store = seeded_store();
    let generator = Arc::new(MockGenerator::new());
    generator.push_ok(specs("Era", 5)).await;
    let explorer = explorer_with(store.clone(), generator.clone());

    let before = store.len().await;
    let outcome = explorer.select_node("history", 0).await.unwrap();
    let GenerationOutcome::Generated {
        page_index,
        child_ids,
    } = outcome
    else {
        panic!("expected a generated page, got {:?}", outcome);
    };

    assert_eq!(page_index, 0);
    assert_eq!(store.len().await, before + 5);

    let parent = store.get("history").await.unwrap();
    assert_eq!(parent.children_pages, vec![child_ids.clone()]);

    let mut unique = child_ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5);

    let titles: Vec<String> = store
        .visible_children("history")
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert_eq!(titles, vec!["Era 1", "Era 2", "Era 3", "Era 4", "Era 5"]);

    // Same cache state and response give the same ids
    let other_store = seeded_store();
    let other_generator = Arc::new(MockGenerator::new());
    other_generator.push_ok(specs("Era", 5)).await;
    let other = explorer_with(other_store, other_generator);
    let again = other.select_node("history", 0).await.unwrap();
    assert_eq!(
        again,
        GenerationOutcome::Generated {
            page_index: 0,
            child_ids
        }
    );
}

#[tokio::test]
async fn test_children_ids_are_concatenated_pages() {
    let store = seeded_store();
    let generator = Arc::new(MockGenerator::new());
    generator.push_ok(specs("First", 3)).await;
    generator.push_ok(specs("Second", 2)).await;
    generator.push_ok(specs("Third", 4)).await;
    let explorer = explorer_with(store.clone(), generator);

    explorer.generate_children("history").await.unwrap();
    explorer.generate_more_children("history").await.unwrap();
    explorer.generate_more_children("history").await.unwrap();

    let node = store.get("history").await.unwrap();
    assert_eq!(node.children_pages.len(), 3);
    let flattened: Vec<String> = node.children_pages.concat();
    assert_eq!(node.children_ids, flattened);
    assert_eq!(
        explorer.page_info("history").await.unwrap(),
        PageInfo {
            current: 3,
            total: 3,
            has_children: true
        }
    );
}

#[tokio::test]
async fn test_single_page_info() {
    let store = seeded_store();
    let generator = Arc::new(MockGenerator::new());
    generator.push_ok(specs("Era", 5)).await;
    let explorer = explorer_with(store, generator);

    explorer.generate_children("history").await.unwrap();
    assert_eq!(
        explorer.page_info("history").await.unwrap(),
        PageInfo {
            current: 1,
            total: 1,
            has_children: true
        }
    );
}

#[tokio::test]
async fn test_duplicate_generation_is_suppressed() {
    let store = seeded_store();
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(MockGenerator::new().with_gate(gate.clone()));
    let explorer = Arc::new(explorer_with(store.clone(), generator.clone()));

    let first = {
        let explorer = explorer.clone();
        tokio::spawn(async move { explorer.generate_children("history").await })
    };
    while !explorer.is_in_flight("history") {
        tokio::task::yield_now().await;
    }
    assert!(explorer.is_loading());

    let second = explorer.generate_children("history").await.unwrap();
    assert_eq!(second, GenerationOutcome::Suppressed);

    gate.notify_one();
    let first = first.await.unwrap().unwrap();
    assert!(first.is_generated());
    assert_eq!(generator.call_count().await, 1);
    assert!(!explorer.is_in_flight("history"));
    assert!(!explorer.is_loading());
}

#[tokio::test]
async fn test_different_parents_generate_concurrently() {
    let store = seeded_store();
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(MockGenerator::new().with_gate(gate.clone()));
    let explorer = Arc::new(explorer_with(store.clone(), generator.clone()));

    let spawn = |id: &'static str| {
        let explorer = explorer.clone();
        tokio::spawn(async move { explorer.generate_children(id).await })
    };
    let history = spawn("history");
    let art = spawn("art");
    // Both requests are parked on the gate once recorded
    while generator.call_count().await < 2 {
        tokio::task::yield_now().await;
    }
    assert!(explorer.is_in_flight("history") && explorer.is_in_flight("art"));

    gate.notify_waiters();
    assert!(history.await.unwrap().unwrap().is_generated());
    assert!(art.await.unwrap().unwrap().is_generated());
    assert_eq!(generator.call_count().await, 2);
}

#[tokio::test]
async fn test_failed_generation_leaves_node_unchanged() {
    let store = seeded_store();
    let generator = Arc::new(MockGenerator::new());
    generator
        .push_err(LlmError::Upstream {
            status: 500,
            message: "boom".into(),
        })
        .await;
    let explorer = explorer_with(store.clone(), generator.clone());

    let before = store.get("history").await.unwrap();
    let outcome = explorer.select_node("history", 0).await.unwrap();
    assert!(matches!(outcome, GenerationOutcome::Failed { .. }));
    assert_eq!(store.get("history").await.unwrap(), before);
    assert!(!explorer.is_loading());
    assert!(!explorer.is_in_flight("history"));

    // Re-selecting is a fresh attempt
    let retry = explorer.select_node("history", 0).await.unwrap();
    assert!(retry.is_generated());
    assert_eq!(generator.call_count().await, 2);
}

#[tokio::test]
async fn test_page_navigation_never_generates() {
    let store = seeded_store();
    let generator = Arc::new(MockGenerator::new());
    let explorer = explorer_with(store, generator.clone());

    explorer.generate_children("history").await.unwrap();
    explorer.generate_more_children("history").await.unwrap();
    assert_eq!(generator.call_count().await, 2);

    explorer.set_page("history", 0).await.unwrap();
    explorer.set_page("history", 1).await.unwrap();
    assert!(explorer.set_page("history", 2).await.is_err());
    assert_eq!(explorer.page_info("history").await.unwrap().current, 2);
    assert_eq!(generator.call_count().await, 2);
}

#[tokio::test]
async fn test_bundled_taxonomy_static_children() {
    let cache = Taxonomy::load_or_default(None)
        .unwrap()
        .into_cache(20)
        .unwrap();
    let store = InMemoryNodeStore::new(cache);

    let roots = store.roots().await;
    assert!(!roots.is_empty());
    assert!(roots.iter().all(|r| r.is_static && r.popup_data.is_some()));

    let math = roots.iter().find(|r| !r.children_ids.is_empty()).unwrap();
    let info = store.page_info(&math.id).await.unwrap();
    assert_eq!(
        info,
        PageInfo {
            current: 1,
            total: 1,
            has_children: true
        }
    );
}
