//! Hierarchy scenarios for the category repository
//!
//! Every scenario runs against both backends: the libsql store on a temporary
//! database file and the in-memory store.

use crate::db::{DatabaseService, MemoryStore, TursoStore};
use crate::models::{Category, CategoryId, CategoryName, Interval, UNDEFINED_ID};
use crate::services::{CategoryRepository, CategoryServiceError};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

struct Backend {
    label: &'static str,
    repository: CategoryRepository,
    _temp_dir: Option<TempDir>,
}

async fn backends() -> Vec<Backend> {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Arc::new(DatabaseService::new(db_path).await.unwrap());

    vec![
        Backend {
            label: "turso",
            repository: CategoryRepository::new(Arc::new(TursoStore::new(db))),
            _temp_dir: Some(temp_dir),
        },
        Backend {
            label: "memory",
            repository: CategoryRepository::new(Arc::new(MemoryStore::new())),
            _temp_dir: None,
        },
    ]
}

fn category(id: CategoryId, parent_id: CategoryId, name: &str) -> Category {
    Category::new(id, parent_id, CategoryName::new(name, name.to_lowercase(), name))
}

fn ids(categories: &[Category]) -> Vec<CategoryId> {
    categories.iter().map(|c| c.id).collect()
}

/// R(1) -> A(2) -> B(3), plus a second tree R2(10)
async fn seed_two_trees(repository: &CategoryRepository) {
    repository.save(category(1, 1, "R")).await.unwrap();
    repository.save(category(2, 1, "A")).await.unwrap();
    repository.save(category(3, 2, "B")).await.unwrap();
    repository.save(category(10, 10, "R2")).await.unwrap();
}

async fn all_ids(repository: &CategoryRepository) -> Vec<CategoryId> {
    let mut all = Vec::new();
    for root in repository.root().await.unwrap() {
        if root.is_undefined() {
            continue;
        }
        all.push(root.id);
        all.extend(ids(&repository.descendants(root.id).await.unwrap()));
    }
    all
}

async fn verify_all(repository: &CategoryRepository, label: &str) {
    for root in repository.root().await.unwrap() {
        if root.is_undefined() {
            continue;
        }
        if let Err(e) = repository.verify(root.id).await {
            panic!("[{label}] tree {} invalid: {e}", root.id);
        }
    }
}

#[tokio::test]
async fn test_path_depth_children_descendants() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;

        assert_eq!(ids(&repo.path(3).await.unwrap().unwrap()), vec![1, 2, 3], "{}", backend.label);
        assert_eq!(repo.depth(3).await.unwrap(), Some(2), "{}", backend.label);
        assert_eq!(repo.depth(1).await.unwrap(), Some(0), "{}", backend.label);
        assert_eq!(ids(&repo.children(2).await.unwrap()), vec![3], "{}", backend.label);
        assert_eq!(ids(&repo.children(1).await.unwrap()), vec![2], "{}", backend.label);
        assert_eq!(ids(&repo.descendants(1).await.unwrap()), vec![2, 3], "{}", backend.label);
        assert!(repo.descendants(10).await.unwrap().is_empty(), "{}", backend.label);
    }
}

#[tokio::test]
async fn test_move_subtree_to_other_tree() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;

        let moved = repo.save(category(2, 10, "A")).await.unwrap();
        assert_eq!(moved.parent_id, 10);

        assert!(repo.descendants(1).await.unwrap().is_empty(), "{}", backend.label);
        assert_eq!(ids(&repo.descendants(10).await.unwrap()), vec![2, 3], "{}", backend.label);
        assert_eq!(ids(&repo.path(3).await.unwrap().unwrap()), vec![10, 2, 3], "{}", backend.label);
        assert_eq!(repo.depth(3).await.unwrap(), Some(2), "{}", backend.label);

        assert_eq!(repo.placement(1).await.unwrap(), Some(Interval::new(1, 2, 1)));
        assert_eq!(repo.placement(10).await.unwrap(), Some(Interval::new(1, 6, 10)));
        assert_eq!(repo.placement(2).await.unwrap(), Some(Interval::new(2, 5, 10)));
        assert_eq!(repo.placement(3).await.unwrap(), Some(Interval::new(3, 4, 10)));

        assert_ok!(repo.verify(1).await);
        assert_ok!(repo.verify(10).await);
    }
}

#[tokio::test]
async fn test_three_siblings_under_leaf() {
    for backend in backends().await {
        let repo = &backend.repository;
        repo.save(category(1, 1, "Root")).await.unwrap();
        for id in 2..=6 {
            repo.save(category(id, 1, &format!("Leaf {id}"))).await.unwrap();
        }
        assert_eq!(repo.placement(6).await.unwrap(), Some(Interval::new(10, 11, 1)));

        for id in 7..=9 {
            repo.save(category(id, 6, &format!("Child {id}"))).await.unwrap();
        }

        assert_eq!(repo.placement(6).await.unwrap(), Some(Interval::new(10, 17, 1)), "{}", backend.label);
        assert_eq!(repo.placement(7).await.unwrap(), Some(Interval::new(11, 12, 1)));
        assert_eq!(repo.placement(8).await.unwrap(), Some(Interval::new(13, 14, 1)));
        assert_eq!(repo.placement(9).await.unwrap(), Some(Interval::new(15, 16, 1)));
        assert_eq!(ids(&repo.children(6).await.unwrap()), vec![7, 8, 9]);
        assert_eq!(repo.placement(1).await.unwrap(), Some(Interval::new(1, 18, 1)));
    }
}

#[tokio::test]
async fn test_cycle_rejected_and_tree_unchanged() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;
        let before = repo.store().snapshot(1).await.unwrap();

        let err = repo.save(category(2, 3, "A")).await.unwrap_err();
        assert!(
            matches!(err, CategoryServiceError::InvalidParent { id: 2, parent_id: 3, .. }),
            "[{}] {err}",
            backend.label
        );

        let err = repo.save(category(1, 3, "R")).await.unwrap_err();
        assert!(matches!(err, CategoryServiceError::InvalidParent { .. }));

        // An existing child cannot be promoted by pointing it at itself
        let err = repo.save(category(2, 2, "A")).await.unwrap_err();
        assert!(matches!(err, CategoryServiceError::InvalidParent { .. }));

        assert_eq!(repo.store().snapshot(1).await.unwrap(), before, "{}", backend.label);
    }
}

#[tokio::test]
async fn test_missing_parent_rejected() {
    for backend in backends().await {
        let repo = &backend.repository;
        repo.save(category(1, 1, "R")).await.unwrap();

        let err = assert_err!(repo.save(category(2, 42, "Orphan")).await);
        assert!(matches!(
            err,
            CategoryServiceError::InvalidParent { id: 2, parent_id: 42, .. }
        ));
        assert!(repo.find(2).await.unwrap().is_none(), "{}", backend.label);

        let err = assert_err!(repo.save(category(1, 42, "R")).await);
        assert!(matches!(err, CategoryServiceError::InvalidParent { .. }));
    }
}

#[tokio::test]
async fn test_non_positive_parent_rejected_as_invalid_parent() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;
        let before = repo.store().snapshot(1).await.unwrap();

        let err = assert_err!(repo.save(category(20, 0, "Orphan")).await);
        assert!(
            matches!(err, CategoryServiceError::InvalidParent { id: 20, parent_id: 0, .. }),
            "[{}] {err}",
            backend.label
        );

        let err = assert_err!(repo.save(category(3, 0, "B")).await);
        assert!(matches!(
            err,
            CategoryServiceError::InvalidParent { id: 3, parent_id: 0, .. }
        ));
        assert!(repo.find(20).await.unwrap().is_none());
        assert_eq!(repo.store().snapshot(1).await.unwrap(), before, "{}", backend.label);
    }
}

#[tokio::test]
async fn test_move_root_tree_under_leaf_of_other_tree() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;
        repo.save(category(11, 10, "C")).await.unwrap();
        repo.save(category(12, 11, "D")).await.unwrap();

        let moved = repo.save(category(10, 3, "R2")).await.unwrap();
        assert_eq!(moved.parent_id, 3);

        assert_eq!(ids(&repo.root().await.unwrap()), vec![1, UNDEFINED_ID], "{}", backend.label);
        assert_eq!(
            ids(&repo.path(12).await.unwrap().unwrap()),
            vec![1, 2, 3, 10, 11, 12],
            "{}",
            backend.label
        );
        assert_eq!(repo.depth(12).await.unwrap(), Some(5));
        assert!(repo.store().snapshot(10).await.unwrap().is_empty());
        assert_eq!(repo.placement(1).await.unwrap(), Some(Interval::new(1, 12, 1)));
        assert_ok!(repo.verify(1).await);
    }
}

#[tokio::test]
async fn test_statement_failure_mid_move_rolls_back_every_step() {
    let temp_dir = TempDir::new().unwrap();
    let db = Arc::new(DatabaseService::new(temp_dir.path().join("test.db")).await.unwrap());
    let repo = CategoryRepository::new(Arc::new(TursoStore::new(db.clone())));
    seed_two_trees(&repo).await;
    let before_source = repo.store().snapshot(1).await.unwrap();
    let before_target = repo.store().snapshot(10).await.unwrap();

    // Interval steps succeed, the final parent update aborts
    let conn = db.connect().unwrap();
    conn.execute(
        "CREATE TRIGGER block_reparent BEFORE UPDATE OF parent_id ON category \
         BEGIN SELECT RAISE(ABORT, 'reparent blocked'); END",
        (),
    )
    .await
    .unwrap();

    let err = assert_err!(repo.save(category(2, 10, "A")).await);
    assert!(matches!(err, CategoryServiceError::PersistenceFailure(_)), "{err}");
    assert_eq!(repo.store().snapshot(1).await.unwrap(), before_source);
    assert_eq!(repo.store().snapshot(10).await.unwrap(), before_target);
    assert_eq!(repo.find(2).await.unwrap().map(|c| c.parent_id), Some(1));

    conn.execute("DROP TRIGGER block_reparent", ()).await.unwrap();

    let moved = assert_ok!(repo.save(category(2, 10, "A")).await);
    assert_eq!(moved.parent_id, 10);
    assert_eq!(ids(&repo.path(3).await.unwrap().unwrap()), vec![10, 2, 3]);
    assert_ok!(repo.verify(1).await);
    assert_ok!(repo.verify(10).await);
}

#[tokio::test]
async fn test_field_update_keeps_position() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;
        let before = repo.placement(2).await.unwrap();

        let renamed = repo
            .save(
                Category::new(2, 1, CategoryName::new("Apples", "pingguo", "apple"))
                    .with_description("Fresh and dried")
                    .with_icon("icons/apple.svg"),
            )
            .await
            .unwrap();
        assert_eq!(renamed.name.name, "Apples");
        assert_eq!(renamed.name.mnemonic, "pingguo");
        assert_eq!(renamed.description.as_deref(), Some("Fresh and dried"));
        assert_eq!(repo.placement(2).await.unwrap(), before, "{}", backend.label);
    }
}

#[tokio::test]
async fn test_descendant_count_matches_interval() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;
        repo.save(category(4, 1, "C")).await.unwrap();
        repo.save(category(5, 4, "D")).await.unwrap();
        repo.save(category(6, 4, "E")).await.unwrap();

        for id in all_ids(repo).await {
            let interval = repo.placement(id).await.unwrap().unwrap();
            let descendants = repo.descendants(id).await.unwrap();
            assert_eq!(
                descendants.len() as i64,
                interval.descendant_count(),
                "[{}] category {id}",
                backend.label
            );

            let path = repo.path(id).await.unwrap().unwrap();
            assert_eq!(repo.depth(id).await.unwrap(), Some(path.len() - 1));
        }
    }
}

#[tokio::test]
async fn test_move_preserves_descendant_set() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;
        repo.save(category(4, 3, "C")).await.unwrap();
        repo.save(category(5, 2, "D")).await.unwrap();
        repo.save(category(6, 1, "E")).await.unwrap();

        let before: BTreeSet<_> = ids(&repo.descendants(2).await.unwrap()).into_iter().collect();
        repo.save(category(2, 6, "A")).await.unwrap();
        let after: BTreeSet<_> = ids(&repo.descendants(2).await.unwrap()).into_iter().collect();

        assert_eq!(before, after, "{}", backend.label);
        assert_eq!(ids(&repo.path(4).await.unwrap().unwrap()), vec![1, 6, 2, 3, 4]);
        verify_all(repo, backend.label).await;
    }
}

#[tokio::test]
async fn test_remove_cascades_and_renumbers() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;
        repo.save(category(4, 1, "C")).await.unwrap();

        let result = repo.remove(2).await.unwrap();
        assert!(result.existed);
        assert_eq!(result.removed, 2, "{}", backend.label);

        assert!(repo.find(3).await.unwrap().is_none());
        assert_eq!(repo.placement(4).await.unwrap(), Some(Interval::new(2, 3, 1)));
        assert_eq!(repo.placement(1).await.unwrap(), Some(Interval::new(1, 4, 1)));
        verify_all(repo, backend.label).await;

        let result = repo.remove(10).await.unwrap();
        assert_eq!(result.removed, 1);
        assert_eq!(ids(&repo.root().await.unwrap()), vec![1, UNDEFINED_ID]);
    }
}

#[tokio::test]
async fn test_sentinel_and_misses() {
    for backend in backends().await {
        let repo = &backend.repository;
        seed_two_trees(repo).await;

        assert_eq!(repo.find(UNDEFINED_ID).await.unwrap(), Some(Category::undefined()));
        assert_eq!(ids(&repo.root().await.unwrap()), vec![1, 10, UNDEFINED_ID], "{}", backend.label);
        assert_eq!(ids(&repo.path(UNDEFINED_ID).await.unwrap().unwrap()), vec![UNDEFINED_ID]);
        assert_eq!(repo.depth(UNDEFINED_ID).await.unwrap(), Some(0));
        assert!(repo.children(UNDEFINED_ID).await.unwrap().is_empty());

        assert!(matches!(
            repo.save(Category::undefined()).await,
            Err(CategoryServiceError::SentinelImmutable)
        ));
        assert!(matches!(
            repo.remove(UNDEFINED_ID).await,
            Err(CategoryServiceError::SentinelImmutable)
        ));
        // The sentinel owns no interval, so it cannot parent anything
        assert!(matches!(
            repo.save(category(20, UNDEFINED_ID, "Loose")).await,
            Err(CategoryServiceError::InvalidParent { id: 20, parent_id: UNDEFINED_ID, .. })
        ));

        assert!(repo.find(99).await.unwrap().is_none());
        assert!(repo.path(99).await.unwrap().is_none());
        assert!(repo.depth(99).await.unwrap().is_none());
        assert!(repo.children(99).await.unwrap().is_empty());
        assert!(repo.descendants(99).await.unwrap().is_empty());
        assert!(!repo.remove(99).await.unwrap().existed, "{}", backend.label);
    }
}

#[tokio::test]
async fn test_next_identity_is_fresh() {
    for backend in backends().await {
        let repo = &backend.repository;
        let first = repo.next_identity().await.unwrap();
        let second = repo.next_identity().await.unwrap();
        assert!(first >= 1 && second > first, "{}", backend.label);

        repo.save(category(50, 50, "Explicit")).await.unwrap();
        assert!(repo.next_identity().await.unwrap() > 50, "{}", backend.label);
    }
}

#[tokio::test]
async fn test_random_mutations_preserve_invariants() {
    for backend in backends().await {
        let repo = &backend.repository;
        let mut state: u64 = 0x5eed_cafe;
        let mut next = |bound: usize| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as usize) % bound
        };

        for _ in 0..60 {
            let live = all_ids(repo).await;
            if live.is_empty() {
                let id = repo.next_identity().await.unwrap();
                repo.save(category(id, id, "Root")).await.unwrap();
                continue;
            }

            match next(10) {
                0 => {
                    let id = repo.next_identity().await.unwrap();
                    repo.save(category(id, id, "Root")).await.unwrap();
                }
                1..=5 => {
                    let parent = live[next(live.len())];
                    let id = repo.next_identity().await.unwrap();
                    repo.save(category(id, parent, "Node")).await.unwrap();
                }
                6..=8 => {
                    let node = repo.get(live[next(live.len())]).await.unwrap();
                    if node.is_root() {
                        continue;
                    }
                    let target = live[next(live.len())];
                    let before: BTreeSet<_> =
                        ids(&repo.descendants(node.id).await.unwrap()).into_iter().collect();
                    match repo.save(category(node.id, target, "Node")).await {
                        Ok(_) => {
                            let after: BTreeSet<_> =
                                ids(&repo.descendants(node.id).await.unwrap()).into_iter().collect();
                            assert_eq!(before, after, "{}", backend.label);
                        }
                        Err(CategoryServiceError::InvalidParent { .. }) => {
                            assert!(target == node.id || before.contains(&target));
                        }
                        Err(e) => panic!("[{}] unexpected error: {e}", backend.label),
                    }
                }
                _ => {
                    let id = live[next(live.len())];
                    assert!(repo.remove(id).await.unwrap().existed);
                }
            }

            verify_all(repo, backend.label).await;
        }
    }
}

#[tokio::test]
async fn test_concurrent_saves_on_one_tree() {
    for backend in backends().await {
        let repo = backend.repository.clone();
        repo.save(category(1, 1, "Root")).await.unwrap();
        repo.save(category(2, 1, "Left")).await.unwrap();
        repo.save(category(3, 1, "Right")).await.unwrap();

        let mut tasks = Vec::new();
        for worker in 0..4i64 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..6i64 {
                    let id = 100 + worker * 10 + i;
                    let parent = if i % 2 == 0 { 2 } else { 3 };
                    repo.save(category(id, parent, "Leaf")).await?;
                    // Bounce the leaf to the other branch
                    let other = if parent == 2 { 3 } else { 2 };
                    repo.save(category(id, other, "Leaf")).await?;
                }
                Ok::<_, CategoryServiceError>(())
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(repo.descendants(1).await.unwrap().len(), 26, "{}", backend.label);
        assert_eq!(repo.children(2).await.unwrap().len(), 12);
        assert_eq!(repo.children(3).await.unwrap().len(), 12);
        assert_ok!(repo.verify(1).await);
    }
}
