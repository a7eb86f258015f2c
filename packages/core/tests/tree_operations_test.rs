//! Tree Operations Integration Tests
//!
//! Runs the engine against the libsql-backed `TursoStore` on a temporary
//! database file, so cascading deletes, atomic batches and ordering come from
//! real SQL.

#[cfg(test)]
mod tree_operations_tests {
    use anyhow::Result;
    use menutree_core::db::{DatabaseService, MenuEvent, MenuStore, TursoStore};
    use menutree_core::models::{forest_node_count, MenuNodeUpdate, NewMenuNode};
    use menutree_core::services::{ErrorKind, MenuService};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::time::{timeout, Duration};
    use tokio_test::{assert_err, assert_ok};

    /// Helper to create a service over a fresh database file
    async fn create_test_service() -> Result<(MenuService, Arc<TursoStore>, TempDir)> {
        // RUST_LOG=debug cargo test shows engine logs
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        let db = Arc::new(DatabaseService::new(db_path).await?);
        let store = Arc::new(TursoStore::new(db));
        let service = MenuService::new(store.clone());
        Ok((service, store, temp_dir))
    }

    async fn assert_all_groups_dense(store: &TursoStore) -> Result<()> {
        let mut groups: HashMap<Option<i64>, Vec<i64>> = HashMap::new();
        for node in store.find_all().await? {
            groups.entry(node.parent_id).or_default().push(node.order);
        }
        for (parent, mut orders) in groups {
            orders.sort_unstable();
            let expected: Vec<i64> = (0..orders.len() as i64).collect();
            assert_eq!(orders, expected, "group {:?} is not dense", parent);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_abc_example_on_libsql() -> Result<()> {
        let (service, store, _temp_dir) = create_test_service().await?;

        let a = service.create_node(NewMenuNode::new("A")).await?;
        let b = service
            .create_node(NewMenuNode::new("B").with_parent(a.id))
            .await?;
        let c = service
            .create_node(NewMenuNode::new("C").with_parent(a.id))
            .await?;
        assert_eq!((a.id, b.id, c.id), (1, 2, 3));

        let err = assert_err!(service.move_node(1, Some(2)).await);
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(err.to_string().contains("cycle"));

        assert_ok!(service.move_node(3, None).await);
        let forest = service.list_tree().await?;
        assert_eq!(forest.len(), 2);
        assert_eq!((forest[0].node.id, forest[0].node.order), (1, 0));
        assert_eq!((forest[1].node.id, forest[1].node.order), (3, 1));
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!((forest[0].children[0].node.id, forest[0].children[0].node.order), (2, 0));

        assert_all_groups_dense(&store).await
    }

    #[tokio::test]
    async fn test_delete_cascades_through_foreign_keys() -> Result<()> {
        let (service, store, _temp_dir) = create_test_service().await?;

        let root = service.create_node(NewMenuNode::new("Products")).await?;
        let keep = service
            .create_node(NewMenuNode::new("Pricing").with_parent(root.id))
            .await?;
        let doomed = service
            .create_node(NewMenuNode::new("Legacy").with_parent(root.id))
            .await?;
        let tail = service
            .create_node(NewMenuNode::new("Docs").with_parent(root.id))
            .await?;
        let mut parent = doomed.id;
        for depth in 0..5 {
            let child = service
                .create_node(NewMenuNode::new(format!("Level {}", depth)).with_parent(parent))
                .await?;
            parent = child.id;
        }

        let result = service.delete_node(doomed.id).await?;
        assert_eq!(result.deleted_count(), 6);
        assert_eq!(result.deleted_ids[0], doomed.id);

        let forest = service.list_tree().await?;
        assert_eq!(forest_node_count(&forest), 3);
        assert_eq!(store.find_by_id(keep.id).await?.map(|n| n.order), Some(0));
        assert_eq!(store.find_by_id(tail.id).await?.map(|n| n.order), Some(1));

        assert_eq!(
            service.delete_node(doomed.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_all_groups_dense(&store).await
    }

    #[tokio::test]
    async fn test_mixed_operations_keep_every_group_dense() -> Result<()> {
        let (service, store, _temp_dir) = create_test_service().await?;

        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(service.create_node(NewMenuNode::new(format!("Root {}", i))).await?.id);
        }
        for (i, parent) in ids.clone().into_iter().enumerate() {
            for j in 0..3 {
                let child = service
                    .create_node(NewMenuNode::new(format!("Child {}.{}", i, j)).with_parent(parent))
                    .await?;
                ids.push(child.id);
            }
        }

        service.move_node(ids[5], Some(ids[1])).await?;
        assert_all_groups_dense(&store).await?;

        service.reorder_node(ids[2], 0).await?;
        assert_all_groups_dense(&store).await?;

        service
            .update_node(
                ids[6],
                MenuNodeUpdate {
                    parent_id: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        assert_all_groups_dense(&store).await?;

        service.delete_node(ids[0]).await?;
        assert_all_groups_dense(&store).await?;

        service.reorder_node(ids[3], 99).await?;
        assert_all_groups_dense(&store).await?;

        let forest = service.list_tree().await?;
        assert_eq!(forest_node_count(&forest), store.find_all().await?.len());
        Ok(())
    }

    #[tokio::test]
    async fn test_state_survives_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("menus.db");

        {
            let db = Arc::new(DatabaseService::new(db_path.clone()).await?);
            let service = MenuService::new(Arc::new(TursoStore::new(db)));
            let home = service
                .create_node(NewMenuNode::new("Home").with_url("/"))
                .await?;
            service
                .create_node(NewMenuNode::new("About").with_parent(home.id))
                .await?;
        }

        let db = Arc::new(DatabaseService::new(db_path).await?);
        let service = MenuService::new(Arc::new(TursoStore::new(db)));
        let forest = service.list_tree().await?;
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].node.url.as_deref(), Some("/"));
        assert_eq!(forest[0].children[0].node.title, "About");
        Ok(())
    }

    #[tokio::test]
    async fn test_move_emits_event_after_commit() -> Result<()> {
        let (service, store, _temp_dir) = create_test_service().await?;
        let a = service.create_node(NewMenuNode::new("A")).await?;
        let b = service.create_node(NewMenuNode::new("B")).await?;

        let mut rx = service.subscribe_to_events();
        service.move_node(b.id, Some(a.id)).await?;

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Event should be emitted within 1 second")
            .expect("Should receive event");

        match event {
            MenuEvent::NodeMoved {
                id,
                old_parent_id,
                new_parent_id,
            } => {
                assert_eq!(id, b.id);
                assert_eq!(old_parent_id, None);
                assert_eq!(new_parent_id, Some(a.id));
                // Write is visible by the time the event arrives
                let stored = store.find_by_id(b.id).await?.expect("moved node");
                assert_eq!(stored.parent_id, Some(a.id));
            }
            other => panic!("Expected NodeMoved, got {:?}", other),
        }
        Ok(())
    }
}
