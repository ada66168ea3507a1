//! Tests for the workspace indexer.

#[cfg(test)]
mod tests {
    use crate::store::{MemoryStore, ObjectStore};
    use crate::workspace::index::{self, CODE_INDEX_KEY};
    use crate::workspace::{DefinitionKind, Indexer, Workspace};
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        crate::config::DEFAULT_TEXT_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn setup() -> (TempDir, Workspace, Arc<MemoryStore>, Indexer) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("src")).unwrap();
        fs::create_dir_all(temp_dir.path().join("node_modules/pkg")).unwrap();

        let mut f = File::create(temp_dir.path().join("src/app.js")).unwrap();
        writeln!(f, "function start() {{}}").unwrap();
        writeln!(f, "// TODO: wire config").unwrap();
        fs::write(temp_dir.path().join("src/util.py"), "def helper():\n    pass\n").unwrap();
        fs::write(temp_dir.path().join("node_modules/pkg/index.js"), "function x() {}").unwrap();
        fs::write(temp_dir.path().join("logo.png"), [0u8, 159, 146, 150]).unwrap();

        let workspace = Workspace::new(
            temp_dir.path().to_path_buf(),
            vec!["node_modules".into(), ".git".into()],
        );
        let store = Arc::new(MemoryStore::new());
        let indexer = Indexer::new(store.clone(), extensions());
        (temp_dir, workspace, store, indexer)
    }

    #[tokio::test]
    async fn test_first_pass_indexes_text_files() {
        let (_dir, workspace, store, indexer) = setup();
        let stats = indexer.build_or_update(&workspace).await.unwrap();

        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.deleted, 0);

        let snapshot = indexer.snapshot();
        assert!(snapshot.contains("src/app.js"));
        assert!(snapshot.contains("src/util.py"));
        assert!(!snapshot.contains("node_modules/pkg/index.js"));

        let record = snapshot.get("src/app.js").unwrap();
        assert!(record
            .definitions
            .iter()
            .any(|d| d.kind == DefinitionKind::Function && d.label() == "start"));
        assert!(store.get(CODE_INDEX_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_pass_is_idempotent() {
        let (_dir, workspace, _store, indexer) = setup();
        let first = indexer.build_or_update(&workspace).await.unwrap();
        let before = indexer.snapshot();

        let second = indexer.build_or_update(&workspace).await.unwrap();
        let after = indexer.snapshot();

        assert_eq!(second.indexed, 0);
        assert_eq!(second.skipped, first.indexed);
        assert_eq!(second.deleted, 0);
        assert_eq!(*before, *after);
    }

    #[tokio::test]
    async fn test_deleted_file_is_reaped() {
        let (dir, workspace, _store, indexer) = setup();
        indexer.build_or_update(&workspace).await.unwrap();

        fs::remove_file(dir.path().join("src/util.py")).unwrap();
        let stats = indexer.build_or_update(&workspace).await.unwrap();

        assert_eq!(stats.deleted, 1);
        assert!(!indexer.snapshot().contains("src/util.py"));
    }

    #[tokio::test]
    async fn test_reindex_paths_file_and_missing() {
        let (dir, workspace, _store, indexer) = setup();
        indexer.build_or_update(&workspace).await.unwrap();

        fs::write(dir.path().join("src/new.rs"), "pub fn fresh() {}\n").unwrap();
        fs::remove_file(dir.path().join("src/app.js")).unwrap();

        let stats = indexer
            .reindex_paths(&workspace, &["src/new.rs".into(), "src/app.js".into()])
            .await
            .unwrap();

        assert_eq!(stats.indexed, 1);
        assert_eq!(stats.deleted, 1);
        let snapshot = indexer.snapshot();
        assert!(snapshot.contains("src/new.rs"));
        assert!(!snapshot.contains("src/app.js"));
    }

    #[tokio::test]
    async fn test_reindex_directory() {
        let (dir, workspace, _store, indexer) = setup();
        indexer.build_or_update(&workspace).await.unwrap();

        fs::write(dir.path().join("src/extra.ts"), "export class Extra {}\n").unwrap();
        let stats = indexer
            .reindex_paths(&workspace, &["src".into()])
            .await
            .unwrap();

        assert_eq!(stats.indexed, 3);
        assert!(indexer.snapshot().contains("src/extra.ts"));
    }

    #[tokio::test]
    async fn test_query_union_prefers_definitions() {
        let (_dir, workspace, _store, indexer) = setup();
        indexer.build_or_update(&workspace).await.unwrap();

        let hits = indexer.query("START");
        assert_eq!(hits[0].kind, "function");
        assert_eq!(hits[0].name, "start");
        // The definition line is not repeated as a content match.
        assert_eq!(
            hits.iter()
                .filter(|h| h.file == "src/app.js" && h.line == 1)
                .count(),
            1
        );

        let todo_hits = indexer.query("wire");
        assert_eq!(todo_hits.len(), 1);
        assert_eq!(todo_hits[0].kind, "todo");

        let miss = indexer.query("zzz-not-there");
        assert_eq!(miss.len(), 1);
        assert_eq!(miss[0].kind, "info");
    }

    #[tokio::test]
    async fn test_load_restores_persisted_index() {
        let (_dir, workspace, store, indexer) = setup();
        indexer.build_or_update(&workspace).await.unwrap();

        let restored = Indexer::new(store.clone(), extensions());
        restored.load().unwrap();
        assert_eq!(*restored.snapshot(), *indexer.snapshot());
        assert_eq!(restored.last_timestamp(), indexer.last_timestamp());

        let (loaded, _) = index::load(store.as_ref()).unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
