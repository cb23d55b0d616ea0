// tests/materialize/materialize_test.rs
#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use graphlift::graph::{GraphStore, MemoryGraph, PropertyMap};
    use graphlift::materialize::{ClassState, MaterializeOptions, Materializer};
    use graphlift::ontology::Ontology;
    use graphlift::report::FailureKind;
    use tempfile::TempDir;

    const PRODUCTS_CSV: &str = "id,sku,name\n1,SKU-1,Hammer\n2,SKU-2,Saw\n3,SKU-3,Rake\n";

    const PRODUCT_ONTOLOGY: &str = r#"{
        "nodes": [
            {
                "class": "Product",
                "table": "products",
                "csv_file": "products.csv",
                "properties": [
                    {"column": "id", "property": "nodeId", "type": "integer"},
                    {"column": "sku", "property": "sku", "type": "string", "is_key": true},
                    {"column": "name", "property": "name", "type": "string"}
                ]
            }
        ],
        "edges": [
            {
                "relationship": "HAS_PARENT",
                "from_node": "Product",
                "to_node": "Product",
                "csv_file": "parents.csv",
                "type": "implicit"
            }
        ]
    }"#;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    fn ontology(dir: &Path, json: &str) -> Ontology {
        Ontology::parse(json).unwrap().with_base_dir(dir)
    }

    fn product_fixture(parents: &str) -> (TempDir, Ontology) {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "products.csv", PRODUCTS_CSV);
        write(dir.path(), "parents.csv", parents);
        let ontology = ontology(dir.path(), PRODUCT_ONTOLOGY);
        (dir, ontology)
    }

    #[tokio::test]
    async fn test_edges_resolve_through_secondary_key() {
        // The key is sku but the relationship file carries ids.
        let (_dir, ontology) = product_fixture("products.id,products.id\n2,1\n3,1\n,1\n");
        let store = MemoryGraph::new();

        let report = Materializer::new(&store, &ontology).run().await.unwrap();

        let edges = report.edge_type("HAS_PARENT").unwrap();
        assert_eq!(edges.rows, 3);
        assert_eq!(edges.primary, 0);
        assert_eq!(edges.secondary, 2);
        assert_eq!(edges.skipped_empty, 1);
        assert_eq!(edges.unresolved, 0);
        assert_eq!(store.edge_count().await.unwrap(), 2);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_edges_resolve_through_primary_key() {
        let (_dir, ontology) = product_fixture("a,b\nSKU-2,SKU-1\nSKU-3,SKU-1\n");
        let store = MemoryGraph::new();

        let report = Materializer::new(&store, &ontology).run().await.unwrap();

        let edges = report.edge_type("HAS_PARENT").unwrap();
        assert_eq!(edges.primary, 2);
        assert_eq!(edges.secondary, 0);
        assert_eq!(report.summary.relationship_types, vec![("HAS_PARENT".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_disabled_secondary_key_leaves_rows_unresolved() {
        let (_dir, ontology) = product_fixture("products.id,products.id\n2,1\n3,1\n");
        let store = MemoryGraph::new();
        let options = MaterializeOptions {
            secondary_key: None,
            ..MaterializeOptions::default()
        };

        let report = Materializer::with_options(&store, &ontology, options)
            .run()
            .await
            .unwrap();

        assert_eq!(report.edges_resolved(), 0);
        assert_eq!(report.edges_unresolved(), 2);
        assert_eq!(store.edge_count().await.unwrap(), 0);
        assert!(report
            .failures
            .iter()
            .any(|f| f.item == "edge HAS_PARENT" && f.kind == FailureKind::MatchFailure));
    }

    #[tokio::test]
    async fn test_unresolved_rows_are_counted() {
        let (_dir, ontology) = product_fixture("products.id,products.id\n2,1\n9,1\n");
        let store = MemoryGraph::new();

        let report = Materializer::new(&store, &ontology).run().await.unwrap();

        let edges = report.edge_type("HAS_PARENT").unwrap();
        assert_eq!(edges.resolved(), 1);
        assert_eq!(edges.unresolved, 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_reload_with_constraint_merges() {
        let (_dir, ontology) = product_fixture("products.id,products.id\n2,1\n");
        let store = MemoryGraph::new();

        let first = Materializer::new(&store, &ontology).run().await.unwrap();
        assert_eq!(first.nodes_created(), 3);
        assert_eq!(first.nodes_merged(), 0);

        let second = Materializer::new(&store, &ontology).run().await.unwrap();
        assert_eq!(second.nodes_created(), 0);
        assert_eq!(second.nodes_merged(), 3);
        assert_eq!(store.node_count().await.unwrap(), 3);
        assert_eq!(store.edge_count().await.unwrap(), 1);
        assert_eq!(first.summary, second.summary);

        let constraints = store.constraints();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].name, "constraint_Product_sku");
    }

    #[tokio::test]
    async fn test_reload_without_key_duplicates() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "products.csv", PRODUCTS_CSV);
        let ontology = ontology(
            dir.path(),
            r#"{"nodes": [{"class": "Product", "table": "products", "csv_file": "products.csv",
                "properties": [{"column": "sku", "property": "sku"}]}]}"#,
        );
        let store = MemoryGraph::new();

        let first = Materializer::new(&store, &ontology).run().await.unwrap();
        assert_eq!(first.node_class("Product").unwrap().state, ClassState::Loaded);
        Materializer::new(&store, &ontology).run().await.unwrap();

        assert_eq!(store.node_count().await.unwrap(), 6);
        assert!(store.constraints().is_empty());
    }

    #[tokio::test]
    async fn test_empty_values_are_omitted() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "products.csv",
            "id,sku,name\n1,SKU-1,Hammer\n4,SKU-4,\n,,\n",
        );
        write(dir.path(), "parents.csv", "a,b\n");
        let ontology = ontology(dir.path(), PRODUCT_ONTOLOGY);
        let store = MemoryGraph::new();

        let report = Materializer::new(&store, &ontology).run().await.unwrap();

        let products = report.node_class("Product").unwrap();
        assert_eq!(products.created, 2);
        assert_eq!(products.skipped, 1);

        let nodes = store.nodes_with_label("Product");
        let nameless: Vec<&PropertyMap> = nodes
            .iter()
            .filter(|p| p.get("sku").map(String::as_str) == Some("SKU-4"))
            .collect();
        assert_eq!(nameless.len(), 1);
        assert!(!nameless[0].contains_key("name"));
        assert_eq!(nameless[0].get("nodeId").map(String::as_str), Some("4"));
    }

    #[tokio::test]
    async fn test_rows_without_key_are_skipped_on_every_run() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "products.csv", "id,sku,name\n1,SKU-1,Hammer\n2,,Saw\n");
        write(dir.path(), "parents.csv", "a,b\n");
        let ontology = ontology(dir.path(), PRODUCT_ONTOLOGY);
        let store = MemoryGraph::new();

        for _ in 0..2 {
            let report = Materializer::new(&store, &ontology).run().await.unwrap();
            let products = report.node_class("Product").unwrap();
            assert_eq!(products.skipped, 1);
            assert_eq!(products.created + products.merged, 1);
            assert_eq!(store.node_count().await.unwrap(), 1);
        }
        let nodes = store.nodes_with_label("Product");
        assert_eq!(nodes[0].get("sku").map(String::as_str), Some("SKU-1"));
    }

    #[tokio::test]
    async fn test_missing_key_column_leaves_class_unloaded() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "products.csv", "id,name\n1,Hammer\n2,Saw\n");
        write(dir.path(), "parents.csv", "a,b\n2,1\n");
        let ontology = ontology(dir.path(), PRODUCT_ONTOLOGY);
        let store = MemoryGraph::new();

        for _ in 0..2 {
            let report = Materializer::new(&store, &ontology).run().await.unwrap();

            let products = report.node_class("Product").unwrap();
            assert_eq!(products.state, ClassState::Constrained);
            assert_eq!(products.created, 0);
            let failure = report
                .failures
                .iter()
                .find(|f| f.item == "node class Product")
                .unwrap();
            assert_eq!(failure.kind, FailureKind::MissingResource);
            assert!(failure.message.contains("sku"), "{}", failure.message);
            assert!(report
                .failures
                .iter()
                .any(|f| f.item == "edge HAS_PARENT" && f.kind == FailureKind::MissingResource));
        }
        assert_eq!(store.node_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_property_column_is_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "products.csv", "id,sku\n1,SKU-1\n2,SKU-2\n");
        write(dir.path(), "parents.csv", "a,b\nSKU-2,SKU-1\n");
        let ontology = ontology(dir.path(), PRODUCT_ONTOLOGY);
        let store = MemoryGraph::new();

        let report = Materializer::new(&store, &ontology).run().await.unwrap();

        let products = report.node_class("Product").unwrap();
        assert_eq!(products.state, ClassState::Loaded);
        assert_eq!(products.created, 2);
        let failure = report
            .failures
            .iter()
            .find(|f| f.item == "node class Product")
            .unwrap();
        assert_eq!(failure.kind, FailureKind::MissingResource);
        assert!(failure.message.contains("name"), "{}", failure.message);
        assert_eq!(report.edges_resolved(), 1);
    }

    #[tokio::test]
    async fn test_malformed_rows_are_counted_apart() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("products.csv"),
            b"id,sku,name\n1,SKU-1,Hammer\n2,SKU-2,Saw\n3,SKU-3,\xff\n",
        )
        .unwrap();
        fs::write(dir.path().join("parents.csv"), b"a,b\nSKU-2,SKU-1\nSKU-3,\xff\n").unwrap();
        let ontology = ontology(dir.path(), PRODUCT_ONTOLOGY);
        let store = MemoryGraph::new();

        let report = Materializer::new(&store, &ontology).run().await.unwrap();

        let products = report.node_class("Product").unwrap();
        assert_eq!(products.created, 2);
        assert_eq!(products.malformed, 1);
        assert_eq!(products.skipped, 0);

        let edges = report.edge_type("HAS_PARENT").unwrap();
        assert_eq!(edges.rows, 2);
        assert_eq!(edges.primary, 1);
        assert_eq!(edges.malformed, 1);
        assert_eq!(edges.skipped_empty, 0);
        assert_eq!(edges.unresolved, 0);

        for item in ["node class Product", "edge HAS_PARENT"] {
            assert!(report
                .failures
                .iter()
                .any(|f| f.item == item && f.kind == FailureKind::MalformedRow));
        }
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_missing_files_are_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "products.csv", PRODUCTS_CSV);
        let ontology = ontology(
            dir.path(),
            r#"{
                "nodes": [
                    {"class": "Product", "table": "products", "csv_file": "products.csv",
                     "properties": [{"column": "sku", "property": "sku", "is_key": true}]},
                    {"class": "Supplier", "table": "suppliers", "csv_file": "suppliers.csv",
                     "properties": [{"column": "id", "property": "nodeId", "is_key": true}]}
                ],
                "edges": [
                    {"relationship": "SUPPLIES", "from_node": "Supplier", "to_node": "Product",
                     "csv_file": "supplies.csv"},
                    {"relationship": "RELATED", "from_node": "Product", "to_node": "Product",
                     "csv_file": "related.csv"}
                ]
            }"#,
        );
        let store = MemoryGraph::new();

        let report = Materializer::new(&store, &ontology).run().await.unwrap();

        assert_eq!(report.node_class("Product").unwrap().created, 3);
        assert_eq!(
            report.node_class("Supplier").unwrap().state,
            ClassState::Constrained
        );

        let failure = |item: &str| {
            report
                .failures
                .iter()
                .find(|f| f.item == item)
                .unwrap_or_else(|| panic!("no failure for {item}"))
        };
        assert_eq!(failure("node class Supplier").kind, FailureKind::MissingResource);
        assert_eq!(failure("edge SUPPLIES").kind, FailureKind::MissingResource);
        assert_eq!(failure("edge RELATED").kind, FailureKind::MissingResource);
        assert_eq!(report.edge_type("SUPPLIES").unwrap().rows, 0);
        assert_eq!(store.edge_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_constraint_skips_class() {
        let (_dir, ontology) = product_fixture("a,b\n");
        let store = MemoryGraph::new();
        for _ in 0..2 {
            let mut props = PropertyMap::new();
            props.insert("sku".to_string(), "SKU-1".to_string());
            store.write_node("Product", props).await.unwrap();
        }

        let report = Materializer::new(&store, &ontology).run().await.unwrap();

        let products = report.node_class("Product").unwrap();
        assert_eq!(products.state, ClassState::Uninitialized);
        assert_eq!(products.created, 0);
        assert!(report
            .failures
            .iter()
            .any(|f| f.item == "constraint constraint_Product_sku" && f.kind == FailureKind::Store));
        assert_eq!(store.node_count().await.unwrap(), 2);
        assert_eq!(report.edge_type("HAS_PARENT").unwrap().rows, 0);
    }

    #[tokio::test]
    async fn test_clear_before_load() {
        let (_dir, ontology) = product_fixture("products.id,products.id\n2,1\n");
        let store = MemoryGraph::new();
        let mut stray = PropertyMap::new();
        stray.insert("name".to_string(), "left over".to_string());
        store.write_node("Stray", stray).await.unwrap();

        let options = MaterializeOptions {
            clear_before_load: true,
            ..MaterializeOptions::default()
        };
        let report = Materializer::with_options(&store, &ontology, options)
            .run()
            .await
            .unwrap();

        assert_eq!(report.summary.nodes, 3);
        assert_eq!(report.summary.labels, vec![("Product".to_string(), 3)]);
    }

    #[tokio::test]
    async fn test_snapshot_reload_is_idempotent() {
        let (dir, ontology) = product_fixture("products.id,products.id\n2,1\n3,1\n");
        let snapshot = dir.path().join("graph.json");

        let store = MemoryGraph::open(&snapshot).unwrap();
        let first = Materializer::new(&store, &ontology).run().await.unwrap();
        store.save_snapshot(&snapshot).unwrap();

        let reopened = MemoryGraph::open(&snapshot).unwrap();
        let second = Materializer::new(&reopened, &ontology).run().await.unwrap();

        assert_eq!(first.summary, second.summary);
        assert_eq!(second.nodes_created(), 0);
        assert_eq!(reopened.edge_count().await.unwrap(), 2);
    }
}
