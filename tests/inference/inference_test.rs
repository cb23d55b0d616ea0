// tests/inference/inference_test.rs
#[path = "../common/mod.rs"]
mod common;

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;

    use graphlift::export::CsvExporter;
    use graphlift::inference::{InferenceConfig, InferenceEngine, RelationshipKey};
    use graphlift::metadata::{CatalogProvider, ForeignKeyInfo, SqliteCatalog, TableMetadata};
    use tempfile::TempDir;

    use super::common::{create_db, shop_db};

    async fn catalog_tables(catalog: &SqliteCatalog) -> (Vec<TableMetadata>, Vec<ForeignKeyInfo>) {
        let mut tables = Vec::new();
        for name in catalog.list_tables().await.unwrap() {
            tables.push(catalog.get_table(&name).await.unwrap());
        }
        (tables, catalog.get_foreign_keys().await.unwrap())
    }

    const CUSTOMER_EMAILS: &str = "
        CREATE TABLE customers (email TEXT PRIMARY KEY, city TEXT);
        CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_email TEXT);
        WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 200)
            INSERT INTO customers (email, city) SELECT 'user' || i || '@example.com', 'Leeds' FROM n;
        WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 150)
            INSERT INTO orders (customer_email) SELECT 'user' || ((i % 50) + 1) || '@example.com' FROM n;
    ";

    const TWO_SIDES: &str = "
        CREATE TABLE left_side (id INTEGER PRIMARY KEY, ref_id INTEGER);
        CREATE TABLE right_side (id INTEGER PRIMARY KEY, ref_id INTEGER);
        INSERT INTO left_side VALUES (100, 1), (101, 2), (102, 3);
        WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 10)
            INSERT INTO right_side (id, ref_id) SELECT 199 + i, i FROM n;
    ";

    const AUDIT_COLUMNS: &str = "
        CREATE TABLE invoices (id INTEGER PRIMARY KEY, created_at TEXT);
        CREATE TABLE receipts (id INTEGER PRIMARY KEY, created_at TEXT);
        INSERT INTO invoices VALUES (1, '2024-01-01'), (2, '2024-01-02'), (3, '2024-01-03');
        INSERT INTO receipts VALUES (10, '2024-01-01'), (11, '2024-01-02'), (12, '2024-01-03');
    ";

    #[tokio::test]
    async fn test_email_reference_found_when_not_excluded() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(create_db(dir.path(), "crm.db", CUSTOMER_EMAILS))
            .await
            .unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;

        let mut config = InferenceConfig::default();
        config.excluded_patterns.retain(|p| p != "email");
        let outcome = InferenceEngine::new(config)
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap();

        assert_eq!(outcome.relationships.len(), 1);
        let rel = &outcome.relationships[0];
        assert_eq!(rel.from_table, "orders");
        assert_eq!(rel.from_column, "customer_email");
        assert_eq!(rel.to_table, "customers");
        assert_eq!(rel.to_column, "email");
        assert_eq!(rel.overlap_percentage, 100.0);
        assert_eq!(rel.match_count, 50);
        assert_eq!(rel.likely_direction, "orders.customer_email -> customers.email");
        assert_eq!(rel.kind, "implicit");
    }

    #[tokio::test]
    async fn test_email_columns_excluded_by_default() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(create_db(dir.path(), "crm.db", CUSTOMER_EMAILS))
            .await
            .unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;

        let engine = InferenceEngine::default();
        assert!(engine.candidates(&tables, &fks).is_empty());
        let outcome = engine.infer(&catalog, &tables, &fks).await.unwrap();
        assert!(outcome.relationships.is_empty());
    }

    #[tokio::test]
    async fn test_shop_finds_only_the_undeclared_reference() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;

        let outcome = InferenceEngine::default()
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap();

        let found: Vec<String> = outcome
            .relationships
            .iter()
            .map(|r| r.likely_direction.clone())
            .collect();
        assert_eq!(found, vec!["order_items.product_sku -> products.sku"]);
        assert_eq!(outcome.relationships[0].match_count, 4);
        assert_eq!(outcome.stats.accepted, 1);
        assert_eq!(
            outcome.stats.rejected + outcome.stats.accepted,
            outcome.stats.candidates
        );
    }

    #[tokio::test]
    async fn test_declared_foreign_keys_never_proposed() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;

        let engine = InferenceEngine::default();
        let declared: HashSet<RelationshipKey> = fks
            .iter()
            .flat_map(|fk| {
                let key = RelationshipKey::new(
                    &fk.from_table,
                    &fk.from_column,
                    &fk.to_table,
                    &fk.to_column,
                );
                [key.reversed(), key]
            })
            .collect();

        for candidate in engine.candidates(&tables, &fks) {
            let key = RelationshipKey::from(&candidate.pair);
            assert!(!declared.contains(&key), "{key:?} is declared");
            assert_ne!(
                (candidate.pair.from_table.as_str(), candidate.pair.from_column.as_str()),
                ("products", "category_id")
            );
        }

        let outcome = engine.infer(&catalog, &tables, &fks).await.unwrap();
        for rel in &outcome.relationships {
            assert!(!declared.contains(&rel.key()));
        }
    }

    #[tokio::test]
    async fn test_audit_columns_never_proposed() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(create_db(dir.path(), "books.db", AUDIT_COLUMNS))
            .await
            .unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;

        let outcome = InferenceEngine::default()
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap();
        assert!(outcome.relationships.is_empty());
        assert_eq!(outcome.stats.candidates, 0);

        // The same data is accepted once the denylist is lifted.
        let config = InferenceConfig {
            excluded_columns: Default::default(),
            ..InferenceConfig::default()
        };
        let outcome = InferenceEngine::new(config)
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap();
        assert_eq!(outcome.relationships.len(), 2);
        assert!(outcome
            .relationships
            .iter()
            .all(|r| r.from_column == "created_at" && r.to_column == "created_at"));
    }

    #[tokio::test]
    async fn test_acceptance_is_directional() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(create_db(dir.path(), "sides.db", TWO_SIDES))
            .await
            .unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;

        let outcome = InferenceEngine::default()
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap();

        assert_eq!(outcome.relationships.len(), 1);
        let rel = &outcome.relationships[0];
        assert_eq!(rel.likely_direction, "left_side.ref_id -> right_side.ref_id");
        assert_eq!(rel.match_count, 3);

        let keys: HashSet<RelationshipKey> =
            outcome.relationships.iter().map(|r| r.key()).collect();
        assert!(!keys.contains(&rel.key().reversed()));
    }

    #[tokio::test]
    async fn test_thresholds_are_configurable() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(create_db(dir.path(), "sides.db", TWO_SIDES))
            .await
            .unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;

        let strict = InferenceConfig {
            min_match_count: 4,
            ..InferenceConfig::default()
        };
        let outcome = InferenceEngine::new(strict)
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap();
        assert!(outcome.relationships.is_empty());

        let loose = InferenceConfig {
            overlap_threshold: 0.25,
            ..InferenceConfig::default()
        };
        let outcome = InferenceEngine::new(loose)
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap();
        let found: HashSet<String> = outcome
            .relationships
            .iter()
            .map(|r| r.likely_direction.clone())
            .collect();
        assert!(found.contains("left_side.ref_id -> right_side.ref_id"));
        assert!(found.contains("right_side.ref_id -> left_side.ref_id"));
    }

    #[tokio::test]
    async fn test_sample_cap_bounds_value_fetches() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(create_db(dir.path(), "sides.db", TWO_SIDES))
            .await
            .unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;

        let capped = InferenceConfig {
            sample_cap: 1,
            ..InferenceConfig::default()
        };
        let outcome = InferenceEngine::new(capped)
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap();
        assert!(outcome.relationships.is_empty());
    }

    #[tokio::test]
    async fn test_export_writes_implicit_correspondence_file() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();
        let (tables, fks) = catalog_tables(&catalog).await;
        let exporter = CsvExporter::new(dir.path().join("out")).unwrap();

        let engine = InferenceEngine::default();
        let mut relationships = engine
            .infer(&catalog, &tables, &fks)
            .await
            .unwrap()
            .relationships;
        let failures = engine
            .export(&catalog, &exporter, &mut relationships)
            .await
            .unwrap();

        assert!(failures.is_empty());
        let file = relationships[0].csv_file.as_deref().unwrap();
        assert_eq!(file, "implicit_order_items_product_sku_to_products_sku.csv");
        let text = fs::read_to_string(exporter.resolve(file)).unwrap();
        assert_eq!(
            text,
            "order_items.product_sku,products.sku\n\
             SKU-1,SKU-1\nSKU-2,SKU-2\nSKU-3,SKU-3\nSKU-5,SKU-5\n"
        );
    }
}
