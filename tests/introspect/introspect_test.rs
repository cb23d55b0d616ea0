// tests/introspect/introspect_test.rs
#[path = "../common/mod.rs"]
mod common;

#[cfg(test)]
mod tests {
    use std::fs;

    use graphlift::export::CsvExporter;
    use graphlift::introspect::{IntrospectOptions, SchemaExtract, SchemaIntrospector};
    use graphlift::metadata::{CatalogError, CatalogProvider, SqliteCatalog};
    use graphlift::report::FailureKind;
    use tempfile::TempDir;

    use super::common::{create_db, csv_rows, shop_db, FailingCatalog};

    #[tokio::test]
    async fn test_introspect_exports_every_table() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();
        let out = dir.path().join("out");
        let exporter = CsvExporter::new(&out).unwrap();

        let result = SchemaIntrospector::new(&catalog, &exporter).run().await.unwrap();

        assert!(result.report.is_clean());
        assert_eq!(result.report.tables_exported, 5);
        let names: Vec<&str> = result.extract.tables.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            vec!["categories", "customers", "order_items", "orders", "products"]
        );

        let products = &result.extract.tables["products"];
        assert_eq!(products.csv_file, "products.csv");
        assert_eq!(products.row_count, 6);
        assert_eq!(csv_rows(&out.join("products.csv")), 6);
        assert_eq!(products.sample_rows.len(), 2);
        assert!(products.csv_digest.is_some());

        let orders = &result.extract.tables["orders"];
        assert_eq!(csv_rows(&out.join(&orders.csv_file)), 4);
    }

    #[tokio::test]
    async fn test_values_are_normalized_in_flat_files() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();

        SchemaIntrospector::new(&catalog, &exporter).run().await.unwrap();

        let text = fs::read_to_string(dir.path().join("products.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "id,sku,name,category_id,parent_sku,unit_price,created_at"
        );
        assert_eq!(lines[1], "1,SKU-1,Hammer,1,,9.5,2024-01-01T10:00:00");
        assert_eq!(lines[4], "4,SKU-4,Hose,2,,30.0,2024-01-04T10:00:00");
        assert_eq!(lines[6], "6,SKU-6,Pot,3,,,");
    }

    #[tokio::test]
    async fn test_composite_primary_key_and_column_metadata() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();

        let result = SchemaIntrospector::new(&catalog, &exporter).run().await.unwrap();
        let tables = result.extract.table_metadata();

        let items = tables.iter().find(|t| t.name == "order_items").unwrap();
        let pk = items.primary_key.as_ref().unwrap();
        assert_eq!(pk.columns, vec!["order_id", "product_sku"]);
        assert!(pk.is_composite());
        assert!(items.column("order_id").unwrap().pk);
        assert!(!items.column("quantity").unwrap().pk);

        let customers = tables.iter().find(|t| t.name == "customers").unwrap();
        let email = customers.column("email").unwrap();
        assert_eq!(email.data_type, "varchar(120)");
        assert!(!email.nullable);
        assert!(customers.is_sole_primary_key("id"));
    }

    #[tokio::test]
    async fn test_foreign_keys_export_correspondence_files() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();

        let result = SchemaIntrospector::new(&catalog, &exporter).run().await.unwrap();
        assert_eq!(result.report.foreign_keys_exported, 3);

        let fks: Vec<(&str, &str)> = result
            .extract
            .foreign_keys
            .iter()
            .map(|fk| (fk.from_table.as_str(), fk.from_column.as_str()))
            .collect();
        assert_eq!(
            fks,
            vec![
                ("order_items", "order_id"),
                ("orders", "customer_id"),
                ("products", "category_id"),
            ]
        );

        let fk = &result.extract.foreign_keys[1];
        assert_eq!(
            fk.csv_file.as_deref(),
            Some("fk_orders_customer_id_to_customers_id.csv")
        );
        let text =
            fs::read_to_string(dir.path().join("fk_orders_customer_id_to_customers_id.csv")).unwrap();
        assert_eq!(text, "orders.customer_id,customers.id\n1,1\n1,1\n2,2\n");
    }

    #[tokio::test]
    async fn test_reexport_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();

        let first_dir = dir.path().join("first");
        let second_dir = dir.path().join("second");
        let first = SchemaIntrospector::new(&catalog, &CsvExporter::new(&first_dir).unwrap())
            .run()
            .await
            .unwrap();
        let second = SchemaIntrospector::new(&catalog, &CsvExporter::new(&second_dir).unwrap())
            .run()
            .await
            .unwrap();

        for (name, entry) in &first.extract.tables {
            let again = &second.extract.tables[name];
            assert_eq!(entry.csv_digest, again.csv_digest, "digest differs for {name}");
            assert_eq!(
                fs::read(first_dir.join(&entry.csv_file)).unwrap(),
                fs::read(second_dir.join(&again.csv_file)).unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_unreadable_table_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let catalog = FailingCatalog {
            inner: SqliteCatalog::open(shop_db(dir.path())).await.unwrap(),
            table: "orders".to_string(),
        };
        let exporter = CsvExporter::new(dir.path()).unwrap();

        let result = SchemaIntrospector::new(&catalog, &exporter)
            .with_options(IntrospectOptions {
                sample_rows: 1,
                workers: 2,
            })
            .run()
            .await
            .unwrap();

        assert_eq!(result.report.tables_exported, 4);
        assert!(!result.extract.tables.contains_key("orders"));
        assert!(!dir.path().join("orders.csv").exists());

        let items: Vec<&str> = result.report.failures.iter().map(|f| f.item.as_str()).collect();
        assert!(items.contains(&"table orders"));
        assert!(result
            .report
            .failures
            .iter()
            .all(|f| f.kind == FailureKind::Catalog));

        // Both foreign keys touching orders fail; the third still exports.
        assert_eq!(result.report.foreign_keys_exported, 1);
        let categories_fk = result
            .extract
            .foreign_keys
            .iter()
            .find(|fk| fk.from_table == "products")
            .unwrap();
        assert!(categories_fk.csv_file.is_some());
    }

    #[tokio::test]
    async fn test_schema_extract_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();
        let result = SchemaIntrospector::new(&catalog, &exporter).run().await.unwrap();

        let path = dir.path().join("schema_output.json");
        result.extract.save(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["tables"]["customers"]["csv_file"], "customers.csv");
        assert_eq!(json["tables"]["customers"]["columns"][1]["type"], "varchar(120)");
        assert!(json["implicit_relationships"].as_array().unwrap().is_empty());

        let loaded = SchemaExtract::load(&path).unwrap();
        assert_eq!(loaded.tables.len(), 5);
        assert_eq!(loaded.foreign_keys, result.extract.foreign_keys);
    }

    const LOOKALIKE_TABLES: &str = r#"
        CREATE TABLE "order items" (id INTEGER PRIMARY KEY, b TEXT, c TEXT);
        CREATE TABLE order_items (id INTEGER PRIMARY KEY, b TEXT, c TEXT);
        INSERT INTO "order items" VALUES (1, 'x', 'y'), (2, 'x', 'y'), (3, 'x', 'y');
        INSERT INTO order_items VALUES (10, 'p', 'q');
    "#;

    #[tokio::test]
    async fn test_lookalike_table_names_export_separate_files() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(create_db(dir.path(), "lookalike.db", LOOKALIKE_TABLES))
            .await
            .unwrap();

        let first_dir = dir.path().join("first");
        let result = SchemaIntrospector::new(&catalog, &CsvExporter::new(&first_dir).unwrap())
            .run()
            .await
            .unwrap();

        let spaced = &result.extract.tables["order items"];
        let underscored = &result.extract.tables["order_items"];
        assert_eq!(spaced.csv_file, "order_items.csv");
        assert_eq!(underscored.csv_file, "order_items_2.csv");
        assert_eq!(csv_rows(&first_dir.join(&spaced.csv_file)), 3);
        assert_eq!(csv_rows(&first_dir.join(&underscored.csv_file)), 1);
        assert!(result.report.is_clean());

        let second_dir = dir.path().join("second");
        let again = SchemaIntrospector::new(&catalog, &CsvExporter::new(&second_dir).unwrap())
            .run()
            .await
            .unwrap();
        for (name, entry) in &result.extract.tables {
            let other = &again.extract.tables[name];
            assert_eq!(entry.csv_file, other.csv_file);
            assert_eq!(entry.csv_digest, other.csv_digest);
        }
    }

    #[tokio::test]
    async fn test_key_sequence_order_survives_reload() {
        let dir = TempDir::new().unwrap();
        let db = create_db(
            dir.path(),
            "links.db",
            "CREATE TABLE links (source_id INTEGER, target_id INTEGER, PRIMARY KEY (target_id, source_id));",
        );
        let catalog = SqliteCatalog::open(db).await.unwrap();
        let exporter = CsvExporter::new(dir.path()).unwrap();
        let result = SchemaIntrospector::new(&catalog, &exporter).run().await.unwrap();

        let path = dir.path().join("schema_output.json");
        result.extract.save(&path).unwrap();
        let loaded = SchemaExtract::load(&path).unwrap();

        let links = &loaded.table_metadata()[0];
        assert_eq!(
            links.primary_key.as_ref().unwrap().columns,
            vec!["target_id", "source_id"]
        );
        assert_eq!(links.column_names(), vec!["source_id", "target_id"]);
    }

    #[tokio::test]
    async fn test_missing_database_is_a_connection_failure() {
        let dir = TempDir::new().unwrap();
        let err = SqliteCatalog::open(dir.path().join("absent.db"))
            .await
            .unwrap_err();
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn test_unknown_identifiers_are_rejected() {
        let dir = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(shop_db(dir.path())).await.unwrap();

        let err = catalog
            .distinct_values("customers; DROP TABLE orders", "id", 10)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownIdentifier(_)));

        let err = catalog.distinct_values("customers", "nope", 10).await.unwrap_err();
        assert!(matches!(err, CatalogError::UnknownIdentifier(_)));
        assert_eq!(catalog.list_tables().await.unwrap().len(), 5);
    }
}
