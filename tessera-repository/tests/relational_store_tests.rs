mod common;

use common::{sqlite_memory_properties, sqlite_properties, Customer, Product, Sku};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tessera_common::{keys, ConfigError, Properties};
use tessera_repository::relational::{Driver, DuckDbDriver};
use tessera_repository::{
    DriverRegistry, JdbcSettings, KeyValueStore, RelationalStore, RepositoryError,
    RepositoryStrategy,
};

fn open(properties: &Properties) -> Result<RelationalStore<Product, Sku>, RepositoryError> {
    RelationalStore::new(Product::sku, properties, &DriverRegistry::default())
}

// ── configuration ───────────────────────────────────────────────

#[test]
fn missing_properties_are_rejected() {
    let err = open(&Properties::new()).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Configuration(ConfigError::MissingProperty(_))
    ));
}

#[test]
fn missing_url_is_rejected() {
    let props = Properties::new().with(keys::JDBC_DRIVER, "sqlite");
    let err = open(&props).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Configuration(ConfigError::MissingProperty(ref key)) if key == keys::JDBC_URL
    ));
}

#[test]
fn unknown_driver_is_rejected() {
    let props = Properties::new()
        .with(keys::JDBC_DRIVER, "org.unknown.Driver")
        .with(keys::JDBC_URL, "sqlite::memory:");
    let err = open(&props).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Configuration(ConfigError::UnknownDriver(_))
    ));
}

#[test]
fn url_for_another_engine_is_rejected() {
    let props = Properties::new()
        .with(keys::JDBC_DRIVER, "sqlite")
        .with(keys::JDBC_URL, "jdbc:unknown://localhost:5432/app");
    let err = open(&props).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Configuration(ConfigError::InvalidUrl { .. })
    ));
}

#[test]
fn unreachable_database_path_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let props = Properties::new().with(keys::JDBC_DRIVER, "sqlite").with(
        keys::JDBC_URL,
        format!("sqlite:{}", dir.path().join("missing/dir/app.db").display()),
    );
    let err = open(&props).unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Configuration(ConfigError::InvalidUrl { .. })
    ));
}

#[test]
fn password_file_is_accepted() {
    let mut secret = tempfile::NamedTempFile::new().unwrap();
    writeln!(secret, "hunter2").unwrap();
    let props = sqlite_memory_properties()
        .with(keys::JDBC_USERNAME, "app")
        .with(
            keys::JDBC_PASSWORD_FILE,
            secret.path().to_string_lossy().to_string(),
        );
    assert!(open(&props).is_ok());
}

#[test]
fn autocreate_disabled_leaves_table_missing() {
    let props = sqlite_memory_properties().with(keys::JDBC_AUTOCREATE_TABLE, "false");
    let store = open(&props).unwrap();
    assert!(store.get_all().is_err());
}

#[test]
fn table_is_named_after_entity() {
    let store = open(&sqlite_memory_properties()).unwrap();
    assert_eq!(store.table(), "Product");
    assert_eq!(store.strategy(), RepositoryStrategy::Relational);
}

#[test]
fn tuple_entities_are_invalid() {
    let err = RelationalStore::<(u32, String), u32>::new(
        |e: &(u32, String)| e.0,
        &sqlite_memory_properties(),
        &DriverRegistry::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidArgument(_)));
}

// ── CRUD on sqlite ──────────────────────────────────────────────

#[test]
fn add_get_remove() {
    let store = open(&sqlite_memory_properties()).unwrap();
    let product = Product::new(42, "lamp");

    store.add(product.clone()).unwrap();
    assert_eq!(store.get(&Sku(42)).unwrap(), Some(product));

    store.remove(&Sku(42)).unwrap();
    assert!(store.get(&Sku(42)).unwrap().is_none());
}

#[test]
fn duplicate_add_is_rejected() {
    let store = open(&sqlite_memory_properties()).unwrap();
    store.add(Product::new(42, "lamp")).unwrap();
    let err = store.add(Product::new(42, "chair")).unwrap_err();
    assert!(matches!(err, RepositoryError::DuplicateKey(_)));
    assert_eq!(store.get(&Sku(42)).unwrap().unwrap().name, "lamp");
}

#[test]
fn remove_missing_is_noop() {
    let store = open(&sqlite_memory_properties()).unwrap();
    store.remove(&Sku(9)).unwrap();
    assert!(store.get(&Sku(9)).unwrap().is_none());
}

#[test]
fn update_and_not_found() {
    let store = open(&sqlite_memory_properties()).unwrap();
    assert!(matches!(
        store.update(Product::new(1, "a")),
        Err(RepositoryError::NotFound(_))
    ));

    store.add(Product::new(1, "a")).unwrap();
    let mut changed = Product::new(1, "a");
    changed.stock = 3;
    store.update(changed.clone()).unwrap();
    assert_eq!(store.get(&Sku(1)).unwrap(), Some(changed));
}

#[test]
fn get_all_and_remove_all() {
    let store = open(&sqlite_memory_properties()).unwrap();
    for i in 0..5 {
        store.add(Product::new(i, "item")).unwrap();
    }
    let mut skus: Vec<_> = store.get_all().unwrap().iter().map(|p| p.sku).collect();
    skus.sort();
    assert_eq!(skus, (0..5).map(Sku).collect::<Vec<_>>());

    store.remove_all().unwrap();
    assert!(store.get_all().unwrap().is_empty());
}

#[test]
fn string_keys_round_trip() {
    let store: RelationalStore<Customer, String> = RelationalStore::new(
        |c: &Customer| c.email.clone(),
        &sqlite_memory_properties(),
        &DriverRegistry::default(),
    )
    .unwrap();
    store.add(Customer::new("ada@example.com")).unwrap();
    assert!(store.get(&"ada@example.com".to_string()).unwrap().is_some());
    assert!(store.get(&"bob@example.com".to_string()).unwrap().is_none());
}

#[test]
fn instances_share_data_through_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let props = sqlite_properties(dir.path());
    let first = open(&props).unwrap();
    let second = open(&props).unwrap();

    first.add(Product::new(42, "lamp")).unwrap();

    assert!(second.get(&Sku(42)).unwrap().is_some());
    assert!(matches!(
        second.add(Product::new(42, "lamp")),
        Err(RepositoryError::DuplicateKey(_))
    ));
}

#[test]
fn entity_types_use_separate_tables() {
    let dir = tempfile::tempdir().unwrap();
    let props = sqlite_properties(dir.path());
    let products = open(&props).unwrap();
    let customers: RelationalStore<Customer, String> =
        RelationalStore::new(|c: &Customer| c.email.clone(), &props, &DriverRegistry::default())
            .unwrap();

    products.add(Product::new(1, "a")).unwrap();
    customers.add(Customer::new("x@example.com")).unwrap();
    products.remove_all().unwrap();

    assert_eq!(customers.get_all().unwrap().len(), 1);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Envelope<T> {
    id: u32,
    body: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Invoice {
    total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Shipment {
    carrier: String,
}

#[test]
fn generic_instantiations_use_separate_tables() {
    let dir = tempfile::tempdir().unwrap();
    let props = sqlite_properties(dir.path());
    let drivers = DriverRegistry::default();
    let invoices: RelationalStore<Envelope<Invoice>, u32> =
        RelationalStore::new(|e: &Envelope<Invoice>| e.id, &props, &drivers).unwrap();
    let shipments: RelationalStore<Envelope<Shipment>, u32> =
        RelationalStore::new(|e: &Envelope<Shipment>| e.id, &props, &drivers).unwrap();

    assert_eq!(invoices.table(), "Envelope_Invoice");
    assert_eq!(shipments.table(), "Envelope_Shipment");

    invoices.add(Envelope { id: 1, body: Invoice { total: 250 } }).unwrap();
    shipments
        .add(Envelope { id: 1, body: Shipment { carrier: "post".into() } })
        .unwrap();
    invoices.remove_all().unwrap();

    assert!(invoices.get_all().unwrap().is_empty());
    assert_eq!(
        shipments.get(&1).unwrap(),
        Some(Envelope { id: 1, body: Shipment { carrier: "post".into() } })
    );
}

// ── duckdb ──────────────────────────────────────────────────────

#[test]
fn duckdb_in_memory_crud() {
    let props = Properties::new()
        .with(keys::JDBC_DRIVER, "duckdb")
        .with(keys::JDBC_URL, "duckdb::memory:");
    let store = open(&props).unwrap();

    store.add(Product::new(1, "a")).unwrap();
    store.add(Product::new(2, "b")).unwrap();
    assert_eq!(store.get_all().unwrap().len(), 2);

    store.remove(&Sku(1)).unwrap();
    assert!(store.get(&Sku(1)).unwrap().is_none());
    assert!(store.get(&Sku(2)).unwrap().is_some());
}

#[test]
fn duckdb_duplicate_add_is_rejected() {
    let props = Properties::new()
        .with(keys::JDBC_DRIVER, "duckdb")
        .with(keys::JDBC_URL, "duckdb::memory:");
    let store = open(&props).unwrap();
    store.add(Product::new(1, "a")).unwrap();
    assert!(matches!(
        store.add(Product::new(1, "a")),
        Err(RepositoryError::DuplicateKey(_))
    ));
}

#[test]
fn duckdb_rejects_sqlite_url() {
    let props = Properties::new()
        .with(keys::JDBC_DRIVER, "duckdb")
        .with(keys::JDBC_URL, "sqlite::memory:");
    assert!(matches!(
        open(&props),
        Err(RepositoryError::Configuration(ConfigError::InvalidUrl { .. }))
    ));
}

#[test]
fn duckdb_file_instance_is_opened_once() {
    let dir = tempfile::tempdir().unwrap();
    let settings = JdbcSettings {
        driver: "duckdb".into(),
        url: format!("duckdb:{}", dir.path().join("store.duckdb").display()),
        username: None,
        password: None,
        autocreate_table: true,
    };
    let driver = DuckDbDriver::default();

    let first = driver.connect(&settings).unwrap();
    let second = driver.connect(&settings).unwrap();
    drop(first);
    drop(second);

    assert_eq!(driver.open_files(), 1);
}
