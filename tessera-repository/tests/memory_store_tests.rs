mod common;

use common::{Customer, Product, Sku};
use std::sync::Arc;
use std::thread;
use tessera_repository::{
    InMemoryStore, KeyValueStore, MemoryRegistry, RepositoryError, RepositoryStrategy,
};

fn product_store(registry: &Arc<MemoryRegistry>) -> InMemoryStore<Product, Sku> {
    InMemoryStore::new(registry.clone(), Product::sku)
}

// ── basic operations ────────────────────────────────────────────

#[test]
fn add_and_get() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    let product = Product::new(42, "lamp");

    store.add(product.clone()).unwrap();

    assert_eq!(store.get(&Sku(42)).unwrap(), Some(product));
    assert!(!store.get_all().unwrap().is_empty());
    assert_eq!(store.strategy(), RepositoryStrategy::InMemory);
}

#[test]
fn add_twice_is_rejected() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    store.add(Product::new(42, "lamp")).unwrap();

    let err = store.add(Product::new(42, "lamp")).unwrap_err();
    assert!(matches!(err, RepositoryError::DuplicateKey(_)));
}

#[test]
fn duplicate_detection_is_key_only() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    store.add(Product::new(42, "lamp")).unwrap();

    let err = store.add(Product::new(42, "chair")).unwrap_err();
    assert!(matches!(err, RepositoryError::DuplicateKey(_)));
    assert_eq!(store.get(&Sku(42)).unwrap().unwrap().name, "lamp");
}

#[test]
fn remove_entity() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    store.add(Product::new(42, "lamp")).unwrap();

    store.remove(&Sku(42)).unwrap();

    assert!(store.get_all().unwrap().is_empty());
}

#[test]
fn remove_missing_key_is_noop() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    store.remove(&Sku(7)).unwrap();
    assert!(store.get(&Sku(7)).unwrap().is_none());
}

#[test]
fn update_replaces_existing() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    store.add(Product::new(1, "lamp")).unwrap();

    let mut changed = Product::new(1, "lamp");
    changed.stock = 10;
    store.update(changed.clone()).unwrap();

    assert_eq!(store.get(&Sku(1)).unwrap(), Some(changed));
}

#[test]
fn update_missing_is_not_found() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    let err = store.update(Product::new(1, "lamp")).unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[test]
fn get_all_is_a_snapshot() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    store.add(Product::new(1, "a")).unwrap();

    let snapshot = store.get_all().unwrap();
    store.add(Product::new(2, "b")).unwrap();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(store.get_all().unwrap().len(), 2);
}

// ── sharing between handles ─────────────────────────────────────

#[test]
fn different_handles_share_one_table() {
    let registry = Arc::new(MemoryRegistry::new());
    let first = product_store(&registry);
    first.add(Product::new(42, "lamp")).unwrap();

    let second = product_store(&registry);

    assert!(second.get(&Sku(42)).unwrap().is_some());
    assert_eq!(first.get_all().unwrap().len(), 1);
    assert_eq!(second.get_all().unwrap().len(), 1);
}

#[test]
fn different_entity_types_are_isolated() {
    let registry = Arc::new(MemoryRegistry::new());
    let products = product_store(&registry);
    products.add(Product::new(42, "lamp")).unwrap();

    let customers: InMemoryStore<Customer, String> =
        InMemoryStore::new(registry.clone(), |c: &Customer| c.email.clone());
    customers.remove_all().unwrap();
    customers.add(Customer::new("ada@example.com")).unwrap();

    assert_eq!(products.get_all().unwrap().len(), 1);
    assert_eq!(customers.get_all().unwrap().len(), 1);
}

#[test]
fn remove_all_only_clears_own_type() {
    let registry = Arc::new(MemoryRegistry::new());
    let products = product_store(&registry);
    let customers: InMemoryStore<Customer, String> =
        InMemoryStore::new(registry.clone(), |c: &Customer| c.email.clone());
    products.add(Product::new(1, "a")).unwrap();
    customers.add(Customer::new("x@example.com")).unwrap();

    products.remove_all().unwrap();

    assert!(products.get_all().unwrap().is_empty());
    assert_eq!(customers.get_all().unwrap().len(), 1);
}

#[test]
fn second_key_type_for_same_entity_is_rejected() {
    let registry = Arc::new(MemoryRegistry::new());
    let by_sku = product_store(&registry);
    by_sku.add(Product::new(42, "lamp")).unwrap();

    let by_number: InMemoryStore<Product, u32> =
        InMemoryStore::new(registry.clone(), |p: &Product| p.sku.0);
    let err = by_number.add(Product::new(43, "desk")).unwrap_err();

    assert!(matches!(err, RepositoryError::InvalidArgument(_)));
    assert!(matches!(by_number.get_all(), Err(RepositoryError::InvalidArgument(_))));
    assert_eq!(by_sku.get_all().unwrap(), vec![Product::new(42, "lamp")]);
    assert_eq!(registry.table_count(), 1);
}

#[test]
fn separate_registries_are_isolated() {
    let a = Arc::new(MemoryRegistry::new());
    let b = Arc::new(MemoryRegistry::new());
    product_store(&a).add(Product::new(1, "a")).unwrap();
    assert!(product_store(&b).get_all().unwrap().is_empty());
}

// ── reset ───────────────────────────────────────────────────────

#[test]
fn clear_empties_existing_handles() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    store.add(Product::new(42, "lamp")).unwrap();

    registry.clear();

    assert!(store.get_all().unwrap().is_empty());
    assert_eq!(registry.table_count(), 1); // recreated by the lookup above
}

#[test]
fn reuse_handle_after_clear() {
    let registry = Arc::new(MemoryRegistry::new());
    let store = product_store(&registry);
    store.add(Product::new(42, "lamp")).unwrap();
    registry.clear();

    store.add(Product::new(42, "lamp")).unwrap();
    let fresh = product_store(&registry);

    assert_eq!(store.get_all().unwrap().len(), 1);
    assert_eq!(fresh.get_all().unwrap().len(), 1);
}

// ── concurrency ─────────────────────────────────────────────────

#[test]
fn concurrent_adds_from_many_handles_are_not_lost() {
    let registry = Arc::new(MemoryRegistry::new());
    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let registry = registry.clone();
            thread::spawn(move || {
                let store = InMemoryStore::new(registry, Product::sku);
                for i in 0..100 {
                    store.add(Product::new(t * 1000 + i, "item")).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(product_store(&registry).get_all().unwrap().len(), 800);
}

#[test]
fn racing_duplicate_adds_admit_exactly_one() {
    let registry = Arc::new(MemoryRegistry::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || {
                InMemoryStore::new(registry, Product::sku)
                    .add(Product::new(7, "contended"))
                    .is_ok()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);
}
