use std::collections::BTreeMap;
use std::ops::RangeBounds;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use schemakv::encoding::keycode::level_key;
use schemakv::store::memory::MemoryScan;
use schemakv::store::{BatchOp, Table, WriteBatch};
use schemakv::{
    CatalogConfig, Compression, CreateTimeseriesPlan, DataType, Encoding, Error, FjallStore,
    MemoryStore, NodeType, PartialPath, Result, SchemaCatalog, Store,
};
use tempfile::TempDir;

fn path(p: &str) -> PartialPath {
    PartialPath::parse(p).unwrap()
}

fn memory_catalog(config: CatalogConfig) -> SchemaCatalog<MemoryStore> {
    SchemaCatalog::new(MemoryStore::new(), config)
}

fn create<S: Store>(catalog: &SchemaCatalog<S>, p: &str) -> Result<()> {
    catalog.create_timeseries(
        &path(p),
        DataType::Int64,
        Encoding::Ts2Diff,
        Compression::Snappy,
        BTreeMap::new(),
        None,
    )
}

/// Every node type physically stored at `p`.
fn stored_types<S: Store>(store: &S, p: &str) -> Vec<NodeType> {
    let p = path(p);
    let key = level_key(&p, p.depth()).unwrap();
    NodeType::STORED
        .into_iter()
        .filter(|t| store.get(Table::Nodes, &key.with_type(*t)).unwrap().is_some())
        .collect()
}

/// A memory store whose commits fail while `fail_alias_batches` is set and
/// the batch registers an alias.
#[derive(Default)]
struct FaultyStore {
    inner: MemoryStore,
    fail_alias_batches: AtomicBool,
}

impl Store for FaultyStore {
    type ScanIterator<'a> = MemoryScan<'a>;

    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(table, key)
    }

    fn multi_get(&self, table: Table, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        self.inner.multi_get(table, keys)
    }

    fn scan<'a>(
        &'a self,
        table: Table,
        range: impl RangeBounds<Vec<u8>> + Clone + Send + Sync + 'a,
    ) -> Result<Self::ScanIterator<'a>> {
        self.inner.scan(table, range)
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let registers_alias = batch.ops().iter().any(|op| {
            matches!(
                op,
                BatchOp::Put {
                    table: Table::Aliases,
                    ..
                }
            )
        });
        if registers_alias && self.fail_alias_batches.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected commit failure".to_string()));
        }
        self.inner.commit(batch)
    }
}

#[test]
fn test_storage_group_descent_is_idempotent() {
    let catalog = memory_catalog(CatalogConfig::default());
    catalog.set_storage_group(&path("root.ln.wf01")).unwrap();
    catalog.set_storage_group(&path("root.ln.wf02")).unwrap();
    assert_eq!(stored_types(catalog.store(), "root.ln"), vec![NodeType::Internal]);

    match catalog.set_storage_group(&path("root.ln.wf01")) {
        Err(Error::AlreadyExists { path, .. }) => assert_eq!(path, "root.ln.wf01"),
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(catalog.store().len(Table::Nodes), 3);
}

#[test]
fn test_no_nested_storage_groups() {
    let catalog = memory_catalog(CatalogConfig::default());
    catalog.set_storage_group(&path("root.a")).unwrap();
    assert!(matches!(
        catalog.set_storage_group(&path("root.a.b")),
        Err(Error::AlreadyExists { .. })
    ));
    assert!(stored_types(catalog.store(), "root.a.b").is_empty());
}

#[test]
fn test_entity_promotion_leaves_single_record() {
    let catalog = memory_catalog(CatalogConfig::default());
    create(&catalog, "root.sg.d1.s1").unwrap();
    create(&catalog, "root.sg.d1.s2").unwrap();

    assert_eq!(stored_types(catalog.store(), "root.sg.d1"), vec![NodeType::Entity]);
    assert_eq!(stored_types(catalog.store(), "root.sg.d1.s1"), vec![NodeType::Measurement]);
    assert_eq!(stored_types(catalog.store(), "root.sg.d1.s2"), vec![NodeType::Measurement]);
    // root.sg, root.sg.d1 and the two leaves.
    assert_eq!(catalog.store().len(Table::Nodes), 4);
}

#[test]
fn test_measurement_cannot_have_children() {
    let catalog = memory_catalog(CatalogConfig::default());
    create(&catalog, "root.sg.d1.s1").unwrap();
    match create(&catalog, "root.sg.d1.s1.s2") {
        Err(Error::AlreadyExists { reason, .. }) => {
            assert_eq!(reason, "path contains measurement node")
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert!(stored_types(catalog.store(), "root.sg.d1.s1.s2").is_empty());
    assert_eq!(stored_types(catalog.store(), "root.sg.d1.s1"), vec![NodeType::Measurement]);
}

#[test]
fn test_alias_is_committed_with_its_measurement() {
    let catalog = SchemaCatalog::new(FaultyStore::default(), CatalogConfig::default());
    let plan = CreateTimeseriesPlan::new(
        path("root.sg.d1.temperature"),
        DataType::Double,
        Encoding::Gorilla,
        Compression::Snappy,
    )
    .alias("a1")
    .tags(BTreeMap::from([("owner".to_string(), "ops".to_string())]));

    catalog.store().fail_alias_batches.store(true, Ordering::SeqCst);
    let err = catalog.create_timeseries_with(plan.clone()).unwrap_err();
    assert!(err.is_storage());
    assert_eq!(catalog.get_measurement(&path("root.sg.d1.temperature")).unwrap(), None);
    assert_eq!(catalog.get_measurement(&path("root.sg.d1.a1")).unwrap(), None);
    assert_eq!(catalog.store().inner.len(Table::Tags), 0);
    assert_eq!(catalog.store().inner.len(Table::Aliases), 0);
    // Ancestors committed before the leaf batch stay behind.
    assert_eq!(stored_types(catalog.store(), "root.sg.d1"), vec![NodeType::Entity]);

    catalog.store().fail_alias_batches.store(false, Ordering::SeqCst);
    catalog.create_timeseries_with(plan).unwrap();
    let canonical = catalog
        .get_measurement(&path("root.sg.d1.temperature"))
        .unwrap()
        .unwrap();
    let aliased = catalog.get_measurement(&path("root.sg.d1.a1")).unwrap().unwrap();
    assert_eq!(canonical, aliased);
    assert_eq!(
        catalog.get_tags(&path("root.sg.d1.temperature")).unwrap().get("owner"),
        Some(&"ops".to_string())
    );
}

#[test]
fn test_child_listing() {
    let catalog = memory_catalog(CatalogConfig::default());
    for leaf in ["root.sg1.d1.s1", "root.sg1.d1.s2", "root.sg1.d2.s1"] {
        create(&catalog, leaf).unwrap();
    }
    let children = catalog
        .get_child_node_path_in_next_level(&path("root.sg1"))
        .unwrap();
    assert_eq!(
        children.into_iter().collect::<Vec<_>>(),
        vec![path("root.sg1.d1"), path("root.sg1.d2")]
    );
}

#[test]
fn test_deep_levels_match_shallow_levels() {
    let relative = [
        "sg.d1.s1",
        "sg.d1.s2",
        "sg.d2.s1",
        "sg.g.d3.s1",
        "sg.g.d4.s7",
        "sg.h.i.d5.s1",
    ];
    let padding = "p1.p2.p3.p4";

    let shallow = memory_catalog(CatalogConfig::default());
    let padded = memory_catalog(CatalogConfig::default());
    for leaf in relative {
        create(&shallow, &format!("root.{leaf}")).unwrap();
        create(&padded, &format!("root.{padding}.{leaf}")).unwrap();
    }

    let strip = |p: &PartialPath| {
        let mut nodes = vec!["root".to_string()];
        nodes.extend(p.nodes()[5..].iter().cloned());
        PartialPath::from_nodes(nodes).unwrap()
    };
    for level in 1..=5 {
        let expected = shallow
            .get_nodes_list_in_given_level(&path("root.**"), level)
            .unwrap();
        let deep = padded
            .get_nodes_list_in_given_level(&path(&format!("root.{padding}")), level + 4)
            .unwrap()
            .iter()
            .map(strip)
            .collect::<Vec<_>>();
        assert_eq!(deep, expected, "level {level}");
    }

    // The same store listed with every level fanned out from its parents.
    let direct = (0..=10)
        .map(|level| {
            padded
                .get_nodes_list_in_given_level(&path("root.**"), level)
                .unwrap()
        })
        .collect::<Vec<_>>();
    let fanned = SchemaCatalog::new(
        padded.into_store(),
        CatalogConfig::default().deep_level_threshold(0).scan_parallelism(4),
    );
    for (level, expected) in direct.iter().enumerate() {
        assert_eq!(
            &fanned
                .get_nodes_list_in_given_level(&path("root.**"), level)
                .unwrap(),
            expected,
            "level {level}"
        );
    }
}

#[test]
fn test_auto_create_storage_group() {
    let catalog = memory_catalog(CatalogConfig::default());
    create(&catalog, "root.sg.d1.s1").unwrap();
    assert_eq!(
        catalog.storage_group_of(&path("root.sg.d1.s1")).unwrap(),
        Some(path("root.sg"))
    );

    let catalog = memory_catalog(CatalogConfig::default().default_storage_group_level(2));
    create(&catalog, "root.ln.wf.d1.s1").unwrap();
    assert_eq!(
        catalog.get_node_type(&path("root.ln.wf")).unwrap(),
        Some(NodeType::StorageGroup)
    );
    assert_eq!(catalog.get_node_type(&path("root.ln")).unwrap(), Some(NodeType::Internal));

    let catalog = memory_catalog(CatalogConfig::default().auto_create_schema(false));
    assert!(matches!(
        create(&catalog, "root.sg.d1.s1"),
        Err(Error::StorageGroupNotSet(_))
    ));
    assert!(catalog.store().is_empty());
}

#[test]
fn test_concurrent_sibling_creation() {
    let catalog = Arc::new(memory_catalog(CatalogConfig::default().lock_stripes(4)));
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles = (0..threads)
        .map(|i| {
            let catalog = catalog.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    create(&catalog, &format!("root.sg.d1.s{i}"))
                } else {
                    create(&catalog, &format!("root.sg.d1.sub{i}.s1"))
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(stored_types(catalog.store(), "root.sg"), vec![NodeType::StorageGroup]);
    assert_eq!(stored_types(catalog.store(), "root.sg.d1"), vec![NodeType::Entity]);
    let children = catalog
        .get_child_node_path_in_next_level(&path("root.sg.d1"))
        .unwrap();
    assert_eq!(children.len(), threads);
}

#[test]
fn test_concurrent_same_leaf_has_one_winner() {
    let catalog = Arc::new(memory_catalog(CatalogConfig::default()));
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles = (0..threads)
        .map(|_| {
            let catalog = catalog.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                create(&catalog, "root.sg.d1.s1")
            })
        })
        .collect::<Vec<_>>();
    let results = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::AlreadyExists { .. })));
    assert_eq!(stored_types(catalog.store(), "root.sg.d1.s1"), vec![NodeType::Measurement]);
}

#[test]
fn test_concurrent_alias_is_unique() {
    let catalog = Arc::new(memory_catalog(CatalogConfig::default()));
    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles = (0..threads)
        .map(|i| {
            let catalog = catalog.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                catalog.create_timeseries(
                    &path(&format!("root.sg.d{i}.s1")),
                    DataType::Float,
                    Encoding::Rle,
                    Compression::Lz4,
                    BTreeMap::new(),
                    Some("shared"),
                )
            })
        })
        .collect::<Vec<_>>();
    let results = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .collect::<Vec<_>>();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::AliasAlreadyExists { .. })));
    assert_eq!(catalog.store().len(Table::Aliases), 1);
}

#[test]
fn test_catalog_on_fjall() {
    let dir = TempDir::new().unwrap();
    {
        let catalog = SchemaCatalog::new(FjallStore::open(dir.path()).unwrap(), CatalogConfig::default());
        catalog.set_storage_group(&path("root.sg")).unwrap();
        catalog
            .create_timeseries_with(
                CreateTimeseriesPlan::new(
                    path("root.sg.d1.s1"),
                    DataType::Boolean,
                    Encoding::Rle,
                    Compression::Gzip,
                )
                .alias("status"),
            )
            .unwrap();
        catalog
            .create_aligned_timeseries(
                &path("root.sg.d2"),
                &["x".to_string(), "y".to_string()],
                &[DataType::Float, DataType::Float],
                &[Encoding::Gorilla, Encoding::Gorilla],
                &[Compression::Snappy, Compression::Snappy],
            )
            .unwrap();
        catalog.store().persist().unwrap();
    }

    let catalog = SchemaCatalog::new(FjallStore::open(dir.path()).unwrap(), CatalogConfig::default());
    assert!(catalog.check_storage_group_by_path(&path("root.sg.d2.x")).unwrap());
    let record = catalog.get_measurement(&path("root.sg.d1.status")).unwrap().unwrap();
    assert_eq!(record.schema.name, "s1");
    assert_eq!(
        catalog.get_nodes_list_in_given_level(&path("root.sg"), 3).unwrap(),
        vec![path("root.sg.d1.s1"), path("root.sg.d2.x"), path("root.sg.d2.y")]
    );
    assert!(matches!(
        create(&catalog, "root.sg.d2.x"),
        Err(Error::AlreadyExists { .. })
    ));
}
