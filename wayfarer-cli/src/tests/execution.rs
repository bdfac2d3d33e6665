//! Commands executed against an on-disk database.

use super::*;
use crate::commands::{
    BboxConfig, ClearConfig, NearConfig, StoreConfig, TagGroup, speed_limit_groups, write_json,
};
use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use tempfile::TempDir;
use wayfarer_core::{
    EntityKind, Node, QueryFacade, Session, Summary, Way, WayFields,
    test_support::{lon_lat, save_node, save_relation, save_way},
};

/// A seeded database on disk and the nodes written into it.
struct SeededStore {
    _dir: TempDir,
    store: StoreConfig,
    near: Node,
    far: Node,
}

#[fixture]
fn seeded() -> SeededStore {
    let dir = TempDir::new().expect("tempdir");
    let database = Utf8PathBuf::from_path_buf(dir.path().join("map.db")).expect("utf-8 path");
    let facade = QueryFacade::open(Session::open(database.as_std_path()).expect("open session"))
        .expect("open facade");
    let near = save_node(&facade, 0.0, 0.0).expect("near node");
    let far = save_node(&facade, 1.0, 0.0).expect("far node");
    let way = save_way(&facade, &[near.id, far.id]).expect("way");
    save_relation(&facade, &[(way.id, EntityKind::Way, "outer")]).expect("relation");
    SeededStore {
        _dir: dir,
        store: StoreConfig { database },
        near,
        far,
    }
}

#[rstest]
fn near_lists_nodes_nearest_first(seeded: SeededStore) {
    let config = NearConfig {
        store: seeded.store.clone(),
        centre: lon_lat(0.9, 0.0),
        distance_km: 200.0,
    };
    let facade = config.store.open().expect("open store");
    let ids: Vec<_> = config
        .execute(&facade)
        .expect("near")
        .into_iter()
        .map(|node| node.id)
        .collect();
    assert_eq!(ids, vec![seeded.far.id, seeded.near.id]);
}

#[rstest]
fn bbox_rejects_anti_meridian_boxes(seeded: SeededStore) {
    let config = BboxConfig {
        store: seeded.store.clone(),
        bottom_left: lon_lat(170.0, -10.0),
        top_right: lon_lat(-170.0, 10.0),
    };
    let facade = config.store.open().expect("open store");
    let err = config.execute(&facade).expect_err("anti-meridian box");
    match err {
        CliError::Store { source } => assert_eq!(source.status_code(), 400),
        other => panic!("expected Store error, found {other:?}"),
    }
}

#[rstest]
fn bbox_includes_nodes_on_the_edge(seeded: SeededStore) {
    let config = BboxConfig {
        store: seeded.store.clone(),
        bottom_left: lon_lat(0.0, 0.0),
        top_right: lon_lat(0.5, 0.5),
    };
    let facade = config.store.open().expect("open store");
    assert_eq!(config.execute(&facade).expect("bbox"), vec![seeded.near]);
}

#[rstest]
fn speed_limits_are_listed_as_groups(seeded: SeededStore) {
    let facade = seeded.store.open().expect("open store");
    let fields = WayFields::default().with_tag("maxspeed", "30");
    for _ in 0..2 {
        facade
            .ways()
            .save(Way::create(fields.clone()).expect("way"))
            .expect("save way");
    }

    let groups = speed_limit_groups(&facade).expect("speed limits");

    assert!(groups.contains(&TagGroup {
        tags: fields.tags,
        count: 2,
    }));
    assert!(groups.iter().any(|group| group.tags.is_empty() && group.count == 1));
}

#[rstest]
fn clear_reports_the_remaining_totals(seeded: SeededStore) {
    let config = ClearConfig {
        store: seeded.store.clone(),
        kind: EntityKind::Node,
    };
    let facade = config.store.open().expect("open store");

    let report = config.execute(&facade).expect("clear");

    assert_eq!(report.cleared, EntityKind::Node);
    assert_eq!(
        report.remaining,
        Summary {
            node_count: 0,
            way_count: 1,
            relation_count: 1,
        }
    );
    let reopened = seeded.store.open().expect("reopen store");
    assert!(reopened.index().is_empty().expect("index"));
}

#[rstest]
fn write_json_emits_one_document_per_call(seeded: SeededStore) {
    let facade = seeded.store.open().expect("open store");
    let mut buffer = Vec::new();

    write_json(&mut buffer, &facade.summarize().expect("summary")).expect("write");

    let text = String::from_utf8(buffer).expect("utf-8 output");
    assert!(text.ends_with('\n'));
    let value: serde_json::Value = serde_json::from_str(&text).expect("json output");
    assert_eq!(value["nodeCount"], 2);
    assert_eq!(value["wayCount"], 1);
}
