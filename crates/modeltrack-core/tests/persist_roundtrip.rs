//! Snapshot save/load through the filesystem.

use modeltrack_core::config::StorageConfig;
use modeltrack_core::persist::{self, SNAPSHOT_HEADER};
use modeltrack_core::{
    Assembly, Color, Decal, ErrorCode, Member, Model, Paint, Part, PersistError, Status, Trackable,
};
use tempfile::TempDir;

fn red() -> Paint {
    Color::new("Tamiya", "X-7", "Red").expect("valid color").spray()
}

fn storage(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        directory: dir.path().join("models"),
        ..StorageConfig::default()
    }
}

fn build() -> Model {
    let body = Part::new("body", [red()], [Decal::new("7")]);
    let seat = Part::bare("seat");
    let cabin = Assembly::new("cabin", [&seat]);

    let mut model = Model::new("buggy");
    model.next_step("prime", [&body]);
    model.next_step("interior", [Member::from(&cabin), Member::from(&body)]);
    model.next_step("decals", [&body]);
    model
}

#[test]
fn save_then_load_preserves_values() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = storage(&dir);
    let model = build();

    let path = model.save(&cfg).expect("save");
    assert_eq!(path, dir.path().join("models/buggy.snapshot"));

    let restored = Model::load(&cfg, "buggy").expect("load");
    assert_eq!(restored.name(), "buggy");
    assert_eq!(restored.len(), model.len());
    for (before, after) in model.iter().zip(restored.iter()) {
        assert_eq!(before, after);
        assert_eq!(before.name(), after.name());
    }
    assert_eq!(restored.parts().len(), model.parts().len());
    assert_eq!(restored.paints(), model.paints());
    assert_eq!(restored.decals(), model.decals());
}

#[test]
fn shared_part_is_one_instance_after_reload() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = storage(&dir);
    build().save(&cfg).expect("save");

    let restored = Model::load(&cfg, "buggy").expect("load");
    let via_first = restored[0].parts()[0].clone();
    let via_last = restored[2].parts()[0].clone();
    let via_registry = restored.parts()["body"].clone();

    via_first
        .as_part()
        .expect("plain part")
        .set_paint_status(red(), Status::Done)
        .expect("set status");

    assert_eq!(via_last.check_paint(&red()), Some(Status::Done));
    assert_eq!(via_registry.check_paint(&red()), Some(Status::Done));
    assert!(restored[1].get("body", false)[0].same_instance(&via_registry));
}

#[test]
fn ownership_survives_reload() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = storage(&dir);
    build().save(&cfg).expect("save");

    let restored = Model::load(&cfg, "buggy").expect("load");
    let body = &restored.parts()["body"];
    assert!(body.master().expect("owner").same_instance(&restored[0]));

    let cabin = restored[1].assemblies()[0].clone();
    assert!(cabin.master().expect("owner").same_instance(&restored[1]));
    assert!(
        restored[2]
            .previous()
            .expect("previous")
            .same_instance(&restored[1])
    );
    assert!(body.set_master(&restored[2]).is_err());
}

#[test]
fn pretty_snapshots_load() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = StorageConfig {
        pretty: true,
        ..storage(&dir)
    };
    let path = build().save(&cfg).expect("save");

    let text = std::fs::read_to_string(&path).expect("read");
    assert!(text.starts_with(SNAPSHOT_HEADER));
    assert!(text.lines().count() > 3);
    assert_eq!(persist::load(&path).expect("load").len(), 3);
}

#[test]
fn tampered_file_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = storage(&dir);
    let path = build().save(&cfg).expect("save");

    let text = std::fs::read_to_string(&path).expect("read");
    std::fs::write(&path, text.replace("interior", "exterior")).expect("write");

    let err = persist::load(&path).expect_err("checksum must fail");
    assert!(matches!(err, PersistError::ChecksumMismatch { .. }));
    assert_eq!(err.code(), ErrorCode::SnapshotChecksumMismatch);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = Model::load(&storage(&dir), "nothing").expect_err("no file");
    assert!(matches!(err, PersistError::Read { .. }));
    assert_eq!(err.code(), ErrorCode::SnapshotReadFailed);
}
