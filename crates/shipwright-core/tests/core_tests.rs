use std::sync::{Arc, Mutex};

use serde_json::json;
use shipwright_core::{
    BytesSource, DeployError, FileDescriptor, FileObserver, FileToUpload, PathMapping, Target,
    Values, WorkspaceConfig, apply_mappings,
};

#[derive(Default)]
struct Destinations(Mutex<Vec<String>>);

impl FileObserver for Destinations {
    fn before(&self, _file: &FileDescriptor, destination: Option<&str>) {
        self.0
            .lock()
            .unwrap()
            .push(destination.unwrap_or_default().to_string());
    }
}

#[test]
fn test_target_round_trips_through_json() {
    let target = Target::builder()
        .name("Web")
        .kind("local")
        .setting("dir", "/srv/www")
        .mappings(vec![PathMapping::new("src", "")])
        .build()
        .unwrap();

    let value = serde_json::to_value(&target).unwrap();
    assert_eq!(value["type"], json!("local"));
    assert_eq!(value["dir"], json!("/srv/www"));

    let back: Target = serde_json::from_value(value).unwrap();
    assert_eq!(back, target);
}

#[test]
fn test_nested_remapping_reports_leaf_destination() {
    let recorder = Arc::new(Destinations::default());
    let file = FileDescriptor::new("app.js", "src/js").with_observer(recorder.clone());

    // meta level strips "src", leaf level moves into "static"
    let meta = file.remapped(&[PathMapping::new("src", "")]).unwrap();
    let leaf = meta.remapped(&[PathMapping::new("js", "static/js")]).unwrap();
    assert_eq!(leaf.path(), "static/js");

    leaf.notify_before(Some("static/js/app.js"));
    assert_eq!(*recorder.0.lock().unwrap(), vec!["static/js/app.js"]);
}

#[tokio::test]
async fn test_upload_remap_keeps_content() {
    let upload = FileToUpload::new(
        FileDescriptor::new("a.bin", "data"),
        Arc::new(BytesSource::new(vec![1u8, 2, 3])),
    );
    let mapped = upload.remapped(&[PathMapping::new("data", "blobs")]).unwrap();

    assert_eq!(mapped.path(), "blobs");
    assert_eq!(mapped.read().await.unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_values_in_config() {
    let config = WorkspaceConfig::from_toml_str(
        r#"
[values]
root = "/srv"

[[targets]]
name = "a"
type = "local"
dir = "${root}/a"
"#,
    )
    .unwrap();

    let dir = config.targets[0].str_setting("dir").unwrap();
    assert_eq!(config.values.replace(dir), "/srv/a");
}

#[test]
fn test_mapping_errors_surface() {
    let err = apply_mappings("a", &[PathMapping::regex("[", "b")]).unwrap_err();
    assert!(matches!(err, DeployError::Config { .. }));
    assert!(!err.is_resolution());
}

#[test]
fn test_values_collect() {
    let values: Values = vec![("a".to_string(), "1".to_string())].into_iter().collect();
    assert_eq!(values.len(), 1);
    assert_eq!(values.replace("${a}${a}"), "11");
}
