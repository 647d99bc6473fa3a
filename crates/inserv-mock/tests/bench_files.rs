//! Integration tests for bench loading and the gateway it produces.

use inserv_core::{AttributeValue, DeviceRef, Gateway, Quantity, ValueKind};
use inserv_mock::BenchConfig;
use std::io::Write;

#[tokio::test]
async fn test_demo_bench_serves_namespace_in_order() {
    let gateway = BenchConfig::demo().unwrap().into_gateway().unwrap();

    assert_eq!(gateway.list_servers().await.unwrap(), vec!["local", "remote"]);
    assert_eq!(
        gateway.list_devices("local").await.unwrap(),
        vec!["sig_gen", "laser"]
    );

    let sig_gen = DeviceRef::new("local", "sig_gen");
    let names: Vec<String> = gateway
        .list_attributes(&sig_gen)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(names, ["frequency", "amplitude", "mode", "idn"]);

    assert_eq!(
        gateway.get_attribute(&sig_gen, "frequency").await.unwrap(),
        AttributeValue::Quantity(Quantity::new(2.5, "MHz"))
    );
}

#[tokio::test]
async fn test_bench_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[servers]]
name = "bench"

[[servers.devices]]
name = "psu"
actions = ["output_on"]

[[servers.devices.attributes]]
name = "voltage"
kind = "numeric"
unit = "V"
min = 0.0
value = 5.0
"#
    )
    .unwrap();

    let bench = BenchConfig::load(file.path()).unwrap();
    let gateway = bench.into_gateway().unwrap();
    let psu = DeviceRef::new("bench", "psu");

    let descriptors = gateway.list_attributes(&psu).await.unwrap();
    match &descriptors[0].kind {
        ValueKind::Numeric(spec) => {
            assert_eq!(spec.lower_bound, Some(0.0));
            assert_eq!(spec.upper_bound, None);
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(gateway.list_actions(&psu).await.unwrap()[0].name, "output_on");
}

#[test]
fn test_missing_bench_file() {
    let err = BenchConfig::load(std::path::Path::new("/nonexistent/bench.toml")).unwrap_err();
    assert!(err.to_string().contains("Bench file not found"));
}
