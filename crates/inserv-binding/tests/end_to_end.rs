//! End-to-end: a signal generator with a frequency, a mode and a trigger.

use inserv_binding::{
    assemble, AssemblyOptions, ControlEdit, ControlKind, ControlSpec, StepperBounds,
};
use inserv_core::{AttributeDescriptor, AttributeValue, DeviceRef, NumericSpec, Quantity};
use inserv_mock::{BenchConfig, MockDevice, MockGateway};
use std::sync::Arc;

fn sig_gen() -> DeviceRef {
    DeviceRef::new("local", "sig_gen")
}

#[tokio::test]
async fn test_signal_generator_tree() {
    let gw = Arc::new(MockGateway::new());
    gw.add_device(
        sig_gen(),
        MockDevice::new()
            .with_attribute(
                AttributeDescriptor::numeric(
                    "frequency",
                    NumericSpec::float().with_unit("Hz").with_bounds(0.0, 1e9),
                ),
                Quantity::new(1.0, "kHz"),
            )
            .with_attribute(
                AttributeDescriptor::enumerated("mode", ["auto", "manual"]),
                "auto",
            )
            .with_action("trigger"),
    );

    let mut tree = assemble(gw.clone(), &AssemblyOptions::default())
        .await
        .unwrap();
    let device = &tree.servers()[0].devices()[0];
    assert_eq!(device.attributes().len(), 2);
    assert_eq!(device.actions().len(), 1);

    match tree.binding("local/sig_gen/frequency").unwrap().control().spec() {
        ControlSpec::Stepper { spec, value } => {
            assert_eq!(spec.suffix.as_deref(), Some("Hz"));
            assert_eq!(spec.bounds, StepperBounds::Range { min: 0.0, max: 1e9 });
            assert!((value - 1000.0).abs() < 1e-9);
        }
        other => panic!("expected a stepper, got {other:?}"),
    }
    match tree.binding("local/sig_gen/mode").unwrap().control().spec() {
        ControlSpec::Choice { labels, selected } => {
            assert_eq!(labels, &["auto", "manual"]);
            assert_eq!(*selected, 0);
        }
        other => panic!("expected a choice, got {other:?}"),
    }

    tree.activate("local/sig_gen/trigger").await.unwrap();
    assert_eq!(gw.invoke_count(&sig_gen(), "trigger"), 1);
    tree.activate("local/sig_gen/trigger").await.unwrap();
    assert_eq!(gw.invoke_count(&sig_gen(), "trigger"), 2);

    tree.commit("local/sig_gen/mode", ControlEdit::Select(1))
        .await
        .unwrap();
    assert_eq!(gw.writes(&sig_gen(), "mode"), vec![AttributeValue::from("manual")]);

    let report = tree.teardown().await;
    assert_eq!(report.released, 2);
    assert_eq!(gw.total_subscriptions(), 0);
}

#[tokio::test]
async fn test_demo_bench_assembles_in_gateway_order() {
    let gw = Arc::new(BenchConfig::demo().unwrap().into_gateway().unwrap());
    let mut tree = assemble(gw.clone(), &AssemblyOptions::default())
        .await
        .unwrap();

    assert!(tree.report().failures.is_empty());
    let paths: Vec<String> = tree.bindings().map(|(p, _)| p.to_string()).collect();
    assert_eq!(
        paths,
        [
            "local/sig_gen/frequency",
            "local/sig_gen/amplitude",
            "local/sig_gen/mode",
            "local/sig_gen/idn",
            "local/laser/wavelength",
            "local/laser/emission",
            "local/laser/status",
            "remote/lockin/time_constant",
            "remote/lockin/harmonic",
            "remote/lockin/label",
        ]
    );

    let sig_gen_actions: Vec<&str> = tree.servers()[0].devices()[0]
        .actions()
        .iter()
        .map(|t| t.name())
        .collect();
    assert_eq!(sig_gen_actions, ["trigger", "reset"]);

    let kinds: Vec<ControlKind> = tree.bindings().map(|(_, b)| b.control().kind()).collect();
    assert_eq!(kinds[3], ControlKind::ReadOnlyText);
    assert_eq!(kinds[6], ControlKind::ReadOnlyText);
    assert_eq!(kinds[9], ControlKind::Text);

    let amplitude = tree.binding("local/sig_gen/amplitude").unwrap();
    assert!((amplitude.control().stepper_value().unwrap() - 0.25).abs() < 1e-12);

    tree.teardown().await;
}
