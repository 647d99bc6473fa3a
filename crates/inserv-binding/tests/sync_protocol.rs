//! Integration tests for the bidirectional sync protocol.
//!
//! These tests drive a full tree over the mock gateway and count remote
//! writes to verify that edits write exactly once and notifications never
//! write.

use inserv_binding::{assemble, AssemblyOptions, BindingError, ControlEdit, ControlTree};
use inserv_core::{AttributeDescriptor, AttributeValue, DeviceRef, NumericSpec, Quantity};
use inserv_mock::{MockDevice, MockGateway};
use std::sync::Arc;

fn dmm() -> DeviceRef {
    DeviceRef::new("bench", "dmm")
}

fn gateway() -> Arc<MockGateway> {
    let gw = Arc::new(MockGateway::new());
    gw.add_device(
        dmm(),
        MockDevice::new()
            .with_attribute(
                AttributeDescriptor::numeric(
                    "range",
                    NumericSpec::float().with_unit("V").with_bounds(0.1, 1000.0),
                ),
                Quantity::new(10.0, "V"),
            )
            .with_attribute(
                AttributeDescriptor::enumerated("coupling", ["dc", "ac"]),
                "dc",
            )
            .with_attribute(AttributeDescriptor::text("label"), "probe A"),
    );
    gw
}

async fn tree(gw: &Arc<MockGateway>) -> ControlTree {
    assemble(gw.clone(), &AssemblyOptions::default()).await.unwrap()
}

#[tokio::test]
async fn test_edit_writes_once_and_echo_does_not_write_again() {
    let gw = gateway();
    let mut tree = tree(&gw).await;

    tree.commit("bench/dmm/range", ControlEdit::Number(100.0))
        .await
        .unwrap();
    assert_eq!(gw.write_count(&dmm(), "range"), 1);

    // The mock echoes the write back as a change notification.
    assert_eq!(tree.process_notifications(), 1);
    assert_eq!(gw.write_count(&dmm(), "range"), 1);

    let binding = tree.binding("bench/dmm/range").unwrap();
    assert_eq!(binding.control().stepper_value(), Some(100.0));
    assert_eq!(
        binding.current_value(),
        &AttributeValue::Quantity(Quantity::new(100.0, "V"))
    );

    tree.teardown().await;
}

#[tokio::test]
async fn test_change_from_another_client_updates_display_only() {
    let gw = gateway();
    let mut tree = tree(&gw).await;

    gw.drive_attribute(&dmm(), "coupling", "ac").unwrap();
    gw.drive_attribute(&dmm(), "range", Quantity::new(2.0, "kV"))
        .unwrap();
    assert_eq!(tree.process_notifications(), 2);

    assert_eq!(
        tree.binding("bench/dmm/coupling")
            .unwrap()
            .control()
            .selected_index(),
        Some(1)
    );
    assert_eq!(
        tree.binding("bench/dmm/range").unwrap().control().stepper_value(),
        Some(2000.0)
    );
    assert_eq!(gw.write_count(&dmm(), "coupling"), 0);
    assert_eq!(gw.write_count(&dmm(), "range"), 0);

    tree.teardown().await;
}

#[tokio::test]
async fn test_failed_write_keeps_edit_on_display() {
    let gw = gateway();
    gw.reject_writes(&dmm(), "label", "front panel locked");
    let mut tree = tree(&gw).await;

    let err = tree
        .commit("bench/dmm/label", ControlEdit::Text("probe B".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, BindingError::RemoteWrite { .. }));
    assert!(err.is_recoverable());

    let binding = tree.binding("bench/dmm/label").unwrap();
    assert_eq!(binding.control().display_text(), "probe B");
    assert!(binding.control().error().is_some());
    assert_eq!(binding.current_value(), &AttributeValue::from("probe A"));

    // A later remote change still reaches the control and clears the flag.
    gw.drive_attribute(&dmm(), "label", "probe C").unwrap();
    tree.process_notifications();
    let binding = tree.binding("bench/dmm/label").unwrap();
    assert_eq!(binding.control().display_text(), "probe C");
    assert!(binding.control().error().is_none());

    tree.teardown().await;
}

#[tokio::test]
async fn test_committed_numbers_are_clamped_before_write() {
    let gw = gateway();
    let mut tree = tree(&gw).await;

    tree.commit("bench/dmm/range", ControlEdit::Number(5000.0))
        .await
        .unwrap();
    tree.commit("bench/dmm/range", ControlEdit::Number(0.0))
        .await
        .unwrap();
    assert_eq!(
        gw.writes(&dmm(), "range"),
        vec![
            AttributeValue::Quantity(Quantity::new(1000.0, "V")),
            AttributeValue::Quantity(Quantity::new(0.1, "V")),
        ]
    );

    tree.teardown().await;
}

#[tokio::test]
async fn test_changes_from_gateway_threads_are_applied_on_owner() {
    let gw = gateway();
    let mut tree = tree(&gw).await;

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let gw = gw.clone();
            std::thread::spawn(move || {
                gw.drive_attribute(&dmm(), "label", format!("thread {i}"))
                    .unwrap();
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(tree.process_notifications(), 4);
    let shown = tree
        .binding("bench/dmm/label")
        .unwrap()
        .control()
        .display_text();
    assert!(shown.starts_with("thread "));
    assert_eq!(gw.write_count(&dmm(), "label"), 0);

    tree.teardown().await;
}

#[tokio::test]
async fn test_next_notification_waits_for_remote_change() {
    let gw = gateway();
    let mut tree = tree(&gw).await;

    let driver = gw.clone();
    std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        driver.drive_attribute(&dmm(), "coupling", "ac").unwrap();
    });

    let (change, applied) = tree.next_notification().await.unwrap();
    assert!(applied);
    assert_eq!(change.value, AttributeValue::from("ac"));
    assert_eq!(
        tree.path_of(change.binding).unwrap().to_string(),
        "bench/dmm/coupling"
    );

    tree.teardown().await;
}
