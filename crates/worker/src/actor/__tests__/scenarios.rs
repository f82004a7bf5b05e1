//! End-to-end scenarios through the full worker loop.

use std::time::Duration;

use vantage_core::geo::{Bounds, Coordinate};

use super::helpers::{
  FakeDeviceIndex, WorkerTestContext, device_photo, device_source, doc_photo, document_source, munich_bounds,
  seeded_documents,
};
use crate::ipc::HostRequest;

fn area_updated(bounds: Bounds, message_id: u64) -> HostRequest {
  HostRequest::AreaUpdated {
    bounds,
    range: None,
    message_id,
  }
}

#[tokio::test]
async fn test_device_source_loads_into_viewport() {
  let device = FakeDeviceIndex::new(vec![
    device_photo("d1", 48.10, 11.10),
    device_photo("d2", 48.12, 11.20),
    device_photo("d3", 48.05, 11.05),
    // outside the viewport
    device_photo("d4", 50.00, 11.10),
  ]);
  let mut ctx = WorkerTestContext::spawn(device, seeded_documents(&[]));

  ctx
    .handle
    .send(HostRequest::ConfigUpdated {
      sources: vec![device_source("device")],
      message_id: 1,
    })
    .await
    .expect("send config");
  ctx.handle.send(area_updated(munich_bounds(), 1)).await.expect("send area");

  let (area, range) = ctx.photos_update_matching(|area, _| area.len() == 3).await;
  assert!(area.iter().all(|p| p.id != "d4"));
  // every range photo is also an area photo
  for p in &range {
    assert!(area.iter().any(|a| a.same_photo(p)));
  }
}

#[tokio::test]
async fn test_two_sources_merge_then_shrinking_bounds_excludes() {
  // source "alpha" contributes 3 photos in the west, "beta" 2 in the east
  let documents = seeded_documents(&[
    (
      "alpha",
      vec![
        doc_photo("a1", "alpha", 48.05, 11.02, 10.0),
        doc_photo("a2", "alpha", 48.10, 11.04, 120.0),
        doc_photo("a3", "alpha", 48.15, 11.06, 240.0),
      ],
    ),
    (
      "beta",
      vec![
        doc_photo("b1", "beta", 48.05, 11.25, 60.0),
        doc_photo("b2", "beta", 48.10, 11.28, 300.0),
      ],
    ),
  ]);
  let mut ctx = WorkerTestContext::spawn(FakeDeviceIndex::empty(), documents);

  ctx
    .handle
    .send(HostRequest::ConfigUpdated {
      sources: vec![document_source("alpha", true), document_source("beta", true)],
      message_id: 1,
    })
    .await
    .expect("send config");
  ctx.handle.send(area_updated(munich_bounds(), 1)).await.expect("send area");

  // both sources merged: 5 photos before any cap bites
  let (area, _) = ctx.photos_update_matching(|area, _| area.len() == 5).await;
  assert_eq!(area.iter().filter(|p| p.source_id.as_str() == "alpha").count(), 3);
  assert_eq!(area.iter().filter(|p| p.source_id.as_str() == "beta").count(), 2);

  // shrink the viewport to the east half: alpha's photos drop out
  let east = Bounds::new(Coordinate::new(48.2, 11.2), Coordinate::new(48.0, 11.3));
  ctx.handle.send(area_updated(east, 2)).await.expect("send area");

  let (area, _) = ctx.photos_update_matching(|area, _| area.len() == 2).await;
  assert!(area.iter().all(|p| p.source_id.as_str() == "beta"));
}

#[tokio::test]
async fn test_disabling_a_source_removes_its_photos() {
  let documents = seeded_documents(&[(
    "alpha",
    vec![
      doc_photo("a1", "alpha", 48.05, 11.02, 10.0),
      doc_photo("a2", "alpha", 48.10, 11.04, 120.0),
    ],
  )]);
  let mut ctx = WorkerTestContext::spawn(FakeDeviceIndex::empty(), documents);

  ctx
    .handle
    .send(HostRequest::ConfigUpdated {
      sources: vec![document_source("alpha", true)],
      message_id: 1,
    })
    .await
    .expect("send config");
  ctx.handle.send(area_updated(munich_bounds(), 1)).await.expect("send area");
  ctx.photos_update_matching(|area, _| area.len() == 2).await;

  // same source, now disabled: the next combine pass must drop its photos
  ctx
    .handle
    .send(HostRequest::ConfigUpdated {
      sources: vec![document_source("alpha", false)],
      message_id: 2,
    })
    .await
    .expect("send config");

  ctx.photos_update_matching(|area, _| area.is_empty()).await;
}

#[tokio::test]
async fn test_remove_photo_and_user_photos() {
  let documents = seeded_documents(&[(
    "alpha",
    vec![
      doc_photo("a1", "alpha", 48.05, 11.02, 10.0),
      doc_photo("a2", "alpha", 48.10, 11.04, 120.0),
      doc_photo("a3", "alpha", 48.15, 11.06, 240.0),
    ],
  )]);
  let mut ctx = WorkerTestContext::spawn(FakeDeviceIndex::empty(), documents);

  ctx
    .handle
    .send(HostRequest::ConfigUpdated {
      sources: vec![document_source("alpha", true)],
      message_id: 1,
    })
    .await
    .expect("send config");
  ctx.handle.send(area_updated(munich_bounds(), 1)).await.expect("send area");
  ctx.photos_update_matching(|area, _| area.len() == 3).await;

  ctx
    .handle
    .send(HostRequest::RemovePhoto {
      photo_id: "a2".to_string(),
      source: "alpha".into(),
    })
    .await
    .expect("send remove");

  let (area, _) = ctx.photos_update_matching(|area, _| area.len() == 2).await;
  assert!(area.iter().all(|p| p.id != "a2"));
}

#[tokio::test]
async fn test_range_set_is_sorted_by_bearing() {
  let center = munich_bounds().center();
  let documents = seeded_documents(&[(
    "alpha",
    vec![
      doc_photo("w", "alpha", center.lat, center.lng - 0.0001, 270.0),
      doc_photo("n", "alpha", center.lat + 0.0001, center.lng, 0.0),
      doc_photo("s", "alpha", center.lat - 0.0001, center.lng, 180.0),
      doc_photo("e", "alpha", center.lat, center.lng + 0.0001, 90.0),
    ],
  )]);
  let mut ctx = WorkerTestContext::spawn(FakeDeviceIndex::empty(), documents);

  ctx
    .handle
    .send(HostRequest::ConfigUpdated {
      sources: vec![document_source("alpha", true)],
      message_id: 1,
    })
    .await
    .expect("send config");
  ctx
    .handle
    .send(HostRequest::AreaUpdated {
      bounds: munich_bounds(),
      range: Some(1000.0),
      message_id: 1,
    })
    .await
    .expect("send area");

  let (_, range) = ctx.photos_update_matching(|_, range| range.len() == 4).await;
  let bearings: Vec<f64> = range.iter().map(|p| p.bearing).collect();
  assert_eq!(bearings, vec![0.0, 90.0, 180.0, 270.0]);
}

#[tokio::test]
async fn test_malformed_config_is_rejected_with_a_toast() {
  let mut ctx = WorkerTestContext::spawn(FakeDeviceIndex::empty(), seeded_documents(&[]));

  // stream source without an endpoint
  let bad = vantage_core::source::SourceConfig {
    id: "broken".into(),
    kind: vantage_core::source::SourceKind::Stream,
    enabled: true,
    endpoint: None,
    max_photos: None,
  };
  ctx
    .handle
    .send(HostRequest::ConfigUpdated {
      sources: vec![bad],
      message_id: 1,
    })
    .await
    .expect("send config");

  let toast = tokio::time::timeout(Duration::from_secs(5), async {
    loop {
      match ctx.events.recv().await {
        Some(crate::ipc::WorkerEvent::Toast { level, message, .. }) => return (level, message),
        Some(_) => continue,
        None => panic!("worker event channel closed"),
      }
    }
  })
  .await
  .expect("timed out waiting for toast");
  assert_eq!(toast.0, crate::ipc::ToastLevel::Error);
  assert!(toast.1.contains("endpoint"), "unexpected toast: {}", toast.1);
}

#[tokio::test]
async fn test_cleanup_stops_the_worker() {
  let ctx = WorkerTestContext::spawn(FakeDeviceIndex::empty(), seeded_documents(&[]));

  ctx.handle.cleanup().await.expect("send cleanup");

  // the worker drops its inbound channel on exit
  tokio::time::timeout(Duration::from_secs(2), async {
    loop {
      if ctx.handle.cleanup().await.is_err() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
  })
  .await
  .expect("worker should stop after cleanup");
}
