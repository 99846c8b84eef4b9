use scxq2_canonical::SessionId;
use scxq2_core::CaptureService;
use scxq2_journal::{FrameKind, FramePayload, RouteStartPayload};
use serde_json::json;
use std::sync::Arc;
use std::thread;

fn make_service() -> CaptureService {
    CaptureService::new(SessionId::parse("cap").unwrap())
}

fn route(path: &str) -> FramePayload {
    FramePayload::RouteStart(RouteStartPayload {
        path: path.into(),
        method: "POST".into(),
        handler: "K041".into(),
    })
}

fn paths(service: &CaptureService, handle: &scxq2_core::StreamHandle) -> Vec<String> {
    service
        .export(handle)
        .unwrap()
        .frames
        .iter()
        .filter_map(|f| match &f.payload {
            FramePayload::RouteStart(p) => Some(p.path.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_broadcast_reaches_every_open_stream_in_order() {
    let service = make_service();
    let a = service.begin(json!({})).unwrap();
    let b = service.begin(json!({})).unwrap();

    assert_eq!(service.broadcast(route("/one")).unwrap(), 2);
    assert_eq!(service.broadcast(route("/two")).unwrap(), 2);

    assert_eq!(paths(&service, &a), vec!["/one", "/two"]);
    assert_eq!(paths(&service, &b), vec!["/one", "/two"]);
}

#[test]
fn test_broadcast_skips_ended_streams() {
    let service = make_service();
    let a = service.begin(json!({})).unwrap();
    let b = service.begin(json!({})).unwrap();
    service.end(&a, json!({})).unwrap();

    assert_eq!(service.broadcast(route("/late")).unwrap(), 1);
    assert!(paths(&service, &a).is_empty());
    assert_eq!(paths(&service, &b), vec!["/late"]);
}

#[test]
fn test_capture_after_end_is_noop() {
    let service = make_service();
    let a = service.begin(json!({})).unwrap();
    service.end(&a, json!({})).unwrap();
    let before = service.export(&a).unwrap();

    assert!(service.capture(&a, route("/late")).unwrap().is_none());
    assert_eq!(service.export(&a).unwrap(), before);
    assert_eq!(before.frames.last().unwrap().kind(), FrameKind::Terminator);
}

#[test]
fn test_targeted_capture_touches_one_stream() {
    let service = make_service();
    let a = service.begin(json!({})).unwrap();
    let b = service.begin(json!({})).unwrap();
    service.capture(&b, route("/only-b")).unwrap();
    assert!(paths(&service, &a).is_empty());
    assert_eq!(paths(&service, &b), vec!["/only-b"]);
}

#[test]
fn test_export_all_in_creation_order() {
    let service = make_service();
    for _ in 0..3 {
        service.begin(json!({})).unwrap();
    }
    let ids: Vec<String> = service
        .export_all()
        .into_iter()
        .map(|s| s.stream_id)
        .collect();
    assert_eq!(ids, vec!["cap:0", "cap:1", "cap:2"]);
    assert_eq!(service.open_handles().len(), 3);
}

#[test]
fn test_concurrent_captures_keep_each_writer_ordered() {
    let service = Arc::new(make_service());
    let stream = service.begin(json!({})).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let service = Arc::clone(&service);
            let stream = stream.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    service
                        .capture(&stream, route(&format!("/w{}/{}", w, i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let snapshot = service.export(&stream).unwrap();
    assert_eq!(snapshot.frames.len(), 101);
    let ticks: Vec<u32> = snapshot.frames.iter().map(|f| f.tick).collect();
    assert_eq!(ticks, (0..101).collect::<Vec<u32>>());

    let all = paths(&service, &stream);
    for w in 0..4 {
        let own: Vec<&String> = all
            .iter()
            .filter(|p| p.starts_with(&format!("/w{}/", w)))
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("/w{}/{}", w, i)).collect();
        assert_eq!(own, expected.iter().collect::<Vec<_>>());
    }
    assert!(scxq2_core::verify_chain(&snapshot.frames).unwrap().is_ok());
}
