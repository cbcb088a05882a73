mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Harness;
use tourly::domain::upload::UploadPolicy;
use tourly::ports::repository::ShortRepository;

const VIDEO: &[u8] = b"duration=42.5\n";

async fn upload_ok(h: &Harness) -> String {
    let (status, body) = h
        .upload(
            &[("title", "Chợ nổi Cái Răng"), ("tags", "mekong, boat,mekong"), ("province", "can-tho")],
            Some(("clip.mp4", "video/mp4", VIDEO)),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{}", body);
    assert_eq!(body["status"], "processing");
    assert!(body["slug"].as_str().unwrap().starts_with("cho-noi-cai-rang-"));
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn upload_publish_and_play() {
    let h = Harness::new();
    let id = upload_ok(&h).await;

    let (status, body) = h.json(&format!("/shorts/{}/status", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    h.run_next_job().await;

    let (_, body) = h.json(&format!("/shorts/{}/status", id)).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["videoUrl"], format!("/shorts/playlist/{}", id));

    let (_, record) = h.json(&format!("/shorts/{}", id)).await;
    assert_eq!(record["status"], "active");
    assert_eq!(record["videoUrl"], format!("shorts/{}/playlist.m3u8", id));
    assert_eq!(record["tags"], serde_json::json!(["mekong", "boat"]));
    assert_eq!(record["location"]["province"], "can-tho");

    let (status, headers, body) = h.get(&format!("/shorts/playlist/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/vnd.apple.mpegurl");
    assert_eq!(headers["cache-control"], "no-cache, no-store, must-revalidate");
    let manifest = String::from_utf8(body.to_vec()).unwrap();
    assert!(manifest.starts_with("#EXTM3U"));
    for line in manifest.lines().filter(|l| !l.is_empty() && !l.starts_with('#')) {
        assert!(line.starts_with(&format!("/shorts/segment/{}/", id)), "{}", line);
    }

    // Temporary files are gone once the job finished.
    assert_eq!(h.leftover_uploads(), 0);
    assert!(!h.transcode_dir(&id).exists());
}

#[tokio::test]
async fn segment_ranges() {
    let h = Harness::new();
    let id = upload_ok(&h).await;
    h.run_next_job().await;

    let request = Request::get(format!("/shorts/segment/{}/segment_000.ts", id))
        .header("range", "bytes=2-5")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = h.send(request).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(headers["content-range"], "bytes 2-5/10");
    assert_eq!(headers["content-length"], "4");
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(&body[..], b"2345");

    let (status, headers, body) = h.get(&format!("/shorts/segment/{}/segment_001.ts", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "video/mp2t");
    assert_eq!(&body[..], b"abcdefghij");

    let request = Request::get(format!("/shorts/segment/{}/segment_000.ts", id))
        .header("range", "bytes=50-")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = h.send(request).await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);

    let (status, _, _) = h.get(&format!("/shorts/segment/{}/segment_009.ts", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn over_long_video_leaves_nothing_behind() {
    let h = Harness::new();
    let (status, body) = h
        .upload(&[("title", "Too long")], Some(("long.mov", "video/quicktime", b"duration=120.01\n")))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VIDEO_TOO_LONG");
    assert_eq!(body["status"], 400);
    assert_eq!(h.store.short_count().await, 0);
    assert_eq!(h.leftover_uploads(), 0);
}

#[tokio::test]
async fn exactly_at_the_ceiling_is_accepted() {
    let h = Harness::new();
    let (status, _) = h
        .upload(&[("title", "Just fits")], Some(("fits.mp4", "video/mp4", b"duration=120\n")))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn intake_rejections() {
    let h = Harness::with_policy(UploadPolicy {
        max_bytes: 64,
        ..UploadPolicy::default()
    });

    let (status, body) = h.upload(&[("title", "No file")], None).await;
    assert_eq!((status, body["code"].as_str()), (StatusCode::BAD_REQUEST, Some("MISSING_FILE")));

    let (status, body) = h.upload(&[], Some(("a.mp4", "video/mp4", VIDEO))).await;
    assert_eq!((status, body["code"].as_str()), (StatusCode::BAD_REQUEST, Some("MISSING_TITLE")));

    let (status, body) = h
        .upload(&[("title", "Doc")], Some(("notes.pdf", "application/pdf", b"%PDF")))
        .await;
    assert_eq!((status, body["code"].as_str()), (StatusCode::BAD_REQUEST, Some("UNSUPPORTED_TYPE")));

    let big = vec![b'x'; 1024];
    let (status, body) = h.upload(&[("title", "Big")], Some(("big.mp4", "video/mp4", &big))).await;
    assert_eq!((status, body["code"].as_str()), (StatusCode::PAYLOAD_TOO_LARGE, Some("FILE_TOO_LARGE")));

    let (status, body) = h
        .upload(&[("title", "Garbage")], Some(("junk.mp4", "video/mp4", b"not a video")))
        .await;
    assert_eq!((status, body["code"].as_str()), (StatusCode::UNPROCESSABLE_ENTITY, Some("CORRUPT_VIDEO")));

    assert_eq!(h.store.short_count().await, 0);
    assert_eq!(h.leftover_uploads(), 0);
}

#[tokio::test]
async fn failed_transcode_is_reported_and_cleaned() {
    let h = Harness::new();
    let (status, body) = h
        .upload(&[("title", "Broken")], Some(("broken.mp4", "video/mp4", b"duration=10\nbroken\n")))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = body["id"].as_str().unwrap().to_string();

    h.run_next_job().await;

    let (_, body) = h.json(&format!("/shorts/{}/status", id)).await;
    assert_eq!(body["status"], "failed");
    assert!(body.get("videoUrl").is_none());

    let short = h.store.get(&id).await.unwrap().unwrap();
    assert!(short.deleted_at.is_some());

    let (status, _, _) = h.get(&format!("/shorts/playlist/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.leftover_uploads(), 0);
    assert!(!h.transcode_dir(&id).exists());
}

#[tokio::test]
async fn same_title_uploads_in_a_burst_all_accepted() {
    let h = Harness::new();
    let ids = futures::future::join_all((0..16).map(|_| upload_ok(&h))).await;

    let mut slugs = std::collections::HashSet::new();
    for id in &ids {
        let short = h.store.get(id).await.unwrap().unwrap();
        assert!(short.slug.starts_with("cho-noi-cai-rang-"));
        assert!(slugs.insert(short.slug), "duplicate slug for {}", id);
    }
    assert_eq!(slugs.len(), 16);
}

#[tokio::test]
async fn concurrent_uploads_are_isolated() {
    let h = Harness::new();
    let (a, b) = tokio::join!(upload_ok(&h), upload_ok(&h));
    assert_ne!(a, b);

    tokio::join!(h.run_next_job(), h.run_next_job());

    for id in [&a, &b] {
        let (_, body) = h.json(&format!("/shorts/{}/status", id)).await;
        assert_eq!(body["status"], "completed");
        assert!(h.bucket().join("shorts").join(id).join("playlist.m3u8").exists());
    }
    assert_eq!(h.leftover_uploads(), 0);
}

#[tokio::test]
async fn interactions_count_on_active_shorts() {
    let h = Harness::new();
    let id = upload_ok(&h).await;

    let like = |id: String| Request::post(format!("/shorts/{}/interactions/like", id)).body(Body::empty()).unwrap();

    let (status, _, _) = h.send(like(id.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    h.run_next_job().await;

    let (status, _, body) = h.send(like(id.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["kind"], "likes");
    assert_eq!(body["value"], 1);

    let request = Request::post(format!("/shorts/{}/interactions/dislike", id)).body(Body::empty()).unwrap();
    let (status, _, _) = h.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_short_is_not_found() {
    let h = Harness::new();
    let (status, body) = h.json("/shorts/nope/status").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = h.json("/shorts/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
