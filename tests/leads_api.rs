mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::Harness;
use serde_json::json;
use tourly::domain::airports::Airport;
use tourly::ports::repository::AirportRepository;

fn consultation(body: serde_json::Value) -> Request<Body> {
    Request::post("/consultations")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let h = Harness::new();
    let (status, body) = h.json("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn repeated_consultations_increment() {
    let h = Harness::new();
    let payload = json!({ "fullName": "Nguyễn Văn A", "phoneNumber": "0912 345 678", "tourId": "tour-1" });

    let (status, _, body) = h.send(consultation(payload.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let first: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(first["count"], 1);
    assert_eq!(first["phoneNumber"], "0912345678");

    let same_number = json!({ "fullName": "Nguyễn Văn A", "phoneNumber": "0912-345-678", "tourId": "tour-1", "note": "weekend" });
    let (status, _, body) = h.send(consultation(same_number)).await;
    assert_eq!(status, StatusCode::OK);
    let second: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(second["id"], first["id"]);
    assert_eq!(second["count"], 2);
    assert_eq!(second["note"], "weekend");
}

#[tokio::test]
async fn invalid_consultations_are_rejected() {
    let h = Harness::new();
    for payload in [
        json!({ "fullName": "", "phoneNumber": "0912345678", "tourId": "t" }),
        json!({ "fullName": "B", "phoneNumber": "12", "tourId": "t" }),
        json!({ "fullName": "B", "phoneNumber": "0912345678" }),
    ] {
        let (status, _, body) = h.send(consultation(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], "INVALID_CONSULTATION");
    }
}

#[tokio::test]
async fn airport_search_and_nearest() {
    let h = Harness::new();
    let airport = |code: &str, name: &str, city: &str, lat: f64, lon: f64| Airport {
        code: code.to_string(),
        name: name.to_string(),
        city: city.to_string(),
        country: "Việt Nam".to_string(),
        latitude: lat,
        longitude: lon,
        keywords: vec![],
    };
    h.store
        .upsert_many(vec![
            airport("SGN", "Tân Sơn Nhất", "Hồ Chí Minh", 10.8188, 106.6520),
            airport("HAN", "Nội Bài", "Hà Nội", 21.2212, 105.8072),
            airport("DAD", "Đà Nẵng", "Đà Nẵng", 16.0439, 108.1993),
        ])
        .await
        .unwrap();

    let (status, body) = h.json("/airports/search?q=da%20nang").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["code"], "DAD");

    let (_, body) = h.json("/airports/search?q=ha").await;
    let codes: Vec<&str> = body.as_array().unwrap().iter().map(|a| a["code"].as_str().unwrap()).collect();
    assert_eq!(codes, vec!["HAN"]);

    let (status, body) = h.json("/airports/nearest?lat=10.77&lon=106.70&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["code"], "SGN");
    assert_eq!(body[1]["code"], "DAD");
    assert!(body[0]["distanceKm"].as_f64().unwrap() < 10.0);

    let (status, body) = h.json("/airports/nearest?lat=100&lon=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_QUERY");
}
