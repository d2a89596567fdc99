use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use busline_api::{app, AppState};
use busline_booking::fixtures::{self, B1, S1};
use busline_booking::MemoryStore;
use busline_core::{BookingPolicy, ManualClock};
use busline_shared::SeatStatus;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup(now: &str) -> (Router, MemoryStore, Arc<ManualClock>) {
    let store = fixtures::seeded_store().await;
    let clock = fixtures::clock_at(now);
    let state = AppState::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        clock.clone(),
        BookingPolicy::default(),
    );
    (app(state), store, clock)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_book(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/book")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn book(user: &str, row: &str, column: i32) -> Value {
    json!({ "scheduleId": S1, "userId": user, "rNumber": row, "columnNumber": column })
}

#[tokio::test]
async fn test_seat_map_shape() {
    let (app, _, _) = setup("2024-01-10 09:00").await;

    let (status, body) = send(&app, get("/seats/1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seats"].as_array().unwrap().len(), 55);
    assert_eq!(body["busInfo"]["busName"], "Green Line");
    assert_eq!(body["busInfo"]["time"], "10:00:00");
    assert_eq!(body["busInfo"]["driver"]["phone"], "01700000001");
    assert_eq!(body["alreadyBooked"], false);
    assert!(body.get("bookedSeat").is_none());
}

#[tokio::test]
async fn test_seat_map_unknown_schedule_is_404() {
    let (app, _, _) = setup("2024-01-10 09:00").await;

    let (status, body) = send(&app, get("/seats/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, body) = send(&app, get("/seats/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_booking_flow_end_to_end() {
    let (app, store, clock) = setup("2024-01-10 09:00").await;

    // U1 takes A1
    let (status, body) = send(&app, post_book(book("U1", "A", 1))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["msg"], "Seat booked successfully!");

    let (_, body) = send(&app, get("/seats/1?userId=U1")).await;
    assert_eq!(body["alreadyBooked"], true);
    assert_eq!(body["bookedSeat"], json!({ "rNumber": "A", "columnNumber": 1 }));

    // U2 loses the race for A1
    let (status, body) = send(&app, post_book(book("U2", "A", 1))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "seat_unavailable");
    assert_eq!(body["msg"], "Seat is already booked or unavailable");

    // U1 moves to B2
    let mut edit = book("U1", "B", 2);
    edit["oldRNumber"] = json!("A");
    edit["oldColumnNumber"] = json!(1);
    let (status, body) = send(&app, post_book(edit)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["msg"], "Booking updated successfully!");
    assert_eq!(store.seat_status(B1, &"A1".parse().unwrap()).await, Some(SeatStatus::Available));
    assert_eq!(store.seat_status(B1, &"B2".parse().unwrap()).await, Some(SeatStatus::Unavailable));

    // Past the grace window the trip can no longer be booked
    clock.set(fixtures::local("2024-01-10 10:16").and_utc());
    let (status, body) = send(&app, post_book(book("U3", "C", 3))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "trip_departed");
}

#[tokio::test]
async fn test_same_time_conflict() {
    let (app, store, _) = setup("2024-01-10 09:00").await;
    fixtures::add_schedule(&store, 2, B1, "2024-01-11 10:00").await;

    send(&app, post_book(book("U1", "A", 1))).await;
    let (status, body) = send(
        &app,
        post_book(json!({ "scheduleId": 2, "userId": "U1", "rNumber": "D", "columnNumber": 4 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "time_conflict");
    assert_eq!(body["msg"], "You already have a booking at this time.");
}

#[tokio::test]
async fn test_validation_failures_are_400() {
    let (app, store, _) = setup("2024-01-10 09:00").await;

    let (status, body) = send(&app, post_book(json!({ "scheduleId": S1, "userId": "U1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["msg"], "Missing required fields");

    let mut half = book("U1", "B", 2);
    half["oldRNumber"] = json!("A");
    let (status, _) = send(&app, post_book(half)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method("POST")
        .uri("/book")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    assert_eq!(store.booking_count().await, 0);
}

#[tokio::test]
async fn test_storage_failure_is_500_and_rolls_back() {
    let (app, store, _) = setup("2024-01-10 09:00").await;

    store.fail_next_seat_update();
    let (status, body) = send(&app, post_book(book("U1", "A", 1))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "msg": "Internal Server Error", "kind": "internal" }));
    assert_eq!(store.booking_count().await, 0);
}

#[tokio::test]
async fn test_failed_edit_is_500_and_keeps_old_seat() {
    let (app, store, _) = setup("2024-01-10 09:00").await;
    send(&app, post_book(book("U1", "A", 1))).await;

    store.fail_next_seat_update();
    let mut edit = book("U1", "B", 2);
    edit["oldRNumber"] = json!("A");
    edit["oldColumnNumber"] = json!(1);
    let (status, body) = send(&app, post_book(edit)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "internal");
    assert_eq!(store.bookings_on(S1).await[0].seat.to_string(), "A1");
    assert_eq!(store.seat_status(B1, &"A1".parse().unwrap()).await, Some(SeatStatus::Unavailable));
    assert_eq!(store.seat_status(B1, &"B2".parse().unwrap()).await, Some(SeatStatus::Available));
}

#[tokio::test]
async fn test_my_bookings_partition() {
    let (app, store, clock) = setup("2024-01-09 06:00").await;
    fixtures::add_schedule(&store, 2, B1, "2024-01-09 07:00").await;

    send(&app, post_book(book("U1", "A", 1))).await;
    send(
        &app,
        post_book(json!({ "scheduleId": 2, "userId": "U1", "rNumber": "B", "columnNumber": 1 })),
    )
    .await;

    // S1 left 30 minutes ago, schedule 2 a day earlier
    clock.set(fixtures::local("2024-01-10 10:30").and_utc());
    let (status, body) = send(&app, get("/mybookings/U1")).await;

    assert_eq!(status, StatusCode::OK);
    let upcoming = body["upcoming"].as_array().unwrap();
    let history = body["history"].as_array().unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0]["scheduleId"], S1);
    assert_eq!(upcoming[0]["busName"], "Green Line");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["scheduleId"], 2);
    assert_eq!(history[0]["rNumber"], "B");

    let (_, body) = send(&app, get("/mybookings/nobody")).await;
    assert_eq!(body, json!({ "upcoming": [], "history": [] }));
}

#[tokio::test]
async fn test_health() {
    let (app, _, _) = setup("2024-01-10 09:00").await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
