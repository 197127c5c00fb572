//! End-to-end tests driving the router the way a client would: open a
//! session, upload two files from independent requests, follow the status
//! redirect, download the result.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::util::ServiceExt;

use twodiff_server::config::Config;
use twodiff_server::routes;
use twodiff_server::state::AppState;

const BOUNDARY: &str = "x-twodiff-test-boundary";

fn test_app(output_dir: &std::path::Path, timeout: Duration) -> Router {
    let mut config = Config::default();
    config.upload.output_dir = output_dir.to_path_buf();
    config.upload.timeout = timeout;
    // the alignment scenario pairs strictly by position, any line quality
    config.diff.lookup_distance = 1;
    config.diff.similarity_threshold = 0.0;
    routes::router(AppState::new(config))
}

fn upload_request(session_id: &str, file_name: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         \r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri(format!("/upload/{session_id}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn open_session(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_text(response).await
}

/// Issue both uploads, first from its own task so the requests are in flight
/// together the way two independent clients would be.
async fn upload_pair(
    app: &Router,
    session_id: &str,
    first: (&str, &str),
    second: (&str, &str),
) -> (Response, Response) {
    let first_task = tokio::spawn({
        let app = app.clone();
        let request = upload_request(session_id, first.0, first.1);
        async move { app.oneshot(request).await.unwrap() }
    });

    // let the first upload claim the session before its partner arrives
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second_response = app
        .clone()
        .oneshot(upload_request(session_id, second.0, second.1))
        .await
        .unwrap();
    let first_response = first_task.await.unwrap();

    (first_response, second_response)
}

#[tokio::test]
async fn health_and_ping_answer() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_secs(5));

    let health = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let ping = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/ping")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ping.status(), StatusCode::OK);
    assert_eq!(body_text(ping).await, "pong");
}

#[tokio::test]
async fn uploads_pair_and_produce_a_diff() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_secs(5));
    let id = open_session(&app).await;

    let (first, second) = upload_pair(
        &app,
        &id,
        ("left.txt", "a\nb\nc\n"),
        ("right.txt", "a\nx\nc\n"),
    )
    .await;

    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(body_text(first).await, "First file OK");
    assert_eq!(second.status(), StatusCode::CREATED);
    assert_eq!(body_text(second).await, "Second file OK");

    let status = app.clone().oneshot(get(&format!("/upload/{id}"))).await.unwrap();
    assert_eq!(status.status(), StatusCode::FOUND);
    let location = status.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert_eq!(location, format!("/static/output/left.txt_right.txt_{id}"));

    let result = app.clone().oneshot(get(&location)).await.unwrap();
    assert_eq!(result.status(), StatusCode::OK);
    assert_eq!(body_text(result).await, "a\nb=>x\nc\n");
}

#[tokio::test]
async fn empty_first_file_reports_every_right_line() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_secs(5));
    let id = open_session(&app).await;

    let (first, second) =
        upload_pair(&app, &id, ("empty.txt", ""), ("rest.txt", "p\nq\n")).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(second.status(), StatusCode::CREATED);

    let status = app.clone().oneshot(get(&format!("/upload/{id}"))).await.unwrap();
    let location = status.headers()[header::LOCATION].to_str().unwrap().to_string();

    let result = app.clone().oneshot(get(&location)).await.unwrap();
    assert_eq!(body_text(result).await, "=>p\n=>q\n");
}

#[tokio::test]
async fn completed_sessions_reject_further_uploads() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_secs(5));
    let id = open_session(&app).await;

    upload_pair(&app, &id, ("a.txt", "a\n"), ("b.txt", "a\n")).await;

    let third = app
        .clone()
        .oneshot(upload_request(&id, "c.txt", "c\n"))
        .await
        .unwrap();
    assert_eq!(third.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_sessions_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_secs(5));

    let missing = uuid::Uuid::new_v4().simple().to_string();
    for request in [
        get(&format!("/upload/{missing}")),
        upload_request(&missing, "a.txt", "a\n"),
        get("/upload/not-a-session-id"),
    ] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn upload_without_a_file_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_secs(5));
    let id = open_session(&app).await;

    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"comment\"\r\n\
         \r\n\
         not a file\r\n\
         --{BOUNDARY}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("/upload/{id}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // the session is untouched and still accepts its files
    let status = app.clone().oneshot(get(&format!("/upload/{id}"))).await.unwrap();
    assert_eq!(
        body_text(status).await,
        "Session is idle, waiting for 2 files"
    );
}

#[tokio::test]
async fn lone_first_upload_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_millis(200));
    let id = open_session(&app).await;

    let response = app
        .clone()
        .oneshot(upload_request(&id, "left.txt", "a\n"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    // the session keeps waiting until its TTL reclaims it
    let status = app.clone().oneshot(get(&format!("/upload/{id}"))).await.unwrap();
    assert_eq!(status.status(), StatusCode::OK);
    assert_eq!(body_text(status).await, "Session waiting for second file");
}

#[tokio::test]
async fn dropped_sessions_disappear() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_secs(5));
    let id = open_session(&app).await;

    let dropped = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/upload/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(dropped.status(), StatusCode::NO_CONTENT);

    let status = app.clone().oneshot(get(&format!("/upload/{id}"))).await.unwrap();
    assert_eq!(status.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_output_files_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(dir.path(), Duration::from_secs(5));

    let response = app
        .clone()
        .oneshot(get("/static/output/no-such-result"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
