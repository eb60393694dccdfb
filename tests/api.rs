mod common;

use std::time::{Duration, Instant};

use framequery::{ClientBuilder, FrameQueryError, JobStatus};
use serde_json::json;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client_for, job_json, Sequence, API_KEY};

#[tokio::test]
async fn get_job_sends_bearer_and_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/job_1"))
        .and(header("authorization", format!("Bearer {API_KEY}").as_str()))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "jobId": "job_1",
                "status": "STT_PROCESSING",
                "originalFilename": "clip.mp4",
                "createdAt": "2024-05-01T10:00:00Z",
                "estimatedCompletionTimeSeconds": 42.0
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let job = client_for(&server).get_job("job_1").await.unwrap();
    assert_eq!(job.id, "job_1");
    assert_eq!(job.status, JobStatus::SttProcessing);
    assert_eq!(job.filename, "clip.mp4");
    assert_eq!(job.eta_seconds, Some(42.0));
    assert!(!job.is_terminal());
}

#[tokio::test]
async fn user_agent_names_the_sdk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"plan": "free"}})))
        .mount(&server)
        .await;

    client_for(&server).get_quota().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let ua = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(ua.starts_with("framequery-rust/"), "{ua}");
}

#[tokio::test]
async fn enveloped_and_bare_bodies_decode_alike() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/wrapped"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": job_json("same", "COMPLETED")})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/bare"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("same", "COMPLETED")))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let wrapped = client.get_job("wrapped").await.unwrap();
    let bare = client.get_job("bare").await.unwrap();
    assert_eq!(wrapped, bare);
}

#[tokio::test]
async fn repeated_get_job_yields_equal_snapshots() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/job_1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": job_json("job_1", "FFMPEG_PROCESSING")})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.get_job("job_1").await.unwrap();
    let second = client.get_job("job_1").await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn job_id_is_escaped_as_one_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/a%2Fb%20c"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": job_json("a/b c", "COMPLETED")})))
        .expect(1)
        .mount(&server)
        .await;

    let job = client_for(&server).get_job("a/b c").await.unwrap();
    assert_eq!(job.id, "a/b c");
}

#[tokio::test]
async fn list_jobs_follows_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("cursor", "c2"))
        .and(query_param("limit", "2"))
        .and(query_param("status", "COMPLETED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [job_json("job_3", "COMPLETED")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(query_param("limit", "2"))
        .and(query_param("status", "COMPLETED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [job_json("job_1", "COMPLETED"), job_json("job_2", "COMPLETED")],
            "nextCursor": "c2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let first = client.list_jobs(Some(2), None, Some("COMPLETED")).await.unwrap();
    assert_eq!(first.jobs.len(), 2);
    assert_eq!(first.jobs[1].id, "job_2");
    assert!(first.has_more());

    let second = client
        .list_jobs(Some(2), first.next_cursor.as_deref(), Some("COMPLETED"))
        .await
        .unwrap();
    assert_eq!(second.jobs.len(), 1);
    assert_eq!(second.jobs[0].id, "job_3");
    assert!(!second.has_more());
    assert_eq!(second.next_cursor, None);
}

#[tokio::test]
async fn list_jobs_without_filters_sends_no_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "nextCursor": ""})))
        .mount(&server)
        .await;

    let page = client_for(&server).list_jobs(None, None, None).await.unwrap();
    assert!(page.jobs.is_empty());
    assert!(!page.has_more());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn quota_tolerates_missing_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"plan": "starter", "includedHours": 5, "resetDate": "2024-06-01"}
        })))
        .mount(&server)
        .await;

    let quota = client_for(&server).get_quota().await.unwrap();
    assert_eq!(quota.plan, "starter");
    assert_eq!(quota.included_hours, 5.0);
    assert_eq!(quota.credits_balance_hours, 0.0);
    assert_eq!(quota.reset_date.as_deref(), Some("2024-06-01"));
}

#[tokio::test]
async fn client_errors_are_typed_and_not_retried() {
    let server = MockServer::start().await;
    let cases = [
        ("/jobs/unauth", 401u16, json!({"error": "invalid API key"})),
        ("/jobs/forbidden", 403, json!({"message": "not your job"})),
        ("/jobs/missing", 404, json!({"error": "job not found"})),
        ("/jobs/bad", 400, json!({"error": "bad id", "code": "E_BAD_ID"})),
    ];
    for (route, status, body) in &cases {
        Mock::given(method("GET"))
            .and(path(*route))
            .respond_with(ResponseTemplate::new(*status).set_body_json(body.clone()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = client_for(&server);
    let err = client.get_job("unauth").await.unwrap_err();
    assert!(matches!(err, FrameQueryError::Authentication { ref message } if message == "invalid API key"));

    let err = client.get_job("forbidden").await.unwrap_err();
    assert!(matches!(err, FrameQueryError::PermissionDenied { ref message } if message == "not your job"));

    let err = client.get_job("missing").await.unwrap_err();
    assert!(matches!(err, FrameQueryError::NotFound { .. }));
    assert_eq!(err.status_code(), Some(404));

    match client.get_job("bad").await.unwrap_err() {
        FrameQueryError::Api {
            status_code,
            message,
            body,
        } => {
            assert_eq!(status_code, 400);
            assert_eq!(message, "bad id");
            assert_eq!(body.unwrap()["code"], "E_BAD_ID");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/job_1"))
        .respond_with(Sequence::new(vec![
            ResponseTemplate::new(503).insert_header("Retry-After", "0"),
            ResponseTemplate::new(500).set_body_string("boom"),
            ResponseTemplate::new(200).set_body_json(json!({"data": job_json("job_1", "COMPLETED")})),
        ]))
        .expect(3)
        .mount(&server)
        .await;

    // Second retry uses computed backoff: 500ms * 2^1.
    let started = Instant::now();
    let job = client_for(&server).get_job("job_1").await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test]
async fn rate_limit_surfaces_after_retries_are_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "0")
                .set_body_json(json!({"error": "too many requests"})),
        )
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server).get_quota().await.unwrap_err();
    match err {
        FrameQueryError::RateLimit {
            message,
            retry_after,
        } => {
            assert_eq!(message, "too many requests");
            assert_eq!(retry_after, Some(0.0));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn retry_after_header_sets_the_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(Sequence::new(vec![
            ResponseTemplate::new(429).insert_header("Retry-After", "1"),
            ResponseTemplate::new(200).set_body_json(json!({"data": {"plan": "pro"}})),
        ]))
        .expect(2)
        .mount(&server)
        .await;

    let started = Instant::now();
    let quota = client_for(&server).get_quota().await.unwrap();
    assert_eq!(quota.plan, "pro");
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn max_retries_bounds_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/job_1"))
        .respond_with(ResponseTemplate::new(502).insert_header("Retry-After", "0"))
        .expect(5)
        .mount(&server)
        .await;

    let client = ClientBuilder::new()
        .api_key(API_KEY)
        .base_url(server.uri())
        .max_retries(4)
        .build()
        .unwrap();
    let err = client.get_job("job_1").await.unwrap_err();
    assert!(matches!(err, FrameQueryError::Api { status_code: 502, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn per_request_timeout_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({"data": {"plan": "free"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = ClientBuilder::new()
        .api_key(API_KEY)
        .base_url(server.uri())
        .max_retries(0)
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    match client.get_quota().await.unwrap_err() {
        FrameQueryError::Http(err) => assert!(err.is_timeout()),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn connection_failure_is_a_transport_error() {
    let client = ClientBuilder::new()
        .api_key(API_KEY)
        .base_url("http://127.0.0.1:9")
        .max_retries(0)
        .build()
        .unwrap();
    let err = client.get_quota().await.unwrap_err();
    assert!(matches!(err, FrameQueryError::Http(_)));
}

#[tokio::test]
async fn non_json_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quota"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).get_quota().await.unwrap_err();
    assert!(matches!(err, FrameQueryError::Decode(_)));
}
