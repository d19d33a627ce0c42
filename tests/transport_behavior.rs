//! Behavior-driven tests for the HTTP transport.
//!
//! These tests verify HOW retries, backoff and status classification behave
//! against scripted vendor responses. Throttling is disabled so only the
//! retry schedule contributes to elapsed time, except in the throttling
//! test, which runs on the real clock.

mod support;

use std::sync::Arc;
use std::time::Duration;

use stockfeed_core::{
    HttpError, HttpResponse, RateLimitConfig, RetryPolicy, SourceErrorKind, Transport,
    TransportConfig,
};
use support::ScriptedHttpClient;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const URL: &str = "https://vendor.test/quote?symbol=AAPL";

fn transport(client: &Arc<ScriptedHttpClient>, max_attempts: u32) -> Transport {
    Transport::new(
        "vendor",
        Arc::clone(client) as Arc<dyn stockfeed_core::HttpClient>,
        TransportConfig {
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::exponential(max_attempts),
            rate_limit: RateLimitConfig::disabled(),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn three_503s_then_success_waits_one_two_four_seconds() {
    // Given: A vendor that is unavailable three times before answering
    let client = Arc::new(ScriptedHttpClient::new([
        Ok(HttpResponse::new(503, "unavailable")),
        Ok(HttpResponse::new(503, "unavailable")),
        Ok(HttpResponse::new(503, "unavailable")),
        Ok(HttpResponse::ok_json(r#"{"price": 1}"#)),
    ]));
    let transport = transport(&client, 4);
    let started = Instant::now();

    // When: The transport is allowed four attempts
    let response = transport
        .get(URL, &CancellationToken::new())
        .await
        .expect("fourth attempt succeeds");

    // Then: All four attempts ran and the backoff schedule was honored
    assert_eq!(response.status, 200);
    assert_eq!(client.calls(), 4);
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert!(started.elapsed() < Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn bad_request_is_never_retried() {
    let client = Arc::new(ScriptedHttpClient::new([
        Ok(HttpResponse::new(400, "bad symbol")),
        Ok(HttpResponse::ok_json("{}")),
    ]));
    let transport = transport(&client, 4);

    let error = transport
        .get(URL, &CancellationToken::new())
        .await
        .expect_err("400 is terminal");

    assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
    assert_eq!(client.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_is_never_retried() {
    let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::new(401, "no"))]));
    let transport = transport(&client, 4);

    let error = transport
        .get(URL, &CancellationToken::new())
        .await
        .expect_err("401 is terminal");

    assert_eq!(error.kind(), SourceErrorKind::Authentication);
    assert!(error.is_terminal());
    assert_eq!(client.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn vendor_rate_limit_is_retried_and_keeps_its_hint() {
    let client = Arc::new(ScriptedHttpClient::new([
        Ok(HttpResponse::new(429, "slow down").with_header("Retry-After", "30")),
        Ok(HttpResponse::new(429, "slow down").with_header("Retry-After", "30")),
    ]));
    let transport = transport(&client, 2);

    let error = transport
        .get(URL, &CancellationToken::new())
        .await
        .expect_err("budget exhausted");

    assert_eq!(error.kind(), SourceErrorKind::RateLimitExceeded);
    assert_eq!(error.retry_after(), Some(Duration::from_secs(30)));
    assert_eq!(client.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn network_errors_are_retried_until_the_budget_runs_out() {
    let client = Arc::new(ScriptedHttpClient::new([
        Err(HttpError::connect("dns failure")),
        Err(HttpError::connect("dns failure")),
        Err(HttpError::connect("dns failure")),
    ]));
    let transport = transport(&client, 3);
    let started = Instant::now();

    let error = transport
        .get(URL, &CancellationToken::new())
        .await
        .expect_err("budget exhausted");

    assert_eq!(error.kind(), SourceErrorKind::Network);
    assert_eq!(client.calls(), 3);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn not_found_is_not_retried() {
    let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::new(404, "gone"))]));
    let transport = transport(&client, 4);

    let error = transport
        .get(URL, &CancellationToken::new())
        .await
        .expect_err("404");

    assert_eq!(error.kind(), SourceErrorKind::NotFound);
    assert_eq!(client.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff_stops_further_attempts() {
    let client = Arc::new(ScriptedHttpClient::new([
        Ok(HttpResponse::new(500, "boom")),
        Ok(HttpResponse::new(500, "boom")),
    ]));
    let transport = transport(&client, 4);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            cancel.cancel();
        }
    };
    let (result, ()) = tokio::join!(transport.get(URL, &cancel), canceller);

    let error = result.expect_err("cancelled");
    assert_eq!(error.kind(), SourceErrorKind::Cancelled);
    assert_eq!(client.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn undecodable_body_is_a_parsing_error() {
    let client = Arc::new(ScriptedHttpClient::new([Ok(HttpResponse::ok_json(
        "<html>maintenance</html>",
    ))]));
    let transport = transport(&client, 4);

    let error = transport
        .get_json::<serde_json::Value>(URL, &CancellationToken::new())
        .await
        .expect_err("not json");

    assert_eq!(error.kind(), SourceErrorKind::DataParsing);
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn throttled_transport_delays_the_request_past_its_budget() {
    // Given: A vendor budget of three requests per 300ms
    let client = Arc::new(ScriptedHttpClient::new(
        (0..4).map(|_| Ok(HttpResponse::ok_json("{}"))),
    ));
    let transport = Transport::new(
        "vendor",
        Arc::clone(&client) as Arc<dyn stockfeed_core::HttpClient>,
        TransportConfig {
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::exponential(1),
            rate_limit: RateLimitConfig {
                enabled: true,
                max_requests: 3,
                window: Duration::from_millis(300),
            },
        },
    );
    let cancel = CancellationToken::new();
    let started = std::time::Instant::now();

    // When: Four requests go out back to back
    let mut elapsed = Vec::new();
    for _ in 0..4 {
        transport.get(URL, &cancel).await.expect("throttled, not rejected");
        elapsed.push(started.elapsed());
    }

    // Then: Requests are spaced and the fourth waits for the first to leave the window
    assert_eq!(client.calls(), 4);
    assert!(elapsed[0] < Duration::from_millis(50));
    assert!(elapsed[1] >= Duration::from_millis(90));
    assert!(elapsed[3] >= Duration::from_millis(290));
}
