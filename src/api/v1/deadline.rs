//! Per-request deadline enforcement.
//!
//! Every route runs its handler on a child task that writes into an isolated
//! [`ResponseSink`]. The parent waits on a three-way race: handler completion,
//! handler panic, or the deadline timer. Exactly one of those outcomes reaches
//! the caller; a handler that loses the race keeps running but its output is
//! silently discarded once the sink is closed.

use super::error::ApiErrorCode;
use super::handler::ApiResponse;
use crate::logger::*;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use warp::http::{HeaderMap, StatusCode};
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Rejection, Reply};

/// Buffered stand-in for the real response channel. Writes after [`close`]
/// are dropped, and the status code is first-write-wins, mirroring an HTTP
/// response writer.
///
/// [`close`]: ResponseSink::close
pub struct ResponseSink {
    inner: Mutex<SinkState>,
}

struct SinkState {
    closed: bool,
    wrote_status: bool,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseSink {
    pub fn new() -> Self {
        ResponseSink {
            inner: Mutex::new(SinkState {
                closed: false,
                wrote_status: false,
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SinkState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_status(&self, status: StatusCode) {
        let mut state = self.state();
        if state.closed || state.wrote_status {
            return;
        }
        state.wrote_status = true;
        state.status = status;
    }

    pub fn insert_header(
        &self,
        name: warp::http::header::HeaderName,
        value: warp::http::header::HeaderValue,
    ) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        state.headers.insert(name, value);
    }

    pub fn write_body(&self, chunk: &[u8]) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        state.body.extend_from_slice(chunk);
    }

    /// Reject all further writes. Called when the race resolves against the
    /// handler, so a late completion cannot double-write.
    pub fn close(&self) {
        self.state().closed = true;
    }

    /// Move the buffered status, headers, and body onto the real channel.
    fn flush(&self) -> Response {
        let mut state = self.state();
        state.closed = true;
        let mut resp = Response::new(Body::from(std::mem::take(&mut state.body)));
        *resp.status_mut() = state.status;
        *resp.headers_mut() = std::mem::take(&mut state.headers);
        resp
    }
}

/// Deadline plus the prebuilt unavailable response written on timeout.
#[derive(Clone)]
pub struct DeadlineConfig {
    deadline: Duration,
    unavailable_body: Arc<Vec<u8>>,
}

impl DeadlineConfig {
    pub fn new(deadline: Duration) -> Self {
        DeadlineConfig {
            deadline,
            unavailable_body: Arc::new(error_body(ApiErrorCode::ServiceUnavailable)),
        }
    }

    fn unavailable_response(&self) -> Response {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            self.unavailable_body.as_slice().to_vec(),
        )
    }
}

fn error_body(code: ApiErrorCode) -> Vec<u8> {
    let message = code.to_string();
    serde_json::to_vec(&ApiResponse::<()>::err(code, message))
        .unwrap_or_else(|_| b"{\"success\":false}".to_vec())
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    let mut resp = Response::new(Body::from(body));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        warp::http::header::CONTENT_TYPE,
        warp::http::header::HeaderValue::from_static("application/json"),
    );
    resp
}

fn internal_error_response() -> Response {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        error_body(ApiErrorCode::Internal),
    )
}

/// Copy a handler's finished reply into the sink through the sink's write
/// contract. The body is collected before any status write so a failed body
/// read leaves the sink free for the error status.
async fn buffer_reply(sink: &ResponseSink, resp: Response) {
    let (parts, body) = resp.into_parts();
    match warp::hyper::body::to_bytes(body).await {
        Ok(bytes) => {
            sink.write_status(parts.status);
            for (name, value) in parts.headers.iter() {
                sink.insert_header(name.clone(), value.clone());
            }
            sink.write_body(&bytes);
        }
        Err(e) => {
            error!("buffering handler response body: {e}");
            sink.write_status(StatusCode::INTERNAL_SERVER_ERROR);
            sink.write_body(&error_body(ApiErrorCode::Internal));
        }
    }
}

/// Race `handler` against `cfg.deadline`.
///
/// Outcomes, mutually exclusive:
/// - completed: the buffered reply is flushed, exactly once;
/// - panicked: buffered output is discarded, a generic internal error is
///   returned, the panic detail is only logged;
/// - timed out: the sink is closed, the prebuilt unavailable response is
///   returned, and the handler's execution context is cancelled.
///
/// A rejection from the handler propagates untouched so the top-level
/// recovery filter still shapes it. When completion and the deadline become
/// ready in the same instant the winner is scheduler-defined; the loser's
/// signal is ignored either way.
pub async fn supervise<F, R>(cfg: DeadlineConfig, handler: F) -> Result<Response, Rejection>
where
    F: Future<Output = Result<R, Rejection>> + Send + 'static,
    R: Reply + Send,
{
    let sink = Arc::new(ResponseSink::new());
    let cancel = CancellationToken::new();

    let task_sink = sink.clone();
    let task_cancel = cancel.clone();
    let mut task = tokio::spawn(async move {
        let result = tokio::select! {
            r = handler => r,
            _ = task_cancel.cancelled() => return Ok(()),
        };
        match result {
            Ok(reply) => {
                buffer_reply(&task_sink, reply.into_response()).await;
                Ok(())
            }
            Err(rejection) => Err(rejection),
        }
    });

    tokio::select! {
        joined = &mut task => match joined {
            Ok(Ok(())) => Ok(sink.flush()),
            Ok(Err(rejection)) => Err(rejection),
            Err(join_err) => {
                if join_err.is_panic() {
                    error!("request handler panicked: {join_err}");
                } else {
                    error!("request handler task failed: {join_err}");
                }
                sink.close();
                Ok(internal_error_response())
            }
        },
        _ = tokio::time::sleep(cfg.deadline) => {
            // Close first: whatever the handler writes from here on is
            // dropped instead of racing the response we are about to send.
            sink.close();
            cancel.cancel();
            Ok(cfg.unavailable_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use warp::http::header::{HeaderName, HeaderValue};

    fn cfg_ms(ms: u64) -> DeadlineConfig {
        DeadlineConfig::new(Duration::from_millis(ms))
    }

    async fn body_string(resp: Response) -> String {
        let bytes = warp::hyper::body::to_bytes(resp.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn sink_discards_writes_after_close() {
        let sink = ResponseSink::new();
        sink.write_status(StatusCode::CREATED);
        sink.write_body(b"kept");
        sink.close();

        sink.write_body(b" dropped");
        sink.write_status(StatusCode::IM_A_TEAPOT);
        sink.insert_header(
            HeaderName::from_static("x-late"),
            HeaderValue::from_static("1"),
        );

        let resp = sink.flush();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(resp.headers().get("x-late").is_none());
    }

    #[test]
    fn sink_status_is_first_write_wins() {
        let sink = ResponseSink::new();
        sink.write_status(StatusCode::CREATED);
        sink.write_status(StatusCode::BAD_GATEWAY);
        assert_eq!(sink.flush().status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn completed_handler_reaches_the_caller_unchanged() {
        let reply = warp::reply::with_status(
            warp::reply::with_header(warp::reply::html("all good"), "x-test", "yes"),
            StatusCode::CREATED,
        );
        let resp = supervise(cfg_ms(5_000), async move { Ok::<_, Rejection>(reply) })
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers().get("x-test").unwrap(), "yes");
        assert_eq!(body_string(resp).await, "all good");
    }

    #[tokio::test]
    async fn slow_handler_gets_the_unavailable_response() {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_task = finished.clone();

        let started = std::time::Instant::now();
        let resp = supervise(cfg_ms(50), async move {
            tokio::time::sleep(Duration::from_secs(30)).await;
            finished_task.store(true, Ordering::SeqCst);
            Ok::<_, Rejection>(warp::reply::html("too late"))
        })
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_string(resp).await.contains("Service unavailable"));
        // cancelled, not awaited to completion
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!finished.load(Ordering::SeqCst));
    }

    fn detonate() -> bool {
        panic!("boom")
    }

    #[tokio::test]
    async fn panicking_handler_becomes_a_generic_internal_error() {
        let resp = supervise(cfg_ms(5_000), async move {
            if detonate() {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok::<_, Rejection>(warp::reply::html("unreachable"))
        })
        .await
        .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(resp).await;
        assert!(body.contains("Internal error"));
        assert!(!body.contains("boom"));
    }

    #[tokio::test]
    async fn timeout_cancels_the_handler_context() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());

        let resp = supervise(cfg_ms(20), async move {
            let _flag = flag;
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, Rejection>(warp::reply::html("never"))
        })
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        // the child observes cancellation and drops the handler promptly
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn handler_rejection_propagates_past_the_guard() {
        let result = supervise(cfg_ms(5_000), async move {
            Err::<warp::reply::Html<&'static str>, _>(warp::reject::custom(
                ApiErrorCode::BadRequest,
            ))
        })
        .await;

        let rejection = result.err().expect("rejection should propagate");
        assert!(matches!(
            rejection.find::<ApiErrorCode>(),
            Some(ApiErrorCode::BadRequest)
        ));
    }
}
