//! # Admin API
//!
//! warp routes cho operator:
//! - `POST /admin/v1/nodes/{id}/test` - manual test một node
//! - `POST /admin/v1/nodes/test` - auto test mọi node (body `{seconds_until_next_poc}`,
//!   bỏ trống thì dùng countdown từ block height)
//! - `GET /admin/v1/status?state=..&seconds_until_next_poc=..&failing_model=..&participant_state=..`
//! - `PUT /admin/v1/poc/heights` - cập nhật block height cho countdown

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::errors::{OnboardingError, Result as OnboardingResult};
use crate::node_manager::admission::{AdmissionTestRunner, TestOutcome};
use crate::node_manager::scheduler::{BlockHeightCountdown, PocCountdown};
use crate::node_manager::status_reporter::StatusReporter;
use crate::node_manager::ParticipantState;

/// Type alias cho admin routes
pub type AdminApiFilter = warp::filters::BoxedFilter<(Box<dyn warp::Reply>,)>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoTestRequest {
    #[serde(default)]
    pub seconds_until_next_poc: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub seconds_until_next_poc: Option<i64>,
    #[serde(default)]
    pub failing_model: Option<String>,
    #[serde(default)]
    pub participant_state: Option<String>,
}

/// Status text trả về cho operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub onboarding_message: String,
    pub participant_message: String,
    pub no_model_guidance: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PocHeights {
    pub current_block: u64,
    pub next_poc_block: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountdownView {
    pub seconds_until_next_poc: i64,
    #[serde(default)]
    pub current_block: Option<u64>,
    #[serde(default)]
    pub next_poc_block: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn test_node(&self, node_id: &str) -> OnboardingResult<TestOutcome>;
    async fn test_all(&self, request: AutoTestRequest) -> OnboardingResult<Vec<TestOutcome>>;
    fn status(&self, query: &StatusQuery) -> StatusView;
    async fn set_poc_heights(&self, heights: PocHeights) -> OnboardingResult<CountdownView>;
    fn version(&self) -> String;
}

pub struct DefaultAdminApi {
    runner: Arc<AdmissionTestRunner>,
    reporter: StatusReporter,
    countdown: Arc<BlockHeightCountdown>,
}

impl DefaultAdminApi {
    pub fn new(runner: Arc<AdmissionTestRunner>, reporter: StatusReporter, countdown: Arc<BlockHeightCountdown>) -> Self {
        Self {
            runner,
            reporter,
            countdown,
        }
    }
}

#[async_trait]
impl AdminApi for DefaultAdminApi {
    async fn test_node(&self, node_id: &str) -> OnboardingResult<TestOutcome> {
        if node_id.trim().is_empty() {
            return Err(OnboardingError::ValidationError("node id must not be empty".to_string()));
        }
        info!(endpoint = "test_node", node_id = %node_id, "Manual admission test requested");
        Ok(self.runner.run_manual_test(node_id).await)
    }

    async fn test_all(&self, request: AutoTestRequest) -> OnboardingResult<Vec<TestOutcome>> {
        let seconds = match request.seconds_until_next_poc {
            Some(seconds) => seconds,
            None => self.countdown.seconds_until_next_poc().await.map_err(|e| {
                OnboardingError::ValidationError(format!(
                    "seconds_until_next_poc not given and no countdown available: {}",
                    e
                ))
            })?,
        };
        info!(endpoint = "test_all", seconds_until_next_poc = seconds, "Auto admission tests requested");
        Ok(self.runner.run_auto_tests(seconds).await)
    }

    fn status(&self, query: &StatusQuery) -> StatusView {
        let seconds = query.seconds_until_next_poc.unwrap_or(0);
        let onboarding_message = query
            .state
            .as_deref()
            .map(|state| {
                self.reporter
                    .build_onboarding_message_raw(state, seconds, query.failing_model.as_deref().unwrap_or(""))
            })
            .unwrap_or_default();
        let participant_message = query
            .participant_state
            .as_deref()
            .map(|state| self.reporter.build_participant_message_raw(state))
            .unwrap_or_default();

        // participant state không rõ thì coi như chưa active
        let participant_active = query
            .participant_state
            .as_deref()
            .and_then(|state| state.parse::<ParticipantState>().ok())
            .map(|state| state.is_active())
            .unwrap_or(false);
        let no_model_guidance = if self.reporter.should_suppress_no_model_guidance(participant_active) {
            String::new()
        } else {
            self.reporter.build_no_model_guidance(seconds)
        };

        StatusView {
            onboarding_message,
            participant_message,
            no_model_guidance,
        }
    }

    async fn set_poc_heights(&self, heights: PocHeights) -> OnboardingResult<CountdownView> {
        self.countdown.set_heights(heights.current_block, heights.next_poc_block).await;
        let seconds = self.countdown.seconds_until_next_poc().await?;
        self.reporter.log_timing_guidance(seconds);
        let (current_block, next_poc_block) = match self.countdown.heights().await {
            Some((current, next)) => (Some(current), Some(next)),
            None => (None, None),
        };
        Ok(CountdownView {
            seconds_until_next_poc: seconds,
            current_block,
            next_poc_block,
        })
    }

    fn version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

fn with_api(
    api: Arc<dyn AdminApi>,
) -> impl Filter<Extract = (Arc<dyn AdminApi>,), Error = Infallible> + Clone {
    warp::any().map(move || api.clone())
}

/// Tạo admin routes
pub fn admin_routes(api: Arc<dyn AdminApi>) -> AdminApiFilter {
    // POST /admin/v1/nodes/test (đặt trước route có param để "test" không bị hiểu là node id)
    let test_all = warp::path!("admin" / "v1" / "nodes" / "test")
        .and(warp::post())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json::<AutoTestRequest>())
        .and(with_api(api.clone()))
        .and_then(|request: AutoTestRequest, api: Arc<dyn AdminApi>| async move {
            api.test_all(request)
                .await
                .map(|outcomes| warp::reply::json(&outcomes))
                .map_err(warp::reject::custom)
        });

    // POST /admin/v1/nodes/{id}/test
    let test_node = warp::path!("admin" / "v1" / "nodes" / String / "test")
        .and(warp::post())
        .and(with_api(api.clone()))
        .and_then(|node_id: String, api: Arc<dyn AdminApi>| async move {
            api.test_node(&node_id)
                .await
                .map(|outcome| warp::reply::json(&outcome))
                .map_err(warp::reject::custom)
        });

    // GET /admin/v1/status
    let status = warp::path!("admin" / "v1" / "status")
        .and(warp::get())
        .and(warp::query::<StatusQuery>())
        .and(with_api(api.clone()))
        .map(|query: StatusQuery, api: Arc<dyn AdminApi>| warp::reply::json(&api.status(&query)));

    // PUT /admin/v1/poc/heights
    let heights = warp::path!("admin" / "v1" / "poc" / "heights")
        .and(warp::put())
        .and(warp::body::content_length_limit(16 * 1024))
        .and(warp::body::json::<PocHeights>())
        .and(with_api(api.clone()))
        .and_then(|heights: PocHeights, api: Arc<dyn AdminApi>| async move {
            api.set_poc_heights(heights)
                .await
                .map(|view| warp::reply::json(&view))
                .map_err(warp::reject::custom)
        });

    // GET /admin/v1/version
    let version = warp::path!("admin" / "v1" / "version")
        .and(warp::get())
        .and(with_api(api))
        .map(|api: Arc<dyn AdminApi>| warp::reply::json(&api.version()));

    test_all
        .or(test_node)
        .or(status)
        .or(heights)
        .or(version)
        .recover(handle_rejection)
        .map(|reply| Box::new(reply) as Box<dyn warp::Reply>)
        .boxed()
}

/// Chuyển rejection thành JSON `{error}` với status code phù hợp
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if let Some(e) = err.find::<OnboardingError>() {
        e.log();
        (
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            e.to_string(),
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        warn!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { error: message }),
        code,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdmissionConfig;
    use crate::infra::service_mocks::{
        FixedNodeClientFactory, InMemoryCommandQueue, StaticCompletionSender, StaticNodeConfigSource,
    };
    use crate::infra::service_traits::{NodeClient, ServiceError};
    use crate::node_manager::{NodeConfig, OnboardingState};
    use mockall::mock;

    mock! {
        pub NodeClientMock {}
        #[async_trait::async_trait]
        impl NodeClient for NodeClientMock {
            async fn inference_up(&self, model_id: &str, args: &[String]) -> Result<(), ServiceError>;
            async fn inference_health(&self) -> Result<bool, ServiceError>;
            async fn set_node_state(&self, state: OnboardingState, reason: &str) -> Result<(), ServiceError>;
        }
    }

    fn routes(client: MockNodeClientMock) -> AdminApiFilter {
        let nodes = vec![NodeConfig::new("node-1", "10.0.0.1", 5000, 8080).with_model("m", &[])];
        let runner = Arc::new(AdmissionTestRunner::new(
            AdmissionConfig::default(),
            Arc::new(StaticNodeConfigSource::new(nodes, "")),
            Some(Arc::new(InMemoryCommandQueue::new())),
            Arc::new(FixedNodeClientFactory::new(Arc::new(client))),
            Arc::new(StaticCompletionSender::with_status(200)),
        ));
        let api = DefaultAdminApi::new(runner, StatusReporter::default(), Arc::new(BlockHeightCountdown::new(6.0)));
        admin_routes(Arc::new(api))
    }

    fn healthy_client() -> MockNodeClientMock {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().returning(|_, _| Ok(()));
        client.expect_inference_health().returning(|| Ok(true));
        client
    }

    #[tokio::test]
    async fn test_manual_test_route() {
        let routes = routes(healthy_client());
        let resp = warp::test::request()
            .method("POST")
            .path("/admin/v1/nodes/node-1/test")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let outcome: TestOutcome = serde_json::from_slice(resp.body()).unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_manual_test_unknown_node() {
        let routes = routes(MockNodeClientMock::new());
        let resp = warp::test::request()
            .method("POST")
            .path("/admin/v1/nodes/ghost/test")
            .reply(&routes)
            .await;
        let outcome: TestOutcome = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(outcome.error, "node_not_found");
    }

    #[tokio::test]
    async fn test_auto_test_route() {
        let routes = routes(healthy_client());
        let resp = warp::test::request()
            .method("POST")
            .path("/admin/v1/nodes/test")
            .json(&serde_json::json!({"seconds_until_next_poc": 7200}))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let outcomes: Vec<TestOutcome> = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(outcomes.len(), 1);

        let gated = warp::test::request()
            .method("POST")
            .path("/admin/v1/nodes/test")
            .json(&serde_json::json!({"seconds_until_next_poc": 100}))
            .reply(&routes)
            .await;
        let outcomes: Vec<TestOutcome> = serde_json::from_slice(gated.body()).unwrap();
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_auto_test_uses_reported_heights() {
        let routes = routes(healthy_client());
        let missing = warp::test::request()
            .method("POST")
            .path("/admin/v1/nodes/test")
            .json(&serde_json::json!({}))
            .reply(&routes)
            .await;
        assert_eq!(missing.status(), 422);

        let heights = warp::test::request()
            .method("PUT")
            .path("/admin/v1/poc/heights")
            .json(&serde_json::json!({"current_block": 100, "next_poc_block": 1100}))
            .reply(&routes)
            .await;
        assert_eq!(heights.status(), 200);
        let view: CountdownView = serde_json::from_slice(heights.body()).unwrap();
        assert_eq!(view.seconds_until_next_poc, 6000);
        assert_eq!(view.current_block, Some(100));
        assert_eq!(view.next_poc_block, Some(1100));

        let resp = warp::test::request()
            .method("POST")
            .path("/admin/v1/nodes/test")
            .json(&serde_json::json!({}))
            .reply(&routes)
            .await;
        let outcomes: Vec<TestOutcome> = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    #[tokio::test]
    async fn test_status_route() {
        let routes = routes(MockNodeClientMock::new());
        let resp = warp::test::request()
            .method("GET")
            .path("/admin/v1/status?state=TEST_FAILED&seconds_until_next_poc=4000&failing_model=m1&participant_state=ACTIVE_PARTICIPATING")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let view: StatusView = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(view.onboarding_message, "MLnode test failed: model 'm1' could not be loaded");
        assert_eq!(view.participant_message, "Participant is in active set and participating");
        assert_eq!(
            view.no_model_guidance,
            "MLnode will be tested automatically when there is more than 1 hour until next PoC"
        );
    }

    #[tokio::test]
    async fn test_status_route_unknown_and_inactive() {
        let routes = routes(MockNodeClientMock::new());
        let resp = warp::test::request()
            .method("GET")
            .path("/admin/v1/status?state=COMPUTING&seconds_until_next_poc=4000&participant_state=INACTIVE_WAITING")
            .reply(&routes)
            .await;
        let view: StatusView = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(view.onboarding_message, "");
        assert!(!view.participant_message.is_empty());
        assert_eq!(view.no_model_guidance, "");
    }

    #[tokio::test]
    async fn test_bad_body_and_unknown_path() {
        let routes = routes(MockNodeClientMock::new());
        let resp = warp::test::request()
            .method("PUT")
            .path("/admin/v1/poc/heights")
            .body("not json")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 400);

        let resp = warp::test::request().method("GET").path("/nope").reply(&routes).await;
        assert_eq!(resp.status(), 404);
    }
}
