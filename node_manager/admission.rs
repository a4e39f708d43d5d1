//! # Admission Test Runner
//!
//! Chạy admission protocol trên một hoặc nhiều ML node:
//!
//! 1. load từng model (theo thứ tự model id),
//! 2. health check inference server,
//! 3. sample chat-completion (nếu bật `sample_inference`).
//!
//! Stage đầu tiên lỗi sẽ dừng test. Kết quả luôn là một `TestOutcome`, lỗi
//! không bao giờ được trả ra ngoài. Sau mỗi test runner đẩy command lên queue
//! (TEST_FAILED + reason, hoặc WAITING_FOR_POC) và, khi được bật, báo
//! TEST_FAILED trực tiếp cho node. Các side effect này là best-effort.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::AdmissionConfig;
use crate::errors::{AdmissionFailure, DEADLINE_EXCEEDED, NO_MODELS_CONFIGURED};
use crate::infra::service_traits::{
    CommandQueue, CompletionSender, NodeClient, NodeClientFactory, NodeConfigSource,
};
use crate::logs::NODES;
use crate::messaging::broker::NodeCommand;
use crate::node_manager::{NodeConfig, OnboardingState};

/// Đường dẫn chat-completion trên inference server
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Kết quả tổng của một lần test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Success,
    Failed,
}

/// Thời gian (ms) của từng stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestMetrics {
    /// Thời gian load theo model id, có cả model load lỗi
    pub load_ms: BTreeMap<String, u64>,
    pub health_ms: u64,
    /// Chỉ ghi khi sample inference thành công
    pub resp_ms: u64,
}

/// Kết quả admission test của một node
///
/// Outcome do runner tạo ra (qua `TestOutcome::success` / `TestOutcome::failed`)
/// luôn thỏa: FAILED có `error` khác rỗng, SUCCESS có `error` và
/// `failing_model` rỗng. Field để `pub` cho serde, nên outcome tự dựng tay
/// hoặc decode từ JSON không được đảm bảo điều này.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub node_id: String,
    pub status: TestStatus,
    pub failing_model: String,
    pub error: String,
    pub metrics: TestMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<AdmissionFailure>,
}

impl TestOutcome {
    pub fn success(node_id: &str, metrics: TestMetrics) -> Self {
        Self {
            node_id: node_id.to_string(),
            status: TestStatus::Success,
            failing_model: String::new(),
            error: String::new(),
            metrics,
            failure: None,
        }
    }

    pub fn failed(node_id: &str, failure: AdmissionFailure, metrics: TestMetrics) -> Self {
        Self {
            node_id: node_id.to_string(),
            status: TestStatus::Failed,
            failing_model: failure.failing_model().to_string(),
            error: failure.reason(),
            metrics,
            failure: Some(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TestStatus::Success
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Body của sample inference request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

/// Log và bỏ qua lỗi của một side effect
pub fn best_effort<E: fmt::Display>(action: &str, node_id: &str, result: Result<(), E>) {
    if let Err(e) = result {
        warn!(
            target: NODES,
            node_id = %node_id,
            "[AdmissionTestRunner] Best-effort {} failed: {}",
            action,
            e
        );
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Runner cho admission protocol
pub struct AdmissionTestRunner {
    config: AdmissionConfig,
    config_source: Arc<dyn NodeConfigSource>,
    command_queue: Option<Arc<dyn CommandQueue>>,
    client_factory: Arc<dyn NodeClientFactory>,
    completion_sender: Arc<dyn CompletionSender>,
}

impl AdmissionTestRunner {
    /// Tạo runner mới
    pub fn new(
        config: AdmissionConfig,
        config_source: Arc<dyn NodeConfigSource>,
        command_queue: Option<Arc<dyn CommandQueue>>,
        client_factory: Arc<dyn NodeClientFactory>,
        completion_sender: Arc<dyn CompletionSender>,
    ) -> Self {
        Self {
            config,
            config_source,
            command_queue,
            client_factory,
            completion_sender,
        }
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Chỉ test khi còn đủ xa PoC kế tiếp
    pub fn should_auto_test(&self, seconds_until_next_cycle: i64) -> bool {
        seconds_until_next_cycle > self.config.auto_test_threshold_secs
    }

    /// Test lần lượt mọi node đã cấu hình, theo thứ tự của config source
    ///
    /// Trả về danh sách rỗng nếu đang quá gần PoC.
    pub async fn run_auto_tests(&self, seconds_until_next_cycle: i64) -> Vec<TestOutcome> {
        if !self.should_auto_test(seconds_until_next_cycle) {
            debug!(
                target: NODES,
                "[AdmissionTestRunner] Skip auto tests, {}s until next PoC",
                seconds_until_next_cycle
            );
            return Vec::new();
        }

        let nodes = self.config_source.get_nodes().await;
        info!(target: NODES, "[AdmissionTestRunner] Auto testing {} node(s)", nodes.len());

        let mut outcomes = Vec::with_capacity(nodes.len());
        for node in &nodes {
            outcomes.push(self.run_node_test(node).await);
        }
        outcomes
    }

    /// Test một node theo id do operator yêu cầu
    pub async fn run_manual_test(&self, node_id: &str) -> TestOutcome {
        let nodes = self.config_source.get_nodes().await;
        match nodes.iter().find(|node| node.id == node_id) {
            Some(node) => self.run_node_test(node).await,
            None => {
                warn!(target: NODES, "[AdmissionTestRunner] Manual test for unknown node {}", node_id);
                TestOutcome::failed(node_id, AdmissionFailure::NodeNotFound, TestMetrics::default())
            }
        }
    }

    /// Chạy admission protocol trên một node
    pub async fn run_node_test(&self, node: &NodeConfig) -> TestOutcome {
        let version = self.config_source.get_current_node_version().await;
        let poc_url = node.poc_url(&version);
        let inference_url = node.inference_url();
        let client = self.client_factory.create(&poc_url, &inference_url);

        info!(
            target: NODES,
            node_id = %node.id,
            models = node.models.len(),
            "[AdmissionTestRunner] Testing node at {}",
            inference_url
        );

        let mut metrics = TestMetrics::default();
        let result = self
            .run_stages(node, &inference_url, client.as_ref(), &mut metrics)
            .await;

        match result {
            Ok(()) => {
                info!(target: NODES, node_id = %node.id, "[AdmissionTestRunner] Node passed admission test");
                self.report_success(&node.id).await;
                TestOutcome::success(&node.id, metrics)
            }
            Err(failure) => {
                let outcome = TestOutcome::failed(&node.id, failure, metrics);
                warn!(
                    target: NODES,
                    node_id = %node.id,
                    failing_model = %outcome.failing_model,
                    "[AdmissionTestRunner] Node failed admission test: {}",
                    outcome.error
                );
                self.report_failure(client.as_ref(), &node.id, &outcome.error).await;
                outcome
            }
        }
    }

    async fn run_stages(
        &self,
        node: &NodeConfig,
        inference_url: &str,
        client: &dyn NodeClient,
        metrics: &mut TestMetrics,
    ) -> Result<(), AdmissionFailure> {
        self.load_models(node, client, metrics).await?;
        self.check_health(client, metrics).await?;
        if self.config.sample_inference {
            self.sample_inference(node, inference_url, metrics).await?;
        }
        Ok(())
    }

    async fn load_models(
        &self,
        node: &NodeConfig,
        client: &dyn NodeClient,
        metrics: &mut TestMetrics,
    ) -> Result<(), AdmissionFailure> {
        for (model_id, model) in &node.models {
            let started = Instant::now();
            let result = self.bounded(client.inference_up(model_id, &model.args)).await;
            metrics.load_ms.insert(model_id.clone(), elapsed_ms(started));

            let message = match result {
                Ok(Ok(())) => {
                    debug!(target: NODES, node_id = %node.id, "[AdmissionTestRunner] Model {} loaded", model_id);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => DEADLINE_EXCEEDED.to_string(),
            };
            return Err(AdmissionFailure::ModelLoad {
                model: model_id.clone(),
                message,
            });
        }
        Ok(())
    }

    async fn check_health(&self, client: &dyn NodeClient, metrics: &mut TestMetrics) -> Result<(), AdmissionFailure> {
        let started = Instant::now();
        let result = self.bounded(client.inference_health()).await;
        metrics.health_ms = elapsed_ms(started);

        match result {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(AdmissionFailure::HealthNotOk),
            Ok(Err(e)) => Err(AdmissionFailure::HealthTransport(e.to_string())),
            Err(_) => Err(AdmissionFailure::HealthTransport(DEADLINE_EXCEEDED.to_string())),
        }
    }

    async fn sample_inference(
        &self,
        node: &NodeConfig,
        inference_url: &str,
        metrics: &mut TestMetrics,
    ) -> Result<(), AdmissionFailure> {
        // Không gửi sample request với model rỗng
        let model = node
            .first_model_id()
            .ok_or_else(|| AdmissionFailure::RequestBuild(NO_MODELS_CONFIGURED.to_string()))?;

        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: &self.config.sample_prompt,
            }],
            max_tokens: self.config.sample_max_tokens,
        };
        let body = serde_json::to_vec(&request).map_err(|e| AdmissionFailure::RequestBuild(e.to_string()))?;
        let url = format!("{}{}", inference_url, CHAT_COMPLETIONS_PATH);

        let started = Instant::now();
        match self.bounded(self.completion_sender.post_json(&url, body)).await {
            Ok(Ok(status)) if (200..300).contains(&status) => {
                metrics.resp_ms = elapsed_ms(started);
                Ok(())
            }
            Ok(Ok(status)) => Err(AdmissionFailure::InferenceStatus(status)),
            Ok(Err(e)) => Err(AdmissionFailure::InferenceTransport(e.to_string())),
            Err(_) => Err(AdmissionFailure::InferenceTransport(DEADLINE_EXCEEDED.to_string())),
        }
    }

    /// Áp deadline cho một stage nếu có cấu hình
    async fn bounded<F: Future>(&self, stage: F) -> Result<F::Output, Elapsed> {
        match self.config.stage_timeout_secs {
            Some(secs) => timeout(Duration::from_secs(secs), stage).await,
            None => Ok(stage.await),
        }
    }

    async fn report_success(&self, node_id: &str) {
        if let Some(queue) = &self.command_queue {
            let result = queue
                .submit(NodeCommand::set_onboarding_state(node_id, OnboardingState::WaitingForPoc))
                .await;
            best_effort("queue WAITING_FOR_POC state", node_id, result);
        }
    }

    async fn report_failure(&self, client: &dyn NodeClient, node_id: &str, reason: &str) {
        if let Some(queue) = &self.command_queue {
            let result = queue
                .submit(NodeCommand::set_onboarding_state(node_id, OnboardingState::TestFailed))
                .await;
            best_effort("queue TEST_FAILED state", node_id, result);

            let result = queue.submit(NodeCommand::set_failure_reason(node_id, reason)).await;
            best_effort("queue failure reason", node_id, result);
        }

        if self.config.notify_node_on_failure {
            let notify = timeout(
                Duration::from_secs(self.config.notify_timeout_secs),
                client.set_node_state(OnboardingState::TestFailed, reason),
            )
            .await;
            let result = match notify {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(_) => Err(DEADLINE_EXCEEDED.to_string()),
            };
            best_effort("node TEST_FAILED notification", node_id, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::service_mocks::{
        FixedNodeClientFactory, InMemoryCommandQueue, StaticCompletionSender, StaticNodeConfigSource,
    };
    use crate::infra::service_traits::ServiceError;
    use async_trait::async_trait;
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

    struct Harness {
        runner: AdmissionTestRunner,
        queue: Arc<InMemoryCommandQueue>,
        sender: Arc<StaticCompletionSender>,
        factory: Arc<FixedNodeClientFactory>,
    }

    fn harness_with(
        config: AdmissionConfig,
        nodes: Vec<NodeConfig>,
        client: MockNodeClientMock,
        sender: StaticCompletionSender,
        queue: InMemoryCommandQueue,
    ) -> Harness {
        let queue = Arc::new(queue);
        let sender = Arc::new(sender);
        let factory = Arc::new(FixedNodeClientFactory::new(Arc::new(client)));
        let runner = AdmissionTestRunner::new(
            config,
            Arc::new(StaticNodeConfigSource::new(nodes, "")),
            Some(queue.clone()),
            factory.clone(),
            sender.clone(),
        );
        Harness {
            runner,
            queue,
            sender,
            factory,
        }
    }

    fn harness(nodes: Vec<NodeConfig>, client: MockNodeClientMock, sender: StaticCompletionSender) -> Harness {
        harness_with(AdmissionConfig::default(), nodes, client, sender, InMemoryCommandQueue::new())
    }

    fn node_ab() -> NodeConfig {
        NodeConfig::new("node-1", "10.0.0.5", 5000, 8080)
            .with_model("A", &["--tp", "1"])
            .with_model("B", &[])
    }

    fn healthy_client() -> MockNodeClientMock {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().returning(|_, _| Ok(()));
        client.expect_inference_health().times(1).returning(|| Ok(true));
        client
    }

    #[tokio::test]
    async fn test_success_records_metrics_and_queues_waiting_state() {
        let mut client = healthy_client();
        client.expect_set_node_state().times(0);
        let h = harness(vec![node_ab()], client, StaticCompletionSender::with_status(200));

        let outcome = h.runner.run_node_test(&node_ab()).await;

        assert_eq!(outcome.status, TestStatus::Success);
        assert!(outcome.is_success());
        assert_eq!(outcome.error, "");
        assert_eq!(outcome.failing_model, "");
        assert!(outcome.metrics.load_ms.contains_key("A"));
        assert!(outcome.metrics.load_ms.contains_key("B"));
        assert_eq!(h.sender.calls(), 1);
        assert_eq!(
            h.queue.commands().await,
            vec![NodeCommand::set_onboarding_state("node-1", OnboardingState::WaitingForPoc)]
        );
    }

    #[tokio::test]
    async fn test_sample_request_targets_first_model() {
        let mut client = healthy_client();
        client.expect_set_node_state().times(0);
        let node = NodeConfig::new("node-1", "10.0.0.5", 5000, 8080)
            .with_segments("/v1", "")
            .with_model("zeta", &[])
            .with_model("alpha", &[]);
        let h = harness(vec![node.clone()], client, StaticCompletionSender::with_status(201));

        let outcome = h.runner.run_node_test(&node).await;
        assert!(outcome.is_success());

        let (url, body) = h.sender.last_request().unwrap();
        assert_eq!(url, "http://10.0.0.5:5000/v1/v1/chat/completions");
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["model"], "alpha");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello, how are you?");
        assert_eq!(body["max_tokens"], 10);
    }

    #[tokio::test]
    async fn test_model_load_failure_skips_later_stages() {
        let mut client = MockNodeClientMock::new();
        client
            .expect_inference_up()
            .withf(|model, _| model == "A")
            .times(1)
            .returning(|_, _| Ok(()));
        client
            .expect_inference_up()
            .withf(|model, _| model == "B")
            .times(1)
            .returning(|_, _| Err(ServiceError::ProtocolError("out of memory".to_string())));
        client.expect_inference_health().times(0);
        client.expect_set_node_state().times(1).returning(|_, _| Ok(()));
        let h = harness(vec![node_ab()], client, StaticCompletionSender::with_status(200));

        let outcome = h.runner.run_node_test(&node_ab()).await;

        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.failing_model, "B");
        assert_eq!(outcome.error, "Protocol error: out of memory");
        assert_eq!(outcome.metrics.load_ms.len(), 2);
        assert_eq!(outcome.metrics.health_ms, 0);
        assert_eq!(outcome.metrics.resp_ms, 0);
        assert_eq!(h.sender.calls(), 0);
    }

    #[tokio::test]
    async fn test_first_model_failure_stops_remaining_models() {
        let mut client = MockNodeClientMock::new();
        client
            .expect_inference_up()
            .withf(|model, _| model == "A")
            .times(1)
            .returning(|_, _| Err(ServiceError::ProtocolError("bad weights".to_string())));
        client.expect_inference_up().withf(|model, _| model == "B").times(0);
        client.expect_inference_health().times(0);
        client.expect_set_node_state().times(1).returning(|_, _| Ok(()));
        let h = harness(vec![node_ab()], client, StaticCompletionSender::with_status(200));

        let outcome = h.runner.run_node_test(&node_ab()).await;

        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.failing_model, "A");
        assert_eq!(outcome.error, "Protocol error: bad weights");
        assert_eq!(outcome.metrics.load_ms.keys().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(h.sender.calls(), 0);
        assert_eq!(h.queue.commands().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_queues_state_then_reason() {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().returning(|_, _| Ok(()));
        client.expect_inference_health().times(1).returning(|| Ok(false));
        client
            .expect_set_node_state()
            .withf(|state, reason| *state == OnboardingState::TestFailed && reason == "health_not_ok")
            .times(1)
            .returning(|_, _| Ok(()));
        let h = harness(vec![node_ab()], client, StaticCompletionSender::with_status(200));

        let outcome = h.runner.run_node_test(&node_ab()).await;

        assert_eq!(outcome.error, "health_not_ok");
        assert_eq!(outcome.failing_model, "");
        assert_eq!(outcome.failure, Some(AdmissionFailure::HealthNotOk));
        assert_eq!(h.sender.calls(), 0);
        assert_eq!(
            h.queue.commands().await,
            vec![
                NodeCommand::set_onboarding_state("node-1", OnboardingState::TestFailed),
                NodeCommand::set_failure_reason("node-1", "health_not_ok"),
            ]
        );
    }

    #[tokio::test]
    async fn test_health_transport_error_text() {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().returning(|_, _| Ok(()));
        client
            .expect_inference_health()
            .returning(|| Err(ServiceError::ConnectionError("connection refused".to_string())));
        client.expect_set_node_state().returning(|_, _| Ok(()));
        let h = harness(vec![node_ab()], client, StaticCompletionSender::with_status(200));

        let outcome = h.runner.run_node_test(&node_ab()).await;
        assert_eq!(outcome.error, "Connection error: connection refused");
        assert!(matches!(outcome.failure, Some(AdmissionFailure::HealthTransport(_))));
    }

    #[tokio::test]
    async fn test_non_success_status_code() {
        let mut client = healthy_client();
        client.expect_set_node_state().times(1).returning(|_, _| Ok(()));
        let h = harness(vec![node_ab()], client, StaticCompletionSender::with_status(500));

        let outcome = h.runner.run_node_test(&node_ab()).await;

        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.error, "non_success_status_code");
        assert_eq!(outcome.failing_model, "");
        assert_eq!(outcome.metrics.resp_ms, 0);
        assert_eq!(h.queue.commands().await.len(), 2);
    }

    #[tokio::test]
    async fn test_inference_transport_error_text() {
        let mut client = healthy_client();
        client.expect_set_node_state().returning(|_, _| Ok(()));
        let h = harness(
            vec![node_ab()],
            client,
            StaticCompletionSender::failing(ServiceError::TimeoutError("read timed out".to_string())),
        );

        let outcome = h.runner.run_node_test(&node_ab()).await;
        assert_eq!(outcome.error, "Timeout error: read timed out");
    }

    #[tokio::test]
    async fn test_node_without_models_cannot_sample() {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().times(0);
        client.expect_inference_health().times(1).returning(|| Ok(true));
        client.expect_set_node_state().returning(|_, _| Ok(()));
        let node = NodeConfig::new("bare", "10.0.0.9", 5000, 8080);
        let h = harness(vec![node.clone()], client, StaticCompletionSender::with_status(200));

        let outcome = h.runner.run_node_test(&node).await;
        assert_eq!(outcome.error, "no_models_configured");
        assert_eq!(
            outcome.failure,
            Some(AdmissionFailure::RequestBuild("no_models_configured".to_string()))
        );
        assert!(outcome.metrics.load_ms.is_empty());
        // không có request nào với model rỗng
        assert_eq!(h.sender.calls(), 0);
        assert!(h.sender.last_request().is_none());
    }

    #[tokio::test]
    async fn test_side_effect_failures_do_not_change_outcome() {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().returning(|_, _| Ok(()));
        client.expect_inference_health().returning(|| Ok(false));
        client
            .expect_set_node_state()
            .times(1)
            .returning(|_, _| Err(ServiceError::ConnectionError("node gone".to_string())));
        let h = harness_with(
            AdmissionConfig::default(),
            vec![node_ab()],
            client,
            StaticCompletionSender::with_status(200),
            InMemoryCommandQueue::rejecting(),
        );

        let outcome = h.runner.run_node_test(&node_ab()).await;
        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.error, "health_not_ok");
        assert!(h.queue.commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_reduced_variant_skips_sample_and_notification() {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().returning(|_, _| Ok(()));
        client.expect_inference_health().returning(|| Ok(false));
        client.expect_set_node_state().times(0);
        let h = harness_with(
            AdmissionConfig::reduced(),
            vec![node_ab()],
            client,
            StaticCompletionSender::with_status(200),
            InMemoryCommandQueue::new(),
        );

        let failed = h.runner.run_node_test(&node_ab()).await;
        assert_eq!(failed.error, "health_not_ok");
        assert_eq!(h.queue.commands().await.len(), 2);
        assert_eq!(h.sender.calls(), 0);
    }

    #[tokio::test]
    async fn test_reduced_variant_success_without_sample() {
        let mut client = healthy_client();
        client.expect_set_node_state().times(0);
        let h = harness_with(
            AdmissionConfig::reduced(),
            vec![node_ab()],
            client,
            StaticCompletionSender::with_status(500),
            InMemoryCommandQueue::new(),
        );

        let outcome = h.runner.run_node_test(&node_ab()).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.metrics.resp_ms, 0);
        assert_eq!(h.sender.calls(), 0);
    }

    #[tokio::test]
    async fn test_runner_without_queue() {
        let mut client = healthy_client();
        client.expect_set_node_state().times(0);
        let runner = AdmissionTestRunner::new(
            AdmissionConfig::default(),
            Arc::new(StaticNodeConfigSource::new(vec![node_ab()], "")),
            None,
            Arc::new(FixedNodeClientFactory::new(Arc::new(client))),
            Arc::new(StaticCompletionSender::with_status(200)),
        );
        assert!(runner.run_node_test(&node_ab()).await.is_success());
    }

    #[tokio::test]
    async fn test_manual_test_unknown_node() {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().times(0);
        client.expect_inference_health().times(0);
        client.expect_set_node_state().times(0);
        let h = harness(vec![node_ab()], client, StaticCompletionSender::with_status(200));

        let outcome = h.runner.run_manual_test("ghost").await;

        assert_eq!(outcome.node_id, "ghost");
        assert_eq!(outcome.status, TestStatus::Failed);
        assert_eq!(outcome.error, "node_not_found");
        assert_eq!(outcome.metrics, TestMetrics::default());
        assert!(h.factory.created_urls().is_empty());
        assert!(h.queue.commands().await.is_empty());
    }

    #[tokio::test]
    async fn test_manual_test_uses_versioned_poc_url() {
        let mut client = healthy_client();
        client.expect_set_node_state().times(0);
        let node = node_ab().with_segments("", "/api");
        let queue = Arc::new(InMemoryCommandQueue::new());
        let factory = Arc::new(FixedNodeClientFactory::new(Arc::new(client)));
        let runner = AdmissionTestRunner::new(
            AdmissionConfig::default(),
            Arc::new(StaticNodeConfigSource::new(vec![node], "v3.0.8")),
            Some(queue),
            factory.clone(),
            Arc::new(StaticCompletionSender::with_status(200)),
        );

        let outcome = runner.run_manual_test("node-1").await;
        assert!(outcome.is_success());
        assert_eq!(
            factory.created_urls(),
            vec![(
                "http://10.0.0.5:8080/v3.0.8/api".to_string(),
                "http://10.0.0.5:5000".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_auto_tests_gated_by_threshold() {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().times(0);
        client.expect_inference_health().times(0);
        let h = harness(vec![node_ab()], client, StaticCompletionSender::with_status(200));

        assert!(!h.runner.should_auto_test(3600));
        assert!(h.runner.should_auto_test(3601));
        assert!(!h.runner.should_auto_test(-5));
        assert!(h.runner.run_auto_tests(3600).await.is_empty());
        assert!(h.factory.created_urls().is_empty());
    }

    #[tokio::test]
    async fn test_auto_tests_follow_config_order() {
        let mut client = MockNodeClientMock::new();
        client.expect_inference_up().returning(|_, _| Ok(()));
        client.expect_inference_health().times(2).returning(|| Ok(true));
        let nodes = vec![
            NodeConfig::new("second", "10.0.0.2", 5000, 8080).with_model("m", &[]),
            NodeConfig::new("first", "10.0.0.1", 5000, 8080).with_model("m", &[]),
        ];
        let h = harness(nodes, client, StaticCompletionSender::with_status(200));

        let outcomes = h.runner.run_auto_tests(7200).await;
        let ids: Vec<&str> = outcomes.iter().map(|o| o.node_id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
        assert!(outcomes.iter().all(|o| o.is_success()));
    }

    struct SlowHealthClient;

    #[async_trait]
    impl NodeClient for SlowHealthClient {
        async fn inference_up(&self, _model_id: &str, _args: &[String]) -> Result<(), ServiceError> {
            Ok(())
        }

        async fn inference_health(&self) -> Result<bool, ServiceError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(true)
        }

        async fn set_node_state(&self, _state: OnboardingState, _reason: &str) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_stage_deadline_maps_to_deadline_exceeded() {
        let config = AdmissionConfig {
            stage_timeout_secs: Some(1),
            ..AdmissionConfig::default()
        };
        let runner = AdmissionTestRunner::new(
            config,
            Arc::new(StaticNodeConfigSource::new(vec![], "")),
            None,
            Arc::new(FixedNodeClientFactory::new(Arc::new(SlowHealthClient))),
            Arc::new(StaticCompletionSender::with_status(200)),
        );

        let outcome = runner.run_node_test(&node_ab()).await;
        assert_eq!(outcome.error, "deadline_exceeded");
        assert!(matches!(outcome.failure, Some(AdmissionFailure::HealthTransport(_))));
        assert!(outcome.metrics.health_ms >= 900);
    }

    #[test]
    fn test_constructors_keep_error_invariant() {
        let failed = TestOutcome::failed(
            "node-1",
            AdmissionFailure::HealthTransport(String::new()),
            TestMetrics::default(),
        );
        assert_eq!(failed.status, TestStatus::Failed);
        assert!(!failed.error.is_empty());

        let failed = TestOutcome::failed(
            "node-1",
            AdmissionFailure::ModelLoad {
                model: "A".to_string(),
                message: String::new(),
            },
            TestMetrics::default(),
        );
        assert!(!failed.error.is_empty());
        assert_eq!(failed.failing_model, "A");

        let ok = TestOutcome::success("node-1", TestMetrics::default());
        assert!(ok.error.is_empty());
        assert!(ok.failing_model.is_empty());
        assert!(ok.failure.is_none());
    }

    #[test]
    fn test_outcome_json_shape() {
        let outcome = TestOutcome::failed(
            "node-1",
            AdmissionFailure::InferenceStatus(502),
            TestMetrics::default(),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "FAILED");
        assert_eq!(value["error"], "non_success_status_code");
        assert_eq!(value["failure"]["kind"], "inference_status");

        let success = serde_json::to_value(TestOutcome::success("node-1", TestMetrics::default())).unwrap();
        assert_eq!(success["status"], "SUCCESS");
        assert!(success.get("failure").is_none());
    }
}
