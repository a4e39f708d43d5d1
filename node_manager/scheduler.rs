// AutoTestScheduler: định kỳ hỏi countdown tới PoC và chạy auto admission tests
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::infra::service_traits::ServiceError;
use crate::logs::NODES;
use crate::node_manager::admission::{AdmissionTestRunner, TestOutcome};
use crate::node_manager::status_reporter::StatusReporter;
use crate::node_manager::OnboardingState;

/// Nguồn countdown (giây) tới PoC kế tiếp
#[async_trait]
pub trait PocCountdown: Send + Sync + 'static {
    async fn seconds_until_next_poc(&self) -> Result<i64, ServiceError>;
}

/// Countdown tính từ block height: (next - current) * block_time
pub struct BlockHeightCountdown {
    heights: RwLock<Option<(u64, u64)>>,
    block_time_seconds: f64,
}

impl BlockHeightCountdown {
    pub fn new(block_time_seconds: f64) -> Self {
        Self {
            heights: RwLock::new(None),
            block_time_seconds,
        }
    }

    pub fn with_heights(block_time_seconds: f64, current_block: u64, next_poc_block: u64) -> Self {
        Self {
            heights: RwLock::new(Some((current_block, next_poc_block))),
            block_time_seconds,
        }
    }

    /// Cập nhật block height hiện tại và block bắt đầu PoC kế tiếp
    pub async fn set_heights(&self, current_block: u64, next_poc_block: u64) {
        debug!(
            "[BlockHeightCountdown] current block {}, next PoC block {}",
            current_block, next_poc_block
        );
        *self.heights.write().await = Some((current_block, next_poc_block));
    }

    pub async fn heights(&self) -> Option<(u64, u64)> {
        *self.heights.read().await
    }

    /// Số giây còn lại, làm tròn xuống, không âm
    pub fn seconds_between(current_block: u64, next_poc_block: u64, block_time_seconds: f64) -> i64 {
        if next_poc_block <= current_block {
            return 0;
        }
        let blocks = (next_poc_block - current_block) as f64;
        (blocks * block_time_seconds).floor().max(0.0) as i64
    }
}

#[async_trait]
impl PocCountdown for BlockHeightCountdown {
    async fn seconds_until_next_poc(&self) -> Result<i64, ServiceError> {
        match *self.heights.read().await {
            Some((current, next)) => Ok(Self::seconds_between(current, next, self.block_time_seconds)),
            None => Err(ServiceError::NotFoundError("block heights not reported yet".to_string())),
        }
    }
}

/// Scheduler chạy auto tests theo chu kỳ
pub struct AutoTestScheduler {
    runner: Arc<AdmissionTestRunner>,
    countdown: Arc<dyn PocCountdown>,
    reporter: StatusReporter,
    interval: Duration,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AutoTestScheduler {
    pub fn new(
        runner: Arc<AdmissionTestRunner>,
        countdown: Arc<dyn PocCountdown>,
        reporter: StatusReporter,
        interval: Duration,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            runner,
            countdown,
            reporter,
            interval,
            stop_tx,
            handle: Mutex::new(None),
        }
    }

    /// Một vòng: lấy countdown, log guidance, chạy auto tests
    pub async fn run_once(&self) -> Vec<TestOutcome> {
        let seconds = match self.countdown.seconds_until_next_poc().await {
            Ok(seconds) => seconds,
            Err(e) => {
                warn!("[AutoTestScheduler] Cannot get PoC countdown: {}", e);
                return Vec::new();
            }
        };
        self.reporter.log_timing_guidance(seconds);

        let outcomes = self.runner.run_auto_tests(seconds).await;
        for outcome in &outcomes {
            let next = if outcome.is_success() {
                OnboardingState::WaitingForPoc
            } else {
                OnboardingState::TestFailed
            };
            self.reporter.log_onboarding_transition(OnboardingState::Testing, next);
            let message = self.reporter.build_onboarding_message(next, seconds, &outcome.failing_model);
            info!(target: NODES, node_id = %outcome.node_id, "[AutoTestScheduler] {}", message);
        }
        outcomes
    }

    /// Khởi động vòng lặp nền, trả về false nếu đang chạy
    ///
    /// Task chỉ giữ `Weak`, drop scheduler sẽ dừng vòng lặp.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut handle = self.handle.lock().await;
        if handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
            return false;
        }

        // send() bị bỏ qua khi chưa có receiver, phải dùng send_replace
        self.stop_tx.send_replace(false);
        let mut rx = self.stop_tx.subscribe();
        let scheduler = Arc::downgrade(self);
        let interval = self.interval;
        info!("[AutoTestScheduler] Started, interval {:?}", interval);

        *handle = Some(tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            loop {
                if *rx.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        let scheduler = match scheduler.upgrade() {
                            Some(scheduler) => scheduler,
                            None => break,
                        };
                        let outcomes = scheduler.run_once().await;
                        debug!("[AutoTestScheduler] Tick finished, {} node(s) tested", outcomes.len());
                    },
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            info!("[AutoTestScheduler] Received stop signal");
                            break;
                        }
                    }
                }
            }
        }));
        true
    }

    /// Dừng vòng lặp và chờ task kết thúc
    pub async fn stop(&self) {
        self.stop_tx.send_replace(true);
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("[AutoTestScheduler] Loop task ended abnormally: {}", e);
            }
        }
        info!("[AutoTestScheduler] Stopped");
    }
}

impl Drop for AutoTestScheduler {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}
