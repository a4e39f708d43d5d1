use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use onboarding::api::{admin_routes, DefaultAdminApi};
use onboarding::config::{OnboardingConfig, DEFAULT_CONFIG_PATH};
use onboarding::infra::service_mocks::StaticNodeConfigSource;
use onboarding::logs::{init_logging, NODES};
use onboarding::messaging::{CommandBroker, NodeCommand};
use onboarding::node_manager::admission::AdmissionTestRunner;
use onboarding::node_manager::node_client::{HttpCompletionSender, HttpNodeClientFactory};
use onboarding::node_manager::scheduler::{AutoTestScheduler, BlockHeightCountdown};
use onboarding::node_manager::status_reporter::StatusReporter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Env từ .env (nếu có)
    dotenv::dotenv().ok();

    // 2. Load config
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = OnboardingConfig::load(&config_path)
        .with_context(|| format!("[CONFIG ERROR] Không thể tải cấu hình từ {}", config_path))?;

    // 3. Khởi tạo logging
    init_logging(&config.logging).context("[LOGGING ERROR] Không thể khởi tạo logging")?;
    info!(
        target: "onboarding_startup",
        "[CONFIG] {} node(s), version '{}', sample inference {}, notify on failure {}",
        config.nodes.len(),
        config.node_version,
        config.admission.sample_inference,
        config.admission.notify_node_on_failure
    );

    // 4. Command broker, consumer chỉ log lại command
    let (queue, mut receiver) = CommandBroker::channel(config.broker.capacity);
    let consumer = tokio::spawn(async move {
        while let Some(command) = receiver.recv().await {
            match &command {
                NodeCommand::SetOnboardingState { node_id, state } => {
                    info!(target: NODES, node_id = %node_id, state = %state, "[CommandBroker] Set onboarding state");
                }
                NodeCommand::SetFailureReason { node_id, reason } => {
                    info!(target: NODES, node_id = %node_id, reason = %reason, "[CommandBroker] Set failure reason");
                }
            }
        }
    });

    // 5. Runner và các collaborator
    let request_timeout = Duration::from_secs(config.admission.request_timeout_secs);
    let client_factory = HttpNodeClientFactory::new(request_timeout).context("[HTTP ERROR] node client")?;
    let completion_sender = HttpCompletionSender::new(request_timeout).context("[HTTP ERROR] completion sender")?;
    let runner = Arc::new(AdmissionTestRunner::new(
        config.admission.clone(),
        Arc::new(StaticNodeConfigSource::new(config.nodes.clone(), &config.node_version)),
        Some(Arc::new(queue)),
        Arc::new(client_factory),
        Arc::new(completion_sender),
    ));
    let reporter = StatusReporter::new(config.status.clone());

    // 6. Countdown tới PoC
    let countdown = Arc::new(match (config.scheduler.current_block, config.scheduler.next_poc_block) {
        (Some(current), Some(next)) => BlockHeightCountdown::with_heights(config.admission.block_time_seconds, current, next),
        _ => BlockHeightCountdown::new(config.admission.block_time_seconds),
    });

    // 7. Scheduler
    let scheduler = Arc::new(AutoTestScheduler::new(
        runner.clone(),
        countdown.clone(),
        reporter.clone(),
        Duration::from_secs(config.scheduler.interval_secs),
    ));
    if config.scheduler.enabled {
        scheduler.start().await;
    } else {
        warn!(target: "onboarding_startup", "[SCHEDULER] Auto tests disabled");
    }

    // 8. Admin API
    if config.api.enabled {
        let host_ip = config
            .api
            .host
            .parse::<IpAddr>()
            .with_context(|| format!("[HOST ERROR] Địa chỉ host không hợp lệ: {}", config.api.host))?;
        let addr = SocketAddr::new(host_ip, config.api.port);
        let api = Arc::new(DefaultAdminApi::new(runner.clone(), reporter.clone(), countdown.clone()));
        let routes = admin_routes(api);

        let (bound, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .with_context(|| format!("[API ERROR] Không thể bind {}", addr))?;
        info!(target: "onboarding_startup", "[API] Admin API listening on {}", bound);
        server.await;
    } else if let Err(e) = tokio::signal::ctrl_c().await {
        error!(target: "onboarding_startup", "[SIGNAL ERROR] {}", e);
    }

    // 9. Shutdown
    info!(target: "onboarding_startup", "[SHUTDOWN] Stopping scheduler");
    scheduler.stop().await;
    drop(scheduler);
    drop(runner);
    if tokio::time::timeout(Duration::from_secs(5), consumer).await.is_err() {
        warn!(target: "onboarding_startup", "[SHUTDOWN] Command consumer did not drain in time");
    }
    Ok(())
}
