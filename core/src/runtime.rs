//! `CoreRuntime`: the single explicit dependency-injection struct that
//! assembles and owns every subsystem for a process lifetime (spec §9,
//! "Global singletons").
//!
//! Assembly order follows the data-flow description in spec §2: a
//! Persistence Adapter and Broker Adapter are the only two components
//! every other component depends on; Performance Monitor and Agent
//! Registry are siblings built on top of Persistence; Orchestrator and
//! Distributed Task Service sit on top of all four.

use std::sync::Arc;

use agentaskit_shared::config::CoreConfig;
use agentaskit_shared::errors::CoreResult;
use tracing::info;

use crate::broker::memory::InMemoryBroker;
use crate::broker::redis::RedisBroker;
use crate::broker::BrokerAdapter;
use crate::distributed::DistributedTaskService;
use crate::llm::{LlmClient, MockLlmClient};
use crate::orchestrator::execution::{EchoExecutor, SubtaskExecutor};
use crate::orchestrator::Orchestrator;
use crate::performance::PerformanceMonitor;
use crate::persistence::memory::InMemoryPersistence;
use crate::persistence::postgres::PostgresPersistence;
use crate::persistence::PersistenceAdapter;
use crate::registry::AgentRegistry;

pub struct CoreRuntime {
    pub config: CoreConfig,
    pub persistence: Arc<dyn PersistenceAdapter>,
    pub broker: Arc<dyn BrokerAdapter>,
    pub performance: Arc<PerformanceMonitor>,
    pub registry: Arc<AgentRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub distributed: Arc<DistributedTaskService>,
    node_id: String,
}

/// Backends a runtime may be wired against; chosen by the caller (the
/// binary entry point) based on configuration, not guessed internally.
pub enum PersistenceBackend {
    InMemory,
    Postgres,
}

pub enum BrokerBackend {
    InMemory,
    Redis,
}

impl CoreRuntime {
    pub async fn assemble(
        config: CoreConfig,
        persistence_backend: PersistenceBackend,
        broker_backend: BrokerBackend,
        llm: Option<Arc<dyn LlmClient>>,
        executor: Option<Arc<dyn SubtaskExecutor>>,
    ) -> CoreResult<Arc<Self>> {
        let persistence: Arc<dyn PersistenceAdapter> = match persistence_backend {
            PersistenceBackend::InMemory => Arc::new(InMemoryPersistence::new()),
            PersistenceBackend::Postgres => {
                let adapter = PostgresPersistence::connect(
                    &config.persistence.database_url,
                    config.persistence.max_connections,
                )
                .await
                .map_err(agentaskit_shared::errors::CoreError::Internal)?;
                adapter
                    .run_migrations()
                    .await
                    .map_err(agentaskit_shared::errors::CoreError::Internal)?;
                Arc::new(adapter)
            }
        };

        let broker: Arc<dyn BrokerAdapter> = match broker_backend {
            BrokerBackend::InMemory => Arc::new(InMemoryBroker::new()),
            BrokerBackend::Redis => Arc::new(
                RedisBroker::connect(&config.broker.redis_url)
                    .await
                    .map_err(agentaskit_shared::errors::CoreError::Internal)?,
            ),
        };

        let performance = Arc::new(PerformanceMonitor::new(persistence.clone()).await?);
        let registry = Arc::new(AgentRegistry::new(persistence.clone()).await?);

        let llm = llm.unwrap_or_else(|| Arc::new(MockLlmClient));
        let executor = executor.unwrap_or_else(|| Arc::new(EchoExecutor));

        let orchestrator = Arc::new(Orchestrator::new(
            persistence.clone(),
            registry.clone(),
            performance.clone(),
            llm,
            executor,
            config.orchestrator.submission_queue_capacity,
            config.orchestrator.cancellation_grace(),
        ));

        let node_id = crate::distributed::worker::generate_worker_id();
        let distributed = Arc::new(DistributedTaskService::new(
            persistence.clone(),
            broker.clone(),
            node_id.clone(),
        ));

        Ok(Arc::new(Self {
            config,
            persistence,
            broker,
            performance,
            registry,
            orchestrator,
            distributed,
            node_id,
        }))
    }

    pub async fn start(self: &Arc<Self>) {
        self.performance.start().await;
        self.performance
            .spawn_flush_loop(std::time::Duration::from_secs(self.config.performance.flush_interval_secs));
        self.performance
            .spawn_alert_sweep(std::time::Duration::from_secs(self.config.performance.alert_sweep_interval_secs));

        self.orchestrator.start().await;

        self.distributed
            .start(
                vec!["default".to_string(), "agent_tasks".to_string(), "system_tasks".to_string()],
                std::time::Duration::from_secs(self.config.distributed.stale_sweep_interval_secs),
                std::time::Duration::from_secs(self.config.distributed.queue_sample_interval_secs),
                std::time::Duration::from_secs(self.config.distributed.election_check_interval_secs),
            )
            .await;

        info!(node_id = %self.node_id, "core runtime started");
    }

    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
        self.distributed.shutdown().await;
        self.performance.shutdown().await;
        info!(node_id = %self.node_id, "core runtime shut down");
    }
}
