use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use compliance_audit::AuditEngine;
use compliance_errors::{ComplianceError, ErrorKind};
use compliance_metrics::MetricsSource;
use compliance_registry::{Agent, AgentFactory};
use compliance_store::StoreGateway;
use compliance_types::{
    AgentCapabilities, AgentHealth, AgentRegistration, AgentState, AgentStatus, AgentTask, ComplianceEvent, OrchestratorStatus,
};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::queue::{QueuedTask, TaskQueue};

pub type CompletionSink = Arc<dyn Fn(TaskOutcome) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub result: Result<Value, ComplianceError>,
    pub duration_ms: u64,
}

/// Upstream source of compliance events, treated as an external collaborator
/// (spec.md §1) that the host process implements.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn poll_events(&self) -> Result<Vec<ComplianceEvent>, ComplianceError>;

    /// Picks an `agent_type` for `event` before it's wrapped in a task;
    /// defaults to empty, deferring entirely to `find_agent_for_task`'s
    /// registration-order scan.
    fn agent_type_hint(&self, _event: &ComplianceEvent) -> String {
        String::new()
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub drain_deadline: Duration,
    pub health_check_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let worker_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self { worker_count, queue_capacity: 10_000, drain_deadline: Duration::from_secs(30), health_check_interval: Duration::from_secs(300) }
    }
}

struct AgentEntry {
    agent: Arc<dyn Agent>,
    registration: AgentRegistration,
    status: RwLock<AgentStatus>,
}

/// Agent lifecycle, task routing, and execution (spec.md §4.1). The
/// orchestrator never holds a trait object back to the agent beyond the
/// `Agent` handle itself — it has no other channel into agent internals.
pub struct Orchestrator {
    store: Arc<dyn StoreGateway>,
    #[allow(dead_code)]
    audit: Arc<AuditEngine>,
    metrics: Arc<MetricsSource>,
    agents: RwLock<HashMap<String, AgentEntry>>,
    registration_order: RwLock<Vec<String>>,
    queue: TaskQueue,
    config: OrchestratorConfig,
    initialized: AtomicBool,
    shutdown_requested: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    task_sequence: AtomicU64,
    tasks_submitted: AtomicU64,
    tasks_processed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_in_progress: AtomicU64,
    last_health_check: Mutex<Option<Instant>>,
    samples: Mutex<HashMap<String, Vec<(u64, bool)>>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn StoreGateway>, audit: Arc<AuditEngine>, metrics: Arc<MetricsSource>, config: OrchestratorConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            audit,
            metrics,
            agents: RwLock::new(HashMap::new()),
            registration_order: RwLock::new(Vec::new()),
            queue: TaskQueue::new(config.queue_capacity),
            initialized: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            task_sequence: AtomicU64::new(0),
            tasks_submitted: AtomicU64::new(0),
            tasks_processed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_in_progress: AtomicU64::new(0),
            last_health_check: Mutex::new(None),
            samples: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Idempotent: a second call is a no-op. Fails with `CONFIGURATION` if
    /// `worker_count == 0`.
    pub fn initialize(self: &Arc<Self>) -> Result<(), ComplianceError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.config.worker_count == 0 {
            self.initialized.store(false, Ordering::SeqCst);
            return Err(ComplianceError::new(ErrorKind::Configuration, "compliance-orchestrator", "initialize", "worker_count must be non-zero"));
        }
        let mut workers = self.workers.lock();
        for worker_id in 0..self.config.worker_count {
            let orchestrator = Arc::clone(self);
            workers.push(tokio::spawn(async move { orchestrator.worker_loop(worker_id).await }));
        }
        tracing::info!(worker_count = self.config.worker_count, "orchestrator initialized");
        Ok(())
    }

    /// Signals workers, drains the queue up to `drain_deadline`, shuts down
    /// agents, releases resources. Safe to call multiple times.
    pub async fn shutdown(self: &Arc<Self>) {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.wake_all();
        let deadline = Instant::now() + self.config.drain_deadline;
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, handle).await.is_err() {
                tracing::warn!("worker did not drain before shutdown deadline");
            }
        }
        let agents: Vec<Arc<dyn Agent>> = self.agents.read().values().map(|e| e.agent.clone()).collect();
        for agent in agents {
            agent.shutdown().await;
        }
        tracing::info!("orchestrator shutdown complete");
    }

    pub fn register_agent(&self, registration: AgentRegistration, factory: &dyn AgentFactory) -> Result<(), ComplianceError> {
        if registration.capabilities.supported_event_kinds.is_empty() && registration.capabilities.supported_actions.is_empty() {
            return Err(ComplianceError::new(ErrorKind::Validation, "compliance-orchestrator", "register_agent", "capabilities must not be empty"));
        }
        if self.agents.read().contains_key(&registration.agent_type) {
            return Err(ComplianceError::new(ErrorKind::Conflict, "compliance-orchestrator", "register_agent", format!("agent_type {} already registered", registration.agent_type)));
        }
        let agent = factory.create()?;
        let agent_type = registration.agent_type.clone();
        let status = AgentStatus { state: AgentState::Ready, enabled: registration.enabled, ..Default::default() };
        self.agents.write().insert(agent_type.clone(), AgentEntry { agent, registration, status: RwLock::new(status) });
        self.registration_order.write().push(agent_type.clone());
        tracing::info!(agent_type = %agent_type, "agent registered");
        Ok(())
    }

    /// Shuts down the agent and removes it; tasks already dispatched
    /// complete normally (the removal only affects future routing).
    pub async fn unregister_agent(&self, agent_type: &str) -> bool {
        let entry = self.agents.write().remove(agent_type);
        self.registration_order.write().retain(|t| t != agent_type);
        match entry {
            Some(entry) => {
                entry.agent.shutdown().await;
                tracing::info!(agent_type = %agent_type, "agent unregistered");
                true
            }
            None => false,
        }
    }

    pub fn set_agent_enabled(&self, agent_type: &str, enabled: bool) -> bool {
        let agents = self.agents.read();
        match agents.get(agent_type) {
            Some(entry) => {
                entry.status.write().enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn next_task_id(&self) -> String {
        let micros = Utc::now().timestamp_micros();
        let counter = self.task_sequence.fetch_add(1, Ordering::Relaxed);
        format!("task_{micros}_{counter}")
    }

    /// Enqueues `task`. `Ok(false)` iff shutdown has been requested; `Err`
    /// iff the bounded queue is full (the submitter is informed, never a
    /// silent drop).
    pub fn submit_task(&self, task: AgentTask, completion_sink: Option<CompletionSink>) -> Result<bool, ComplianceError> {
        if self.shutdown_requested.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.queue
            .push(QueuedTask { task, completion_sink })
            .map_err(|_| ComplianceError::new(ErrorKind::Resource, "compliance-orchestrator", "submit_task", "task queue is at capacity"))?;
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
        self.metrics.incr("orchestrator_tasks_submitted_total", "tasks submitted", &[]);
        Ok(true)
    }

    /// Drains the upstream event source, wraps each event in a task via
    /// `find_agent_for_task`, and submits it. Also triggers periodic health
    /// checks every `health_check_interval`.
    pub async fn process_pending_events(&self, source: &dyn EventSource) -> Result<usize, ComplianceError> {
        let events = source.poll_events().await?;
        let mut submitted = 0;
        for event in events {
            let agent_type = source.agent_type_hint(&event);
            let task = AgentTask::new(self.next_task_id(), agent_type, event, compliance_types::TaskPriority::Normal, Utc::now() + chrono::Duration::minutes(5));
            if self.submit_task(task, None)? {
                submitted += 1;
            }
        }

        let due = {
            let mut last = self.last_health_check.lock();
            let due = last.map(|t| t.elapsed() >= self.config.health_check_interval).unwrap_or(true);
            if due {
                *last = Some(Instant::now());
            }
            due
        };
        if due {
            self.run_health_checks().await;
        }
        Ok(submitted)
    }

    pub async fn run_health_checks(&self) {
        let agents: Vec<(String, Arc<dyn Agent>)> = self.agents.read().iter().map(|(k, v)| (k.clone(), v.agent.clone())).collect();
        for (agent_type, agent) in agents {
            let healthy = agent.perform_health_check().await;
            if let Some(entry) = self.agents.read().get(&agent_type) {
                entry.status.write().record_health_check(healthy);
            }
            tracing::info!(agent_type = %agent_type, healthy, "agent health check");
        }
    }

    /// Three-step routing: exact `task.agent_type` match, else a
    /// registration-order scan, else `NO_SUITABLE_AGENT`.
    fn find_agent_for_task(&self, task: &AgentTask) -> Result<(String, Arc<dyn Agent>), ComplianceError> {
        let agents = self.agents.read();
        if !task.agent_type.is_empty() {
            if let Some(entry) = agents.get(&task.agent_type) {
                let enabled = entry.status.read().enabled;
                if enabled && entry.agent.capabilities().can_handle(task.event.kind) {
                    return Ok((task.agent_type.clone(), entry.agent.clone()));
                }
            }
        }
        for agent_type in self.registration_order.read().iter() {
            if let Some(entry) = agents.get(agent_type) {
                let enabled = entry.status.read().enabled;
                if enabled && entry.agent.capabilities().can_handle(task.event.kind) {
                    return Ok((agent_type.clone(), entry.agent.clone()));
                }
            }
        }
        Err(ComplianceError::new(ErrorKind::NotFound, "compliance-orchestrator", "find_agent_for_task", "no suitable agent").with_context("code", "NO_SUITABLE_AGENT"))
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        loop {
            let queued = match self.queue.pop(&self.shutdown_requested).await {
                Some(queued) => queued,
                None => break,
            };
            self.execute_task(queued).await;
        }
        tracing::info!(worker_id, "worker exited");
    }

    async fn execute_task(&self, queued: QueuedTask) {
        let QueuedTask { task, completion_sink } = queued;
        let start = Instant::now();

        let routed = self.find_agent_for_task(&task);
        let (agent_type, agent) = match routed {
            Ok(pair) => pair,
            Err(err) => {
                self.finish_task(&task, Err(err), start, completion_sink);
                return;
            }
        };

        let unavailable = {
            let agents = self.agents.read();
            match agents.get(&agent_type) {
                Some(entry) => {
                    let status = entry.status.read();
                    !status.enabled || status.health == AgentHealth::Critical
                }
                None => true,
            }
        };
        if unavailable {
            let err = ComplianceError::new(ErrorKind::Resource, "compliance-orchestrator", "execute_task", format!("agent {agent_type} unavailable")).with_context("code", "AGENT_UNAVAILABLE");
            self.finish_task(&task, Err(err), start, completion_sink);
            return;
        }

        self.tasks_in_progress.fetch_add(1, Ordering::Relaxed);
        let result = catch_panics(agent.process_event(&task.event)).await;
        self.tasks_in_progress.fetch_sub(1, Ordering::Relaxed);

        self.record_agent_outcome(&agent_type, start.elapsed(), result.is_ok());
        self.finish_task(&task, result, start, completion_sink);
    }

    fn record_agent_outcome(&self, agent_type: &str, duration: Duration, success: bool) {
        let agents = self.agents.read();
        if let Some(entry) = agents.get(agent_type) {
            let mut status = entry.status.write();
            let metrics = &mut status.metrics;
            let n = metrics.tasks_processed as f64;
            metrics.avg_duration_ms = (metrics.avg_duration_ms * n + duration.as_millis() as f64) / (n + 1.0);
            metrics.tasks_processed += 1;
            if !success {
                metrics.tasks_failed += 1;
            }
        }
        let mut samples = self.samples.lock();
        samples.entry(agent_type.to_string()).or_default().push((Utc::now().timestamp() as u64, success));
    }

    fn finish_task(&self, task: &AgentTask, result: Result<Value, ComplianceError>, start: Instant, completion_sink: Option<CompletionSink>) {
        let duration_ms = start.elapsed().as_millis() as u64;
        if result.is_ok() {
            self.tasks_processed.fetch_add(1, Ordering::Relaxed);
            self.metrics.incr("orchestrator_tasks_processed_total", "tasks processed", &[]);
        } else {
            self.tasks_failed.fetch_add(1, Ordering::Relaxed);
            self.metrics.incr("orchestrator_tasks_failed_total", "tasks failed", &[]);
        }
        tracing::info!(task_id = %task.task_id, agent_type = %task.agent_type, duration_ms, success = result.is_ok(), "task completed");
        if let Some(sink) = completion_sink {
            sink(TaskOutcome { task_id: task.task_id.clone(), result, duration_ms });
        }
    }

    pub fn get_status(&self) -> OrchestratorStatus {
        let agents = self.agents.read().iter().map(|(k, v)| (k.clone(), v.status.read().clone())).collect();
        let workers_alive = self.workers.lock().iter().all(|h| !h.is_finished());
        let all_agents_healthy = self.agents.read().values().all(|e| e.status.read().health != AgentHealth::Critical);
        OrchestratorStatus {
            healthy: !self.shutdown_requested.load(Ordering::SeqCst) && workers_alive && all_agents_healthy,
            shutdown_requested: self.shutdown_requested.load(Ordering::SeqCst),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_processed: self.tasks_processed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_in_progress: self.tasks_in_progress.load(Ordering::Relaxed),
            queue_depth: self.queue.len(),
            agents,
        }
    }

    pub fn render_metrics(&self) -> String {
        self.metrics.render_prometheus()
    }

    pub fn agent_capabilities(&self, agent_type: &str) -> Option<AgentCapabilities> {
        self.agents.read().get(agent_type).map(|e| e.agent.capabilities().clone())
    }

    pub fn agent_registration(&self, agent_type: &str) -> Option<AgentRegistration> {
        self.agents.read().get(agent_type).map(|e| e.registration.clone())
    }

    pub(crate) fn samples_snapshot(&self) -> HashMap<String, Vec<(u64, bool)>> {
        self.samples.lock().clone()
    }

    pub fn store(&self) -> &Arc<dyn StoreGateway> {
        &self.store
    }
}

/// Converts an agent panic into a `Processing` error instead of unwinding
/// through the worker loop (spec.md §4.1 "Uncaught panics must not take down
/// the worker").
async fn catch_panics<F>(future: F) -> Result<Value, ComplianceError>
where
    F: Future<Output = Result<Value, ComplianceError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(_) => Err(ComplianceError::new(ErrorKind::Processing, "compliance-orchestrator", "execute_task", "agent panicked while processing event")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_audit::AuditEngine;
    use compliance_store::InMemoryStore;
    use compliance_types::{AgentCapabilities, ComplianceEvent, EventKind, Severity, TaskPriority};
    use std::sync::atomic::AtomicUsize;

    struct EchoAgent(AgentCapabilities);

    #[async_trait::async_trait]
    impl Agent for EchoAgent {
        fn capabilities(&self) -> &AgentCapabilities {
            &self.0
        }

        async fn process_event(&self, event: &ComplianceEvent) -> Result<Value, ComplianceError> {
            Ok(event.data.clone())
        }
    }

    struct PanickingAgent(AgentCapabilities);

    #[async_trait::async_trait]
    impl Agent for PanickingAgent {
        fn capabilities(&self) -> &AgentCapabilities {
            &self.0
        }

        async fn process_event(&self, _event: &ComplianceEvent) -> Result<Value, ComplianceError> {
            panic!("boom");
        }
    }

    struct SlowAgent(AgentCapabilities);

    #[async_trait::async_trait]
    impl Agent for SlowAgent {
        fn capabilities(&self) -> &AgentCapabilities {
            &self.0
        }

        async fn process_event(&self, event: &ComplianceEvent) -> Result<Value, ComplianceError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(event.data.clone())
        }
    }

    fn caps(kind: EventKind) -> AgentCapabilities {
        AgentCapabilities { supported_event_kinds: vec![kind], supported_actions: vec![], knowledge_domains: vec![], real_time_capable: true, batch_capable: false, max_concurrent_tasks: 4 }
    }

    fn orchestrator() -> Arc<Orchestrator> {
        let store = Arc::new(InMemoryStore::new());
        let audit = Arc::new(AuditEngine::new(store.clone()));
        let metrics = Arc::new(MetricsSource::new());
        Orchestrator::new(store, audit, metrics, OrchestratorConfig { worker_count: 2, queue_capacity: 16, drain_deadline: Duration::from_secs(5), health_check_interval: Duration::from_secs(300) })
    }

    fn registration(agent_type: &str, kind: EventKind) -> AgentRegistration {
        AgentRegistration { agent_type: agent_type.to_string(), display_name: agent_type.to_string(), capabilities: caps(kind), enabled: true }
    }

    #[tokio::test]
    async fn submitted_task_is_routed_executed_and_counted() {
        let orchestrator = orchestrator();
        orchestrator.initialize().unwrap();
        orchestrator
            .register_agent(registration("kyc", EventKind::Transaction), &(|| Ok(Arc::new(EchoAgent(caps(EventKind::Transaction))) as Arc<dyn Agent>))
                as &dyn AgentFactory)
            .unwrap();

        let done = Arc::new(tokio::sync::Notify::new());
        let done_clone = done.clone();
        let sink: CompletionSink = Arc::new(move |_outcome| done_clone.notify_one());

        let event = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "core").with_data(serde_json::json!({"amount": 10}));
        let task = AgentTask::new(orchestrator.next_task_id(), "kyc", event, TaskPriority::Normal, Utc::now());
        assert!(orchestrator.submit_task(task, Some(sink)).unwrap());

        tokio::time::timeout(Duration::from_secs(2), done.notified()).await.unwrap();
        let status = orchestrator.get_status();
        assert_eq!(status.tasks_processed, 1);
        assert_eq!(status.tasks_failed, 0);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn unroutable_event_kind_fails_with_no_suitable_agent() {
        let orchestrator = orchestrator();
        orchestrator.initialize().unwrap();
        orchestrator
            .register_agent(registration("kyc", EventKind::Transaction), &(|| Ok(Arc::new(EchoAgent(caps(EventKind::Transaction))) as Arc<dyn Agent>))
                as &dyn AgentFactory)
            .unwrap();

        let done = Arc::new(tokio::sync::Notify::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let done_clone = done.clone();
        let seen_clone = seen.clone();
        let sink: CompletionSink = Arc::new(move |outcome| {
            if outcome.result.is_err() {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
            done_clone.notify_one();
        });

        let event = ComplianceEvent::new(EventKind::HealthCheck, Severity::Info, "core");
        let task = AgentTask::new(orchestrator.next_task_id(), "", event, TaskPriority::Normal, Utc::now());
        orchestrator.submit_task(task, Some(sink)).unwrap();

        tokio::time::timeout(Duration::from_secs(2), done.notified()).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn panicking_agent_becomes_a_task_failure_not_a_dead_worker() {
        let orchestrator = orchestrator();
        orchestrator.initialize().unwrap();
        orchestrator
            .register_agent(registration("kyc", EventKind::Transaction), &(|| Ok(Arc::new(PanickingAgent(caps(EventKind::Transaction))) as Arc<dyn Agent>))
                as &dyn AgentFactory)
            .unwrap();

        let done = Arc::new(tokio::sync::Notify::new());
        let done_clone = done.clone();
        let sink: CompletionSink = Arc::new(move |_outcome| done_clone.notify_one());
        let event = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "core");
        let task = AgentTask::new(orchestrator.next_task_id(), "kyc", event, TaskPriority::Normal, Utc::now());
        orchestrator.submit_task(task, Some(sink)).unwrap();
        tokio::time::timeout(Duration::from_secs(2), done.notified()).await.unwrap();

        // Submit a second task to prove the worker survived the panic.
        let done2 = Arc::new(tokio::sync::Notify::new());
        let done2_clone = done2.clone();
        let sink2: CompletionSink = Arc::new(move |_outcome| done2_clone.notify_one());
        let event2 = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "core");
        let task2 = AgentTask::new(orchestrator.next_task_id(), "kyc", event2, TaskPriority::Normal, Utc::now());
        orchestrator.submit_task(task2, Some(sink2)).unwrap();
        tokio::time::timeout(Duration::from_secs(2), done2.notified()).await.unwrap();

        let status = orchestrator.get_status();
        assert_eq!(status.tasks_failed, 2);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn register_agent_rejects_empty_capabilities() {
        let orchestrator = orchestrator();
        let empty_caps = AgentCapabilities { supported_event_kinds: vec![], supported_actions: vec![], knowledge_domains: vec![], real_time_capable: false, batch_capable: false, max_concurrent_tasks: 1 };
        let registration = AgentRegistration { agent_type: "empty".to_string(), display_name: "empty".to_string(), capabilities: empty_caps, enabled: true };
        let err = orchestrator
            .register_agent(registration, &(|| Ok(Arc::new(EchoAgent(caps(EventKind::Transaction))) as Arc<dyn Agent>)) as &dyn AgentFactory)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn register_agent_rejects_duplicate_agent_type() {
        let orchestrator = orchestrator();
        let factory = || Ok(Arc::new(EchoAgent(caps(EventKind::Transaction))) as Arc<dyn Agent>);
        orchestrator.register_agent(registration("kyc", EventKind::Transaction), &factory as &dyn AgentFactory).unwrap();
        let err = orchestrator.register_agent(registration("kyc", EventKind::Transaction), &factory as &dyn AgentFactory).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn submit_task_after_shutdown_returns_false() {
        let orchestrator = orchestrator();
        orchestrator.initialize().unwrap();
        orchestrator.shutdown().await;
        let event = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "core");
        let task = AgentTask::new(orchestrator.next_task_id(), "kyc", event, TaskPriority::Normal, Utc::now());
        assert!(!orchestrator.submit_task(task, None).unwrap());
    }

    #[tokio::test]
    async fn queue_overflow_is_reported_to_the_submitter_not_dropped_silently() {
        let store = Arc::new(InMemoryStore::new());
        let audit = Arc::new(AuditEngine::new(store.clone()));
        let metrics = Arc::new(MetricsSource::new());
        let orchestrator = Orchestrator::new(store, audit, metrics, OrchestratorConfig { worker_count: 1, queue_capacity: 2, drain_deadline: Duration::from_secs(5), health_check_interval: Duration::from_secs(300) });
        orchestrator.initialize().unwrap();
        orchestrator
            .register_agent(registration("kyc", EventKind::Transaction), &(|| Ok(Arc::new(SlowAgent(caps(EventKind::Transaction))) as Arc<dyn Agent>))
                as &dyn AgentFactory)
            .unwrap();

        let submit = |orchestrator: &Arc<Orchestrator>| {
            let event = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "core");
            let task = AgentTask::new(orchestrator.next_task_id(), "kyc", event, TaskPriority::Normal, Utc::now());
            orchestrator.submit_task(task, None)
        };

        // First task is dequeued by the lone worker immediately, leaving the
        // queue itself empty; the next two fill its capacity of 2.
        assert!(submit(&orchestrator).unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(submit(&orchestrator).unwrap());
        assert!(submit(&orchestrator).unwrap());

        let overflowed = submit(&orchestrator).unwrap_err();
        assert_eq!(overflowed.kind, ErrorKind::Resource);

        let status = orchestrator.get_status();
        assert_eq!(status.tasks_submitted, 3);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn disabled_agent_is_skipped_by_routing() {
        let orchestrator = orchestrator();
        orchestrator.initialize().unwrap();
        orchestrator
            .register_agent(registration("kyc", EventKind::Transaction), &(|| Ok(Arc::new(EchoAgent(caps(EventKind::Transaction))) as Arc<dyn Agent>))
                as &dyn AgentFactory)
            .unwrap();
        orchestrator.set_agent_enabled("kyc", false);

        let done = Arc::new(tokio::sync::Notify::new());
        let seen_err = Arc::new(AtomicUsize::new(0));
        let done_clone = done.clone();
        let seen_clone = seen_err.clone();
        let sink: CompletionSink = Arc::new(move |outcome| {
            if outcome.result.is_err() {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
            done_clone.notify_one();
        });
        let event = ComplianceEvent::new(EventKind::Transaction, Severity::Low, "core");
        let task = AgentTask::new(orchestrator.next_task_id(), "kyc", event, TaskPriority::Normal, Utc::now());
        orchestrator.submit_task(task, Some(sink)).unwrap();
        tokio::time::timeout(Duration::from_secs(2), done.notified()).await.unwrap();
        assert_eq!(seen_err.load(Ordering::SeqCst), 1);
        orchestrator.shutdown().await;
    }
}
