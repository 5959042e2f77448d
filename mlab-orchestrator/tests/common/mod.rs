//! Shared fixtures: scripted runners and an orchestrator on in-memory stores

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use mlab_core::domain::catalog::{Dataset, Model};
use mlab_core::domain::job::Job;
use mlab_core::domain::runner::{Connectivity, RunnerAvailability};
use mlab_core::dto::job::CreateJob;
use mlab_core::dto::task::{
    CreateTaskEnvironment, Metric, OutcomeStatus, RemoveTaskEnvironment, RunTask, StopTask,
    TaskFile, TaskFrame, TaskOutcome,
};
use mlab_orchestrator::balancer::{
    LoadBalancer, RetryQueue, RunnerConnector, RunnerEntry, RunnerRegistry, RunnerSource,
};
use mlab_orchestrator::repository::{JobRepository, MemoryQueue, MemoryStore};
use mlab_orchestrator::service::{Orchestrator, Settings, Stores};
use mlab_orchestrator::workspace::Workspace;
use mlab_runner_client::{RunnerError, RunnerRpc, TaskStream};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub const OWNER: &str = "alice";
pub const RETRY_QUEUE: &str = "retry_queue";
pub const TASK: &str = "<task>";

/// How a scripted runner answers `run_task`
#[derive(Clone)]
pub enum RunScript {
    /// Stream these frames, then end
    Frames(Vec<Result<TaskFrame, String>>),
    /// Stream these frames, then never end
    Hang(Vec<TaskFrame>),
    /// Refuse the call
    Reject,
    /// Accept the call and never answer it
    Unresponsive,
}

/// A runner whose answers are set by the test
pub struct FakeRunner {
    status: Mutex<Option<RunnerAvailability>>,
    script: Mutex<RunScript>,
    setup_hangs: Mutex<bool>,
    pub environments: Mutex<Vec<CreateTaskEnvironment>>,
    pub runs: Mutex<Vec<RunTask>>,
    pub stops: Mutex<Vec<StopTask>>,
    pub removals: Mutex<Vec<RemoveTaskEnvironment>>,
}

impl FakeRunner {
    pub fn new(status: Option<RunnerAvailability>) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            script: Mutex::new(RunScript::Frames(Vec::new())),
            setup_hangs: Mutex::new(false),
            environments: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            stops: Mutex::new(Vec::new()),
            removals: Mutex::new(Vec::new()),
        })
    }

    pub fn available() -> Arc<Self> {
        Self::new(Some(RunnerAvailability::Available))
    }

    /// `None` makes the runner unreachable
    pub fn set_status(&self, status: Option<RunnerAvailability>) {
        *self.status.lock().unwrap() = status;
    }

    pub fn script(&self, script: RunScript) {
        *self.script.lock().unwrap() = script;
    }

    /// Makes environment setup calls never answer
    pub fn hang_setup(&self) {
        *self.setup_hangs.lock().unwrap() = true;
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    fn reachable(&self) -> mlab_runner_client::Result<()> {
        match *self.status.lock().unwrap() {
            Some(_) => Ok(()),
            None => Err(RunnerError::Unavailable("connection refused".to_string())),
        }
    }
}

#[async_trait]
impl RunnerRpc for FakeRunner {
    async fn get_status(&self) -> mlab_runner_client::Result<RunnerAvailability> {
        let status = *self.status.lock().unwrap();
        status.ok_or_else(|| RunnerError::Unavailable("connection refused".to_string()))
    }

    async fn connectivity(&self) -> Connectivity {
        match self.reachable() {
            Ok(()) => Connectivity::Ready,
            Err(_) => Connectivity::Unreachable,
        }
    }

    async fn create_task_environment(
        &self,
        req: CreateTaskEnvironment,
    ) -> mlab_runner_client::Result<()> {
        self.reachable()?;
        let hangs = *self.setup_hangs.lock().unwrap();
        if hangs {
            return futures::future::pending().await;
        }
        self.environments.lock().unwrap().push(req);
        Ok(())
    }

    async fn run_task(&self, req: RunTask) -> mlab_runner_client::Result<TaskStream> {
        self.reachable()?;
        let task_id = req.task_id.to_string();
        self.runs.lock().unwrap().push(req);
        let script = self.script.lock().unwrap().clone();
        match script {
            RunScript::Frames(frames) => {
                let frames: Vec<_> = frames
                    .into_iter()
                    .map(|f| f.map(|f| for_task(f, &task_id)).map_err(RunnerError::Unavailable))
                    .collect();
                Ok(futures::stream::iter(frames).boxed())
            }
            RunScript::Hang(frames) => {
                let frames: Vec<_> = frames.into_iter().map(|f| Ok(for_task(f, &task_id))).collect();
                Ok(futures::stream::iter(frames)
                    .chain(futures::stream::pending())
                    .boxed())
            }
            RunScript::Reject => Err(RunnerError::rejected(500, "image pull failed")),
            RunScript::Unresponsive => futures::future::pending().await,
        }
    }

    async fn stop_task(&self, req: StopTask) -> mlab_runner_client::Result<()> {
        self.reachable()?;
        self.stops.lock().unwrap().push(req);
        Ok(())
    }

    async fn remove_task_environment(
        &self,
        req: RemoveTaskEnvironment,
    ) -> mlab_runner_client::Result<()> {
        self.reachable()?;
        self.removals.lock().unwrap().push(req);
        Ok(())
    }
}

/// Terminal frames are scripted with [`TASK`] as task id; the runner fills
/// in the id of the task it was asked to run
fn for_task(frame: TaskFrame, task_id: &str) -> TaskFrame {
    match frame {
        TaskFrame::Result(mut outcome) if outcome.task_id == TASK => {
            outcome.task_id = task_id.to_string();
            TaskFrame::Result(outcome)
        }
        other => other,
    }
}

/// Hands out the fake runners by id
struct FakeFleet(HashMap<String, Arc<FakeRunner>>);

impl RunnerConnector for FakeFleet {
    fn connect(&self, id: &str, address: &str) -> Result<Arc<dyn RunnerRpc>, RunnerError> {
        match self.0.get(id) {
            Some(runner) => Ok(runner.clone() as Arc<dyn RunnerRpc>),
            None => Err(RunnerError::InvalidAddress(address.to_string())),
        }
    }
}

pub struct Harness {
    pub orchestrator: Orchestrator,
    pub store: MemoryStore,
    pub queue: MemoryQueue,
    pub runners: HashMap<String, Arc<FakeRunner>>,
    pub model: Model,
    pub dataset: Dataset,
    pub root: TempDir,
}

pub fn settings() -> Settings {
    Settings {
        job_limit: 30,
        run_task_timeout: Duration::from_secs(5),
        setup_timeout: Duration::from_secs(5),
        rpc_url: "localhost:50051".to_string(),
    }
}

pub async fn harness(runners: Vec<(&str, Arc<FakeRunner>)>) -> Harness {
    harness_with(runners, settings()).await
}

pub async fn harness_with(runners: Vec<(&str, Arc<FakeRunner>)>, settings: Settings) -> Harness {
    let entries = runners
        .iter()
        .enumerate()
        .map(|(i, (id, _))| RunnerEntry::new(*id, format!("10.0.0.{}:50051", i + 1)))
        .collect();
    let runners: HashMap<String, Arc<FakeRunner>> = runners
        .into_iter()
        .map(|(id, runner)| (id.to_string(), runner))
        .collect();

    let store = MemoryStore::new();
    let queue = MemoryQueue::new();
    let root = tempfile::tempdir().unwrap();

    let model = Model {
        id: Uuid::new_v4(),
        name: "ResNet".to_string(),
        git_name: "resnet-repo".to_string(),
        owner_id: OWNER.to_string(),
        private: false,
        parameters: HashMap::from([("epochs".to_string(), serde_json::json!(10))]),
        default_model: "model.pt".to_string(),
    };
    let dataset = Dataset {
        id: Uuid::new_v4(),
        name: "CIFAR".to_string(),
        git_name: "cifar-repo".to_string(),
        owner_id: OWNER.to_string(),
        private: true,
    };
    store.insert_model(model.clone()).await;
    store.insert_dataset(dataset.clone()).await;

    let balancer = LoadBalancer::new(
        RunnerRegistry::new(RunnerSource::Static(entries), Arc::new(FakeFleet(runners.clone()))),
        RetryQueue::new(Arc::new(queue.clone()), RETRY_QUEUE),
    );
    let orchestrator = Orchestrator::new(
        Stores {
            jobs: Arc::new(store.clone()),
            results: Arc::new(store.clone()),
            catalog: Arc::new(store.clone()),
        },
        Arc::new(balancer),
        Workspace::new(root.path()),
        settings,
    );

    Harness {
        orchestrator,
        store,
        queue,
        runners,
        model,
        dataset,
        root,
    }
}

impl Harness {
    pub fn runner(&self, id: &str) -> &Arc<FakeRunner> {
        &self.runners[id]
    }

    pub fn create_request(&self) -> CreateJob {
        CreateJob {
            name: "classifier".to_string(),
            description: "first try".to_string(),
            model_id: self.model.id,
            dataset_id: self.dataset.id,
            parameters: Some(HashMap::from([("lr".to_string(), serde_json::json!(0.01))])),
        }
    }

    /// Creates a job and waits for its environment setup
    pub async fn ready_job(&self) -> Job {
        let accepted = self
            .orchestrator
            .create_job(OWNER, self.create_request())
            .await
            .unwrap();
        accepted.task.await.unwrap();
        self.job(accepted.value.id).await
    }

    pub async fn job(&self, id: Uuid) -> Job {
        JobRepository::find_by_id(&self.store, id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn retry_entries(&self) -> Vec<mlab_orchestrator::balancer::ErrorContext> {
        use mlab_orchestrator::repository::QueueStore;
        self.queue
            .peek_all(RETRY_QUEUE)
            .await
            .unwrap()
            .iter()
            .map(|bytes| mlab_orchestrator::balancer::ErrorContext::from_bytes(bytes).unwrap())
            .collect()
    }
}

/// A captured output line, newline included as runners send it
pub fn line(text: &str) -> TaskFrame {
    TaskFrame::Line {
        line: format!("{}\n", text),
    }
}

/// A terminal frame for whichever task the runner is running
pub fn terminal(status: OutcomeStatus, metrics: &[(&str, f64)]) -> TaskFrame {
    TaskFrame::Result(TaskOutcome {
        task_id: TASK.to_string(),
        task_name: "mlab.train".to_string(),
        status,
        metrics: metrics
            .iter()
            .map(|(name, value)| Metric {
                name: name.to_string(),
                value: *value,
            })
            .collect(),
        pretrained_model: Some("model.pt".to_string()),
        predictions: None,
        files: vec![TaskFile {
            name: "model.pt".to_string(),
            buffer: vec![1, 2, 3],
        }],
    })
}

/// Polls until the runner received `count` run requests
pub async fn wait_for_runs(runner: &FakeRunner, count: usize) {
    for _ in 0..200 {
        if runner.run_count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("runner never received {} run requests", count);
}
