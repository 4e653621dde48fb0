//! Live view runtime.
//!
//! Every mounted view is one tokio task that owns a [`ViewState`], its own
//! websocket supervisor and the channels its fetches report back on. The task
//! handles commands, deltas and completions strictly one at a time; readers
//! only ever see the state through a read lock.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::CiClient;
use crate::config::{WatchConfig, VIEW_CHANNEL_SIZE};
use crate::error::WatchError;
use crate::loader::{LoadOutcome, ResourceFetcher};
use crate::model::{Job, ResourceKind};
use crate::query::JobQuery;
use crate::supervisor::{ConnectionSupervisor, FixedDelay, SupervisorEvent};
use crate::view::{Effect, LoadRequest, RenderedView, ViewState};

pub use crate::view::ViewKind;

#[derive(Debug, Clone)]
pub enum ViewCommand {
    DisplayMore,
    Search(JobQuery),
    Refresh,
    Unmount,
}

/// What a view task needs from the outside world.
#[derive(Clone)]
pub struct ViewContext {
    pub client: CiClient,
    pub ws_url: String,
    pub page_size: usize,
    pub reconnect_delay: Duration,
    pub output_cap: Option<usize>,
    /// Receives the id of a view every time its state changes.
    pub changes: broadcast::Sender<String>,
}

impl ViewContext {
    pub fn from_config(config: &WatchConfig, client: CiClient, changes: broadcast::Sender<String>) -> Self {
        ViewContext {
            client,
            ws_url: config.ws_url.clone(),
            page_size: config.page_size,
            reconnect_delay: config.reconnect_delay,
            output_cap: config.output_cap,
            changes,
        }
    }
}

pub struct ViewHandle {
    id: String,
    kind: ViewKind,
    state: Arc<RwLock<ViewState>>,
    commands: mpsc::Sender<ViewCommand>,
    task: JoinHandle<()>,
}

impl ViewHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ViewKind {
        &self.kind
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, ViewState> {
        self.state.read().await
    }

    pub async fn render(&self) -> RenderedView {
        self.state.read().await.render()
    }

    pub async fn send(&self, command: ViewCommand) -> Result<(), WatchError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| WatchError::ViewNotFound(self.id.clone()))
    }

    /// Stop the view task and its websocket. Pending fetch results are dropped.
    pub async fn unmount(self) {
        let _ = self.commands.send(ViewCommand::Unmount).await;
        if let Err(e) = self.task.await {
            warn!("View {} task ended abnormally: {}", self.id, e);
        }
        info!("Unmounted view {} ({})", self.id, self.kind);
    }
}

enum Completion {
    Jobs(Result<Vec<Job>, WatchError>),
    Resource {
        uid: String,
        kind: ResourceKind,
        outcome: LoadOutcome,
    },
}

struct ViewActor {
    id: String,
    state: Arc<RwLock<ViewState>>,
    ctx: ViewContext,
    completions: mpsc::Sender<Completion>,
}

/// Spawn the task for one view and start its first fetch.
pub fn mount(id: String, kind: ViewKind, ctx: ViewContext) -> ViewHandle {
    let state = Arc::new(RwLock::new(
        ViewState::new(kind.clone(), ctx.page_size).with_output_cap(ctx.output_cap),
    ));
    let (command_tx, command_rx) = mpsc::channel(VIEW_CHANNEL_SIZE);
    let (completion_tx, completion_rx) = mpsc::channel(VIEW_CHANNEL_SIZE);
    let (event_tx, event_rx) = mpsc::channel(VIEW_CHANNEL_SIZE);

    let supervisor = ConnectionSupervisor::spawn(
        ctx.ws_url.clone(),
        FixedDelay(ctx.reconnect_delay),
        event_tx,
    );

    let actor = ViewActor {
        id: id.clone(),
        state: state.clone(),
        ctx,
        completions: completion_tx,
    };

    info!("Mounted view {} ({})", id, kind);
    let task = tokio::spawn(run(actor, supervisor, command_rx, event_rx, completion_rx));

    ViewHandle {
        id,
        kind,
        state,
        commands: command_tx,
        task,
    }
}

async fn run(
    actor: ViewActor,
    supervisor: ConnectionSupervisor,
    mut commands: mpsc::Receiver<ViewCommand>,
    mut events: mpsc::Receiver<SupervisorEvent>,
    mut completions: mpsc::Receiver<Completion>,
) {
    actor.refetch().await;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ViewCommand::Unmount) | None => break,
                Some(command) => actor.on_command(command).await,
            },
            Some(event) = events.recv() => actor.on_event(event).await,
            Some(done) = completions.recv() => actor.on_completion(done).await,
        }
    }

    // Unblock a supervisor stuck sending into a full channel.
    drop(events);
    supervisor.shutdown().await;
    debug!("View {} task exiting", actor.id);
}

impl ViewActor {
    async fn on_command(&self, command: ViewCommand) {
        let effect = {
            let mut state = self.state.write().await;
            match command {
                ViewCommand::DisplayMore => state.show_more(self.ctx.page_size),
                ViewCommand::Search(query) => state.search(query),
                ViewCommand::Refresh => Effect::Refetch,
                ViewCommand::Unmount => Effect::None,
            }
        };
        self.run_effect(effect).await;
    }

    async fn on_event(&self, event: SupervisorEvent) {
        let effect = self.state.write().await.handle(&event);
        self.changed();
        self.run_effect(effect).await;
    }

    async fn on_completion(&self, done: Completion) {
        let effect = {
            let mut state = self.state.write().await;
            match done {
                Completion::Jobs(Ok(jobs)) => {
                    debug!("View {} fetched {} jobs", self.id, jobs.len());
                    state.replace_snapshot(jobs)
                }
                Completion::Jobs(Err(e)) => {
                    warn!("View {} fetch failed, keeping stale data: {}", self.id, e);
                    state.fetch_failed(&e);
                    Effect::None
                }
                Completion::Resource { uid, kind, outcome } => {
                    state.complete_load(&uid, kind, outcome);
                    Effect::None
                }
            }
        };
        self.changed();
        self.run_effect(effect).await;
    }

    async fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::Refetch => self.refetch().await,
            Effect::Load(requests) => {
                for request in requests {
                    self.load(request);
                }
            }
        }
    }

    async fn refetch(&self) {
        let (kind, query) = {
            let mut state = self.state.write().await;
            state.begin_fetch();
            (state.kind.clone(), state.query.clone())
        };
        self.changed();

        let client = self.ctx.client.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = match kind {
                ViewKind::Job { uid } => match client.fetch_job(&uid).await {
                    Ok(job) => Ok(vec![job]),
                    Err(e) if e.is_absence() => Ok(Vec::new()),
                    Err(e) => Err(e),
                },
                ViewKind::Dashboard | ViewKind::List => client.fetch_jobs(&query).await,
            };
            // The view may be gone by now.
            let _ = completions.send(Completion::Jobs(result)).await;
        });
    }

    fn load(&self, request: LoadRequest) {
        let client = self.ctx.client.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let LoadRequest { job, kind } = request;
            let outcome = LoadOutcome::from_result(client.fetch(&job, kind).await);
            let _ = completions
                .send(Completion::Resource {
                    uid: job.uid,
                    kind,
                    outcome,
                })
                .await;
        });
    }

    fn changed(&self) {
        let _ = self.ctx.changes.send(self.id.clone());
    }
}
