use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::{TaskCatalog, TaskKind};
use crate::client::{ApiResponse, Expect, SwarmClient, SwarmMethod, Target};
use crate::config::SwarmConfiguration;
use crate::metrics::{
    MetricsRecorder, Outcome, RequestMetric, SessionEvent, SessionMetric, SwarmMetric,
};
use crate::pool::ResourcePool;
use crate::scheduler;
use crate::session::{self, Identity, Session};

/// Commands sent from the parent to running users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwarmUserCommand {
    /// Finish the in-flight request and exit.
    Exit,
}

/// A single simulated user.
///
/// Everything here is owned by one tokio task: the session, the pool of created notes
/// and the random number generator are never shared with other users.
#[derive(Debug)]
pub struct SwarmUser {
    /// Number of this user, counted from 1 in launch order. Logs, request metrics and
    /// session metrics all use it.
    pub index: usize,
    /// When the load test started, used to timestamp requests.
    pub started: Instant,
    /// A local copy of the load test configuration.
    pub config: SwarmConfiguration,
    /// Identity, token and lifecycle state.
    pub session: Session,
    /// Ids of the notes this user created.
    pub pool: ResourcePool,
    pub(crate) client: SwarmClient,
    pub(crate) catalog: Arc<TaskCatalog>,
    pub(crate) recorder: MetricsRecorder,
    pub(crate) rng: StdRng,
    notes_created: usize,
    exiting: bool,
}

impl SwarmUser {
    pub(crate) fn new(
        index: usize,
        started: Instant,
        config: &SwarmConfiguration,
        client: SwarmClient,
        catalog: Arc<TaskCatalog>,
        recorder: MetricsRecorder,
    ) -> Self {
        let mut rng = StdRng::from_rng(&mut rand::rng());
        let identity = match config.username.as_deref() {
            Some(username) if !username.is_empty() => {
                Identity::shared(username, &config.password(), &config.email_domain())
            }
            _ => Identity::generate(
                &config.username_prefix(),
                &config.email_domain(),
                &config.password(),
                &mut rng,
            ),
        };

        SwarmUser {
            index,
            started,
            config: config.clone(),
            session: Session::new(identity),
            pool: ResourcePool::new(config.low_water(), config.high_water()),
            client,
            catalog,
            recorder,
            rng,
            notes_created: 0,
            exiting: false,
        }
    }

    /// Make a request, classify it and record it.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn request(
        &mut self,
        target: Target,
        label: &str,
        task: Option<TaskKind>,
        method: SwarmMethod,
        path: &str,
        body: Option<&Value>,
        expect: Expect,
    ) -> (ApiResponse, Outcome) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        let response = self
            .client
            .send(target, method, path, self.session.token(), body)
            .await;
        let outcome = response.outcome(expect);

        let mut metric = RequestMetric::new(elapsed, self.index, label, task);
        metric.method = method;
        metric.url = response.url.clone();
        metric.status_code = response.status;
        metric.response_time = response.response_time;
        metric.outcome = outcome;
        metric.error = response.error_message(outcome, expect).unwrap_or_default();
        self.recorder.record(SwarmMetric::Request(metric));

        (response, outcome)
    }

    /// Create a note and track its id.
    pub(crate) async fn create_note(&mut self, label: &str, task: Option<TaskKind>) -> Outcome {
        self.notes_created += 1;
        let note = json!({
            "title": format!("{} note {}", self.session.identity().username, self.notes_created),
            "content": format!(
                "Synthetic note {} written by user {}.",
                self.notes_created, self.index
            ),
        });
        let path = self.client.routes.create();
        let (response, outcome) = self
            .request(
                Target::Api,
                label,
                task,
                SwarmMethod::Post,
                &path,
                Some(&note),
                Expect::NoteId,
            )
            .await;
        if outcome.is_success() {
            self.pool.add(response.note_id().as_deref());
        }
        outcome
    }

    /// Whether the parent asked this user to exit. Once seen, stays true.
    pub(crate) fn received_exit(&mut self, receiver: &flume::Receiver<SwarmUserCommand>) -> bool {
        if !self.exiting {
            while let Ok(command) = receiver.try_recv() {
                match command {
                    SwarmUserCommand::Exit => {
                        self.exiting = true;
                        break;
                    }
                }
            }
        }
        self.exiting
    }
}

pub(crate) async fn user_main(
    mut thread_user: SwarmUser,
    thread_receiver: flume::Receiver<SwarmUserCommand>,
) {
    let thread_number = thread_user.index;
    info!("launching user {}...", thread_number);

    let event = match session::bootstrap(&mut thread_user, &thread_receiver).await {
        Ok(report) => SessionEvent::Active {
            seeded: report.seeded,
            seed_failures: report.failures,
        },
        Err(reason) => {
            debug!("user {} failed to authenticate: {}", thread_number, reason);
            SessionEvent::Aborted(reason)
        }
    };
    let active = matches!(event, SessionEvent::Active { .. });
    thread_user.recorder.record(SwarmMetric::Session(SessionMetric {
        user: thread_user.index,
        event,
    }));

    if active {
        'cycles: loop {
            if thread_user.received_exit(&thread_receiver) {
                break 'cycles;
            }

            if let Some((kind, outcome)) = scheduler::run_cycle(&mut thread_user).await {
                debug!("[user {}]: {} finished: {}", thread_number, kind, outcome);
            }

            if scheduler::pace(&mut thread_user, &thread_receiver).await {
                break 'cycles;
            }
        }
    }

    info!("exiting user {}...", thread_number);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::catalog::TaskWeights;

    fn user(config: SwarmConfiguration) -> SwarmUser {
        let client = SwarmClient::new(&config).unwrap();
        let catalog = Arc::new(TaskCatalog::new(&TaskWeights::default()).unwrap());
        SwarmUser::new(
            1,
            Instant::now(),
            &config,
            client,
            catalog,
            MetricsRecorder::disabled(),
        )
    }

    #[test]
    fn generated_and_shared_identities() {
        let config = SwarmConfiguration {
            host: "http://127.0.0.1".to_string(),
            ..Default::default()
        };
        let generated = user(config.clone());
        assert!(!generated.session.identity().shared);
        assert!(generated.session.identity().username.starts_with("swarm_"));
        assert_eq!(generated.pool.low_water(), 5);
        assert_eq!(generated.pool.high_water(), 15);

        let shared = user(SwarmConfiguration {
            username: Some("qa@notes.test".to_string()),
            password: Some("hunter2".to_string()),
            ..config
        });
        assert!(shared.session.identity().shared);
        assert_eq!(shared.session.identity().password, "hunter2");
    }

    #[test]
    fn exit_is_latched() {
        let mut user = user(SwarmConfiguration {
            host: "http://127.0.0.1".to_string(),
            ..Default::default()
        });
        let (sender, receiver) = flume::unbounded();
        assert!(!user.received_exit(&receiver));
        sender.send(SwarmUserCommand::Exit).unwrap();
        assert!(user.received_exit(&receiver));
        // The command was consumed, the flag remains.
        assert!(receiver.is_empty());
        assert!(user.received_exit(&receiver));
    }
}
