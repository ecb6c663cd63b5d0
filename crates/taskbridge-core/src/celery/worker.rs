use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::app::CeleryApp;
use crate::domain::errors::TaskError;
use crate::domain::TaskMessage;
use crate::ports::ResultRecord;

/// How long one `consume` call may block before the shutdown flag is checked again.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Worker group handle.
/// - `request_shutdown()` でワーカー全体が新しいメッセージを取らなくなる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers consuming `queues` (the app's default queue when empty).
    pub fn spawn(n: usize, app: Arc<CeleryApp>, queues: Vec<String>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queues: Arc<[String]> = if queues.is_empty() {
            Arc::from(vec![app.conf().task_default_queue.clone()])
        } else {
            Arc::from(queues)
        };
        info!(workers = n, queues = ?queues, "starting worker group");

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let app = Arc::clone(&app);
            let queues = Arc::clone(&queues);
            let rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, app, queues, rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Stop taking new messages. In-flight tasks run to completion.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    app: Arc<CeleryApp>,
    queues: Arc<[String]>,
    shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        // sender dropped も停止扱い
        if *shutdown_rx.borrow() || shutdown_rx.has_changed().is_err() {
            break;
        }

        // consume はキャンセルしない (取り出し済みのメッセージが消える)。timeout ごとに shutdown を見る
        let message = match app.broker().consume(&queues, POLL_INTERVAL).await {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(err) => {
                warn!(worker_id, error = %err, "consume failed");
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
        };

        execute_message(&app, message).await;
    }
    info!(worker_id, "worker stopped");
}

/// Run one message against the app's registry and store the outcome.
pub async fn execute_message(app: &CeleryApp, message: TaskMessage) {
    let TaskMessage { id, name, args, .. } = message;
    let backend = app.backend();

    let Some(task) = app.get_task(&name) else {
        warn!(task = %name, %id, "received unregistered task");
        let record = ResultRecord::failure(id, format!("unregistered task '{name}'"));
        if let Err(err) = backend.store(record).await {
            warn!(%id, error = %err, "storing result failed");
        }
        return;
    };

    if app.conf().task_track_started
        && let Err(err) = backend.store(ResultRecord::started(id)).await
    {
        warn!(%id, error = %err, "storing STARTED failed");
    }

    debug!(task = %name, %id, "running task");
    // 登録済みタスクは同期呼び出し: blocking pool で実行する
    let outcome: Result<Value, TaskError> = tokio::task::spawn_blocking(move || task.run(args))
        .await
        .unwrap_or_else(|join_err| Err(TaskError::Panicked(join_err.to_string())));

    let record = match outcome {
        Ok(value) => {
            debug!(task = %name, %id, "task succeeded");
            ResultRecord::success(id, value)
        }
        Err(err) => {
            error!(task = %name, %id, error = %err, "task failed");
            ResultRecord::failure(id, err.to_string())
        }
    };
    if let Err(err) = backend.store(record).await {
        warn!(%id, error = %err, "storing result failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::celery::{AppConf, SyncTaskFn};
    use crate::domain::{TaskArgs, TaskOptions, TaskState};
    use rstest::rstest;
    use serde_json::json;
    use std::sync::Mutex;

    fn app(track_started: bool) -> Arc<CeleryApp> {
        let app = CeleryApp::builder("tests")
            .conf(AppConf {
                task_track_started: track_started,
                ..AppConf::default()
            })
            .build();
        let add: SyncTaskFn = Arc::new(|args: TaskArgs| {
            let a: i64 = args.arg(0)?;
            let b: i64 = args.arg(1)?;
            Ok(json!(a + b))
        });
        let fail: SyncTaskFn = Arc::new(|_args: TaskArgs| Err(TaskError::failed("nope")));
        app.task("tasks.add", TaskOptions::new(), add).unwrap();
        app.task("tasks.fail", TaskOptions::new(), fail).unwrap();
        Arc::new(app)
    }

    #[tokio::test]
    async fn execute_records_success() {
        let app = app(false);
        let msg = TaskMessage::new("tasks.add", TaskArgs::positional([json!(2), json!(3)]), "celery");
        let id = msg.id;

        execute_message(&app, msg).await;

        let record = app.backend().get(id).await.unwrap().unwrap();
        assert_eq!(record.state, TaskState::Success);
        assert_eq!(record.result, Some(json!(5)));
    }

    #[tokio::test]
    async fn execute_records_failure_and_unregistered() {
        let app = app(false);
        let failing = TaskMessage::new("tasks.fail", TaskArgs::new(), "celery");
        let unknown = TaskMessage::new("tasks.unknown", TaskArgs::new(), "celery");
        let (failing_id, unknown_id) = (failing.id, unknown.id);

        execute_message(&app, failing).await;
        execute_message(&app, unknown).await;

        let record = app.backend().get(failing_id).await.unwrap().unwrap();
        assert_eq!(record.state, TaskState::Failure);
        assert_eq!(record.error.as_deref(), Some("nope"));

        let record = app.backend().get(unknown_id).await.unwrap().unwrap();
        assert_eq!(record.state, TaskState::Failure);
        assert!(record.error.unwrap().contains("unregistered"));
    }

    #[rstest]
    #[case::tracked(true, Some(TaskState::Started))]
    #[case::untracked(false, None)]
    #[tokio::test]
    async fn started_is_recorded_before_the_body_runs(
        #[case] track_started: bool,
        #[case] expected: Option<TaskState>,
    ) {
        let app = Arc::new(
            CeleryApp::builder("tests")
                .conf(AppConf {
                    task_track_started: track_started,
                    ..AppConf::default()
                })
                .build(),
        );
        let msg = TaskMessage::new("tasks.observe", TaskArgs::new(), "celery");
        let id = msg.id;

        // 実行中に backend が見ている状態を記録する
        let seen: Arc<Mutex<Option<Option<TaskState>>>> = Arc::new(Mutex::new(None));
        let backend = Arc::clone(app.backend());
        let seen_in_body = Arc::clone(&seen);
        let observe: SyncTaskFn = Arc::new(move |_args: TaskArgs| {
            let record = tokio::runtime::Handle::current()
                .block_on(backend.get(id))
                .map_err(|e| TaskError::failed(e.to_string()))?;
            *seen_in_body.lock().unwrap() = Some(record.map(|r| r.state));
            Ok(Value::Null)
        });
        app.task("tasks.observe", TaskOptions::new(), observe).unwrap();

        execute_message(&app, msg).await;

        assert_eq!(*seen.lock().unwrap(), Some(expected));
        let record = app.backend().get(id).await.unwrap().unwrap();
        assert_eq!(record.state, TaskState::Success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn workers_consume_submitted_tasks() {
        let app = app(true);
        let workers = WorkerGroup::spawn(2, Arc::clone(&app), Vec::new());

        let result = app
            .send_task("tasks.add", TaskArgs::positional([json!(20), json!(22)]), &TaskOptions::new())
            .await
            .unwrap();
        assert_eq!(result.get(Duration::from_secs(5)).await.unwrap(), json!(42));

        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn shutdown_stops_idle_workers() {
        let workers = WorkerGroup::spawn(3, app(false), vec!["celery".to_string()]);
        tokio::time::timeout(Duration::from_secs(5), workers.shutdown_and_join())
            .await
            .unwrap();
    }
}
