//! Worker + client demo in one process.
//!
//! - `MathTasks`: worker-side component, `add` / `multiply` marked as tasks
//! - `MathClient`: client-side component, the same names marked as senders
//!
//! Usage: `taskbridge-cli [config.json]`. Without a file the in-memory
//! transports are used; `CELERY__*` variables override either.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskbridge_core::{
    AppBuilder, ClassDef, Configuration, Member, Result, TaskArgs, TaskError, send_task, task,
};

struct MathTasks;

fn math_tasks() -> Result<ClassDef<MathTasks>> {
    Ok(ClassDef::new("MathTasks", || MathTasks)
        .member(task("add").decorate(Member::asynchronous(
            "add",
            |_this: Arc<MathTasks>, args: TaskArgs| async move {
                let x: i64 = args.get(0, "x")?;
                let y: i64 = args.get(1, "y")?;
                Ok(json!(x + y))
            },
        ))?)
        .member(task("multiply").decorate(Member::asynchronous(
            "multiply",
            |_this: Arc<MathTasks>, args: TaskArgs| async move {
                let x: i64 = args.get(0, "x")?;
                let y: i64 = args.get(1, "y")?;
                x.checked_mul(y)
                    .map(|v| json!(v))
                    .ok_or_else(|| TaskError::failed("multiply overflowed"))
            },
        ))?))
}

struct MathClient;

fn math_client() -> Result<ClassDef<MathClient>> {
    // 本体は呼ばれない: 呼び出しは task として送信される
    let body = |_this: &MathClient, _args: TaskArgs| -> std::result::Result<Value, TaskError> {
        Err(TaskError::failed("sender body must not run"))
    };
    Ok(ClassDef::new("MathClient", || MathClient)
        .member(send_task("add").decorate(Member::blocking("add", body))?)
        .member(send_task("multiply").decorate(Member::blocking("multiply", body))?))
}

fn load_config() -> Result<Configuration> {
    let config = match std::env::args().nth(1) {
        Some(path) => Configuration::from_json_file(path)?,
        None => Configuration::from_value(json!({
            "celery": {
                "broker_url": "memory://",
                "backend_url": "rpc://"
            }
        })),
    };
    Ok(config.with_process_env())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let app = AppBuilder::new(load_config()?)
        .celery(math_tasks()?)?
        .celery(math_client()?)?
        .expect_tasks(&["add", "multiply"])
        .build()?;

    let workers = app.worker(2, Vec::new());
    let client = app.proxy::<MathClient>().await?;

    for (method, x, y) in [("add", 4, 6), ("multiply", 3, 7)] {
        let reply = client.call(method, TaskArgs::positional([json!(x), json!(y)])).await?;
        let Some(handle) = reply.into_async_result() else {
            continue;
        };
        let value = handle.get(Duration::from_secs(10)).await?;
        info!(task = handle.task_name(), id = %handle.id(), "{method}({x}, {y}) = {value}");
    }

    workers.shutdown_and_join().await;
    Ok(())
}
