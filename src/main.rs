//! gwinfer - 图像推理调度系统
//!
//! 一个可执行文件，每个子命令对应一个进程角色：
//! - `serve`: HTTP 任务入口
//! - `dispatch`: 任务分配
//! - `runner <name> <model_id>`: 单模型推理（由 dispatcher 拉起）
//! - `postprocess`: 结果组合
//! - `notify`: 回调通知

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use gwinfer::application::ports::{RunnerLauncherPort, StateStorePort};
use gwinfer::application::services::{
    LruDispatchStrategy, ProcDispatcher, RunnerPool, Streams, TaskPool,
};
use gwinfer::config::{load_config_from_path, print_config, AppConfig, LogConfig};
use gwinfer::infrastructure::adapters::{ModelRegistry, NoopLauncher, ProcessLauncher};
use gwinfer::infrastructure::http::{AppState, HttpServer};
use gwinfer::infrastructure::store::connect_store;
use gwinfer::infrastructure::worker::{
    DispatcherWorker, DispatcherWorkerConfig, NotifierWorker, NotifierWorkerConfig,
    PostprocessWorker, RunnerWorker, RunnerWorkerConfig,
};

/// gwinfer - image inference runner pool
#[derive(Parser, Debug)]
#[command(name = "gwinfer")]
#[command(about = "Image inference dispatch with an LRU runner pool", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认搜索 config.toml / config.local.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP intake server
    Serve,

    /// Run the dispatcher
    Dispatch {
        /// Do not spawn runner processes, leave it to an external supervisor
        #[arg(long)]
        no_spawn: bool,
    },

    /// Run one model runner
    Runner {
        /// Runner name allocated by the dispatcher
        name: String,

        /// Model to load
        model_id: String,
    },

    /// Run the result post-processor
    Postprocess,

    /// Run the callback notifier
    Notify,
}

impl Commands {
    fn role(&self) -> &'static str {
        match self {
            Commands::Serve => "serve",
            Commands::Dispatch { .. } => "dispatch",
            Commands::Runner { .. } => "runner",
            Commands::Postprocess => "postprocess",
            Commands::Notify => "notify",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_logging(&config.log);

    tracing::info!(role = cli.command.role(), "gwinfer starting");
    print_config(&config);

    let store = connect_store(&config.store)
        .await
        .context("Failed to connect state store")?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    match cli.command {
        Commands::Serve => serve(&config, store, cancel).await?,
        Commands::Dispatch { no_spawn } => {
            let launcher: Arc<dyn RunnerLauncherPort> = if no_spawn {
                Arc::new(NoopLauncher)
            } else {
                // 子进程沿用同一份配置文件
                let global_args = cli
                    .config
                    .iter()
                    .flat_map(|p| [OsString::from("--config"), p.clone().into_os_string()])
                    .collect();
                Arc::new(ProcessLauncher::current_exe(global_args)?)
            };
            dispatch(&config, store, launcher, cancel).await?
        }
        Commands::Runner { name, model_id } => {
            run_runner(&config, store, name, model_id, cancel).await?
        }
        Commands::Postprocess => {
            let task_pool = TaskPool::new(store.clone(), config.task.lifetime());
            let streams = Streams::new(store);
            PostprocessWorker::new(
                task_pool,
                streams.task_inference_complete(),
                streams.task_finish(),
                config.runner.block(),
            )
            .run(cancel)
            .await?
        }
        Commands::Notify => {
            let task_pool = TaskPool::new(store.clone(), config.task.lifetime());
            let streams = Streams::new(store);
            let notifier_config = NotifierWorkerConfig {
                timeout: std::time::Duration::from_secs(config.notify.timeout_secs),
                block: config.runner.block(),
            };
            NotifierWorker::new(notifier_config, task_pool, streams.task_finish())?
                .run(cancel)
                .await?
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// 初始化日志，RUST_LOG 优先于配置
fn init_logging(log: &LogConfig) {
    let log_filter = format!("{},gwinfer={},tower_http=debug", log.level, log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// ctrl-c / SIGTERM 触发取消
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Received shutdown signal");
    cancel.cancel();
}

async fn serve(
    config: &AppConfig,
    store: Arc<dyn StateStorePort>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let task_pool = TaskPool::new(store.clone(), config.task.lifetime());
    // 入口只读取注册表，从不启动 runner
    let runner_pool = RunnerPool::new(store.clone(), Arc::new(NoopLauncher));
    let streams = Streams::new(store);

    let state = AppState::new(task_pool, runner_pool, &streams);
    HttpServer::new(config.server.clone(), state)
        .run_with_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn dispatch(
    config: &AppConfig,
    store: Arc<dyn StateStorePort>,
    launcher: Arc<dyn RunnerLauncherPort>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let task_pool = TaskPool::new(store.clone(), config.task.lifetime());
    let runner_pool = RunnerPool::new(store.clone(), launcher);
    let streams = Streams::new(store);

    let worker_config = DispatcherWorkerConfig {
        block: config.runner.block(),
        max_runners: config.pool.max_runners,
        reap_grace: config.runner.reap_grace(),
        retry_interval: config.dispatch.retry_interval(),
        max_retries: config.dispatch.max_retries,
        ..Default::default()
    };
    let dispatcher = ProcDispatcher::new(LruDispatchStrategy::new(runner_pool));

    DispatcherWorker::new(worker_config, task_pool, dispatcher, streams.task_create())
        .run(cancel)
        .await?;
    Ok(())
}

async fn run_runner(
    config: &AppConfig,
    store: Arc<dyn StateStorePort>,
    name: String,
    model_id: String,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let registry = ModelRegistry::from_config(&config.model);
    let model = registry
        .load(&model_id)
        .with_context(|| format!("Runner {} cannot load model {}", name, model_id))?;

    let task_pool = TaskPool::new(store.clone(), config.task.lifetime());
    // runner 自身从不启动其它 runner
    let runner_pool = RunnerPool::new(store.clone(), Arc::new(NoopLauncher));
    let streams = Streams::new(store);

    let worker_config = RunnerWorkerConfig {
        name,
        model_id,
        heartbeat_ttl: config.runner.heartbeat_ttl(),
        heartbeat_period: config.runner.heartbeat_period(),
        block: config.runner.block(),
    };
    RunnerWorker::new(worker_config, runner_pool, task_pool, streams, model)
        .run(cancel)
        .await?;
    Ok(())
}
