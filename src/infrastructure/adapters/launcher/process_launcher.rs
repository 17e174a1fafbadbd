//! Process Launcher
//!
//! 以 `runner <name> <model_id>` 子命令重新启动当前可执行文件。
//! 子进程与调度器解耦：不等待就绪，退出状态只记录日志

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tokio::process::Command;

use crate::application::ports::{LaunchError, RunnerLauncherPort};

pub struct ProcessLauncher {
    program: PathBuf,
    /// 放在 `runner` 子命令之前的参数（例如 `--config <path>`）
    global_args: Vec<OsString>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, global_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            global_args,
        }
    }

    /// 使用当前可执行文件
    pub fn current_exe(global_args: Vec<OsString>) -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, global_args))
    }

    fn command(&self, name: &str, model_id: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.global_args)
            .arg("runner")
            .arg(name)
            .arg(model_id)
            .kill_on_drop(false);
        cmd
    }
}

#[async_trait]
impl RunnerLauncherPort for ProcessLauncher {
    async fn launch(&self, name: &str, model_id: &str) -> Result<(), LaunchError> {
        let mut child = self.command(name, model_id).spawn().map_err(|e| LaunchError {
            name: name.to_string(),
            model_id: model_id.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(
            runner = %name,
            model = %model_id,
            pid = ?child.id(),
            program = %self.program.display(),
            "Runner process spawned"
        );

        // 回收子进程，避免僵尸进程
        let name = name.to_string();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    tracing::info!(runner = %name, "Runner process exited")
                }
                Ok(status) => {
                    tracing::warn!(runner = %name, status = %status, "Runner process exited abnormally")
                }
                Err(e) => tracing::error!(runner = %name, error = %e, "Failed to wait runner process"),
            }
        });
        Ok(())
    }
}

/// 不启动任何进程，只记录日志；runner 由外部监管程序启动时使用
#[derive(Debug, Default)]
pub struct NoopLauncher;

#[async_trait]
impl RunnerLauncherPort for NoopLauncher {
    async fn launch(&self, name: &str, model_id: &str) -> Result<(), LaunchError> {
        tracing::info!(
            runner = %name,
            model = %model_id,
            "Runner allocated, waiting for external supervisor to start it"
        );
        Ok(())
    }
}
