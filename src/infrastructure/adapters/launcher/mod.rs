//! Runner Launcher Adapters - runner 进程启动

mod process_launcher;

pub use process_launcher::{NoopLauncher, ProcessLauncher};
