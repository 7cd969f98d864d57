// src/orchestrator/launch.rs

//! Composite launch command for a case.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::fs::FileSystem;

use super::case::CaseDescriptor;

/// Pid file the task writes into its log directory.
pub const PID_FILE_NAME: &str = "start_base_task.pid";

/// Vendor whose environment script needs an explicit device list.
pub const DEVICE_VISIBILITY_VENDOR: &str = "iluvatar";

pub const LAUNCH_LOG: &str = "launch.log.txt";
pub const PIP_LOG: &str = "pip_install.log.txt";
pub const ENV_LOG: &str = "env.log.txt";
pub const TASK_LOG: &str = "host_main.log.txt";

/// Settings the launch command is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub vendor: String,
    pub deploy_path: PathBuf,
    pub python: String,
    pub nproc_per_node: u32,
    pub log_level: String,
    pub device: Option<String>,
}

impl LaunchSettings {
    /// Settings from a config whose `deploy_path` is already absolute.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            vendor: cfg.vendor.clone(),
            deploy_path: cfg.deploy_path.clone(),
            python: cfg.python.clone(),
            nproc_per_node: cfg.nproc_per_node,
            log_level: cfg.log_level.clone(),
            device: cfg.device.clone(),
        }
    }
}

/// Builds the shell pipeline that prepares and starts a case's task.
#[derive(Debug, Clone)]
pub struct TaskLauncher {
    fs: Arc<dyn FileSystem>,
    settings: LaunchSettings,
}

impl TaskLauncher {
    pub fn new(fs: Arc<dyn FileSystem>, settings: LaunchSettings) -> Self {
        Self { fs, settings }
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Positional flags passed to the task entry point.
    pub fn base_args(&self, case: &CaseDescriptor, case_dir: &Path) -> String {
        let s = &self.settings;
        format!(
            " --vendor {} --case_name {} --perf_path {} --nproc_per_node {} --log_dir {} --log_level {}",
            s.vendor,
            case,
            s.deploy_path.display(),
            s.nproc_per_node,
            case_dir.display(),
            s.log_level.to_uppercase()
        )
    }

    /// The composite command:
    ///
    /// marker file, then optional dependency install, optional environment
    /// script, then the task entry point, each logging into `case_dir`.
    pub fn command(&self, case: &CaseDescriptor, case_dir: &Path) -> String {
        let s = &self.settings;
        let dir = case_dir.display();

        let mut cmd = format!("mkdir -p {dir} && echo perfrun launch {case} > {dir}/{LAUNCH_LOG}");

        let requirements = case.requirements(&s.deploy_path, &s.vendor);
        if self.fs.is_file(&requirements) {
            cmd.push_str(&format!(
                " && pip install -r {} > {dir}/{PIP_LOG} 2>&1",
                requirements.display()
            ));
        } else {
            debug!(path = %requirements.display(), "no requirements file for case");
        }

        let env_script = case.env_script(&s.deploy_path, &s.vendor);
        if self.fs.is_file(&env_script) {
            if s.vendor == DEVICE_VISIBILITY_VENDOR {
                match &s.device {
                    Some(device) => {
                        cmd.push_str(&format!(" && export CUDA_VISIBLE_DEVICES={device}"));
                    }
                    None => warn!(
                        vendor = %s.vendor,
                        "vendor needs `device` for CUDA_VISIBLE_DEVICES but none is configured"
                    ),
                }
            }
            cmd.push_str(&format!(
                " && source {} > {dir}/{ENV_LOG} 2>&1",
                env_script.display()
            ));
        } else {
            debug!(path = %env_script.display(), "no environment script for case");
        }

        cmd.push_str(&format!(
            " && {} {}/host_main.py{} > {dir}/{TASK_LOG} 2>&1",
            s.python,
            s.deploy_path.display(),
            self.base_args(case, case_dir)
        ));

        cmd
    }
}

/// `<case_dir>/start_base_task.pid`
pub fn pid_file(case_dir: &Path) -> PathBuf {
    case_dir.join(PID_FILE_NAME)
}
