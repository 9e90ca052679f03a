use std::sync::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed: Duration,
    pub memory_mb: Option<u64>,
}

/// 記錄每個分析階段的耗時；啟用 `cli` 時一併讀取行程記憶體
pub struct StageMonitor {
    enabled: bool,
    started: Instant,
    last_mark: Mutex<Instant>,
    stages: Mutex<Vec<StageTiming>>,
    #[cfg(feature = "cli")]
    process: Option<(Mutex<System>, Pid)>,
}

impl StageMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();

        #[cfg(feature = "cli")]
        let process = if enabled {
            sysinfo::get_current_pid()
                .ok()
                .map(|pid| (Mutex::new(System::new()), pid))
        } else {
            None
        };

        Self {
            enabled,
            started: now,
            last_mark: Mutex::new(now),
            stages: Mutex::new(Vec::new()),
            #[cfg(feature = "cli")]
            process,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[cfg(feature = "cli")]
    fn memory_mb(&self) -> Option<u64> {
        let (system, pid) = self.process.as_ref()?;
        let mut system = system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[*pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system.process(*pid).map(|p| p.memory() / 1024 / 1024)
    }

    #[cfg(not(feature = "cli"))]
    fn memory_mb(&self) -> Option<u64> {
        None
    }

    /// 標記一個階段結束，耗時從上一次標記起算
    pub fn mark(&self, stage: &str) {
        if !self.enabled {
            return;
        }

        let now = Instant::now();
        let elapsed = match self.last_mark.lock() {
            Ok(mut last) => {
                let elapsed = now.duration_since(*last);
                *last = now;
                elapsed
            }
            Err(_) => return,
        };

        let timing = StageTiming {
            stage: stage.to_string(),
            elapsed,
            memory_mb: self.memory_mb(),
        };

        match timing.memory_mb {
            Some(mb) => tracing::info!("📊 {} - {:?}, Memory: {}MB", stage, elapsed, mb),
            None => tracing::info!("📊 {} - {:?}", stage, elapsed),
        }

        if let Ok(mut stages) = self.stages.lock() {
            stages.push(timing);
        }
    }

    pub fn stages(&self) -> Vec<StageTiming> {
        self.stages
            .lock()
            .map(|stages| stages.clone())
            .unwrap_or_default()
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let peak = self.stages().iter().filter_map(|s| s.memory_mb).max();
        match peak {
            Some(mb) => tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                self.started.elapsed(),
                mb
            ),
            None => tracing::info!("📊 Final Stats - Total Time: {:?}", self.started.elapsed()),
        }
    }
}

impl Default for StageMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
