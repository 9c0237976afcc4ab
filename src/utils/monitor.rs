use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

#[derive(Debug, Clone)]
pub struct StageTiming {
    pub stage: String,
    pub elapsed: Duration,
}

/// Records how long each pipeline stage took and, with the `cli` feature,
/// samples process CPU and memory when enabled.
pub struct RunMonitor {
    started: Instant,
    stage_started: Instant,
    timings: Vec<StageTiming>,
    #[cfg(feature = "cli")]
    system: Option<(System, Pid)>,
    #[cfg(feature = "cli")]
    peak_memory_mb: u64,
}

impl RunMonitor {
    pub fn new(system_stats: bool) -> Self {
        #[cfg(not(feature = "cli"))]
        let _ = system_stats;
        let now = Instant::now();
        Self {
            started: now,
            stage_started: now,
            timings: Vec::new(),
            #[cfg(feature = "cli")]
            system: if system_stats {
                sysinfo::get_current_pid().ok().map(|pid| {
                    let mut system = System::new_with_specifics(RefreshKind::everything());
                    system.refresh_all();
                    (system, pid)
                })
            } else {
                None
            },
            #[cfg(feature = "cli")]
            peak_memory_mb: 0,
        }
    }

    /// Closes the current stage and starts timing the next one.
    pub fn finish_stage(&mut self, stage: &str) {
        let elapsed = self.stage_started.elapsed();
        self.stage_started = Instant::now();
        tracing::debug!("⏱️ {} took {:?}", stage, elapsed);
        self.timings.push(StageTiming {
            stage: stage.to_string(),
            elapsed,
        });
        self.log_system_stats(stage);
    }

    pub fn timings(&self) -> &[StageTiming] {
        &self.timings
    }

    pub fn total_elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[cfg(feature = "cli")]
    fn log_system_stats(&mut self, stage: &str) {
        let Some((system, pid)) = self.system.as_mut() else {
            return;
        };
        system.refresh_all();
        if let Some(process) = system.process(*pid) {
            let memory_mb = process.memory() / 1024 / 1024;
            self.peak_memory_mb = self.peak_memory_mb.max(memory_mb);
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
                stage,
                process.cpu_usage(),
                memory_mb,
                self.peak_memory_mb
            );
        }
    }

    #[cfg(not(feature = "cli"))]
    fn log_system_stats(&mut self, _stage: &str) {}

    pub fn log_summary(&self) {
        let breakdown: Vec<String> = self
            .timings
            .iter()
            .map(|t| format!("{} {:.1}s", t.stage, t.elapsed.as_secs_f64()))
            .collect();
        tracing::info!(
            "📊 Run finished in {:?} ({})",
            self.total_elapsed(),
            breakdown.join(", ")
        );
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
