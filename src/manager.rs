use std::thread;

/// Runtime sizing derived from the host.
///
/// The daemon is read-mostly and I/O bound, so the only knob that matters
/// is the tokio worker count: one compute + one I/O thread on constrained
/// hosts, one worker per logical core everywhere else.
#[derive(Debug, Clone)]
pub struct SystemProfile {
    pub logical_cores: usize,
    pub worker_threads: usize,
}

impl SystemProfile {
    pub fn detect() -> Self {
        let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let worker_threads = if cores <= 1 { 2 } else { cores };

        Self {
            logical_cores: cores,
            worker_threads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_at_least_two_workers() {
        let profile = SystemProfile::detect();
        assert!(profile.worker_threads >= 2 || profile.logical_cores >= 2);
        assert!(profile.worker_threads >= 1);
    }
}
