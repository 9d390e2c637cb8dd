//! Worker configuration.

use metricflow_core::DEMO_TASK_QUEUE;

/// Configuration of one worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Address of the durable-execution engine.
    pub engine_address: String,
    /// Task queue the worker registers on.
    pub task_queue: String,
}

impl WorkerConfig {
    /// Loads configuration from environment variables.
    ///
    /// `METRICFLOW_ENGINE_ADDRESS` and `METRICFLOW_TASK_QUEUE` override the
    /// defaults.
    pub fn from_env() -> Self {
        let engine_address = std::env::var("METRICFLOW_ENGINE_ADDRESS")
            .unwrap_or_else(|_| "localhost:7233".to_string());
        let task_queue = std::env::var("METRICFLOW_TASK_QUEUE")
            .unwrap_or_else(|_| DEMO_TASK_QUEUE.to_string());
        Self {
            engine_address,
            task_queue,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            engine_address: "localhost:7233".to_string(),
            task_queue: DEMO_TASK_QUEUE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.engine_address, "localhost:7233");
        assert_eq!(config.task_queue, "demo-task-queue");
    }
}
