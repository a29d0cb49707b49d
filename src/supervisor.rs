//! Runs the independent loops of one process and reports the first failure.
//!
//! Every protocol loop runs until the process terminates. A loop only returns
//! when it hits a fatal error, at which point the remaining loops of the set
//! are aborted and the error is handed back to the caller.

use anyhow::{anyhow, Result};
use log::error;
use std::future::Future;
use tokio::task::JoinSet;

use crate::core::error::SwarmResult;

/// A named set of loops belonging to one process
#[derive(Default)]
pub struct LoopSet {
    tasks: JoinSet<(&'static str, SwarmResult<()>)>,
}

impl LoopSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = SwarmResult<()>> + Send + 'static,
    {
        self.tasks.spawn(async move { (name, task.await) });
    }

    /// Wait for the first loop to stop; dropping the set aborts the others.
    pub async fn run(mut self) -> Result<()> {
        match self.tasks.join_next().await {
            None => Ok(()),
            Some(Ok((name, Ok(())))) => Err(anyhow!("{} loop exited unexpectedly", name)),
            Some(Ok((name, Err(err)))) => {
                error!("{} loop failed: {}", name, err);
                Err(anyhow::Error::new(err).context(format!("{} loop failed", name)))
            }
            Some(Err(join_error)) => Err(anyhow!("loop task aborted: {}", join_error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SwarmError;
    use std::time::Duration;

    #[tokio::test]
    async fn first_failure_is_reported() {
        let mut loops = LoopSet::new();
        loops.spawn("sleeping", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        loops.spawn("failing", async { Err(SwarmError::UnknownAgent(9)) });

        let err = loops.run().await.unwrap_err();
        assert!(err.to_string().contains("failing loop failed"));
    }

    #[tokio::test]
    async fn empty_set_completes() {
        assert!(LoopSet::new().run().await.is_ok());
    }
}
