use std::collections::HashSet;

use tokio::task::JoinSet;

use super::*;

impl WorkflowOrchestrator {
    /// Runs several identities' workflows concurrently.
    ///
    /// Every request is checked before any work starts, so `Err` means nothing was
    /// submitted. Once running, each identity's outcome is reported in its own result.
    /// Steps stay sequential per identity, results keep request order, and an identity
    /// may appear only once per batch.
    pub async fn run_batch(&self, requests: Vec<WorkflowRequest>) -> AppResult<Vec<WorkflowResult>> {
        let mut seen = HashSet::new();
        for request in &requests {
            if !seen.insert(request.identity.as_str()) {
                return Err(AppError::Validation(format!(
                    "identity '{}' appears more than once in the batch",
                    request.identity
                )));
            }
        }

        let stored = self.store.load().await?;
        let mut prepared = Vec::with_capacity(requests.len());
        for request in requests {
            let identity = stored
                .iter()
                .find(|identity| identity.name() == request.identity)
                .cloned()
                .ok_or_else(|| {
                    AppError::NotFound(format!("identity '{}' does not exist", request.identity))
                })?;
            let run = self.prepare(request.target, &request.overrides).await?;
            prepared.push((identity, run));
        }

        let mut traces = Vec::with_capacity(prepared.len());
        let mut tasks = JoinSet::new();
        for (position, (identity, run)) in prepared.into_iter().enumerate() {
            let orchestrator = self.clone();
            traces.push(Some(RunTrace::start(&identity, &run.target)));
            tasks.spawn(async move { (position, orchestrator.execute(&identity, run).await) });
        }

        let mut results = Vec::with_capacity(traces.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((position, result)) => {
                    if let Some(trace) = traces.get_mut(position) {
                        *trace = None;
                    }
                    results.push((position, result));
                }
                Err(error) => warn!(error = %error, "workflow task failed to complete"),
            }
        }

        // Tasks that died without a result still get one.
        for (position, trace) in traces.into_iter().enumerate() {
            if let Some(trace) = trace {
                let error = AppError::Internal("workflow task failed to complete".to_owned());
                results.push((position, trace.fail(0, "run", &error)));
            }
        }

        results.sort_by_key(|(position, _)| *position);
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }
}
