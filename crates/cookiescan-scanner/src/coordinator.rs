//! Scan coordinator for running consent-variant scan tasks.
//!
//! Tasks are partitioned by visibility: the headful partition runs first,
//! then the headless one, each in its own browser process. Within a
//! partition every task runs concurrently in an isolated browsing context.

use crate::collector::collect_frames;
use crate::domains::DomainTracker;
use crate::error::{Result, ScanError, TaskStage};
use cookiescan_browser::{
    BrowserError, BrowserLauncher, BrowserPage, BrowserSession, BrowsingContext, PageActions,
    Visibility,
};
use cookiescan_core::{FrameSnapshot, InventoryItem, RunContext, ScanAction, ScanTask, ScanningConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// Partitions in execution order.
const PARTITIONS: [Visibility; 2] = [Visibility::Headful, Visibility::Headless];

/// Timing and concurrency knobs of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Wait before storage is collected
    pub settle_delay: Duration,
    /// Upper bound of every network-idle wait
    pub network_idle_timeout: Duration,
    /// Tasks running at once within a partition, `0` for no limit
    pub max_concurrent_tasks: usize,
}

impl From<&ScanningConfig> for CoordinatorSettings {
    fn from(config: &ScanningConfig) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            network_idle_timeout: config.network_idle_timeout(),
            max_concurrent_tasks: config.max_concurrent_tasks,
        }
    }
}

/// Failure of one task stage, before the task identity is attached.
type StageResult<T> = std::result::Result<T, (TaskStage, BrowserError)>;

/// Runs scan tasks against browsers from a [`BrowserLauncher`].
pub struct ScanCoordinator {
    launcher: Arc<dyn BrowserLauncher>,
    settings: CoordinatorSettings,
}

impl ScanCoordinator {
    /// Create a coordinator launching browsers through `launcher`.
    #[must_use]
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: CoordinatorSettings) -> Self {
        Self { launcher, settings }
    }

    /// Run every task and return the inventories of those that completed.
    ///
    /// Failed tasks are logged and left out. Only a browser launch failure
    /// aborts the run.
    pub async fn run(&self, tasks: &[ScanTask], ctx: &RunContext) -> Result<Vec<InventoryItem>> {
        let mut inventory = Vec::with_capacity(tasks.len());

        for visibility in PARTITIONS {
            let partition: Vec<&ScanTask> = tasks
                .iter()
                .filter(|task| Visibility::from_headless(task.headless) == visibility)
                .collect();
            if partition.is_empty() {
                continue;
            }

            let session = self
                .launcher
                .launch(visibility)
                .await
                .map_err(|source| ScanError::Launch { visibility, source })?;

            info!(?visibility, tasks = partition.len(), "scanning partition");
            inventory.extend(self.run_partition(session.as_ref(), &partition, ctx).await);

            if let Err(e) = session.close().await {
                warn!(?visibility, error = %e, "error closing browser");
            }
        }

        Ok(inventory)
    }

    async fn run_partition(
        &self,
        session: &dyn BrowserSession,
        partition: &[&ScanTask],
        ctx: &RunContext,
    ) -> Vec<InventoryItem> {
        let limit = match self.settings.max_concurrent_tasks {
            0 => usize::MAX,
            n => n,
        };
        let mut futures = FuturesUnordered::new();
        let mut results = Vec::new();

        for task in partition {
            futures.push(self.run_task(session, task, ctx));

            // Respect concurrency limit
            while futures.len() >= limit {
                if let Some(result) = futures.next().await {
                    Self::keep_completed(result, &mut results);
                }
            }
        }

        // Collect remaining results
        while let Some(result) = futures.next().await {
            Self::keep_completed(result, &mut results);
        }

        results
    }

    fn keep_completed(result: Result<InventoryItem>, results: &mut Vec<InventoryItem>) {
        match result {
            Ok(item) => results.push(item),
            Err(e) => error!(error = %e, "failed to fetch data for task"),
        }
    }

    /// Scan one task in a fresh isolated context, closing it on every path.
    async fn run_task(
        &self,
        session: &dyn BrowserSession,
        task: &ScanTask,
        ctx: &RunContext,
    ) -> Result<InventoryItem> {
        let label = format!(" - \"{}\"", task.name);
        ctx.timer.start(&label);

        let failed = |stage: TaskStage, source: BrowserError| ScanError::TaskFailed {
            task: task.name.clone(),
            url: task.url.clone(),
            stage,
            source,
        };

        let context = session
            .new_isolated_context(&task.cookies)
            .await
            .map_err(|source| failed(TaskStage::Created, source))?;

        let scanned = self.scan_in_context(context.as_ref(), task).await;

        if let Err(e) = context.close().await {
            warn!(task = %task.name, error = %e, "error closing browsing context");
        }

        let frames = scanned.map_err(|(stage, source)| failed(stage, source))?;
        debug!(task = %task.name, stage = %TaskStage::Closed, frames = frames.len(), "task done");
        ctx.timer.end(&label);

        Ok(InventoryItem {
            name: task.name.clone(),
            groups: task.groups.clone(),
            url: task.url.clone(),
            frames,
            all_compliant: None,
        })
    }

    async fn scan_in_context(
        &self,
        context: &dyn BrowsingContext,
        task: &ScanTask,
    ) -> StageResult<Vec<FrameSnapshot>> {
        let stage = TaskStage::ContextIsolated;
        let page = context.new_page().await.map_err(|e| (stage, e))?;

        let domains = DomainTracker::new();
        page.on_network_event(domains.observer())
            .await
            .map_err(|e| (stage, e))?;
        page.goto(&task.url).await.map_err(|e| (stage, e))?;

        let stage = TaskStage::Navigated;
        self.settle(page.as_ref(), task)
            .await
            .map_err(|e| (stage, e))?;

        let stage = TaskStage::Settled;
        for action in &task.actions {
            debug!(task = %task.name, action = action.kind(), "applying action");
            self.apply_action(page.as_ref(), action)
                .await
                .map_err(|e| (stage, e))?;
        }

        if task.pause {
            wait_for_operator(&task.name).await;
        }

        let frames = collect_frames(context, page.as_ref(), &domains, self.settings.settle_delay).await;
        debug!(task = %task.name, stage = %TaskStage::Collected, "storage collected");
        Ok(frames)
    }

    async fn settle(&self, page: &dyn BrowserPage, task: &ScanTask) -> cookiescan_browser::Result<()> {
        if task.skip_network_idle {
            tokio::time::sleep(Duration::from_millis(task.wait_for_network_idle_ms)).await;
        } else if !page
            .wait_for_network_idle(self.settings.network_idle_timeout)
            .await?
        {
            debug!(task = %task.name, "network idle timeout, continuing");
        }
        Ok(())
    }

    async fn apply_action(
        &self,
        page: &dyn BrowserPage,
        action: &ScanAction,
    ) -> cookiescan_browser::Result<()> {
        match action {
            ScanAction::Click { selector } => page.click(selector).await,
            ScanAction::Type { selector, text } => page.fill_field(selector, text).await,
            ScanAction::WaitForNetworkIdle { timeout } => {
                let timeout = timeout.map_or(self.settings.network_idle_timeout, Duration::from_millis);
                if page.wait_for_network_idle(timeout).await? {
                    Ok(())
                } else {
                    Err(BrowserError::Timeout(format!(
                        "network not idle within {}ms",
                        timeout.as_millis()
                    )))
                }
            }
            ScanAction::Refresh => page.reload().await,
            ScanAction::ScrollIntoView { selector } => page.scroll_into_view(selector).await,
            ScanAction::RemoveElement { selector } => page.remove_element(selector).await,
        }
    }
}

/// Block the task until the operator presses Enter.
async fn wait_for_operator(task: &str) {
    info!(task, "pausing for debugging, interact with the browser and press Enter to continue");
    let mut line = String::new();
    if let Err(e) = BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
        warn!(task, error = %e, "cannot read from stdin, continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = ScanningConfig::default();
        let settings = CoordinatorSettings::from(&config);
        assert_eq!(settings.settle_delay, Duration::from_secs(8));
        assert_eq!(settings.network_idle_timeout, Duration::from_secs(15));
        assert_eq!(settings.max_concurrent_tasks, 0);
    }

    #[test]
    fn test_headful_partition_runs_first() {
        assert_eq!(PARTITIONS[0], Visibility::Headful);
        assert_eq!(PARTITIONS[1], Visibility::Headless);
    }
}
