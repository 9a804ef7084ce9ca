use tracing::debug;

use crate::error::{JanitorError, Result};
use crate::executor::CommandExecutor;

/// Fail fast unless the container engine answers and `container` is running.
pub async fn check_environment<E>(executor: &E, container: &str) -> Result<()>
where
    E: CommandExecutor + ?Sized,
{
    executor
        .ping()
        .await
        .map_err(|e| JanitorError::MissingDependency(format!("Docker engine is not reachable ({})", e)))?;

    let status = executor.container_status(container).await?;
    if !status.is_running() {
        return Err(JanitorError::ContainerNotRunning {
            container: container.to_string(),
            status: status.to_string(),
        });
    }

    debug!(container, "Container is running");
    Ok(())
}
