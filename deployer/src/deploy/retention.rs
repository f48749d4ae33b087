//! Best-effort cleanup of old task definition revisions

use tracing::{info, warn};

use crate::ecs::client::EcsClientExt;
use crate::models::task_definition::{revision_from_arn, TaskDefinition};

/// Deregister a superseded revision. Failures are logged, never returned.
pub async fn deregister_previous(client: &dyn EcsClientExt, previous: &TaskDefinition) -> bool {
    info!(
        "Deregistering previous task definition {}",
        previous.revision_ref()
    );
    match client
        .deregister_task_definition(&previous.family, previous.revision)
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "Could not deregister {}, continuing: {}",
                previous.revision_ref(),
                e
            );
            false
        }
    }
}

/// Deregister the oldest ACTIVE revisions of `latest.family` until at most
/// `keep` remain. `latest` itself is never touched.
///
/// Returns the revisions that were deregistered.
pub async fn prune_revisions(
    client: &dyn EcsClientExt,
    latest: &TaskDefinition,
    keep: u32,
) -> Vec<i32> {
    let arns = match client.list_task_definitions(&latest.family).await {
        Ok(arns) => arns,
        Err(e) => {
            warn!("Could not list revisions of {}: {}", latest.family, e);
            return Vec::new();
        }
    };

    let mut revisions: Vec<i32> = arns.iter().filter_map(|a| revision_from_arn(a)).collect();
    revisions.sort_unstable();

    let excess = revisions.len().saturating_sub(keep as usize);
    let mut removed = Vec::new();
    for revision in revisions
        .into_iter()
        .filter(|r| *r != latest.revision)
        .take(excess)
    {
        match client
            .deregister_task_definition(&latest.family, revision)
            .await
        {
            Ok(()) => {
                info!("Deregistered old revision {}:{}", latest.family, revision);
                removed.push(revision);
            }
            Err(e) => warn!(
                "Could not deregister {}:{}: {}",
                latest.family, revision, e
            ),
        }
    }

    removed
}
