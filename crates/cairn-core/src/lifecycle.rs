use crate::CoreError;
use cairn_schema::{ContainerStatus, ItemStatus};

/// Check a container status change against the lifecycle table.
///
/// A new record starts life as `installing` without passing through here.
/// `removed` is the terminal marker for both a failed install and a finished
/// removal; the record is deleted right after.
pub fn validate_container_transition(
    from: ContainerStatus,
    to: ContainerStatus,
) -> Result<(), CoreError> {
    use ContainerStatus::{Installing, Ready, Removed, Removing};
    let valid = matches!(
        (from, to),
        (Installing, Ready | Removed) | (Ready, Removing) | (Removing, Removed | Ready)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Same table for package and archive records.
pub fn validate_item_transition(from: ItemStatus, to: ItemStatus) -> Result<(), CoreError> {
    use ItemStatus::{Installed, Installing, Removed, Removing};
    let valid = matches!(
        (from, to),
        (Installing, Installed | Removed) | (Installed, Removing) | (Removing, Removed | Installed)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
