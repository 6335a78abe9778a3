#[cfg(unix)]
pub mod unix;

use std::path::Path;

/// Owner and permission bits of `path`, for permission-denied warnings.
#[cfg(unix)]
pub fn describe_permissions(path: &Path) -> String {
    unix::describe_permissions(path)
}

#[cfg(not(unix))]
pub fn describe_permissions(path: &Path) -> String {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) => format!("readonly={}", metadata.permissions().readonly()),
        Err(e) => format!("metadata unavailable: {}", e),
    }
}

pub fn is_permission_denied(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::PermissionDenied
}
