use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

pub fn describe_permissions(path: &Path) -> String {
    match fs::symlink_metadata(path) {
        Ok(metadata) => format!(
            "owner uid={} gid={}, mode={:o}",
            metadata.uid(),
            metadata.gid(),
            metadata.mode() & 0o7777
        ),
        Err(e) => format!("metadata unavailable: {}", e),
    }
}
