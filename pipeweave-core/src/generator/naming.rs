//! Unit and pipeline naming

/// Orchestrator-safe unit name
///
/// Every run of characters outside `[A-Za-z0-9]` becomes a single `-`;
/// separators at either end are dropped. `"node:1"` and `"node-1"` both
/// become `"node-1"`.
pub fn clean_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !cleaned.is_empty() {
                cleaned.push('-');
            }
            pending_separator = false;
            cleaned.push(ch);
        } else {
            pending_separator = true;
        }
    }

    cleaned
}

/// Orchestrator-compatible pipeline name derived from the project name
pub fn pipeline_name(project_name: &str) -> String {
    project_name.to_lowercase().replace([' ', '_'], "-")
}
