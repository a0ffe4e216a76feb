use std::path::PathBuf;

/// Every location Claude Code may keep transcripts in, existing or not
pub fn candidate_data_paths() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    if let Some(home) = dirs::home_dir() {
        // New version path (~/.config/claude/projects)
        dirs.push(home.join(".config").join("claude").join("projects"));
        // Legacy path (~/.claude/projects)
        dirs.push(home.join(".claude").join("projects"));
    }

    if let Ok(custom_dirs) = std::env::var("CLAUDE_CONFIG_DIR") {
        dirs.extend(custom_dirs_from(&custom_dirs));
    }

    dirs
}

/// Existing Claude data directories, in search order
pub fn discover_claude_data_paths() -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();
    for path in candidate_data_paths() {
        if path.is_dir() && !found.contains(&path) {
            found.push(path);
        }
    }
    found
}

/// `<dir>/projects` for each comma separated entry
fn custom_dirs_from(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .map(|dir| PathBuf::from(dir).join("projects"))
        .collect()
}
