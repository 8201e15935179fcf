//! Rendered SQL artifacts.
//!
//! Every script writes the statements it plans to `<dir>/<version>-<name>.sql`
//! before anything runs. The file carries no timestamps, so a dry run and a
//! real run produce identical bytes.

use std::path::{Path, PathBuf};

use migrate_core::{MigrationId, Result};
use tracing::debug;

/// Separator between statements in an artifact.
pub const STATEMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Normalize one statement: trimmed, blank lines dropped, one trailing `;`.
fn normalize(statement: &str) -> Option<String> {
    let body = statement.trim().trim_end_matches(';').trim_end();
    if body.is_empty() {
        return None;
    }

    let body = body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Some(format!("{};", body))
}

/// Render statements into artifact text.
pub fn render(statements: &[String]) -> String {
    let mut out = statements
        .iter()
        .filter_map(|s| normalize(s))
        .collect::<Vec<_>>()
        .join(STATEMENT_SEPARATOR);
    out.push('\n');
    out
}

pub fn artifact_path(dir: &Path, id: &MigrationId) -> PathBuf {
    dir.join(id.artifact_file_name())
}

/// Write the artifact for `id`, creating `dir` if needed.
pub async fn write(dir: &Path, id: &MigrationId, statements: &[String]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let path = artifact_path(dir, id);
    tokio::fs::write(&path, render(statements)).await?;

    debug!(path = %path.display(), statements = statements.len(), "Wrote SQL artifact");
    Ok(path)
}
