//! Upload a local file and index it

use crate::app::App;
use crate::cli::OutputFormat;
use crate::output;
use anyhow::{anyhow, Context, Result};
use knowflow_core::UserId;
use knowflow_pipeline::ContentKind;
use std::path::{Path, PathBuf};

pub async fn execute(
    app: &App,
    format: OutputFormat,
    path: PathBuf,
    owner: UserId,
    content_type: Option<String>,
    force: bool,
) -> Result<()> {
    let content_type = resolve_content_type(&path, content_type)?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?;
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let document = app
        .ingestor
        .upload(owner, &filename, &content_type, bytes)
        .await?;
    let report = app.ingestor.index(owner, &document.doc_id, force).await?;

    match format {
        OutputFormat::Json => output::print_json(&report)?,
        OutputFormat::Table => {
            println!("Indexed {} as {}", filename, report.doc_id);
            println!("  chunks: {}", report.chunks);
            match &report.graph {
                Some(graph) => println!(
                    "  graph:  {} nodes, {} relationships",
                    graph.nodes, graph.relationships
                ),
                None => println!("  graph:  nothing stored"),
            }
        }
    }
    Ok(())
}

fn resolve_content_type(path: &Path, explicit: Option<String>) -> Result<String> {
    if let Some(content_type) = explicit {
        return Ok(content_type);
    }
    ContentKind::from_path(path)
        .map(|kind| kind.mime().to_string())
        .ok_or_else(|| {
            anyhow!(
                "Cannot guess the content type of {}; pass --content-type",
                path.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_is_guessed_from_extension() {
        assert_eq!(
            resolve_content_type(Path::new("notes/policy.md"), None).unwrap(),
            "text/markdown"
        );
        assert_eq!(
            resolve_content_type(Path::new("scan.pdf"), Some("text/plain".to_string())).unwrap(),
            "text/plain"
        );
        assert!(resolve_content_type(Path::new("scan.pdf"), None).is_err());
    }
}
