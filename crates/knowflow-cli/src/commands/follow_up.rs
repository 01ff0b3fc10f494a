use crate::app::App;
use crate::cli::OutputFormat;
use crate::output;
use anyhow::Result;
use knowflow_core::{SessionId, UserId};
use knowflow_pipeline::FollowUpRequest;
use tokio_util::sync::CancellationToken;

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    app: &App,
    format: OutputFormat,
    message: String,
    owner: UserId,
    session: SessionId,
    nodes: Vec<String>,
    window: Option<usize>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut request = FollowUpRequest::new(message);
    if !nodes.is_empty() {
        request = request.with_nodes(nodes);
    }
    if let Some(hops) = window {
        request = request.with_window(hops);
    }

    let response = app
        .conversations
        .follow_up_with_cancel(owner, session, request, cancel)
        .await?;

    match format {
        OutputFormat::Json => output::print_json(&response)?,
        OutputFormat::Table => {
            println!("{}\n", response.response);
            if response.context_nodes.is_empty() {
                println!("No graph context found.");
            } else {
                println!("{}", output::context_nodes_table(&response.context_nodes));
            }
        }
    }
    Ok(())
}
