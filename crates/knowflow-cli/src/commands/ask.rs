//! One-shot questions through the retrieval pipeline

use crate::app::App;
use crate::cli::OutputFormat;
use crate::output;
use anyhow::Result;
use knowflow_core::{ContextUsed, QueryRequest, SessionId, UserId};
use tokio_util::sync::CancellationToken;

pub struct AskArgs {
    pub query: String,
    pub owner: UserId,
    pub session: Option<SessionId>,
    pub documents: Vec<String>,
    pub no_decompose: bool,
    pub no_evaluate: bool,
}

impl AskArgs {
    pub fn request(self) -> QueryRequest {
        let mut request = QueryRequest::new(self.query, self.owner)
            .with_decomposition(!self.no_decompose)
            .with_evaluation(!self.no_evaluate);
        if let Some(session) = self.session {
            request = request.with_session(session);
        }
        if !self.documents.is_empty() {
            request = request.with_documents(self.documents);
        }
        request
    }
}

pub async fn execute(
    app: &App,
    format: OutputFormat,
    args: AskArgs,
    cancel: CancellationToken,
) -> Result<()> {
    let request = args.request();
    let response = app.conversations.chat_with_cancel(&request, cancel).await?;

    match format {
        OutputFormat::Json => output::print_json(&response)?,
        OutputFormat::Table => {
            println!("{}\n", response.message);
            match &response.context_used {
                ContextUsed::Single {
                    vector_results,
                    graph_results,
                } => {
                    if !vector_results.is_empty() {
                        println!("{}", output::evidence_table(vector_results));
                    }
                    println!("Graph records: {}", graph_results.len());
                }
                ContextUsed::Synthesized { sub_responses, .. } => {
                    println!("{}", output::sub_responses_table(sub_responses));
                }
            }
        }
    }
    Ok(())
}
