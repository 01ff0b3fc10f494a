//! Shared wiring for pipeline integration tests
//!
//! Every collaborator is an in-memory double; the handles kept on [`Harness`] share state
//! with the ones handed to the pipeline, so tests can script and inspect them.

#![allow(dead_code)]

use async_trait::async_trait;
use knowflow_core::test_support::{
    MemoryBlobStorage, MemoryDocumentStore, MemorySessionStore, MemoryVectorStore,
    MockEmbeddingModel,
};
use knowflow_core::types::ChunkMetadata;
use knowflow_core::{
    EmbeddingModel, GraphKnowledge, KnowledgeNode, KnowledgeRelationship, LanguageModel,
    NodeLabel, RelationshipType, Result, UserId, VectorEntry, VectorStore,
};
use knowflow_graph::{KnowledgeGraphStore, MemoryGraphDatabase};
use knowflow_pipeline::{
    ConversationConfig, ConversationManager, DocumentIngestor, EvidenceStore, IngestorConfig,
    OrchestratorConfig, QueryDecomposer, RetrievalOrchestrator, RetrievalQualityEvaluator,
};
use std::sync::Arc;
use std::time::Duration;

pub use knowflow_core::test_support::MockLanguageModel;

pub const OWNER: UserId = 1;
pub const OTHER_OWNER: UserId = 2;

pub const CYPHER: &str = "Cypher query generator";
pub const DECOMPOSITION: &str = "query decomposition";
pub const EVALUATION: &str = "retrieval quality evaluation";
pub const ANSWER: &str = "reasoning assistant";
pub const SYNTHESIS: &str = "Synthesize a comprehensive";
pub const FOLLOW_UP: &str = "conversational assistant";
pub const EXTRACTION: &str = "knowledge graph extraction";

pub const GOOD_EVALUATION: &str =
    r#"{"overall_quality_score": 9, "missing_aspects": [], "quality_summary": "Complete"}"#;

/// Language model that stalls on prompts matching `pattern` before delegating
pub struct SlowLanguageModel {
    inner: MockLanguageModel,
    pattern: String,
    user_pattern: Option<String>,
    delay: Duration,
}

impl SlowLanguageModel {
    pub fn new(inner: MockLanguageModel, pattern: &str, delay: Duration) -> Self {
        Self {
            inner,
            pattern: pattern.to_string(),
            user_pattern: None,
            delay,
        }
    }

    /// Only stall when the user prompt also contains `pattern`
    pub fn with_user_pattern(mut self, pattern: &str) -> Self {
        self.user_pattern = Some(pattern.to_string());
        self
    }

    fn stalls_on(&self, system_prompt: &str, user_prompt: &str) -> bool {
        system_prompt.contains(&self.pattern)
            && self
                .user_pattern
                .as_deref()
                .map_or(true, |pattern| user_prompt.contains(pattern))
    }
}

#[async_trait]
impl LanguageModel for SlowLanguageModel {
    fn name(&self) -> &str {
        "slow-llm"
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        if self.stalls_on(system_prompt, user_prompt) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.complete(system_prompt, user_prompt).await
    }
}

pub struct Harness {
    pub llm: MockLanguageModel,
    pub embedder: MockEmbeddingModel,
    pub vectors: MemoryVectorStore,
    pub graph_db: MemoryGraphDatabase,
    pub sessions: MemorySessionStore,
    pub documents: MemoryDocumentStore,
    pub blobs: MemoryBlobStorage,
    pub graph: Arc<KnowledgeGraphStore>,
    pub orchestrator: Arc<RetrievalOrchestrator>,
    pub conversations: ConversationManager,
    pub ingestor: DocumentIngestor,
}

impl Harness {
    pub fn new() -> Self {
        let llm = MockLanguageModel::new();
        Self::build(Arc::new(llm.clone()), llm, OrchestratorConfig::default())
    }

    /// Harness whose pipeline talks to `model` while scripting goes to `llm`
    pub fn build(
        model: Arc<dyn LanguageModel>,
        llm: MockLanguageModel,
        config: OrchestratorConfig,
    ) -> Self {
        llm.respond_to(CYPHER, "MATCH (n) RETURN n LIMIT 10");

        let embedder = MockEmbeddingModel::new(64);
        let vectors = MemoryVectorStore::new();
        let graph_db = MemoryGraphDatabase::new();
        let sessions = MemorySessionStore::new();
        let documents = MemoryDocumentStore::new();
        let blobs = MemoryBlobStorage::new();

        let graph = Arc::new(KnowledgeGraphStore::new(
            Arc::new(graph_db.clone()),
            model.clone(),
        ));
        let call_timeout = config.call_timeout;
        let orchestrator = Arc::new(RetrievalOrchestrator::with_config(
            QueryDecomposer::new(model.clone()),
            RetrievalQualityEvaluator::new(model.clone()),
            EvidenceStore::new(Arc::new(embedder.clone()), Arc::new(vectors.clone())),
            graph.clone(),
            model.clone(),
            config,
        ));
        let conversations = ConversationManager::with_config(
            Arc::new(sessions.clone()),
            orchestrator.clone(),
            graph.clone(),
            model.clone(),
            ConversationConfig {
                call_timeout,
                ..Default::default()
            },
        );
        let ingestor = DocumentIngestor::new(
            Arc::new(documents.clone()),
            Arc::new(blobs.clone()),
            Arc::new(embedder.clone()),
            Arc::new(vectors.clone()),
            graph.clone(),
            model,
        )
        .with_config(IngestorConfig {
            chunk_size: 200,
            chunk_overlap: 20,
            extract_graph: true,
        });

        Self {
            llm,
            embedder,
            vectors,
            graph_db,
            sessions,
            documents,
            blobs,
            graph,
            orchestrator,
            conversations,
            ingestor,
        }
    }

    /// Index `text` directly, without touching the counted embedder
    pub async fn seed_chunk(&self, owner: UserId, doc_id: &str, chunk_index: usize, text: &str) {
        let embedding = MockEmbeddingModel::new(64).embed(text).await.unwrap();
        self.vectors
            .add(vec![VectorEntry {
                text: text.to_string(),
                embedding,
                metadata: ChunkMetadata {
                    doc_id: doc_id.to_string(),
                    owner_id: owner,
                    chunk_index,
                },
            }])
            .await
            .unwrap();
    }

    /// Store `nodes` and undirected `edges` as one document's graph
    pub async fn seed_graph(&self, doc_id: &str, nodes: &[&str], edges: &[(&str, &str)]) {
        let mut knowledge = GraphKnowledge::empty();
        for id in nodes {
            knowledge.push_node(KnowledgeNode::new(*id, NodeLabel::Entity, format!("Entity {id}")));
        }
        for (start, end) in edges {
            knowledge.push_relationship(KnowledgeRelationship::new(
                *start,
                *end,
                RelationshipType::RelatedTo,
            ));
        }
        self.graph.store(doc_id, &knowledge).await.unwrap();
    }
}

pub fn evaluation(score: f64, alternatives: &[&str]) -> String {
    serde_json::json!({
        "overall_quality_score": score,
        "missing_aspects": [],
        "alternative_search_terms": alternatives,
    })
    .to_string()
}
