//! Wiring of the pipeline from configuration

use anyhow::{Context, Result};
use knowflow_config::KnowflowConfig;
use knowflow_core::{DocumentStore, EmbeddingModel, LanguageModel, VectorStore};
use knowflow_graph::{KnowledgeGraphStore, Neo4jHttpDatabase};
use knowflow_llm::{create_embedding_model, create_language_model};
use knowflow_pipeline::{
    ConversationConfig, ConversationManager, DocumentIngestor, EvidenceStore, FsBlobStorage,
    IngestorConfig, OrchestratorConfig, QueryDecomposer, RetrievalOrchestrator,
    RetrievalQualityEvaluator,
};
use knowflow_sqlite::{
    SqliteConfig, SqliteDocumentStore, SqlitePool, SqliteSessionStore, SqliteVectorStore,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Fully wired services for one CLI invocation
pub struct App {
    pub config: KnowflowConfig,
    pub documents: Arc<dyn DocumentStore>,
    pub conversations: ConversationManager,
    pub ingestor: DocumentIngestor,
}

impl App {
    pub fn from_config(config: KnowflowConfig) -> Result<Self> {
        let llm: Arc<dyn LanguageModel> =
            create_language_model(&config.llm).context("Failed to create language model")?;
        let embedder: Arc<dyn EmbeddingModel> = create_embedding_model(&config.embedding)
            .context("Failed to create embedding model")?;
        debug!(llm = llm.name(), embedder = embedder.name(), "Created model clients");

        let database_path = config.storage.database_path();
        if let Some(parent) = database_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
        let pool = SqlitePool::new(SqliteConfig::new(&database_path))
            .with_context(|| format!("Failed to open database {}", database_path.display()))?;
        let documents: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool.clone()));
        let vectors: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(pool.clone()));
        let sessions = Arc::new(SqliteSessionStore::new(pool));
        let blobs = Arc::new(FsBlobStorage::new(config.storage.blob_root()));

        let graph = Arc::new(
            KnowledgeGraphStore::new(
                Arc::new(Neo4jHttpDatabase::from_config(&config.graph)),
                llm.clone(),
            )
            .with_allowed_keywords(config.graph.allowed_query_keywords()),
        );

        let orchestrator = Arc::new(RetrievalOrchestrator::with_config(
            QueryDecomposer::new(llm.clone()),
            RetrievalQualityEvaluator::new(llm.clone()),
            EvidenceStore::new(embedder.clone(), vectors.clone()),
            graph.clone(),
            llm.clone(),
            OrchestratorConfig::from_retrieval(&config.retrieval),
        ));
        let conversations = ConversationManager::with_config(
            sessions,
            orchestrator,
            graph.clone(),
            llm.clone(),
            ConversationConfig::from_config(&config.retrieval, &config.graph),
        );
        let ingestor = DocumentIngestor::new(
            documents.clone(),
            blobs,
            embedder,
            vectors,
            graph,
            llm,
        )
        .with_config(IngestorConfig::from(&config.ingestion));

        info!(
            database = %database_path.display(),
            graph = config.graph.uri(),
            "Pipeline ready"
        );
        Ok(Self {
            config,
            documents,
            conversations,
            ingestor,
        })
    }
}
