//! Graph-backed memory store (`spec.md` §4.6, "Memory Store"). Cypher ported
//! near-verbatim from `memory_storage.py`; `neo4rs` stands in for the
//! original's Neo4j driver since no teacher crate touches a graph database.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use mnemo_core::config::EMBEDDING_DIMENSION;
use mnemo_core::retrieval::AccessMetadata;
use mnemo_core::{ConversationId, MemoryId, MemoryMetadata, MemoryRecord, MemoryType};
use neo4rs::{query, BoltType, Graph, Row};
use tracing::{debug, info, warn};

use crate::error::{GraphError, Result};

pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

pub struct GraphStore {
    graph: Graph,
}

/// A contradicting memory found by [`GraphStore::detect_contradiction`].
#[derive(Debug, Clone)]
pub struct Contradiction {
    pub memory_id: MemoryId,
    pub content: String,
    pub similarity: f64,
}

/// A memory awaiting embedding generation.
#[derive(Debug, Clone)]
pub struct PendingEmbedding {
    pub memory_id: MemoryId,
    pub content: String,
}

/// Parameters for [`GraphStore::search_similar`] (`spec.md` §4.7).
pub struct VectorSearchParams<'a> {
    pub query_vector: &'a [f32],
    pub top_k: usize,
    pub min_confidence: f64,
    pub min_similarity: f64,
    pub memory_types: Option<&'a [MemoryType]>,
}

/// One vector-index hit, before the full record is materialized.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub memory_id: MemoryId,
    pub similarity: f64,
}

fn row_to_memory(row: &Row) -> Result<MemoryRecord> {
    let memory_id: String = row.get("memory_id")?;
    let memory_type_raw: String = row.get("memory_type")?;
    let memory_type = MemoryType::from_str(&memory_type_raw)
        .map_err(|_| GraphError::NotFound(format!("unknown memory type: {memory_type_raw}")))?;
    let content: String = row.get("content")?;
    let confidence: f64 = row.get("confidence")?;
    let category: Option<String> = row.get("category").ok().filter(|s: &String| !s.is_empty());
    let source_conversation_id: String = row.get("source_conversation_id").unwrap_or_default();
    let extraction_timestamp = parse_neo4j_datetime(&row, "extraction_timestamp").unwrap_or_else(Utc::now);
    let valid_from = parse_neo4j_datetime(&row, "valid_from").unwrap_or(extraction_timestamp);
    let valid_until = parse_neo4j_datetime(&row, "valid_until");
    let supersedes: Option<String> = row.get("supersedes").ok();
    let superseded_by: Option<String> = row.get("superseded_by").ok();
    let has_embedding: bool = row.get("has_embedding").unwrap_or(false);
    let embedding: Option<Vec<f32>> = row.get("embedding").ok();
    let embedding_version: Option<String> = row.get("embedding_version").ok();
    let access_count: i64 = row.get("access_count").unwrap_or(0);
    let last_accessed = parse_neo4j_datetime(&row, "last_accessed");

    Ok(MemoryRecord {
        memory_id: MemoryId::from(memory_id),
        memory_type,
        content,
        confidence,
        category,
        source_conversation_id: ConversationId::from(source_conversation_id),
        extraction_timestamp,
        learned_at: extraction_timestamp,
        valid_from,
        valid_until,
        supersedes: supersedes.map(MemoryId::from),
        superseded_by: superseded_by.map(MemoryId::from),
        embedding,
        has_embedding,
        embedding_version,
        embedding_updated_at: None,
        last_accessed,
        access_count: access_count as u64,
        metadata: MemoryMetadata::new(),
    })
}

fn parse_neo4j_datetime(row: &Row, field: &str) -> Option<DateTime<Utc>> {
    let raw: String = row.get(field).ok()?;
    DateTime::parse_from_rfc3339(&raw).ok().map(|dt| dt.with_timezone(&Utc))
}

impl GraphStore {
    pub async fn connect(config: GraphConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password).await?;
        info!(uri = %config.uri, "connected to graph store");
        Ok(Self { graph })
    }

    /// Creates or reuses the source conversation node, creates the memory
    /// node with its temporal properties, and links them.
    pub async fn store_memory(&self, memory: &MemoryRecord) -> Result<()> {
        let metadata_json = serde_json::to_value(&memory.metadata).unwrap_or_default();
        let metadata_map: std::collections::BTreeMap<String, serde_json::Value> =
            serde_json::from_value(metadata_json).unwrap_or_default();
        let metadata_map: HashMap<String, BoltType> = metadata_map
            .into_iter()
            .filter_map(|(k, v)| BoltType::try_from(v).ok().map(|v| (k, v)))
            .collect();

        let q = query(
            r#"
            MERGE (c:Conversation {id: $conversation_id})
            ON CREATE SET c.created_at = datetime($extraction_time)

            CREATE (m:Memory {
                id: $memory_id,
                type: $memory_type,
                content: $content,
                confidence: $confidence,
                category: $category,
                created_at: datetime($extraction_time),
                valid_from: datetime($valid_from),
                valid_until: CASE WHEN $valid_until IS NULL THEN null ELSE datetime($valid_until) END,
                learned_at: datetime($learned_at),
                superseded_by: $superseded_by,
                supersedes: $supersedes,
                has_embedding: false
            })

            CREATE (c)-[:CONTAINS_MEMORY]->(m)
            SET m += $metadata

            RETURN m.id AS memory_id
            "#,
        )
        .param("conversation_id", memory.source_conversation_id.to_string())
        .param("memory_id", memory.memory_id.to_string())
        .param("memory_type", memory.memory_type.to_string())
        .param("content", memory.content.clone())
        .param("confidence", memory.confidence)
        .param("category", memory.category.clone().unwrap_or_default())
        .param("extraction_time", memory.extraction_timestamp.to_rfc3339())
        .param("valid_from", memory.valid_from.to_rfc3339())
        .param(
            "valid_until",
            memory.valid_until.map(|t| t.to_rfc3339()),
        )
        .param("learned_at", memory.learned_at.to_rfc3339())
        .param("superseded_by", memory.superseded_by.as_ref().map(|id| id.to_string()))
        .param("supersedes", memory.supersedes.as_ref().map(|id| id.to_string()))
        .param("metadata", metadata_map);

        self.graph.run(q).await?;
        debug!(memory_id = %memory.memory_id, "stored memory node");
        Ok(())
    }

    pub async fn store_embedding(
        &self,
        memory_id: &MemoryId,
        embedding: &[f32],
        embedding_version: &str,
    ) -> Result<bool> {
        if embedding.len() != EMBEDDING_DIMENSION {
            return Err(GraphError::InvalidEmbeddingDimension {
                expected: EMBEDDING_DIMENSION,
                actual: embedding.len(),
            });
        }

        let q = query(
            r#"
            MATCH (m:Memory {id: $memory_id})
            SET
                m.embedding = $embedding,
                m.has_embedding = true,
                m.embedding_version = $embedding_version,
                m.embedding_updated_at = datetime()
            RETURN m.id AS memory_id
            "#,
        )
        .param("memory_id", memory_id.to_string())
        .param("embedding", embedding.to_vec())
        .param("embedding_version", embedding_version.to_string());

        let mut stream = self.graph.execute(q).await?;
        let found = stream.next().await?.is_some();
        if !found {
            warn!(%memory_id, "memory not found, cannot store embedding");
        }
        Ok(found)
    }

    /// Finds the most similar memory with temporal overlap and different
    /// content. Graceful degradation: any query failure returns `Ok(None)`
    /// rather than propagating, so contradiction detection never blocks
    /// storage.
    pub async fn detect_contradiction(
        &self,
        candidate_id: &MemoryId,
        embedding: &[f32],
        content: &str,
        valid_from: DateTime<Utc>,
        similarity_threshold: f64,
    ) -> Option<Contradiction> {
        let q = query(
            r#"
            MATCH (m:Memory)
            WHERE m.has_embedding = true
              AND m.id <> $new_memory_id
              AND (m.valid_until IS NULL OR m.valid_until > datetime($valid_from))
            WITH m, gds.similarity.cosine(m.embedding, $new_embedding) AS similarity
            WHERE similarity >= $similarity_threshold
              AND m.content <> $new_content
            RETURN m.id AS memory_id, m.content AS content, similarity
            ORDER BY similarity DESC
            LIMIT 1
            "#,
        )
        .param("new_memory_id", candidate_id.to_string())
        .param("new_embedding", embedding.to_vec())
        .param("new_content", content.to_string())
        .param("valid_from", valid_from.to_rfc3339())
        .param("similarity_threshold", similarity_threshold);

        let result = async {
            let mut stream = self.graph.execute(q).await?;
            if let Some(row) = stream.next().await? {
                let memory_id: String = row.get("memory_id")?;
                let content: String = row.get("content")?;
                let similarity: f64 = row.get("similarity")?;
                Ok::<_, GraphError>(Some(Contradiction {
                    memory_id: MemoryId::from(memory_id),
                    content,
                    similarity,
                }))
            } else {
                Ok(None)
            }
        }
        .await;

        match result {
            Ok(contradiction) => contradiction,
            Err(e) => {
                warn!(error = %e, "contradiction detection failed, continuing without");
                None
            }
        }
    }

    /// Marks the old memory invalid as of the new memory's `valid_from` and
    /// creates the `SUPERSEDES` edge. Preserves the old memory for
    /// historical queries rather than deleting it.
    pub async fn handle_superseding(
        &self,
        new_memory_id: &MemoryId,
        new_valid_from: DateTime<Utc>,
        old_memory_id: &MemoryId,
    ) -> Result<()> {
        let q = query(
            r#"
            MATCH (old:Memory {id: $old_memory_id})
            MATCH (new:Memory {id: $new_memory_id})
            SET
                old.valid_until = datetime($new_valid_from),
                old.superseded_by = $new_memory_id
            SET new.supersedes = $old_memory_id
            CREATE (new)-[:SUPERSEDES {created_at: datetime()}]->(old)
            RETURN old.id AS old_id
            "#,
        )
        .param("old_memory_id", old_memory_id.to_string())
        .param("new_memory_id", new_memory_id.to_string())
        .param("new_valid_from", new_valid_from.to_rfc3339());

        let mut stream = self.graph.execute(q).await?;
        if stream.next().await?.is_none() {
            warn!(%old_memory_id, %new_memory_id, "superseding relationship not created, memories may not exist");
        } else {
            info!(%new_memory_id, %old_memory_id, "superseding complete");
        }
        Ok(())
    }

    /// Fetches memories still missing an embedding, for the backfill worker.
    pub async fn memories_without_embeddings(&self, batch_size: usize) -> Result<Vec<PendingEmbedding>> {
        let q = query(
            r#"
            MATCH (m:Memory)
            WHERE m.has_embedding = false OR m.has_embedding IS NULL
            RETURN m.id AS memory_id, m.content AS content
            LIMIT $batch_size
            "#,
        )
        .param("batch_size", batch_size as i64);

        let mut stream = self.graph.execute(q).await?;
        let mut pending = Vec::new();
        while let Some(row) = stream.next().await? {
            let memory_id: String = row.get("memory_id")?;
            let content: String = row.get("content")?;
            pending.push(PendingEmbedding {
                memory_id: MemoryId::from(memory_id),
                content,
            });
        }
        Ok(pending)
    }

    /// Records an access to each memory: increments `access_count` and sets
    /// `last_accessed`. Ported from `access_tracker.py::record_access`.
    pub async fn record_access(&self, memory_ids: &[MemoryId], access_time: DateTime<Utc>) -> Result<u32> {
        if memory_ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<String> = memory_ids.iter().map(|id| id.to_string()).collect();
        let q = query(
            r#"
            UNWIND $ids AS memory_id
            MATCH (m:Memory {id: memory_id})
            SET
                m.access_count = coalesce(m.access_count, 0) + 1,
                m.last_accessed = datetime($access_time)
            RETURN count(m) AS updated
            "#,
        )
        .param("ids", ids)
        .param("access_time", access_time.to_rfc3339());

        let mut stream = self.graph.execute(q).await?;
        let updated = match stream.next().await? {
            Some(row) => row.get::<i64>("updated").unwrap_or(0),
            None => 0,
        };
        Ok(updated as u32)
    }

    /// Fetches access metadata for a set of memories. Missing memories are
    /// omitted; callers should fill in defaults (`spec.md` §4.10).
    pub async fn access_metadata(&self, memory_ids: &[MemoryId]) -> Result<HashMap<String, AccessMetadata>> {
        if memory_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<String> = memory_ids.iter().map(|id| id.to_string()).collect();
        let q = query(
            r#"
            UNWIND $ids AS memory_id
            MATCH (m:Memory {id: memory_id})
            RETURN m.id AS memory_id, m.last_accessed AS last_accessed, coalesce(m.access_count, 0) AS access_count
            "#,
        )
        .param("ids", ids);

        let mut stream = self.graph.execute(q).await?;
        let mut result = HashMap::new();
        while let Some(row) = stream.next().await? {
            let memory_id: String = row.get("memory_id")?;
            let access_count: i64 = row.get("access_count").unwrap_or(0);
            let last_accessed_str: Option<String> = row.get("last_accessed").ok();
            let last_accessed = last_accessed_str.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc));

            result.insert(
                memory_id.clone(),
                AccessMetadata {
                    memory_id: Some(MemoryId::from(memory_id)),
                    last_accessed,
                    access_count: access_count as u64,
                },
            );
        }
        Ok(result)
    }

    /// Vector-index nearest-neighbour search (`spec.md` §4.7, step 2).
    /// Ported from `neo4j.py::search_similar_memories`: queries the
    /// `memory_embeddings` vector index for `2 * top_k` candidates, then
    /// filters by confidence, similarity, and optional memory types.
    pub async fn search_similar(&self, params: VectorSearchParams<'_>) -> Result<Vec<SearchHit>> {
        let search_k = (params.top_k * 2).max(1) as i64;

        let mut cypher = String::from(
            r#"
            CALL db.index.vector.queryNodes('memory_embeddings', $search_k, $query_vector)
            YIELD node AS memory, score
            WHERE memory.confidence >= $min_confidence
              AND score >= $min_similarity
            "#,
        );
        if params.memory_types.is_some() {
            cypher.push_str(" AND memory.type IN $memory_types\n");
        }
        cypher.push_str(
            r#"
            RETURN memory.id AS memory_id, score AS score
            ORDER BY score DESC
            LIMIT $top_k
            "#,
        );

        let mut q = query(&cypher)
            .param("search_k", search_k)
            .param("query_vector", params.query_vector.to_vec())
            .param("min_confidence", params.min_confidence)
            .param("min_similarity", params.min_similarity)
            .param("top_k", params.top_k as i64);
        if let Some(types) = params.memory_types {
            let type_strings: Vec<String> = types.iter().map(|t| t.to_string()).collect();
            q = q.param("memory_types", type_strings);
        }

        let mut stream = self.graph.execute(q).await?;
        let mut hits = Vec::new();
        while let Some(row) = stream.next().await? {
            let memory_id: String = row.get("memory_id")?;
            let score: f64 = row.get("score").unwrap_or(0.0);
            hits.push(SearchHit {
                memory_id: MemoryId::from(memory_id),
                similarity: score,
            });
        }
        Ok(hits)
    }

    /// Fetches full memory records by id, for materializing search hits.
    pub async fn fetch_memories(&self, memory_ids: &[MemoryId]) -> Result<Vec<MemoryRecord>> {
        if memory_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = memory_ids.iter().map(|id| id.to_string()).collect();

        let q = query(
            r#"
            UNWIND $ids AS memory_id
            MATCH (c:Conversation)-[:CONTAINS_MEMORY]->(m:Memory {id: memory_id})
            RETURN
                m.id AS memory_id,
                m.type AS memory_type,
                m.content AS content,
                m.confidence AS confidence,
                m.category AS category,
                c.id AS source_conversation_id,
                m.valid_from AS valid_from,
                m.valid_until AS valid_until,
                m.created_at AS extraction_timestamp,
                m.supersedes AS supersedes,
                m.superseded_by AS superseded_by,
                m.has_embedding AS has_embedding,
                m.embedding AS embedding,
                m.embedding_version AS embedding_version,
                coalesce(m.access_count, 0) AS access_count,
                m.last_accessed AS last_accessed
            "#,
        )
        .param("ids", ids);

        let mut stream = self.graph.execute(q).await?;
        let mut records = Vec::new();
        while let Some(row) = stream.next().await? {
            records.push(row_to_memory(&row)?);
        }
        Ok(records)
    }

    pub async fn health_check(&self) -> bool {
        match self.graph.run(query("RETURN 1")).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "graph health check failed");
                false
            }
        }
    }
}
