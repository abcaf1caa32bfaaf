//! Exact nearest-neighbor similarity index.
//!
//! Vectors live in one contiguous `Vec<f32>` (row-major, `dimension` floats
//! per record). Metadata is appended in lock-step, so a record's position is
//! also its row in the vector storage. Nothing is ever updated or removed.

use serde::Serialize;
use uuid::Uuid;

use blueprint_shared::{BlueprintError, Metadata, Result};

/// Metadata key under which the index stamps each record's identifier.
pub const RECORD_ID_KEY: &str = "record_id";

/// One stored record (the vector itself lives in the index's flat storage).
#[derive(Debug, Clone)]
pub struct IndexedRecord {
    /// 0-based insertion order; the join key into vector storage.
    pub position: usize,
    /// Identifier generated at insertion.
    pub id: Uuid,
    /// Caller metadata plus the stamped [`RECORD_ID_KEY`].
    pub metadata: Metadata,
}

/// A search hit.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub id: Uuid,
    pub metadata: Metadata,
    /// Squared Euclidean distance to the query.
    pub distance: f64,
    /// `1 / (1 + distance)`, in `(0, 1]`.
    pub score: f64,
}

/// Append-only, exhaustive-scan index over fixed-dimension vectors.
///
/// Not synchronized: callers that share an index across runs must serialize
/// `insert`/`search` themselves.
#[derive(Debug)]
pub struct SimilarityIndex {
    dimension: usize,
    vectors: Vec<f32>,
    records: Vec<IndexedRecord>,
}

impl SimilarityIndex {
    /// Create an empty index for vectors of length `dimension`.
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(BlueprintError::invalid_argument(
                "index dimension must be greater than 0",
            ));
        }
        Ok(Self {
            dimension,
            vectors: Vec::new(),
            records: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stored records in insertion order.
    pub fn records(&self) -> &[IndexedRecord] {
        &self.records
    }

    /// Append `vectors` with their `metadata`, returning the generated
    /// identifiers in insertion order.
    ///
    /// The batch is validated in full before anything is appended, so a
    /// failed insert leaves the index untouched.
    pub fn insert(&mut self, vectors: &[Vec<f32>], metadata: Vec<Metadata>) -> Result<Vec<Uuid>> {
        if vectors.is_empty() || metadata.is_empty() {
            return Err(BlueprintError::invalid_argument(
                "insert requires at least one vector and one metadata record",
            ));
        }
        if vectors.len() != metadata.len() {
            return Err(BlueprintError::invalid_argument(format!(
                "vector count ({}) does not match metadata count ({})",
                vectors.len(),
                metadata.len()
            )));
        }
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(BlueprintError::invalid_argument(format!(
                "vector {i} has length {}, index dimension is {}",
                v.len(),
                self.dimension
            )));
        }
        if let Some(i) = vectors.iter().position(|v| !all_finite(v)) {
            return Err(BlueprintError::invalid_argument(format!(
                "vector {i} has a non-finite component"
            )));
        }

        let mut ids = Vec::with_capacity(vectors.len());
        self.vectors.reserve(vectors.len() * self.dimension);
        self.records.reserve(vectors.len());

        for (vector, mut meta) in vectors.iter().zip(metadata) {
            let id = Uuid::new_v4();
            meta.insert(RECORD_ID_KEY.into(), id.to_string().into());
            self.vectors.extend_from_slice(vector);
            self.records.push(IndexedRecord {
                position: self.records.len(),
                id,
                metadata: meta,
            });
            ids.push(id);
        }

        tracing::debug!(inserted = ids.len(), total = self.len(), "index insert");
        Ok(ids)
    }

    /// Return the `k` nearest records to `query`, ascending by distance.
    ///
    /// `k` is clamped to the record count. Equal distances keep insertion
    /// order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(BlueprintError::invalid_argument("k must be greater than 0"));
        }
        if self.is_empty() {
            return Err(BlueprintError::invalid_argument("cannot search an empty index"));
        }
        if query.len() != self.dimension {
            return Err(BlueprintError::invalid_argument(format!(
                "query has length {}, index dimension is {}",
                query.len(),
                self.dimension
            )));
        }
        if !all_finite(query) {
            return Err(BlueprintError::invalid_argument(
                "query has a non-finite component",
            ));
        }

        let k = k.min(self.len());
        let mut scored: Vec<(usize, f64)> = self
            .vectors
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(query, row))
            .enumerate()
            .collect();

        // Stable sort: ties stay in position order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| {
                let record = &self.records[position];
                RetrievalResult {
                    id: record.id,
                    metadata: record.metadata.clone(),
                    distance,
                    score: 1.0 / (1.0 + distance),
                }
            })
            .collect())
    }
}

/// Accumulated in `f64` so finite `f32` inputs cannot overflow.
fn squared_l2(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum()
}

fn all_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}
