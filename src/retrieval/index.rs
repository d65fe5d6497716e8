//! Parameter Index - the embedded taxonomy of engineering parameters
//!
//! Persistence formats, picked by file extension:
//! 1. `.zst`: bincode stream compressed with zstd
//! 2. anything else: pretty-printed JSON

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{info, warn};
use uuid::Uuid;

use super::ranker;
use crate::embedding::{Embedder, Vector};
use crate::error::{ResolverError, Result};

/// A named point in the taxonomy, bound to its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Opaque unique handle (UUID v4)
    pub identifier: String,
    /// 1-based ordinal, the row/column key into the contradiction matrix
    pub position: u32,
    pub name: String,
    pub vector: Vector,
}

/// A parameter matched against a query, without its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub identifier: String,
    pub position: u32,
    pub name: String,
    pub distance: f32,
}

/// Knobs for the concurrent index build.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Maximum embed calls in flight
    pub concurrency: usize,
    /// Deadline per embed call; `None` waits indefinitely
    pub call_timeout: Option<Duration>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout: Some(Duration::from_secs(30)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexFormat {
    Json,
    Compressed,
}

impl IndexFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("zst") => Self::Compressed,
            _ => Self::Json,
        }
    }
}

/// Ordered, immutable catalog of parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterIndex {
    parameters: Vec<Parameter>,
}

impl ParameterIndex {
    /// Embed every name and assign positions `1..=names.len()` in order.
    ///
    /// Calls run concurrently up to `options.concurrency`. Any failure or
    /// timeout aborts the whole build; no partial index is returned.
    pub async fn build(
        names: &[String],
        embedder: &dyn Embedder,
        options: BuildOptions,
    ) -> Result<Self> {
        validate_names("<names>", names)?;

        let embedded: Vec<(usize, Vector)> = stream::iter(names.iter().enumerate())
            .map(|(slot, name)| async move {
                let vector = match options.call_timeout {
                    Some(limit) => tokio::time::timeout(limit, embedder.embed(name))
                        .await
                        .map_err(|_| {
                            ResolverError::embedding(name, format!("timed out after {:?}", limit))
                        })??,
                    None => embedder.embed(name).await?,
                };
                Ok::<_, ResolverError>((slot, vector))
            })
            .buffer_unordered(options.concurrency.max(1))
            .try_collect()
            .await?;

        let mut slots: Vec<Option<Vector>> = vec![None; names.len()];
        for (slot, vector) in embedded {
            slots[slot] = Some(vector);
        }

        let mut parameters = Vec::with_capacity(names.len());
        let mut dims = None;
        for (slot, (name, vector)) in names.iter().zip(slots).enumerate() {
            let vector = vector
                .ok_or_else(|| ResolverError::embedding(name, "no vector produced"))?;
            let expected = *dims.get_or_insert(vector.len());
            if vector.len() != expected {
                return Err(ResolverError::embedding(
                    name,
                    format!("expected {} dimensions, got {}", expected, vector.len()),
                ));
            }
            parameters.push(Parameter {
                identifier: Uuid::new_v4().to_string(),
                position: slot as u32 + 1,
                name: name.clone(),
                vector,
            });
        }

        Ok(Self { parameters })
    }

    /// Read a persisted index and check its structure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ResolverError::io(path, e))?;

        let mut records: Vec<Parameter> = match IndexFormat::for_path(path) {
            IndexFormat::Json => serde_json::from_reader(BufReader::new(file))
                .map_err(|e| ResolverError::corrupt(path, e.to_string()))?,
            IndexFormat::Compressed => {
                let decoder = zstd::stream::read::Decoder::new(file)
                    .map_err(|e| ResolverError::io(path, e))?;
                bincode::deserialize_from(decoder)
                    .map_err(|e| ResolverError::corrupt(path, e.to_string()))?
            }
        };

        if records.is_empty() {
            return Err(ResolverError::corrupt(path, "no parameters"));
        }

        records.sort_by_key(|p| p.position);
        let dims = records[0].vector.len();
        if dims == 0 {
            return Err(ResolverError::corrupt(path, "zero-length vectors"));
        }

        let mut seen = HashSet::new();
        for (slot, record) in records.iter().enumerate() {
            let expected = slot as u32 + 1;
            if record.position != expected {
                return Err(ResolverError::corrupt(
                    path,
                    format!("expected position {}, found {}", expected, record.position),
                ));
            }
            if record.vector.len() != dims {
                return Err(ResolverError::corrupt(
                    path,
                    format!(
                        "parameter {} has {} dimensions, expected {}",
                        record.position,
                        record.vector.len(),
                        dims
                    ),
                ));
            }
            if let Some(i) = record.vector.iter().position(|x| !x.is_finite()) {
                return Err(ResolverError::corrupt(
                    path,
                    format!("parameter {} has a non-finite value at index {}", record.position, i),
                ));
            }
            if !seen.insert(record.name.as_str()) {
                return Err(ResolverError::corrupt(
                    path,
                    format!("duplicate parameter name {:?}", record.name),
                ));
            }
        }

        Ok(Self { parameters: records })
    }

    /// Persist the full catalog. The target is replaced atomically, so a
    /// failed write never leaves a truncated cache behind.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir).map_err(|e| ResolverError::io(dir, e))?;

        {
            let mut writer = BufWriter::new(tmp.as_file());
            match IndexFormat::for_path(path) {
                IndexFormat::Json => {
                    serde_json::to_writer_pretty(&mut writer, &self.parameters)
                        .map_err(|e| ResolverError::io(path, e.into()))?;
                }
                IndexFormat::Compressed => {
                    let mut encoder = zstd::stream::write::Encoder::new(&mut writer, 3)
                        .map_err(|e| ResolverError::io(path, e))?;
                    bincode::serialize_into(&mut encoder, &self.parameters)
                        .map_err(|e| ResolverError::io(path, std::io::Error::other(e)))?;
                    encoder.finish().map_err(|e| ResolverError::io(path, e))?;
                }
            }
            writer.flush().map_err(|e| ResolverError::io(path, e))?;
        }

        tmp.persist(path)
            .map_err(|e| ResolverError::io(path, e.error))?;
        Ok(())
    }

    /// Load `cache_path` when it holds a valid index built from exactly the
    /// names in `names_path` (same count, same order); otherwise embed the
    /// names and write the result to `cache_path`.
    pub async fn load_or_build(
        cache_path: impl AsRef<Path>,
        names_path: impl AsRef<Path>,
        embedder: &dyn Embedder,
        options: BuildOptions,
    ) -> Result<Self> {
        let cache_path = cache_path.as_ref();
        let names_path = names_path.as_ref();
        let names = Self::read_names(names_path)?;

        if cache_path.exists() {
            match Self::load(cache_path) {
                Ok(index) if index.matches_names(&names) => {
                    info!("Loaded {} parameters from {:?}", index.len(), cache_path);
                    return Ok(index);
                }
                Ok(index) => warn!(
                    "Rebuilding parameter index: {:?} lists {} names, cache {:?} was built from a different list of {}",
                    names_path,
                    names.len(),
                    cache_path,
                    index.len()
                ),
                Err(e) => warn!("Rebuilding parameter index: {}", e),
            }
        }

        info!(
            "Embedding {} parameters with {} (concurrency {})",
            names.len(),
            embedder.model_name(),
            options.concurrency
        );
        let index = Self::build(&names, embedder, options).await?;
        index.save(cache_path)?;
        info!("Saved parameter index to {:?}", cache_path);
        Ok(index)
    }

    /// True when the index holds exactly `names`, in position order.
    pub fn matches_names(&self, names: &[String]) -> bool {
        self.parameters.len() == names.len()
            && self.parameters.iter().zip(names).all(|(p, n)| p.name == *n)
    }

    /// Read a one-name-per-line list. Trailing blank lines are ignored;
    /// blank lines in between would shift positions and are rejected.
    pub fn read_names(path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ResolverError::io(path, e))?;
        let mut names: Vec<String> = raw
            .trim_start_matches('\u{feff}')
            .lines()
            .map(|l| l.trim().to_string())
            .collect();
        while names.last().is_some_and(|n| n.is_empty()) {
            names.pop();
        }
        validate_names(&path.display().to_string(), &names)?;
        Ok(names)
    }

    /// The `n` parameters closest to `query`, nearest first.
    pub fn closest(&self, query: &[f32], n: usize) -> Result<Vec<RetrievalResult>> {
        let vectors: Vec<&[f32]> = self.parameters.iter().map(|p| p.vector.as_slice()).collect();
        let ranked = ranker::rank(query, &vectors, n)?;
        Ok(ranked
            .into_iter()
            .map(|r| {
                let p = &self.parameters[r.index];
                RetrievalResult {
                    identifier: p.identifier.clone(),
                    position: p.position,
                    name: p.name.clone(),
                    distance: r.distance,
                }
            })
            .collect())
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameter at 1-based `position`.
    pub fn get(&self, position: u32) -> Option<&Parameter> {
        position
            .checked_sub(1)
            .and_then(|i| self.parameters.get(i as usize))
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.parameters.first().map_or(0, |p| p.vector.len())
    }
}

fn validate_names(origin: &str, names: &[String]) -> Result<()> {
    let invalid = |reason: String| ResolverError::InvalidSource {
        origin: origin.to_string(),
        reason,
    };
    if names.is_empty() {
        return Err(invalid("no parameter names".to_string()));
    }
    let mut seen = HashSet::new();
    for (slot, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(invalid(format!("blank name at line {}", slot + 1)));
        }
        if !seen.insert(name.as_str()) {
            return Err(invalid(format!("duplicate name {:?} at line {}", name, slot + 1)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::FixedEmbedder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn embedder() -> FixedEmbedder {
        FixedEmbedder::new()
            .with("Weight of moving object", vec![1.0, 0.0, 0.0])
            .with("Weight of stationary object", vec![0.9, 0.1, 0.0])
            .with("Speed", vec![0.0, 1.0, 0.0])
            .with("Force", vec![0.0, 0.0, 1.0])
    }

    #[tokio::test]
    async fn test_positions_follow_input_order() {
        let list = names(&["Speed", "Force", "Weight of moving object"]);
        let index = ParameterIndex::build(&list, &embedder(), BuildOptions::default())
            .await
            .unwrap();

        let positions: Vec<(&str, u32)> = index
            .parameters()
            .iter()
            .map(|p| (p.name.as_str(), p.position))
            .collect();
        assert_eq!(
            positions,
            vec![("Speed", 1), ("Force", 2), ("Weight of moving object", 3)]
        );
        assert_eq!(index.get(2).unwrap().name, "Force");
        assert!(index.get(0).is_none());
        assert!(index.get(4).is_none());
        assert_eq!(index.dimensions(), 3);
    }

    #[tokio::test]
    async fn test_positions_stable_under_concurrency() {
        struct SlowFirst(FixedEmbedder);

        #[async_trait]
        impl Embedder for SlowFirst {
            async fn embed(&self, text: &str) -> Result<Vector> {
                if text == "Weight of moving object" {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                self.0.embed(text).await
            }
            fn model_name(&self) -> &str {
                "slow-first"
            }
        }

        let list = names(&["Weight of moving object", "Speed", "Force"]);
        let options = BuildOptions {
            concurrency: 3,
            call_timeout: None,
        };
        let index = ParameterIndex::build(&list, &SlowFirst(embedder()), options)
            .await
            .unwrap();
        assert_eq!(index.get(1).unwrap().vector, vec![1.0, 0.0, 0.0]);
        assert_eq!(index.get(2).unwrap().name, "Speed");
    }

    #[tokio::test]
    async fn test_build_respects_concurrency_bound() {
        struct Gauge {
            inner: FixedEmbedder,
            in_flight: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl Embedder for Gauge {
            async fn embed(&self, text: &str) -> Result<Vector> {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.inner.embed(text).await
            }
            fn model_name(&self) -> &str {
                "gauge"
            }
        }

        let mut inner = FixedEmbedder::new();
        let list: Vec<String> = (1..=12).map(|i| format!("Parameter {}", i)).collect();
        for (i, name) in list.iter().enumerate() {
            inner.insert(name.clone(), vec![1.0, i as f32]);
        }

        for concurrency in [1, 3] {
            let gauge = Gauge {
                inner: inner.clone(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            };
            let options = BuildOptions {
                concurrency,
                call_timeout: None,
            };
            let index = ParameterIndex::build(&list, &gauge, options).await.unwrap();
            assert_eq!(index.len(), 12);
            let peak = gauge.peak.load(Ordering::SeqCst);
            assert!(peak <= concurrency, "peak {} exceeds bound {}", peak, concurrency);
            assert_eq!(peak, concurrency, "bound should be reached with 12 slow calls");
        }
    }

    #[tokio::test]
    async fn test_build_rejects_bad_names() {
        let err = ParameterIndex::build(&[], &embedder(), BuildOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::InvalidSource { .. }));

        let err = ParameterIndex::build(
            &names(&["Speed", "Speed"]),
            &embedder(),
            BuildOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[tokio::test]
    async fn test_build_aborts_on_failed_embed() {
        let list = names(&["Speed", "Temperature", "Force"]);
        let err = ParameterIndex::build(&list, &embedder(), BuildOptions::default())
            .await
            .unwrap_err();
        match err {
            ResolverError::EmbeddingUnavailable { text, .. } => assert_eq!(text, "Temperature"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_build_times_out() {
        struct Stalled;

        #[async_trait]
        impl Embedder for Stalled {
            async fn embed(&self, _text: &str) -> Result<Vector> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(vec![1.0])
            }
            fn model_name(&self) -> &str {
                "stalled"
            }
        }

        let options = BuildOptions {
            concurrency: 2,
            call_timeout: Some(Duration::from_millis(20)),
        };
        let err = ParameterIndex::build(&names(&["Speed"]), &Stalled, options)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_save_load_round_trip_both_formats() {
        let dir = tempdir().unwrap();
        let list = names(&["Weight of moving object", "Speed", "Force"]);
        let index = ParameterIndex::build(&list, &embedder(), BuildOptions::default())
            .await
            .unwrap();

        for file in ["parameters.json", "parameters.bin.zst"] {
            let path = dir.path().join(file);
            index.save(&path).unwrap();
            let loaded = ParameterIndex::load(&path).unwrap();
            assert_eq!(loaded, index, "round trip through {}", file);
        }
    }

    #[test]
    fn test_load_rejects_gaps_and_ragged_vectors() {
        let dir = tempdir().unwrap();
        let record = |position: u32, name: &str, vector: Vec<f32>| Parameter {
            identifier: Uuid::new_v4().to_string(),
            position,
            name: name.to_string(),
            vector,
        };

        let gap = vec![record(1, "A", vec![1.0, 0.0]), record(3, "B", vec![0.0, 1.0])];
        let path = dir.path().join("gap.json");
        std::fs::write(&path, serde_json::to_string(&gap).unwrap()).unwrap();
        let err = ParameterIndex::load(&path).unwrap_err();
        assert!(matches!(err, ResolverError::CorruptIndex { .. }));
        assert!(err.to_string().contains("expected position 2"));

        let ragged = vec![record(1, "A", vec![1.0, 0.0]), record(2, "B", vec![0.0])];
        let path = dir.path().join("ragged.json");
        std::fs::write(&path, serde_json::to_string(&ragged).unwrap()).unwrap();
        let err = ParameterIndex::load(&path).unwrap_err();
        assert!(err.to_string().contains("dimensions"));

        let path = dir.path().join("garbage.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ParameterIndex::load(&path).unwrap_err(),
            ResolverError::CorruptIndex { .. }
        ));
    }

    #[test]
    fn test_load_rejects_non_finite_vectors() {
        let dir = tempdir().unwrap();
        let index = ParameterIndex {
            parameters: vec![
                Parameter {
                    identifier: "a".into(),
                    position: 1,
                    name: "A".into(),
                    vector: vec![1.0, 0.0],
                },
                Parameter {
                    identifier: "b".into(),
                    position: 2,
                    name: "B".into(),
                    vector: vec![f32::NAN, 1.0],
                },
            ],
        };
        let path = dir.path().join("poisoned.bin.zst");
        index.save(&path).unwrap();

        let err = ParameterIndex::load(&path).unwrap_err();
        assert!(matches!(err, ResolverError::CorruptIndex { .. }));
        assert!(err.to_string().contains("non-finite value at index 0"));
    }

    #[test]
    fn test_matches_names_checks_count_and_order() {
        let index = ParameterIndex {
            parameters: ["A", "B"]
                .iter()
                .enumerate()
                .map(|(i, n)| Parameter {
                    identifier: n.to_string(),
                    position: i as u32 + 1,
                    name: n.to_string(),
                    vector: vec![1.0],
                })
                .collect(),
        };
        assert!(index.matches_names(&names(&["A", "B"])));
        assert!(!index.matches_names(&names(&["B", "A"])));
        assert!(!index.matches_names(&names(&["A"])));
        assert!(!index.matches_names(&names(&["A", "B", "C"])));
    }

    #[test]
    fn test_load_accepts_unsorted_records() {
        let dir = tempdir().unwrap();
        let records = vec![
            Parameter {
                identifier: "b".into(),
                position: 2,
                name: "B".into(),
                vector: vec![0.0, 1.0],
            },
            Parameter {
                identifier: "a".into(),
                position: 1,
                name: "A".into(),
                vector: vec![1.0, 0.0],
            },
        ];
        let path = dir.path().join("unsorted.json");
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();
        let index = ParameterIndex::load(&path).unwrap();
        assert_eq!(index.get(1).unwrap().name, "A");
    }

    #[test]
    fn test_read_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("parameters.txt");
        std::fs::write(&path, "  Weight of moving object \nSpeed\nForce\n\n").unwrap();
        assert_eq!(
            ParameterIndex::read_names(&path).unwrap(),
            names(&["Weight of moving object", "Speed", "Force"])
        );

        std::fs::write(&path, "\u{feff}Speed\nForce\n").unwrap();
        assert_eq!(ParameterIndex::read_names(&path).unwrap(), names(&["Speed", "Force"]));

        std::fs::write(&path, "Speed\n\nForce\n").unwrap();
        let err = ParameterIndex::read_names(&path).unwrap_err();
        assert!(err.to_string().contains("blank name at line 2"));
    }

    #[tokio::test]
    async fn test_closest_maps_back_to_parameters() {
        let list = names(&["Weight of moving object", "Weight of stationary object", "Speed"]);
        let index = ParameterIndex::build(&list, &embedder(), BuildOptions::default())
            .await
            .unwrap();

        let hits = index.closest(&[1.0, 0.05, 0.0], 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[1].name, "Weight of stationary object");
        assert!(hits[0].distance <= hits[1].distance);

        let err = index.closest(&[1.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, ResolverError::DimensionMismatch { .. }));
    }
}
