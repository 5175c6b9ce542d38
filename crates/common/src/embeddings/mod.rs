//! The `Embedder` capability and its production implementation.
//!
//! Per design note (§9 "process-wide encoder singleton → explicit handle"),
//! callers construct one `LocalEncoder` and pass it by `Arc<dyn Embedder>`
//! into whichever pipeline needs it (embedding pipeline, search engine) —
//! there is no module-level global. The encoder itself is a local BERT-family
//! model pulled from Hugging Face Hub via `hf-hub`, grounded on
//! `examples/Classacre-ferrumyx/crates/ferrumyx-embed/src/embedder.rs`
//! (tokenization, mean-pooling, L2 normalization), adapted to this
//! workspace's `Embedder` trait shape (`crates/common/src/embeddings/mod.rs`
//! in the teacher workspace defined the trait against a *remote* OpenAI
//! client; the trait shape survives, the implementation does not — spec.md
//! §6 names a local `EMBED_MODEL`, not a hosted API).

mod pooling;

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, HiddenAct, PositionEmbeddingType};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

pub use pooling::l2_normalize_vec;

/// Generates dense vectors for arbitrary text. Every embedding this trait
/// produces is L2-normalized (invariant #5, spec.md §3) so L2 distance and
/// cosine similarity coincide at the ANN layer.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The encoder's own identity. Orthogonal to the model *label* keyed in
    /// `paper_embeddings`/`concept_embeddings` (spec.md §4.4 "determinism" —
    /// a label is a version key, not necessarily this string).
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Default number of distinct texts the query-embedding cache holds, mirroring
/// `ferrumyx-embed`'s `EmbeddingConfig::cache_size` default.
const DEFAULT_CACHE_SIZE: usize = 256;

/// Local BERT-family text encoder loaded from Hugging Face Hub.
///
/// Mean-pools token embeddings over the attention mask, then L2-normalizes —
/// the same pipeline `ferrumyx-embed`'s `BiomedBertEmbedder` uses, generalized
/// to whatever `model_id` is configured (`EMBED_MODEL`, default
/// `bge-base-en-v1.5`) instead of being pinned to a biomedical checkpoint.
///
/// Holds a small LRU cache keyed by exact text, same shape as
/// `ferrumyx-embed`'s `BiomedBertEmbedder::cache` — worthwhile here because
/// the search engine re-embeds the query text on every request (spec.md
/// §4.5), so repeated queries skip the forward pass entirely.
pub struct LocalEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dimension: usize,
    max_length: usize,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl LocalEncoder {
    /// Downloads (if not cached) and loads the model + tokenizer, blocking on
    /// a `spawn_blocking` task since `hf-hub`'s sync API does filesystem and
    /// network I/O that must not run on the async runtime's worker threads.
    pub async fn load(model_id: impl Into<String>) -> Result<Self> {
        let model_id = model_id.into();
        let start = Instant::now();
        info!(model_id = %model_id, "loading local encoder");

        let id_for_blocking = model_id.clone();
        let (config, tokenizer, weights_path) = tokio::task::spawn_blocking(move || {
            Self::fetch_model_files(&id_for_blocking)
        })
        .await
        .map_err(|e| AppError::internal(format!("encoder load task panicked: {e}")))??;

        let device = Device::Cpu;
        let vb = if weights_path.extension().map(|e| e == "safetensors").unwrap_or(false) {
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[&weights_path], DType::F32, &device)
                    .map_err(|e| AppError::internal(format!("loading safetensors: {e}")))?
            }
        } else {
            VarBuilder::from_pth(&weights_path, DType::F32, &device)
                .map_err(|e| AppError::internal(format!("loading pytorch weights: {e}")))?
        };

        let dimension = config.hidden_size;
        let model = BertModel::load(vb, &config)
            .map_err(|e| AppError::internal(format!("constructing bert model: {e}")))?;

        info!(
            model_id = %model_id,
            dimension,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "local encoder ready"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id,
            dimension,
            max_length: 512,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_CACHE_SIZE).expect("DEFAULT_CACHE_SIZE is nonzero"),
            )),
        })
    }

    fn fetch_model_files(model_id: &str) -> Result<(Config, Tokenizer, std::path::PathBuf)> {
        let api = Api::new().map_err(|e| AppError::internal(format!("hf-hub api init: {e}")))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| AppError::internal(format!("fetching config.json: {e}")))?;
        let config = Self::parse_config(&config_path)?;

        let tokenizer = match repo.get("tokenizer.json") {
            Ok(path) => Tokenizer::from_file(&path)
                .map_err(|e| AppError::internal(format!("loading tokenizer.json: {e}")))?,
            Err(_) => {
                let vocab_path = repo
                    .get("vocab.txt")
                    .map_err(|e| AppError::internal(format!("fetching vocab.txt: {e}")))?;
                Self::wordpiece_from_vocab(&vocab_path)?
            }
        };

        let weights_path = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))
            .map_err(|e| AppError::internal(format!("fetching model weights: {e}")))?;

        Ok((config, tokenizer, weights_path))
    }

    fn parse_config(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::internal(format!("reading config.json: {e}")))?;
        let json: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| AppError::internal(format!("parsing config.json: {e}")))?;

        let hidden_act = match json.get("hidden_act").and_then(|v| v.as_str()) {
            Some("relu") => HiddenAct::Relu,
            Some("gelu_new") | Some("gelu_approximate") => HiddenAct::GeluApproximate,
            _ => HiddenAct::Gelu,
        };

        Ok(Config {
            vocab_size: field_u64(&json, "vocab_size", 30522),
            hidden_size: field_u64(&json, "hidden_size", 768),
            num_hidden_layers: field_u64(&json, "num_hidden_layers", 12),
            num_attention_heads: field_u64(&json, "num_attention_heads", 12),
            intermediate_size: field_u64(&json, "intermediate_size", 3072),
            hidden_act,
            hidden_dropout_prob: field_f64(&json, "hidden_dropout_prob", 0.1),
            max_position_embeddings: field_u64(&json, "max_position_embeddings", 512),
            type_vocab_size: field_u64(&json, "type_vocab_size", 2),
            initializer_range: field_f64(&json, "initializer_range", 0.02),
            layer_norm_eps: field_f64(&json, "layer_norm_eps", 1e-12),
            pad_token_id: field_u64(&json, "pad_token_id", 0),
            position_embedding_type: PositionEmbeddingType::Absolute,
            use_cache: true,
            classifier_dropout: None,
            model_type: None,
        })
    }

    fn wordpiece_from_vocab(vocab_path: &Path) -> Result<Tokenizer> {
        use tokenizers::models::wordpiece::WordPieceBuilder;

        let content = std::fs::read_to_string(vocab_path)
            .map_err(|e| AppError::internal(format!("reading vocab.txt: {e}")))?;
        let vocab: std::collections::HashMap<String, u32> = content
            .lines()
            .enumerate()
            .map(|(i, line)| (line.to_string(), i as u32))
            .collect();

        let wordpiece = WordPieceBuilder::new()
            .vocab(vocab)
            .continuing_subword_prefix("##".to_string())
            .max_input_chars_per_word(100)
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| AppError::internal(format!("building wordpiece tokenizer: {e}")))?;
        Ok(Tokenizer::new(wordpiece))
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AppError::internal(format!("tokenizing: {e}")))?;

        let mut ids_rows = Vec::with_capacity(texts.len());
        let mut mask_rows = Vec::with_capacity(texts.len());
        let mut type_rows = Vec::with_capacity(texts.len());

        for encoding in &encodings {
            let len = encoding.get_ids().len().min(self.max_length);
            ids_rows.push(encoding.get_ids()[..len].to_vec());
            mask_rows.push(encoding.get_attention_mask()[..len].to_vec());
            type_rows.push(encoding.get_type_ids()[..len].to_vec());
        }

        let max_len = ids_rows.iter().map(|r| r.len()).max().unwrap_or(0).max(1);
        for rows in [&mut ids_rows, &mut mask_rows, &mut type_rows] {
            for row in rows.iter_mut() {
                row.resize(max_len, 0);
            }
        }

        let batch_size = texts.len();
        let input_ids = Tensor::new(ids_rows, &self.device)
            .and_then(|t| t.reshape((batch_size, max_len)))
            .map_err(|e| AppError::internal(format!("building input_ids tensor: {e}")))?;
        let attention_mask = Tensor::new(mask_rows, &self.device)
            .and_then(|t| t.reshape((batch_size, max_len)))
            .and_then(|t| t.to_dtype(DType::F32))
            .map_err(|e| AppError::internal(format!("building attention_mask tensor: {e}")))?;
        let token_type_ids = Tensor::new(type_rows, &self.device)
            .and_then(|t| t.reshape((batch_size, max_len)))
            .map_err(|e| AppError::internal(format!("building token_type_ids tensor: {e}")))?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| AppError::internal(format!("bert forward pass: {e}")))?;

        let pooled = pooling::mean_pool(&hidden, &attention_mask)
            .map_err(|e| AppError::internal(format!("mean pooling: {e}")))?;
        let normalized = pooling::l2_normalize(&pooled)
            .map_err(|e| AppError::internal(format!("l2 normalize: {e}")))?;

        normalized
            .to_vec2::<f32>()
            .map_err(|e| AppError::internal(format!("tensor to vec: {e}")))
    }
}

#[async_trait]
impl Embedder for LocalEncoder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        out.pop()
            .ok_or_else(|| AppError::internal("encoder returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses = Vec::new();
        {
            let mut cache = self.cache.lock().expect("encoder cache mutex poisoned");
            for (i, text) in texts.iter().enumerate() {
                match cache.get(text) {
                    Some(v) => out[i] = Some(v.clone()),
                    None => misses.push(i),
                }
            }
        }

        debug!(
            requested = texts.len(),
            cache_hits = texts.len() - misses.len(),
            "encoder cache lookup"
        );

        if !misses.is_empty() {
            let miss_refs: Vec<&str> = misses.iter().map(|&i| texts[i].as_str()).collect();
            let embedded = self.encode_batch(&miss_refs)?;

            let mut cache = self.cache.lock().expect("encoder cache mutex poisoned");
            for (&i, vector) in misses.iter().zip(embedded.into_iter()) {
                cache.put(texts[i].clone(), vector.clone());
                out[i] = Some(vector);
            }
        }

        Ok(out
            .into_iter()
            .map(|v| v.expect("every index is filled by cache hit or miss path"))
            .collect())
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn field_u64(json: &serde_json::Value, key: &str, default: u64) -> usize {
    json.get(key).and_then(|v| v.as_u64()).unwrap_or(default) as usize
}

fn field_f64(json: &serde_json::Value, key: &str, default: f64) -> f64 {
    json.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

/// Deterministic test double implementing `Embedder` without a model
/// download — used throughout the embedding/search pipeline tests
/// (`examples/Classacre-ferrumyx/crates/ferrumyx-embed/src/embedder.rs::test_embedder_creation`'s
/// "skip gracefully when unavailable" convention is for integration tests
/// hitting the real encoder; this is for everything else).
#[derive(Debug, Clone)]
pub struct MockEncoder {
    dimension: usize,
}

impl MockEncoder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Hashes `text` into a deterministic, unit-norm vector. Two calls with
    /// the same text always produce the same vector (unlike a `rand`-backed
    /// mock), which lets tests assert on ranking order.
    fn hash_embed(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut v = Vec::with_capacity(self.dimension);
        let mut seed = {
            let mut h = DefaultHasher::new();
            text.hash(&mut h);
            h.finish()
        };
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            let bits = (seed >> 33) as u32;
            v.push((bits as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        l2_normalize_vec(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for MockEncoder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hash_embed(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hash_embed(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-encoder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_encoder_is_unit_norm() {
        let enc = MockEncoder::new(64);
        let v = enc.embed("graph neural networks").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn mock_encoder_is_deterministic() {
        let enc = MockEncoder::new(32);
        let a = enc.embed("federated learning").await.unwrap();
        let b = enc.embed("federated learning").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mock_encoder_batch_matches_single() {
        let enc = MockEncoder::new(16);
        let single = enc.embed("drug discovery").await.unwrap();
        let batch = enc
            .embed_batch(&["drug discovery".to_string()])
            .await
            .unwrap();
        assert_eq!(single, batch[0]);
    }

    #[tokio::test]
    async fn mock_encoder_distinguishes_distinct_texts() {
        let enc = MockEncoder::new(32);
        let a = enc.embed("cooking recipes").await.unwrap();
        let b = enc.embed("graph neural networks for drug discovery").await.unwrap();
        assert_ne!(a, b);
    }
}
