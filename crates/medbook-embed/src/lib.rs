//! Sentence embedders.
//!
//! [`BertEmbedder`] runs a BGE-small class model locally with candle; the
//! deterministic [`HashingEmbedder`] stands in when
//! `APP_USE_FAKE_EMBEDDINGS=1`, keeping tests and offline runs independent
//! of model weights.

use anyhow::{anyhow, Result};
use std::path::PathBuf;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;
use tracing::info;

use medbook_core::traits::Embedder;

/// Output width of the BGE-small family.
pub const EMBEDDING_DIM: usize = 384;

const MAX_SEQ_LEN: usize = 512;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertEmbedder {
    /// Loads tokenizer, config, and weights from a local model directory
    /// resolved from the model id (`APP_MODEL_DIR` and `MODEL_DIR` override
    /// the `models/<basename>` convention).
    pub fn new(model_id: &str) -> Result<Self> {
        let device = default_device();
        let model_dir = resolve_model_dir(model_id)?;
        info!(dir = %model_dir.display(), "loading sentence embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!("failed to load tokenizer from {}: {e}", tokenizer_path.display())
        })?;

        let config_path = model_dir.join("config.json");
        let config: BertConfig =
            serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;

        let weights_path = model_dir.join("model.safetensors");
        let vb = if weights_path.exists() {
            // Safety: the mmap'd file is not mutated while the model lives.
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)? }
        } else {
            // Older exports ship pickle weights instead
            let weights = candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?;
            VarBuilder::from_tensors(weights.into_iter().collect(), DTYPE, &device)
        };
        let model = BertModel::load(vb, &config)?;
        info!(model = model_id, "embedding model ready");

        Ok(Self { model, tokenizer, device })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;
        let mut ids: Vec<u32> = encoding.get_ids().to_vec();
        let mut mask: Vec<u32> = encoding.get_attention_mask().to_vec();
        if ids.len() > MAX_SEQ_LEN {
            ids.truncate(MAX_SEQ_LEN);
            mask.truncate(MAX_SEQ_LEN);
        }
        let seq_len = ids.len();

        let input_ids = Tensor::from_iter(ids, &self.device)?.reshape((1, seq_len))?;
        let attention_mask = Tensor::from_iter(mask, &self.device)?.reshape((1, seq_len))?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden =
            self.model
                .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Masked mean pooling over tokens, then L2 normalization so cosine
        // distance applies downstream.
        let mask_f = attention_mask.to_dtype(hidden.dtype())?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask_f)?.sum(1)?;
        let counts = mask_f.sum(1)?;
        let mean = summed.broadcast_div(&counts)?;
        let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = mean.broadcast_div(&norm)?;

        let vector: Vec<f32> = normalized.squeeze(0)?.to_vec1()?;
        Ok(vector)
    }
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed_one(text)).collect()
    }
}

/// Deterministic bag-of-hashed-tokens embedder. Tokens are lowercased and
/// split on non-alphanumerics so "Metformin." and "metformin" land in the
/// same bucket; the vector is L2-normalized like the real model's output.
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut vector = vec![0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let hash = hasher.finish();
            let bucket = (hash as usize) % self.dim;
            let weight = (((hash >> 32) as u32) as f32) / (u32::MAX as f32);
            vector[bucket] += 0.5 + weight;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut vector {
            *x /= norm;
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// Embedder selection: `APP_USE_FAKE_EMBEDDINGS=1` forces the hashing
/// embedder, otherwise the local BERT model is loaded.
pub fn default_embedder(model_id: &str) -> Result<Box<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        info!("using hashing embedder (APP_USE_FAKE_EMBEDDINGS)");
        return Ok(Box::new(HashingEmbedder::new(EMBEDDING_DIM)));
    }
    Ok(Box::new(BertEmbedder::new(model_id)?))
}

fn default_device() -> Device {
    #[cfg(feature = "metal")]
    if let Ok(device) = Device::new_metal(0) {
        return device;
    }
    Device::Cpu
}

/// Model directory resolution: `APP_MODEL_DIR`, then `MODEL_DIR`, then
/// `models/<model basename>` relative to the working directory and its
/// parent.
fn resolve_model_dir(model_id: &str) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let path = PathBuf::from(&dir);
            if path.exists() {
                return Ok(path);
            }
        }
    }
    let basename = model_id.rsplit('/').next().unwrap_or(model_id);
    for root in ["models", "../models"] {
        let path = PathBuf::from(root).join(basename);
        if path.exists() {
            return Ok(path);
        }
    }
    Err(anyhow!(
        "could not locate a local directory for embedding model '{model_id}'; \
         set APP_MODEL_DIR or place the export under models/{basename}"
    ))
}
