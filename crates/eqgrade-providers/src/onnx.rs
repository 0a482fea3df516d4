//! Local sentence embeddings through ONNX Runtime.
//!
//! The model directory must contain `model.onnx` and `tokenizer.json`, as
//! exported for sentence-transformers style encoders. Runtime support is
//! behind the `onnx-embeddings` feature; pooling is always available.

use serde::{Deserialize, Serialize};

use eqgrade_core::similarity::l2_normalize;

/// How token states are reduced to one sentence vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Attention-masked mean over all tokens.
    #[default]
    Mean,
    /// The first (`[CLS]`) token state.
    Cls,
}

/// Pool a `[seq_len, dim]` row-major hidden-state buffer and L2-normalize
/// the result.
pub fn pool(hidden: &[f32], dim: usize, attention_mask: &[i64], pooling: Pooling) -> Vec<f32> {
    let pooled = match pooling {
        Pooling::Cls => hidden.iter().take(dim).copied().collect(),
        Pooling::Mean => {
            let mut pooled = vec![0.0f32; dim];
            let mut mask_sum = 0.0f32;
            for (token_idx, &mask) in attention_mask.iter().enumerate() {
                let mask = mask as f32;
                let offset = token_idx * dim;
                let Some(row) = hidden.get(offset..offset + dim) else {
                    break;
                };
                mask_sum += mask;
                for (p, h) in pooled.iter_mut().zip(row) {
                    *p += h * mask;
                }
            }
            if mask_sum > 0.0 {
                for val in &mut pooled {
                    *val /= mask_sum;
                }
            }
            pooled
        }
    };
    l2_normalize(pooled)
}

#[cfg(feature = "onnx-embeddings")]
mod runtime {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, bail, Context, Result};
    use async_trait::async_trait;
    use ort::session::Session;
    use tracing::instrument;

    use eqgrade_core::traits::EmbeddingProvider;

    use super::{pool, Pooling};
    use crate::error::ProviderError;

    /// Transformer encoder run in-process.
    ///
    /// `Session::run` needs `&mut self`, so the session sits behind a mutex;
    /// inference runs on the blocking pool.
    pub struct OnnxEmbedder {
        model: String,
        inner: Arc<Inner>,
    }

    struct Inner {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
        pooling: Pooling,
    }

    impl OnnxEmbedder {
        /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
        pub fn load(model_dir: &Path, model: impl Into<String>, pooling: Pooling) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            for path in [&model_path, &tokenizer_path] {
                if !path.exists() {
                    return Err(ProviderError::ModelNotFound(path.display().to_string()).into());
                }
            }

            let session = Session::builder()
                .map_err(|e| anyhow!("failed to create ONNX session: {e}"))?
                .with_intra_threads(2)
                .map_err(|e| anyhow!("failed to configure ONNX session: {e}"))?
                .commit_from_file(&model_path)
                .map_err(|e| anyhow!("ONNX load failed for {}: {e}", model_path.display()))?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| anyhow!("tokenizer load failed: {e}"))?;

            tracing::info!(model_dir = %model_dir.display(), ?pooling, "ONNX embedder loaded");

            Ok(Self {
                model: model.into(),
                inner: Arc::new(Inner {
                    session: Mutex::new(session),
                    tokenizer,
                    pooling,
                }),
            })
        }

        /// Directory layout used by the config: `<root>/<model id>`.
        pub fn model_dir(root: &Path, model: &str) -> PathBuf {
            root.join(model)
        }
    }

    impl Inner {
        fn infer(&self, text: &str) -> Result<Vec<f32>> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| anyhow!("tokenization failed: {e}"))?;

            let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
            let attention_mask: Vec<i64> = encoding
                .get_attention_mask()
                .iter()
                .map(|&m| m as i64)
                .collect();
            let token_type_ids: Vec<i64> =
                encoding.get_type_ids().iter().map(|&t| t as i64).collect();

            let seq_len = input_ids.len();
            let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)?;
            let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())?;
            let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)?;

            let ids_tensor = TensorRef::from_array_view(&ids_array)
                .map_err(|e| anyhow!("input tensor: {e}"))?;
            let mask_tensor = TensorRef::from_array_view(&mask_array)
                .map_err(|e| anyhow!("mask tensor: {e}"))?;
            let type_tensor = TensorRef::from_array_view(&type_array)
                .map_err(|e| anyhow!("type tensor: {e}"))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| anyhow!("ONNX session lock poisoned"))?;
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| anyhow!("ONNX inference failed: {e}"))?;

            // [1, seq_len, hidden]
            let (shape, hidden) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| anyhow!("output extraction: {e}"))?;
            if shape.len() != 3 || shape[1] as usize != seq_len {
                bail!("unexpected output shape {shape:?}, expected [1, {seq_len}, hidden]");
            }
            let dim = shape[2] as usize;

            Ok(pool(hidden, dim, &attention_mask, self.pooling))
        }
    }

    #[async_trait]
    impl EmbeddingProvider for OnnxEmbedder {
        fn name(&self) -> &str {
            "onnx"
        }

        fn model(&self) -> &str {
            &self.model
        }

        #[instrument(skip(self, text), fields(model = %self.model, chars = text.len()))]
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let inner = Arc::clone(&self.inner);
            let text = text.to_owned();
            tokio::task::spawn_blocking(move || inner.infer(&text))
                .await
                .context("ONNX inference task panicked")?
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
pub use runtime::OnnxEmbedder;
