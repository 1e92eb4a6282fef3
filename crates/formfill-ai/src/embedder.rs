//! Local sentence embeddings through ONNX Runtime.
//!
//! Mean-pooled all-MiniLM-L6-v2 (384 dimensions). The model directory must
//! contain `model.onnx` and `tokenizer.json`.

use std::path::Path;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::info;

use crate::AiError;

/// Longest token sequence fed to the model; longer inputs are truncated.
const MAX_TOKENS: usize = 256;

fn embed_err(context: &str, e: impl std::fmt::Display) -> AiError {
    AiError::Embedding(format!("{context}: {e}"))
}

/// Sentence embedding model loaded from disk.
pub struct Embedder {
    session: Session,
    tokenizer: Tokenizer,
    dim: usize,
}

impl Embedder {
    pub fn load(model_dir: &Path) -> Result<Self, AiError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        for path in [&model_path, &tokenizer_path] {
            if !path.exists() {
                return Err(AiError::Embedding(format!(
                    "{} not found",
                    path.display()
                )));
            }
        }

        let session = Session::builder()
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| embed_err("load model", e))?;
        let dim = infer_dim(session.outputs()[0].dtype()).unwrap_or(384);

        let mut tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| embed_err("load tokenizer", e))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| embed_err("set truncation", e))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams::default()));

        info!(dim, model = %model_path.display(), "loaded embedding model");
        Ok(Self {
            session,
            tokenizer,
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// One unit-length vector per input text.
    pub fn embed_batch(&mut self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AiError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let batch_size = texts.len();
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| embed_err("tokenize", e))?;
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = vec![0i64; batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        let mut token_type_ids = vec![0i64; batch_size * seq_len];
        for (i, encoding) in encodings.iter().enumerate() {
            let row = i * seq_len;
            for (j, &id) in encoding.get_ids().iter().enumerate() {
                input_ids[row + j] = id as i64;
            }
            for (j, &mask) in encoding.get_attention_mask().iter().enumerate() {
                attention_mask[row + j] = mask as i64;
            }
            for (j, &tid) in encoding.get_type_ids().iter().enumerate() {
                token_type_ids[row + j] = tid as i64;
            }
        }

        let shape = [batch_size as i64, seq_len as i64];
        let tensor = |data: Vec<i64>| {
            Tensor::from_array((shape, data.into_boxed_slice())).map_err(|e| embed_err("tensor", e))
        };
        let inputs = ort::inputs![
            "input_ids" => tensor(input_ids)?,
            "attention_mask" => tensor(attention_mask.clone())?,
            "token_type_ids" => tensor(token_type_ids)?,
        ];
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| embed_err("inference", e))?;

        let (output_shape, hidden) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| embed_err("extract output", e))?;
        let dims: &[i64] = output_shape;
        if dims.len() != 3 || dims[0] as usize != batch_size || dims[2] as usize != self.dim {
            return Err(AiError::Embedding(format!(
                "unexpected output shape {dims:?}, expected [{batch_size}, {seq_len}, {}]",
                self.dim
            )));
        }

        Ok(mean_pool(
            hidden,
            &attention_mask,
            batch_size,
            dims[1] as usize,
            seq_len,
            self.dim,
        ))
    }
}

/// Attention-masked mean over token states, then L2 normalisation.
///
/// `hidden` is `[batch, out_len, dim]`; `mask` is `[batch, mask_len]`.
fn mean_pool(
    hidden: &[f32],
    mask: &[i64],
    batch: usize,
    out_len: usize,
    mask_len: usize,
    dim: usize,
) -> Vec<Vec<f32>> {
    let mut embeddings = Vec::with_capacity(batch);
    for i in 0..batch {
        let mut pooled = vec![0.0f32; dim];
        let mut tokens = 0.0f32;
        for j in 0..out_len.min(mask_len) {
            let weight = mask[i * mask_len + j] as f32;
            if weight > 0.0 {
                let offset = (i * out_len + j) * dim;
                for (d, p) in pooled.iter_mut().enumerate() {
                    *p += hidden[offset + d] * weight;
                }
                tokens += weight;
            }
        }
        if tokens > 0.0 {
            for p in &mut pooled {
                *p /= tokens;
            }
        }
        formfill_store::normalize(&mut pooled);
        embeddings.push(pooled);
    }
    embeddings
}

fn infer_dim(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => shape
            .last()
            .and_then(|&d| if d > 0 { Some(d as usize) } else { None }),
        _ => None,
    }
}
