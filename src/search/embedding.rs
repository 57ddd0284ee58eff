//! Embedding providers
//!
//! The default provider is Harmonic Token Projection (HTP), a deterministic,
//! training-free embedding:
//! "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//!  Deterministic, and Reversible Embedding Methodology"
//! https://arxiv.org/html/2511.20665
//!
//! Any model can stand in for it by implementing [`EmbeddingProvider`].

use std::f64::consts::PI;
use std::fmt;
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::error::{Result, SearchError};

/// Embedding dimension (2 * number of coprime moduli)
pub const EMBEDDING_DIM: usize = 384;

/// Version tag stamped on vectors produced by [`HtpEmbedder`]
pub const HTP_MODEL_VERSION: &str = "htp-384-v1";

/// Number of coprime moduli for harmonic projection
const NUM_MODULI: usize = EMBEDDING_DIM / 2;

/// Maximum token length (Unicode code points)
const MAX_TOKEN_LENGTH: usize = 64;

/// First NUM_MODULI primes, coprime by construction
static COPRIME_MODULI: &[u64] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71,
    73, 79, 83, 89, 97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151,
    157, 163, 167, 173, 179, 181, 191, 193, 197, 199, 211, 223, 227, 229, 233,
    239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293, 307, 311, 313, 317,
    331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503,
    509, 521, 523, 541, 547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607,
    613, 617, 619, 631, 641, 643, 647, 653, 659, 661, 673, 677, 683, 691, 701,
    709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787, 797, 809, 811,
    821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911,
    919, 929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997, 1009, 1013,
    1019, 1021, 1031, 1033, 1039, 1049, 1051, 1061, 1063, 1069, 1087, 1091,
    1093, 1097, 1103, 1109, 1117, 1123, 1129, 1151, 1153, 1163, 1171, 1181,
];

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(r"[\p{L}\p{N}]+").unwrap();
}

/// Identifies the model that produced a vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelVersion(String);

impl ModelVersion {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text → fixed-dimension vector.
///
/// Implementations must be deterministic for a given (text, version) and
/// must either return exactly `dimension()` components or fail with
/// `ProviderUnavailable`.
pub trait EmbeddingProvider: Send + Sync {
    fn model_version(&self) -> &ModelVersion;

    fn dimension(&self) -> usize;

    /// Embed already-normalized text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Build the provider input for a listing: `title + " " + description`,
/// trimmed and lower-cased. Blank content is `InvalidInput`.
pub fn listing_text(title: &str, description: &str) -> Result<String> {
    normalize_text(&format!("{} {}", title.trim(), description.trim()))
}

pub fn normalize_text(text: &str) -> Result<String> {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(SearchError::InvalidInput(
            "cannot embed empty text".to_string(),
        ));
    }
    Ok(normalized)
}

/// Lower-cased word tokens (letters and digits).
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// HTP Embedding Model
pub struct HtpEmbedder {
    moduli: Vec<u64>,
    version: ModelVersion,
}

impl HtpEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: COPRIME_MODULI[..NUM_MODULI].to_vec(),
            version: ModelVersion::new(HTP_MODEL_VERSION),
        }
    }

    /// Embed a single token using Harmonic Token Projection
    ///
    /// Steps:
    /// 1. Encode the token's code points as a base-2^16 integer N
    /// 2. For each modulus m_i, compute r_i = N mod m_i
    /// 3. Project to unit circle: E_i = [sin(2πr_i/m_i), cos(2πr_i/m_i)]
    fn embed_token(&self, token: &str) -> Vec<f64> {
        let n = token_to_integer(token);

        let mut embedding = Vec::with_capacity(EMBEDDING_DIM);
        for &m in &self.moduli {
            let r = n % m;
            let theta = 2.0 * PI * (r as f64) / (m as f64);
            embedding.push(theta.sin());
            embedding.push(theta.cos());
        }
        embedding
    }
}

impl Default for HtpEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HtpEmbedder {
    fn model_version(&self) -> &ModelVersion {
        &self.version
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    /// Mean-pool token projections, then L2 normalize.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Err(SearchError::InvalidInput(
                "text has no embeddable tokens".to_string(),
            ));
        }

        let mut sum_embedding = vec![0.0f64; EMBEDDING_DIM];
        for token in &tokens {
            for (i, val) in self.embed_token(token).iter().enumerate() {
                sum_embedding[i] += val;
            }
        }
        let count = tokens.len() as f64;
        for val in &mut sum_embedding {
            *val /= count;
        }

        let norm: f64 = sum_embedding.iter().map(|x| x * x).sum::<f64>().sqrt();
        let embedding = if norm > 0.0 {
            sum_embedding.iter().map(|x| (*x / norm) as f32).collect()
        } else {
            sum_embedding.iter().map(|x| *x as f32).collect()
        };

        Ok(embedding)
    }
}

/// N = Σ u_j * B^(L-j) where B = 2^16, wrapping on overflow
fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_LENGTH)
        .fold(0u64, |n, c| n.wrapping_mul(65536).wrapping_add(c as u64))
}

/// Provider that is always down. Backs the `--fallback` flag.
pub struct OfflineProvider {
    version: ModelVersion,
    dimension: usize,
}

impl OfflineProvider {
    pub fn new(version: ModelVersion, dimension: usize) -> Self {
        Self { version, dimension }
    }
}

impl EmbeddingProvider for OfflineProvider {
    fn model_version(&self) -> &ModelVersion {
        &self.version
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(SearchError::ProviderUnavailable(
            "embedding model is offline".to_string(),
        ))
    }
}

/// Treats an `embed` call that overruns `timeout` as unavailable, and
/// rejects vectors of the wrong length.
pub struct DeadlineProvider<P> {
    inner: P,
    timeout: Duration,
}

impl<P: EmbeddingProvider> DeadlineProvider<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<P: EmbeddingProvider> EmbeddingProvider for DeadlineProvider<P> {
    fn model_version(&self) -> &ModelVersion {
        self.inner.model_version()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let vector = self.inner.embed(text)?;
        let elapsed = start.elapsed();

        if elapsed > self.timeout {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_ms = self.timeout.as_millis() as u64,
                "embedding call exceeded deadline"
            );
            return Err(SearchError::ProviderUnavailable(format!(
                "embedding took {}ms (limit {}ms)",
                elapsed.as_millis(),
                self.timeout.as_millis()
            )));
        }
        if vector.len() != self.inner.dimension() {
            return Err(SearchError::ProviderUnavailable(format!(
                "provider returned {} components, expected {}",
                vector.len(),
                self.inner.dimension()
            )));
        }
        Ok(vector)
    }
}

/// Cosine similarity between two embeddings, 0 for zero-norm or
/// mismatched vectors, clamped to [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
