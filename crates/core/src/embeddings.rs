pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 256;

/// Embedding collaborator: one text in, one fixed-length vector out.
pub trait Embedder {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Deterministic local embedder hashing character trigrams into a
/// fixed-size bag, L2-normalized so dot product equals cosine similarity.
/// Lets the full stack run and be tested without a model server; swap in a
/// real `Embedder` for production retrieval quality.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        if chars.len() < 3 {
            let bucket = (fnv1a(&chars) % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        } else {
            for window in chars.windows(3) {
                let bucket = (fnv1a(window) % vector.len() as u64) as usize;
                vector[bucket] += 1.0;
            }
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    let mut buffer = [0u8; 4];
    for ch in chars {
        for byte in ch.encode_utf8(&mut buffer).bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    hash
}

fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector {
            *value /= magnitude;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CharacterNgramEmbedder, Embedder};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("bdapps competition deadline extended");
        let second = embedder.embed("bdapps competition deadline extended");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_configured_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 64 };
        assert_eq!(embedder.embed("abc").len(), 64);
        assert_eq!(embedder.dimensions(), 64);
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = CharacterNgramEmbedder::default();
        let vector = embedder.embed("joined bdapps seminar today");
        let magnitude: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = CharacterNgramEmbedder::default();
        let vector = embedder.embed("");
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn short_text_still_contributes() {
        let embedder = CharacterNgramEmbedder::default();
        let vector = embedder.embed("ab");
        assert!(vector.iter().any(|value| *value > 0.0));
    }
}
