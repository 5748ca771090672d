// Embeddings module
// Ollama-backed embedding generation for corpus rows and queries

pub mod ollama;

pub use ollama::OllamaClient;

/// Estimate the token count of a text for prompt budgeting.
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
