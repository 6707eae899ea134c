//! Splits source text into model-sized chunks. A chunk budget is expressed
//! in tokens; we approximate a token as two characters, matching the ratio
//! `original_source/core/triage/ai_vibe_check.py`'s `_chunk_source` uses to
//! size its slices.

/// Split `source` into at most `max_chunks` pieces, each at most
/// `max_chunk_tokens * 2` characters. Lines longer than the budget are
/// hard-sliced rather than dropped, since a single minified line is often
/// exactly the thing worth showing the model.
pub fn chunk_source(source: &str, max_chunk_tokens: usize, max_chunks: usize) -> Vec<String> {
    let max_chars = (max_chunk_tokens * 2).max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in source.lines() {
        if line.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            for piece in hard_slice(line, max_chars) {
                chunks.push(piece);
            }
            continue;
        }

        if !current.is_empty() && current.len() + line.len() + 1 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.truncate(max_chunks);
    chunks
}

/// Cuts `line` into `max_chars`-sized pieces on char boundaries.
fn hard_slice(line: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_short_lines_into_one_chunk() {
        let source = "const a = 1;\nconst b = 2;\n";
        let chunks = chunk_source(source, 1000, 5);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("const a"));
        assert!(chunks[0].contains("const b"));
    }

    #[test]
    fn flushes_when_budget_exceeded() {
        let line = "x".repeat(50);
        let source = format!("{line}\n{line}\n{line}\n");
        let chunks = chunk_source(&source, 30, 10);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn hard_slices_a_single_oversized_line() {
        let line = "y".repeat(500);
        let chunks = chunk_source(&line, 30, 10);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 60);
        }
    }

    #[test]
    fn truncates_to_max_chunks() {
        let mut source = String::new();
        for i in 0..20 {
            source.push_str(&format!("line {i} {}\n", "z".repeat(40)));
        }
        let chunks = chunk_source(&source, 10, 3);
        assert_eq!(chunks.len(), 3);
    }
}
