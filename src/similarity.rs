use ahash::AHashSet;

/// Weight of the character-level metric in the blended score.
pub const LEXICAL_WEIGHT: f64 = 0.4;
/// Weight of the token-overlap metric in the blended score.
pub const TOKEN_WEIGHT: f64 = 0.6;

/// Classic dynamic-programming Levenshtein distance over characters.
/// Substitution, insertion and deletion each cost 1.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        matrix[0][j] = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a.len()][b.len()]
}

/// Edit distance normalized into a similarity score in [0, 1].
/// Two empty strings are identical, similarity 1.0.
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / max_len as f64
}

/// Lowercase alphanumeric runs; punctuation is a separator, never a token.
pub fn token_set(text: &str) -> AHashSet<String> {
    let mut tokens = AHashSet::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            tokens.insert(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.insert(current);
    }
    tokens
}

/// Token-set Jaccard similarity in [0, 1]; 1.0 when both sets are empty.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a = token_set(a);
    let set_b = token_set(b);

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;
    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

/// Fixed blend of the two metrics: 0.4 lexical + 0.6 jaccard.
/// The weighting is a compatibility constant; historical reports were
/// produced with exactly these values.
pub fn overall_similarity(a: &str, b: &str) -> f64 {
    LEXICAL_WEIGHT * lexical_similarity(a, b) + TOKEN_WEIGHT * jaccard_similarity(a, b)
}
