//! Utterance normalization and token matching.

/// Lowercase, fold Portuguese/Spanish diacritics to ASCII and turn punctuation
/// into single spaces. Apostrophes are dropped so `Kai'Sa` matches `kaisa`;
/// `/` is kept for K/D/A.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c == '\'' || c == '\u{2019}' {
            continue;
        }
        let c = fold_char(c);
        if c.is_ascii_alphanumeric() || c == '/' {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Split a normalized string into tokens
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Start positions of every occurrence of `phrase` in `tokens`
pub fn phrase_positions<S: AsRef<str>>(tokens: &[&str], phrase: &[S]) -> Vec<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return Vec::new();
    }
    (0..=tokens.len() - phrase.len())
        .filter(|&i| {
            phrase
                .iter()
                .enumerate()
                .all(|(j, p)| tokens[i + j] == p.as_ref())
        })
        .collect()
}

/// Whether a (possibly multi-word) keyword occurs on token boundaries
pub fn contains_phrase(tokens: &[&str], keyword: &str) -> bool {
    let phrase: Vec<&str> = keyword.split(' ').collect();
    !phrase_positions(tokens, &phrase).is_empty()
}

/// Whether any of the keywords occurs
pub fn contains_any(tokens: &[&str], keywords: &[&str]) -> bool {
    keywords.iter().any(|k| contains_phrase(tokens, k))
}
