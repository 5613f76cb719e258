//! Name canonicalisation and fuzzy lookup shared by player and team resolution.

/// Lowercases, keeps ASCII alphanumerics and collapses every other run into `_`.
/// Accented letters are folded to their base letter first so "Dončić" and "Doncic"
/// land on the same key.
pub fn normalize_name(input: &str) -> String {
    let lower = input.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut prev_us = false;
    for ch in lower.chars() {
        let mapped = if ch.is_ascii_alphanumeric() {
            Some(ch)
        } else if ch == '&' {
            Some('a')
        } else {
            fold_accent(ch)
        };

        if let Some(c) = mapped {
            out.push(c);
            prev_us = false;
        } else if ch == '\'' || ch == '.' {
            // "D'Angelo", "P.J." keep their letters together
        } else if !prev_us && !out.is_empty() {
            out.push('_');
            prev_us = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn fold_accent(ch: char) -> Option<char> {
    let base = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
        'ğ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => 'i',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ŕ' | 'ř' => 'r',
        'ś' | 'ş' | 'š' | 'ș' => 's',
        'ţ' | 'ť' | 'ț' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        _ => return None,
    };
    Some(base)
}

/// Ratcliff/Obershelp ratio: `2 * matched / (len(a) + len(b))`, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, k) = longest_common_block(a, b);
    if k == 0 {
        return 0;
    }
    k + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + k..], &b[j + k..])
}

fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        for j in 0..b.len() {
            cur[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            let k = cur[j + 1];
            if k > best.2 {
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NameMatch<'a> {
    pub candidate: &'a str,
    pub score: f64,
}

/// Highest-scoring candidate at or above `floor`, compared on normalised forms.
/// Earlier candidates win ties.
pub fn best_match<'a, I>(query: &str, candidates: I, floor: f64) -> Option<NameMatch<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let query_norm = normalize_name(query);
    if query_norm.is_empty() {
        return None;
    }
    let mut best: Option<NameMatch<'a>> = None;
    for candidate in candidates {
        let score = similarity(&query_norm, &normalize_name(candidate));
        if score < floor {
            continue;
        }
        if best.is_none_or(|b| score > b.score) {
            best = Some(NameMatch { candidate, score });
        }
    }
    best
}
