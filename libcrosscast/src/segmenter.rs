//! Content segmentation for thread-style publishing.
//!
//! Splits long content into platform-legal fragments: sentences are packed
//! greedily, a trailing hashtag block is relocated to the final fragment, and
//! every fragment of a multi-part result is numbered with a " (i/N)" suffix.
//! Content that already fits is returned verbatim as a single fragment.

use thiserror::Error;

/// Hard cap on fragments per publish. Over-cap content is rejected, never
/// silently truncated.
pub const MAX_FRAGMENTS: usize = 25;

/// Characters reserved during packing for the numbering suffix, e.g. " (10/25)".
const SUFFIX_RESERVE: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("Content requires {required} fragments; the maximum is {max}")]
    TooManyFragments { required: usize, max: usize },

    #[error("Character limit {limit} is too small to segment content")]
    LimitTooSmall { limit: usize },
}

/// Split `content` into fragments of at most `limit` characters.
///
/// Counts are in Unicode scalar values, not bytes.
pub fn segment(content: &str, limit: usize) -> Result<Vec<String>, SegmentError> {
    if char_len(content) <= limit {
        return Ok(vec![content.to_string()]);
    }

    let budget = limit.saturating_sub(SUFFIX_RESERVE);
    if budget == 0 {
        return Err(SegmentError::LimitTooSmall { limit });
    }

    let (body, hashtags) = split_trailing_hashtags(content);

    let mut fragments: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(&body) {
        let joined = char_len(&current) + if current.is_empty() { 0 } else { 1 } + char_len(&sentence);
        if joined <= budget {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&sentence);
        } else {
            if !current.is_empty() {
                fragments.push(std::mem::take(&mut current));
            }
            if char_len(&sentence) <= budget {
                current = sentence;
            } else {
                pack_words(&sentence, budget, &mut fragments, &mut current);
            }
        }
    }
    if !current.is_empty() {
        fragments.push(current);
    }

    // Relocated hashtags ride on the final fragment when they fit, otherwise
    // they become their own fragment(s).
    if let Some(tags) = hashtags {
        let appended = fragments.last().map(|last| format!("{}\n\n{}", last, tags));
        match appended {
            Some(candidate) if char_len(&candidate) <= budget => {
                *fragments.last_mut().unwrap() = candidate;
            }
            _ => {
                if char_len(&tags) <= budget {
                    fragments.push(tags);
                } else {
                    let mut tail = String::new();
                    pack_words(&tags, budget, &mut fragments, &mut tail);
                    if !tail.is_empty() {
                        fragments.push(tail);
                    }
                }
            }
        }
    }

    let total = fragments.len();
    if total > MAX_FRAGMENTS {
        return Err(SegmentError::TooManyFragments {
            required: total,
            max: MAX_FRAGMENTS,
        });
    }

    if total > 1 {
        fragments = fragments
            .into_iter()
            .enumerate()
            .map(|(i, frag)| number_fragment(&frag, i + 1, total, limit))
            .collect();
    }

    Ok(fragments)
}

/// Append the " (i/N)" suffix, ellipsis-trimming the body if the numbered
/// fragment would exceed the limit. N is fixed before this runs, so trimming
/// never changes the fragment count.
fn number_fragment(body: &str, index: usize, total: usize, limit: usize) -> String {
    let suffix = format!(" ({}/{})", index, total);
    let numbered = format!("{}{}", body, suffix);
    if char_len(&numbered) <= limit {
        return numbered;
    }

    let keep = limit.saturating_sub(char_len(&suffix) + 1);
    let trimmed: String = body.chars().take(keep).collect();
    format!("{}…{}", trimmed.trim_end(), suffix)
}

/// Detach a run of hashtags at the very end of the content. Hashtags embedded
/// in the prose stay where they are.
fn split_trailing_hashtags(content: &str) -> (String, Option<String>) {
    let mut body = content.trim_end();
    let mut tags_rev: Vec<&str> = Vec::new();

    loop {
        match body.rfind(char::is_whitespace) {
            Some(idx) => {
                let token = body[idx..].trim_start();
                if is_hashtag(token) {
                    tags_rev.push(token);
                    body = body[..idx].trim_end();
                } else {
                    break;
                }
            }
            None => {
                if is_hashtag(body) {
                    tags_rev.push(body);
                    body = "";
                }
                break;
            }
        }
    }

    if tags_rev.is_empty() {
        (content.to_string(), None)
    } else {
        tags_rev.reverse();
        (body.to_string(), Some(tags_rev.join(" ")))
    }
}

fn is_hashtag(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('#')
        && !token[1..].is_empty()
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Split on sentence-ending punctuation followed by whitespace, keeping the
/// punctuation with its sentence.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            let sentence = current.trim().to_string();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            current.clear();
        }
    }

    let sentence = current.trim().to_string();
    if !sentence.is_empty() {
        sentences.push(sentence);
    }
    sentences
}

/// Word-level packing for a sentence that alone exceeds the budget. Words
/// longer than the budget are hard-split so every fragment stays legal.
fn pack_words(sentence: &str, budget: usize, fragments: &mut Vec<String>, current: &mut String) {
    for word in sentence.split_whitespace() {
        if char_len(word) > budget {
            if !current.is_empty() {
                fragments.push(std::mem::take(current));
            }
            let chunks: Vec<String> = word
                .chars()
                .collect::<Vec<_>>()
                .chunks(budget)
                .map(|c| c.iter().collect())
                .collect();
            let n = chunks.len();
            for (i, chunk) in chunks.into_iter().enumerate() {
                if i + 1 == n {
                    *current = chunk;
                } else {
                    fragments.push(chunk);
                }
            }
            continue;
        }

        let joined = char_len(current) + if current.is_empty() { 0 } else { 1 } + char_len(word);
        if joined <= budget {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            if !current.is_empty() {
                fragments.push(std::mem::take(current));
            }
            *current = word.to_string();
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
