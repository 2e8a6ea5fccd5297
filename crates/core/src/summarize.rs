//! Extractive TextRank summarizer.
//!
//! Sentences are ranked by PageRank over a word-overlap similarity graph and
//! the best ones are kept, in their original order, up to a word limit.

use std::collections::HashSet;

use crate::services::{SummarizeError, Summarizer};

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, Default)]
pub struct TextRankSummarizer;

impl TextRankSummarizer {
    pub fn new() -> Self {
        Self
    }
}

impl Summarizer for TextRankSummarizer {
    fn summarize(&self, text: &str, word_count: usize) -> Result<String, SummarizeError> {
        if word_count == 0 {
            return Err(SummarizeError::Service("word count must be greater than zero".to_string()));
        }

        let sentences = split_sentences(text);
        if sentences.len() < 2 {
            return Err(SummarizeError::TooShort(format!(
                "input must have more than one sentence (found {})",
                sentences.len()
            )));
        }

        let tokens: Vec<Vec<String>> =
            sentences.iter().map(|sentence| tokenize(&strip_tags(sentence))).collect();
        let scores = rank(&similarity_matrix(&tokens));

        let mut order: Vec<usize> = (0..sentences.len()).collect();
        order.sort_by(|left, right| {
            scores[*right].partial_cmp(&scores[*left]).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut selected = Vec::new();
        let mut total_words = 0;
        for index in order {
            let words = strip_tags(&sentences[index]).split_whitespace().count();
            if selected.is_empty() || total_words + words <= word_count {
                selected.push(index);
                total_words += words;
            }
        }
        selected.sort_unstable();

        Ok(selected.into_iter().map(|index| sentences[index].as_str()).collect::<Vec<_>>().join("\n"))
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\n' || ch == '\r' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }

        current.push(ch);
        let terminal = matches!(ch, '.' | '!' | '?');
        let boundary = chars.peek().map_or(true, |next| next.is_whitespace());
        if terminal && boundary {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() && trimmed.chars().any(char::is_alphanumeric) {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

fn strip_tags(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                output.push(' ');
            }
            _ if !in_tag => output.push(ch),
            _ => {}
        }
    }
    output
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

fn similarity(left: &[String], right: &[String]) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let right_words: HashSet<&str> = right.iter().map(String::as_str).collect();
    let left_words: HashSet<&str> = left.iter().map(String::as_str).collect();
    let common = left_words.intersection(&right_words).count();
    if common == 0 {
        return 0.0;
    }

    let denominator = (left.len() as f64).ln() + (right.len() as f64).ln();
    if denominator <= 0.0 {
        return 0.0;
    }
    common as f64 / denominator
}

fn similarity_matrix(tokens: &[Vec<String>]) -> Vec<Vec<f64>> {
    let size = tokens.len();
    let mut matrix = vec![vec![0.0; size]; size];
    for row in 0..size {
        for column in (row + 1)..size {
            let weight = similarity(&tokens[row], &tokens[column]);
            matrix[row][column] = weight;
            matrix[column][row] = weight;
        }
    }
    matrix
}

fn rank(weights: &[Vec<f64>]) -> Vec<f64> {
    let size = weights.len();
    let base = (1.0 - DAMPING) / size as f64;
    let out_weight: Vec<f64> = weights.iter().map(|row| row.iter().sum()).collect();
    let mut scores = vec![1.0 / size as f64; size];

    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![base; size];
        for (target, score) in next.iter_mut().enumerate() {
            for source in 0..size {
                if out_weight[source] > 0.0 {
                    *score += DAMPING * weights[source][target] / out_weight[source] * scores[source];
                }
            }
        }

        let delta: f64 = next.iter().zip(&scores).map(|(new, old)| (new - old).abs()).sum();
        scores = next;
        if delta < TOLERANCE {
            break;
        }
    }

    scores
}
