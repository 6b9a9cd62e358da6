//! Benchmark corpora and query sets

use crate::utils::terms;
use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Documents fed to every driver, in order
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub name: String,
    pub docs: Vec<String>,
}

#[derive(Deserialize)]
struct JsonDoc {
    text: String,
}

impl Corpus {
    /// Load from a `.jsonl` file, a plain text file or a directory
    pub fn load(path: &Path, limit: Option<usize>) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut docs = if path.is_dir() {
            load_dir(path)?
        } else if path.extension().is_some_and(|ext| ext == "jsonl" || ext == "ndjson") {
            load_jsonl(path)?
        } else if path.is_file() {
            load_lines(path)?
        } else {
            bail!("corpus path {} does not exist", path.display());
        };

        if let Some(limit) = limit {
            docs.truncate(limit);
        }
        if docs.is_empty() {
            bail!("corpus {} contains no documents", path.display());
        }
        Ok(Self { name, docs })
    }

    /// Deterministic corpus with a skewed word distribution
    pub fn synthetic(doc_count: usize, words_per_doc: usize, seed: u64) -> Self {
        let vocab = synthetic_vocabulary(2_000);
        let mut rng = SplitMix64(seed);

        let docs = (0..doc_count)
            .map(|_| {
                let len = (words_per_doc / 2 + (rng.next() as usize % words_per_doc.max(1))).max(1);
                let mut doc = String::with_capacity(len * 7);
                for i in 0..len {
                    if i > 0 {
                        doc.push(' ');
                    }
                    // Squaring a uniform draw favors low ranks
                    let u = (rng.next() >> 11) as f64 / (1u64 << 53) as f64;
                    let rank = ((u * u) * vocab.len() as f64) as usize;
                    doc.push_str(&vocab[rank.min(vocab.len() - 1)]);
                }
                doc
            })
            .collect();

        Self {
            name: format!("synthetic-{}", doc_count),
            docs,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.docs.iter().map(String::len).sum()
    }

    /// Build `count` queries from the corpus vocabulary: frequent single
    /// terms, rarer single terms and two-term combinations.
    pub fn derive_queries(&self, count: usize) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }

        let freqs = self
            .docs
            .par_iter()
            .fold(AHashMap::<String, u32>::new, |mut acc, doc| {
                for term in terms(doc) {
                    *acc.entry(term).or_insert(0) += 1;
                }
                acc
            })
            .reduce(AHashMap::new, |mut a, b| {
                for (term, n) in b {
                    *a.entry(term).or_insert(0) += n;
                }
                a
            });

        let mut vocab: Vec<(String, u32)> = freqs.into_iter().collect();
        vocab.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if vocab.is_empty() {
            return Vec::new();
        }

        let n = vocab.len();
        let mut queries = Vec::with_capacity(count);
        for i in 0..count {
            let query = match i % 3 {
                0 => vocab[(i / 3) % n].0.clone(),
                1 => vocab[(n / 2 + i) % n].0.clone(),
                _ => format!("{} {}", vocab[i % n].0, vocab[(i * 7 + 1) % n].0),
            };
            queries.push(query);
        }
        queries
    }
}

/// Read a query file, one query per non-empty line
pub fn load_queries(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read query file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

fn load_jsonl(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut docs = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: JsonDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: expected {{\"text\": ...}}", path.display(), n + 1))?;
        docs.push(doc.text);
    }
    Ok(docs)
}

fn load_lines(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut docs = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if !line.trim().is_empty() {
            docs.push(line);
        }
    }
    Ok(docs)
}

fn load_dir(root: &Path) -> Result<Vec<String>> {
    let mut paths: Vec<_> = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();

    // Binary and unreadable files are skipped
    Ok(paths
        .par_iter()
        .filter_map(|path| fs::read(path).ok())
        .filter_map(|bytes| String::from_utf8(bytes).ok())
        .filter(|text| !text.trim().is_empty())
        .collect())
}

fn synthetic_vocabulary(size: usize) -> Vec<String> {
    const SYLLABLES: [&str; 16] = [
        "ka", "lo", "mi", "ren", "sa", "tu", "vo", "zel", "ba", "dor", "fi", "gu", "ha", "jin",
        "ne", "po",
    ];
    (0..size)
        .map(|i| {
            let mut word = String::new();
            let mut n = i;
            loop {
                word.push_str(SYLLABLES[n % SYLLABLES.len()]);
                n /= SYLLABLES.len();
                if n == 0 {
                    break;
                }
            }
            word
        })
        .collect()
}

/// Small deterministic generator for synthetic corpora
struct SplitMix64(u64);

impl SplitMix64 {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}
