//! The trained password grammar: per-(category, length) chains of terminal
//! groups, structural templates, and the probability-ordered guess
//! enumeration built on top of them.

pub mod container;
pub mod derivation;
pub(crate) mod from_str;

use anyhow::{bail, Context, Result};
use glob::glob;
use log::{debug, warn};
use log_domain::LogDomain;
use num_traits::Zero;
use std::fs;
use std::path::Path;

use self::container::{GroupId, NtStore};

/// Run lengths are valid in `[1, MAX_RUN_LEN)`; longer runs are never
/// realizable and templates containing them are dropped.
pub const MAX_RUN_LEN: usize = 20;

/// Terminal category of a password byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Letter,
    Digit,
    Special,
}

impl Category {
    /// Category of a raw password byte. Everything that is not an ASCII
    /// letter or digit counts as special, bytes of multi-byte sequences
    /// included.
    pub fn of(byte: u8) -> Category {
        match byte {
            b'0'..=b'9' => Category::Digit,
            b'a'..=b'z' | b'A'..=b'Z' => Category::Letter,
            _ => Category::Special,
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Category> {
        match symbol {
            'L' => Some(Category::Letter),
            'D' => Some(Category::Digit),
            'S' => Some(Category::Special),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Category::Letter => 'L',
            Category::Digit => 'D',
            Category::Special => 'S',
        }
    }
}

/// Run-length encoded form of a template line, e.g. `LLLDD` as
/// `(L, 3), (D, 2)`. Parsing lives in [`from_str`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Structure {
    pub segments: Vec<(Category, usize)>,
}

/// A structural template whose segments have been resolved against the
/// loaded chains. `heads` holds the head group of every segment's chain;
/// `probability` is the template's base probability from `structures.txt`.
pub struct Template {
    pub structure: String,
    pub probability: LogDomain<f64>,
    pub heads: Vec<GroupId>,
}

/// A loaded model: the terminal-group arena and the resolved templates.
pub struct Grammar {
    pub(crate) store: NtStore,
    pub(crate) templates: Vec<Template>,
}

impl Grammar {
    /// Loads a trained model directory:
    ///
    /// ```text
    /// dictionary.txt
    /// model/grammar/structures.txt
    /// model/digits/<n>.txt
    /// model/special/<n>.txt
    /// ```
    ///
    /// Malformed lines are skipped; templates that cannot be realized are
    /// dropped. A missing dictionary or grammar file, an empty digit or
    /// special table, or zero usable templates are fatal.
    pub fn from_dir(model_dir: &Path) -> Result<Grammar> {
        let mut store = NtStore::new();
        load_dictionary(&mut store, &model_dir.join("dictionary.txt"))?;
        let digits = load_probability_files(
            &mut store,
            Category::Digit,
            &model_dir.join("model").join("digits"),
        )?;
        if digits == 0 {
            bail!(
                "no digit probability files under {}",
                model_dir.display()
            );
        }
        let specials = load_probability_files(
            &mut store,
            Category::Special,
            &model_dir.join("model").join("special"),
        )?;
        if specials == 0 {
            bail!(
                "no special character probability files under {}",
                model_dir.display()
            );
        }
        let templates = load_structures(
            &store,
            &model_dir.join("model").join("grammar").join("structures.txt"),
        )?;
        if templates.is_empty() {
            bail!("no usable templates under {}", model_dir.display());
        }
        Ok(Grammar { store, templates })
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }
}

/// Counts a word's characters the way the trainer's corpora are counted:
/// a high-bit byte and the byte after it are taken as one character.
fn char_len(word: &[u8]) -> usize {
    let mut size = 0;
    let mut i = word.len() as isize - 1;
    while i >= 0 {
        if word[i as usize] > 127 {
            i -= 1;
        }
        i -= 1;
        size += 1;
    }
    size
}

/// Reads the letter dictionary. Words on disk carry no probability; every
/// word of one length gets the uniform probability `1 / n` where `n` counts
/// the dictionary lines of that length, duplicates included. Duplicates are
/// then merged, which leaves one group per length, sorted for stable
/// emission order.
fn load_dictionary(store: &mut NtStore, path: &Path) -> Result<()> {
    let data = fs::read(path)
        .with_context(|| format!("could not open the dictionary {}", path.display()))?;
    let mut counts = vec![0u64; MAX_RUN_LEN];
    let mut words: Vec<Vec<Vec<u8>>> = vec![Vec::new(); MAX_RUN_LEN];
    for line in from_str::byte_lines(&data) {
        let size = char_len(line);
        if size > 0 && size < MAX_RUN_LEN {
            counts[size] += 1;
            words[size].push(line.to_vec());
        }
    }
    for (length, mut bucket) in words.into_iter().enumerate() {
        if bucket.is_empty() {
            continue;
        }
        bucket.sort();
        bucket.dedup();
        let probability = LogDomain::new(1.0 / counts[length] as f64).unwrap();
        store.add_uniform_chain(Category::Letter, length, bucket, probability);
    }
    Ok(())
}

/// Loads every `<n>.txt` under `dir` into the chain for `(category, n)`.
/// Returns the number of files read; zero means the whole table is missing.
fn load_probability_files(
    store: &mut NtStore,
    category: Category,
    dir: &Path,
) -> Result<usize> {
    let pattern = dir.join("*.txt");
    let pattern = match pattern.to_str() {
        Some(p) => p.to_string(),
        None => bail!("model path is not valid unicode: {}", dir.display()),
    };
    let mut loaded = 0;
    for entry in glob(&pattern).context("bad probability file pattern")? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        let length = match path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<usize>().ok())
        {
            Some(n) if n > 0 && n < MAX_RUN_LEN => n,
            _ => {
                debug!("ignoring {}", path.display());
                continue;
            }
        };
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!("could not read {}: {}", path.display(), e);
                continue;
            }
        };
        let mut entries = Vec::new();
        for line in from_str::byte_lines(&data) {
            if line.is_empty() {
                continue;
            }
            match from_str::probability_line(line) {
                Ok((_, probability)) if probability.is_zero() => continue,
                Ok(entry) => entries.push(entry),
                Err(_) => continue,
            }
        }
        store.add_chain(category, length, entries);
        loaded += 1;
    }
    Ok(loaded)
}

/// Reads `structures.txt` and resolves each template against the chains.
/// The initial joint probability of a template is its base probability times
/// the probabilities of its segments' head groups; templates whose joint
/// probability is zero are rejected.
fn load_structures(store: &NtStore, path: &Path) -> Result<Vec<Template>> {
    let data = fs::read(path)
        .with_context(|| format!("could not open the grammar file {}", path.display()))?;
    let mut templates = Vec::new();
    for line in from_str::byte_lines(&data) {
        if line.is_empty() {
            continue;
        }
        let (word, probability) = match from_str::probability_line(line) {
            Ok(parsed) => parsed,
            Err(_) => continue,
        };
        let text = match String::from_utf8(word) {
            Ok(text) => text,
            Err(_) => continue,
        };
        let structure: Structure = match text.parse() {
            Ok(structure) => structure,
            Err(_) => continue,
        };
        if probability.is_zero() {
            warn!("discarding zero-probability template {}", text);
            continue;
        }
        let mut heads = Vec::with_capacity(structure.segments.len());
        let mut joint = probability;
        for &(category, length) in &structure.segments {
            match store.head(category, length) {
                Some(id) => {
                    joint *= store.group(id).probability;
                    heads.push(id);
                }
                None => break,
            }
        }
        if heads.len() != structure.segments.len() {
            warn!("discarding template {}: unrealizable segment", text);
            continue;
        }
        if joint.is_zero() {
            warn!("discarding template {}: zero joint probability", text);
            continue;
        }
        templates.push(Template {
            structure: text,
            probability,
            heads,
        });
    }
    Ok(templates)
}
