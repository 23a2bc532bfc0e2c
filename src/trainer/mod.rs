//! Builds a trained model directory from a plaintext password corpus and an
//! external wordlist.
//!
//! Passwords inside the configured length window feed the structure counts
//! and the "long" run tables; passwords outside it feed the "short" run
//! tables. Each digit or special entry is interpolated between the two
//! tables with a weight derived from the in-window corpus size, then the
//! tables are written per run length in descending probability order, the
//! format the guesser loads.

use anyhow::{Context, Result};
use log::{info, warn};
use log_domain::LogDomain;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::grammar::from_str::byte_lines;
use crate::grammar::Category;

pub struct TrainConfig {
    pub training_set: PathBuf,
    pub model_dir: PathBuf,
    pub dictionary: PathBuf,
    pub min_len: usize,
    pub max_len: usize,
    pub start_from: usize,
    pub rm_existed: bool,
}

#[derive(Default)]
struct Counts {
    structures: BTreeMap<String, u64>,
    digit_long: BTreeMap<Vec<u8>, u64>,
    digit_short: BTreeMap<Vec<u8>, u64>,
    letter_long: BTreeMap<Vec<u8>, u64>,
    letter_short: BTreeMap<Vec<u8>, u64>,
    special_long: BTreeMap<Vec<u8>, u64>,
    special_short: BTreeMap<Vec<u8>, u64>,
    in_window: u64,
}

pub fn train(config: &TrainConfig) -> Result<()> {
    let model = config.model_dir.as_path();
    fs::create_dir_all(model.join("model"))
        .with_context(|| format!("could not create the model directory {}", model.display()))?;
    if config.rm_existed {
        info!("removing previously trained tables");
        for table in &["digits", "special", "grammar"] {
            let dir = model.join("model").join(table);
            if let Err(e) = fs::remove_dir_all(&dir) {
                if e.kind() != ErrorKind::NotFound {
                    warn!("could not remove {}: {}", dir.display(), e);
                }
            }
        }
    }

    let data = fs::read(&config.training_set).with_context(|| {
        format!(
            "could not open the training set {}",
            config.training_set.display()
        )
    })?;
    let mut counts = Counts::default();
    for line in byte_lines(&data) {
        if line.is_empty() {
            continue;
        }
        tally(line, config, &mut counts);
    }

    let weight = interpolation_weight(counts.in_window);
    info!(
        "{} passwords in the training window, interpolation weight {}",
        counts.in_window, weight
    );
    write_structures(&counts.structures, model)?;
    write_probability_table(
        &counts.digit_long,
        &counts.digit_short,
        weight,
        &model.join("model").join("digits"),
    )?;
    write_probability_table(
        &counts.special_long,
        &counts.special_short,
        weight,
        &model.join("model").join("special"),
    )?;
    write_dictionary(&counts, &config.dictionary, model)?;
    Ok(())
}

fn tally(line: &[u8], config: &TrainConfig, counts: &mut Counts) {
    let size = line.len();
    if config.min_len <= size && size <= config.max_len {
        counts.in_window += 1;
        let structure = structure_of(line);
        if !structure.is_empty() {
            *counts.structures.entry(structure).or_insert(0) += 1;
        }
        tally_runs(
            line,
            1,
            &mut counts.digit_long,
            &mut counts.letter_long,
            &mut counts.special_long,
        );
    } else if size >= config.start_from && size < config.min_len {
        // below the window but long enough to transfer: only runs spanning
        // the whole password are counted
        tally_runs(
            line,
            size,
            &mut counts.digit_short,
            &mut counts.letter_short,
            &mut counts.special_short,
        );
    } else if size < config.start_from {
        tally_runs(
            line,
            1,
            &mut counts.digit_short,
            &mut counts.letter_short,
            &mut counts.special_short,
        );
    }
}

/// Structure template of a password, e.g. `LLLDDS` for `abc12!`. The walk
/// stops at the first high-bit byte.
fn structure_of(line: &[u8]) -> String {
    let mut structure = String::with_capacity(line.len());
    for &byte in line {
        if byte > 127 {
            break;
        }
        structure.push(Category::of(byte).symbol());
    }
    structure
}

/// Splits a password into maximal same-category runs and counts every run of
/// at least `threshold` bytes into the map of its category.
fn tally_runs(
    line: &[u8],
    threshold: usize,
    digits: &mut BTreeMap<Vec<u8>, u64>,
    letters: &mut BTreeMap<Vec<u8>, u64>,
    specials: &mut BTreeMap<Vec<u8>, u64>,
) {
    let mut start = 0;
    while start < line.len() {
        let category = Category::of(line[start]);
        let mut end = start + 1;
        while end < line.len() && Category::of(line[end]) == category {
            end += 1;
        }
        if end - start >= threshold {
            let map = match category {
                Category::Digit => &mut *digits,
                Category::Letter => &mut *letters,
                Category::Special => &mut *specials,
            };
            *map.entry(line[start..end].to_vec()).or_insert(0) += 1;
        }
        start = end;
    }
}

/// Weight of the in-window table when interpolating entry probabilities:
/// the logistic σ(2·log₁₀ N − 10) quantized to one decimal, where `N` is the
/// in-window corpus size.
fn interpolation_weight(in_window: u64) -> f64 {
    let sigma = 1.0 / (1.0 + (10.0 - 2.0 * (in_window as f64).log10()).exp());
    (10.0 * (sigma + 0.05)) as i64 as f64 / 10.0
}

fn write_structures(structures: &BTreeMap<String, u64>, model: &Path) -> Result<()> {
    let dir = model.join("model").join("grammar");
    fs::create_dir_all(&dir)?;
    let total: u64 = structures.values().sum();
    let mut ordered: Vec<(&String, u64)> = structures.iter().map(|(s, &c)| (s, c)).collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1));
    let mut out = BufWriter::new(File::create(dir.join("structures.txt"))?);
    for (structure, count) in ordered {
        writeln!(out, "{}\t{:.30}", structure, count as f64 / total as f64)?;
    }
    out.flush()?;
    Ok(())
}

/// Interpolates the long and short maps and writes one `<length>.txt` per
/// byte length, entries in descending probability order.
fn write_probability_table(
    long: &BTreeMap<Vec<u8>, u64>,
    short: &BTreeMap<Vec<u8>, u64>,
    weight: f64,
    dir: &Path,
) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut totals_long: HashMap<usize, u64> = HashMap::new();
    for (word, count) in long {
        *totals_long.entry(word.len()).or_insert(0) += count;
    }
    let mut totals_short: HashMap<usize, u64> = HashMap::new();
    for (word, count) in short {
        *totals_short.entry(word.len()).or_insert(0) += count;
    }

    let long_weight = LogDomain::new(weight).unwrap();
    let short_weight = LogDomain::new(1.0 - weight).unwrap();
    let mut entries: Vec<(&[u8], LogDomain<f64>)> = Vec::new();
    for (word, &count) in long {
        let p_long =
            LogDomain::new(count as f64 / totals_long[&word.len()] as f64).unwrap();
        let probability = match short.get(word) {
            Some(&short_count) => {
                let p_short = LogDomain::new(
                    short_count as f64 / totals_short[&word.len()] as f64,
                )
                .unwrap();
                long_weight * p_long + short_weight * p_short
            }
            None => long_weight * p_long,
        };
        entries.push((word, probability));
    }
    for (word, &count) in short {
        if !long.contains_key(word) {
            let p_short =
                LogDomain::new(count as f64 / totals_short[&word.len()] as f64).unwrap();
            entries.push((word, short_weight * p_short));
        }
    }
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let mut buckets: BTreeMap<usize, Vec<(&[u8], LogDomain<f64>)>> = BTreeMap::new();
    for (word, probability) in entries {
        buckets
            .entry(word.len())
            .or_insert_with(Vec::new)
            .push((word, probability));
    }
    for (length, bucket) in buckets {
        let mut out = BufWriter::new(File::create(dir.join(format!("{}.txt", length)))?);
        for (word, probability) in bucket {
            out.write_all(word)?;
            writeln!(out, "\t{:.30}", probability.value())?;
        }
        out.flush()?;
    }
    Ok(())
}

/// Writes the letter dictionary: corpus letters first, then every wordlist
/// entry that the corpus did not already produce. Letters carry no
/// probability on disk; the guesser derives uniform ones at load time.
fn write_dictionary(counts: &Counts, wordlist: &Path, model: &Path) -> Result<()> {
    let mut merged: BTreeSet<&[u8]> =
        counts.letter_long.keys().map(|word| word.as_slice()).collect();
    for word in counts.letter_short.keys() {
        merged.insert(word);
    }
    let path = model.join("dictionary.txt");
    let mut out = BufWriter::new(File::create(&path)?);
    for word in &merged {
        out.write_all(word)?;
        out.write_all(b"\n")?;
    }
    match fs::read(wordlist) {
        Ok(data) => {
            for line in byte_lines(&data) {
                if !line.is_empty() && !merged.contains(line) {
                    out.write_all(line)?;
                    out.write_all(b"\n")?;
                }
            }
        }
        Err(e) => warn!(
            "could not open the wordlist {}: {}; continuing without it",
            wordlist.display(),
            e
        ),
    }
    out.flush()?;
    Ok(())
}
