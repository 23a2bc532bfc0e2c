use log_domain::LogDomain;
use nom::{alt_complete, do_parse, expr_res, is_not, map_res, rest, tag, IResult};
use std::str::{from_utf8, FromStr};

use crate::grammar::{Category, Structure, MAX_RUN_LEN};

/// Splits raw file contents into lines, tolerating carriage returns. Model
/// files are byte strings; special-character terminals are not required to be
/// valid UTF-8.
pub(crate) fn byte_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n').map(|line| match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    })
}

/// Parses a probability table line `<string>\t<probability>`.
/// The probability is a plain decimal fraction; the trainer renders it with
/// 30 fractional digits but any precision is accepted.
pub fn probability_line(line: &[u8]) -> Result<(Vec<u8>, LogDomain<f64>), String> {
    match parse_probability_line(line) {
        Ok((_, result)) => Ok(result),
        _ => Err(format!(
            "could not parse probability line: {}",
            String::from_utf8_lossy(line)
        )),
    }
}

fn parse_probability_line(input: &[u8]) -> IResult<&[u8], (Vec<u8>, LogDomain<f64>)> {
    do_parse!(
        input,
        word: is_not!("\t")
            >> tag!("\t")
            >> value: map_res!(
                map_res!(alt_complete!(is_not!("\t\r\n") | rest), from_utf8),
                |s: &str| s.parse::<f64>()
            )
            >> probability: expr_res!(LogDomain::new(value))
            >> ((word.to_vec(), probability))
    )
}

impl FromStr for Structure {
    type Err = String;

    /// Run-length encodes a template over the alphabet `{L, D, S}`:
    /// `LLLDD` becomes the segments `(L, 3), (D, 2)`. Any other symbol is an
    /// error, as is a run length outside `[1, MAX_RUN_LEN)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("empty template".to_string());
        }
        let mut segments: Vec<(Category, usize)> = Vec::new();
        for c in s.chars() {
            let category = Category::from_symbol(c)
                .ok_or_else(|| format!("invalid category symbol {:?} in {}", c, s))?;
            match segments.last_mut() {
                Some((last, length)) if *last == category => {
                    *length += 1;
                    if *length >= MAX_RUN_LEN {
                        return Err(format!("run too long in template {}", s));
                    }
                }
                _ => segments.push((category, 1)),
            }
        }
        Ok(Structure { segments })
    }
}
