use clap::{App, Arg};
use log::{error, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process;
use std::str::FromStr;

use pcfg::grammar::derivation::Limits;
use pcfg::grammar::Grammar;

static TRAINED_MODEL: &str = "trained-model";
static GUESSES_FILE: &str = "guesses-file";
static GUESS_NUMBER: &str = "guess-number";
static GUESS_MIN_LEN: &str = "guess-min-len";
static GUESS_MAX_LEN: &str = "guess-max-len";

fn main() {
    env_logger::init();

    let matches = App::new("pcfg-guess")
        .about("Generates password guesses from a trained model, most probable first")
        .arg(
            Arg::with_name(TRAINED_MODEL)
                .long(TRAINED_MODEL)
                .value_name("DIR")
                .help("Root of the trained model directory")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name(GUESSES_FILE)
                .long(GUESSES_FILE)
                .value_name("FILE")
                .help("Generated guesses are placed here")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name(GUESS_NUMBER)
                .long(GUESS_NUMBER)
                .value_name("N")
                .help("Number of guesses to generate")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name(GUESS_MIN_LEN)
                .long(GUESS_MIN_LEN)
                .value_name("LEN")
                .help("Guesses with fewer bytes than this are discarded")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            Arg::with_name(GUESS_MAX_LEN)
                .long(GUESS_MAX_LEN)
                .value_name("LEN")
                .help("Guesses with more bytes than this are discarded")
                .takes_value(true)
                .default_value("0"),
        )
        .get_matches_safe()
        .unwrap_or_else(|e| {
            eprintln!("{}", e.message);
            process::exit(1);
        });

    let limits = Limits {
        min_len: parse_or_exit(matches.value_of(GUESS_MIN_LEN).unwrap(), GUESS_MIN_LEN),
        max_len: parse_or_exit(matches.value_of(GUESS_MAX_LEN).unwrap(), GUESS_MAX_LEN),
        guess_number: parse_or_exit(matches.value_of(GUESS_NUMBER).unwrap(), GUESS_NUMBER),
    };
    if limits.min_len > limits.max_len {
        error!("min length cannot be larger than max length");
        process::exit(1);
    }

    let model_dir = Path::new(matches.value_of(TRAINED_MODEL).unwrap());
    let grammar = Grammar::from_dir(model_dir).unwrap_or_else(|e| {
        error!("{:#}", e);
        process::exit(1);
    });

    let guesses_file = matches.value_of(GUESSES_FILE).unwrap();
    let sink = match File::create(guesses_file) {
        Ok(file) => BufWriter::new(file),
        Err(e) => {
            error!("could not create {}: {}", guesses_file, e);
            process::exit(1);
        }
    };
    match grammar.generate(sink, &limits) {
        Ok(count) => info!("wrote {} guesses to {}", count, guesses_file),
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}

fn parse_or_exit<T: FromStr>(value: &str, option: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("invalid value for --{}: {}", option, value);
        process::exit(1);
    })
}
