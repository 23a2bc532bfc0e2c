use clap::{App, Arg};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use pcfg::trainer::{train, TrainConfig};

static TRAINING_SET: &str = "training-set";
static TRAINED_MODEL: &str = "trained-model";
static DICTIONARIES: &str = "dictionaries";
static TRAIN_LENGTH_MIN: &str = "train-length-min";
static TRAIN_LENGTH_MAX: &str = "train-length-max";
static START_FROM: &str = "start-from";
static RM_EXISTED: &str = "rm-existed";

fn main() {
    env_logger::init();

    let matches = App::new("pcfg-train")
        .about("Trains a password model from a plaintext corpus and a wordlist")
        .arg(
            Arg::with_name(TRAINING_SET)
                .long(TRAINING_SET)
                .value_name("FILE")
                .help("Plaintext passwords, one per line")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name(TRAINED_MODEL)
                .long(TRAINED_MODEL)
                .value_name("DIR")
                .help("The trained model is placed here")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name(DICTIONARIES)
                .long(DICTIONARIES)
                .value_name("FILE")
                .help("External wordlist to enrich the letter grammar")
                .takes_value(true)
                .required(true),
        )
        .arg(
            Arg::with_name(TRAIN_LENGTH_MIN)
                .long(TRAIN_LENGTH_MIN)
                .value_name("LEN")
                .help("Passwords shorter than this train the short tables only")
                .takes_value(true)
                .default_value("1"),
        )
        .arg(
            Arg::with_name(TRAIN_LENGTH_MAX)
                .long(TRAIN_LENGTH_MAX)
                .value_name("LEN")
                .help("Passwords longer than this are ignored")
                .takes_value(true)
                .default_value("255"),
        )
        .arg(
            Arg::with_name(START_FROM)
                .long(START_FROM)
                .value_name("LEN")
                .help("Below-window passwords at least this long only count whole-password runs")
                .takes_value(true)
                .default_value("8"),
        )
        .arg(
            Arg::with_name(RM_EXISTED)
                .long(RM_EXISTED)
                .help("Remove previously trained tables under the model directory"),
        )
        .get_matches_safe()
        .unwrap_or_else(|e| {
            eprintln!("{}", e.message);
            process::exit(1);
        });

    let mut min_len: usize =
        parse_or_exit(matches.value_of(TRAIN_LENGTH_MIN).unwrap(), TRAIN_LENGTH_MIN);
    let max_len: usize =
        parse_or_exit(matches.value_of(TRAIN_LENGTH_MAX).unwrap(), TRAIN_LENGTH_MAX);
    if min_len > max_len {
        warn!(
            "min length {} larger than max length {}, using {}",
            min_len, max_len, max_len
        );
        min_len = max_len;
    }

    let config = TrainConfig {
        training_set: PathBuf::from(matches.value_of(TRAINING_SET).unwrap()),
        model_dir: PathBuf::from(matches.value_of(TRAINED_MODEL).unwrap()),
        dictionary: PathBuf::from(matches.value_of(DICTIONARIES).unwrap()),
        min_len,
        max_len,
        start_from: parse_or_exit(matches.value_of(START_FROM).unwrap(), START_FROM),
        rm_existed: matches.is_present(RM_EXISTED),
    };
    info!(
        "training window [{}, {}], combinations start from {}",
        config.min_len, config.max_len, config.start_from
    );
    if let Err(e) = train(&config) {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn parse_or_exit<T: FromStr>(value: &str, option: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("invalid value for --{}: {}", option, value);
        process::exit(1);
    })
}
