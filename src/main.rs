use std::path;
use std::process;

use clap::ValueEnum;
use env_logger;
use log;

use ext_line_sort::sort::DEFAULT_DELIMITER;
use ext_line_sort::ExternalSorterBuilder;

fn main() {
    let arg_parser = build_arg_parser().get_matches();

    if arg_parser.is_present("usage") {
        let _ = build_arg_parser().print_help();
        println!();
        process::exit(2);
    }

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let source = path::Path::new(arg_parser.value_of("source").expect("value is required"));
    let destination = path::Path::new(arg_parser.value_of("destination").expect("value is required"));
    let delimiter = arg_parser.value_of("field_separator").expect("value has default");
    let columns = parse_key(arg_parser.value_of("key").expect("value has default")).expect("value is pre-validated");
    let sort_size: usize = arg_parser.value_of_t_or_exit("sort_size");
    let merge_size: usize = arg_parser.value_of_t_or_exit("merge_size");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");

    let mut sorter_builder = ExternalSorterBuilder::new()
        .with_delimiter(delimiter)
        .with_key_columns(columns)
        .with_sort_size(sort_size)
        .with_merge_size(merge_size)
        .with_reverse(arg_parser.is_present("reverse"))
        .with_stable(arg_parser.is_present("stable"));

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    if let Err(err) = sorter.sort(source, destination) {
        log::error!("data sorting error: {}", err);
        process::exit(1);
    }
}

#[derive(Copy, Clone, clap::ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ValueEnum>::from_str(s, false)
    }
}

/// Parses a `<a>[,<b>]` key specification of 1-based columns into zero-based column indices.
fn parse_key(value: &str) -> Result<Vec<usize>, String> {
    let mut bounds = value.splitn(2, ',');
    let first = parse_column(bounds.next().unwrap_or_default())?;
    let last = match bounds.next() {
        Some(bound) => parse_column(bound)?,
        None => first,
    };

    if last < first {
        return Err(format!("key range {} is decreasing", value));
    }

    return Ok(Vec::from_iter(first - 1..last));
}

fn parse_column(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(column) if column >= 1 => Ok(column),
        _ => Err(format!("key column must be a positive integer, got {:?}", value)),
    }
}

fn parse_size(value: &str) -> Result<(), String> {
    match value.parse::<usize>() {
        Ok(size) if size >= 2 => Ok(()),
        _ => Err(format!("size must be an integer not less than 2, got {:?}", value)),
    }
}

fn build_arg_parser() -> clap::Command<'static> {
    clap::Command::new("ext-line-sort")
        .about("external sorter for delimited text files")
        .disable_help_flag(true)
        .arg(
            clap::Arg::new("source")
                .help("file to be sorted")
                .index(1)
                .required_unless_present("usage"),
        )
        .arg(
            clap::Arg::new("destination")
                .help("result file, must differ from the source")
                .index(2)
                .required_unless_present("usage"),
        )
        .arg(
            clap::Arg::new("field_separator")
                .short('t')
                .long("field-separator")
                .help("field delimiter used to extract key columns")
                .takes_value(true)
                .allow_hyphen_values(true)
                .default_value(DEFAULT_DELIMITER),
        )
        .arg(
            clap::Arg::new("key")
                .short('k')
                .long("key")
                .help("1-based key column or inclusive column range, e.g. 2 or 2,4")
                .takes_value(true)
                .default_value("1")
                .validator(|v| parse_key(v).map(|_| ())),
        )
        .arg(
            clap::Arg::new("sort_size")
                .long("sort-size")
                .help("maximum number of records sorted in memory at once")
                .takes_value(true)
                .default_value("10000")
                .validator(parse_size),
        )
        .arg(
            clap::Arg::new("merge_size")
                .long("merge-size")
                .help("maximum number of runs merged in a single pass")
                .takes_value(true)
                .default_value("32")
                .validator(parse_size),
        )
        .arg(
            clap::Arg::new("reverse")
                .short('r')
                .long("reverse")
                .help("reverse the result of key comparisons"),
        )
        .arg(
            clap::Arg::new("stable")
                .long("stable")
                .help("keep the input order of records with equal keys"),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary data")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("usage")
                .short('h')
                .long("help")
                .help("print help information"),
        )
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
