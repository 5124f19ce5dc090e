use log::LevelFilter;

pub fn init(verbose: bool) {
    // RUST_LOG still wins when set.
    let default = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(default)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}
