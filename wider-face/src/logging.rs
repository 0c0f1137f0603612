use log::LevelFilter;

/// Initializes the logger. `RUST_LOG` takes effect when set, otherwise
/// messages at the info level and above are shown.
pub fn init() {
    let mut builder = pretty_env_logger::formatted_builder();

    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) => {
            builder.filter_level(LevelFilter::Info);
        }
    }

    // ignore the error if a logger is already installed
    let _ = builder.try_init();
}
