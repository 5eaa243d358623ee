//! Logger setup for the binary. `RUST_LOG` overrides the default level.

pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
