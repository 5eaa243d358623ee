fn main() -> anyhow::Result<()> {
    gestured::logging::init();
    gestured::cli::run()
}
