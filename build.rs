// build.rs

fn main() -> anyhow::Result<()> {
    build_data::set_SOURCE_TIMESTAMP().map_err(anyhow::Error::msg)?;
    build_data::set_RUSTC_VERSION().map_err(anyhow::Error::msg)?;
    build_data::no_debug_rebuilds().map_err(anyhow::Error::msg)?;

    // host builds (tests) do not have an ESP-IDF environment to export
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
    Ok(())
}

// EOF
