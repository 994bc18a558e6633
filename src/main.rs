//! Installs the ahead-of-time compiled formatter into the shared cache or
//! formats a document with it.
//!
//! Configuration comes from the command line, `NATIVE_FORMAT_*` environment
//! variables, and config files loaded by
//! [`OrthoConfig`](https://github.com/leynos/ortho-config). The binary exits
//! with status code `0` on success and `1` on error.

fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    native_format_cache::run().map_err(color_eyre::eyre::Report::new)?;
    Ok(())
}
