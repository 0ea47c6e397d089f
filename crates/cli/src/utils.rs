//! Helpers shared by the CLI commands

use std::fs;

use eyre::WrapErr;
use gpcard_apdu_core::{Response, response::status::common as status};
use gpcard_globalplatform::{Aid, ChunkedPackage, GlobalPlatform, operations};
use gpcard_transport_pcsc::PcscTransport;
use tracing::info;

use crate::{commands::PackageArgs, config::Config};

/// Select the ISD and open the secure channel configured in `config`
pub fn connect(
    transport: PcscTransport,
    config: &Config,
) -> eyre::Result<GlobalPlatform<PcscTransport>> {
    let candidates = config.key_candidates()?;
    let gp = operations::connect_and_setup(transport, &candidates, config.security_level.into())
        .wrap_err("failed to open secure channel")?;

    if let Some(session) = gp.channel().session() {
        info!(keys = session.key_name(), key_version = session.key_version(), "Authenticated");
    }
    Ok(gp)
}

/// Parse a hex AID argument
pub fn parse_aid(hex: &str) -> eyre::Result<Aid> {
    Aid::from_hex(hex).wrap_err_with(|| format!("invalid AID `{hex}`"))
}

/// Parse a hex data argument
pub fn parse_hex(data: &str) -> eyre::Result<Vec<u8>> {
    hex::decode(data).wrap_err_with(|| format!("invalid hex `{data}`"))
}

/// Fail unless the card answered 9000
pub fn check_ok(response: Response, what: &str) -> eyre::Result<Response> {
    response
        .check(status::OK_ONLY)
        .map_err(|sw| eyre::eyre!("{what} failed: {sw}"))
}

/// Read the package files into a block source
pub fn read_package(args: &PackageArgs, block_size: usize) -> eyre::Result<ChunkedPackage> {
    let contents = args
        .files
        .iter()
        .map(|path| fs::read(path).wrap_err_with(|| format!("reading {}", path.display())))
        .collect::<eyre::Result<Vec<_>>>()?;

    let package = if args.raw {
        let [data] = contents.as_slice() else {
            eyre::bail!("--raw takes exactly one file");
        };
        ChunkedPackage::new(data.clone(), block_size)?
    } else {
        ChunkedPackage::from_load_file(&contents, block_size)?
    };

    Ok(package)
}

/// Progress callback printing `sent/total`
pub fn print_progress(sent: usize, total: usize) {
    println!("Loaded block {sent}/{total}");
}
