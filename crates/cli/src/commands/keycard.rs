//! Keycard provisioning commands

use gpcard_transport_pcsc::PcscTransport;

use crate::{
    commands::PackageArgs,
    config::Config,
    utils::{self, check_ok},
};

/// Load the Keycard package
pub fn load_keycard_command(
    transport: PcscTransport,
    config: &Config,
    files: &PackageArgs,
    force: bool,
) -> eyre::Result<()> {
    let source = utils::read_package(files, config.effective_block_size())?;
    let mut gp = utils::connect(transport, config)?;

    gp.load_keycard_package(source, utils::print_progress, config.force_reload(force))?;

    println!("Keycard package loaded");
    Ok(())
}

/// Install the Keycard instance and the optional NDEF and Cash instances
pub fn install_keycard_command(
    transport: PcscTransport,
    config: &Config,
    ndef: Option<&str>,
    cash: Option<&str>,
) -> eyre::Result<()> {
    let ndef = ndef.map(utils::parse_hex).transpose()?;
    let cash = cash.map(utils::parse_hex).transpose()?;

    let mut gp = utils::connect(transport, config)?;

    check_ok(gp.install_keycard_instance()?, "Keycard instance install")?;
    println!("Keycard instance installed");

    if let Some(record) = ndef {
        check_ok(gp.install_ndef_instance(&record)?, "NDEF instance install")?;
        println!("NDEF instance installed");
    }

    if let Some(data) = cash {
        check_ok(gp.install_cash_instance(&data)?, "Cash instance install")?;
        println!("Cash instance installed");
    }

    Ok(())
}
