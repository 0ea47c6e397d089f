//! Generic card manager commands

use gpcard_globalplatform::{GlobalPlatform, LoadPlan};
use gpcard_transport_pcsc::PcscTransport;
use tracing::info;

use crate::{
    commands::PackageArgs,
    config::Config,
    utils::{self, check_ok, parse_aid},
};

/// SELECT an application and print its response
pub fn select_command(transport: PcscTransport, aid: Option<&str>) -> eyre::Result<()> {
    let mut gp = GlobalPlatform::new(transport);

    let response = match aid {
        Some(aid) => gp.select_aid(&parse_aid(aid)?)?,
        None => gp.select()?,
    };

    println!("Status: {}", response.status());
    println!("Data: {}", hex::encode_upper(response.payload()));
    Ok(())
}

/// Open a secure channel and report the key set that matched
pub fn open_command(transport: PcscTransport, config: &Config) -> eyre::Result<()> {
    let gp = utils::connect(transport, config)?;

    if let Some(session) = gp.channel().session() {
        println!("Secure channel established");
        println!("  Key set: {}", session.key_name());
        println!("  Key version: {:#04x}", session.key_version());
        println!("  Sequence counter: {}", hex::encode(session.sequence_counter()));
    }
    Ok(())
}

/// DELETE an object
pub fn delete_command(
    transport: PcscTransport,
    config: &Config,
    aid: &str,
    if_present: bool,
) -> eyre::Result<()> {
    let aid = parse_aid(aid)?;
    let mut gp = utils::connect(transport, config)?;

    if if_present {
        gp.delete_if_present(&aid)?;
    } else {
        check_ok(gp.delete(&aid)?, "DELETE")?;
    }

    println!("Deleted {aid}");
    Ok(())
}

/// INSTALL [for install] an applet instance
pub fn install_command(
    transport: PcscTransport,
    config: &Config,
    package: &str,
    applet: &str,
    instance: Option<&str>,
    params: &str,
) -> eyre::Result<()> {
    let package = parse_aid(package)?;
    let applet = parse_aid(applet)?;
    let instance = match instance {
        Some(instance) => parse_aid(instance)?,
        None => applet.clone(),
    };
    let params = utils::parse_hex(params)?;

    let mut gp = utils::connect(transport, config)?;
    check_ok(
        gp.install_for_install(&package, &applet, &instance, &params)?,
        "INSTALL [for install]",
    )?;

    println!("Installed {instance}");
    Ok(())
}

/// Load a package
pub fn load_command(
    transport: PcscTransport,
    config: &Config,
    package: &str,
    files: &PackageArgs,
    security_domain: Option<&str>,
    reload_targets: &[String],
    force: bool,
) -> eyre::Result<()> {
    let mut plan = LoadPlan::new(parse_aid(package)?).with_reload_targets(
        reload_targets
            .iter()
            .map(|aid| parse_aid(aid))
            .collect::<eyre::Result<Vec<_>>>()?,
    );
    if let Some(sd) = security_domain {
        plan = plan.with_security_domain(parse_aid(sd)?);
    }

    let source = utils::read_package(files, config.effective_block_size())?;
    let mut gp = utils::connect(transport, config)?;

    info!(load_file = %plan.load_file(), "Loading package");
    gp.load_package(&plan, source, utils::print_progress, config.force_reload(force))?;

    println!("Package {} loaded", plan.load_file());
    Ok(())
}
