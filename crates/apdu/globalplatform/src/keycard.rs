//! Keycard package management
//!
//! Well-known Keycard identifiers and the card manager operations that
//! provision or remove the Keycard package and its applet instances.

use gpcard_apdu_core::{CardTransport, Response};
use tracing::info;

use crate::{
    Result,
    aid::Aid,
    application::{ForceReloadPolicy, GlobalPlatform, LoadPlan},
    load::BlockSource,
};

/// Keycard load file (package)
pub const PACKAGE_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x08, 0x04, 0x00, 0x01];
/// Keycard wallet applet
pub const KEYCARD_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x08, 0x04, 0x00, 0x01, 0x01];
/// NDEF applet
pub const NDEF_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x08, 0x04, 0x00, 0x01, 0x02];
/// NDEF applet instance
pub const NDEF_INSTANCE_AID: &[u8] = &[0xD2, 0x76, 0x00, 0x00, 0x85, 0x01, 0x01];
/// Keycard Cash applet
pub const CASH_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x08, 0x04, 0x00, 0x01, 0x03];
/// Keycard Cash applet instance
pub const CASH_INSTANCE_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x08, 0x04, 0x00, 0x01, 0x03, 0x01];

/// Instance index used when none is given
pub const DEFAULT_INSTANCE_INDEX: u8 = 1;

const fn aid(bytes: &'static [u8]) -> Aid {
    Aid::from_static(bytes)
}

/// Keycard instance AID: the applet AID followed by the instance index
pub fn keycard_instance_aid(index: u8) -> Aid {
    let mut bytes = KEYCARD_AID.to_vec();
    bytes.push(index);
    Aid::from_bytes_unchecked(bytes.into())
}

/// Keycard load plan: a forced reload removes NDEF, Keycard and Cash
/// instances, then the package
pub fn keycard_load_plan() -> LoadPlan {
    LoadPlan::new(aid(PACKAGE_AID)).with_reload_targets([
        aid(NDEF_INSTANCE_AID),
        keycard_instance_aid(DEFAULT_INSTANCE_INDEX),
        aid(CASH_INSTANCE_AID),
    ])
}

impl<T: CardTransport> GlobalPlatform<T> {
    /// Delete the default Keycard instance
    pub fn delete_keycard_instance(&mut self) -> Result<Response> {
        self.delete(&keycard_instance_aid(DEFAULT_INSTANCE_INDEX))
    }

    /// Delete the Cash instance
    pub fn delete_cash_instance(&mut self) -> Result<Response> {
        self.delete(&aid(CASH_INSTANCE_AID))
    }

    /// Delete the NDEF instance
    pub fn delete_ndef_instance(&mut self) -> Result<Response> {
        self.delete(&aid(NDEF_INSTANCE_AID))
    }

    /// Delete the Keycard package
    pub fn delete_keycard_package(&mut self) -> Result<Response> {
        self.delete(&aid(PACKAGE_AID))
    }

    /// Delete every Keycard instance and then the package
    ///
    /// Each delete must answer 9000 or 6A88; anything else aborts.
    pub fn delete_keycard_instances_and_package(&mut self) -> Result<()> {
        for aid in keycard_load_plan().delete_order() {
            self.delete_if_present(aid)?;
        }
        Ok(())
    }

    /// Install the default Keycard instance
    pub fn install_keycard_instance(&mut self) -> Result<Response> {
        self.install_for_install(
            &aid(PACKAGE_AID),
            &aid(KEYCARD_AID),
            &keycard_instance_aid(DEFAULT_INSTANCE_INDEX),
            &[],
        )
    }

    /// Install the Cash instance with its initial data
    pub fn install_cash_instance(&mut self, cash_data: &[u8]) -> Result<Response> {
        self.install_for_install(
            &aid(PACKAGE_AID),
            &aid(CASH_AID),
            &aid(CASH_INSTANCE_AID),
            cash_data,
        )
    }

    /// Install the NDEF instance with its initial record
    pub fn install_ndef_instance(&mut self, ndef_record: &[u8]) -> Result<Response> {
        self.install_for_install(
            &aid(PACKAGE_AID),
            &aid(NDEF_AID),
            &aid(NDEF_INSTANCE_AID),
            ndef_record,
        )
    }

    /// INSTALL [for load] of the Keycard package
    pub fn install_keycard_package(&mut self) -> Result<Response> {
        self.install_for_load(&aid(PACKAGE_AID), None)
    }

    /// Load the Keycard package
    pub fn load_keycard_package<S, F>(
        &mut self,
        source: S,
        progress: F,
        force_reload: Option<ForceReloadPolicy>,
    ) -> Result<()>
    where
        S: BlockSource,
        F: FnMut(usize, usize),
    {
        info!(force_reload = force_reload.is_some(), "Loading Keycard package");
        self.load_package(&keycard_load_plan(), source, progress, force_reload)
    }
}
