//! GlobalPlatform card manager
//!
//! [`GlobalPlatform`] is the session object: it owns the [`SecureChannel`]
//! and exposes the card lifecycle commands on top of it.

use derive_more::Display;
use gpcard_apdu_core::{CardTransport, Response, StatusWord, response::status::common as status};
use tracing::{debug, info, instrument, warn};

use crate::{
    Error, Result,
    aid::Aid,
    commands::{
        DeleteCommand, InstallForInstallCommand, InstallForLoadCommand, LoadCommand, SelectCommand,
    },
    constants::DEFAULT_BLOCK_SIZE,
    load::BlockSource,
    secure_channel::{SecureChannel, SecurityLevel},
    session::KeyCandidates,
};

/// What to do when a delete fails during a forced reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
pub enum ForceReloadPolicy {
    /// Stop at the first delete that is neither 9000 nor 6A88
    #[default]
    #[display("abort")]
    Abort,
    /// Log rejected deletes and carry on with the load
    #[display("best-effort")]
    BestEffort,
}

/// Package to load and the objects that a forced reload removes first
#[derive(Debug, Clone)]
pub struct LoadPlan {
    load_file: Aid,
    security_domain: Option<Aid>,
    reload_targets: Vec<Aid>,
}

impl LoadPlan {
    /// Load `load_file` into the default security domain
    pub const fn new(load_file: Aid) -> Self {
        Self {
            load_file,
            security_domain: None,
            reload_targets: Vec::new(),
        }
    }

    /// Associate the load file with a specific security domain
    pub fn with_security_domain(mut self, security_domain: Aid) -> Self {
        self.security_domain = Some(security_domain);
        self
    }

    /// Instances to delete, in order, before the load file itself on a forced reload
    pub fn with_reload_targets(mut self, targets: impl IntoIterator<Item = Aid>) -> Self {
        self.reload_targets = targets.into_iter().collect();
        self
    }

    /// Load file AID
    pub const fn load_file(&self) -> &Aid {
        &self.load_file
    }

    /// Objects removed by a forced reload: the instances, then the load file
    pub fn delete_order(&self) -> impl Iterator<Item = &Aid> {
        self.reload_targets.iter().chain(std::iter::once(&self.load_file))
    }
}

/// GlobalPlatform card manager session
#[derive(Debug)]
pub struct GlobalPlatform<T: CardTransport> {
    channel: SecureChannel<T>,
}

impl<T: CardTransport> GlobalPlatform<T> {
    /// Create a card manager session over a transport
    pub const fn new(transport: T) -> Self {
        Self {
            channel: SecureChannel::new(transport),
        }
    }

    /// Select the Issuer Security Domain
    pub fn select(&mut self) -> Result<Response> {
        self.channel.transmit_plain(&SelectCommand::security_domain().to_command())
    }

    /// Select an application by AID
    pub fn select_aid(&mut self, aid: &Aid) -> Result<Response> {
        self.channel.transmit_plain(&SelectCommand::with_aid(aid.clone()).to_command())
    }

    /// Open an SCP02 channel with the default key candidates, MAC only
    pub fn open_secure_channel(&mut self) -> Result<()> {
        self.open_secure_channel_with(&KeyCandidates::default(), SecurityLevel::Mac)
    }

    /// Open an SCP02 channel with the given key candidates and security level
    pub fn open_secure_channel_with(
        &mut self,
        candidates: &KeyCandidates,
        level: SecurityLevel,
    ) -> Result<()> {
        self.channel.open(candidates, level)
    }

    /// DELETE an object; the status word is returned unchecked
    pub fn delete(&mut self, aid: &Aid) -> Result<Response> {
        debug!(%aid, "DELETE");
        let command = DeleteCommand::with_aid(aid.clone()).to_command()?;
        self.channel.transmit(&command)
    }

    /// DELETE an object, treating "referenced data not found" as success
    pub fn delete_if_present(&mut self, aid: &Aid) -> Result<Response> {
        let response = self.delete(aid)?;
        if response.status().is_referenced_data_not_found() {
            debug!(%aid, "Nothing to delete");
        }
        checked(response, status::OK_OR_NOT_FOUND)
    }

    /// INSTALL [for install] an applet instance; the status word is returned unchecked
    pub fn install_for_install(
        &mut self,
        package: &Aid,
        applet: &Aid,
        instance: &Aid,
        params: &[u8],
    ) -> Result<Response> {
        debug!(%package, %applet, %instance, "INSTALL [for install]");
        let command =
            InstallForInstallCommand::new(package.clone(), applet.clone(), instance.clone())
                .with_params(params)
                .to_command()?;
        self.channel.transmit(&command)
    }

    /// INSTALL [for load]; the status word is returned unchecked
    pub fn install_for_load(
        &mut self,
        load_file: &Aid,
        security_domain: Option<&Aid>,
    ) -> Result<Response> {
        debug!(%load_file, "INSTALL [for load]");
        let mut command = InstallForLoadCommand::new(load_file.clone());
        if let Some(sd) = security_domain {
            command = command.with_security_domain(sd.clone());
        }
        self.channel.transmit(&command.to_command())
    }

    /// LOAD one block; the status word is returned unchecked
    pub fn load(&mut self, data: &[u8], sequence: u8, has_more: bool) -> Result<Response> {
        let command = LoadCommand::new(sequence, has_more, data.to_vec()).to_command();
        self.channel.transmit(&command)
    }

    /// Load a complete package
    ///
    /// With `force_reload` set, the plan's instances and then the load file
    /// are deleted first. INSTALL [for load] must succeed, then each block is
    /// sent in order and `progress(sent, total)` is called after every
    /// accepted block. The first rejected LOAD stops the transfer; blocks
    /// already accepted stay on the card.
    ///
    /// A source whose blocks cannot be wrapped at the channel's security
    /// level is refused with [`Error::BlockTooLarge`] before anything is sent.
    #[instrument(level = "debug", skip_all, fields(load_file = %plan.load_file()))]
    pub fn load_package<S, F>(
        &mut self,
        plan: &LoadPlan,
        mut source: S,
        mut progress: F,
        force_reload: Option<ForceReloadPolicy>,
    ) -> Result<()>
    where
        S: BlockSource,
        F: FnMut(usize, usize),
    {
        let max = self
            .channel
            .security_level()
            .map_or(DEFAULT_BLOCK_SIZE, SecurityLevel::max_block_size);
        if let Some(size) = source.max_block_len().filter(|&size| size > max) {
            return Err(Error::BlockTooLarge { size, max });
        }

        if let Some(policy) = force_reload {
            self.delete_for_reload(plan, policy)?;
        }

        let response = self.install_for_load(plan.load_file(), plan.security_domain.as_ref())?;
        checked(response, status::OK_ONLY)?;

        let total = source.estimated_blocks();
        info!(blocks = total, "Loading package");

        let mut sent = 0;
        while let Some(block) = source.next_block()? {
            let sequence =
                u8::try_from(block.sequence).map_err(|_| Error::SequenceExhausted(block.sequence))?;
            if block.payload.len() > max {
                return Err(Error::BlockTooLarge { size: block.payload.len(), max });
            }

            let response = self.load(&block.payload, sequence, !block.is_final)?;
            if !response.is_success() {
                warn!(block = block.sequence, status = %response.status(), "LOAD rejected");
                return Err(Error::CommandRejected(response.status()));
            }

            sent += 1;
            progress(sent, total);
        }

        info!(blocks = sent, "Package loaded");
        Ok(())
    }

    fn delete_for_reload(&mut self, plan: &LoadPlan, policy: ForceReloadPolicy) -> Result<()> {
        debug!(%policy, "Force reload: deleting existing objects");
        for aid in plan.delete_order() {
            match self.delete_if_present(aid) {
                Ok(_) => {}
                Err(Error::CommandRejected(sw)) if policy == ForceReloadPolicy::BestEffort => {
                    warn!(%aid, status = %sw, "Delete rejected, continuing");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Close the secure channel, keeping the transport
    pub fn close(&mut self) {
        self.channel.close();
    }

    /// Reset the transport and forget any session
    pub fn reset(&mut self) -> Result<()> {
        self.channel.reset()
    }

    /// Underlying secure channel
    pub const fn channel(&self) -> &SecureChannel<T> {
        &self.channel
    }

    /// Mutable access to the underlying secure channel
    pub const fn channel_mut(&mut self) -> &mut SecureChannel<T> {
        &mut self.channel
    }

    /// Give back the transport
    pub fn into_transport(self) -> T {
        self.channel.into_transport()
    }
}

fn checked(response: Response, allowed: &[StatusWord]) -> Result<Response> {
    response.check(allowed).map_err(|sw| {
        warn!(status = %sw, "Unexpected status word");
        Error::CommandRejected(sw)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::ChunkedPackage;
    use gpcard_apdu_core::MockTransport;

    fn aid(hex: &str) -> Aid {
        Aid::from_hex(hex).unwrap()
    }

    #[test]
    fn test_select_is_plain() {
        let mut gp = GlobalPlatform::new(MockTransport::with_success());
        assert!(gp.select().unwrap().is_success());

        let sent = &gp.channel().transport().commands;
        assert_eq!(sent[0].as_ref(), [0x00, 0xA4, 0x04, 0x00, 0x08, 0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_lifecycle_commands_require_channel() {
        let mut gp = GlobalPlatform::new(MockTransport::with_success());
        let package = aid("A0000008040001");

        assert!(matches!(gp.delete(&package), Err(Error::NoSecureChannel)));
        assert!(matches!(gp.install_for_load(&package, None), Err(Error::NoSecureChannel)));
        assert!(matches!(gp.load(&[0xC4], 0, false), Err(Error::NoSecureChannel)));

        let source = ChunkedPackage::with_default_block_size(vec![0u8; 10]);
        assert!(matches!(
            gp.load_package(&LoadPlan::new(package), source, |_, _| {}, None),
            Err(Error::NoSecureChannel)
        ));
        assert!(gp.channel().transport().commands.is_empty());
    }

    #[test]
    fn test_load_plan_delete_order() {
        let plan = LoadPlan::new(aid("A0000008040001"))
            .with_reload_targets([aid("A000000804000102"), aid("A00000080400010101")]);

        let order: Vec<_> = plan.delete_order().map(ToString::to_string).collect();
        assert_eq!(order, ["A000000804000102", "A00000080400010101", "A0000008040001"]);
    }
}
