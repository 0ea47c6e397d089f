//! INSTALL command
//!
//! `[for load]` announces a load file before its LOAD blocks;
//! `[for install]` creates an application instance from an installed
//! load file.

use bytes::{BufMut, BytesMut};
use gpcard_apdu_core::{Command, CommandError};

use crate::{
    aid::Aid,
    constants::{cla, ins, install_p1, tags},
};

/// Largest install parameter field; its length plus the C9 header must fit one byte
const MAX_PARAMS_LEN: u8 = 253;

/// INSTALL [for install]
#[derive(Debug, Clone)]
pub struct InstallForInstallCommand {
    package: Aid,
    applet: Aid,
    instance: Aid,
    params: Vec<u8>,
}

impl InstallForInstallCommand {
    /// Instantiate `applet` from `package` as `instance`
    pub const fn new(package: Aid, applet: Aid, instance: Aid) -> Self {
        Self {
            package,
            applet,
            instance,
            params: Vec::new(),
        }
    }

    /// Application specific install parameters, wrapped in tag C9
    pub fn with_params(mut self, params: impl Into<Vec<u8>>) -> Self {
        self.params = params.into();
        self
    }

    /// Build the APDU
    ///
    /// Data: `len pkg | len applet | len instance | 01 00 |
    /// (len(params)+2) C9 len(params) params | 00`. The privileges field
    /// is a single zero byte and the install token is empty. Parameters
    /// longer than 253 bytes do not fit the length fields.
    pub fn to_command(&self) -> Result<Command, CommandError> {
        let params_len = u8::try_from(self.params.len())
            .ok()
            .filter(|len| *len <= MAX_PARAMS_LEN)
            .ok_or(CommandError::DataTooLong(self.params.len(), usize::from(MAX_PARAMS_LEN)))?;

        let mut data = BytesMut::with_capacity(
            self.package.len() + self.applet.len() + self.instance.len() + self.params.len() + 9,
        );

        for aid in [&self.package, &self.applet, &self.instance] {
            data.put_u8(aid.len_byte());
            data.put_slice(aid);
        }

        // privileges
        data.put_u8(0x01);
        data.put_u8(0x00);

        data.put_u8(params_len + 2);
        data.put_u8(tags::INSTALL_PARAMETERS);
        data.put_u8(params_len);
        data.put_slice(&self.params);

        // token
        data.put_u8(0x00);

        Ok(Command::new_with_data(
            cla::GP,
            ins::INSTALL,
            install_p1::FOR_INSTALL,
            0x00,
            data.freeze(),
        ))
    }
}

impl TryFrom<InstallForInstallCommand> for Command {
    type Error = CommandError;

    fn try_from(cmd: InstallForInstallCommand) -> Result<Self, Self::Error> {
        cmd.to_command()
    }
}

/// INSTALL [for load]
#[derive(Debug, Clone)]
pub struct InstallForLoadCommand {
    load_file: Aid,
    security_domain: Option<Aid>,
}

impl InstallForLoadCommand {
    /// Prepare loading `load_file`, associated with the default security domain
    pub const fn new(load_file: Aid) -> Self {
        Self {
            load_file,
            security_domain: None,
        }
    }

    /// Associate the load file with a specific security domain
    pub fn with_security_domain(mut self, security_domain: Aid) -> Self {
        self.security_domain = Some(security_domain);
        self
    }

    /// Build the APDU
    ///
    /// Data: `len lf | lf | len sd | sd | 00 00 00`, i.e. empty load file
    /// hash, parameters and token.
    pub fn to_command(&self) -> Command {
        let sd = self.security_domain.as_ref().map_or(&[][..], |aid| aid.as_bytes());

        let mut data = BytesMut::with_capacity(self.load_file.len() + sd.len() + 5);
        data.put_u8(self.load_file.len_byte());
        data.put_slice(&self.load_file);
        data.put_u8(sd.len() as u8);
        data.put_slice(sd);
        data.put_slice(&[0x00, 0x00, 0x00]);

        Command::new_with_data(cla::GP, ins::INSTALL, install_p1::FOR_LOAD, 0x00, data.freeze())
    }
}

impl From<InstallForLoadCommand> for Command {
    fn from(cmd: InstallForLoadCommand) -> Self {
        cmd.to_command()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn aid(bytes: &[u8]) -> Aid {
        Aid::new(bytes).unwrap()
    }

    #[test]
    fn test_install_for_install_without_params() {
        let cmd = InstallForInstallCommand::new(
            aid(&hex!("A0000008040001")),
            aid(&hex!("A000000804000101")),
            aid(&hex!("A00000080400010101")),
        )
        .to_command()
        .unwrap();

        assert_eq!(cmd.p1(), install_p1::FOR_INSTALL);
        assert_eq!(
            cmd.data().as_ref(),
            hex!(
                "07A0000008040001"
                "08A000000804000101"
                "09A00000080400010101"
                "0100"
                "02C900"
                "00"
            )
        );
    }

    #[test]
    fn test_install_for_install_with_params() {
        let cmd = InstallForInstallCommand::new(
            aid(&hex!("A0000008040001")),
            aid(&hex!("A000000804000102")),
            aid(&hex!("D2760000850101")),
        )
        .with_params(hex!("0102030405").to_vec())
        .to_command()
        .unwrap();

        assert!(cmd.data().ends_with(&hex!("0100" "07C9050102030405" "00")));
    }

    #[test]
    fn test_install_for_install_rejects_oversized_params() {
        let install = |len: usize| {
            InstallForInstallCommand::new(
                aid(&hex!("A0000008040001")),
                aid(&hex!("A000000804000101")),
                aid(&hex!("A000000804000101")),
            )
            .with_params(vec![0xAA; len])
            .to_command()
        };

        let cmd = install(253).unwrap();
        assert_eq!(cmd.data()[28..31], [0xFF, 0xC9, 0xFD]);

        assert!(matches!(install(254), Err(CommandError::DataTooLong(254, 253))));
        assert!(matches!(install(300), Err(CommandError::DataTooLong(300, 253))));
    }

    #[test]
    fn test_install_for_load() {
        let cmd = InstallForLoadCommand::new(aid(&hex!("A0000008040001"))).to_command();

        assert_eq!(
            cmd.to_bytes().as_ref(),
            hex!("80E602000C07A000000804000100000000")
        );
    }

    #[test]
    fn test_install_for_load_with_security_domain() {
        let cmd = InstallForLoadCommand::new(aid(&hex!("A0000008040001")))
            .with_security_domain(aid(&hex!("A000000151000000")))
            .to_command();

        assert_eq!(
            cmd.data().as_ref(),
            hex!("07A0000008040001" "08A000000151000000" "000000")
        );
    }
}
