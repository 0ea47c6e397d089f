//! GlobalPlatform command builders
//!
//! Each builder produces a plain [`Command`](gpcard_apdu_core::Command);
//! secure messaging is applied later by the secure channel.

pub mod delete;
pub mod external_authenticate;
pub mod initialize_update;
pub mod install;
pub mod load;
pub mod select;

pub use delete::DeleteCommand;
pub use external_authenticate::ExternalAuthenticateCommand;
pub use initialize_update::{InitializeUpdateCommand, InitializeUpdateResponse};
pub use install::{InstallForInstallCommand, InstallForLoadCommand};
pub use load::LoadCommand;
pub use select::SelectCommand;
