use std::path::PathBuf;

use clap::Subcommand;

mod card_manager;
mod keycard;

pub use card_manager::*;
pub use keycard::*;

/// Define subcommands for the CLI
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Select an application (the Issuer Security Domain by default)
    Select {
        /// Application AID in hex
        aid: Option<String>,
    },

    /// Authenticate to the Issuer Security Domain and report the key set used
    Open,

    /// Delete an application instance or package
    Delete {
        /// AID in hex
        aid: String,

        /// Treat "referenced data not found" as success
        #[arg(long)]
        if_present: bool,
    },

    /// Install an applet instance from a loaded package
    Install {
        /// Package AID in hex
        package: String,

        /// Applet AID in hex
        applet: String,

        /// Instance AID in hex (defaults to the applet AID)
        #[arg(long)]
        instance: Option<String>,

        /// Install parameters in hex
        #[arg(long, default_value = "")]
        params: String,
    },

    /// Load a package
    Load {
        /// Package (load file) AID in hex
        package: String,

        #[command(flatten)]
        files: PackageArgs,

        /// Security domain AID in hex
        #[arg(long)]
        security_domain: Option<String>,

        /// Instances to delete before the package when reloading, in order
        #[arg(long = "reload-target", value_name = "AID")]
        reload_targets: Vec<String>,

        /// Delete existing objects before loading
        #[arg(long)]
        force: bool,
    },

    /// Load the Keycard package
    LoadKeycard {
        #[command(flatten)]
        files: PackageArgs,

        /// Delete existing Keycard instances and package before loading
        #[arg(long)]
        force: bool,
    },

    /// Install the Keycard instance, and NDEF or Cash instances when given
    InstallKeycard {
        /// Install the NDEF instance with this record (hex)
        #[arg(long)]
        ndef: Option<String>,

        /// Install the Cash instance with this data (hex)
        #[arg(long)]
        cash: Option<String>,
    },
}

/// Package contents to load
#[derive(clap::Args, Debug, Clone)]
pub struct PackageArgs {
    /// Load file components, concatenated in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// The single file is already a Load File Data Block (`C4` TLV)
    #[arg(long)]
    pub raw: bool,
}
