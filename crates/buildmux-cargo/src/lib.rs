//! buildmux Cargo - process-backed collaborators
//!
//! Provides the real implementations behind the dispatcher's collaborator
//! traits:
//! - [`CargoToolchain`]: `cargo build --release --target <triple>`
//! - [`CommandToolchain`]: any command with `{triple}` substitution
//! - [`FsExporter`]: copies produced binaries into `<export_dir>/<export_name>/`

pub mod cargo;
pub mod command;
pub mod export;
pub mod process;

pub use cargo::{CargoConfig, CargoToolchain};
pub use command::{CommandToolchain, TRIPLE_PLACEHOLDER};
pub use export::FsExporter;
pub use process::{run_command, CommandOutput};
