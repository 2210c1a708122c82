//! Core of `zpdb`: a program that keeps one mutable entry inside its own
//! executable file.
//!
//! Writing to a file that is currently executing is refused by some
//! operating systems. The [`protocol`] module works around that with a
//! staging copy and a relaunch, using nothing but the filesystem to carry
//! state between the processes involved.

pub mod command;
pub mod config;
mod error;
pub mod paths;
pub mod probe;
pub mod protocol;
pub mod relaunch;
mod staging;

pub use command::Command;
pub use command::Outcome;
pub use config::ProtocolOptions;
pub use error::Result;
pub use error::ZpdbError;
pub use paths::ContainerPaths;
pub use paths::Role;
pub use probe::OpenProbe;
pub use probe::WriteAccess;
pub use probe::WriteProbe;
pub use protocol::Action;
pub use protocol::Completion;
pub use protocol::UpdateProtocol;
pub use protocol::decide;
pub use relaunch::ProcessRelauncher;
pub use relaunch::Relauncher;
