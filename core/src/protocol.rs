//! The update protocol.
//!
//! Every invocation starts by looking at the filesystem to work out which
//! leg of the cycle it is on:
//!
//! ```text
//!   original, no staging, writable   -> run the command in place
//!   original, no staging, locked     -> copy self to <path>.staging, relaunch the copy
//!   running as <path>.staging        -> copy self over <path>, run the command there,
//!                                       relaunch <path>
//!   original, staging present        -> delete <path>.staging and stop
//! ```
//!
//! No state survives in memory between those processes. The staging file is
//! the only marker of an update in flight; when a process dies mid-cycle the
//! next invocation finds the leftover copy and discards it, dropping the
//! pending change rather than resuming from a half-written container.

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use tracing::info;
use tracing::warn;
use zpdb_archive::EntryStore;
use zpdb_utils_stream::StreamError;

use crate::Command;
use crate::ContainerPaths;
use crate::Outcome;
use crate::ProtocolOptions;
use crate::Result;
use crate::ZpdbError;
use crate::command::execute;
use crate::probe::WriteAccess;
use crate::probe::WriteProbe;
use crate::relaunch::Relauncher;
use crate::staging;

/// Step chosen for the current invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// This process is the staging copy: swap it back over the original.
    SwapBack,
    /// A staging file from an earlier cycle is lying around: remove it.
    DiscardStaging,
    /// The container cannot be written: stage a copy and relaunch it.
    Stage,
    /// Operate on the container directly.
    Direct,
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Executed,
    StagingDiscarded,
    /// `program` was relaunched and carries on from here.
    HandedOff { program: PathBuf },
}

/// Map the observable facts of an invocation to the step it must take.
pub fn decide(running_from_staging: bool, staging_exists: bool, access: WriteAccess) -> Action {
    if running_from_staging {
        return Action::SwapBack;
    }
    if staging_exists {
        return Action::DiscardStaging;
    }
    match access {
        WriteAccess::Locked => Action::Stage,
        WriteAccess::Granted | WriteAccess::NotRequired => Action::Direct,
    }
}

pub struct UpdateProtocol<'a> {
    paths: ContainerPaths,
    options: ProtocolOptions,
    store: &'a dyn EntryStore,
    probe: &'a dyn WriteProbe,
    relauncher: &'a dyn Relauncher,
}

impl<'a> UpdateProtocol<'a> {
    pub fn new(
        paths: ContainerPaths,
        options: ProtocolOptions,
        store: &'a dyn EntryStore,
        probe: &'a dyn WriteProbe,
        relauncher: &'a dyn Relauncher,
    ) -> Self {
        Self {
            paths,
            options,
            store,
            probe,
            relauncher,
        }
    }

    /// Inspect the filesystem and decide what this invocation does for
    /// `command`. Write access is only probed when it matters.
    pub fn plan(&self, command: Command) -> Result<Action> {
        let running_from_staging = self.paths.running_from_staging();
        let staging_exists = running_from_staging
            || self
                .paths
                .staging()
                .try_exists()
                .map_err(|source| ZpdbError::StagingIo {
                    path: self.paths.staging().to_path_buf(),
                    source,
                })?;

        let access = if running_from_staging || staging_exists || !command.is_mutating() {
            WriteAccess::NotRequired
        } else {
            let original = self.paths.original();
            self.probe
                .probe(original)
                .map_err(|source| ZpdbError::WriteProbe {
                    path: original.to_path_buf(),
                    source,
                })?
        };

        let action = decide(running_from_staging, staging_exists, access);
        debug!(
            %command,
            running_from_staging,
            staging_exists,
            ?access,
            ?action,
            "update protocol decision"
        );
        Ok(action)
    }

    /// Run `command` under the protocol. `forwarded_args` are the arguments
    /// after the program name; they are passed on to any relaunched process.
    pub fn run(
        &self,
        command: Command,
        forwarded_args: &[OsString],
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<Completion> {
        match self.plan(command)? {
            Action::Direct => {
                self.execute_in_place(self.paths.original(), command, input, output)?;
                Ok(Completion::Executed)
            }
            Action::DiscardStaging => {
                info!(
                    staging = %self.paths.staging().display(),
                    "discarding staging file left by an earlier update"
                );
                staging::discard(self.paths.staging())?;
                Ok(Completion::StagingDiscarded)
            }
            Action::Stage => self.stage(forwarded_args, output),
            Action::SwapBack => self.swap_back(command, forwarded_args, input, output),
        }
    }

    fn stage(&self, forwarded_args: &[OsString], output: &mut dyn Write) -> Result<Completion> {
        let original = self.paths.original();
        let staging = self.paths.staging();
        info!(
            container = %original.display(),
            staging = %staging.display(),
            "container is locked for writing; staging a writable copy"
        );

        let copied = staging::snapshot(original, staging)?;
        debug!(bytes = copied, "staging copy written");

        self.hand_off(staging, forwarded_args, output)
            .inspect_err(|_| staging::remove_quietly(staging))
    }

    fn swap_back(
        &self,
        command: Command,
        forwarded_args: &[OsString],
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<Completion> {
        let original = self.paths.original();
        info!(
            container = %original.display(),
            "running from staging copy; swapping it back into place"
        );

        staging::swap_back(self.paths.staging(), original)?;
        self.execute_in_place(original, command, input, output)
            .inspect_err(|err| warn!("command failed after swap-back: {err}"))?;
        self.hand_off(original, forwarded_args, output)
    }

    fn hand_off(
        &self,
        program: &Path,
        forwarded_args: &[OsString],
        output: &mut dyn Write,
    ) -> Result<Completion> {
        output.flush().map_err(StreamError::Flush)?;
        info!(program = %program.display(), "relaunching");
        self.relauncher
            .relaunch(program, forwarded_args)
            .map_err(|source| ZpdbError::Relaunch {
                program: program.to_path_buf(),
                source,
            })?;
        Ok(Completion::HandedOff {
            program: program.to_path_buf(),
        })
    }

    fn execute_in_place(
        &self,
        container: &Path,
        command: Command,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<()> {
        let name = self.options.entry_name.as_str();
        let entry = self.store.open_entry(container, name)?;
        match execute(command, entry, input, output)? {
            Outcome::Unchanged => {}
            Outcome::Replace(bytes) => {
                self.store.delete_entry(container, name)?;
                self.store.write_entry(container, name, &bytes)?;
                debug!(%command, len = bytes.len(), "entry committed");
            }
        }
        Ok(())
    }
}
