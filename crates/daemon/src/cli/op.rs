use std::fmt;
use std::path::PathBuf;

use common::VirtualDisk;
use tierfs_daemon::state::{AppState, StateError};
use tierfs_daemon::{setup_disk, SetupError};

/// Shared context handed to every command
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    /// Custom tierfs directory, `~/.tierfs` when unset
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn load_state(&self) -> Result<AppState, StateError> {
        AppState::load(self.config_path.clone())
    }

    /// Open the configured disk, run `f` against it, then close it.
    ///
    /// The disk is closed even when `f` fails; `f`'s error wins.
    pub fn with_disk<T, E, F>(&self, f: F) -> Result<T, E>
    where
        E: From<StateError> + From<SetupError> + From<common::DiskError>,
        F: FnOnce(&VirtualDisk) -> Result<T, E>,
    {
        let state = self.load_state()?;
        let disk = setup_disk(&state.config)?;
        let result = f(&disk);
        let closed = disk.close();
        let value = result?;
        closed?;
        Ok(value)
    }
}

/// A CLI command
pub trait Op: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: fmt::Display + fmt::Debug;

    fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

/// Generate a clap `Command` enum over a list of ops, together with
/// `OpOutput`/`OpError` wrappers and the dispatching `execute`.
#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $op:ty)),* $(,)?) => {
        #[derive(clap::Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($op),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$op as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$op as $crate::cli::op::Op>::Error),
            )*
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(OpOutput::$variant(output) => write!(f, "{output}"),)*
                }
            }
        }

        impl Command {
            pub fn execute(
                &self,
                ctx: &$crate::cli::op::OpContext,
            ) -> Result<OpOutput, OpError> {
                match self {
                    $(
                        Command::$variant(op) => $crate::cli::op::Op::execute(op, ctx)
                            .map(OpOutput::$variant)
                            .map_err(OpError::$variant),
                    )*
                }
            }
        }
    };
}
