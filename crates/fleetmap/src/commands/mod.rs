//! Command dispatch: bridges CLI args -> map engine -> output formatting.

pub mod config_cmd;
pub mod floors;
pub mod locations;
pub mod roster;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

use self::util::Context;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, ctx: Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Locations(args) => locations::handle(ctx, args, global).await,
        Command::Roster(args) => roster::handle(ctx, args, global).await,
        Command::Floors(args) => floors::handle(ctx, args, global).await,
        Command::Watch(args) => watch::handle(ctx, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
