//! Command dispatch: bridges CLI args -> core flows and runtime -> output formatting.

pub mod config_cmd;
pub mod device;
pub mod diagnostics;
pub mod entries;
pub mod sensors;
pub mod setup;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config::Context;
use crate::error::CliError;

/// Dispatch a command that works on the entry registry.
pub async fn dispatch(cmd: Command, ctx: &mut Context, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Add(args) => setup::add(ctx, args, global).await,
        Command::Discover(args) => setup::discover(ctx, args, global).await,
        Command::Reconfigure(args) => setup::reconfigure(ctx, args, global).await,
        Command::Reauth(args) => setup::reauth(ctx, args, global).await,
        Command::Entries(args) => entries::handle(ctx, args, global),
        Command::Device(args) => device::handle(ctx, args, global).await,
        Command::Sensors(args) => sensors::handle(ctx, args, global).await,
        Command::Watch(args) => watch::handle(ctx, args, global).await,
        Command::Diagnostics(args) => diagnostics::handle(ctx, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
