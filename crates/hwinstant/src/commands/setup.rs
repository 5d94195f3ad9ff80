//! Setup flow handlers: add, discover, reauth, reconfigure.

use std::collections::BTreeMap;
use std::sync::Arc;

use hwinstant_core::{AbortReason, ConfigFlow, DhcpInfo, StandaloneHost, ZeroconfInfo};

use crate::cli::{AddArgs, DiscoverArgs, DiscoverCommand, GlobalOpts, ReauthArgs, ReconfigureArgs};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::entries;
use super::util::{self, FlowOutcome};

// ── Manual setup ────────────────────────────────────────────────────

pub async fn add(ctx: &mut Context, args: AddArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let factory = ctx.factory();
    let registry = Arc::clone(&ctx.entries);
    let host = StandaloneHost::new();

    let mut flow = ConfigFlow::new(&factory, &registry, &*host);
    flow.step_user();
    let outcome = util::settle(flow.submit_user(&args.ip_address).await)?;
    drop(flow);

    finish(ctx, outcome, global)
}

// ── Discovery ───────────────────────────────────────────────────────

pub async fn discover(
    ctx: &mut Context,
    args: DiscoverArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let factory = ctx.factory();
    let registry = Arc::clone(&ctx.entries);
    let host = StandaloneHost::new();
    let mut flow = ConfigFlow::new(&factory, &registry, &*host);

    let first = match args.command {
        DiscoverCommand::Zeroconf {
            ip,
            product_name,
            product_type,
            serial,
            path,
        } => {
            let properties: BTreeMap<String, String> = [
                ("product_name", product_name),
                ("product_type", product_type),
                ("serial", serial),
                ("path", path),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_owned(), v)))
            .collect();
            flow.step_zeroconf(&ZeroconfInfo {
                ip_address: ip,
                properties,
            })
        }
        DiscoverCommand::Dhcp { ip, hostname, mac } => {
            flow.step_dhcp(&DhcpInfo {
                ip_address: ip,
                hostname,
                macaddress: mac,
            })
            .await
        }
    };

    let outcome = match util::settle(first)? {
        FlowOutcome::Confirm(placeholders) => {
            let name = placeholders.get("name").map_or("device", String::as_str);
            let ip = placeholders.get("ip_address").map_or("?", String::as_str);
            if !util::confirm(&format!("Set up {name} at {ip}?"), global.yes)? {
                output::print_status("Cancelled", global.quiet);
                return Ok(());
            }
            util::settle(flow.submit_discovery_confirm().await)?
        }
        done => done,
    };
    drop(flow);

    finish(ctx, outcome, global)
}

// ── Reauth ──────────────────────────────────────────────────────────

pub async fn reauth(ctx: &mut Context, args: ReauthArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let entry = ctx.resolve_entry(&args.entry)?;
    let factory = ctx.factory();
    let registry = Arc::clone(&ctx.entries);
    let host = StandaloneHost::new();
    let mut flow = ConfigFlow::new(&factory, &registry, &*host);

    if let FlowOutcome::Confirm(_) = util::settle(flow.step_reauth(&entry.entry_id)?)? {
        let prompt = format!(
            "Enable the local API for '{}' in the HomeWizard Energy app. Done?",
            entry.title
        );
        if !util::confirm(&prompt, global.yes)? {
            output::print_status("Cancelled", global.quiet);
            return Ok(());
        }
    }
    let outcome = util::settle(flow.submit_reauth_enable_api().await?)?;
    drop(flow);

    finish(ctx, outcome, global)
}

// ── Reconfigure ─────────────────────────────────────────────────────

pub async fn reconfigure(
    ctx: &mut Context,
    args: ReconfigureArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let entry = ctx.resolve_entry(&args.entry)?;
    let factory = ctx.factory();
    let registry = Arc::clone(&ctx.entries);
    let host = StandaloneHost::new();
    let mut flow = ConfigFlow::new(&factory, &registry, &*host);

    flow.step_reconfigure(&entry.entry_id)?;
    let outcome = util::settle(flow.submit_reconfigure(&args.ip_address).await?)?;
    drop(flow);

    finish(ctx, outcome, global)
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Persist whatever the flow changed and report it.
fn finish(ctx: &mut Context, outcome: FlowOutcome, global: &GlobalOpts) -> Result<(), CliError> {
    match outcome {
        FlowOutcome::Created(entry) => {
            ctx.save()?;
            let out = output::render_single(&global.output(), &*entry, entries::detail, |e| {
                e.entry_id.clone()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
        FlowOutcome::Done(reason) => {
            ctx.save()?;
            output::print_status(status_message(reason), global.quiet);
            Ok(())
        }
        FlowOutcome::Confirm(_) => Err(CliError::Internal {
            message: "setup flow stopped at a form".into(),
        }),
    }
}

fn status_message(reason: AbortReason) -> &'static str {
    match reason {
        AbortReason::AlreadyConfigured => "This meter is already configured",
        AbortReason::ReauthEnableApiSuccessful => "Local API is enabled again",
        AbortReason::ReconfigureSuccessful => "Entry updated",
        _ => "Setup ended",
    }
}
