//! Device identity handler.

use hwinstant_core::{ClientFactory, Device};

use crate::cli::{DeviceArgs, GlobalOpts};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

fn detail(d: &Device) -> Vec<(&'static str, String)> {
    vec![
        ("Model", d.model_name()),
        ("Product", d.product_name.clone()),
        ("Type", d.product_type.clone()),
        ("Serial", d.serial.clone().unwrap_or_else(|| "-".into())),
        ("Firmware", d.firmware_version.clone()),
        ("API version", d.api_version.clone()),
    ]
}

pub async fn handle(ctx: &mut Context, args: DeviceArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let address = match (args.ip, args.entry) {
        (Some(ip), _) => ip,
        (None, Some(entry)) => ctx.resolve_entry(&entry)?.data.ip_address.clone(),
        (None, None) => {
            return Err(CliError::Validation {
                field: "entry".into(),
                reason: "pass an entry or --ip".into(),
            });
        }
    };

    let client = ctx.factory().connect(&address)?;
    let result = client.device().await;
    client.close();
    let device = result?;

    let out = output::render_single(&global.output(), &device, detail, |d| {
        d.serial.clone().unwrap_or_default()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
