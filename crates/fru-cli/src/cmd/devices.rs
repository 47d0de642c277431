//! `fru devices`: list the device inventory with its parent/child links.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use clap::Args;
use fru_core::config::FruConfig;
use fru_core::model::device::Device;
use fru_core::store::Store;

use crate::cmd::open_existing_store;
use crate::output::{OutputMode, pretty_kv, pretty_rule, render_mode};

#[derive(Args, Debug)]
pub struct DevicesArgs {
    /// Only show devices whose serial number matches.
    #[arg(long)]
    pub serial: Option<String>,
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() { "-" } else { value }
}

fn write_text(devices: &[Device], w: &mut dyn Write) -> std::io::Result<()> {
    for device in devices {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            device.uid(),
            device.name(),
            display_or_dash(&device.spec.device_type),
            display_or_dash(&device.spec.serial_number),
            device.spec.parent_id.as_deref().unwrap_or("-"),
            device.status.children_device_ids.len()
        )?;
    }
    Ok(())
}

fn write_pretty(devices: &[Device], w: &mut dyn Write) -> std::io::Result<()> {
    if devices.is_empty() {
        return writeln!(w, "No devices.");
    }

    let names: HashMap<&str, &str> = devices.iter().map(|d| (d.uid(), d.name())).collect();
    let describe = |uid: &str| match names.get(uid) {
        Some(name) => format!("{uid} ({name})"),
        None => uid.to_string(),
    };

    for device in devices {
        pretty_kv(w, "device", device.uid())?;
        pretty_kv(w, "uri", device.name())?;
        pretty_kv(w, "type", display_or_dash(&device.spec.device_type))?;
        pretty_kv(w, "serial", display_or_dash(&device.spec.serial_number))?;
        if !device.spec.manufacturer.is_empty() {
            pretty_kv(w, "vendor", &device.spec.manufacturer)?;
        }
        if !device.spec.part_number.is_empty() {
            pretty_kv(w, "part", &device.spec.part_number)?;
        }
        if let Some(parent) = &device.spec.parent_id {
            pretty_kv(w, "parent", describe(parent))?;
        }
        for child in &device.status.children_device_ids {
            pretty_kv(w, "child", describe(child))?;
        }
        pretty_rule(w)?;
    }
    Ok(())
}

/// Execute `fru devices`.
///
/// # Errors
///
/// Returns an error if the inventory cannot be opened or listed.
pub fn run_devices(
    args: &DevicesArgs,
    config: &FruConfig,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let store = open_existing_store(config, project_root, output)?;
    let mut devices = store.list_devices()?;
    if let Some(serial) = &args.serial {
        devices.retain(|d| &d.spec.serial_number == serial);
    }

    render_mode(
        output,
        &devices,
        |d, w| write_text(d, w),
        |d, w| write_pretty(d, w),
    )
}
