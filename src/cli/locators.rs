use action_locator::{Locator, PlatformTable};
use anyhow::{bail, Result};
use cartpilot_core_types::Platform;
use clap::Args;
use std::sync::Arc;

use crate::cli::context::CliContext;
use crate::cli::output::{print_value, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct LocatorsArgs {
    /// Only show this platform
    #[arg(short, long)]
    pub platform: Option<String>,
}

pub fn cmd_locators(args: LocatorsArgs, ctx: &CliContext) -> Result<()> {
    let tables = ctx.locator_tables()?;
    let selected: Vec<Arc<PlatformTable>> = match &args.platform {
        Some(name) => match tables.profile(&Platform::new(name)) {
            Some(table) => vec![table],
            None => bail!("no locator table for platform {}", name),
        },
        None => tables.tables().cloned().collect(),
    };

    match ctx.output() {
        OutputFormat::Human => {
            for table in &selected {
                print_table(table);
            }
            Ok(())
        }
        format => {
            let plain: Vec<&PlatformTable> = selected.iter().map(|table| table.as_ref()).collect();
            print_value(format, &plain)
        }
    }
}

fn print_table(table: &PlatformTable) {
    println!("{}", table.platform);
    println!("  product url: {}", table.product_url);
    println!("  cart url:    {}", table.cart_url);
    for (target, anchors) in &table.targets {
        println!("  {}:", target);
        for (priority, anchor) in anchors.iter().enumerate() {
            println!("    {}. {}", priority + 1, anchor);
        }
    }
    for modal in &table.modals {
        println!(
            "  modal {} ({} detect, {} decline, {} close)",
            modal.kind,
            modal.detect.len(),
            modal.decline.len(),
            modal.close.len()
        );
    }
}
