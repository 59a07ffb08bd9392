//! Interactive menus for choosing a base and plugins.
//!
//! Every prompt returns `None` when the user cancels (Esc or `q`), so the
//! caller can stop before anything is fetched.

use anyhow::{Context, Result};
use dialoguer::{Confirm, MultiSelect, Select};

use gbwf_core::manifest::Base;

use crate::style;

fn label(base: &Base) -> String {
    format!(
        "{}  {}",
        style::entry(&base.name, &base.color),
        style::dim(&base.remote.source)
    )
}

/// Pick exactly one base. A single candidate is returned without asking.
pub fn select_base(bases: &[Base]) -> Result<Option<&Base>> {
    match bases {
        [] => anyhow::bail!("the manifest does not list any base"),
        [only] => Ok(Some(only)),
        _ => {
            let items: Vec<String> = bases.iter().map(label).collect();
            let choice = Select::new()
                .with_prompt("Choose a base")
                .items(&items)
                .default(0)
                .interact_opt()
                .context("failed to read base selection")?;
            Ok(choice.map(|index| &bases[index]))
        }
    }
}

/// Pick any number of plugins, keeping manifest order.
pub fn select_plugins(plugins: &[Base]) -> Result<Option<Vec<&Base>>> {
    if plugins.is_empty() {
        return Ok(Some(Vec::new()));
    }

    let items: Vec<String> = plugins.iter().map(label).collect();
    let chosen = MultiSelect::new()
        .with_prompt("Choose plugins (space to toggle, enter to confirm)")
        .items(&items)
        .interact_opt()
        .context("failed to read plugin selection")?;

    Ok(chosen.map(|mut indices| {
        indices.sort_unstable();
        indices.into_iter().map(|index| &plugins[index]).collect()
    }))
}

/// Yes/no question defaulting to yes.
pub fn confirm(prompt: &str) -> Result<bool> {
    let answer = Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact_opt()
        .context("failed to read confirmation")?;
    Ok(answer.unwrap_or(false))
}
