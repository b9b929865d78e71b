//! # Envs Command Implementation
//!
//! Lists the environments of a project: every non-hidden subdirectory of the
//! root, in lexicographic order. Environments without an override document
//! yet are marked; their first reconciliation will create it.

use anyhow::Result;
use clap::Args;

use kev::defaults;
use kev::reconcile::discover_environments;
use kev::suggestions;

use super::RootArgs;

/// List the environments of a project
#[derive(Args, Debug)]
pub struct EnvsArgs {
    #[command(flatten)]
    pub root: RootArgs,
}

/// Execute the `envs` command.
pub fn execute(args: EnvsArgs) -> Result<()> {
    let root = &args.root.root;
    let names = discover_environments(root).map_err(|e| suggestions::with_hints(e, root))?;
    if names.is_empty() {
        return Err(suggestions::no_environments(root));
    }

    for name in names {
        if defaults::override_path(root, &name).is_file() {
            println!("{}", name);
        } else {
            println!("{} (not reconciled yet)", name);
        }
    }
    Ok(())
}
