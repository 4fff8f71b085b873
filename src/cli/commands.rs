//! Command dispatch

use std::io;

use clap::CommandFactory;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, Settings};
use crate::domain::{FormItemRef, NewNode, TreeNodeConvert};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Ok(());
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "restree", &mut io::stdout());
            return Ok(());
        }
        Commands::Config { command } => return config_command(cli, command),
        _ => {}
    }

    let container = ServiceContainer::new(load_settings(cli)?);
    let responses = &container.responses;

    match command {
        Commands::Tree { response } => {
            let tree = responses.load(*response)?;
            if tree.is_empty() {
                output::warning(&format!("response {} has no nodes", response));
            }
            output::info(&tree.to_tree_string());
        }
        Commands::Debug { response } => {
            let dump = responses.debug_tree(*response, container.settings.indent_width)?;
            output::info(&dump);
        }
        Commands::Children { response, node } => {
            for child in responses.children(*response, *node)? {
                output::node(&child);
            }
        }
        Commands::Attach {
            response,
            item,
            parent,
            kind,
            value,
            position,
        } => {
            if item.trim().is_empty() {
                return Err(CliError::InvalidArgs("--item must not be empty".into()));
            }
            let new = NewNode {
                id: None,
                form_item: FormItemRef::new(item.clone()),
                kind: *kind,
                value: value.clone(),
            };
            let id = responses.attach(*response, *parent, new, position.position())?;
            output::success(&format!("attached {} to response {}", id, response));
        }
        Commands::Find {
            response,
            item,
            parent,
        } => match responses.find(*response, *parent, &FormItemRef::new(item.clone()))? {
            Some(node) => output::node(&node),
            None => output::warning(&format!("no node answers {} in response {}", item, response)),
        },
        Commands::Remove { response, node } => {
            let removed = responses.remove(*response, *node)?;
            if removed == 0 {
                output::warning(&format!("node {} not found in response {}", node, response));
            } else {
                output::success(&format!("removed {} nodes", removed));
            }
        }
        Commands::SetValue {
            response,
            node,
            value,
        } => {
            responses.set_value(*response, *node, value.clone())?;
            output::success(&format!("updated {}", node));
        }
        Commands::Move {
            response,
            node,
            parent,
            position,
        } => {
            responses.move_node(*response, *node, *parent, position.position())?;
            output::success(&format!("moved {}", node));
        }
        Commands::Reassociate {
            response,
            root,
            target,
        } => {
            let moved = responses.reassociate(*response, *root, *target)?;
            output::success(&format!(
                "reassociated {} nodes from response {} to {}",
                moved, response, target
            ));
        }
        Commands::Responses => {
            let ids = container.store.responses().map_err(InfraError::from)?;
            for id in ids {
                output::info(&id);
            }
        }
        Commands::Completion { .. } | Commands::Config { .. } => {}
    }
    Ok(())
}

#[instrument(level = "debug", skip(cli))]
fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(data) = &cli.data {
        settings.data_file = data.clone();
    }
    debug!("settings: {:?}", settings);
    Ok(settings)
}

fn config_command(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Template => output::info(&Settings::template()),
        ConfigCommands::Path => {
            output::header("Config locations");
            match global_config_path() {
                Some(p) => output::info(&format!("global: {}", p.display())),
                None => output::warning("no config directory available"),
            }
            if let Some(p) = &cli.config {
                output::info(&format!("local:  {}", p.display()));
            }
        }
    }
    Ok(())
}
