//! CLI command implementations
//!
//! This module contains the implementation for each CLI command.

use crate::hypermedia::ResourceState;
use crate::registry::LoadedModel;
use crate::{cli::Cli, Error, Result};

/// Find a state by canonical id, falling back to its bare name when that
/// is unambiguous.
fn find_state(loaded: &LoadedModel, wanted: &str) -> Result<ResourceState> {
    if let Some(state) = loaded.machine.state(wanted) {
        return Ok(state.clone());
    }
    let by_name: Vec<&ResourceState> = loaded
        .machine
        .registered_states()
        .into_iter()
        .filter(|s| s.name == wanted)
        .collect();
    match by_name.as_slice() {
        [state] => Ok((*state).clone()),
        [] => {
            let known: Vec<String> = loaded
                .machine
                .registered_states()
                .iter()
                .map(|s| s.id())
                .collect();
            Err(Error::custom(format!(
                "State {} is not part of machine {} (known: {})",
                wanted,
                loaded.name,
                known.join(", ")
            )))
        }
        _ => Err(Error::custom(format!(
            "State name {} is ambiguous in machine {}, use its full id",
            wanted, loaded.name
        ))),
    }
}

/// Inspect command implementation
pub mod inspect {
    use super::*;
    use crate::cli::{Commands, OutputFormat};
    use crate::registry::MachineModel;

    /// Execute the inspect command
    pub fn execute(args: Cli) -> Result<()> {
        let (model_path, output_format) = match args.command {
            Commands::Inspect { model, output } => (model, output),
            _ => unreachable!("inspect::execute called with wrong command"),
        };

        tracing::info!("Inspecting model: {:?}", model_path);
        let loaded = MachineModel::load(&model_path)?;

        match output_format {
            OutputFormat::Json => {
                crate::cli::output::machine_json(&mut std::io::stdout(), &loaded)?;
            }
            OutputFormat::Table => {
                crate::cli::output::machine_table(&mut std::io::stdout(), &loaded)?;
            }
        }

        Ok(())
    }
}

/// Links command implementation
pub mod links {
    use super::*;
    use crate::cli::{Commands, OutputFormat};
    use crate::hypermedia::{PropertyBag, RequestContext, ResourcePayload};
    use crate::registry::MachineModel;
    use crate::Config;
    use std::path::PathBuf;

    /// Execute the links command
    pub fn execute(args: Cli, config: Config) -> Result<()> {
        let (model_path, state_name, payload_path, params, rel, base_uri, output_format) =
            match args.command {
                Commands::Links {
                    model,
                    state,
                    payload,
                    params,
                    rel,
                    base_uri,
                    output,
                    ..
                } => (model, state, payload, params, rel, base_uri, output),
                _ => unreachable!("links::execute called with wrong command"),
            };

        tracing::info!("Generating links from model: {:?}", model_path);
        let loaded = MachineModel::load(&model_path)?;
        let state = find_state(&loaded, &state_name)?;

        let mut ctx = RequestContext::new(base_uri.unwrap_or(config.default.base_uri));
        for param in &params {
            let Some((name, value)) = param.split_once('=') else {
                return Err(Error::custom(format!(
                    "Invalid parameter {}, expected NAME=VALUE",
                    param
                )));
            };
            ctx = ctx.with_path_param(name, value);
        }

        let payload = match payload_path {
            Some(path) => Some(read_payload(path)?),
            None => None,
        };

        let links =
            loaded
                .machine
                .inject_links(&ctx, payload.as_ref(), &state, rel.as_deref());
        tracing::debug!(
            "Generated {} resource links and {} item link sets",
            links.links.len(),
            links.item_links.len()
        );

        match output_format {
            OutputFormat::Json => {
                crate::cli::output::links_json(&mut std::io::stdout(), &links)?;
            }
            OutputFormat::Table => {
                crate::cli::output::links_table(&mut std::io::stdout(), &links)?;
            }
        }

        Ok(())
    }

    /// A JSON object is one entity's properties; an array is one bag per
    /// collection item.
    fn read_payload(path: PathBuf) -> Result<ResourcePayload> {
        let contents = std::fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        let payload = match &value {
            serde_json::Value::Array(items) => {
                ResourcePayload::Collection(items.iter().map(PropertyBag::from_json).collect())
            }
            other => ResourcePayload::Entity(PropertyBag::from_json(other)),
        };
        Ok(payload)
    }
}

/// Graph command implementation
pub mod graph {
    use super::*;
    use crate::cli::Commands;
    use crate::hypermedia::MachineGraph;
    use crate::registry::MachineModel;

    /// Execute the graph command
    pub fn execute(args: Cli) -> Result<()> {
        let (model_path, out) = match args.command {
            Commands::Graph { model, out } => (model, out),
            _ => unreachable!("graph::execute called with wrong command"),
        };

        tracing::info!("Building graph for model: {:?}", model_path);
        let loaded = MachineModel::load(&model_path)?;
        let graph = MachineGraph::from_machine(&loaded.machine);
        let dot = graph.to_dot(&loaded.machine);

        match out {
            Some(path) => {
                std::fs::write(&path, dot)?;
                tracing::info!("Wrote graph to {:?}", path);
                println!("Graph written to {:?}", path);
            }
            None => println!("{}", dot),
        }

        Ok(())
    }
}

/// Check command implementation
pub mod check {
    use super::*;
    use crate::hypermedia::{validate, MachineGraph, Severity};
    use crate::registry::MachineModel;
    use std::path::PathBuf;

    /// Execute the check command
    pub fn execute(model_path: PathBuf) -> Result<()> {
        tracing::info!("Checking model: {:?}", model_path);

        // Load and build the model
        let loaded = match MachineModel::load(&model_path) {
            Ok(l) => l,
            Err(e) => {
                eprintln!("❌ Failed to load model: {}", e);
                return Err(e);
            }
        };

        let graph = MachineGraph::from_machine(&loaded.machine);
        let stats = graph.stats();
        let report = validate(&loaded.machine);

        // Print check report
        println!("📋 Model Check Report");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("File: {:?}", model_path);
        println!();
        println!("Machine: {}", loaded.name);
        println!("  Initial state: {}", loaded.machine.initial().id());
        println!("  States: {}", stats.total_states);
        println!("  Transitions: {}", stats.total_transitions);
        println!("  Collections: {}", stats.collections);
        println!("  Final outcomes: {}", stats.pseudo_final);
        println!("  Dynamic states: {}", stats.dynamic);
        println!("  Cyclic: {}", if stats.has_cycles { "yes" } else { "no" });
        println!();
        println!("Bindings: {}", loaded.bindings.len());
        for binding in &loaded.bindings {
            println!(
                "    - {} {} -> {}",
                binding.methods.join(","),
                binding.path,
                binding.state_name
            );
        }
        println!();

        // Print errors
        let errors: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .collect();
        if !errors.is_empty() {
            println!("❌ Errors:");
            for finding in &errors {
                println!("   {}", finding.message);
            }
            println!();
        }

        // Print warnings
        let warnings: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .collect();
        if !warnings.is_empty() {
            println!("⚠️  Warnings:");
            for finding in &warnings {
                println!("   {}", finding.message);
            }
            println!();
        }

        // Final verdict
        if errors.is_empty() {
            println!("✅ Model is valid!");
            Ok(())
        } else {
            println!("❌ Model check failed with {} error(s)", errors.len());
            Err(Error::custom("Model check failed"))
        }
    }
}

/// Route command implementation
pub mod route {
    use super::*;
    use crate::cli::Commands;
    use crate::registry::{ModelResourceStateProvider, ResourceStateProvider};
    use crate::Config;

    /// Execute the route command
    pub fn execute(args: Cli, mut config: Config) -> Result<()> {
        let (method, path, models) = match args.command {
            Commands::Route {
                method,
                path,
                models,
                ..
            } => (method, path, models),
            _ => unreachable!("route::execute called with wrong command"),
        };

        if let Some(dir) = models {
            config.models.directory = Some(dir);
        }
        let files = config.model_files()?;
        if files.is_empty() {
            return Err(Error::Config(format!(
                "No model files found in {:?}",
                config.models_directory()
            )));
        }
        tracing::info!("Routing {} {} across {} model files", method, path, files.len());

        let provider = ModelResourceStateProvider::new(files)?;
        match provider.determine_state(&method, &path)? {
            Some(state) => {
                println!("{} {} -> {}", method, path, state.id());
                if let Some(template) = state.effective_path() {
                    println!("  Path template: {}", template.pattern());
                    if let Some(bound) = template.extract(&path) {
                        for (name, value) in &bound {
                            println!("  {} = {}", name, value);
                        }
                    }
                }
                Ok(())
            }
            None => {
                println!("No state bound to {} {}", method, path);
                Err(Error::custom(format!("No state bound to path {}", path)))
            }
        }
    }
}
