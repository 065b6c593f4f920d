//! Output formatting module
//!
//! This module handles formatting machines and link sets for different
//! output formats.

use crate::hypermedia::{InjectedLinks, ResourceState, StateKind};
use crate::registry::LoadedModel;
use crate::Result;
use serde_json::json;

fn kind_label(state: &ResourceState) -> &'static str {
    match state.kind() {
        StateKind::Plain => "plain",
        StateKind::Collection => "collection",
        StateKind::PseudoFinal => "final",
        StateKind::Dynamic(_) => "dynamic",
    }
}

/// Output a machine summary as JSON
pub fn machine_json(w: &mut impl std::io::Write, loaded: &LoadedModel) -> Result<()> {
    let machine = &loaded.machine;
    let output = json!({
        "machine": loaded.name,
        "initial": machine.initial().id(),
        "states": machine.all_states().iter().map(|state| {
            json!({
                "id": state.id(),
                "kind": kind_label(state),
                "path": state.effective_path().map(|p| p.pattern().to_string()),
                "rel": state.rel(),
                "transitions": state.transitions().iter().map(|t| {
                    json!({
                        "id": t.id(),
                        "method": t.method(),
                        "target": t.target_id(),
                        "for_each": t.is_for_each(),
                    })
                }).collect::<Vec<_>>(),
            })
        }).collect::<Vec<_>>(),
        "interactions": machine.interactions_by_path().iter().map(|(path, methods)| {
            json!({
                "path": path.pattern(),
                "methods": methods,
            })
        }).collect::<Vec<_>>(),
        "bindings": loaded.bindings.iter().map(|b| {
            json!({
                "state": b.state_name,
                "path": b.path,
                "methods": b.methods,
            })
        }).collect::<Vec<_>>(),
    });

    serde_json::to_writer_pretty(&mut *w, &output)?;
    writeln!(w)?; // Add trailing newline
    Ok(())
}

/// Output a machine summary as text table
pub fn machine_table(w: &mut impl std::io::Write, loaded: &LoadedModel) -> Result<()> {
    let machine = &loaded.machine;

    writeln!(w, "Machine: {}", loaded.name)?;
    writeln!(w, "{}", "=".repeat(80))?;
    writeln!(w)?;

    writeln!(w, "States (initial: {}):", machine.initial().id())?;
    writeln!(w, "{:-<80}", "")?;
    writeln!(
        w,
        "{:<24} {:<12} {:<28} {:<14}",
        "ID", "Kind", "Path", "Rel"
    )?;
    writeln!(w, "{:-<80}", "")?;
    for state in machine.all_states() {
        let path = state
            .effective_path()
            .map(|p| p.pattern().to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            w,
            "{:<24} {:<12} {:<28} {:<14}",
            state.id(),
            kind_label(state),
            path,
            state.rel()
        )?;
    }
    writeln!(w)?;

    writeln!(w, "Interactions:")?;
    writeln!(w, "{:-<80}", "")?;
    for (path, methods) in machine.interactions_by_path() {
        let methods: Vec<&str> = methods.iter().map(String::as_str).collect();
        writeln!(w, "{:<40} {}", path.pattern(), methods.join(", "))?;
    }
    writeln!(w)?;

    if !machine.transitions_by_id().is_empty() {
        writeln!(w, "Transitions:")?;
        writeln!(w, "{:-<80}", "")?;
        for (id, transition) in machine.transitions_by_id() {
            let method = transition.method().unwrap_or("auto");
            let marker = if transition.is_for_each() { " [per item]" } else { "" };
            writeln!(w, "{:<48} {}{}", id, method, marker)?;
        }
        writeln!(w)?;
    }

    Ok(())
}

/// Output injected links as JSON
pub fn links_json(w: &mut impl std::io::Write, links: &InjectedLinks) -> Result<()> {
    let output = json!({
        "summary": {
            "total_links": links.links.len(),
            "item_link_sets": links.item_links.len(),
        },
        "links": links.links,
        "item_links": links.item_links,
    });

    serde_json::to_writer_pretty(&mut *w, &output)?;
    writeln!(w)?; // Add trailing newline
    Ok(())
}

/// Output injected links as text table
pub fn links_table(w: &mut impl std::io::Write, links: &InjectedLinks) -> Result<()> {
    writeln!(w, "Links:")?;
    writeln!(w, "{:-<100}", "")?;
    writeln!(
        w,
        "{:<16} {:<8} {:<44} {:<28}",
        "Rel", "Method", "Href", "ID"
    )?;
    writeln!(w, "{:-<100}", "")?;
    for link in &links.links {
        writeln!(
            w,
            "{:<16} {:<8} {:<44} {:<28}",
            link.rel, link.method, link.href, link.id
        )?;
    }
    writeln!(w)?;

    for (index, item) in links.item_links.iter().enumerate() {
        writeln!(w, "Item {}:", index)?;
        for link in item {
            writeln!(
                w,
                "  {:<16} {:<8} {:<44} {:<28}",
                link.rel, link.method, link.href, link.id
            )?;
        }
    }
    if !links.item_links.is_empty() {
        writeln!(w)?;
    }

    Ok(())
}
