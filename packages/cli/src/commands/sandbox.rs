// ABOUTME: Sandbox lifecycle subcommands: connect, ps, stop, rm, merge, ports, logs
// ABOUTME: Thin presentation layer over the SandboxManager

use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use inquire::Confirm;

use warren_core::utils::generate_sandbox_name;
use warren_sandbox::{ObservedStatus, SandboxRecord};

use super::build_manager;

/// Connect to a sandbox, creating it first when it does not exist yet.
pub async fn connect(
    name: Option<String>,
    shell: Option<String>,
    branch: Option<String>,
    yes: bool,
) -> anyhow::Result<()> {
    let manager = build_manager()?;

    let name = match name {
        Some(name) => name,
        None => {
            let taken: Vec<String> = manager
                .list()
                .await?
                .sandboxes
                .into_iter()
                .map(|v| v.record.name)
                .collect();
            let generated = generate_sandbox_name(&taken);
            println!("Generated sandbox name: {}", generated.cyan());
            generated
        }
    };

    if manager.get(&name)?.is_none() {
        if !yes {
            let create = Confirm::new(&format!("Sandbox '{}' does not exist. Create it?", name))
                .with_default(true)
                .prompt()?;
            if !create {
                return Ok(());
            }
        }

        let record = manager
            .create(&name, branch.as_deref(), &|step: &str| {
                println!("  {}", step.dimmed());
            })
            .await?;

        println!("{}", format!("Sandbox '{}' started!", name).green());
        print_record(&record);
        println!();
    }

    println!("Connecting to sandbox '{}'...", name.cyan());
    let code = manager.connect(&name, shell.as_deref()).await?;
    std::process::exit(code);
}

/// List sandboxes with their observed state.
pub async fn list() -> anyhow::Result<()> {
    let manager = build_manager()?;
    let report = manager.list().await?;

    if report.sandboxes.is_empty() && report.corrupt.is_empty() && report.orphans.is_empty() {
        println!("No sandboxes for this project.");
        println!(
            "{}",
            "Use 'warren connect <name>' to create one".dimmed()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Branch", "Status", "Ports", "Created"]);

    for view in &report.sandboxes {
        let status = match view.observed {
            ObservedStatus::Running => view.observed.to_string().green(),
            ObservedStatus::Stopped => view.observed.to_string().yellow(),
            ObservedStatus::Drifted => view.observed.to_string().red(),
        };
        let ports = view
            .record
            .ports
            .iter()
            .map(|(c, h)| format!("{}:{}", c, h))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            view.record.name.clone(),
            view.record.branch.clone(),
            status.to_string(),
            ports,
            view.record.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }

    println!("{}", table);

    for corrupt in &report.corrupt {
        println!(
            "{} registry entry '{}' is corrupt: {}",
            "Warning:".yellow().bold(),
            corrupt.name,
            corrupt.detail
        );
    }
    for orphan in &report.orphans {
        println!(
            "{} container '{}' carries this project's labels but has no registry entry",
            "Warning:".yellow().bold(),
            orphan.name
        );
    }
    if report
        .sandboxes
        .iter()
        .any(|v| v.observed == ObservedStatus::Drifted)
    {
        println!(
            "{}",
            "Drifted sandboxes have lost their container; use 'warren rm --force' to clean up"
                .dimmed()
        );
    }

    Ok(())
}

pub async fn stop(name: &str) -> anyhow::Result<()> {
    let manager = build_manager()?;
    manager.stop(name).await?;
    println!("{}", format!("Sandbox '{}' stopped.", name).green());
    Ok(())
}

pub async fn stop_all() -> anyhow::Result<()> {
    let manager = build_manager()?;
    let stopped = manager.stop_all().await?;

    if stopped.is_empty() {
        println!("No sandboxes were running for this project.");
    } else {
        for name in &stopped {
            println!("  {} {}", "Stopped:".dimmed(), name);
        }
        println!("{}", "All sandboxes stopped.".green());
    }
    Ok(())
}

pub async fn remove(name: &str, force: bool) -> anyhow::Result<()> {
    let manager = build_manager()?;
    let report = manager.remove(name, force).await?;

    if report.fully_clean() {
        println!("{}", format!("Sandbox '{}' removed.", name).green());
    } else {
        println!(
            "{}",
            format!("Sandbox '{}' removed with warnings:", name).yellow()
        );
        for step in &report.steps {
            match &step.error {
                None => println!("  {} {}", "ok:".green(), step.step.as_str()),
                Some(e) => println!("  {} {}: {}", "failed:".red(), step.step.as_str(), e),
            }
        }
    }
    Ok(())
}

pub async fn merge(name: &str, target: Option<&str>) -> anyhow::Result<()> {
    let manager = build_manager()?;
    let report = manager.merge(name, target).await?;
    println!(
        "{}",
        format!("Merged '{}' into '{}'.", report.branch, report.target).green()
    );
    Ok(())
}

pub async fn ports(name: &str) -> anyhow::Result<()> {
    let manager = build_manager()?;
    let ports = manager.ports(name)?;

    if ports.is_empty() {
        println!("No ports declared for sandbox '{}'.", name);
        return Ok(());
    }

    println!("{}", format!("Ports for '{}':", name).bold());
    for (container_port, host_port) in ports {
        println!("  {}/tcp -> 127.0.0.1:{}", container_port, host_port);
    }
    Ok(())
}

pub async fn logs(name: &str, follow: bool) -> anyhow::Result<()> {
    let manager = build_manager()?;
    manager.logs(name, follow).await?;
    Ok(())
}

fn print_record(record: &SandboxRecord) {
    println!("  {} {}", "Path:".dimmed(), record.worktree_path.display());
    println!("  {} {}", "Branch:".dimmed(), record.branch);
    if !record.ports.is_empty() {
        let ports = record
            .ports
            .iter()
            .map(|(c, h)| format!("{}:{}", c, h))
            .collect::<Vec<_>>()
            .join(", ");
        println!("  {} {}", "Ports:".dimmed(), ports);
    }
}
