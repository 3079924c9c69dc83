//! CLI commands and output formatting for the module pipeline.

use clap::{Args, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use super::callback::{Callback, StagedCallback};
use super::error::{ModuleError, Result};
use super::handler::ModuleHandler;
use super::loader::EntryRegistry;
use super::manifest::ModuleManifest;
use super::transport::HttpTransport;
use super::workspace::Workspace;
use crate::config::ModhostConfig;

/// Module subcommand arguments.
#[derive(Args, Debug, Clone)]
pub struct ModuleArgs {
    #[command(subcommand)]
    pub command: ModuleCommand,
}

/// Module subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ModuleCommand {
    /// List known modules
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a module from its hosted manifest
    Add {
        /// URL of the module manifest
        url: String,

        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Remove a known module and rebuild the bundle
    Remove {
        /// Name of the module
        name: String,

        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Re-acquire every known module and rebuild the bundle
    Refresh,

    /// Check whether a class resolves from the current bundle
    Resolve {
        /// Fully-qualified class name
        class: String,
    },
}

/// Execute the module command.
pub async fn execute(
    args: ModuleArgs,
    config: &ModhostConfig,
    registry: Arc<EntryRegistry>,
) -> Result<()> {
    let mut handler = build_handler(config, registry)?;

    match args.command {
        ModuleCommand::List { json } => {
            handle_list(&handler, json)?;
        }
        ModuleCommand::Add { url, yes } => {
            handle_add(&mut handler, url, yes).await?;
        }
        ModuleCommand::Remove { name, yes } => {
            handle_remove(&mut handler, name, yes).await?;
        }
        ModuleCommand::Refresh => {
            handle_refresh(&mut handler).await?;
        }
        ModuleCommand::Resolve { class } => {
            handle_resolve(&handler, &class);
        }
    }

    Ok(())
}

fn build_handler(
    config: &ModhostConfig,
    registry: Arc<EntryRegistry>,
) -> Result<ModuleHandler<HttpTransport>> {
    let workspace = match config.workspace_root() {
        Some(root) => Workspace::at_root(root),
        None => Workspace::new()?,
    };
    let transport = HttpTransport::new(
        config.transport.connect_timeout(),
        config.transport.read_timeout(),
    )?;
    let builtin = load_builtin_manifests(&config.builtin_manifests)?;

    let mut handler =
        ModuleHandler::new(workspace, transport, registry).with_builtin_manifests(builtin);
    handler.setup()?;
    Ok(handler)
}

fn load_builtin_manifests(paths: &[PathBuf]) -> Result<Vec<ModuleManifest>> {
    let mut manifests = Vec::with_capacity(paths.len());
    for path in paths {
        let json = std::fs::read_to_string(path)?;
        manifests.push(ModuleManifest::parse(&json, &path.display().to_string())?);
    }
    Ok(manifests)
}

fn handle_list(handler: &ModuleHandler<HttpTransport>, json: bool) -> Result<()> {
    let manifests = handler.configs();
    if json {
        let json_str = format_json(&manifests)?;
        println!("{json_str}");
    } else {
        let headers = &["NAME", "VERSION", "ENTRY CLASS", "DEPENDENCIES"];
        let rows: Vec<Vec<String>> = manifests
            .iter()
            .map(|m| {
                let dependencies: Vec<&str> =
                    m.dependencies.iter().map(|d| d.name.as_str()).collect();
                vec![
                    m.name.clone(),
                    m.version.clone(),
                    m.entry_class.clone(),
                    dependencies.join(", "),
                ]
            })
            .collect();
        format_table(headers, rows);
    }

    Ok(())
}

async fn handle_add(
    handler: &mut ModuleHandler<HttpTransport>,
    url: String,
    yes: bool,
) -> Result<()> {
    let manifest = handler.fetch_manifest(&url).await?;

    if !yes && is_tty() {
        let version_str = if manifest.version.is_empty() {
            String::new()
        } else {
            format!(" (v{})", manifest.version)
        };
        let prompt = format!("Add {}{version_str}?", manifest.name);
        if !confirm(&prompt)? {
            eprintln!("Cancelled");
            return Ok(());
        }
    }

    let mut already_downloaded = HashSet::new();
    let mut callback = ConsoleCallback::new();
    handler
        .acquire(&manifest, &mut already_downloaded, true, &mut callback)
        .await?;
    eprintln!("Added {}", manifest.name);
    Ok(())
}

async fn handle_remove(
    handler: &mut ModuleHandler<HttpTransport>,
    name: String,
    yes: bool,
) -> Result<()> {
    let manifest = match handler.configs().iter().find(|m| m.name == name) {
        Some(manifest) => manifest.clone(),
        None => {
            eprintln!("Module '{name}' is not installed");
            return Ok(());
        }
    };

    if !yes && is_tty() {
        let prompt = format!("Remove {name}?");
        if !confirm(&prompt)? {
            eprintln!("Cancelled");
            return Ok(());
        }
    }

    let mut callback = ConsoleCallback::new();
    handler.remove(&manifest, &mut callback).await?;
    eprintln!("Removed {name}");
    Ok(())
}

async fn handle_refresh(handler: &mut ModuleHandler<HttpTransport>) -> Result<()> {
    let mut callback = ConsoleCallback::new();
    handler.refresh_all(&mut callback).await?;
    eprintln!("Refreshed {} module(s)", handler.configs().len());
    Ok(())
}

fn handle_resolve(handler: &ModuleHandler<HttpTransport>, class: &str) {
    match handler.resolve(class) {
        Ok(mut entry) => {
            let ready = entry.setup() && entry.is_ready();
            entry.destroy();
            eprintln!("{class}: instantiated (ready: {ready})");
        }
        Err(e) => eprintln!("{class}: {e}"),
    }
}

/// Check if stdout is a TTY.
fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Prompt user for confirmation.
fn confirm(prompt: &str) -> Result<bool> {
    let result = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(result)
}

/// Staged progress rendered as a single terminal progress bar.
///
/// Each published stage owns the bar in turn: the bar resets to zero with
/// the stage's name as its message, fills to the reported percentage, and
/// clears once the final stage finishes.
struct ConsoleCallback {
    bar: ProgressBar,
    stages: Vec<String>,
    current: usize,
}

impl ConsoleCallback {
    fn new() -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) =
            ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self {
            bar,
            stages: Vec::new(),
            current: 0,
        }
    }
}

impl Callback for ConsoleCallback {
    fn on_start(&mut self) {
        let name = self
            .stages
            .get(self.current)
            .cloned()
            .unwrap_or_default();
        self.bar.set_position(0);
        self.bar.set_message(name);
    }

    fn on_progress(&mut self, percent: u32) {
        self.bar.set_position(u64::from(percent.min(100)));
    }

    fn on_finish(&mut self) {
        self.current += 1;
        if self.current >= self.stages.len() {
            self.bar.finish_and_clear();
        }
    }
}

impl StagedCallback for ConsoleCallback {
    fn set_stages(&mut self, names: &[String]) {
        self.stages = names.to_vec();
        self.current = 0;
    }
}

/// Format and print a table to stdout.
fn format_table(headers: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        eprintln!("No modules found");
        return;
    }

    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    // Print header
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_line.join("  "));

    // Print separator
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    println!("{}", separator.join("  "));

    // Print rows
    for row in rows {
        let formatted_row: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = if i < widths.len() { widths[i] } else { 0 };
                format!("{:width$}", cell, width = width)
            })
            .collect();
        println!("{}", formatted_row.join("  "));
    }
}

/// Format data as JSON.
fn format_json<T: serde::Serialize>(data: &T) -> Result<String> {
    let json = serde_json::to_string_pretty(data).map_err(|e| ModuleError::ManifestParse {
        context: "output".to_string(),
        source: e,
    })?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_json() {
        let manifest = ModuleManifest {
            name: "demo".to_string(),
            version: "1.0.0".to_string(),
            ..ModuleManifest::default()
        };

        if let Ok(json) = format_json(&manifest) {
            assert!(json.contains("\"name\""));
            assert!(json.contains("\"demo\""));
            assert!(json.contains("\"1.0.0\""));
        } else {
            panic!("Should serialize to JSON");
        }
    }

    #[test]
    fn test_format_table_empty() {
        // This test verifies format_table doesn't panic with empty rows
        let headers = &["NAME", "VERSION"];
        let rows = Vec::new();
        format_table(headers, rows);
        // Should print "No modules found" to stderr
    }

    #[test]
    fn test_format_table() {
        let headers = &["NAME", "VERSION"];
        let rows = vec![
            vec!["demo".to_string(), "1.0.0".to_string()],
            vec!["other".to_string(), "0.2.1".to_string()],
        ];
        format_table(headers, rows);
        // Visual test - should print formatted table to stdout
    }

    #[test]
    fn test_console_callback_stage_progression() {
        let mut callback = ConsoleCallback::new();
        callback.set_stages(&["first".to_string(), "second".to_string()]);
        callback.on_start();
        callback.on_progress(50);
        callback.on_finish();
        assert_eq!(callback.current, 1);
        callback.on_start();
        callback.on_progress(100);
        callback.on_finish();
        assert_eq!(callback.current, 2);
        assert!(callback.bar.is_finished());
    }

    #[test]
    fn test_load_builtin_manifests() {
        let temp = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("Failed to create temp dir: {e}"),
        };
        let path = temp.path().join("builtin.json");
        if let Err(e) = std::fs::write(&path, r#"{"name":"builtin","version":"0.1.0"}"#) {
            panic!("write failed: {e}");
        }

        match load_builtin_manifests(&[path]) {
            Ok(manifests) => {
                assert_eq!(manifests.len(), 1);
                assert_eq!(manifests[0].name, "builtin");
            }
            Err(e) => panic!("load failed: {e}"),
        }
    }

    #[test]
    fn test_load_builtin_manifests_rejects_malformed() {
        let temp = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => panic!("Failed to create temp dir: {e}"),
        };
        let path = temp.path().join("bad.json");
        if let Err(e) = std::fs::write(&path, "not json") {
            panic!("write failed: {e}");
        }

        match load_builtin_manifests(&[path]) {
            Err(ModuleError::ManifestParse { .. }) => {}
            Err(e) => panic!("Expected ManifestParse, got: {e}"),
            Ok(_) => panic!("Should reject a malformed builtin manifest"),
        }
    }
}
