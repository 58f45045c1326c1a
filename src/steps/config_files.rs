//! Project configuration files
//!
//! Renders the machine-local settings file from its repository template,
//! pins the Node version, and merges MCP server definitions without
//! clobbering servers the user already configured.

use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::context::InstallContext;
use crate::downloads::{self, DownloadConfig};
use crate::errors::InstallError;
use crate::pipeline::Step;

const SETTINGS_TEMPLATE: &str = ".codekit/settings.local.json.template";
const SETTINGS_FILE: &str = ".codekit/settings.local.json";
const MCP_TEMPLATE: &str = ".mcp.json.template";
const MCP_FILE: &str = ".mcp.json";
const NODE_VERSION: &str = "22";

fn read_json(path: &Path) -> Result<Value, InstallError> {
    let content = fs::read_to_string(path)
        .map_err(|err| InstallError::Config(format!("could not read {}: {err}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|err| InstallError::Config(format!("{} is not valid JSON: {err}", path.display())))
}

fn write_json(path: &Path, value: &Value) -> Result<(), InstallError> {
    let mut content = serde_json::to_string_pretty(value)
        .map_err(|err| InstallError::Config(err.to_string()))?;
    content.push('\n');
    fs::write(path, content)
        .map_err(|err| InstallError::Config(format!("could not write {}: {err}", path.display())))
}

/// Drop hook and permission entries that reference Python tooling.
fn strip_python_entries(settings: &mut Value) {
    let is_python = |v: &Value| {
        v.as_str().is_some_and(|s| {
            s.contains("python") || s.contains("ruff") || s.contains("basedpyright") || s.contains("uv ")
        })
    };

    if let Some(hooks) = settings.get_mut("hooks").and_then(Value::as_object_mut) {
        for entries in hooks.values_mut() {
            if let Some(list) = entries.as_array_mut() {
                list.retain(|entry| {
                    !entry
                        .get("hooks")
                        .and_then(Value::as_array)
                        .is_some_and(|inner| {
                            inner
                                .iter()
                                .any(|h| h.get("command").is_some_and(is_python))
                        })
                });
            }
        }
    }

    if let Some(allow) = settings
        .pointer_mut("/permissions/allow")
        .and_then(Value::as_array_mut)
    {
        allow.retain(|entry| !is_python(entry));
    }
}

/// Merge template MCP servers into an existing config. Servers the user
/// already has keep their definitions; only new names are added.
fn merge_mcp_config(existing: &mut Value, template: &Value) {
    let Some(template_servers) = template.get("mcpServers").and_then(Value::as_object) else {
        return;
    };
    if !existing.is_object() {
        *existing = json!({});
    }
    let servers = existing
        .as_object_mut()
        .and_then(|obj| {
            obj.entry("mcpServers")
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
        });
    if let Some(servers) = servers {
        for (name, definition) in template_servers {
            servers
                .entry(name.clone())
                .or_insert_with(|| definition.clone());
        }
    }
}

pub struct ConfigFilesStep;

impl ConfigFilesStep {
    fn render_settings(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let config = DownloadConfig::for_context(ctx);
        let template_dest = ctx.project_dir.join(SETTINGS_TEMPLATE);
        if !downloads::download_file(SETTINGS_TEMPLATE, &template_dest, &config) {
            return Err(InstallError::download(
                "could not fetch the settings template",
                Some(format!("{}/{}", config.repo_url, SETTINGS_TEMPLATE)),
            ));
        }

        let raw = fs::read_to_string(&template_dest).map_err(|err| {
            InstallError::Config(format!("could not read {}: {err}", template_dest.display()))
        })?;
        let rendered =
            raw.replace("{{PROJECT_DIR}}", &ctx.project_dir.to_string_lossy());

        let mut settings: Value = serde_json::from_str(&rendered).map_err(|err| {
            InstallError::Config(format!("settings template is not valid JSON: {err}"))
        })?;
        if !ctx.install_python {
            strip_python_entries(&mut settings);
        }

        write_json(&ctx.project_dir.join(SETTINGS_FILE), &settings)?;
        let _ = fs::remove_file(&template_dest);
        ctx.config.insert("settings_written".into(), json!(true));
        Ok(())
    }

    fn write_nvmrc(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        let nvmrc = ctx.project_dir.join(".nvmrc");
        if nvmrc.exists() {
            return Ok(());
        }
        fs::write(&nvmrc, format!("{NODE_VERSION}\n"))
            .map_err(|err| InstallError::Config(format!("could not write .nvmrc: {err}")))
    }

    fn merge_mcp(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        let config = DownloadConfig::for_context(ctx);
        let template_dest = ctx.project_dir.join(MCP_TEMPLATE);
        if !downloads::download_file(MCP_TEMPLATE, &template_dest, &config) {
            // Not every payload revision ships MCP servers.
            return Ok(());
        }
        let template = read_json(&template_dest)?;
        let _ = fs::remove_file(&template_dest);

        let mcp_path = ctx.project_dir.join(MCP_FILE);
        let mut existing = if mcp_path.exists() {
            read_json(&mcp_path)?
        } else {
            json!({})
        };
        merge_mcp_config(&mut existing, &template);
        write_json(&mcp_path, &existing)
    }
}

impl Step for ConfigFilesStep {
    fn name(&self) -> &'static str {
        "config_files"
    }

    fn check(&self, ctx: &InstallContext) -> bool {
        ctx.project_dir.join(SETTINGS_FILE).exists()
    }

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();

        self.render_settings(ctx)?;
        self.write_nvmrc(ctx)?;
        self.merge_mcp(ctx)?;

        if let Some(ui) = &ui {
            ui.success("Configuration files written");
        }
        Ok(())
    }

    fn rollback(&self, ctx: &InstallContext) -> Result<(), InstallError> {
        if !ctx.config_flag("settings_written") {
            return Ok(());
        }
        let settings = ctx.project_dir.join(SETTINGS_FILE);
        if settings.exists() {
            fs::remove_file(&settings)
                .map_err(|err| InstallError::Recoverable(err.to_string()))?;
        }
        Ok(())
    }
}
