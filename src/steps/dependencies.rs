//! Toolchain installation
//!
//! Installs the language toolchains and the agent CLI. Everything here is a
//! global install, so the step always re-runs (each install is individually
//! skipped when the tool is already present) and nothing is rolled back.

use std::fs;
use std::path::Path;

use serde_json::{json, Map, Value};

use crate::context::InstallContext;
use crate::errors::InstallError;
use crate::pipeline::Step;
use crate::platform;
use crate::runner;
use crate::ui::Console;

const NODE_VERSION: &str = "22";
const AGENT_PACKAGE: &str = "@codekit/agent-cli";
const DEFAULT_AGENT_VERSION: &str = "latest";

const NVM_INSTALL: &str =
    "curl -fsSL https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.1/install.sh | bash";
const UV_INSTALL: &str = "curl -fsSL https://astral.sh/uv/install.sh | sh";

/// Load the nvm environment and run `command` inside it.
fn nvm_bash(command: &str) -> String {
    format!(
        "export NVM_DIR=\"$HOME/.nvm\"; [ -s \"$NVM_DIR/nvm.sh\" ] && . \"$NVM_DIR/nvm.sh\"; {command}"
    )
}

/// Agent CLI version pin, read from the env section of the local settings.
/// Absent or unreadable settings fall back to the latest release.
fn agent_version(ctx: &InstallContext) -> String {
    let settings = ctx.project_dir.join(".codekit/settings.local.json");
    fs::read_to_string(&settings)
        .ok()
        .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
        .and_then(|v| {
            v.pointer("/env/FORCE_AGENT_VERSION")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_AGENT_VERSION.to_string())
}

/// Merge `defaults` into the user-level agent config at `path`, creating it
/// if needed. Existing keys always win.
fn patch_agent_config(path: &Path, defaults: &Value) -> Result<(), InstallError> {
    let mut config: Value = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
            InstallError::Config(format!("{} is not valid JSON: {err}", path.display()))
        })?,
        Err(_) => Value::Object(Map::new()),
    };

    if let (Some(config_obj), Some(default_obj)) =
        (config.as_object_mut(), defaults.as_object())
    {
        for (key, value) in default_obj {
            config_obj.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    write_agent_config(path, &config)
}

/// Merge MCP server entries into the user-level agent config, creating the
/// `mcpServers` map if needed. Servers the user already defined keep their
/// definitions; only new names are added.
fn patch_agent_servers(path: &Path, servers: &Value) -> Result<(), InstallError> {
    let mut config: Value = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
            InstallError::Config(format!("{} is not valid JSON: {err}", path.display()))
        })?,
        Err(_) => Value::Object(Map::new()),
    };

    if let (Some(config_obj), Some(new_servers)) = (config.as_object_mut(), servers.as_object()) {
        let existing = config_obj
            .entry("mcpServers".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(existing) = existing.as_object_mut() {
            for (name, definition) in new_servers {
                existing
                    .entry(name.clone())
                    .or_insert_with(|| definition.clone());
            }
        }
    }

    write_agent_config(path, &config)
}

fn write_agent_config(path: &Path, config: &Value) -> Result<(), InstallError> {
    let mut content = serde_json::to_string_pretty(config)
        .map_err(|err| InstallError::Config(err.to_string()))?;
    content.push('\n');
    fs::write(path, content)
        .map_err(|err| InstallError::Config(format!("could not write {}: {err}", path.display())))
}

pub struct DependenciesStep;

impl DependenciesStep {
    fn install_node(&self, ui: Option<&Console>, installed: &mut Vec<String>) {
        if platform::command_exists("node") {
            return;
        }
        if let Some(ui) = ui {
            ui.status("Installing Node.js via nvm...");
        }
        let ok = runner::bash_with_retry(NVM_INSTALL, None)
            && runner::bash_with_retry(&nvm_bash(&format!("nvm install {NODE_VERSION}")), None);
        if ok {
            installed.push("node".to_string());
        } else if let Some(ui) = ui {
            ui.warning("Could not install Node.js; install it manually and re-run");
        }
    }

    fn install_python_tools(&self, ui: Option<&Console>, installed: &mut Vec<String>) {
        if !platform::command_exists("uv") {
            if let Some(ui) = ui {
                ui.status("Installing uv...");
            }
            if runner::bash_with_retry(UV_INSTALL, None) {
                installed.push("uv".to_string());
            } else {
                if let Some(ui) = ui {
                    ui.warning("Could not install uv; skipping Python tooling");
                }
                return;
            }
        }

        for tool in ["ruff", "basedpyright"] {
            if platform::command_exists(tool) {
                continue;
            }
            if runner::bash_with_retry(&format!("uv tool install {tool}"), None) {
                installed.push(tool.to_string());
            } else if let Some(ui) = ui {
                ui.warning(&format!("Could not install {tool}"));
            }
        }
    }

    fn install_agent_cli(
        &self,
        ctx: &InstallContext,
        ui: Option<&Console>,
        installed: &mut Vec<String>,
    ) -> Result<(), InstallError> {
        let version = agent_version(ctx);
        if let Some(ui) = ui {
            ui.status(&format!("Installing agent CLI ({version})..."));
        }

        let command = nvm_bash(&format!("npm install -g {AGENT_PACKAGE}@{version}"));
        if !runner::bash_with_retry(&command, None) {
            return Err(InstallError::fatal(
                "could not install the agent CLI; check your network and npm setup",
            ));
        }
        installed.push(format!("{AGENT_PACKAGE}@{version}"));

        // Config patching is a convenience; a pre-existing broken config must
        // not take down the install.
        if let Err(err) = patch_agent_config(
            &ctx.home_dir.join(".codekit.json"),
            &json!({
                "autoUpdates": false,
                "telemetry": false
            }),
        ) {
            log::warn!("could not patch agent config: {}", err);
            if let Some(ui) = ui {
                ui.warning(&format!("Could not update ~/.codekit.json: {err}"));
            }
        }
        Ok(())
    }

    fn install_language_servers(
        &self,
        ctx: &InstallContext,
        ui: Option<&Console>,
        installed: &mut Vec<String>,
    ) {
        if ctx.install_typescript && !platform::command_exists("typescript-language-server") {
            let command = nvm_bash("npm install -g typescript typescript-language-server");
            if runner::bash_with_retry(&command, None) {
                installed.push("typescript-language-server".to_string());
            } else if let Some(ui) = ui {
                ui.warning("Could not install the TypeScript language server");
            }
        }

        if ctx.install_go && !platform::command_exists("gopls") {
            if platform::command_exists("go") {
                if runner::bash_with_retry("go install golang.org/x/tools/gopls@latest", None) {
                    installed.push("gopls".to_string());
                } else if let Some(ui) = ui {
                    ui.warning("Could not install gopls");
                }
            } else if let Some(ui) = ui {
                ui.warning("go not found; skipping gopls");
            }
        }
    }

    fn register_plugins(&self, ui: Option<&Console>) {
        let commands = [
            "ck marketplace add codekit-dev/codekit-plugins",
            "ck plugin install codekit-essentials",
        ];
        for command in commands {
            if !runner::bash_with_retry(&nvm_bash(command), None) {
                if let Some(ui) = ui {
                    ui.warning(&format!("Could not run `{command}`"));
                }
            }
        }
    }

    fn merge_web_mcp_servers(&self, ctx: &InstallContext, ui: Option<&Console>) {
        let result = patch_agent_servers(
            &ctx.home_dir.join(".codekit.json"),
            &json!({
                "web-search": {"type": "http", "url": "https://mcp.codekit.dev/search"},
                "web-fetch": {"type": "http", "url": "https://mcp.codekit.dev/fetch"}
            }),
        );
        if let Err(err) = result {
            log::warn!("could not merge web MCP servers: {}", err);
            if let Some(ui) = ui {
                ui.warning(&format!("Could not register web MCP servers: {err}"));
            }
        }
    }
}

impl Step for DependenciesStep {
    fn name(&self) -> &'static str {
        "dependencies"
    }

    // Always runs: each install below is individually skipped when the tool
    // is already present, and presence can change between runs.

    fn run(&self, ctx: &mut InstallContext) -> Result<(), InstallError> {
        let ui = ctx.ui.clone();
        let mut installed: Vec<String> = Vec::new();

        self.install_node(ui.as_ref(), &mut installed);
        if ctx.install_python {
            self.install_python_tools(ui.as_ref(), &mut installed);
        }
        self.install_agent_cli(ctx, ui.as_ref(), &mut installed)?;
        self.install_language_servers(ctx, ui.as_ref(), &mut installed);
        self.register_plugins(ui.as_ref());
        self.merge_web_mcp_servers(ctx, ui.as_ref());

        if let Some(ui) = &ui {
            if installed.is_empty() {
                ui.info("All dependencies already present");
            } else {
                ui.success(&format!("Installed: {}", installed.join(", ")));
            }
        }
        ctx.config
            .insert("installed_dependencies".into(), json!(installed));
        Ok(())
    }

    // No rollback: uninstalling global toolchains would be more disruptive
    // than leaving them in place.
}
