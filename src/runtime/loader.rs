//! Interpreter bootstrap.
//!
//! This module is responsible for:
//! - Creating the Lua state with the standard libraries loaded.
//! - Registering the embedded `host` module.
//! - Applying the configured module search paths to `package.path`.
//!
//! It has no knowledge of tracing or debugging so it can be unit-tested on a
//! bare interpreter.

use crate::runtime::output::OutputSlot;
use crate::{DebuggerError, Result};
use mlua::{Lua, Table};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Chunk name used for submitted source when none is configured.
pub const DEFAULT_CHUNK_NAME: &str = "script";

/// Settings applied when the interpreter is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directories searched by `require`, ahead of the interpreter defaults.
    pub search_paths: Vec<PathBuf>,
    /// Name reported for submitted source in tracebacks and trace events.
    pub chunk_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            chunk_name: DEFAULT_CHUNK_NAME.to_string(),
        }
    }
}

/// A live interpreter and the host-side state attached to it.
pub(crate) struct Interpreter {
    pub(crate) lua: Lua,
    pub(crate) output: Arc<OutputSlot>,
    pub(crate) version: String,
    base_package_path: String,
}

impl Interpreter {
    /// Rewrite `package.path` as the search paths followed by the defaults.
    pub(crate) fn apply_search_paths(&self, paths: &[PathBuf]) -> Result<()> {
        let package: Table = self.lua.globals().get("package").map_err(lua_setup_error)?;
        package
            .set("path", compose_package_path(paths, &self.base_package_path))
            .map_err(lua_setup_error)?;
        Ok(())
    }
}

/// Create and configure a fresh interpreter.
#[tracing::instrument(skip_all)]
pub(crate) fn bootstrap(config: &RuntimeConfig) -> Result<Interpreter> {
    info!("Initializing Lua interpreter");

    let lua = Lua::new();
    let version = lua
        .globals()
        .get::<String>("_VERSION")
        .unwrap_or_else(|_| "Unknown".to_string());

    let package: Table = lua.globals().get("package").map_err(lua_setup_error)?;
    let base_package_path: String = package.get("path").map_err(lua_setup_error)?;

    register_host_module(&lua).map_err(lua_setup_error)?;

    let interpreter = Interpreter {
        lua,
        output: Arc::new(OutputSlot::default()),
        version,
        base_package_path,
    };
    interpreter.apply_search_paths(&config.search_paths)?;

    debug!(version = %interpreter.version, "Interpreter ready");
    Ok(interpreter)
}

/// `require("host")`: a small native module exposed to scripts.
fn register_host_module(lua: &Lua) -> mlua::Result<()> {
    let loader = lua.create_function(|lua, _: mlua::MultiValue| {
        let module = lua.create_table()?;
        module.set(
            "version",
            lua.create_function(|_, ()| Ok(env!("CARGO_PKG_VERSION")))?,
        )?;
        module.set(
            "echo",
            lua.create_function(|_, input: String| {
                let processed = format!("Processed by host: {}", input);
                Ok((input.len(), processed))
            })?,
        )?;
        Ok(module)
    })?;

    let package: Table = lua.globals().get("package")?;
    let preload: Table = package.get("preload")?;
    preload.set("host", loader)
}

fn compose_package_path(paths: &[PathBuf], base: &str) -> String {
    let mut entries: Vec<String> = Vec::with_capacity(paths.len() * 2 + 1);
    for dir in paths {
        let dir = dir.display();
        entries.push(format!("{}/?.lua", dir));
        entries.push(format!("{}/?/init.lua", dir));
    }
    if !base.is_empty() {
        entries.push(base.to_string());
    }
    entries.join(";")
}

fn lua_setup_error(err: mlua::Error) -> anyhow::Error {
    DebuggerError::ExecutionFault(format!("Failed to set up interpreter: {}", err)).into()
}
