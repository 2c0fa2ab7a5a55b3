//! Redirection of the interpreter's standard streams.
//!
//! `print`, `io.write`, `io.stdout:write` and `io.stderr:write` are replaced by
//! host functions that hand every write to the current [`OutputCallback`]
//! synchronously, before the script can perform its next write. There is no
//! buffering layer in between, so emission order is exactly program order.

use mlua::{Function, Lua, MultiValue, Table, Value};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Receives each chunk of text the script writes.
pub type OutputCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// The slot the installed stream functions write through.
#[derive(Default)]
pub(crate) struct OutputSlot {
    callback: Mutex<Option<OutputCallback>>,
}

impl OutputSlot {
    pub(crate) fn set(&self, callback: OutputCallback) {
        *self.lock() = Some(callback);
    }

    pub(crate) fn clear(&self) {
        *self.lock() = None;
    }

    pub(crate) fn write(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        // Clone out of the lock so a callback may itself touch the slot.
        let callback = self.lock().clone();
        match callback {
            Some(callback) => callback(text),
            None => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(text.as_bytes());
                let _ = stdout.flush();
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<OutputCallback>> {
        self.callback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Install the stream replacements into `lua`'s globals.
pub(crate) fn install(lua: &Lua, slot: &Arc<OutputSlot>) -> mlua::Result<()> {
    let globals = lua.globals();

    let print_slot = Arc::clone(slot);
    let print = lua.create_function(move |lua, args: MultiValue| {
        let text = stringify(lua, args, "\t")?;
        print_slot.write(&text);
        print_slot.write("\n");
        Ok(())
    })?;
    globals.set("print", print)?;

    let io: Table = globals.get("io")?;
    let stdout = stream(lua, slot)?;
    io.set("write", writer(lua, slot, Some(stdout.clone()))?)?;
    io.set("stdout", stdout)?;
    io.set("stderr", stream(lua, slot)?)?;
    Ok(())
}

/// A file-like table whose `write` method forwards to the slot.
fn stream(lua: &Lua, slot: &Arc<OutputSlot>) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("write", writer(lua, slot, None)?)?;
    table.set("flush", lua.create_function(|_, _: MultiValue| Ok(()))?)?;
    table.set("close", lua.create_function(|_, _: MultiValue| Ok(()))?)?;
    Ok(table)
}

/// Both forms return a file for chaining: `io.write` returns `target`
/// (`io.stdout`), and the method form (`target == None`) returns its receiver.
fn writer(lua: &Lua, slot: &Arc<OutputSlot>, target: Option<Table>) -> mlua::Result<Function> {
    let slot = Arc::clone(slot);
    lua.create_function(move |lua, mut args: MultiValue| {
        let receiver = match &target {
            Some(file) => Value::Table(file.clone()),
            None => args.pop_front().unwrap_or(Value::Nil),
        };
        let text = stringify(lua, args, "")?;
        slot.write(&text);
        Ok(receiver)
    })
}

fn stringify(lua: &Lua, args: MultiValue, separator: &str) -> mlua::Result<String> {
    let tostring: Function = lua.globals().get("tostring")?;
    let parts = args
        .into_iter()
        .map(|value| tostring.call::<String>(value))
        .collect::<mlua::Result<Vec<_>>>()?;
    Ok(parts.join(separator))
}
