//! Lua sandbox creation
//!
//! Definitions are evaluated with only the table, string and math libraries.
//! There is no I/O, no `os`, and no way to load external code, so evaluating
//! a definition cannot touch the machine running the pipeline.

use mlua::{Lua, LuaOptions, Result as LuaResult, StdLib, Table, Value, Variadic};

/// Create a restricted Lua sandbox for evaluating pipeline definitions
///
/// The `pipeline` helper module is always registered.
///
/// # Example
/// ```no_run
/// use shipyard_lua::sandbox::create_sandbox;
///
/// let lua = create_sandbox()?;
/// let definition: mlua::Table = lua
///     .load(r#"return pipeline.define { name = "packages" }"#)
///     .eval()?;
/// let name: String = definition.get("name")?;
/// assert_eq!(name, "packages");
/// # Ok::<(), mlua::Error>(())
/// ```
pub fn create_sandbox() -> LuaResult<Lua> {
    let lua = Lua::new_with(
        StdLib::TABLE | StdLib::STRING | StdLib::MATH,
        LuaOptions::default(),
    )?;

    // Remove code-loading globals from the base library
    for name in ["require", "dofile", "loadfile", "load", "collectgarbage"] {
        lua.globals().set(name, mlua::Nil)?;
    }

    register_pipeline_module(&lua)?;

    Ok(lua)
}

/// Register the `pipeline` helper module
///
/// - `pipeline.define(tbl)` returns the definition table as-is
/// - `pipeline.target(id, opts)` builds a target entry
/// - `pipeline.phase(name, command, opts)` builds a phase entry
fn register_pipeline_module(lua: &Lua) -> LuaResult<()> {
    let pipeline = lua.create_table()?;

    let define_fn = lua.create_function(|_, definition: Table| Ok(definition))?;
    pipeline.set("define", define_fn)?;

    let target_fn = lua.create_function(|lua, (id, opts): (String, Option<Table>)| {
        let target = copy_table(lua, opts)?;
        target.set("id", id)?;
        Ok(target)
    })?;
    pipeline.set("target", target_fn)?;

    let phase_fn = lua.create_function(
        |lua, (name, command, opts): (String, Value, Option<Table>)| {
            let phase = copy_table(lua, opts)?;
            phase.set("name", name)?;
            phase.set("command", command)?;
            Ok(phase)
        },
    )?;
    pipeline.set("phase", phase_fn)?;

    // pipeline.targets("wheezy", "jessie", ...) - shorthand for plain targets
    let targets_fn = lua.create_function(|lua, ids: Variadic<String>| {
        let list = lua.create_table()?;
        for (idx, id) in ids.into_iter().enumerate() {
            let target = lua.create_table()?;
            target.set("id", id)?;
            list.set(idx + 1, target)?;
        }
        Ok(list)
    })?;
    pipeline.set("targets", targets_fn)?;

    lua.globals().set("pipeline", pipeline)?;

    Ok(())
}

/// Shallow copy of an optional options table
fn copy_table(lua: &Lua, source: Option<Table>) -> LuaResult<Table> {
    let copy = lua.create_table()?;
    if let Some(source) = source {
        for pair in source.pairs::<Value, Value>() {
            let (key, value) = pair?;
            copy.set(key, value)?;
        }
    }
    Ok(copy)
}
