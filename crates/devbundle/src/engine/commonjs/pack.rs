//! Rendering of a collected module graph into one script.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Runtime that wires the module table together. Arguments: the module table
/// and the list of entry ids to execute in order.
const PRELUDE: &str = r#"(function (modules, entries) {
  var cache = {};
  function load(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    var def = modules[id];
    if (!def) {
      var err = new Error("Cannot find module '" + id + "'");
      err.code = "MODULE_NOT_FOUND";
      throw err;
    }
    var module = cache[id] = { exports: {} };
    def[0].call(module.exports, function (name) {
      var dep = def[1][name];
      return load(dep !== undefined ? dep : name);
    }, module, module.exports);
    return module.exports;
  }
  for (var i = 0; i < entries.length; i++) load(entries[i]);
  return load;
})"#;

const GLOBAL_SHIM: &str = "var global = typeof globalThis !== \"undefined\" ? globalThis : \
typeof self !== \"undefined\" ? self : typeof window !== \"undefined\" ? window : {};";

/// One module ready to be emitted.
#[derive(Debug, Clone)]
pub struct PackedModule {
    /// Position in discovery order
    pub index: usize,
    /// Resolved file path
    pub path: PathBuf,
    /// Transformed source
    pub source: String,
    /// Specifier → index of the module it resolved to
    pub deps: BTreeMap<String, usize>,
    /// Prepend the global shim
    pub insert_globals: bool,
}

/// Render modules into a self-executing bundle.
///
/// Module ids are `index + 1`, or root-relative paths when `debug` is set.
pub fn render(modules: &[PackedModule], entries: &[usize], base: &Path, debug: bool) -> String {
    let id_of = |index: usize| -> String {
        if debug {
            json_string(&display_path(&modules[index].path, base))
        } else {
            (index + 1).to_string()
        }
    };

    let mut out = String::with_capacity(
        PRELUDE.len() + modules.iter().map(|m| m.source.len() + 128).sum::<usize>(),
    );
    out.push_str(PRELUDE);
    out.push_str("({\n");

    for module in modules {
        let _ = writeln!(
            out,
            "{}: [function (require, module, exports) {{",
            id_of(module.index)
        );
        if module.insert_globals {
            let file = format!("/{}", display_path(&module.path, base));
            let dir = file
                .rfind('/')
                .map(|pos| if pos == 0 { "/" } else { &file[..pos] })
                .unwrap_or("/")
                .to_string();
            out.push_str(GLOBAL_SHIM);
            let _ = writeln!(
                out,
                " var __filename = {}, __dirname = {};",
                json_string(&file),
                json_string(&dir)
            );
        }
        out.push_str(&module.source);
        if !module.source.ends_with('\n') {
            out.push('\n');
        }

        let deps = module
            .deps
            .iter()
            .map(|(specifier, index)| format!("{}: {}", json_string(specifier), id_of(*index)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "}}, {{{deps}}}],");
    }

    let entry_ids = entries
        .iter()
        .map(|index| id_of(*index))
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "}}, [{entry_ids}]);");

    out
}

/// `path` relative to `base` with `/` separators, or the full path if outside.
fn display_path(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn json_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
