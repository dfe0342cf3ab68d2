use crate::config::types::{Result, TestboxError};
use std::collections::HashMap;
use std::path::Path;

/// Maps script file extensions to the interpreter that runs them.
///
/// `solution.py` becomes `python3 solution.py`; binaries pass through
/// untouched. The table is configuration, not code, so any script type can
/// be wired up from the settings file.
#[derive(Debug, Clone, Default)]
pub struct InterpreterRegistry {
    by_extension: HashMap<String, Vec<String>>,
}

impl InterpreterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: &HashMap<String, Vec<String>>) -> Self {
        let mut registry = Self::new();
        for (extension, prefix) in map {
            registry.register(extension, prefix.clone());
        }
        registry
    }

    pub fn register(&mut self, extension: &str, prefix: Vec<String>) {
        let key = extension.trim_start_matches('.').to_ascii_lowercase();
        if prefix.is_empty() {
            self.by_extension.remove(&key);
        } else {
            self.by_extension.insert(key, prefix);
        }
    }

    pub fn interpreter_for(&self, target: &str) -> Option<&[String]> {
        let extension = file_extension(target)?;
        self.by_extension.get(&extension).map(Vec::as_slice)
    }

    /// Effective command line for `command`.
    pub fn resolve(&self, command: &[String]) -> Result<Vec<String>> {
        let target = command
            .first()
            .ok_or_else(|| TestboxError::Config("empty command".to_string()))?;

        match self.interpreter_for(target) {
            Some(prefix) => Ok(prefix.iter().chain(command).cloned().collect()),
            None => Ok(command.to_vec()),
        }
    }
}

/// Lowercased extension without the dot.
pub fn file_extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn script_is_wrapped_in_interpreter() {
        let mut registry = InterpreterRegistry::new();
        registry.register("py", cmd(&["python3", "-u"]));

        let resolved = registry.resolve(&cmd(&["sol.PY", "--fast"])).unwrap();
        assert_eq!(resolved, cmd(&["python3", "-u", "sol.PY", "--fast"]));
    }

    #[test]
    fn binaries_pass_through() {
        let mut registry = InterpreterRegistry::new();
        registry.register(".py", cmd(&["python3"]));

        let resolved = registry.resolve(&cmd(&["./sol"])).unwrap();
        assert_eq!(resolved, cmd(&["./sol"]));
    }

    #[test]
    fn empty_prefix_unregisters() {
        let mut registry = InterpreterRegistry::new();
        registry.register("rb", cmd(&["ruby"]));
        registry.register("rb", Vec::new());
        assert!(registry.interpreter_for("x.rb").is_none());
    }

    #[test]
    fn empty_command_is_rejected() {
        let registry = InterpreterRegistry::new();
        assert!(registry.resolve(&[]).is_err());
    }
}
