//! Definition validation, run when a module is added to a registry.

use rustc_hash::FxHashSet;

use modex_host::Signature;

use crate::define::ModuleDefinition;
use crate::errors::ModuleError;

/// Module ids: `[A-Za-z0-9_:]+`.
pub fn is_valid_module_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Export names: `[A-Za-z0-9_]+`.
pub fn is_valid_export_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check that `definition` can be wrapped into a runtime module.
pub fn validate(definition: &ModuleDefinition) -> Result<(), ModuleError> {
    let id = definition.id();
    if !is_valid_module_id(id) {
        return Err(ModuleError::invalid(
            id,
            "module id must be non-empty and contain only `A-Z a-z 0-9 _ :`",
        ));
    }

    let mut seen = FxHashSet::default();
    for export in definition.exports().iter() {
        if !is_valid_export_name(&export.name) {
            return Err(ModuleError::invalid(
                id,
                format!(
                    "export name `{}` must be non-empty and contain only `A-Z a-z 0-9 _`",
                    export.name
                ),
            ));
        }
        if !seen.insert(export.name.as_str()) {
            return Err(ModuleError::invalid(
                id,
                format!("export `{}` is declared more than once", export.name),
            ));
        }
        if let Some(signature) = &export.signature {
            Signature::parse(signature).map_err(|err| {
                ModuleError::invalid(id, format!("export `{}`: {err}", export.name))
            })?;
        }
    }
    Ok(())
}
