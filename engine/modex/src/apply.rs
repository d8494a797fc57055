//! Registering a definition directly on a compiled expression.

use modex_host::Expression;

use crate::define::ModuleDefinition;
use crate::errors::ModuleError;

/// Register every export of `definition` on `expression` under its bare name.
///
/// No registry, no namespacing and no lifecycle hooks: this is the lowest
/// level way to use a module's functions. Signatures are still checked on
/// every call.
pub fn apply_to_expression(
    definition: &ModuleDefinition,
    expression: &Expression,
) -> Result<(), ModuleError> {
    for export in definition.exports().iter() {
        expression
            .register_function(
                &export.name,
                export.implementation.clone(),
                export.signature.as_deref(),
            )
            .map_err(|err| {
                ModuleError::invalid(definition.id(), format!("export `{}`: {err}", export.name))
            })?;
    }
    Ok(())
}
