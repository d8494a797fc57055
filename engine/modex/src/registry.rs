//! The module registry.
//!
//! The registry holds its modules as an immutable snapshot behind a lock.
//! Adding or removing a module swaps in a new snapshot; bound expressions keep
//! whichever snapshot was current when they were created.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::define::ModuleDefinition;
use crate::errors::ModuleError;
use crate::expression::{BoundExpression, ModuleSnapshot};
use crate::module::RuntimeModule;
use crate::options::{ExpressionOptions, RegistryOptions};
use crate::sandbox::{core_env, CORE_ENV_MODULE_ID};

pub struct ModuleRegistry {
    options: RegistryOptions,
    /// Always first in every snapshot.
    core: Arc<RuntimeModule>,
    modules: RwLock<ModuleSnapshot>,
}

impl ModuleRegistry {
    pub fn new() -> Result<Self, ModuleError> {
        ModuleRegistry::with_options(RegistryOptions::default())
    }

    pub fn with_options(options: RegistryOptions) -> Result<Self, ModuleError> {
        let core = Arc::new(RuntimeModule::wrap(&core_env(&options.sandbox))?);
        let modules: ModuleSnapshot = Arc::from(vec![Arc::clone(&core)]);
        Ok(ModuleRegistry {
            options,
            core,
            modules: RwLock::new(modules),
        })
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Validate and add `definition`. On failure the registry is unchanged.
    #[tracing::instrument(level = "debug", skip_all, fields(module = definition.id()))]
    pub fn add_module(&self, definition: &ModuleDefinition) -> Result<&Self, ModuleError> {
        let module = Arc::new(RuntimeModule::wrap(definition)?);
        let mut modules = self.modules.write();
        if modules.iter().any(|existing| existing.id() == module.id()) {
            return Err(ModuleError::invalid(
                module.id(),
                "a module with this id is already registered",
            ));
        }
        let mut next = modules.to_vec();
        next.push(module);
        *modules = Arc::from(next);
        debug!(modules = modules.len(), "added module");
        Ok(self)
    }

    /// Remove the module registered as `id`. Expressions already bound keep
    /// seeing it.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn remove_module(&self, id: &str) -> Result<&Self, ModuleError> {
        if id == CORE_ENV_MODULE_ID {
            return Err(ModuleError::not_found(id));
        }
        let mut modules = self.modules.write();
        if !modules.iter().any(|module| module.id() == id) {
            return Err(ModuleError::not_found(id));
        }
        let next: Vec<_> = modules
            .iter()
            .filter(|module| module.id() != id)
            .cloned()
            .collect();
        *modules = Arc::from(next);
        debug!(modules = modules.len(), "removed module");
        Ok(self)
    }

    pub fn module(&self, id: &str) -> Option<Arc<RuntimeModule>> {
        self.modules
            .read()
            .iter()
            .find(|module| module.id() == id)
            .cloned()
    }

    /// Current snapshot, the core module first, then in registration order.
    pub fn modules(&self) -> ModuleSnapshot {
        Arc::clone(&self.modules.read())
    }

    /// The bundled core environment module.
    pub fn core(&self) -> &Arc<RuntimeModule> {
        &self.core
    }

    /// Bind `source` with the registry's default expression options.
    pub fn expression(&self, source: &str) -> Result<BoundExpression, ModuleError> {
        self.expression_with(source, &ExpressionOptions::default())
    }

    /// Bind `source`; unset fields of `options` fall back to the registry
    /// defaults.
    pub fn expression_with(
        &self,
        source: &str,
        options: &ExpressionOptions,
    ) -> Result<BoundExpression, ModuleError> {
        let options = options.merged_over(&self.options.default_expression_options);
        BoundExpression::bind(source, self.modules(), options)
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modules = self.modules();
        f.debug_struct("ModuleRegistry")
            .field(
                "modules",
                &modules.iter().map(|module| module.id()).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish()
    }
}
