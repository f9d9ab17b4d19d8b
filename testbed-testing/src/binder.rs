// Binds test overrides into the application container at boot

use crate::dependency::DependencyInfo;
use crate::double::MockInstance;
use crate::import::ImportedComponent;
use crate::mock::MockDefinition;
use crate::{FixtureError, Result};
use std::collections::HashSet;
use testbed_core::{
    Configuration, Container, Environment, RANK_MAX, ServiceListener, TypeDescriptor, TypeKey,
    async_trait,
};
use tracing::{debug, info};

/// Snapshot of every override registry, bound once after the application
/// has run.
///
/// Order is fixed: mocks, then dependencies, then imports, all at
/// [`RANK_MAX`] so they shadow the application's own bindings.
pub struct TestServiceListener {
    mocks: Vec<(MockDefinition, MockInstance)>,
    dependencies: Vec<DependencyInfo>,
    imports: Vec<ImportedComponent>,
}

impl TestServiceListener {
    pub fn new(
        mocks: Vec<(MockDefinition, MockInstance)>,
        dependencies: Vec<DependencyInfo>,
        imports: Vec<ImportedComponent>,
    ) -> Self {
        Self {
            mocks,
            dependencies,
            imports,
        }
    }

    /// Reject two registrations with the same key and name in one registry.
    pub fn validate(&self) -> Result<()> {
        check_unique(
            "mock",
            self.mocks.iter().map(|(d, _)| (d.key(), d.name())),
        )?;
        check_unique(
            "dependency",
            self.dependencies.iter().map(|d| (d.key(), d.name())),
        )?;
        check_unique(
            "import",
            self.imports
                .iter()
                .map(|i| (i.definition().key(), i.name())),
        )
    }

    fn bind_all(&self, container: &Container) -> testbed_core::Result<()> {
        for (definition, instance) in &self.mocks {
            container
                .bind(instance.bean().clone())
                .to(definition.key().clone())
                .named(definition.name())
                .ranked(RANK_MAX)
                .register()?;
        }

        for dependency in &self.dependencies {
            container
                .bind(dependency.bean().clone())
                .to(dependency.key().clone())
                .named(dependency.name())
                .ranked(RANK_MAX)
                .register()?;
        }

        for import in &self.imports {
            let definition = import.definition();
            let descriptor = definition
                .contracts()
                .iter()
                .cloned()
                .fold(TypeDescriptor::new(definition.key().clone()), TypeDescriptor::implements);
            container.catalog().describe(descriptor);

            container
                .bind_factory(definition.factory().clone())
                .to(definition.key().clone())
                .to_all(definition.contracts().iter().cloned())
                .named(import.name())
                .ranked(RANK_MAX)
                .register()?;
            debug!(
                component = %definition.key(),
                contracts = ?definition.contracts(),
                name = ?import.name(),
                "Imported component bound"
            );
        }

        info!(
            mocks = self.mocks.len(),
            dependencies = self.dependencies.len(),
            imports = self.imports.len(),
            "Test bindings installed"
        );
        Ok(())
    }
}

#[async_trait]
impl ServiceListener for TestServiceListener {
    async fn on_run(
        &self,
        _configuration: &Configuration,
        environment: &mut Environment,
    ) -> testbed_core::Result<()> {
        self.bind_all(environment.container())
    }
}

fn check_unique<'a>(
    registry: &str,
    keys: impl Iterator<Item = (&'a TypeKey, Option<&'a str>)>,
) -> Result<()> {
    let mut seen = HashSet::new();
    for (key, name) in keys {
        let name = name.filter(|n| !n.trim().is_empty());
        if !seen.insert((key, name)) {
            return Err(FixtureError::Configuration(format!(
                "duplicate {} registration for {}{}",
                registry,
                key,
                name.map(|n| format!(" named '{}'", n)).unwrap_or_default()
            )));
        }
    }
    Ok(())
}
