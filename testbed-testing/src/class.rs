//! Declarative description of a test class.
//!
//! A [`TestClass`] carries the declarations a test class makes about its
//! fixture: the application to boot ([`AppTest`]), extra properties, mocks,
//! imports, and the fields of the test instance. Declarations are collected
//! across the class hierarchy (superclass and interfaces, breadth first).

use crate::double::MockSpec;
use crate::import::ComponentDefinition;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use testbed_core::{AppFactory, Application, Bean, TypeKey, inheritance_closure};

/// Identity of a test class. Nested classes get a distinct id derived from
/// their enclosing class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TestClassId(String);

impl TestClassId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the booted server binds the configured port or an ephemeral one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WebEnvironment {
    #[default]
    Default,
    RandomPort,
}

/// Declares the application booted for a test class.
#[derive(Clone)]
pub struct AppTest {
    factory: AppFactory,
    config_file: String,
    use_resource_file_path: bool,
    properties: Vec<String>,
    web_environment: WebEnvironment,
}

impl AppTest {
    pub fn new<A, F>(factory: F, config_file: impl Into<String>) -> Self
    where
        A: Application,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let factory: AppFactory =
            Arc::new(move || -> Box<dyn Application> { Box::new(factory()) });
        Self::from_factory(factory, config_file)
    }

    pub fn of<A: Application + Default>(config_file: impl Into<String>) -> Self {
        Self::new(A::default, config_file)
    }

    pub fn from_factory(factory: AppFactory, config_file: impl Into<String>) -> Self {
        Self {
            factory,
            config_file: config_file.into(),
            use_resource_file_path: false,
            properties: Vec::new(),
            web_environment: WebEnvironment::Default,
        }
    }

    /// Resolve `config_file` against `tests/resources` of the crate under test.
    pub fn use_resource_file_path(mut self, enabled: bool) -> Self {
        self.use_resource_file_path = enabled;
        self
    }

    /// Add `key=value` property tokens.
    pub fn properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn web_environment(mut self, web_environment: WebEnvironment) -> Self {
        self.web_environment = web_environment;
        self
    }

    pub fn factory(&self) -> &AppFactory {
        &self.factory
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    pub fn uses_resource_file_path(&self) -> bool {
        self.use_resource_file_path
    }

    pub fn property_tokens(&self) -> &[String] {
        &self.properties
    }

    pub fn web_env(&self) -> WebEnvironment {
        self.web_environment
    }
}

impl fmt::Debug for AppTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppTest")
            .field("config_file", &self.config_file)
            .field("use_resource_file_path", &self.use_resource_file_path)
            .field("properties", &self.properties)
            .field("web_environment", &self.web_environment)
            .finish()
    }
}

/// Class-level mock declaration.
#[derive(Debug, Clone)]
pub struct MockBean {
    types: Vec<MockSpec>,
    name: Option<String>,
}

impl MockBean {
    pub fn of(spec: MockSpec) -> Self {
        Self::types([spec])
    }

    pub fn types(types: impl IntoIterator<Item = MockSpec>) -> Self {
        Self {
            types: types.into_iter().collect(),
            name: None,
        }
    }

    /// Binding name; honored only when exactly one type is declared.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mock_types(&self) -> &[MockSpec] {
        &self.types
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Import of concrete components into the application's container.
#[derive(Debug, Clone)]
pub struct Import {
    components: Vec<ComponentDefinition>,
    name: Option<String>,
}

impl Import {
    pub fn of(component: ComponentDefinition) -> Self {
        Self::all([component])
    }

    pub fn all(components: impl IntoIterator<Item = ComponentDefinition>) -> Self {
        Self {
            components: components.into_iter().collect(),
            name: None,
        }
    }

    /// Binding name; ignored when more than one component is declared.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn components(&self) -> &[ComponentDefinition] {
        &self.components
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Whether a field is filled at construction (final) or may be filled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    Final,
    Mutable,
}

/// A field of the test instance.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    key: TypeKey,
    bean_name: Option<String>,
    mutability: Mutability,
    mock: Option<MockBean>,
    preset: Option<Bean>,
}

impl Field {
    /// Field injected through the constructor.
    pub fn final_field(name: impl Into<String>, key: TypeKey) -> Self {
        Self::new(name, key, Mutability::Final)
    }

    /// Field that may be filled after construction.
    pub fn mutable(name: impl Into<String>, key: TypeKey) -> Self {
        Self::new(name, key, Mutability::Mutable)
    }

    fn new(name: impl Into<String>, key: TypeKey, mutability: Mutability) -> Self {
        Self {
            name: name.into(),
            key,
            bean_name: None,
            mutability,
            mock: None,
            preset: None,
        }
    }

    /// Qualifier used when resolving the field from the container.
    pub fn named(mut self, bean_name: impl Into<String>) -> Self {
        self.bean_name = Some(bean_name.into());
        self
    }

    /// Declare the field as a mock of its own type.
    pub fn mock(mut self, spec: MockSpec) -> Self {
        self.mock = Some(MockBean::of(spec));
        self
    }

    pub fn mock_named(mut self, spec: MockSpec, name: impl Into<String>) -> Self {
        self.mock = Some(MockBean::of(spec).named(name));
        self
    }

    /// Value the test sets explicitly; never overwritten by injection.
    pub fn preset(mut self, value: Bean) -> Self {
        self.preset = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn bean_name(&self) -> Option<&str> {
        self.bean_name.as_deref()
    }

    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    pub fn mock_declaration(&self) -> Option<&MockBean> {
        self.mock.as_ref()
    }

    pub fn preset_value(&self) -> Option<&Bean> {
        self.preset.as_ref()
    }
}

/// A test class and its declarations.
#[derive(Clone, Debug)]
pub struct TestClass {
    id: TestClassId,
    superclass: Option<Arc<TestClass>>,
    interfaces: Vec<Arc<TestClass>>,
    app_test: Option<AppTest>,
    test_properties: Vec<String>,
    mock_beans: Vec<MockBean>,
    imports: Vec<Import>,
    fields: Vec<Field>,
}

impl TestClass {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: TestClassId::new(id),
            superclass: None,
            interfaces: Vec::new(),
            app_test: None,
            test_properties: Vec::new(),
            mock_beans: Vec::new(),
            imports: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// A class nested in `enclosing`; gets its own scope.
    pub fn nested(enclosing: &TestClass, name: &str) -> Self {
        Self::new(format!("{}::{}", enclosing.id, name))
    }

    pub fn extends(mut self, superclass: Arc<TestClass>) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: Arc<TestClass>) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn app_test(mut self, app_test: AppTest) -> Self {
        self.app_test = Some(app_test);
        self
    }

    /// Add a `TestProperties` declaration.
    pub fn test_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_properties
            .extend(properties.into_iter().map(Into::into));
        self
    }

    pub fn mock_bean(mut self, mock_bean: MockBean) -> Self {
        self.mock_beans.push(mock_bean);
        self
    }

    pub fn import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn id(&self) -> &TestClassId {
        &self.id
    }

    pub fn superclass(&self) -> Option<&Arc<TestClass>> {
        self.superclass.as_ref()
    }

    /// This class and every ancestor, breadth first, each visited once.
    pub fn closure(self: &Arc<Self>) -> Vec<Arc<TestClass>> {
        inheritance_closure(ClassNode(self.clone()), |node| {
            let class = &node.0;
            class
                .superclass
                .iter()
                .chain(class.interfaces.iter())
                .cloned()
                .map(ClassNode)
                .collect::<Vec<_>>()
        })
        .into_iter()
        .map(|node| node.0)
        .collect()
    }

    /// The closest `AppTest` declaration in the hierarchy.
    pub fn find_app_test(self: &Arc<Self>) -> Option<AppTest> {
        self.closure()
            .into_iter()
            .find_map(|class| class.app_test.clone())
    }

    /// `TestProperties` tokens of every class in the hierarchy, closest first.
    pub fn collect_test_properties(self: &Arc<Self>) -> Vec<String> {
        self.closure()
            .iter()
            .flat_map(|class| class.test_properties.iter().cloned())
            .collect()
    }

    pub fn collect_mock_beans(self: &Arc<Self>) -> Vec<MockBean> {
        self.closure()
            .iter()
            .flat_map(|class| class.mock_beans.iter().cloned())
            .collect()
    }

    pub fn collect_imports(self: &Arc<Self>) -> Vec<Import> {
        self.closure()
            .iter()
            .flat_map(|class| class.imports.iter().cloned())
            .collect()
    }

    /// Own fields followed by those of the superclass chain.
    pub fn all_fields(&self) -> Vec<Field> {
        let mut fields = self.fields.clone();
        let mut current = self.superclass.clone();
        while let Some(class) = current {
            fields.extend(class.fields.iter().cloned());
            current = class.superclass.clone();
        }
        fields
    }
}

#[derive(Clone)]
struct ClassNode(Arc<TestClass>);

impl PartialEq for ClassNode {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ClassNode {}

impl Hash for ClassNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testbed_core::{Configuration, Environment, Result};

    #[derive(Default)]
    struct NoopApp;

    #[testbed_core::async_trait]
    impl Application for NoopApp {
        async fn run(&self, _c: &Configuration, _e: &mut Environment) -> Result<()> {
            Ok(())
        }
    }

    fn ids(classes: &[Arc<TestClass>]) -> Vec<&str> {
        classes.iter().map(|c| c.id().as_str()).collect()
    }

    #[test]
    fn test_closure_is_breadth_first_and_deduplicated() {
        let root = TestClass::new("Root").build();
        let left = TestClass::new("Left").extends(root.clone()).build();
        let right = TestClass::new("Right").implements(root.clone()).build();
        let leaf = TestClass::new("Leaf")
            .extends(left)
            .implements(right)
            .build();

        assert_eq!(ids(&leaf.closure()), vec!["Leaf", "Left", "Right", "Root"]);
    }

    #[test]
    fn test_app_test_found_on_ancestor() {
        let base = TestClass::new("Base")
            .app_test(AppTest::of::<NoopApp>("base.yml"))
            .build();
        let child = TestClass::new("Child").extends(base).build();

        let app_test = child.find_app_test().unwrap();
        assert_eq!(app_test.config_file(), "base.yml");
    }

    #[test]
    fn test_closest_app_test_wins() {
        let base = TestClass::new("Base")
            .app_test(AppTest::of::<NoopApp>("base.yml"))
            .build();
        let child = TestClass::new("Child")
            .extends(base)
            .app_test(AppTest::of::<NoopApp>("child.yml"))
            .build();

        assert_eq!(child.find_app_test().unwrap().config_file(), "child.yml");
    }

    #[test]
    fn test_properties_closest_first() {
        let base = TestClass::new("Base").test_properties(["a=base"]).build();
        let child = TestClass::new("Child")
            .extends(base)
            .test_properties(["a=child", "b=child"])
            .build();

        assert_eq!(
            child.collect_test_properties(),
            vec!["a=child", "b=child", "a=base"]
        );
    }

    #[test]
    fn test_nested_class_has_distinct_id() {
        let outer = TestClass::new("WidgetTest");
        let inner = TestClass::nested(&outer, "WhenMissing");
        assert_eq!(inner.id().as_str(), "WidgetTest::WhenMissing");
        assert_ne!(inner.id(), outer.id());
    }

    #[test]
    fn test_all_fields_walk_superclass_chain() {
        let base = TestClass::new("Base")
            .field(Field::mutable("inherited", TypeKey::named("A")))
            .build();
        let child = TestClass::new("Child")
            .extends(base)
            .field(Field::final_field("own", TypeKey::named("B")))
            .build();

        let names: Vec<_> = child.all_fields().iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["own", "inherited"]);
    }
}
