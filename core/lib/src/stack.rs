use crate::error::{ErrorContext, IacError, IacResult};
use crate::exports::ExportName;
use crate::naming;
use crate::template::{Export, Expr, Output, RemovalPolicy, Resource, ResourceProperties, Template};
use std::collections::BTreeSet;
use tracing::debug;

/// Handle to a resource added to a stack, used to reference it from others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    logical_id: String,
}

impl ResourceHandle {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// `{"Ref": <logical id>}`
    pub fn reference(&self) -> Expr {
        Expr::reference(&self.logical_id)
    }

    /// `{"Fn::GetAtt": [<logical id>, <attribute>]}`
    pub fn get_att(&self, attribute: &str) -> Expr {
        Expr::get_att(&self.logical_id, attribute)
    }
}

/// Per-resource template attributes.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    depends_on: Vec<String>,
    removal_policy: Option<RemovalPolicy>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depends_on(mut self, resource: &ResourceHandle) -> Self {
        self.depends_on.push(resource.logical_id.clone());
        self
    }

    pub fn removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = Some(policy);
        self
    }
}

/// A named, independently deployable set of resources.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    template: Template,
    dependencies: Vec<String>,
}

impl Stack {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> IacResult<Self> {
        let name = name.into();
        naming::validate_stack_name(&name)?;

        Ok(Self {
            name,
            template: Template::new(Some(description.into())),
            dependencies: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Stacks this one was declared to depend on, in declaration order.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn push_dependency(&mut self, stack_name: &str) {
        if !self.dependencies.iter().any(|d| d == stack_name) {
            self.dependencies.push(stack_name.to_string());
        }
    }

    pub fn add_resource<P: ResourceProperties>(
        &mut self,
        construct_id: &str,
        properties: &P,
    ) -> IacResult<ResourceHandle> {
        self.add_resource_with(construct_id, properties, ResourceOptions::default())
    }

    pub fn add_resource_with<P: ResourceProperties>(
        &mut self,
        construct_id: &str,
        properties: &P,
        options: ResourceOptions,
    ) -> IacResult<ResourceHandle> {
        let stack_name = self.name.clone();
        let context = || {
            ErrorContext::new("add_resource")
                .with_stack(&stack_name)
                .with_resource(construct_id)
        };

        let logical_id = naming::logical_id(construct_id)
            .map_err(|e| IacError::from(e).with_context(context()))?;

        for dependency in &options.depends_on {
            if self.template.resource(dependency).is_none() {
                return Err(IacError::synthesis(format!(
                    "DependsOn target {} is not part of the stack",
                    dependency
                ))
                .with_context(context()));
            }
        }

        let mut resource = Resource::from_properties(properties)?;
        resource.depends_on = options.depends_on;
        if let Some(policy) = options.removal_policy {
            resource = resource.with_removal_policy(policy);
        }

        self.template
            .add_resource(&logical_id, resource)
            .map_err(|e| e.with_context(context()))?;

        debug!("Added {} {} to {}", P::RESOURCE_TYPE, logical_id, self.name);

        Ok(ResourceHandle { logical_id })
    }

    /// Add an output that is only shown, not exported.
    pub fn add_output(
        &mut self,
        output_id: &str,
        value: Expr,
        description: impl Into<String>,
    ) -> IacResult<()> {
        self.template.add_output(
            output_id,
            Output {
                description: Some(description.into()),
                value,
                export: None,
            },
        )
    }

    /// Publish `value` under `name` for other stacks to import.
    pub fn export(
        &mut self,
        output_id: &str,
        name: ExportName,
        value: Expr,
        description: impl Into<String>,
    ) -> IacResult<()> {
        if self.template.exports().contains(&name) {
            return Err(IacError::validation(format!(
                "Export {} is declared twice",
                name
            ))
            .with_context(ErrorContext::new("export").with_stack(&self.name)));
        }

        self.template.add_output(
            output_id,
            Output {
                description: Some(description.into()),
                value,
                export: Some(Export { name }),
            },
        )
    }

    /// Reference a value exported by another stack. The producing stack must
    /// be a (transitive) dependency of this one; `App::validate` checks that.
    pub fn import(&self, name: ExportName) -> Expr {
        Expr::import(name)
    }

    pub fn exports(&self) -> BTreeSet<ExportName> {
        self.template.exports()
    }

    pub fn imports(&self) -> IacResult<BTreeSet<ExportName>> {
        self.template.imports()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::s3::Bucket;

    #[test]
    fn test_construct_ids_become_logical_ids() {
        let mut stack = Stack::new("BucketStack", "buckets").unwrap();
        let handle = stack
            .add_resource("artifact-bucket", &Bucket::new("artifacts-dev"))
            .unwrap();

        assert_eq!(handle.logical_id(), "artifactbucket");
        assert!(stack.template().resource("artifactbucket").is_some());
    }

    #[test]
    fn test_depends_on_must_exist() {
        let mut stack = Stack::new("BucketStack", "buckets").unwrap();
        let first = stack.add_resource("First", &Bucket::new("first-dev")).unwrap();
        let mut other = Stack::new("OtherStack", "other").unwrap();

        let err = other
            .add_resource_with(
                "Second",
                &Bucket::new("second-dev"),
                ResourceOptions::new().depends_on(&first),
            )
            .unwrap_err();
        assert!(matches!(err, IacError::Synthesis { .. }));

        stack
            .add_resource_with(
                "Second",
                &Bucket::new("second-dev"),
                ResourceOptions::new()
                    .depends_on(&first)
                    .removal_policy(RemovalPolicy::Retain),
            )
            .unwrap();
        let second = stack.template().resource("Second").unwrap();
        assert_eq!(second.depends_on, vec!["First".to_string()]);
        assert_eq!(second.deletion_policy, Some(RemovalPolicy::Retain));
    }

    #[test]
    fn test_export_twice_is_rejected() {
        let mut stack = Stack::new("BucketStack", "buckets").unwrap();
        stack
            .export(
                "A",
                ExportName::LambdaEnvironment,
                Expr::literal("dev"),
                "label",
            )
            .unwrap();

        let err = stack
            .export(
                "B",
                ExportName::LambdaEnvironment,
                Expr::literal("dev"),
                "label",
            )
            .unwrap_err();
        assert!(matches!(err, IacError::Validation { .. }));
    }

    #[test]
    fn test_invalid_stack_name() {
        assert!(matches!(
            Stack::new("bad_name", "x"),
            Err(IacError::Validation { .. })
        ));
    }
}
