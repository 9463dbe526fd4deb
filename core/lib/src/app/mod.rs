//! Composition of stacks into an application with explicit dependency edges.


use crate::assembly::CloudAssembly;
use crate::error::{ErrorContext, IacError, IacResult};
use crate::exports::ExportName;
use crate::stack::Stack;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// An ordered set of stacks and the dependencies between them.
#[derive(Debug, Clone, Default)]
pub struct App {
    stacks: Vec<Stack>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stack. Stack names and export names must be unique across the app.
    pub fn add_stack(&mut self, stack: Stack) -> IacResult<()> {
        if self.stack(stack.name()).is_some() {
            return Err(IacError::validation(format!(
                "Stack {} is defined twice",
                stack.name()
            )));
        }

        let exports = stack.exports();
        for other in &self.stacks {
            if let Some(name) = other.exports().intersection(&exports).next() {
                return Err(IacError::validation(format!(
                    "Export {} is declared by both {} and {}",
                    name,
                    other.name(),
                    stack.name()
                ))
                .with_context(ErrorContext::new("add_stack").with_stack(stack.name())));
            }
        }

        debug!(
            "Added stack {} with {} resources",
            stack.name(),
            stack.template().resources.len()
        );
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name() == name)
    }

    /// Stacks in the order they were added.
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Declare that `dependent` must be deployed after `dependency`.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> IacResult<()> {
        let context = || {
            ErrorContext::new("add_dependency")
                .with_stack(dependent)
                .with_info(format!("dependency: {}", dependency))
        };

        if dependent == dependency {
            return Err(IacError::dependency(format!(
                "Stack {} cannot depend on itself",
                dependent
            ))
            .with_context(context()));
        }
        if self.stack(dependency).is_none() {
            return Err(
                IacError::dependency(format!("Unknown stack {}", dependency))
                    .with_context(context()),
            );
        }

        let stack = self
            .stacks
            .iter_mut()
            .find(|s| s.name() == dependent)
            .ok_or_else(|| {
                IacError::dependency(format!("Unknown stack {}", dependent))
                    .with_context(context())
            })?;
        stack.push_dependency(dependency);
        Ok(())
    }

    /// Stacks ordered so that every stack comes after its dependencies.
    /// Independent stacks keep the order in which they were added.
    pub fn deployment_order(&self) -> IacResult<Vec<&Stack>> {
        let mut marks = HashMap::new();
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(self.stacks.len());

        for stack in &self.stacks {
            self.visit(stack, &mut marks, &mut path, &mut order)?;
        }

        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        stack: &'a Stack,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<&'a Stack>,
    ) -> IacResult<()> {
        match marks.get(stack.name()) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|n| *n == stack.name()).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..].to_vec();
                cycle.push(stack.name());
                return Err(IacError::dependency(format!(
                    "Dependency cycle: {}",
                    cycle.join(" -> ")
                )));
            }
            None => {}
        }

        marks.insert(stack.name(), Mark::Visiting);
        path.push(stack.name());

        for dependency in stack.dependencies() {
            let dependency = self.stack(dependency).ok_or_else(|| {
                IacError::dependency(format!(
                    "{} depends on unknown stack {}",
                    stack.name(),
                    dependency
                ))
            })?;
            self.visit(dependency, marks, path, order)?;
        }

        path.pop();
        marks.insert(stack.name(), Mark::Done);
        order.push(stack);
        Ok(())
    }

    /// Whether `dependent` is guaranteed to be deployed after `dependency`.
    pub fn depends_transitively(&self, dependent: &str, dependency: &str) -> bool {
        let mut seen = HashSet::new();
        let mut pending: Vec<&str> = self
            .stack(dependent)
            .map(|s| s.dependencies().iter().map(String::as_str).collect())
            .unwrap_or_default();

        while let Some(name) = pending.pop() {
            if name == dependency {
                return true;
            }
            if !seen.insert(name) {
                continue;
            }
            if let Some(stack) = self.stack(name) {
                pending.extend(stack.dependencies().iter().map(String::as_str));
            }
        }

        false
    }

    /// Check that the dependency graph is acyclic and that every import is
    /// exported by a stack the importer depends on.
    pub fn validate(&self) -> IacResult<()> {
        self.deployment_order()?;

        let mut producers: HashMap<ExportName, &str> = HashMap::new();
        for stack in &self.stacks {
            for name in stack.exports() {
                if let Some(previous) = producers.insert(name, stack.name()) {
                    return Err(IacError::validation(format!(
                        "Export {} is declared by both {} and {}",
                        name,
                        previous,
                        stack.name()
                    )));
                }
            }
        }

        for stack in &self.stacks {
            let mut unguaranteed: BTreeMap<&str, Vec<ExportName>> = BTreeMap::new();

            for name in stack.imports()? {
                let producer = producers.get(&name).copied().ok_or_else(|| {
                    IacError::dependency(format!("No stack exports {}", name))
                        .with_context(ErrorContext::new("validate").with_stack(stack.name()))
                })?;

                if !self.depends_transitively(stack.name(), producer) {
                    unguaranteed.entry(producer).or_default().push(name);
                }
            }

            if !unguaranteed.is_empty() {
                let details: Vec<String> = unguaranteed
                    .iter()
                    .map(|(producer, names)| {
                        let names: Vec<&str> = names.iter().map(ExportName::as_str).collect();
                        format!("{} from {}", names.join(", "), producer)
                    })
                    .collect();
                return Err(IacError::dependency(format!(
                    "{} imports {} without depending on the exporting stack",
                    stack.name(),
                    details.join("; ")
                ))
                .with_context(ErrorContext::new("validate").with_stack(stack.name())));
            }
        }

        Ok(())
    }

    /// Validate the app and render every stack into a cloud assembly.
    pub fn synth(&self) -> IacResult<CloudAssembly> {
        self.validate()?;
        let order = self.deployment_order()?;
        let assembly = CloudAssembly::from_stacks(&order)?;
        info!("Synthesized {} stacks", order.len());
        Ok(assembly)
    }
}
