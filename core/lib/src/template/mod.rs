//! A small typed model of a CloudFormation template.
//!
//! Maps are ordered so that serializing the same template twice yields the
//! same bytes.

mod intrinsic;


pub use intrinsic::{Expr, Pseudo};
pub(crate) use intrinsic::one_or_many;

use crate::error::{ErrorContext, IacError, IacResult};
use crate::exports::ExportName;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Typed resource properties. Implementors serialize to the `Properties`
/// block of a resource of type [`ResourceProperties::RESOURCE_TYPE`].
pub trait ResourceProperties: Serialize {
    const RESOURCE_TYPE: &'static str;
}

/// What happens to a resource when it leaves the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalPolicy {
    #[serde(rename = "Delete")]
    Destroy,
    Retain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub properties: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,
}

impl Resource {
    pub fn from_properties<P: ResourceProperties>(properties: &P) -> IacResult<Self> {
        let properties = serde_json::to_value(properties).map_err(|e| {
            IacError::from(e).with_context(
                ErrorContext::new("serialize_properties").with_info(P::RESOURCE_TYPE),
            )
        })?;

        Ok(Self {
            resource_type: P::RESOURCE_TYPE.to_string(),
            properties,
            depends_on: Vec::new(),
            update_replace_policy: None,
            deletion_policy: None,
        })
    }

    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.update_replace_policy = Some(policy);
        self.deletion_policy = Some(policy);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Export {
    pub name: ExportName,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Resource>,
    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

impl Default for Template {
    fn default() -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }
}

impl Template {
    pub fn new(description: Option<String>) -> Self {
        Self {
            description,
            ..Self::default()
        }
    }

    pub fn add_resource(&mut self, logical_id: &str, resource: Resource) -> IacResult<()> {
        if self.resources.contains_key(logical_id) {
            return Err(IacError::validation(format!(
                "Duplicate logical id {}",
                logical_id
            )));
        }
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    pub fn add_output(&mut self, output_id: &str, output: Output) -> IacResult<()> {
        if self.outputs.contains_key(output_id) {
            return Err(IacError::validation(format!(
                "Duplicate output id {}",
                output_id
            )));
        }
        self.outputs.insert(output_id.to_string(), output);
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Logical ids and resources of one CloudFormation type.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
    }

    /// Export names declared by this template's outputs.
    pub fn exports(&self) -> BTreeSet<ExportName> {
        self.outputs
            .values()
            .filter_map(|o| o.export.as_ref().map(|e| e.name))
            .collect()
    }

    /// Export names this template imports anywhere in its resources or outputs.
    pub fn imports(&self) -> IacResult<BTreeSet<ExportName>> {
        let value = serde_json::to_value(self)?;
        let mut found = BTreeSet::new();
        collect_imports(&value, &mut found)?;
        Ok(found)
    }

    pub fn to_json(&self) -> IacResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn collect_imports(
    value: &serde_json::Value,
    found: &mut BTreeSet<ExportName>,
) -> IacResult<()> {
    match value {
        serde_json::Value::Object(map) => {
            for (key, inner) in map {
                if key == "Fn::ImportValue" {
                    let name = inner.as_str().ok_or_else(|| {
                        IacError::synthesis("Fn::ImportValue must name an export directly")
                    })?;
                    let export = name
                        .parse::<ExportName>()
                        .map_err(|e| IacError::validation(e.to_string()))?;
                    found.insert(export);
                } else {
                    collect_imports(inner, found)?;
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_imports(item, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}
