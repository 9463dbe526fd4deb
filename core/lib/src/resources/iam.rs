use crate::template::{one_or_many, Expr, ResourceProperties};
use serde::Serialize;

pub const ATTR_ARN: &str = "Arn";
pub const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(serialize_with = "one_or_many")]
    pub action: Vec<String>,
    pub effect: Effect,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    #[serde(
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "one_or_many"
    )]
    pub resource: Vec<Expr>,
}

impl PolicyStatement {
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator<Item = Expr>,
    {
        Self {
            action: actions.into_iter().map(Into::into).collect(),
            effect: Effect::Allow,
            principal: None,
            resource: resources.into_iter().collect(),
        }
    }

    /// Trust statement letting an AWS service assume a role.
    pub fn assume_role(service: impl Into<String>) -> Self {
        Self {
            action: vec!["sts:AssumeRole".to_string()],
            effect: Effect::Allow,
            principal: Some(Principal {
                service: service.into(),
            }),
            resource: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub statement: Vec<PolicyStatement>,
    pub version: String,
}

impl PolicyDocument {
    pub fn new(statement: Vec<PolicyStatement>) -> Self {
        Self {
            statement,
            version: POLICY_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Role {
    pub assume_role_policy_document: PolicyDocument,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<Expr>,
}

impl Role {
    /// A role assumable by a single service principal, e.g. `lambda.amazonaws.com`.
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            assume_role_policy_document: PolicyDocument::new(vec![PolicyStatement::assume_role(
                service,
            )]),
            managed_policy_arns: Vec::new(),
        }
    }

    pub fn with_managed_policy(mut self, policy_name: &str) -> Self {
        self.managed_policy_arns.push(managed_policy_arn(policy_name));
        self
    }
}

impl ResourceProperties for Role {
    const RESOURCE_TYPE: &'static str = "AWS::IAM::Role";
}

/// An inline policy attached to one or more roles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    pub policy_document: PolicyDocument,
    pub policy_name: String,
    pub roles: Vec<Expr>,
}

impl Policy {
    pub fn new(policy_name: impl Into<String>, role: Expr) -> Self {
        Self {
            policy_document: PolicyDocument::new(Vec::new()),
            policy_name: policy_name.into(),
            roles: vec![role],
        }
    }

    pub fn add_statement(&mut self, statement: PolicyStatement) {
        self.policy_document.statement.push(statement);
    }

    pub fn is_empty(&self) -> bool {
        self.policy_document.statement.is_empty()
    }
}

impl ResourceProperties for Policy {
    const RESOURCE_TYPE: &'static str = "AWS::IAM::Policy";
}

/// `arn:<partition>:iam::aws:policy/<name>`
pub fn managed_policy_arn(policy_name: &str) -> Expr {
    Expr::concat(vec![
        Expr::literal("arn:"),
        Expr::partition(),
        Expr::literal(format!(":iam::aws:policy/{}", policy_name)),
    ])
}
