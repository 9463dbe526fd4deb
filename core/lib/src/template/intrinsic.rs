use crate::exports::ExportName;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Pseudo parameters resolved by CloudFormation at deploy time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    AccountId,
    Partition,
    Region,
    UrlSuffix,
}

impl Pseudo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Partition => "AWS::Partition",
            Pseudo::Region => "AWS::Region",
            Pseudo::UrlSuffix => "AWS::URLSuffix",
        }
    }
}

/// A string-valued template expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    Ref(String),
    GetAtt(String, String),
    ImportValue(ExportName),
    Join(String, Vec<Expr>),
    Sub(String),
    Pseudo(Pseudo),
}

impl Expr {
    pub fn literal(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn reference(logical_id: impl Into<String>) -> Self {
        Expr::Ref(logical_id.into())
    }

    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::GetAtt(logical_id.into(), attribute.into())
    }

    pub fn import(name: ExportName) -> Self {
        Expr::ImportValue(name)
    }

    pub fn join(delimiter: impl Into<String>, parts: Vec<Expr>) -> Self {
        Expr::Join(delimiter.into(), parts)
    }

    /// `Fn::Join` with an empty delimiter.
    pub fn concat(parts: Vec<Expr>) -> Self {
        Expr::join("", parts)
    }

    pub fn region() -> Self {
        Expr::Pseudo(Pseudo::Region)
    }

    pub fn account_id() -> Self {
        Expr::Pseudo(Pseudo::AccountId)
    }

    pub fn partition() -> Self {
        Expr::Pseudo(Pseudo::Partition)
    }

    pub fn url_suffix() -> Self {
        Expr::Pseudo(Pseudo::UrlSuffix)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::literal(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Literal(value)
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expr::Literal(value) => serializer.serialize_str(value),
            Expr::Ref(logical_id) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", logical_id)?;
                map.end()
            }
            Expr::GetAtt(logical_id, attribute) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[logical_id, attribute])?;
                map.end()
            }
            Expr::ImportValue(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::ImportValue", name.as_str())?;
                map.end()
            }
            Expr::Join(delimiter, parts) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Join", &(delimiter, parts))?;
                map.end()
            }
            Expr::Sub(template) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Sub", template)?;
                map.end()
            }
            Expr::Pseudo(pseudo) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", pseudo.as_str())?;
                map.end()
            }
        }
    }
}

/// Serialize a list as a bare value when it has exactly one element, the
/// way IAM policy documents are conventionally written.
#[allow(clippy::ptr_arg)]
pub(crate) fn one_or_many<S, T>(values: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    match values.as_slice() {
        [single] => single.serialize(serializer),
        _ => values.serialize(serializer),
    }
}
