//! Name rules enforced while stacks are being built, so a bad name fails
//! synthesis instead of a deployment.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {kind} '{name}': {reason}")]
pub struct NamingError {
    pub kind: &'static str,
    pub name: String,
    pub reason: String,
}

impl NamingError {
    fn new(kind: &'static str, name: &str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

fn check_length(kind: &'static str, name: &str, min: usize, max: usize) -> Result<(), NamingError> {
    let len = name.chars().count();
    if len < min || len > max {
        return Err(NamingError::new(
            kind,
            name,
            format!("length must be between {} and {} characters", min, max),
        ));
    }
    Ok(())
}

fn check_charset(
    kind: &'static str,
    name: &str,
    allowed: impl Fn(char) -> bool,
    description: &str,
) -> Result<(), NamingError> {
    if let Some(c) = name.chars().find(|c| !allowed(*c)) {
        return Err(NamingError::new(
            kind,
            name,
            format!("character '{}' is not allowed, use {}", c, description),
        ));
    }
    Ok(())
}

/// CloudFormation stack names: a letter followed by letters, digits and hyphens.
pub fn validate_stack_name(name: &str) -> Result<(), NamingError> {
    check_length("stack name", name, 1, 128)?;
    check_charset(
        "stack name",
        name,
        |c| c.is_ascii_alphanumeric() || c == '-',
        "letters, digits and '-'",
    )?;
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(NamingError::new(
            "stack name",
            name,
            "must start with a letter",
        ));
    }
    Ok(())
}

/// Derive a template logical id from a construct id by dropping every
/// character that is not alphanumeric (`cdk-table-py` -> `cdktablepy`).
pub fn logical_id(construct_id: &str) -> Result<String, NamingError> {
    let id: String = construct_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if id.is_empty() {
        return Err(NamingError::new(
            "logical id",
            construct_id,
            "must contain at least one alphanumeric character",
        ));
    }
    check_length("logical id", &id, 1, 255)?;
    Ok(id)
}

/// S3 bucket names.
pub fn validate_bucket_name(name: &str) -> Result<(), NamingError> {
    check_length("bucket name", name, 3, 63)?;
    check_charset(
        "bucket name",
        name,
        |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.',
        "lowercase letters, digits, '-' and '.'",
    )?;

    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return Err(NamingError::new(
            "bucket name",
            name,
            "must start and end with a letter or digit",
        ));
    }
    if name.contains("..") {
        return Err(NamingError::new(
            "bucket name",
            name,
            "must not contain consecutive periods",
        ));
    }
    if let Some(prefix) = RESERVED_BUCKET_PREFIXES.iter().find(|p| name.starts_with(*p)) {
        return Err(NamingError::new(
            "bucket name",
            name,
            format!("must not start with the reserved prefix '{}'", prefix),
        ));
    }
    check_reserved_suffix("bucket name", name)
}

/// S3 keeps these for access point aliases, Object Lambda and directory buckets.
const RESERVED_BUCKET_SUFFIXES: [&str; 3] = ["-s3alias", "--ol-s3", "--x-s3"];

const RESERVED_BUCKET_PREFIXES: [&str; 2] = ["xn--", "sthree-"];

fn check_reserved_suffix(kind: &'static str, name: &str) -> Result<(), NamingError> {
    match RESERVED_BUCKET_SUFFIXES.iter().find(|s| name.ends_with(*s)) {
        Some(suffix) => Err(NamingError::new(
            kind,
            name,
            format!("must not end with the reserved suffix '{}'", suffix),
        )),
        None => Ok(()),
    }
}

/// DynamoDB table names.
pub fn validate_table_name(name: &str) -> Result<(), NamingError> {
    check_length("table name", name, 3, 255)?;
    check_charset(
        "table name",
        name,
        |c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'),
        "letters, digits, '_', '-' and '.'",
    )
}

/// Lambda function names (unqualified).
pub fn validate_function_name(name: &str) -> Result<(), NamingError> {
    check_length("function name", name, 1, 64)?;
    check_charset(
        "function name",
        name,
        |c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'),
        "letters, digits, '_' and '-'",
    )
}

/// Lambda alias names. Purely numeric names would collide with version numbers.
pub fn validate_alias_name(name: &str) -> Result<(), NamingError> {
    check_length("alias name", name, 1, 128)?;
    check_charset(
        "alias name",
        name,
        |c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'),
        "letters, digits, '_' and '-'",
    )?;
    if name.chars().all(|c| c.is_ascii_digit()) {
        return Err(NamingError::new(
            "alias name",
            name,
            "must not be purely numeric",
        ));
    }
    Ok(())
}

/// CodePipeline pipeline names.
pub fn validate_pipeline_name(name: &str) -> Result<(), NamingError> {
    check_length("pipeline name", name, 1, 100)?;
    check_charset(
        "pipeline name",
        name,
        |c| c.is_ascii_alphanumeric() || matches!(c, '.' | '@' | '_' | '-'),
        "letters, digits, '.', '@', '_' and '-'",
    )
}

/// Environment labels end bucket names and are used as alias names, so they
/// must start with a lowercase letter, end with a letter or digit and avoid
/// the bucket suffixes S3 reserves.
pub fn validate_environment_label(label: &str) -> Result<(), NamingError> {
    check_length("environment label", label, 1, 32)?;
    check_charset(
        "environment label",
        label,
        |c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-',
        "lowercase letters, digits and '-'",
    )?;
    if !label.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(NamingError::new(
            "environment label",
            label,
            "must start with a lowercase letter",
        ));
    }
    if label.ends_with('-') {
        return Err(NamingError::new(
            "environment label",
            label,
            "must end with a letter or digit",
        ));
    }
    check_reserved_suffix("environment label", label)
}
