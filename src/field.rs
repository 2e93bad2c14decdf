//! Field-scoped validation errors.
//!
//! Errors are collected in order into [`FieldErrors`] and handed back to the caller, which
//! rejects the request as a whole and surfaces the list as a Kubernetes `Status`.

use itertools::Itertools;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as meta;
use std::fmt;

/// A path to a field, e.g. `spec.ingress[0].ports[1].endPort`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path(String);

impl Path {
    pub fn new(root: &str) -> Self {
        Self(root.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            return Self::new(name);
        }
        Self(format!("{}.{name}", self.0))
    }

    pub fn index(&self, i: usize) -> Self {
        Self(format!("{}[{i}]", self.0))
    }

    pub fn key(&self, key: &str) -> Self {
        Self(format!("{}[{key}]", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Required,
    Invalid { value: String, detail: String },
    NotSupported { value: String, supported: Vec<&'static str> },
    Forbidden { detail: String },
    TooLong { max: usize },
}

impl Kind {
    /// The `StatusCause` reason, as the API server spells it.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Required => "FieldValueRequired",
            Self::Invalid { .. } => "FieldValueInvalid",
            Self::NotSupported { .. } => "FieldValueNotSupported",
            Self::Forbidden { .. } => "FieldValueForbidden",
            Self::TooLong { .. } => "FieldValueTooLong",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "Required value"),
            Self::Invalid { value, detail } => write!(f, "Invalid value: {value:?}: {detail}"),
            Self::NotSupported { value, supported } => write!(
                f,
                "Unsupported value: {value:?}: supported values: {}",
                supported.iter().map(|v| format!("{v:?}")).join(", ")
            ),
            Self::Forbidden { detail } => write!(f, "Forbidden: {detail}"),
            Self::TooLong { max } => write!(f, "Too long: may not be more than {max} bytes"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct FieldError {
    pub path: Path,
    pub kind: Kind,
}

impl FieldError {
    pub fn required(path: &Path) -> Self {
        Self {
            path: path.clone(),
            kind: Kind::Required,
        }
    }

    pub fn invalid(path: &Path, value: impl fmt::Display, detail: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            kind: Kind::Invalid {
                value: value.to_string(),
                detail: detail.into(),
            },
        }
    }

    pub fn not_supported(
        path: &Path,
        value: impl fmt::Display,
        supported: &[&'static str],
    ) -> Self {
        Self {
            path: path.clone(),
            kind: Kind::NotSupported {
                value: value.to_string(),
                supported: supported.to_vec(),
            },
        }
    }

    pub fn forbidden(path: &Path, detail: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            kind: Kind::Forbidden {
                detail: detail.into(),
            },
        }
    }

    pub fn too_long(path: &Path, max: usize) -> Self {
        Self {
            path: path.clone(),
            kind: Kind::TooLong { max },
        }
    }
}

/// Ordered list of field errors. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: FieldError) {
        self.0.push(err);
    }

    pub fn extend(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Builds the `422 Invalid` status returned to clients.
    pub fn to_status(&self, kind: &str, name: &str) -> meta::Status {
        let causes = (self.0.iter())
            .map(|e| meta::StatusCause {
                field: Some(e.path.to_string()),
                message: Some(e.kind.to_string()),
                reason: Some(e.kind.reason().to_string()),
            })
            .collect();

        meta::Status {
            code: Some(422),
            message: Some(format!("{kind} {name:?} is invalid: {self}")),
            reason: Some("Invalid".to_string()),
            status: Some("Failure".to_string()),
            details: Some(meta::StatusDetails {
                causes: Some(causes),
                kind: Some(kind.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join("; "))
    }
}

impl From<Vec<FieldError>> for FieldErrors {
    fn from(v: Vec<FieldError>) -> Self {
        Self(v)
    }
}

impl FromIterator<FieldError> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FieldErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FieldErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for FieldErrors {
    type Output = FieldError;

    fn index(&self, i: usize) -> &FieldError {
        &self.0[i]
    }
}
