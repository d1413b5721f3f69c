//! Validated identifier types.
//!
//! Every externally-supplied identifier (PR numbers, branch names, versions,
//! labels) is validated at the boundary and carried as a newtype afterwards.
//! Validation failures are fatal before any processing starts; nothing
//! downstream ever re-checks these grammars.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// What kind of value failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A PR number.
    PrNumber,
    /// A release version string.
    Version,
    /// A GitHub label.
    Label,
    /// A branch name.
    Branch,
    /// A repository-relative file path.
    Path,
    /// An ISO date (`YYYY-MM-DD`).
    Date,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PrNumber => "PR number",
            Self::Version => "version",
            Self::Label => "label",
            Self::Branch => "branch name",
            Self::Path => "file path",
            Self::Date => "date",
        };
        f.write_str(name)
    }
}

/// A malformed branch, version, label, or identifier.
///
/// Fatal before any processing starts; no side effects have occurred when
/// one of these is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// What kind of value was being validated.
    pub kind: ErrorKind,
    /// The invalid value.
    pub value: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {}: {:?} — {}",
            self.kind, self.value, self.reason
        )
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// PrNumber
// ---------------------------------------------------------------------------

/// A GitHub pull-request number.
///
/// Parses from a bare number (`2680`), a `#`-prefixed reference (`#2680`),
/// or a full PR URL (`https://github.com/o/r/pull/2680`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrNumber(u64);

impl PrNumber {
    /// Wrap a raw number.
    #[must_use]
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// The numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Parse a user-supplied PR reference: bare number, `#N`, or PR URL.
    ///
    /// # Errors
    /// Returns an error if no trailing number can be extracted.
    pub fn parse_reference(s: &str) -> Result<Self, ValidationError> {
        let text = s.trim();
        let candidate = if let Some(idx) = text.find("/pull/") {
            let tail = &text[idx + "/pull/".len()..];
            tail.split(|c: char| !c.is_ascii_digit())
                .next()
                .unwrap_or_default()
        } else {
            text.trim_start_matches('#')
        };
        candidate
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ValidationError {
                kind: ErrorKind::PrNumber,
                value: s.to_owned(),
                reason: "expected a PR number, '#<number>', or a pull request URL".to_owned(),
            })
    }
}

impl fmt::Display for PrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PrNumber {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_reference(s)
    }
}

/// Parse a list of PR references, de-duplicating while preserving the first
/// occurrence of each number.
///
/// # Errors
/// Returns the first reference that fails to parse.
pub fn parse_pr_references(items: &[String]) -> Result<Vec<PrNumber>, ValidationError> {
    let mut seen = std::collections::HashSet::new();
    let mut numbers = Vec::new();
    for item in items {
        let number = PrNumber::parse_reference(item)?;
        if seen.insert(number) {
            numbers.push(number);
        }
    }
    Ok(numbers)
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// A release version string, digits and dots only (e.g. `1.7.2511`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    /// Create a new `Version`, validating format.
    ///
    /// # Errors
    /// Returns an error unless the string is non-empty digits and dots.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// The version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The version with dots replaced by dashes, safe for use inside a
    /// branch name segment (`1.7.2511` → `1-7-2511`).
    #[must_use]
    pub fn sanitized(&self) -> String {
        self.0.replace('.', "-")
    }

    /// The discovery label for this version (`backport_<version>`).
    #[must_use]
    pub fn backport_label(&self) -> Label {
        Label(format!("backport_{}", self.0))
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(ValidationError {
                kind: ErrorKind::Version,
                value: s.to_owned(),
                reason: "version must contain only digits and dots (e.g. 1.7.2511)".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Version {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for Version {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.0
    }
}

// ---------------------------------------------------------------------------
// Label
// ---------------------------------------------------------------------------

/// A GitHub label: letters, digits, `_`, `.`, `-`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Create a new `Label`, validating format.
    ///
    /// # Errors
    /// Returns an error on empty or out-of-alphabet strings.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// The label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        if s.is_empty()
            || !s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(ValidationError {
                kind: ErrorKind::Label,
                value: s.to_owned(),
                reason: "label must contain only letters, digits, '_', '.', '-'".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Label {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<Label> for String {
    fn from(l: Label) -> Self {
        l.0
    }
}

// ---------------------------------------------------------------------------
// TargetBranch
// ---------------------------------------------------------------------------

/// The kind of a target branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKind {
    /// The mainline branch.
    Main,
    /// A staging branch (`staging/<version>`).
    Staging,
    /// A release branch (`release/<version>`).
    Release,
}

/// A validated branch name: `main`, `release/<version>`, or
/// `staging/<version>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetBranch {
    name: String,
    kind: BranchKind,
    version: Option<Version>,
}

impl TargetBranch {
    /// Parse and validate a branch name.
    ///
    /// # Errors
    /// Returns an error unless the name is `main` or
    /// `(release|staging)/<version>`.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let name = s.trim();
        if name == "main" {
            return Ok(Self {
                name: name.to_owned(),
                kind: BranchKind::Main,
                version: None,
            });
        }
        let (kind, version_str) = name
            .split_once('/')
            .and_then(|(prefix, rest)| match prefix {
                "release" => Some((BranchKind::Release, rest)),
                "staging" => Some((BranchKind::Staging, rest)),
                _ => None,
            })
            .ok_or_else(|| invalid_branch(name))?;
        let version = Version::new(version_str).map_err(|_| invalid_branch(name))?;
        Ok(Self {
            name: name.to_owned(),
            kind,
            version: Some(version),
        })
    }

    /// Parse a branch that must be a backport target (release or staging).
    ///
    /// # Errors
    /// Rejects `main` as well as anything [`parse`](Self::parse) rejects.
    pub fn parse_backport_target(s: &str) -> Result<Self, ValidationError> {
        let branch = Self::parse(s)?;
        if branch.kind == BranchKind::Main {
            return Err(ValidationError {
                kind: ErrorKind::Branch,
                value: s.to_owned(),
                reason: "backport target must be a release/<version> or staging/<version> branch"
                    .to_owned(),
            });
        }
        Ok(branch)
    }

    /// The full branch name (e.g. `release/1.7.2511`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The branch kind.
    #[must_use]
    pub const fn kind(&self) -> BranchKind {
        self.kind
    }

    /// The version component, absent for `main`.
    #[must_use]
    pub const fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// The remote-tracking spelling of this branch (`<remote>/<name>`).
    #[must_use]
    pub fn remote_ref(&self, remote: &str) -> String {
        format!("{remote}/{}", self.name)
    }
}

fn invalid_branch(name: &str) -> ValidationError {
    ValidationError {
        kind: ErrorKind::Branch,
        value: name.to_owned(),
        reason: "branch must be 'main', 'release/<version>', or 'staging/<version>'".to_owned(),
    }
}

impl fmt::Display for TargetBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for TargetBranch {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TargetBranch {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TargetBranch> for String {
    fn from(b: TargetBranch) -> Self {
        b.name
    }
}
