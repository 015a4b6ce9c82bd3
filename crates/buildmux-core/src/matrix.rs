//! Target matrix: build profiles and their (triple, export name) pairs.
//!
//! The matrix is an immutable value built once at startup, either from the
//! compiled-in table ([`TargetMatrix::builtin`]) or through
//! [`TargetMatrix::builder`]. It is passed explicitly to whoever needs it.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DispatchError, MatrixError};

/// `arch-vendor-os[-env]`
fn triple_grammar() -> &'static Regex {
    static GRAMMAR: OnceLock<Regex> = OnceLock::new();
    GRAMMAR.get_or_init(|| {
        Regex::new(r"^[a-z0-9_]+(-[a-z0-9_.]+){2,3}$").expect("triple grammar is a valid regex")
    })
}

/// A validated compilation target triple, e.g. `x86_64-unknown-linux-gnu`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompilerTriple(String);

impl CompilerTriple {
    pub fn new(triple: impl Into<String>) -> Result<Self, MatrixError> {
        let triple = triple.into();
        if triple_grammar().is_match(&triple) {
            Ok(Self(triple))
        } else {
            Err(MatrixError::InvalidTriple(triple))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether binaries for this target carry an `.exe` suffix.
    pub fn is_windows(&self) -> bool {
        self.0.split('-').any(|part| part == "windows")
    }
}

impl TryFrom<String> for CompilerTriple {
    type Error = MatrixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CompilerTriple> for String {
    fn from(value: CompilerTriple) -> Self {
        value.0
    }
}

impl fmt::Display for CompilerTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label an artifact is exported under. Used as a directory name on export.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExportName(String);

impl ExportName {
    pub fn new(name: impl Into<String>) -> Result<Self, MatrixError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control());
        if valid {
            Ok(Self(name))
        } else {
            Err(MatrixError::InvalidExportName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExportName {
    type Error = MatrixError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExportName> for String {
    fn from(value: ExportName) -> Self {
        value.0
    }
}

impl fmt::Display for ExportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One build-and-export unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetSpec {
    pub triple: CompilerTriple,
    pub export_name: ExportName,
}

impl TargetSpec {
    pub fn new(triple: &str, export_name: &str) -> Result<Self, MatrixError> {
        Ok(Self {
            triple: CompilerTriple::new(triple)?,
            export_name: ExportName::new(export_name)?,
        })
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.triple, self.export_name)
    }
}

/// A named, ordered set of targets processed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildProfile {
    id: String,
    description: Option<String>,
    targets: Vec<TargetSpec>,
}

impl BuildProfile {
    /// Create a profile, enforcing id, non-empty and unique-export-name rules.
    pub fn new(id: impl Into<String>, targets: Vec<TargetSpec>) -> Result<Self, MatrixError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(MatrixError::InvalidProfileId(id));
        }
        if targets.is_empty() {
            return Err(MatrixError::EmptyProfile(id));
        }

        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target.export_name.as_str()) {
                return Err(MatrixError::DuplicateExportName {
                    profile: id,
                    export_name: target.export_name.to_string(),
                });
            }
        }

        Ok(Self {
            id,
            description: None,
            targets,
        })
    }

    /// Pair two parallel lists positionally: `triples[i]` exports as `export_names[i]`.
    pub fn from_pairs(
        id: impl Into<String>,
        triples: &[&str],
        export_names: &[&str],
    ) -> Result<Self, MatrixError> {
        let id = id.into();
        if triples.len() != export_names.len() {
            return Err(MatrixError::LengthMismatch {
                profile: id,
                triples: triples.len(),
                export_names: export_names.len(),
            });
        }

        let targets = triples
            .iter()
            .zip(export_names)
            .map(|(triple, name)| TargetSpec::new(triple, name))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(id, targets)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn targets(&self) -> &[TargetSpec] {
        &self.targets
    }

    /// SHA-256 over the ordered targets. Changes when any pair or the order changes.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.id.as_bytes());
        hasher.update(b"\0");
        for target in &self.targets {
            hasher.update(target.triple.as_str().as_bytes());
            hasher.update(b"=");
            hasher.update(target.export_name.as_str().as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

/// Registered build profiles, looked up by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetMatrix {
    profiles: Vec<BuildProfile>,
    index: HashMap<String, usize>,
}

impl TargetMatrix {
    pub fn builder() -> TargetMatrixBuilder {
        TargetMatrixBuilder::default()
    }

    /// The compiled-in matrix.
    pub fn builtin() -> Self {
        // Validated by test_builtin_matrix_is_valid.
        match build_builtin() {
            Ok(matrix) => matrix,
            Err(e) => unreachable!("builtin target matrix is invalid: {e}"),
        }
    }

    pub fn lookup(&self, profile_id: &str) -> Result<&BuildProfile, DispatchError> {
        self.index
            .get(profile_id)
            .map(|&i| &self.profiles[i])
            .ok_or_else(|| DispatchError::UnknownProfile(profile_id.to_string()))
    }

    /// Profiles in registration order.
    pub fn profiles(&self) -> impl Iterator<Item = &BuildProfile> {
        self.profiles.iter()
    }

    pub fn profile_ids(&self) -> Vec<&str> {
        self.profiles.iter().map(BuildProfile::id).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

fn build_builtin() -> Result<TargetMatrix, MatrixError> {
    let global = BuildProfile::from_pairs(
        "global",
        &[
            "x86_64-unknown-linux-gnu",
            "x86_64-unknown-linux-musl",
            "x86_64-pc-windows-gnu",
        ],
        &["linx86_64-libc", "linx86_64-musl", "winx86_64"],
    )?
    .with_description("global msat build");

    TargetMatrix::builder().profile(global).build()
}

/// Collects profiles and validates them as a whole on [`build`](Self::build).
#[derive(Debug, Default)]
pub struct TargetMatrixBuilder {
    profiles: Vec<BuildProfile>,
}

impl TargetMatrixBuilder {
    pub fn profile(mut self, profile: BuildProfile) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn build(self) -> Result<TargetMatrix, MatrixError> {
        let mut index = HashMap::with_capacity(self.profiles.len());
        for (i, profile) in self.profiles.iter().enumerate() {
            if index.insert(profile.id.clone(), i).is_some() {
                return Err(MatrixError::DuplicateProfile(profile.id.clone()));
            }
        }
        Ok(TargetMatrix {
            profiles: self.profiles,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_matrix_is_valid() {
        let matrix = build_builtin().expect("builtin matrix must validate");
        assert_eq!(matrix.profile_ids(), vec!["global"]);
    }

    #[test]
    fn test_global_profile_pairs_positionally() {
        let matrix = TargetMatrix::builtin();
        let global = matrix.lookup("global").unwrap();
        let pairs: Vec<(&str, &str)> = global
            .targets()
            .iter()
            .map(|t| (t.triple.as_str(), t.export_name.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("x86_64-unknown-linux-gnu", "linx86_64-libc"),
                ("x86_64-unknown-linux-musl", "linx86_64-musl"),
                ("x86_64-pc-windows-gnu", "winx86_64"),
            ]
        );
    }

    #[test]
    fn test_lookup_unknown_profile() {
        let matrix = TargetMatrix::builtin();
        let err = matrix.lookup("does-not-exist").unwrap_err();
        assert!(matches!(err, DispatchError::UnknownProfile(id) if id == "does-not-exist"));
    }

    #[test]
    fn test_triple_grammar() {
        for ok in [
            "x86_64-unknown-linux-gnu",
            "x86_64-pc-windows-gnu",
            "aarch64-apple-darwin",
            "wasm32-unknown-unknown",
            "thumbv7em-none-eabihf",
            "armv7-unknown-linux-gnueabihf",
            "x86_64-apple-ios13.0-macabi",
        ] {
            assert!(CompilerTriple::new(ok).is_ok(), "{ok} should be accepted");
        }

        for bad in [
            "",
            "x86_64",
            "x86_64-linux",
            "X86_64-unknown-linux-gnu",
            "x86_64--linux-gnu",
            "x86_64-unknown-linux-gnu-extra-part",
            "x86_64 unknown linux",
        ] {
            assert!(
                matches!(CompilerTriple::new(bad), Err(MatrixError::InvalidTriple(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_triple_helpers() {
        let triple = CompilerTriple::new("x86_64-pc-windows-gnu").unwrap();
        assert!(triple.is_windows());
        assert!(!CompilerTriple::new("x86_64-unknown-linux-musl").unwrap().is_windows());
    }

    #[test]
    fn test_export_name_rejects_paths() {
        assert!(ExportName::new("linx86_64-libc").is_ok());
        for bad in ["", ".", "..", "a/b", "a\\b", "with space"] {
            assert!(ExportName::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_duplicate_export_name_rejected() {
        let err = BuildProfile::from_pairs(
            "dup",
            &["x86_64-unknown-linux-gnu", "x86_64-unknown-linux-musl"],
            &["linux", "linux"],
        )
        .unwrap_err();
        assert!(matches!(err, MatrixError::DuplicateExportName { .. }));
    }

    #[test]
    fn test_empty_profile_rejected() {
        let err = BuildProfile::new("nothing", vec![]).unwrap_err();
        assert_eq!(err, MatrixError::EmptyProfile("nothing".to_string()));
    }

    #[test]
    fn test_invalid_profile_id_rejected() {
        let target = TargetSpec::new("x86_64-unknown-linux-gnu", "lin").unwrap();
        assert!(matches!(
            BuildProfile::new("two words", vec![target]),
            Err(MatrixError::InvalidProfileId(_))
        ));
    }

    #[test]
    fn test_from_pairs_length_mismatch() {
        let err = BuildProfile::from_pairs(
            "global",
            &["x86_64-unknown-linux-gnu", "x86_64-unknown-linux-musl"],
            &["linx86_64-libc"],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MatrixError::LengthMismatch {
                profile: "global".to_string(),
                triples: 2,
                export_names: 1,
            }
        );
    }

    #[test]
    fn test_duplicate_profile_rejected() {
        let a = BuildProfile::from_pairs("a", &["x86_64-unknown-linux-gnu"], &["lin"]).unwrap();
        let err = TargetMatrix::builder()
            .profile(a.clone())
            .profile(a)
            .build()
            .unwrap_err();
        assert_eq!(err, MatrixError::DuplicateProfile("a".to_string()));
    }

    #[test]
    fn test_shared_targets_are_copies() {
        let gnu = TargetSpec::new("x86_64-unknown-linux-gnu", "linx86_64-libc").unwrap();
        let musl = TargetSpec::new("x86_64-unknown-linux-musl", "linx86_64-musl").unwrap();
        let matrix = TargetMatrix::builder()
            .profile(BuildProfile::new("global", vec![gnu.clone(), musl]).unwrap())
            .profile(BuildProfile::new("linux", vec![gnu]).unwrap())
            .build()
            .unwrap();
        let global = matrix.lookup("global").unwrap();
        let linux = matrix.lookup("linux").unwrap();
        assert_eq!(global.targets()[0], linux.targets()[0]);
        assert!(!std::ptr::eq(&global.targets()[0], &linux.targets()[0]));
    }

    #[test]
    fn test_profile_digest_is_order_sensitive() {
        let ab = BuildProfile::from_pairs(
            "p",
            &["x86_64-unknown-linux-gnu", "x86_64-unknown-linux-musl"],
            &["a", "b"],
        )
        .unwrap();
        let ba = BuildProfile::from_pairs(
            "p",
            &["x86_64-unknown-linux-musl", "x86_64-unknown-linux-gnu"],
            &["b", "a"],
        )
        .unwrap();
        assert_eq!(ab.digest(), ab.clone().digest());
        assert_ne!(ab.digest(), ba.digest());
    }

    #[test]
    fn test_triple_serde_validates() {
        let ok: CompilerTriple = serde_json::from_str("\"aarch64-apple-darwin\"").unwrap();
        assert_eq!(ok.as_str(), "aarch64-apple-darwin");
        assert!(serde_json::from_str::<CompilerTriple>("\"nope\"").is_err());
    }
}
