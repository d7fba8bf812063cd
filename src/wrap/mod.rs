//! Wrap declaration files
//!
//! A wrap file describes how to acquire one external subproject. It is an
//! INI-like text file with exactly one section whose name carries the source
//! kind, e.g.:
//!
//! ```ini
//! [wrap-file]
//! directory = zlib-1.2.8
//! source_url = http://zlib.net/zlib-1.2.8.tar.gz
//! source_filename = zlib-1.2.8.tar.gz
//! source_hash = 36658cb768a54c1d4dec43c3116c27ed893e88b02ecfcb44f2166f9c0b7f2a0d
//! ```
//!
//! The section name must start with `wrap-`; the remainder selects one of
//! the four source kinds ([`WrapKind`]). All key/value pairs are kind
//! dependent and free form. Known keys: `directory`, `url`, `revision`,
//! `source_url`, `source_filename`, `source_hash`, `patch_url`,
//! `patch_filename`, `patch_hash`, `lead_directory_missing`,
//! `clone-recursive`, `push-url`.
//!
//! Wrap files are parsed fresh on every resolution attempt and never
//! mutated. Field access is explicit: [`WrapFile::get`] fails with a typed
//! missing-field error, [`WrapFile::get_opt`] is the optional lookup for
//! fields that may legitimately be absent.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::constants::WRAP_SECTION_PREFIX;
use crate::core::WrapError;

/// The source kind of a wrap declaration, parsed from the section name
/// suffix. A closed set: any other suffix is rejected at load time, which
/// makes the resolver's kind dispatch exhaustive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapKind {
    /// Pre-packaged source archive downloaded over HTTP(S).
    File,
    /// Git checkout.
    Git,
    /// Mercurial checkout.
    Hg,
    /// Subversion checkout.
    Svn,
}

impl WrapKind {
    fn from_section_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "file" => Some(Self::File),
            "git" => Some(Self::Git),
            "hg" => Some(Self::Hg),
            "svn" => Some(Self::Svn),
            _ => None,
        }
    }
}

impl fmt::Display for WrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Git => "git",
            Self::Hg => "hg",
            Self::Svn => "svn",
        };
        write!(f, "{name}")
    }
}

/// A parsed, immutable wrap declaration.
#[derive(Debug, Clone)]
pub struct WrapFile {
    kind: WrapKind,
    values: HashMap<String, String>,
}

impl WrapFile {
    /// Load and parse a wrap file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`WrapError::DeclarationFormat`] if the file does not contain
    /// exactly one `wrap-*` section with a known kind suffix, or contains
    /// lines that are neither comments nor `key = value` pairs.
    pub fn load(path: &Path) -> Result<Self, WrapError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse wrap file content. `file` is used in error messages only.
    pub fn parse(content: &str, file: &str) -> Result<Self, WrapError> {
        let format_err = |reason: &str| WrapError::DeclarationFormat {
            file: file.to_string(),
            reason: reason.to_string(),
        };

        let mut section: Option<String> = None;
        let mut values = HashMap::new();

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[') {
                let name = name
                    .strip_suffix(']')
                    .ok_or_else(|| format_err(&format!("unterminated section header on line {}", lineno + 1)))?;
                if section.is_some() {
                    return Err(format_err("more than one section"));
                }
                section = Some(name.trim().to_string());
            } else if let Some((key, value)) = line.split_once('=') {
                if section.is_none() {
                    return Err(format_err(&format!("key/value pair outside any section on line {}", lineno + 1)));
                }
                values.insert(key.trim().to_string(), value.trim().to_string());
            } else {
                return Err(format_err(&format!("malformed line {}", lineno + 1)));
            }
        }

        let section = section.ok_or_else(|| format_err("no wrap section found"))?;
        let suffix = section
            .strip_prefix(WRAP_SECTION_PREFIX)
            .ok_or_else(|| format_err(&format!("section '{section}' does not start with '{WRAP_SECTION_PREFIX}'")))?;
        let kind = WrapKind::from_section_suffix(suffix)
            .ok_or_else(|| format_err(&format!("unknown wrap kind '{suffix}'")))?;

        Ok(Self { kind, values })
    }

    /// The declaration's source kind.
    #[must_use]
    pub const fn kind(&self) -> WrapKind {
        self.kind
    }

    /// Fetch a required field.
    ///
    /// # Errors
    ///
    /// Returns [`WrapError::FieldMissing`] if the key was not declared.
    /// Callers must only request fields valid for the declaration's kind.
    pub fn get(&self, key: &str) -> Result<&str, WrapError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| WrapError::FieldMissing {
                key: key.to_string(),
            })
    }

    /// Fetch an optional field.
    #[must_use]
    pub fn get_opt(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Whether a boolean-valued field is declared as `true`.
    #[must_use]
    pub fn is_true(&self, key: &str) -> bool {
        self.get_opt(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Whether this declaration carries a patch overlay.
    #[must_use]
    pub fn has_patch(&self) -> bool {
        self.values.contains_key("patch_url")
    }
}
