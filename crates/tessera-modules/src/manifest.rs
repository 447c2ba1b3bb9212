use std::fs::read_to_string;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tessera_core::{Error, Result};

/// Manifest file name looked for in every module directory.
pub const MANIFEST_FILE_NAME: &str = "go.mod";

/// Directives that are accepted but carry nothing the scheduler needs.
const IGNORED_DIRECTIVES: &[&str] = &[
    "go", "toolchain", "godebug", "exclude", "retract", "tool", "ignore",
];

/// A `require` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Required module id.
    pub module_id: String,
    /// Required version.
    pub version: String,
}

/// Where a `replace` directive points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceTarget {
    /// A directory on disk, as written in the manifest.
    Local(PathBuf),
    /// Another published module.
    Remote {
        /// Replacement module id.
        module_id: String,
        /// Replacement version, if given.
        version: Option<String>,
    },
}

/// A `replace` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    /// Module id being replaced.
    pub module_id: String,
    /// Version being replaced; `None` replaces every version.
    pub version: Option<String>,
    /// Replacement source.
    pub target: ReplaceTarget,
}

/// The parts of a module manifest relevant to scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Declared module id.
    pub module_id: String,
    /// `require` entries in file order.
    pub requirements: Vec<Requirement>,
    /// `replace` entries in file order.
    pub replacements: Vec<Replacement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Require,
    Replace,
    Ignored,
}

impl Manifest {
    /// Read and parse the manifest at `path`.
    ///
    /// # Errors
    /// Returns [`Error::ManifestNotFound`] when the file does not exist, an I/O
    /// error when it cannot be read and [`Error::ManifestParse`] when it is malformed.
    pub fn read(path: &Path) -> Result<Self> {
        let content = read_to_string(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                Error::ManifestNotFound(path.parent().unwrap_or(path).to_path_buf())
            } else {
                Error::Io(err)
            }
        })?;
        Self::parse(path, &content)
    }

    /// Parse manifest text; `path` is only used in error messages.
    ///
    /// # Errors
    /// Returns [`Error::ManifestParse`] naming the offending line.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let fail = |line: usize, reason: &str| Error::ManifestParse {
            path: path.to_path_buf(),
            line,
            reason: reason.to_owned(),
        };

        let mut module_id: Option<String> = None;
        let mut requirements = Vec::new();
        let mut replacements = Vec::new();
        let mut open_block: Option<(Block, usize)> = None;

        for (index, raw) in content.lines().enumerate() {
            let line_number = index + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if let Some((block, _)) = open_block {
                if line == ")" {
                    open_block = None;
                    continue;
                }
                match block {
                    Block::Require => requirements
                        .push(parse_requirement(line).map_err(|reason| fail(line_number, reason))?),
                    Block::Replace => replacements
                        .push(parse_replacement(line).map_err(|reason| fail(line_number, reason))?),
                    Block::Ignored => {}
                }
                continue;
            }

            let (keyword, rest) = line
                .split_once(char::is_whitespace)
                .map_or((line, ""), |(keyword, rest)| (keyword, rest.trim()));
            let (keyword, rest) = match keyword.strip_suffix('(') {
                Some(stripped) if rest.is_empty() => (stripped, "("),
                _ => (keyword, rest),
            };

            match keyword {
                "module" => {
                    if module_id.is_some() {
                        return Err(fail(line_number, "repeated module directive"));
                    }
                    let id = unquote(rest);
                    if id.is_empty() || id.contains(char::is_whitespace) {
                        return Err(fail(line_number, "module directive needs a single module path"));
                    }
                    module_id = Some(id.to_owned());
                }
                "require" | "replace" if rest == "(" => {
                    let block = if keyword == "require" {
                        Block::Require
                    } else {
                        Block::Replace
                    };
                    open_block = Some((block, line_number));
                }
                "require" => requirements
                    .push(parse_requirement(rest).map_err(|reason| fail(line_number, reason))?),
                "replace" => replacements
                    .push(parse_replacement(rest).map_err(|reason| fail(line_number, reason))?),
                other if IGNORED_DIRECTIVES.contains(&other) => {
                    if rest == "(" {
                        open_block = Some((Block::Ignored, line_number));
                    }
                }
                ")" => return Err(fail(line_number, "unexpected ')'")),
                other => return Err(fail(line_number, &format!("unknown directive {other:?}"))),
            }
        }

        if let Some((_, opened_at)) = open_block {
            return Err(fail(opened_at, "block is never closed"));
        }
        let Some(module_id) = module_id else {
            return Err(fail(1, "missing module directive"));
        };

        Ok(Self {
            module_id,
            requirements,
            replacements,
        })
    }

    /// Local replacement targets as `(replaced module id, path as written)`.
    pub fn local_replacements(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.replacements
            .iter()
            .filter_map(|replacement| match &replacement.target {
                ReplaceTarget::Local(path) => Some((replacement.module_id.as_str(), path.as_path())),
                ReplaceTarget::Remote { .. } => None,
            })
    }
}

fn strip_comment(line: &str) -> &str {
    line.find("//").map_or(line, |index| &line[..index])
}

fn unquote(token: &str) -> &str {
    token
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(token)
}

fn parse_requirement(text: &str) -> core::result::Result<Requirement, &'static str> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [module_id, version] => Ok(Requirement {
            module_id: unquote(module_id).to_owned(),
            version: (*version).to_owned(),
        }),
        _ => Err("require entry needs a module path and a version"),
    }
}

fn parse_replacement(text: &str) -> core::result::Result<Replacement, &'static str> {
    let Some((left, right)) = text.split_once("=>") else {
        return Err("replace entry is missing '=>'");
    };
    let left: Vec<&str> = left.split_whitespace().collect();
    let right: Vec<&str> = right.split_whitespace().collect();

    let (module_id, version) = match left.as_slice() {
        [module_id] => (unquote(module_id), None),
        [module_id, version] => (unquote(module_id), Some((*version).to_owned())),
        _ => return Err("replace entry needs a module path before '=>'"),
    };
    let target = match right.as_slice() {
        [target] if is_local_path(unquote(target)) => {
            ReplaceTarget::Local(PathBuf::from(unquote(target)))
        }
        [target] => ReplaceTarget::Remote {
            module_id: unquote(target).to_owned(),
            version: None,
        },
        [target, _] if is_local_path(unquote(target)) => {
            return Err("local replacement must not carry a version");
        }
        [target, version] => ReplaceTarget::Remote {
            module_id: unquote(target).to_owned(),
            version: Some((*version).to_owned()),
        },
        _ => return Err("replace entry needs a target after '=>'"),
    };

    Ok(Replacement {
        module_id: module_id.to_owned(),
        version,
        target,
    })
}

/// Whether a replacement target names a directory rather than a module.
pub fn is_local_path(target: &str) -> bool {
    target == "."
        || target == ".."
        || target.starts_with("./")
        || target.starts_with("../")
        || target.starts_with(".\\")
        || target.starts_with("..\\")
        || target.starts_with('/')
}
