//! npm-style version ranges on top of `semver`.
//!
//! npm ranges differ from Cargo requirements in a few ways: comparators are
//! separated by spaces rather than commas, a bare version means "exactly",
//! hyphen ranges and `x` wildcards are allowed, and `||` joins alternatives.
//! [`Range::parse`] rewrites each alternative into a [`semver::VersionReq`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use semver::{BuildMetadata, Comparator, Op, Prerelease, Version, VersionReq};
use tracing::debug;

use crate::error::{LeapfrogError, Result};

static HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s+-\s+(\S+)$").unwrap());

static VERSION_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z.-]+))?").unwrap()
});

/// A parsed version range.
#[derive(Debug, Clone, PartialEq)]
pub enum Range {
    /// Matches every release version (`*`, `x`, `latest`, empty).
    /// Prereleases are excluded, as with any comparator that does not
    /// name one.
    Any,
    /// Matches when any alternative matches.
    Alternatives(Vec<VersionReq>),
    /// Not a version range (dist-tag, URL, `workspace:`). Matches anything.
    Unparsed(String),
}

impl Range {
    /// Parse an npm-style range.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let mut alternatives = Vec::new();

        for alternative in input.split("||") {
            let Some(text) = normalize(alternative.trim()) else {
                return Ok(Self::Any);
            };
            let req = VersionReq::parse(&text).map_err(|e| LeapfrogError::InvalidRange {
                range: input.to_string(),
                message: e.to_string(),
            })?;
            alternatives.push(req);
        }

        Ok(Self::Alternatives(alternatives))
    }

    /// Parse a range, keeping unparseable input as [`Range::Unparsed`].
    pub fn lenient(input: &str) -> Self {
        Self::parse(input).unwrap_or_else(|e| {
            debug!("{}; treating as satisfied by any version", e);
            Self::Unparsed(input.trim().to_string())
        })
    }

    /// Check if a version satisfies the range.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Any => version.pre.is_empty(),
            Self::Unparsed(_) => true,
            Self::Alternatives(reqs) => reqs.iter().any(|r| r.matches(version)),
        }
    }

    /// Check if a version may be picked for the range.
    ///
    /// Same as [`Range::matches`], except that an unparsed range only
    /// picks release versions.
    pub fn selects(&self, version: &Version) -> bool {
        match self {
            Self::Unparsed(_) => version.pre.is_empty(),
            _ => self.matches(version),
        }
    }

    /// Smallest versions admitted by each comparator of the range.
    ///
    /// Used as candidates when searching for a version that satisfies
    /// several ranges at once.
    pub fn lower_bounds(&self) -> Vec<Version> {
        let Self::Alternatives(reqs) = self else {
            return Vec::new();
        };
        reqs.iter()
            .flat_map(|r| r.comparators.iter())
            .filter_map(lower_bound)
            .collect()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Alternatives(reqs) => {
                let parts: Vec<String> = reqs.iter().map(|r| r.to_string()).collect();
                f.write_str(&parts.join(" || "))
            }
            Self::Unparsed(raw) => f.write_str(raw),
        }
    }
}

/// Rewrite one npm alternative into `semver` syntax. `None` means any.
fn normalize(alternative: &str) -> Option<String> {
    if matches!(alternative, "" | "*" | "x" | "X" | "latest") {
        return None;
    }

    if let Some(caps) = HYPHEN.captures(alternative) {
        return Some(format!(
            ">={}, <={}",
            strip_wildcards(strip_v(&caps[1])),
            strip_wildcards(strip_v(&caps[2]))
        ));
    }

    let mut comparators = Vec::new();
    let mut pending_op = String::new();

    for token in alternative.split_whitespace() {
        if token.chars().all(is_op_char) {
            pending_op.push_str(token);
            continue;
        }
        let token = format!("{}{}", std::mem::take(&mut pending_op), token);
        let split = token.find(|c: char| !is_op_char(c)).unwrap_or(token.len());
        let (op, rest) = token.split_at(split);
        let rest = strip_wildcards(strip_v(rest));

        if rest.is_empty() {
            continue;
        }
        let op = if op.is_empty() { "=" } else { op };
        comparators.push(format!("{}{}", op, rest));
    }

    if comparators.is_empty() {
        None
    } else {
        Some(comparators.join(", "))
    }
}

fn is_op_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=' | '~' | '^')
}

fn strip_v(s: &str) -> &str {
    s.strip_prefix('v').unwrap_or(s)
}

/// Drop trailing `x`/`*` segments: `1.2.x` becomes `1.2`.
fn strip_wildcards(s: &str) -> &str {
    let mut s = s;
    loop {
        if matches!(s, "x" | "X" | "*") {
            return "";
        }
        match s.rsplit_once('.') {
            Some((head, "x" | "X" | "*")) => s = head,
            _ => return s,
        }
    }
}

fn lower_bound(c: &Comparator) -> Option<Version> {
    let minor = c.minor.unwrap_or(0);
    let patch = c.patch.unwrap_or(0);
    let version = match c.op {
        Op::Exact | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard => {
            Version::new(c.major, minor, patch)
        }
        Op::Greater => match (c.minor, c.patch) {
            (Some(_), Some(_)) => Version::new(c.major, minor, patch.checked_add(1)?),
            (Some(_), None) => Version::new(c.major, minor.checked_add(1)?, 0),
            _ => Version::new(c.major.checked_add(1)?, 0, 0),
        },
        _ => return None,
    };
    Some(Version {
        pre: if c.op == Op::Greater {
            Prerelease::EMPTY
        } else {
            c.pre.clone()
        },
        build: BuildMetadata::EMPTY,
        ..version
    })
}

/// Parse a version leniently: `v1.2`, `^1.2.3` and `1.2.3-rc.1` all yield
/// a version; text with no digits does not.
pub fn coerce(input: &str) -> Option<Version> {
    let input = input.trim();
    if let Ok(v) = Version::parse(strip_v(input)) {
        return Some(v);
    }

    let caps = VERSION_LIKE.captures(input)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    let mut version = Version::new(part(1)?, part(2).unwrap_or(0), part(3).unwrap_or(0));
    if caps.get(3).is_some() {
        if let Some(pre) = caps.get(4) {
            version.pre = Prerelease::new(pre.as_str()).unwrap_or(Prerelease::EMPTY);
        }
    }
    Some(version)
}

/// Check if a resolved version satisfies a range.
///
/// A version or range that cannot be parsed is treated as satisfied.
pub fn satisfies(version: &str, range: &str) -> bool {
    match coerce(version) {
        Some(v) => Range::lenient(range).matches(&v),
        None => {
            debug!("Cannot parse version '{}'; treating as satisfying '{}'", version, range);
            true
        }
    }
}

/// Highest version satisfying every range.
///
/// Candidates are the `known` versions plus the lower bound of every
/// comparator in `ranges`. An exact version in `ranges` is its own lower
/// bound.
pub fn intersect<S: AsRef<str>>(ranges: &[S], known: &[Version]) -> Option<Version> {
    let parsed: Vec<Range> = ranges.iter().map(|r| Range::lenient(r.as_ref())).collect();

    let mut candidates: Vec<Version> = known.to_vec();
    candidates.extend(parsed.iter().flat_map(Range::lower_bounds));

    candidates
        .into_iter()
        .filter(|v| parsed.iter().all(|r| r.matches(v)))
        .max()
}
