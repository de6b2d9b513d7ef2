//! Version range matching using semver.

use super::error::PkgError;
use semver::{Version, VersionReq};

/// Pick the highest published version satisfying `range`.
///
/// # Rules
/// - An exact version is returned if it is published
/// - Otherwise `range` is treated as a semver range
/// - Supports OR ranges (`^1.0.0 || ^2.0.0`), hyphen ranges (`1.0.0 - 2.0.0`),
///   x-ranges (`1.x`) and space-separated comparators (`>=1.0.0 <2.0.0`)
///
/// Versions that do not parse as semver are ignored.
///
/// # Errors
/// Returns an error if the range is invalid or nothing satisfies it.
pub fn resolve_version(name: &str, versions: &[&str], range: &str) -> Result<String, PkgError> {
    let range = range.trim();

    if Version::parse(range).is_ok() && versions.contains(&range) {
        return Ok(range.to_string());
    }

    let mut parsed: Vec<Version> = versions
        .iter()
        .filter_map(|v| Version::parse(v).ok())
        .collect();
    parsed.sort_by(|a, b| b.cmp(a));

    let reqs = parse_alternatives(range)?;

    parsed
        .iter()
        .find(|version| reqs.iter().any(|req| req.matches(version)))
        .map(ToString::to_string)
        .ok_or_else(|| PkgError::version_not_found(name, range))
}

fn parse_alternatives(range: &str) -> Result<Vec<VersionReq>, PkgError> {
    if !range.contains("||") {
        return Ok(vec![parse_range(range)?]);
    }

    // Invalid alternatives are skipped as long as one survives
    let reqs: Vec<VersionReq> = range
        .split("||")
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .filter_map(|alt| parse_range(alt).ok())
        .collect();

    if reqs.is_empty() {
        return Err(PkgError::spec_invalid(format!(
            "Invalid version range '{range}': no valid alternatives"
        )));
    }

    Ok(reqs)
}

/// Parse a single range, translating the common npm-style forms that the
/// `semver` crate does not accept directly.
fn parse_range(range: &str) -> Result<VersionReq, PkgError> {
    let range = range.trim();

    let converted = if let Some((start, end)) = range.split_once(" - ") {
        format!(">={}, <={}", start.trim(), end.trim())
    } else if range.contains(['x', 'X']) || range == "*" {
        convert_x_range(range)
    } else {
        convert_space_separated_comparators(range)
    };

    VersionReq::parse(&converted)
        .map_err(|e| PkgError::spec_invalid(format!("Invalid version range '{range}': {e}")))
}

/// `">= 2.1.2 < 3.0.0"` becomes `">=2.1.2, <3.0.0"`.
fn convert_space_separated_comparators(range: &str) -> String {
    let mut result = String::new();
    let mut pending_op = String::new();

    for token in range.split_whitespace() {
        if token.chars().any(|c| c.is_ascii_digit()) {
            if !result.is_empty() {
                result.push_str(", ");
            }
            result.push_str(&pending_op);
            result.push_str(token);
            pending_op.clear();
        } else {
            // Operator separated from its version by a space
            pending_op.push_str(token);
        }
    }

    if result.is_empty() {
        range.to_string()
    } else {
        result
    }
}

fn convert_x_range(range: &str) -> String {
    if range == "*" || range.eq_ignore_ascii_case("x") {
        return ">=0.0.0".to_string();
    }

    let parts: Vec<&str> = range.split('.').collect();

    match parts.as_slice() {
        [major, "x" | "X" | "*"] => {
            if let Ok(m) = major.parse::<u64>() {
                return format!(">={m}.0.0, <{}.0.0", m + 1);
            }
        }
        [major, minor, "x" | "X" | "*"] => {
            if let (Ok(m), Ok(n)) = (major.parse::<u64>(), minor.parse::<u64>()) {
                return format!(">={m}.{n}.0, <{m}.{}.0", n + 1);
            }
        }
        _ => {}
    }

    range.replace(['x', 'X'], "0")
}
