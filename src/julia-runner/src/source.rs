//! Julia source construction and name allow-listing.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::DispatchError;
use crate::registry::JuliaTool;

/// Registered package name, optionally with `.jl` and an `@version` pin.
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.jl)?(@[0-9]+(\.[0-9]+)*)?$")
        .expect("Invalid package name regex")
});

/// Possibly module-qualified function, macro or mutating function name.
static FUNCTION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\p{L}_][\p{L}\p{N}_]*\.)*@?[\p{L}_][\p{L}\p{N}_]*!?$")
        .expect("Invalid function name regex")
});

/// Bare operator such as `+`, `==` or `<:`.
static OPERATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+*/\\^%&|<>=!~÷⊻∘≤≥≠:.]{1,3}$").expect("Invalid operator regex")
});

pub fn is_valid_package_name(name: &str) -> bool {
    PACKAGE_NAME.is_match(name)
}

pub fn is_valid_function_name(name: &str) -> bool {
    FUNCTION_NAME.is_match(name) || OPERATOR.is_match(name)
}

/// Check a tool argument against the allow-list for its tool. Code is
/// passed through untouched.
pub fn check_argument(tool: JuliaTool, value: &str) -> Result<(), DispatchError> {
    let valid = match tool {
        JuliaTool::AddPackage => is_valid_package_name(value),
        JuliaTool::Documentation => is_valid_function_name(value),
        JuliaTool::ExecuteCode | JuliaTool::InstalledPackages => true,
    };
    if valid {
        Ok(())
    } else {
        Err(DispatchError::InvalidParams(format!(
            "Invalid {} for {}: {value:?}",
            argument_label(tool),
            tool.name()
        )))
    }
}

fn argument_label(tool: JuliaTool) -> &'static str {
    tool.required_argument()
        .map(|arg| arg.name)
        .unwrap_or("argument")
}

/// Quote `value` as a Julia string literal.
///
/// Escapes backslashes, double quotes and `$`, so the result never
/// interpolates or terminates early.
pub fn julia_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '$' => quoted.push_str("\\$"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Build the program for one tool call. Every program first activates the
/// project environment.
///
/// `argument` is the tool's required argument, empty for tools without one.
pub fn build_source(tool: JuliaTool, project_dir: &Path, argument: &str) -> String {
    let prelude = format!(
        "using Pkg; Pkg.activate({}); ",
        julia_string(&project_dir.to_string_lossy())
    );
    let body = match tool {
        JuliaTool::ExecuteCode => argument.to_string(),
        JuliaTool::AddPackage => format!("Pkg.add({})", julia_string(argument)),
        JuliaTool::InstalledPackages => "Pkg.status()".to_string(),
        JuliaTool::Documentation => format!("println(@doc {argument})"),
    };
    prelude + &body
}
