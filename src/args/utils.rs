//! Shared utilities for argument processing.

/// What: Determine the log level from the command line.
///
/// Inputs:
/// - `args`: Parsed command-line arguments.
///
/// Output:
/// - Log level string (trace, debug, info, warn, error).
///
/// Details:
/// - The verbose flag overrides `--log-level`.
#[must_use]
pub fn determine_log_level(args: &crate::args::Args) -> String {
    if args.verbose {
        "debug".to_string()
    } else {
        args.log_level.clone()
    }
}

/// What: Flatten repeated and comma-separated values into one list.
///
/// Inputs:
/// - `values`: Raw values as given on the command line.
///
/// Output:
/// - Individual trimmed entries, blanks dropped, first occurrence kept.
#[must_use]
pub fn parse_list(values: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for value in values {
        for item in value.split(',') {
            let trimmed = item.trim();
            if !trimmed.is_empty() && !result.iter().any(|r| r == trimmed) {
                result.push(trimmed.to_string());
            }
        }
    }
    result
}
