//! Arrow notation for proxy log lines.
//!
//! ```text
//! ->  forwarded unchanged
//! ~>  path rewritten
//! =>  target changed by a target table
//! ≈>  both
//! ```

/// Classify which transformations were applied to a request.
pub fn format_arrow(
    original_path: &str,
    new_path: &str,
    original_target: &str,
    new_target: &str,
) -> &'static str {
    let is_new_path = original_path != new_path;
    let is_new_target = original_target != new_target;

    match (is_new_path, is_new_target) {
        (false, false) => "->",
        (true, false) => "~>",
        (false, true) => "=>",
        (true, true) => "≈>",
    }
}
