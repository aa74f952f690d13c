//! Window split command filter.
//!
//! Only split commands may pass through `windows/new`: optional position
//! modifiers, then `split`, `vsplit`, `new` or `vnew`, then an optional file
//! argument. Anything that could chain another command is refused: `|`,
//! backtick expansion and words starting with `+` (`+cmd` and `++opt`).

use regex::Regex;
use std::sync::LazyLock;

static SPLIT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((vertical|leftabove|aboveleft|rightbelow|belowright|topleft|botright)\s+)*v?(split|new)(\s+[^+\s|`][^\s|`]*)*$",
    )
    .expect("valid regex")
});

/// Returns `true` if `line` is an accepted window split command.
///
/// # Examples
///
/// ```
/// use nvimfs_bridge::is_split_command;
///
/// assert!(is_split_command("vertical botright vsplit notes.md"));
/// assert!(is_split_command("new"));
/// assert!(!is_split_command("!rm -rf /"));
/// assert!(!is_split_command("split | !rm -rf /"));
/// assert!(!is_split_command("split +!ls notes.md"));
/// ```
#[must_use]
pub fn is_split_command(line: &str) -> bool {
    SPLIT_REGEX.is_match(line.trim())
}
