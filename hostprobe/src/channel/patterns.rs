//! Patterns for elevation prompts and permission failures.

use regex::Regex;

/// Default pattern for a password request from `sudo`/`su`.
const PASSWORD_PROMPT: &str = r"^\s*(\[sudo\] )?[Pp]assword( for [^:]+)?:\s*$";

/// Default pattern for a rejected elevation secret.
const REJECTED: &str = r"^\s*[Ss]orry, try again\.?\s*$";

/// Default pattern for a denied operation.
const PERMISSION_DENIED: &str = r"[Pp]ermission denied";

/// How a line of shell output should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    /// The remote is waiting for the elevation secret.
    PasswordPrompt,
    /// The elevation secret was rejected.
    Rejected,
    /// An operation was denied; output may still be partially valid.
    PermissionDenied,
    /// Regular output.
    Output,
}

/// Compiled elevation patterns.
#[derive(Debug, Clone)]
pub struct ElevationPatterns {
    password_prompt: Regex,
    rejected: Regex,
    permission_denied: Regex,
}

impl ElevationPatterns {
    /// Compile custom patterns.
    pub fn new(
        password_prompt: &str,
        rejected: &str,
        permission_denied: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            password_prompt: Regex::new(password_prompt)?,
            rejected: Regex::new(rejected)?,
            permission_denied: Regex::new(permission_denied)?,
        })
    }

    /// Classify one line of output.
    ///
    /// Prompt and rejection take precedence over permission denial.
    pub fn classify(&self, line: &str) -> LineClass {
        if self.password_prompt.is_match(line) {
            LineClass::PasswordPrompt
        } else if self.rejected.is_match(line) {
            LineClass::Rejected
        } else if self.permission_denied.is_match(line) {
            LineClass::PermissionDenied
        } else {
            LineClass::Output
        }
    }

    /// Whether an unterminated fragment is a password prompt.
    pub fn is_prompt(&self, fragment: &str) -> bool {
        !fragment.is_empty() && self.password_prompt.is_match(fragment)
    }
}

impl Default for ElevationPatterns {
    fn default() -> Self {
        Self {
            password_prompt: Regex::new(PASSWORD_PROMPT).unwrap(),
            rejected: Regex::new(REJECTED).unwrap(),
            permission_denied: Regex::new(PERMISSION_DENIED).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_prompts() {
        let patterns = ElevationPatterns::default();
        assert_eq!(patterns.classify("[sudo] password for admin: "), LineClass::PasswordPrompt);
        assert_eq!(patterns.classify("Password:"), LineClass::PasswordPrompt);
        assert_eq!(patterns.classify("password: "), LineClass::PasswordPrompt);
        assert_eq!(patterns.classify("Password changed: yes"), LineClass::Output);
    }

    #[test]
    fn test_rejection() {
        let patterns = ElevationPatterns::default();
        assert_eq!(patterns.classify("Sorry, try again."), LineClass::Rejected);
        assert_eq!(patterns.classify("sorry, try again"), LineClass::Rejected);
    }

    #[test]
    fn test_permission_denied() {
        let patterns = ElevationPatterns::default();
        assert_eq!(
            patterns.classify("ls: cannot open directory '/root': Permission denied"),
            LineClass::PermissionDenied
        );
        assert_eq!(patterns.classify("/dev/sda1 ext4"), LineClass::Output);
    }

    #[test]
    fn test_prompt_fragment() {
        let patterns = ElevationPatterns::default();
        assert!(patterns.is_prompt("[sudo] password for admin: "));
        assert!(!patterns.is_prompt(""));
        assert!(!patterns.is_prompt("Filesystem  Size"));
    }

    #[test]
    fn test_custom_patterns() {
        let patterns = ElevationPatterns::new(r"^Kennwort:\s*$", r"^Falsch$", r"verweigert").unwrap();
        assert_eq!(patterns.classify("Kennwort: "), LineClass::PasswordPrompt);
        assert_eq!(patterns.classify("Falsch"), LineClass::Rejected);
        assert_eq!(patterns.classify("Zugriff verweigert"), LineClass::PermissionDenied);
        assert!(ElevationPatterns::new("(", "x", "y").is_err());
    }
}
