//! Verification report.

use std::fmt;

/// Outcome of one verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Step succeeded.
    Pass,
    /// Step failed.
    Fail,
    /// Step not run because an earlier one failed.
    Skip,
}

impl CheckStatus {
    /// Lowercase name used in the JSON report.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
        }
    }
}

/// One verification step.
#[derive(Debug, Clone)]
pub struct Check {
    /// Step name.
    pub name: &'static str,
    /// Outcome.
    pub status: CheckStatus,
    /// Detail shown next to the outcome.
    pub detail: String,
}

impl Check {
    /// A passed step.
    pub fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, detail: detail.into() }
    }

    /// A failed step.
    pub fn fail(name: &'static str, detail: impl fmt::Display) -> Self {
        Self { name, status: CheckStatus::Fail, detail: detail.to_string() }
    }

    /// A skipped step.
    pub fn skip(name: &'static str) -> Self {
        Self { name, status: CheckStatus::Skip, detail: "previous step failed".to_owned() }
    }
}

/// Result of a verification run against one vendor profile.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Active profile name, once the registry is loaded.
    pub profile: Option<String>,
    /// Vendor base URL, once the registry is loaded.
    pub base_url: Option<String>,
    /// Steps in the order they ran.
    pub checks: Vec<Check>,
}

impl Report {
    /// Appends a step.
    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// `true` if no step failed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }

    /// Renders the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let checks: Vec<_> = self
            .checks
            .iter()
            .map(|c| {
                serde_json::json!({
                    "name": c.name,
                    "status": c.status.as_str(),
                    "detail": c.detail,
                })
            })
            .collect();

        serde_json::to_string_pretty(&serde_json::json!({
            "passed": self.passed(),
            "profile": self.profile,
            "base_url": self.base_url,
            "checks": checks,
        }))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(profile), Some(base_url)) = (&self.profile, &self.base_url) {
            writeln!(f, "profile {profile} ({base_url})")?;
        }
        for check in &self.checks {
            writeln!(f, "  [{:<4}] {:<12} {}", check.status.as_str(), check.name, check.detail)?;
        }
        write!(f, "{}", if self.passed() { "OK" } else { "FAILED" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(checks: Vec<Check>) -> Report {
        Report {
            profile: Some("production".to_owned()),
            base_url: Some("http://vendor.example.com:9337/".to_owned()),
            checks,
        }
    }

    #[test]
    fn test_passed_ignores_skips() {
        assert!(report(vec![Check::pass("config", "51 endpoints")]).passed());
        assert!(!report(vec![Check::fail("login", "wrong password"), Check::skip("devices")]).passed());
        assert!(Report::default().passed());
    }

    #[test]
    fn test_to_json() {
        let json = report(vec![Check::pass("config", "51 endpoints"), Check::fail("login", "code 1001")])
            .to_json()
            .unwrap();

        assert!(json.contains("\"passed\": false"));
        assert!(json.contains("\"profile\": \"production\""));
        assert!(json.contains("\"status\": \"fail\""));
        assert!(json.contains("\"detail\": \"code 1001\""));
    }

    #[test]
    fn test_display() {
        let text = report(vec![Check::pass("login", "token cached"), Check::skip("devices")]).to_string();

        assert!(text.starts_with("profile production (http://vendor.example.com:9337/)"));
        assert!(text.contains("[pass] login"));
        assert!(text.contains("[skip] devices"));
        assert!(text.ends_with("OK"));
    }

    #[test]
    fn test_status_as_str() {
        assert_eq!(CheckStatus::Pass.as_str(), "pass");
        assert_eq!(CheckStatus::Fail.as_str(), "fail");
        assert_eq!(CheckStatus::Skip.as_str(), "skip");
    }
}
