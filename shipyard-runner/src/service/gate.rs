//! Deployment gate
//!
//! Matches a branch or tag name against the allow-list. Every pattern is
//! anchored at both ends, so `master` does not admit `master2`.

use regex::Regex;
use shipyard_core::ConfigError;
use shipyard_core::domain::deploy::{DEFAULT_ALLOWED_REFS, DeployPolicy, DeploymentDecision};

/// Compiled deploy allow-list
#[derive(Debug, Clone)]
pub struct DeploymentGate {
    patterns: Vec<(String, Regex)>,
}

impl DeploymentGate {
    /// Compiles the allow-list
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPattern` for the first pattern that is
    /// not a valid regular expression.
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let source = p.as_ref().to_string();
                let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| {
                    ConfigError::InvalidPattern {
                        pattern: source.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok((source, regex))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { patterns })
    }

    pub fn from_policy(policy: &DeployPolicy) -> Result<Self, ConfigError> {
        Self::new(&policy.allow)
    }

    /// Gate admitting `master` and semantic-version tags
    pub fn default_allow_list() -> Result<Self, ConfigError> {
        Self::new(DEFAULT_ALLOWED_REFS)
    }

    /// Decides whether `ref_name` may deploy
    ///
    /// The first matching pattern wins. An empty name or an empty allow-list
    /// never deploys.
    pub fn should_deploy(&self, ref_name: &str) -> DeploymentDecision {
        if ref_name.is_empty() {
            return DeploymentDecision::denied(ref_name);
        }

        self.patterns
            .iter()
            .find(|(_, regex)| regex.is_match(ref_name))
            .map(|(source, _)| DeploymentDecision::allowed(ref_name, source))
            .unwrap_or_else(|| DeploymentDecision::denied(ref_name))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(source, _)| source.as_str())
    }
}

/// One-shot form of [`DeploymentGate::should_deploy`]
pub fn should_deploy<S: AsRef<str>>(
    ref_name: &str,
    patterns: &[S],
) -> Result<DeploymentDecision, ConfigError> {
    Ok(DeploymentGate::new(patterns)?.should_deploy(ref_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow_list() {
        let gate = DeploymentGate::default_allow_list().unwrap();

        assert!(gate.should_deploy("master").deploy);
        assert!(gate.should_deploy("v1.2.3").deploy);
        assert!(gate.should_deploy("v2").deploy);
        assert!(!gate.should_deploy("feature/x").deploy);
        assert!(!gate.should_deploy("develop").deploy);
    }

    #[test]
    fn test_patterns_are_anchored() {
        let gate = DeploymentGate::default_allow_list().unwrap();

        assert!(!gate.should_deploy("master2").deploy);
        assert!(!gate.should_deploy("old-master").deploy);
        assert!(!gate.should_deploy("xv1").deploy);
        assert!(!gate.should_deploy("v1.2.3-rc1").deploy);
        assert!(!gate.should_deploy("v").deploy);
    }

    #[test]
    fn test_decision_names_matched_pattern() {
        let decision = should_deploy("v1.2.3", &["master", r"v\d+(\.\d+)*"]).unwrap();

        assert!(decision.deploy);
        assert_eq!(decision.matched_pattern.as_deref(), Some(r"v\d+(\.\d+)*"));
        assert!(decision.reason.contains("v1.2.3"));
    }

    #[test]
    fn test_empty_inputs_deny() {
        let empty: [&str; 0] = [];
        assert!(!should_deploy("master", &empty).unwrap().deploy);
        assert!(!should_deploy("", &["master", ".*"]).unwrap().deploy);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let result = should_deploy("master", &["master", "v(\\d+"]);

        match result {
            Err(ConfigError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "v(\\d+"),
            other => panic!("expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_alternation_is_fully_anchored() {
        let gate = DeploymentGate::new(["master|release/.*"]).unwrap();

        assert!(gate.should_deploy("release/1.0").deploy);
        assert!(!gate.should_deploy("hotfix-master").deploy);
        assert_eq!(gate.patterns().collect::<Vec<_>>(), vec!["master|release/.*"]);
    }
}
