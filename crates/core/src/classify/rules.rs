/// Immediate verdict for a foreground window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    Distracting,
    Productive,
    /// No rule matched; defer to the debounced classifier.
    Ambiguous,
}

/// One substring rule. Matching is case-insensitive over the window title
/// and process name.
#[derive(Debug, Clone)]
pub struct WindowRule {
    pub needle: String,
    pub verdict: WindowVerdict,
}

/// Ordered keyword policy, first match wins. This is configuration, not
/// logic: the default table lives in [`crate::config::VigilCfg`].
#[derive(Debug, Clone)]
pub struct WindowRules {
    rules: Vec<WindowRule>,
}

impl WindowRules {
    pub fn new(rules: Vec<WindowRule>) -> Self {
        Self { rules }
    }

    /// Distracting rules first, then productive, mirroring the env-config
    /// keyword lists.
    pub fn from_keywords(distracting: &[String], productive: &[String]) -> Self {
        let mut rules = Vec::with_capacity(distracting.len() + productive.len());
        for kw in distracting {
            rules.push(WindowRule { needle: kw.to_lowercase(), verdict: WindowVerdict::Distracting });
        }
        for kw in productive {
            rules.push(WindowRule { needle: kw.to_lowercase(), verdict: WindowVerdict::Productive });
        }
        Self { rules }
    }

    pub fn classify(&self, window_title: &str, process_name: &str) -> WindowVerdict {
        let haystack = format!("{} {}", window_title.to_lowercase(), process_name.to_lowercase());
        for rule in &self.rules {
            if haystack.contains(&rule.needle) {
                return rule.verdict;
            }
        }
        WindowVerdict::Ambiguous
    }
}

impl Default for WindowRules {
    fn default() -> Self {
        let cfg = crate::config::VigilCfg::default();
        Self::from_keywords(&cfg.distracting_keywords, &cfg.productive_keywords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let rules = WindowRules::new(vec![
            WindowRule { needle: "docs".into(), verdict: WindowVerdict::Productive },
            WindowRule { needle: "youtube".into(), verdict: WindowVerdict::Distracting },
        ]);
        // both needles match; ordering decides
        assert_eq!(
            rules.classify("YouTube docs tutorial", "firefox"),
            WindowVerdict::Productive
        );
    }

    #[test]
    fn matches_title_and_process_case_insensitively() {
        let rules = WindowRules::default();
        assert_eq!(rules.classify("WATCH: cat videos - YOUTUBE", "firefox"), WindowVerdict::Distracting);
        assert_eq!(rules.classify("main.rs", "Visual Studio Code"), WindowVerdict::Productive);
    }

    #[test]
    fn unmatched_is_ambiguous() {
        let rules = WindowRules::default();
        assert_eq!(rules.classify("weather.com", "firefox"), WindowVerdict::Ambiguous);
    }
}
