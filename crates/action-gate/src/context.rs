//! Per-session gate context

use action_locator::{Candidate, CandidateResolver, Locator, PlatformTable, SemanticTarget};
use action_primitives::ActionPrimitives;
use cartpilot_core_types::Platform;
use regex::Regex;
use std::sync::Arc;

use crate::{errors::GateError, types::GateSettings};

/// Everything a gate needs to act on one session's document
#[derive(Clone)]
pub struct GateContext {
    pub platform: Platform,
    pub table: Arc<PlatformTable>,
    pub settings: GateSettings,
    pub resolver: CandidateResolver,
    locator: Arc<dyn Locator>,
    postal_pattern: Regex,
}

impl GateContext {
    pub fn new(
        primitives: Arc<dyn ActionPrimitives>,
        locator: Arc<dyn Locator>,
        platform: Platform,
        settings: GateSettings,
    ) -> Result<Self, GateError> {
        let table = locator
            .profile(&platform)
            .ok_or_else(|| GateError::UnknownPlatform(platform.to_string()))?;
        let postal_pattern = Regex::new(&table.postal_code_pattern)
            .map_err(|err| GateError::InvalidPattern(format!("{}: {}", platform, err)))?;
        Ok(Self {
            resolver: CandidateResolver::new(primitives, settings.action_timeout),
            platform,
            table,
            settings,
            locator,
            postal_pattern,
        })
    }

    pub fn candidates(&self, target: SemanticTarget) -> Vec<Candidate> {
        self.locator.locate(target, &self.platform)
    }

    /// Candidates for the 1-based row or option `index`
    pub fn nth_candidates(&self, target: SemanticTarget, index: usize) -> Vec<Candidate> {
        self.candidates(target)
            .iter()
            .map(|candidate| candidate.nth(index))
            .collect()
    }

    pub fn postal_pattern(&self) -> &Regex {
        &self.postal_pattern
    }
}
