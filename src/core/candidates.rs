//! Expansion of a model nickname into the ordered candidate list.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::core::synthesis::{Candidate, Credential, SynthesisError};

/// Resolves `model_to_use` nicknames against the configured model map and
/// credential pool.
///
/// Models stay in their configured priority order; each model is tried with
/// every credential before moving to the next model.
#[derive(Debug, Clone)]
pub struct CandidateResolver {
    models: BTreeMap<String, Vec<String>>,
    credentials: Vec<Credential>,
    default_nickname: String,
    shuffle_credentials: bool,
}

impl CandidateResolver {
    pub fn new(
        models: BTreeMap<String, Vec<String>>,
        credentials: Vec<Credential>,
        default_nickname: impl Into<String>,
        shuffle_credentials: bool,
    ) -> Self {
        let models = models
            .into_iter()
            .map(|(nickname, ids)| (nickname.trim().to_ascii_lowercase(), ids))
            .collect();
        Self {
            models,
            credentials,
            default_nickname: default_nickname.into().trim().to_ascii_lowercase(),
            shuffle_credentials,
        }
    }

    pub fn default_nickname(&self) -> &str {
        &self.default_nickname
    }

    pub fn nicknames(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// Candidate list for `nickname` (the default one when `None` or blank).
    ///
    /// # Errors
    /// `SynthesisError::InvalidRequest` for an unknown nickname or when no
    /// candidate can be built.
    pub fn resolve(&self, nickname: Option<&str>) -> Result<Vec<Candidate>, SynthesisError> {
        self.resolve_with_rng(nickname, &mut rand::rng())
    }

    pub fn resolve_with_rng<R: Rng + ?Sized>(
        &self,
        nickname: Option<&str>,
        rng: &mut R,
    ) -> Result<Vec<Candidate>, SynthesisError> {
        let nickname = nickname
            .map(|n| n.trim().to_ascii_lowercase())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.default_nickname.clone());

        let model_ids = self.models.get(&nickname).ok_or_else(|| {
            SynthesisError::InvalidRequest(format!(
                "Unknown model '{nickname}'. Available: {}",
                self.nicknames().collect::<Vec<_>>().join(", ")
            ))
        })?;

        let mut credentials = self.credentials.clone();
        if self.shuffle_credentials {
            credentials.shuffle(rng);
        }

        let nickname_ref = nickname.as_str();
        let candidates: Vec<Candidate> = model_ids
            .iter()
            .flat_map(|model_id| {
                credentials.iter().map(move |credential| {
                    Candidate::new(nickname_ref, model_id, credential.clone())
                })
            })
            .collect();

        if candidates.is_empty() {
            return Err(SynthesisError::InvalidRequest(format!(
                "No candidates configured for model '{nickname}'"
            )));
        }

        debug!(
            model = %nickname,
            candidates = candidates.len(),
            "Resolved candidate list"
        );

        Ok(candidates)
    }
}
