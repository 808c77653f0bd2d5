use rand::seq::IndexedRandom;
use rand::Rng;

/// Non-empty collection of prompts the agents are asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBook {
    prompts: Vec<String>,
}

impl PromptBook {
    /// Build a prompt book, dropping blank entries. Returns `None` if nothing is left.
    pub fn new(prompts: Vec<String>) -> Option<Self> {
        let prompts: Vec<String> = prompts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if prompts.is_empty() {
            None
        } else {
            Some(Self { prompts })
        }
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Pick one prompt uniformly at random.
    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        // non-empty by construction
        self.prompts
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn sample(&self) -> String {
        self.sample_with(&mut rand::rng()).to_string()
    }
}
