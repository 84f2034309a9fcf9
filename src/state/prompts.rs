use rand::Rng;
use std::path::Path;

/// Used when no prompt file is available
const DEFAULT_PROMPTS: &[&str] = &[
    "Apple", "House", "Star", "Tree", "Cat", "Bicycle", "Rocket", "Umbrella", "Lighthouse",
    "Snowman", "Guitar", "Volcano", "Octopus", "Castle", "Cactus", "Robot",
];

/// Things players can be asked to draw
#[derive(Debug, Clone)]
pub struct PromptDeck {
    prompts: Vec<String>,
}

impl Default for PromptDeck {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl PromptDeck {
    /// Blank entries are dropped; an empty deck falls back to the built-ins
    pub fn new(prompts: Vec<String>) -> Self {
        let prompts: Vec<String> = prompts
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if prompts.is_empty() {
            return Self {
                prompts: DEFAULT_PROMPTS.iter().map(|p| p.to_string()).collect(),
            };
        }
        Self { prompts }
    }

    /// Load a JSON array of strings. Any problem falls back to the built-ins.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).map_err(|e| e.to_string()));

        match parsed {
            Ok(prompts) => {
                let deck = Self::new(prompts);
                tracing::info!("Loaded {} prompts from {}", deck.len(), path.display());
                deck
            }
            Err(e) => {
                tracing::warn!(
                    "Could not load prompts from {}: {}. Using built-in prompts.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Uniformly random, with replacement
    pub fn pick(&self) -> String {
        let index = rand::rng().random_range(0..self.prompts.len());
        self.prompts[index].clone()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
