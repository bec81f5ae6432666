use rand::rngs::OsRng;
use rand::{Rng, RngCore};

use super::domain::{FileId, SubmissionId};

/// z-base-32 with the look-alike symbols removed.
pub const REFERENCE_ALPHABET: &str = "YBNDRFG8EJKMCPQXTUWSZA345H769";
pub const PLACEHOLDER: char = '#';

/// Template for confirmation references: `#` positions are drawn from the alphabet, any other
/// character is copied through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePattern {
    template: String,
}

impl ReferencePattern {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let alphabet: Vec<char> = REFERENCE_ALPHABET.chars().collect();
        self.template
            .chars()
            .map(|symbol| match symbol {
                PLACEHOLDER => alphabet[rng.gen_range(0..alphabet.len())],
                literal => literal,
            })
            .collect()
    }

    /// Whether `candidate` could have been produced by this pattern.
    #[cfg(test)]
    pub(crate) fn matches(&self, candidate: &str) -> bool {
        candidate.chars().count() == self.template.chars().count()
            && self
                .template
                .chars()
                .zip(candidate.chars())
                .all(|(symbol, actual)| match symbol {
                    PLACEHOLDER => REFERENCE_ALPHABET.contains(actual),
                    literal => literal == actual,
                })
    }
}

/// Source of identifiers and confirmation references.
pub trait IdGenerator: Send + Sync {
    fn submission_id(&self) -> SubmissionId;
    fn file_id(&self) -> FileId;
    fn confirmation_reference(&self) -> String;
}

/// Draws everything from the operating system CSPRNG.
#[derive(Debug, Clone)]
pub struct RandomIdGenerator {
    pattern: ReferencePattern,
}

impl RandomIdGenerator {
    pub fn new(pattern: ReferencePattern) -> Self {
        Self { pattern }
    }

    fn hex_id() -> String {
        let mut bytes = [0u8; 12];
        OsRng.fill_bytes(&mut bytes);
        bytes.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl IdGenerator for RandomIdGenerator {
    fn submission_id(&self) -> SubmissionId {
        SubmissionId(Self::hex_id())
    }

    fn file_id(&self) -> FileId {
        FileId(Self::hex_id())
    }

    fn confirmation_reference(&self) -> String {
        self.pattern.generate(&mut OsRng)
    }
}
