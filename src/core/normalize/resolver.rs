//! Company-name to account-code resolution

use crate::adapters::crm::models::AccountEntry;
use strsim::normalized_levenshtein;

/// Resolves a free-text company name to an account code
pub trait CompanyResolver: Send + Sync {
    fn resolve(&self, company: &str) -> Option<String>;
}

/// Approximate matcher over the CRM account names
///
/// Both sides are lower-cased and their whitespace tokens sorted before
/// comparison, so word order does not matter. The score is normalized
/// Levenshtein similarity on 0-100, which runs lower than an insert/delete-only
/// ratio when characters are transposed. A match is accepted only when the score
/// is strictly above the threshold; ties keep the earlier account.
#[derive(Debug, Clone)]
pub struct FuzzyCompanyResolver {
    accounts: Vec<(String, String)>,
    threshold: u8,
}

impl FuzzyCompanyResolver {
    pub fn new(accounts: &[AccountEntry], threshold: u8) -> Self {
        let accounts = accounts
            .iter()
            .filter(|a| !a.name.trim().is_empty() && !a.code.trim().is_empty())
            .map(|a| (token_sort_key(&a.name), a.code.clone()))
            .collect();
        Self {
            accounts,
            threshold,
        }
    }

    /// Best match and its score, regardless of the threshold
    pub fn best_match(&self, company: &str) -> Option<(&str, u8)> {
        let key = token_sort_key(company);
        if key.is_empty() {
            return None;
        }

        let mut best: Option<(&str, u8)> = None;
        for (name_key, code) in &self.accounts {
            let score = token_sort_levenshtein(&key, name_key);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((code.as_str(), score));
            }
        }
        best
    }
}

impl CompanyResolver for FuzzyCompanyResolver {
    fn resolve(&self, company: &str) -> Option<String> {
        match self.best_match(company) {
            Some((code, score)) if score > self.threshold => Some(code.to_string()),
            Some((code, score)) => {
                tracing::debug!(company, closest = code, score, "No account close enough");
                None
            }
            None => None,
        }
    }
}

fn token_sort_key(value: &str) -> String {
    let lowered = value.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_sort_levenshtein(a: &str, b: &str) -> u8 {
    (normalized_levenshtein(a, b) * 100.0).round() as u8
}
