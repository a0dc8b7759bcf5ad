//! Person names from a closed first-name list and surname suffixes

use super::{compile_patterns, entity_at, no_patterns, FirstWins, RecognizerPass};
use crate::error::Result;
use crate::span::TextIndex;
use crate::types::{Entity, EntityType};
use regex::Regex;
use std::sync::OnceLock;

const FIRST_NAME_CONFIDENCE: f64 = 0.85;
const SURNAME_CONFIDENCE: f64 = 0.80;

const FIRST_NAMES: &[&str] = &[
    "Anna", "Lars", "Erik", "Maria", "Johan", "Emma", "Oscar", "Patrik", "Fredrik", "Christina",
    "Magnus", "Susanne", "Anders", "Helena", "Per", "Margareta", "Stefan", "Birgitta", "Mikael",
    "Elisabeth", "Jonas", "Eva", "David", "Ingrid", "Daniel", "Marie", "Thomas", "Linda",
    "Marcus", "Karin", "Mattias", "Sara", "Andreas", "Lena", "Peter", "Annika", "Christer",
    "Monica", "Martin", "Inger", "Robert", "Åsa", "Nils", "Gunilla", "Kristina", "Ulf", "Ulrika",
    "Carl", "Björn", "Sven", "Astrid", "Gustav", "Mats", "Lisa", "Alexander", "Jenny", "Henrik",
    "Malin", "Niklas", "Elin", "Jan", "Kerstin", "Håkan", "Barbro", "Bengt", "Marianne", "Karl",
    "Ingela", "Göran", "Ann", "Lennart", "Carina", "Leif", "Camilla", "Tommy", "Sofia", "Kenneth",
    "Jessica", "Roger", "Caroline", "Tomas", "Katarina", "Rolf", "Louise", "Hans", "Sandra",
    "Claes", "Rebecca", "Bo", "Johanna", "Arne", "Therese", "Kjell", "Victoria", "Jan-Erik",
    "Ann-Christin", "Per-Olof", "Ann-Marie", "Karl-Erik", "Eva-Lena", "Jan-Olof", "Ann-Sofie",
    "William", "Alice", "Liam", "Elsa", "Noah", "Maja", "Lucas", "Ella", "Oliver", "Wilma", "Hugo",
    "Ebba", "Axel", "Alma", "Leo", "Olivia",
];

/// Words matching a surname suffix that are not names
const EXCLUDED: &[&str] = &[
    "person", "saken", "taken", "broken", "göteborg", "helsingborg", "vänersborg", "sundsvall",
    "sdn", "ifo", "bup",
];

fn first_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            let mut names: Vec<&str> = FIRST_NAMES.to_vec();
            // Longer names first so "Ann-Marie" wins over "Ann"
            names.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
            let alternation: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
            Regex::new(&format!(r"(?i)\b(?:{})\b", alternation.join("|"))).ok()
        })
        .as_ref()
}

fn surname_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        compile_patterns(
            "name",
            &[
                r"\b[A-ZÅÄÖ][a-zåäö]+(?:ss?on|sen)\b",
                r"\b[A-ZÅÄÖ][a-zåäö]+(?:berg|ström|lund|dahl|gren|qvist|quist|kvist|mark|vall|holm|blad|bäck|borg|stedt|felt|feldt|ling|löf|löv)\b",
            ],
        )
    })
}

fn is_excluded(token: &str) -> bool {
    let lower = token.to_lowercase();
    EXCLUDED.contains(&lower.as_str())
}

/// Person-name pass
pub struct NamePass;

impl RecognizerPass for NamePass {
    fn name(&self) -> &str {
        "name"
    }

    fn scan(&self, index: &TextIndex<'_>) -> Result<Vec<Entity>> {
        let first_names = first_name_pattern();
        let surnames = surname_patterns();
        if first_names.is_none() && surnames.is_empty() {
            return Err(no_patterns(self.name()));
        }

        let text = index.text();
        let mut seen = FirstWins::default();
        let mut found = Vec::new();

        if let Some(pattern) = first_names {
            for m in pattern.find_iter(text) {
                let capitalized = m.as_str().chars().next().is_some_and(char::is_uppercase);
                if !capitalized || is_excluded(m.as_str()) {
                    continue;
                }
                if seen.try_accept(m.start(), m.end()) {
                    found.push(entity_at(
                        index,
                        m.start(),
                        m.end(),
                        EntityType::Person,
                        FIRST_NAME_CONFIDENCE,
                        self.name(),
                    ));
                }
            }
        }

        for pattern in surnames {
            for m in pattern.find_iter(text) {
                if is_excluded(m.as_str()) {
                    continue;
                }
                if seen.try_accept(m.start(), m.end()) {
                    found.push(entity_at(
                        index,
                        m.start(),
                        m.end(),
                        EntityType::Person,
                        SURNAME_CONFIDENCE,
                        self.name(),
                    ));
                }
            }
        }
        Ok(found)
    }
}
