//! Party graph
//!
//! Clusters person entities into the parties of a case. Without an adapter
//! every distinct person text becomes its own party with an unknown role;
//! with an adapter, its clusters supply roles, relations and aliases.

use crate::adapter::{Oracle, PartyCluster};
use crate::config::PartyConfig;
use crate::recognizer::ssn::normalize_national_id;
use crate::span::{Span, TextIndex};
use crate::types::{Entity, EntityType, Party, PersonRole, Requester, RequesterType};
use std::collections::HashSet;

/// Relation words, most specific first
const RELATION_WORDS: &[(&[&str], &str)] = &[
    (&["mormor"], "mormor"),
    (&["morfar"], "morfar"),
    (&["farmor"], "farmor"),
    (&["farfar"], "farfar"),
    (&["mamma", "mor", "moder"], "mamma"),
    (&["pappa", "far", "fader", "papa"], "pappa"),
    (&["barn", "son", "dotter", "pojke", "flicka"], "barn"),
    (
        &["släkting", "kusin", "faster", "farbror", "moster", "morbror"],
        "släkting",
    ),
    (&["granne"], "granne"),
    (&["vän", "kompis"], "vän"),
];

const PARENT_RELATIONS: &[&str] = &["mamma", "pappa", "förälder"];

/// Weak relation guess from the words of a person reference
fn guess_relation(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    RELATION_WORDS
        .iter()
        .find(|(keys, _)| words.iter().any(|w| keys.contains(w)))
        .map(|(_, relation)| *relation)
}

/// Parties of one document, immutable once built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartyGraph {
    parties: Vec<Party>,
}

impl PartyGraph {
    pub fn new(parties: Vec<Party>) -> Self {
        Self { parties }
    }

    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    pub fn len(&self) -> usize {
        self.parties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parties.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Party> {
        self.parties.iter().find(|p| p.id == id)
    }

    /// Party with a mention at exactly this entity's span
    pub fn party_for(&self, entity: &Entity) -> Option<&Party> {
        self.parties.iter().find(|p| p.is_mentioned_at(&entity.span))
    }

    /// Set `party_id` (and `role`, when known) on every mentioned entity
    pub fn attribute(&self, entities: &mut [Entity]) {
        for entity in entities.iter_mut() {
            if let Some(party) = self.party_for(entity) {
                entity.party_id = Some(party.id.clone());
                if party.role != PersonRole::Unknown {
                    entity.role = Some(party.role);
                }
            }
        }
    }

    /// Find the requester's party.
    ///
    /// Tries the explicit id, then national id, then name; finally a unique
    /// subject (for self-requests) or a unique parent (for parents). When
    /// nothing matches the requester stays unresolved.
    pub fn resolve_requester(&self, requester: &Requester) -> Option<String> {
        if let Some(id) = &requester.resolved_party_id {
            return Some(id.clone());
        }

        if let Some(national_id) = requester.national_id.as_deref() {
            let wanted = normalize_national_id(national_id);
            if let Some(party) = self.parties.iter().find(|p| {
                p.national_id
                    .as_deref()
                    .is_some_and(|id| normalize_national_id(id) == wanted)
            }) {
                return Some(party.id.clone());
            }
        }

        if let Some(name) = requester.name.as_deref() {
            let wanted = name.trim().to_lowercase();
            if let Some(party) = self
                .parties
                .iter()
                .find(|p| p.names().any(|n| n.to_lowercase() == wanted))
            {
                return Some(party.id.clone());
            }
        }

        let candidates: Vec<&Party> = match requester.requester_type {
            RequesterType::SubjectSelf => self
                .parties
                .iter()
                .filter(|p| p.role == PersonRole::Subject)
                .collect(),
            RequesterType::Parent => self
                .parties
                .iter()
                .filter(|p| {
                    p.relation
                        .as_deref()
                        .is_some_and(|r| PARENT_RELATIONS.contains(&r.to_lowercase().as_str()))
                })
                .collect(),
            _ => Vec::new(),
        };
        match candidates.as_slice() {
            [only] => Some(only.id.clone()),
            _ => None,
        }
    }
}

/// Builds a [`PartyGraph`] from reconciled entities
pub struct PartyGraphBuilder {
    config: PartyConfig,
}

impl PartyGraphBuilder {
    pub fn new(config: PartyConfig) -> Self {
        Self { config }
    }

    /// Use the adapter when available, else the local heuristic
    pub async fn build(
        &self,
        index: &TextIndex<'_>,
        entities: &[Entity],
        oracle: Option<&Oracle>,
    ) -> PartyGraph {
        let Some(oracle) = oracle else {
            return self.build_heuristic(entities);
        };

        let names: Vec<String> = person_names(entities)
            .into_iter()
            .take(self.config.adapter_max_names)
            .collect();
        if names.is_empty() {
            return self.build_heuristic(entities);
        }

        let text = index.slice(Span::new(0, index.char_len().min(self.config.adapter_max_chars)));
        match oracle.identify_parties(text, &names).await {
            Ok(clusters) if !clusters.is_empty() => self.from_clusters(clusters, entities),
            Ok(_) => {
                tracing::warn!("Adapter returned no parties, using heuristic parties");
                self.build_heuristic(entities)
            }
            Err(_) => self.build_heuristic(entities),
        }
    }

    /// One party per distinct person, in first-seen order.
    ///
    /// Texts that differ only in case, or by a genitive `s`, are one party;
    /// the first-seen text is its name and the others become aliases.
    pub fn build_heuristic(&self, entities: &[Entity]) -> PartyGraph {
        let known = known_person_texts(entities);
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for name in person_names(entities) {
            let key = person_key(&name, &known);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, texts)) => texts.push(name),
                None => groups.push((key, vec![name])),
            }
        }

        let parties = groups
            .into_iter()
            .take(self.config.max_parties)
            .enumerate()
            .filter_map(|(i, (key, texts))| {
                let mut texts = texts.into_iter();
                let name = texts.next()?;
                let relation = guess_relation(&name);
                Some(Party {
                    id: format!("P{}", i + 1),
                    mentions: entities
                        .iter()
                        .filter(|e| {
                            e.entity_type == EntityType::Person
                                && person_key(&e.text, &known) == key
                        })
                        .map(|e| e.span)
                        .collect(),
                    name,
                    national_id: None,
                    role: PersonRole::Unknown,
                    relation: relation.map(str::to_string),
                    is_minor: relation == Some("barn"),
                    aliases: texts.collect(),
                })
            })
            .collect();
        PartyGraph::new(parties)
    }

    fn from_clusters(&self, clusters: Vec<PartyCluster>, entities: &[Entity]) -> PartyGraph {
        let mut used: HashSet<String> = HashSet::new();
        let mut parties = Vec::new();

        for cluster in clusters.into_iter().take(self.config.max_parties) {
            let id = match cluster.id {
                Some(id) if !used.contains(&id) => id,
                _ => next_free_id(&used),
            };
            used.insert(id.clone());

            let lowered: Vec<String> = cluster.names.iter().map(|n| n.to_lowercase()).collect();
            let mentions = entities
                .iter()
                .filter(|e| {
                    e.entity_type == EntityType::Person
                        && lowered.contains(&e.text.to_lowercase())
                })
                .map(|e| e.span)
                .collect();

            let mut names = cluster.names.into_iter();
            let Some(name) = names.next() else {
                continue;
            };
            parties.push(Party {
                id,
                name,
                national_id: cluster.national_id,
                role: cluster.role,
                relation: cluster.relation,
                is_minor: cluster.is_minor,
                aliases: names.collect(),
                mentions,
            });
        }
        PartyGraph::new(parties)
    }
}

impl Default for PartyGraphBuilder {
    fn default() -> Self {
        Self::new(PartyConfig::default())
    }
}

fn next_free_id(used: &HashSet<String>) -> String {
    (1..)
        .map(|n| format!("P{}", n))
        .find(|id| !used.contains(id))
        .unwrap_or_else(|| format!("P{}", used.len() + 1))
}

/// Case-folded texts of every person entity
pub(crate) fn known_person_texts(entities: &[Entity]) -> HashSet<String> {
    entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Person)
        .map(|e| e.text.trim().to_lowercase())
        .collect()
}

/// Case-folded person text; a trailing genitive `s` is dropped when the
/// bare form is also among `known`
pub(crate) fn person_key(text: &str, known: &HashSet<String>) -> String {
    let lower = text.trim().to_lowercase();
    match lower.strip_suffix('s') {
        Some(stem) if known.contains(stem) => stem.to_string(),
        _ => lower,
    }
}

/// Distinct person texts of at least two codepoints, first-seen order
fn person_names(entities: &[Entity]) -> Vec<String> {
    let mut seen = HashSet::new();
    entities
        .iter()
        .filter(|e| e.entity_type == EntityType::Person && e.text.chars().count() >= 2)
        .filter(|e| seen.insert(e.text.clone()))
        .map(|e| e.text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{JudgmentKind, ScriptedAdapter};
    use std::sync::Arc;
    use std::time::Duration;

    fn person(text: &str, start: usize) -> Entity {
        Entity::new(
            text,
            EntityType::Person,
            Span::new(start, start + text.chars().count()),
            0.85,
            "test",
        )
    }

    fn sample() -> (String, Vec<Entity>) {
        let text = "Anna Andersson och Lars träffades. Anna ringde Lars.".to_string();
        let entities = vec![
            person("Anna Andersson", 0),
            person("Lars", 19),
            person("Anna", 35),
            person("Lars", 47),
        ];
        (text, entities)
    }

    #[test]
    fn test_heuristic_parties() {
        let (_, entities) = sample();
        let graph = PartyGraphBuilder::default().build_heuristic(&entities);
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.parties()[0].id, "P1");
        assert_eq!(graph.parties()[0].name, "Anna Andersson");
        assert_eq!(graph.parties()[1].name, "Lars");
        assert_eq!(graph.parties()[1].mentions, vec![Span::new(19, 23), Span::new(47, 51)]);
        assert!(graph.parties().iter().all(|p| p.role == PersonRole::Unknown));
    }

    #[test]
    fn test_heuristic_groups_case_and_genitive() {
        let entities = vec![
            person("Anna", 0),
            person("ANNA", 10),
            person("Annas", 20),
            person("Jonas", 30),
        ];
        let graph = PartyGraphBuilder::default().build_heuristic(&entities);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.parties()[0].name, "Anna");
        assert_eq!(graph.parties()[0].aliases, vec!["ANNA", "Annas"]);
        assert_eq!(graph.parties()[0].mentions.len(), 3);
        assert_eq!(graph.parties()[1].name, "Jonas");
    }

    #[test]
    fn test_heuristic_cap() {
        let entities: Vec<Entity> = (0..15)
            .map(|i| person(&format!("Namn{}", i), i * 10))
            .collect();
        let builder = PartyGraphBuilder::new(PartyConfig {
            max_parties: 10,
            ..Default::default()
        });
        assert_eq!(builder.build_heuristic(&entities).len(), 10);
    }

    #[test]
    fn test_guess_relation_by_word() {
        assert_eq!(guess_relation("Mormor Greta"), Some("mormor"));
        assert_eq!(guess_relation("mamma Lisa"), Some("mamma"));
        assert_eq!(guess_relation("Andersson"), None);
        assert_eq!(guess_relation("Kalles kompis"), Some("vän"));
    }

    #[test]
    fn test_attribute() {
        let (_, mut entities) = sample();
        let mut graph = PartyGraphBuilder::default().build_heuristic(&entities);
        graph.parties[1].role = PersonRole::ThirdParty;
        graph.attribute(&mut entities);
        assert_eq!(entities[0].party_id.as_deref(), Some("P1"));
        assert_eq!(entities[0].role, None);
        assert_eq!(entities[3].party_id.as_deref(), Some("P2"));
        assert_eq!(entities[3].role, Some(PersonRole::ThirdParty));
    }

    #[tokio::test]
    async fn test_adapter_clusters() {
        let (text, entities) = sample();
        let adapter = ScriptedAdapter::new().respond(
            JudgmentKind::IdentifyParties,
            r#"{"parties": [
                {"party_id": "P1", "names": ["Anna Andersson", "Anna"], "role": "SUBJECT",
                 "national_id": "19811218-9876"},
                {"party_id": "P1", "names": ["Lars"], "role": "PARENT_2", "relation": "pappa"}
            ]}"#,
        );
        let oracle = Oracle::new(Arc::new(adapter), Duration::from_secs(1));
        let graph = PartyGraphBuilder::default()
            .build(&TextIndex::new(&text), &entities, Some(&oracle))
            .await;

        assert_eq!(graph.len(), 2);
        let anna = graph.get("P1").unwrap();
        assert_eq!(anna.aliases, vec!["Anna"]);
        assert_eq!(anna.mentions, vec![Span::new(0, 14), Span::new(35, 39)]);
        let lars = graph.get("P2").unwrap();
        assert_eq!(lars.role, PersonRole::ThirdParty);
    }

    #[tokio::test]
    async fn test_adapter_failure_falls_back() {
        let (text, entities) = sample();
        let oracle = Oracle::new(Arc::new(ScriptedAdapter::new()), Duration::from_secs(1));
        let graph = PartyGraphBuilder::default()
            .build(&TextIndex::new(&text), &entities, Some(&oracle))
            .await;
        assert_eq!(graph, PartyGraphBuilder::default().build_heuristic(&entities));
    }

    #[test]
    fn test_resolve_requester() {
        let parties = vec![
            Party {
                id: "P1".to_string(),
                name: "Anna Andersson".to_string(),
                national_id: Some("19811218-9876".to_string()),
                role: PersonRole::Subject,
                relation: None,
                is_minor: false,
                aliases: vec!["Anna".to_string()],
                mentions: vec![],
            },
            Party {
                id: "P2".to_string(),
                name: "Lars".to_string(),
                national_id: None,
                role: PersonRole::ThirdParty,
                relation: Some("pappa".to_string()),
                is_minor: false,
                aliases: vec![],
                mentions: vec![],
            },
        ];
        let graph = PartyGraph::new(parties);

        let by_id = Requester::new(RequesterType::OtherParty).with_party("P9");
        assert_eq!(graph.resolve_requester(&by_id).as_deref(), Some("P9"));

        let by_ssn = Requester::public().with_national_id("8112189876");
        assert_eq!(graph.resolve_requester(&by_ssn).as_deref(), Some("P1"));

        let by_name = Requester::new(RequesterType::OtherParty).with_name("anna");
        assert_eq!(graph.resolve_requester(&by_name).as_deref(), Some("P1"));

        let subject = Requester::new(RequesterType::SubjectSelf);
        assert_eq!(graph.resolve_requester(&subject).as_deref(), Some("P1"));

        let parent = Requester::new(RequesterType::Parent);
        assert_eq!(graph.resolve_requester(&parent).as_deref(), Some("P2"));

        assert_eq!(graph.resolve_requester(&Requester::public()), None);
    }
}
