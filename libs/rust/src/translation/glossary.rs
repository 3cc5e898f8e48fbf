//! Pinned terminology for translation.
//!
//! A glossary is an ordered source-term → target-term mapping bound to the
//! engine at session start. At most one glossary is active per
//! (source, target) language pair.

/// Shadow Slave terminology, EN → ES. Names of system mechanics stay in
/// English; ranks and a handful of titles are localized.
pub static SHADOW_SLAVE_TERMS: &[(&str, &str)] = &[
    // Sistema y mecánicas
    ("Shadow Slave", "Shadow Slave"),
    ("Nightmare Creature", "Nightmare Creature"),
    ("Memory", "Memory"),
    ("Echo", "Echo"),
    ("Soul Core", "Soul Core"),
    ("Awakened", "Awakened"),
    ("Sleepers", "Sleepers"),
    ("Flaws", "Flaws"),
    ("First Nightmare", "First Nightmare"),
    ("Second Nightmare", "Second Nightmare"),
    ("Third Nightmare", "Third Nightmare"),
    ("Fourth Nightmare", "Fourth Nightmare"),
    ("Fifth Nightmare", "Fifth Nightmare"),
    ("Sixth Nightmare", "Sixth Nightmare"),
    ("Seventh Nightmare", "Seventh Nightmare"),
    ("Memory Shard", "Memory Shard"),
    ("Soul Flame", "Soul Flame"),
    ("Soul Sea", "Soul Sea"),
    ("Weaving", "Weaving"),
    // Rangos y títulos
    ("Saint", "Santo"),
    ("Master", "Maestro"),
    ("Great", "Gran"),
    ("Supreme", "Supremo"),
    ("Transcendent", "Transcendente"),
    ("Dormant", "Durmiente"),
    // Habilidades
    ("Shadow Step", "Shadow Step"),
    ("Shadow Sense", "Shadow Sense"),
    ("Shadow Manifestation", "Shadow Manifestation"),
    ("Shadow Control", "Shadow Control"),
    ("Shadow Form", "Shadow Form"),
    ("Shadow Domain", "Shadow Domain"),
    ("Shadow Armor", "Shadow Armor"),
    ("Shadow Weapon", "Shadow Weapon"),
    ("Shadow Clone", "Shadow Clone"),
    ("Shadow Travel", "Shadow Travel"),
    // Lugares y dimensiones
    ("Dream Realm", "Dream Realm"),
    ("Nightmare", "Nightmare"),
    ("Tower", "Tower"),
    ("Spire", "Spire"),
    ("Memory Realm", "Memory Realm"),
    ("Echo Realm", "Echo Realm"),
    // Organizaciones y grupos
    ("Sovereigns", "Sovereigns"),
    ("Great Clans", "Great Clans"),
    ("Great Families", "Great Families"),
    ("Nightmare Creatures", "Nightmare Creatures"),
    ("Transcendents", "Transcendents"),
    ("Flawed", "Flawed"),
    ("Blessed", "Blessed"),
    ("Cursed", "Cursed"),
    // Términos de batalla
    ("Shadow Combat", "Shadow Combat"),
    ("Shadow Arts", "Shadow Arts"),
    ("Echoes", "Eco"),
];

/// An ordered term mapping for one (source, target) language pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glossary {
    pub name: String,
    pub source_lang: String,
    pub target_lang: String,
    entries: Vec<(String, String)>,
}

impl Glossary {
    pub fn new(
        name: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        entries: &[(&str, &str)],
    ) -> Self {
        Self {
            name: name.into(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            entries: entries
                .iter()
                .map(|(term, replacement)| (term.to_string(), replacement.to_string()))
                .collect(),
        }
    }

    /// The Shadow Slave glossary shipped with the code.
    pub fn shadow_slave() -> Self {
        Self::new("shadow-slave", "en", "es", SHADOW_SLAVE_TERMS)
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this glossary applies to the given language pair.
    pub fn matches_pair(&self, source_lang: &str, target_lang: &str) -> bool {
        self.source_lang.eq_ignore_ascii_case(source_lang)
            && self.target_lang.eq_ignore_ascii_case(target_lang)
    }

    /// TSV rendering, the entry format metered engines ingest.
    pub fn to_tsv(&self) -> String {
        self.entries
            .iter()
            .map(|(term, replacement)| format!("{}\t{}", term, replacement))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_slave_glossary_keeps_order_and_shape() {
        let glossary = Glossary::shadow_slave();
        assert!(glossary.matches_pair("EN", "es"));
        assert!(!glossary.matches_pair("en", "fr"));
        assert_eq!(glossary.entries().first().unwrap().0, "Shadow Slave");
        let tsv = glossary.to_tsv();
        assert!(tsv.starts_with("Shadow Slave\tShadow Slave\n"));
        assert!(tsv.contains("Saint\tSanto"));
        assert_eq!(tsv.lines().count(), glossary.entries().len());
    }
}
