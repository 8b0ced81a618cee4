//! Versioned triage rule tables
//!
//! A rule is a named pattern class with a score contribution and optional
//! safety instruction. Rule tables are versioned per tenant; committed jobs
//! keep the verdict of the version they were assessed with.

use serde::{Deserialize, Serialize};

use call_agent_core::TradeCategory;

/// One pattern class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRule {
    /// Stable rule name, used in reasoning output
    pub name: String,
    /// Normalized keywords; a single hit triggers the rule
    pub patterns: Vec<String>,
    /// Urgency score contribution
    pub score: i32,
    /// Category vote cast when the rule triggers
    pub category: Option<TradeCategory>,
    /// Emergency rules short-circuit to the emergency bucket
    pub emergency: bool,
    /// Caller-facing safety instruction for emergencies
    pub safety_instruction: Option<String>,
}

impl TriageRule {
    fn new(name: &str, score: i32, patterns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            score,
            category: None,
            emergency: false,
            safety_instruction: None,
        }
    }

    fn emergency(name: &str, patterns: &[&str], category: TradeCategory, safety: &str) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            score: 100,
            category: Some(category),
            emergency: true,
            safety_instruction: Some(safety.to_string()),
        }
    }

    fn with_category(mut self, category: TradeCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// Ordered rule table plus category keyword votes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    pub version: u32,
    /// Evaluated in order; emergencies first
    pub rules: Vec<TriageRule>,
    /// Keyword -> category votes for the histogram
    pub category_keywords: Vec<(TradeCategory, Vec<String>)>,
}

impl RuleTable {
    /// Built-in German rule table
    pub fn builtin(version: u32) -> Self {
        let rules = vec![
            TriageRule::emergency(
                "gas_leak",
                &[
                    "gasgeruch", "gasleck", "gas riecht", "riecht nach gas", "rieche gas",
                    "gasaustritt", "gas stromt", "gaswarnmelder",
                ],
                TradeCategory::PlumbingHeating,
                "Verlassen Sie sofort das Gebäude! Keine Lichtschalter betätigen!",
            ),
            TriageRule::emergency(
                "water_main_break",
                &[
                    "wasserrohrbruch", "rohr geplatzt", "wasser spritzt", "hauptleitung",
                    "uberschwemmung", "wasser lauft unkontrolliert", "keller unter wasser",
                ],
                TradeCategory::PlumbingHeating,
                "Drehen Sie den Hauptwasserhahn zu!",
            ),
            TriageRule::emergency(
                "electrical_fire",
                &[
                    "kabel brennt", "steckdose raucht", "elektrobrand", "funken spruhen",
                    "brandgeruch elektrik", "kurzschluss mit funken",
                ],
                TradeCategory::Electrical,
                "Schalten Sie die Hauptsicherung aus! Berühren Sie nichts!",
            ),
            TriageRule::emergency(
                "structural_danger",
                &[
                    "decke sturzt", "einsturz", "riss wand gross", "statik gefahr",
                    "wand bewegt",
                ],
                TradeCategory::General,
                "Verlassen Sie den betroffenen Bereich sofort und betreten Sie ihn nicht wieder!",
            ),
            TriageRule::emergency(
                "locked_in_danger",
                &[
                    "kind eingesperrt", "baby allein", "herd an eingesperrt",
                    "person eingeschlossen gefahr",
                ],
                TradeCategory::Locksmith,
                "Bleiben Sie in Rufkontakt. Bei akuter Gefahr rufen Sie die 112!",
            ),
            TriageRule::new(
                "no_heating",
                65,
                &[
                    "keine heizung", "heizung aus", "heizung ausgefallen",
                    "heizung komplett ausgefallen", "frieren", "eiskalt", "heizung defekt",
                ],
            )
            .with_category(TradeCategory::PlumbingHeating),
            TriageRule::new(
                "major_water_leak",
                55,
                &["wasser tropft stark", "grosses leck", "uberschwemmt"],
            )
            .with_category(TradeCategory::PlumbingHeating),
            TriageRule::new(
                "no_power",
                65,
                &[
                    "kein strom", "stromausfall", "fi lasst sich nicht einschalten",
                ],
            )
            .with_category(TradeCategory::Electrical),
            TriageRule::new(
                "locked_out",
                60,
                &["ausgesperrt", "schlussel drinnen", "tur zugefallen"],
            )
            .with_category(TradeCategory::Locksmith),
            TriageRule::new(
                "toilet_blocked",
                60,
                &["toilette verstopft", "wc verstopft", "abfluss verstopft"],
            )
            .with_category(TradeCategory::Sanitary),
            TriageRule::new(
                "no_hot_water",
                60,
                &[
                    "kein warmwasser", "boiler kaputt", "therme defekt",
                    "durchlauferhitzer funktioniert nicht",
                ],
            )
            .with_category(TradeCategory::PlumbingHeating),
            TriageRule::new(
                "heating_degraded",
                60,
                &[
                    "heizung funktioniert nicht richtig", "heizung macht gerausche",
                    "heizkorper wird nicht warm", "heizung ist kalt", "heizung kalt",
                ],
            )
            .with_category(TradeCategory::PlumbingHeating),
            TriageRule::new(
                "electrical_degraded",
                55,
                &[
                    "steckdose funktioniert nicht", "sicherung fliegt raus", "fi schalter",
                ],
            )
            .with_category(TradeCategory::Electrical),
            TriageRule::new(
                "minor_leak",
                20,
                &["tropft", "leckt", "undicht", "feucht"],
            )
            .with_category(TradeCategory::Sanitary),
            TriageRule::new(
                "generic_defect",
                10,
                &["kaputt", "defekt", "funktioniert nicht", "geht nicht"],
            ),
        ];

        let category_keywords = vec![
            (
                TradeCategory::PlumbingHeating,
                keywords(&[
                    "heizung", "heizkorper", "therme", "gastherme", "kessel", "brenner",
                    "thermostat", "warmwasser", "boiler", "fussbodenheizung", "gas",
                ]),
            ),
            (
                TradeCategory::Sanitary,
                keywords(&[
                    "wasser", "rohr", "abfluss", "toilette", "wc", "waschbecken", "spule",
                    "siphon", "wasserhahn", "armatur", "dusche", "badewanne",
                ]),
            ),
            (
                TradeCategory::Electrical,
                keywords(&[
                    "strom", "steckdose", "schalter", "licht", "lampe", "sicherung", "fi",
                    "kabel", "leitung", "elektrisch",
                ]),
            ),
            (
                TradeCategory::Locksmith,
                keywords(&[
                    "schlussel", "schloss", "tur", "ausgesperrt", "eingesperrt", "zylinder",
                ]),
            ),
            (
                TradeCategory::Roofing,
                keywords(&["dach", "ziegel", "dachrinne", "regenrinne", "schornstein"]),
            ),
            (
                TradeCategory::Painting,
                keywords(&["streichen", "farbe", "tapete", "anstrich", "schimmel wand"]),
            ),
            (
                TradeCategory::Carpentry,
                keywords(&["holz", "mobel", "schrank", "parkett", "laminat", "treppe"]),
            ),
        ];

        Self {
            version,
            rules,
            category_keywords,
        }
    }
}

fn keywords(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_emergencies_first() {
        let table = RuleTable::builtin(1);
        assert!(table.rules[0].emergency);
        assert!(table.rules.iter().any(|r| r.name == "gas_leak"));
        assert!(table.rules.iter().any(|r| r.name == "structural_danger"));
    }

    #[test]
    fn test_table_serializes() {
        let table = RuleTable::builtin(3);
        let json = serde_json::to_string(&table).unwrap();
        let back: RuleTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, 3);
        assert_eq!(back.rules.len(), table.rules.len());
    }
}
