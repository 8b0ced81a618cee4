//! Intent detection
//!
//! Keyword rules evaluated first with a fixed priority order; the LLM is
//! only consulted by the conversation engine when rules stay silent.
//! Priority: emergency > cancellation > new request > query > chitchat.

use serde::{Deserialize, Serialize};

/// Detected customer intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Emergency,
    CancelAppointment,
    RescheduleAppointment,
    NewRequest,
    QuoteRequest,
    CheckStatus,
    SpeakToStaff,
    Query,
    Affirmative,
    Negative,
    Farewell,
    Chitchat,
    Unknown,
}

impl Intent {
    /// Evaluation priority; lower wins when several rules match
    fn priority(&self) -> u8 {
        match self {
            Intent::Emergency => 0,
            Intent::CancelAppointment => 1,
            Intent::RescheduleAppointment => 1,
            Intent::NewRequest => 2,
            Intent::QuoteRequest => 2,
            Intent::CheckStatus => 3,
            Intent::SpeakToStaff => 3,
            Intent::Query => 3,
            Intent::Affirmative => 4,
            Intent::Negative => 4,
            Intent::Farewell => 4,
            Intent::Chitchat => 5,
            Intent::Unknown => 6,
        }
    }
}

/// Detection result
#[derive(Debug, Clone)]
pub struct DetectedIntent {
    pub intent: Intent,
    /// Keyword that fired, for logging
    pub matched: Option<String>,
}

struct IntentRule {
    intent: Intent,
    keywords: Vec<&'static str>,
}

/// Keyword intent detector, German vocabulary
pub struct IntentDetector {
    rules: Vec<IntentRule>,
    /// Profile-specific emergency phrases added on top of the defaults
    extra_emergency: Vec<String>,
}

impl IntentDetector {
    pub fn new(extra_emergency: Vec<String>) -> Self {
        let rules = vec![
            IntentRule {
                intent: Intent::Emergency,
                keywords: vec![
                    "notfall", "gasgeruch", "rieche gas", "riecht nach gas", "gasleck",
                    "wasserrohrbruch", "rohr geplatzt", "kabel brennt", "steckdose raucht",
                    "brustschmerz", "atemnot", "bewusstlos",
                ],
            },
            IntentRule {
                intent: Intent::CancelAppointment,
                keywords: vec![
                    "termin absagen", "termin stornieren", "absagen", "stornieren",
                    "nicht mehr nötig",
                ],
            },
            IntentRule {
                intent: Intent::RescheduleAppointment,
                keywords: vec!["termin verschieben", "verschieben", "anderen termin", "umbuchen"],
            },
            IntentRule {
                intent: Intent::QuoteRequest,
                keywords: vec![
                    "kostenvoranschlag", "angebot", "was kostet", "preis", "kosten",
                ],
            },
            IntentRule {
                intent: Intent::NewRequest,
                keywords: vec![
                    "kaputt", "defekt", "funktioniert nicht", "geht nicht", "reparatur",
                    "reparieren", "verstopft", "tropft", "undicht", "heizung", "kein strom",
                    "kein warmwasser", "ausgesperrt", "termin", "techniker", "monteur",
                    "kalt", "ausgefallen",
                ],
            },
            IntentRule {
                intent: Intent::CheckStatus,
                keywords: vec!["status", "wann kommt", "wo bleibt", "auftragsnummer"],
            },
            IntentRule {
                intent: Intent::SpeakToStaff,
                keywords: vec![
                    "mitarbeiter sprechen", "mensch sprechen", "jemanden sprechen",
                    "durchstellen", "weiterleiten",
                ],
            },
            IntentRule {
                intent: Intent::Query,
                keywords: vec!["öffnungszeiten", "wie lange", "frage", "information"],
            },
            IntentRule {
                intent: Intent::Affirmative,
                keywords: vec![
                    "ja", "genau", "richtig", "passt", "einverstanden", "gerne", "okay",
                ],
            },
            IntentRule {
                intent: Intent::Negative,
                keywords: vec!["nein", "falsch", "nicht richtig", "lieber nicht"],
            },
            IntentRule {
                intent: Intent::Farewell,
                keywords: vec![
                    "tschüss", "auf wiederhören", "auf wiedersehen", "danke das wars",
                    "das wäre alles", "schönen tag",
                ],
            },
            IntentRule {
                intent: Intent::Chitchat,
                keywords: vec!["hallo", "guten tag", "guten morgen", "servus", "wie geht"],
            },
        ];

        Self {
            rules,
            extra_emergency,
        }
    }

    /// Detect the highest-priority intent whose keywords match
    pub fn detect(&self, text: &str) -> DetectedIntent {
        let text = normalize(text);

        // Profile emergencies first, they share top priority
        for phrase in &self.extra_emergency {
            if text.contains(normalize(phrase).as_str()) {
                return DetectedIntent {
                    intent: Intent::Emergency,
                    matched: Some(phrase.clone()),
                };
            }
        }

        let mut best: Option<(u8, Intent, String)> = None;
        for rule in &self.rules {
            for keyword in &rule.keywords {
                if contains_word(&text, keyword) {
                    let priority = rule.intent.priority();
                    let replace = match best {
                        Some((current, _, _)) => priority < current,
                        None => true,
                    };
                    if replace {
                        best = Some((priority, rule.intent, keyword.to_string()));
                    }
                    break;
                }
            }
        }

        match best {
            Some((_, intent, matched)) => DetectedIntent {
                intent,
                matched: Some(matched),
            },
            None => DetectedIntent {
                intent: Intent::Unknown,
                matched: None,
            },
        }
    }
}

/// Multi-word keywords match as substrings, single words on word boundaries
/// ("ja" must not fire inside "Anlage")
fn contains_word(text: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        return text.contains(keyword);
    }
    text.split(|c: char| !c.is_alphanumeric())
        .any(|word| word == keyword)
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
}
