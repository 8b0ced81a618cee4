//! Triage evaluation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use call_agent_core::{TradeCategory, Urgency};

use crate::rules::RuleTable;

/// Context modifiers applied after pattern scoring
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CallerContext {
    pub has_small_children: bool,
    pub has_elderly: bool,
    pub is_commercial: bool,
    pub is_pregnant: bool,
    /// Known vulnerable household (care level, disability)
    pub is_vulnerable: bool,
    /// Call arrived outside tenant business hours
    pub out_of_hours: bool,
}

impl CallerContext {
    /// Fixed modifier table; each factor adds urgency points
    fn modifier_points(&self) -> i32 {
        let mut points = 0;
        if self.has_small_children {
            points += 10;
        }
        if self.has_elderly {
            points += 8;
        }
        if self.is_pregnant {
            points += 8;
        }
        if self.is_vulnerable {
            points += 8;
        }
        if self.is_commercial {
            points += 5;
        }
        if self.out_of_hours {
            points += 10;
        }
        points
    }
}

/// Triage verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub urgency: Urgency,
    pub category: TradeCategory,
    /// Final urgency score, 0-100
    pub score: i32,
    pub recommended_action: String,
    /// Names of triggered rules, in table order
    pub reasoning: Vec<String>,
    pub safety_instructions: Vec<String>,
    pub requires_emergency_dispatch: bool,
    /// Rule table version this verdict was produced with
    pub rules_version: u32,
}

/// Pure triage engine over one rule table
pub struct TriageEngine {
    table: RuleTable,
    /// Tenant category preference used as a histogram tie-break
    preferred_category: Option<TradeCategory>,
}

impl TriageEngine {
    pub fn new(table: RuleTable) -> Self {
        Self {
            table,
            preferred_category: None,
        }
    }

    pub fn with_preferred_category(mut self, category: Option<TradeCategory>) -> Self {
        self.preferred_category = category;
        self
    }

    pub fn rules_version(&self) -> u32 {
        self.table.version
    }

    /// Assess a free-text description with optional caller context
    pub fn assess(&self, description: &str, context: &CallerContext) -> TriageOutcome {
        let text = normalize(description);

        let mut score: i32 = 0;
        let mut reasoning = Vec::new();
        let mut safety_instructions = Vec::new();
        let mut histogram: HashMap<TradeCategory, u32> = HashMap::new();
        let mut emergency = false;

        for rule in &self.table.rules {
            let hit = rule.patterns.iter().find(|p| text.contains(p.as_str()));
            let Some(hit) = hit else { continue };

            reasoning.push(format!("{}: {}", rule.name, hit));
            score += rule.score;
            if let Some(category) = rule.category {
                // A triggered rule is a stronger category signal than a bare keyword
                *histogram.entry(category).or_insert(0) += 3;
            }
            if rule.emergency {
                emergency = true;
                if let Some(ref instruction) = rule.safety_instruction {
                    safety_instructions.push(instruction.clone());
                }
            }
        }

        for (category, words) in &self.table.category_keywords {
            let count = words.iter().filter(|w| text.contains(w.as_str())).count() as u32;
            if count > 0 {
                *histogram.entry(*category).or_insert(0) += count;
            }
        }

        score += context.modifier_points();
        let score = score.clamp(0, 100);

        let category = self.pick_category(&histogram);

        let urgency = if emergency || score >= 80 {
            Urgency::Emergency
        } else if score >= 60 {
            Urgency::Urgent
        } else if score >= 30 {
            Urgency::Normal
        } else {
            Urgency::Routine
        };

        let recommended_action = match urgency {
            Urgency::Emergency => {
                "NOTFALL! Sofortige Maßnahmen erforderlich. Techniker wird umgehend entsandt."
            }
            Urgency::Urgent => "Dringender Einsatz heute erforderlich.",
            Urgency::Normal => "Termin in den nächsten 1-3 Tagen möglich.",
            Urgency::Routine => "Flexibler Termin nach Vereinbarung.",
        };

        TriageOutcome {
            urgency,
            category,
            score: if emergency { 100 } else { score },
            recommended_action: recommended_action.to_string(),
            reasoning,
            safety_instructions,
            requires_emergency_dispatch: emergency,
            rules_version: self.table.version,
        }
    }

    /// Histogram plurality; ties break to the tenant preference, then general
    fn pick_category(&self, histogram: &HashMap<TradeCategory, u32>) -> TradeCategory {
        let max = histogram.values().copied().max().unwrap_or(0);
        if max == 0 {
            return TradeCategory::General;
        }

        let mut leaders: Vec<TradeCategory> = histogram
            .iter()
            .filter(|(_, &count)| count == max)
            .map(|(&category, _)| category)
            .collect();

        if leaders.len() == 1 {
            return leaders[0];
        }
        if let Some(preferred) = self.preferred_category {
            if leaders.contains(&preferred) {
                return preferred;
            }
        }
        // Deterministic fallback for remaining ties
        leaders.sort_by_key(|c| c.as_str());
        leaders.first().copied().unwrap_or(TradeCategory::General)
    }
}

/// Lowercase and fold German umlauts so patterns match speech transcripts
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        match c {
            'ä' => out.push('a'),
            'ö' => out.push('o'),
            'ü' => out.push('u'),
            'ß' => out.push_str("ss"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleTable;

    fn engine() -> TriageEngine {
        TriageEngine::new(RuleTable::builtin(1))
    }

    #[test]
    fn test_gas_smell_is_emergency() {
        let outcome = engine().assess("Ich rieche Gas in der Küche", &CallerContext::default());

        assert_eq!(outcome.urgency, Urgency::Emergency);
        assert_eq!(outcome.category, TradeCategory::PlumbingHeating);
        assert!(outcome.requires_emergency_dispatch);
        assert!(outcome.reasoning.iter().any(|r| r.starts_with("gas_leak")));
        assert!(!outcome.safety_instructions.is_empty());
    }

    #[test]
    fn test_structural_danger_is_emergency() {
        let outcome = engine().assess(
            "Die Decke stürzt gleich ein, die Wand bewegt sich!",
            &CallerContext::default(),
        );

        assert_eq!(outcome.urgency, Urgency::Emergency);
        assert!(outcome.requires_emergency_dispatch);
        assert!(outcome
            .reasoning
            .iter()
            .any(|r| r.starts_with("structural_danger")));
        assert!(outcome
            .safety_instructions
            .iter()
            .any(|s| s.contains("Verlassen Sie den betroffenen Bereich")));
    }

    #[test]
    fn test_cold_heating_is_urgent() {
        let outcome = engine().assess(
            "Meine Heizung ist komplett ausgefallen, die Wohnung ist eiskalt",
            &CallerContext::default(),
        );

        assert_eq!(outcome.urgency, Urgency::Urgent);
        assert_eq!(outcome.category, TradeCategory::PlumbingHeating);
    }

    #[test]
    fn test_chitchat_is_routine() {
        let outcome = engine().assess("Guten Tag, ich habe eine Frage", &CallerContext::default());

        assert_eq!(outcome.urgency, Urgency::Routine);
        assert_eq!(outcome.category, TradeCategory::General);
        assert!(outcome.reasoning.is_empty());
    }

    #[test]
    fn test_context_raises_urgency() {
        let calm = engine().assess("Heizkörper wird nicht warm", &CallerContext::default());

        let context = CallerContext {
            has_small_children: true,
            has_elderly: true,
            out_of_hours: true,
            ..Default::default()
        };
        let raised = engine().assess("Heizkörper wird nicht warm", &context);

        assert!(raised.score > calm.score);
    }

    #[test]
    fn test_determinism() {
        let context = CallerContext {
            is_commercial: true,
            ..Default::default()
        };
        let text = "Wasser tropft stark aus der Decke im Bad";

        let a = engine().assess(text, &context);
        let b = engine().assess(text, &context);

        assert_eq!(a.urgency, b.urgency);
        assert_eq!(a.category, b.category);
        assert_eq!(a.score, b.score);
        assert_eq!(a.reasoning, b.reasoning);
    }

    #[test]
    fn test_umlaut_folding() {
        // Transcripts may arrive without umlauts
        let outcome = engine().assess("schlussel drinnen, bin ausgesperrt", &CallerContext::default());
        assert_eq!(outcome.category, TradeCategory::Locksmith);
    }

    #[test]
    fn test_preferred_category_breaks_tie() {
        let table = RuleTable::builtin(1);
        let engine = TriageEngine::new(table)
            .with_preferred_category(Some(TradeCategory::PlumbingHeating));

        // "wasser" votes sanitary, "heizung" votes plumbing-heating
        let outcome = engine.assess("wasser heizung", &CallerContext::default());
        assert_eq!(outcome.category, TradeCategory::PlumbingHeating);
    }

    #[test]
    fn test_verdict_carries_rules_version() {
        let engine = TriageEngine::new(RuleTable::builtin(7));
        let outcome = engine.assess("abfluss verstopft", &CallerContext::default());
        assert_eq!(outcome.rules_version, 7);
    }
}
