//! Industry profiles
//!
//! A profile is a value bundling everything industry-specific: prompts,
//! emergency vocabulary, slot questions, urgency overrides and the action
//! taken after confirmation. The conversation engine stays generic.

use serde::{Deserialize, Serialize};

use call_agent_core::{JobType, TradeCategory};

use crate::slots::SlotKey;

/// Supported industry verticals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKey {
    Trades,
    Healthcare,
    Hospitality,
    ProfessionalServices,
}

/// Capability set for one industry
#[derive(Debug, Clone)]
pub struct IndustryProfile {
    pub key: ProfileKey,
    pub display_name: &'static str,
    /// System prompt for LLM turns, formal German register
    pub system_prompt: &'static str,
    pub greeting: &'static str,
    pub farewell: &'static str,
    /// Critical utterance opening an emergency escalation
    pub emergency_response: &'static str,
    /// Emergency phrases beyond the built-in defaults
    pub emergency_phrases: Vec<String>,
    /// Question asked for each outstanding slot
    pub slot_questions: fn(SlotKey) -> &'static str,
    /// Default job type for confirmed intakes
    pub default_job_type: JobType,
    /// Category assumed when triage stays undecided
    pub fallback_trade: TradeCategory,
    /// Reprompt for low-confidence transcripts
    pub reprompt: &'static str,
    /// Template used when the language model is unavailable
    pub llm_fallback: &'static str,
}

fn trades_slot_question(slot: SlotKey) -> &'static str {
    match slot {
        SlotKey::Problem => "Was kann ich für Sie tun? Beschreiben Sie bitte kurz das Problem.",
        SlotKey::Name => "Wie ist bitte Ihr Name?",
        SlotKey::Phone => "Unter welcher Telefonnummer erreichen wir Sie?",
        SlotKey::Address => {
            "Wie lautet die Adresse, an der der Einsatz stattfinden soll? Bitte mit Postleitzahl."
        }
        SlotKey::PreferredTime => "Wann würde Ihnen ein Termin am besten passen?",
    }
}

fn healthcare_slot_question(slot: SlotKey) -> &'static str {
    match slot {
        SlotKey::Problem => "Was führt Sie zu uns? Beschreiben Sie bitte Ihre Beschwerden.",
        SlotKey::Name => "Wie ist bitte Ihr Name?",
        SlotKey::Phone => "Unter welcher Telefonnummer können wir Sie zurückrufen?",
        SlotKey::Address => "Wie lautet Ihre Anschrift? Bitte mit Postleitzahl.",
        SlotKey::PreferredTime => "Wann würde Ihnen ein Termin passen?",
    }
}

fn hospitality_slot_question(slot: SlotKey) -> &'static str {
    match slot {
        SlotKey::Problem => "Worum geht es? Eine Reservierung oder eine Veranstaltung?",
        SlotKey::Name => "Auf welchen Namen darf ich notieren?",
        SlotKey::Phone => "Unter welcher Nummer erreichen wir Sie?",
        SlotKey::Address => "Wie lautet Ihre Adresse? Bitte mit Postleitzahl.",
        SlotKey::PreferredTime => "Für wann möchten Sie reservieren?",
    }
}

fn professional_slot_question(slot: SlotKey) -> &'static str {
    match slot {
        SlotKey::Problem => "Worum geht es in Ihrem Anliegen?",
        SlotKey::Name => "Wie ist bitte Ihr Name?",
        SlotKey::Phone => "Unter welcher Telefonnummer erreichen wir Sie?",
        SlotKey::Address => "Wie lautet Ihre Anschrift? Bitte mit Postleitzahl.",
        SlotKey::PreferredTime => "Wann würde Ihnen ein Beratungstermin passen?",
    }
}

impl IndustryProfile {
    /// Handwerk: plumbing, heating, electrical and related trades
    pub fn trades() -> Self {
        Self {
            key: ProfileKey::Trades,
            display_name: "Handwerk",
            system_prompt: "Sie sind die freundliche Telefonassistenz eines Handwerksbetriebs. \
                Sie nehmen Störungen und Reparaturwünsche auf, klären die Dringlichkeit und \
                vereinbaren Termine. Antworten Sie höflich, knapp und in formellem Deutsch \
                (Sie-Form), höchstens drei Sätze.",
            greeting: "Guten Tag, hier ist der automatische Service. \
                Wie kann ich Ihnen helfen?",
            farewell: "Vielen Dank für Ihren Anruf. Auf Wiederhören!",
            emergency_response: "Das klingt nach einem Notfall. Bitte verlassen Sie die \
                Gefahrenzone und rufen Sie bei unmittelbarer Gefahr die 112. \
                Ich verbinde Sie jetzt mit unserem Notdienst.",
            emergency_phrases: Vec::new(),
            slot_questions: trades_slot_question,
            default_job_type: JobType::Repair,
            fallback_trade: TradeCategory::General,
            reprompt: "Entschuldigung, könnten Sie das bitte wiederholen?",
            llm_fallback: "Einen Moment bitte, ich notiere Ihr Anliegen.",
        }
    }

    /// Gesundheit: medical practices
    pub fn healthcare() -> Self {
        Self {
            key: ProfileKey::Healthcare,
            display_name: "Gesundheit",
            system_prompt: "Sie sind die Telefonassistenz einer Arztpraxis. Sie nehmen \
                Terminwünsche und Anliegen auf. Sie stellen keine Diagnosen. Antworten Sie \
                höflich, knapp und in formellem Deutsch, höchstens drei Sätze.",
            greeting: "Praxis, guten Tag. Was kann ich für Sie tun?",
            farewell: "Vielen Dank für Ihren Anruf. Gute Besserung und auf Wiederhören!",
            emergency_response: "Das klingt nach einem medizinischen Notfall. Bitte legen Sie \
                auf und wählen Sie sofort die 112. Ich verbinde Sie parallel mit unserem Team.",
            emergency_phrases: vec![
                "brustschmerzen".to_string(),
                "herzinfarkt".to_string(),
                "schlaganfall".to_string(),
                "starke blutung".to_string(),
                "atemnot".to_string(),
            ],
            slot_questions: healthcare_slot_question,
            default_job_type: JobType::Inspection,
            fallback_trade: TradeCategory::General,
            reprompt: "Entschuldigung, könnten Sie das bitte wiederholen?",
            llm_fallback: "Einen Moment bitte, ich notiere Ihr Anliegen.",
        }
    }

    /// Gastro: restaurants and event venues
    pub fn hospitality() -> Self {
        Self {
            key: ProfileKey::Hospitality,
            display_name: "Gastronomie",
            system_prompt: "Sie sind die Telefonassistenz eines Restaurants. Sie nehmen \
                Reservierungen und Anfragen auf. Antworten Sie freundlich, knapp und in \
                formellem Deutsch, höchstens drei Sätze.",
            greeting: "Guten Tag, schön dass Sie anrufen. Wie kann ich Ihnen helfen?",
            farewell: "Vielen Dank, wir freuen uns auf Ihren Besuch. Auf Wiederhören!",
            emergency_response: "Das klingt nach einem Notfall. Bitte rufen Sie die 112. \
                Ich informiere parallel unser Team.",
            emergency_phrases: Vec::new(),
            slot_questions: hospitality_slot_question,
            default_job_type: JobType::Inspection,
            fallback_trade: TradeCategory::General,
            reprompt: "Entschuldigung, könnten Sie das bitte wiederholen?",
            llm_fallback: "Einen Moment bitte, ich notiere Ihre Anfrage.",
        }
    }

    /// Freie Berufe: law firms, tax advisors and similar practices
    pub fn professional_services() -> Self {
        Self {
            key: ProfileKey::ProfessionalServices,
            display_name: "Freie Berufe",
            system_prompt: "Sie sind die Telefonassistenz einer Kanzlei. Sie nehmen Anliegen \
                auf und vereinbaren Beratungstermine. Sie erteilen keine Rechts- oder \
                Steuerberatung. Antworten Sie höflich, knapp und in formellem Deutsch, \
                höchstens drei Sätze.",
            greeting: "Kanzlei, guten Tag. Was kann ich für Sie tun?",
            farewell: "Vielen Dank für Ihren Anruf. Auf Wiederhören!",
            emergency_response: "Ich verstehe, dass es dringend ist. Ich verbinde Sie mit \
                einem Mitarbeiter.",
            emergency_phrases: vec!["frist läuft ab".to_string(), "haftbefehl".to_string()],
            slot_questions: professional_slot_question,
            default_job_type: JobType::Quote,
            fallback_trade: TradeCategory::General,
            reprompt: "Entschuldigung, könnten Sie das bitte wiederholen?",
            llm_fallback: "Einen Moment bitte, ich notiere Ihr Anliegen.",
        }
    }

    pub fn by_key(key: ProfileKey) -> Self {
        match key {
            ProfileKey::Trades => Self::trades(),
            ProfileKey::Healthcare => Self::healthcare(),
            ProfileKey::Hospitality => Self::hospitality(),
            ProfileKey::ProfessionalServices => Self::professional_services(),
        }
    }

    pub fn slot_question(&self, slot: SlotKey) -> &'static str {
        (self.slot_questions)(slot)
    }
}
