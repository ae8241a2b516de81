use concierge_core::config::IntentConfig;

/// Fast-path classification of an inbound message.
///
/// Variants are listed in matching precedence: the first rule that matches
/// wins, and `Fallback` means the message goes to semantic matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Asks about free slots in general; the bot asks which weekday.
    FreeSlotRequest,
    /// Message starts with a greeting stem.
    Greeting,
    /// Whole message is a thanks phrase.
    Thanks,
    /// Price or booking question: hand over to a human.
    PricingEscalation,
    /// Message names a weekday; `day` is the weekday as configured.
    WeekdayQuery { day: String },
    Fallback,
}

/// Case-insensitive phrase matcher over the configured intent vocabularies.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    free_slot_phrases: Vec<String>,
    greeting_stems: Vec<String>,
    thanks_phrases: Vec<String>,
    pricing_phrases: Vec<String>,
    weekdays: Vec<String>,
}

fn lowered(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl IntentRouter {
    pub fn new(config: &IntentConfig) -> Self {
        Self {
            free_slot_phrases: lowered(&config.free_slot_phrases),
            greeting_stems: lowered(&config.greeting_stems),
            thanks_phrases: lowered(&config.thanks_phrases),
            pricing_phrases: lowered(&config.pricing_phrases),
            weekdays: lowered(&config.weekdays),
        }
    }

    pub fn classify(&self, text: &str) -> Intent {
        let text = text.trim().to_lowercase();
        let contains_any = |phrases: &[String]| phrases.iter().any(|p| text.contains(p.as_str()));

        if contains_any(&self.free_slot_phrases) {
            return Intent::FreeSlotRequest;
        }
        if self.greeting_stems.iter().any(|s| text.starts_with(s.as_str())) {
            return Intent::Greeting;
        }
        if self.thanks_phrases.iter().any(|p| *p == text) {
            return Intent::Thanks;
        }
        if contains_any(&self.pricing_phrases) {
            return Intent::PricingEscalation;
        }
        if let Some(day) = self.weekdays.iter().find(|d| text.contains(d.as_str())) {
            return Intent::WeekdayQuery { day: day.clone() };
        }
        Intent::Fallback
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new(&IntentConfig::default())
    }
}
