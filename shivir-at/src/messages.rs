//! Human-facing messages for attendance outcomes
//!
//! Pure mapping from [`Outcome`] to English and Hindi text for the voice and
//! UI consumers. The engine never calls into this module.

use serde::Serialize;
use shivir_common::{Outcome, SessionType};

/// Message in both supported languages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub english: String,
    pub hindi: String,
}

/// Hindi name of a session type, as spoken by the voice output
pub fn hindi_session_name(session_type: SessionType) -> &'static str {
    match session_type {
        SessionType::Ma => "एम ए शिविर",
        SessionType::Ssp1 => "एस एस पी वन शिविर",
        SessionType::Ssp2 => "एस एस पी टू शिविर",
        SessionType::Hs1 => "हायर शिविर वन",
        SessionType::Hs2 => "हायर शिविर टू",
        SessionType::Festival => "त्योहार सत्संग",
    }
}

/// Compose the message for an outcome
///
/// `name` falls back to a generic greeting; `session_type` to a generic
/// session name.
pub fn compose(outcome: &Outcome, name: Option<&str>, session_type: Option<SessionType>) -> Message {
    let (name, hi_name) = match name {
        Some(name) => (name, name),
        None => ("Friend", "साधक"),
    };
    let en_session = session_type.map_or("the session", |t| t.display_name());
    let hi_session = session_type.map_or("शिविर", hindi_session_name);

    let (english, hindi) = match outcome {
        Outcome::UnknownFace => (
            "Sorry, we could not recognize you. Please register first, thank you.".to_string(),
            "माफ़ करें, आपकी पहचान नहीं हो सकी। कृपया पहले अपना पंजीकरण कराएं, धन्यवाद।".to_string(),
        ),
        Outcome::Inactive => (
            format!("Happy Thoughts {}, your account is inactive. Please contact the admin, thank you.", name),
            format!("हैप्पी थॉट्स {}, आप वर्तमान में निष्क्रिय हैं। कृपया एडमिन से संपर्क करें, धन्यवाद।", hi_name),
        ),
        Outcome::Blacklisted => (
            format!("Happy Thoughts {}, you are on the restricted list. Please contact the admin, thank you.", name),
            format!("हैप्पी थॉट्स {}, आप वर्तमान में प्रतिबंधित सूची में हैं। कृपया एडमिन से संपर्क करें, धन्यवाद।", hi_name),
        ),
        Outcome::InactiveAndBlacklisted => (
            format!(
                "Happy Thoughts {}, your account is inactive and on the restricted list. Please contact the admin immediately, thank you.",
                name
            ),
            format!(
                "हैप्पी थॉट्स {}, आप वर्तमान में निष्क्रिय और प्रतिबंधित सूची दोनों में हैं। कृपया तुरंत एडमिन से संपर्क करें, धन्यवाद।",
                hi_name
            ),
        ),
        Outcome::NotEligible => (
            format!("Happy Thoughts {}, you are not yet eligible for {}. Thank you.", name, en_session),
            format!("हैप्पी थॉट्स {}, आप अभी {} के लिए पात्र नहीं हैं, धन्यवाद।", hi_name, hi_session),
        ),
        Outcome::NewUserMustStart => (
            format!("Happy Thoughts {}, please begin with the MA Shivir first. Thank you.", name),
            format!("हैप्पी थॉट्स {}, कृपया पहले एम ए शिविर से शुरुआत करें, धन्यवाद।", hi_name),
        ),
        Outcome::NoActiveSession => (
            format!("Happy Thoughts {}, there is no active session right now. Please contact the admin, thank you.", name),
            format!("हैप्पी थॉट्स {}, वर्तमान में कोई सक्रिय सत्र नहीं है। कृपया एडमिन से संपर्क करें, धन्यवाद।", hi_name),
        ),
        Outcome::CooldownActive { wait_seconds } => {
            let minutes = wait_seconds.div_ceil(60);
            (
                format!(
                    "Happy Thoughts {}, your attendance is already recorded. Please try again in {} minutes.",
                    name, minutes
                ),
                format!(
                    "हैप्पी थॉट्स {}, आपकी उपस्थिति पहले ही दर्ज हो चुकी है। कृपया {} मिनट बाद प्रयास करें, धन्यवाद।",
                    hi_name, minutes
                ),
            )
        }
        Outcome::DayAdvanced { day, required } => (
            format!(
                "Happy Thoughts {}, your attendance for {} is recorded: day {} of {}. Thank you.",
                name, en_session, day, required
            ),
            format!(
                "हैप्पी थॉट्स {}, {} में आपकी उपस्थिति दर्ज हो गई है, दिन {} / {}, धन्यवाद।",
                hi_name, hi_session, day, required
            ),
        ),
        Outcome::CompletedSession => (
            format!("Happy Thoughts {}, congratulations on completing {}! Thank you.", name, en_session),
            format!("हैप्पी थॉट्स {}, {} पूर्ण करने पर आपको बधाई, धन्यवाद।", hi_name, hi_session),
        ),
        Outcome::AlreadyCompleteToday => (
            format!(
                "Happy Thoughts {}, your attendance is already recorded. Thank you for your time and attention.",
                name
            ),
            format!(
                "हैप्पी थॉट्स {}, आपकी उपस्थिति पहले ही दर्ज हो चुकी है। आपका समय और ध्यान देने के लिए धन्यवाद।",
                hi_name
            ),
        ),
        Outcome::RepeatWelcome { days_gap, ordinal } => (
            format!(
                "Happy Thoughts {}, welcome back to {}! This is repeat visit {}, {} days since your last one.",
                name, en_session, ordinal, days_gap
            ),
            format!(
                "हैप्पी थॉट्स {}, {} में आपका फिर से स्वागत है। यह आपकी {} वीं पुनरावृत्ति है, पिछली बार से {} दिन बाद, धन्यवाद।",
                hi_name, hi_session, ordinal, days_gap
            ),
        ),
        Outcome::RepeatAlreadyMarkedToday | Outcome::DuplicateRecord => (
            format!("Happy Thoughts {}, your attendance for today is already recorded. Thank you.", name),
            format!("हैप्पी थॉट्स {}, आज की आपकी उपस्थिति पहले ही दर्ज हो चुकी है, धन्यवाद।", hi_name),
        ),
    };

    Message { english, hindi }
}
