//! Supported languages, fallback messages, and suggested questions.
//!
//! Declarative tables rather than branching logic. The fallback message
//! is pre-translated per language so the out-of-domain path never needs
//! a language-model call.

/// (code, display name) for every supported answer language.
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Español"),
    ("fr", "Français"),
    ("de", "Deutsch"),
    ("hi", "हिन्दी"),
];

pub const DEFAULT_LANGUAGE: &str = "en";

/// Display name for a language code, used in the prompt's language
/// directive. Unknown codes resolve to English.
pub fn display_name(code: &str) -> &'static str {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("English")
}

pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(c, _)| *c == code)
}

/// Fixed-tone out-of-domain response, per language. Returned whenever
/// retrieval finds no grounding, instead of letting the model invent an
/// answer.
pub fn fallback_message(code: &str) -> &'static str {
    match code {
        "es" => {
            "¡Espera, detente! Eso no está en mi colección de cuentos. Estoy aquí para narrar \
             las aventuras de Alicia en el país de las maravillas y los problemas gigantes de \
             Gulliver, ¡no para resolver los misterios del universo! Pregúntame algo de los \
             cuentos clásicos que realmente conozco."
        }
        "fr" => {
            "Holà, arrêtez ! Ce n'est pas dans ma collection de contes. Je suis là pour raconter \
             les aventures d'Alice au pays des merveilles et les ennuis géants de Gulliver, pas \
             pour percer les mystères de l'univers ! Demandez-moi quelque chose des histoires \
             classiques que je connais vraiment."
        }
        "de" => {
            "Moment mal! Das steht nicht in meiner Geschichtensammlung. Ich erzähle von Alices \
             Abenteuern im Wunderland und Gullivers riesigen Problemen, nicht von den Rätseln \
             des Universums! Frag mich etwas aus den klassischen Geschichten, die ich wirklich \
             kenne."
        }
        "hi" => {
            "रुको, ठहरो! यह मेरी कहानियों के संग्रह में नहीं है। मैं एलिस के अद्भुत देश के \
             रोमांच और गुलिवर की विशाल समस्याओं की कहानियाँ सुनाता हूँ, ब्रह्मांड के रहस्य \
             नहीं सुलझाता! मुझसे उन क्लासिक कहानियों के बारे में पूछो जो मैं सच में जानता हूँ।"
        }
        _ => {
            "Whoa there! That's not in my storybook collection. I'm here to spin tales of \
             Alice's adventures in Wonderland and Gulliver's giant-sized troubles, not to \
             solve the mysteries of the universe! Ask me something from the classic stories \
             I actually know."
        }
    }
}

/// Short in-persona apology used when the language model itself fails.
/// The request still succeeds with this as the answer.
pub fn error_message(code: &str) -> &'static str {
    match code {
        "es" => "¡Vaya! Mi máquina de ingenio se averió. ¡Inténtalo de nuevo!",
        "fr" => "Oups ! Ma machine à malice est en panne. Réessayez !",
        "de" => "Hoppla! Meine Witzmaschine hat gestreikt. Versuch es noch einmal!",
        "hi" => "अरे! मेरी कहानी मशीन बिगड़ गई। फिर से पूछो!",
        _ => "Oops! My wit machine broke down. Try asking again!",
    }
}

/// Example questions served by `GET /suggestions`.
pub const SUGGESTED_QUESTIONS: &[&str] = &[
    "What happened when Alice ate the mushroom?",
    "Why did the Mad Hatter's tea party never end?",
    "How did Gulliver end up tied down in Lilliput?",
    "What did the Cheshire Cat tell Alice about madness?",
    "How did Scheherazade keep the sultan listening night after night?",
    "What wish did the genie of the lamp grant first?",
];
