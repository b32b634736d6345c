use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

const TRANSITION_STYLE: &str =
    "Dream-like melting transitions, surreal physics, fluid morphing, ethereal atmosphere.";
const TECHNICAL_SPECS: &str =
    "Continuous motion, hypnotic rhythm, perfect loop, no cuts, smooth fade transitions.";
const VISUAL_STYLE: &str =
    "Cinematic quality, vibrant colors, soft focus, mystical lighting, floating elements.";
const FORMAT_SPECS: &str =
    "10-15 seconds duration, high resolution, optimized for seamless playback.";

const ARTISTIC_MODIFIERS: [&str; 6] = [
    "Salvador Dali inspired",
    "psychedelic art style",
    "flowing liquid textures",
    "particle effects",
    "gradient backgrounds",
    "neon accents",
];

const ARTICLES: [&str; 3] = ["a", "an", "the"];

/// The three concepts a loop morphs through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreamElements {
    pub element1: String,
    pub element2: String,
    pub element3: String,
}

impl DreamElements {
    pub fn new(
        element1: impl Into<String>,
        element2: impl Into<String>,
        element3: impl Into<String>,
    ) -> Self {
        Self {
            element1: element1.into(),
            element2: element2.into(),
            element3: element3.into(),
        }
    }

    pub fn as_array(&self) -> [&str; 3] {
        [&self.element1, &self.element2, &self.element3]
    }
}

impl From<[String; 3]> for DreamElements {
    fn from([element1, element2, element3]: [String; 3]) -> Self {
        Self {
            element1,
            element2,
            element3,
        }
    }
}

/// Reduce an element to one lower-case concept word, without a leading
/// article: `"The Ocean Waves"` becomes `"ocean"`.
pub fn optimize_element(element: &str) -> String {
    let lowered = element.trim().to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    match words.as_slice() {
        [first, next, ..] if ARTICLES.contains(first) => next.to_string(),
        [first, ..] => first.to_string(),
        [] => String::new(),
    }
}

pub fn optimize_elements(elements: &DreamElements) -> DreamElements {
    DreamElements {
        element1: optimize_element(&elements.element1),
        element2: optimize_element(&elements.element2),
        element3: optimize_element(&elements.element3),
    }
}

/// Prompt for a seamless loop through the three elements and back.
pub fn loop_prompt(elements: &DreamElements) -> String {
    let DreamElements {
        element1,
        element2,
        element3,
    } = elements;
    let base = format!(
        "Seamless infinite loop: {element1} morphing into {element2}, \
         transitioning to {element3}, flowing back to {element1}."
    );
    [
        base.as_str(),
        TRANSITION_STYLE,
        TECHNICAL_SPECS,
        VISUAL_STYLE,
        FORMAT_SPECS,
    ]
    .join(" ")
}

/// [`loop_prompt`] plus one randomly chosen artistic modifier.
pub fn enhanced_prompt(elements: &DreamElements) -> String {
    let modifier = ARTISTIC_MODIFIERS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(ARTISTIC_MODIFIERS[0]);
    format!(
        "{} {}, masterpiece quality, award-winning cinematography.",
        loop_prompt(elements),
        modifier
    )
}

/// One prompt per morphing stage of the loop.
pub fn transition_prompts(elements: &DreamElements) -> [String; 3] {
    let DreamElements {
        element1,
        element2,
        element3,
    } = elements;
    [
        format!("{element1} slowly dissolving and transforming into {element2}, dream-like morphing, fluid transition"),
        format!("{element2} melting and reshaping into {element3}, surreal transformation, ethereal flow"),
        format!("{element3} fading and morphing back into {element1}, completing the infinite loop, seamless transition"),
    ]
}

/// Alternative phrasings over the optimized elements, for A/B comparison.
pub fn prompt_variations(elements: &DreamElements) -> Vec<String> {
    let optimized = optimize_elements(elements);
    let [e1, e2, e3] = optimized.as_array();
    vec![
        loop_prompt(&optimized),
        enhanced_prompt(&optimized),
        format!(
            "Infinite dream sequence: {e1} ↻ {e2} ↻ {e3} ↻ repeat. Hypnotic transitions, \
             mystical atmosphere, perfect loop, 15 seconds."
        ),
        format!(
            "Seamless transformation cycle: {e1} becomes {e2} becomes {e3} becomes {e1}. \
             Fluid morphing, dream logic, ethereal beauty, looping video."
        ),
    ]
}
