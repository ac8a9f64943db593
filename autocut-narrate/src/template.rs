//! Narration text assembly. Template selection is deterministic given a
//! context: scene tags outrank detected objects, which outrank quoted
//! speech, with a generic fallback. Testable without any TTS backend.

use autocut_core::{safety, CameraFeatures};

/// Which template branch produced the text; surfaced for tests and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateBranch {
    Tags,
    Objects,
    Speech,
    Generic,
}

pub fn compose(to_cam: &str, features: &CameraFeatures, max_words: usize) -> (String, TemplateBranch) {
    let (text, branch) = pick(to_cam, features);
    (truncate_words(&text, max_words), branch)
}

fn pick(to_cam: &str, features: &CameraFeatures) -> (String, TemplateBranch) {
    if !features.tags.is_empty() {
        let text = match features.tags.as_slice() {
            [only] => format!("A look at the {} scene", only),
            [first, second, ..] => format!("A look at {} and {}", first, second),
            [] => unreachable!(),
        };
        return (text, TemplateBranch::Tags);
    }

    if !features.top_objects.is_empty() {
        let text = match features.top_objects.as_slice() {
            [only] => format!("Watching the {}", only),
            [first, second, ..] => format!("Watching {} and {}", first, second),
            [] => unreachable!(),
        };
        return (text, TemplateBranch::Objects);
    }

    let speech = features.recent_speech_text.trim();
    if !speech.is_empty() && safety::scan(speech).clean() {
        return (
            format!("They were saying: {}", safety::sanitize(speech)),
            TemplateBranch::Speech,
        );
    }

    (
        format!("Over to camera {}", display_name(to_cam)),
        TemplateBranch::Generic,
    )
}

/// Camera identities read better without the wire prefix.
fn display_name(cam_id: &str) -> &str {
    cam_id
        .strip_prefix(autocut_core::DEFAULT_CAMERA_PREFIX)
        .unwrap_or(cam_id)
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }
    words[..max_words].join(" ")
}
