use crate::models::GenerationKind;

pub const THUMBNAIL_ENHANCEMENT: &str = include_str!("../data/prompts/thumbnail.txt");
pub const ADVERTISEMENT_ENHANCEMENT: &str = include_str!("../data/prompts/advertisement.txt");
pub const POSTER_ENHANCEMENT: &str = include_str!("../data/prompts/poster.txt");
pub const TEXT_TO_IMAGE: &str = include_str!("../data/prompts/text_to_image.txt");
pub const IMAGE_EDIT: &str = include_str!("../data/prompts/image_edit.txt");
pub const IMAGE_COMPOSE: &str = include_str!("../data/prompts/image_compose.txt");

/// Replace `{{key}}` placeholders in a template string.
///
/// Single pass over the template: substituted values are never rescanned, and
/// unknown placeholders are left as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            rest = &rest[start..];
            break;
        };

        let key = &after_open[..end];
        match vars.iter().find(|(name, _)| *name == key) {
            Some((_, value)) => result.push_str(value),
            None => result.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}

pub fn enhancement(kind: GenerationKind) -> &'static str {
    match kind {
        GenerationKind::Thumbnail => THUMBNAIL_ENHANCEMENT,
        GenerationKind::Advertisement => ADVERTISEMENT_ENHANCEMENT,
        GenerationKind::Poster => POSTER_ENHANCEMENT,
    }
}

/// Kind prefix + user prompt + fixed quality suffix.
pub fn enhance(prompt: &str, kind: GenerationKind) -> String {
    render(
        TEXT_TO_IMAGE,
        &[("enhancement", enhancement(kind)), ("prompt", prompt)],
    )
}

/// Prompt for image-to-image; wording depends on whether references were supplied.
pub fn image_prompt(prompt: &str, kind: GenerationKind, has_references: bool) -> String {
    let template = if has_references {
        IMAGE_COMPOSE
    } else {
        IMAGE_EDIT
    };
    render(template, &[("enhanced", &enhance(prompt, kind)), ("prompt", prompt)])
}
