//! Text normalisation ahead of sentence splitting.

/// Characters that trip up synthesis models and their replacements.
const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2018}', "'"),   // Left single quote
    ('\u{2019}', "'"),   // Right single quote
    ('\u{201c}', "\""),  // Left double quote
    ('\u{201d}', "\""),  // Right double quote
    ('\u{00ab}', "\""),  // Left guillemet
    ('\u{00bb}', "\""),  // Right guillemet
    ('\u{2013}', "-"),   // En dash
    ('\u{2014}', "-"),   // Em dash
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00a0}', " "),   // Non-breaking space
    ('\u{200b}', ""),    // Zero-width space
    ('\u{200c}', ""),    // Zero-width non-joiner
    ('\u{200d}', ""),    // Zero-width joiner
    ('\u{feff}', ""),    // BOM
];

/// Join extracted paragraphs into one text body.
///
/// Paragraphs are trimmed, empty ones dropped, and the rest joined with a
/// newline. Inside a paragraph problematic characters are replaced, control
/// characters removed and whitespace runs collapsed to one space.
pub fn normalize_paragraphs(paragraphs: &[String]) -> String {
    paragraphs
        .iter()
        .map(|p| clean_paragraph(p))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn clean_paragraph(paragraph: &str) -> String {
    let mut replaced = String::with_capacity(paragraph.len());
    for c in paragraph.chars() {
        match REPLACEMENTS.iter().find(|(ch, _)| *ch == c) {
            Some((_, r)) => replaced.push_str(r),
            None if c.is_whitespace() => replaced.push(' '),
            None if c.is_control() => {}
            None => replaced.push(c),
        }
    }

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
