//! Part-of-speech tag legend shown next to POS patterns

/// Universal POS tags followed by the Penn Treebank tags the tagger emits
pub const POS_TAGS: &[(&str, &str)] = &[
    ("ADJ", "Adjective (big, old, green)"),
    ("ADP", "Adposition (in, to, during)"),
    ("ADV", "Adverb (very, tomorrow, down)"),
    ("AUX", "Auxiliary (is, has been)"),
    ("CONJ", "Conjunction (and, or, but)"),
    ("CCONJ", "Coordinating conj. (and, or)"),
    ("DET", "Determiner (a, an, the)"),
    ("INTJ", "Interjection (oh, hey)"),
    ("NOUN", "Noun (girl, cat, tree)"),
    ("NUM", "Numeral (1, one, first)"),
    ("PART", "Particle (not, 's)"),
    ("PRON", "Pronoun (I, you, he)"),
    ("PROPN", "Proper noun (John, London)"),
    ("PUNCT", "Punctuation (., (, ), ?)"),
    ("SCONJ", "Subordinating conj. (if)"),
    ("SYM", "Symbol ($, %, §)"),
    ("VERB", "Verb (run, eat)"),
    ("X", "Other"),
    ("NFP", "List item marker (*)"),
    ("LS", "Superfluous punctuation (!!!!)"),
    ("VB", "Verb, base form"),
    ("VBD", "Verb, past tense"),
    ("VBG", "Verb, gerund/present"),
    ("VBN", "Verb, past participle"),
    ("VBP", "Verb, non-3rd present"),
    ("VBZ", "Verb, 3rd sing. present"),
    ("NN", "Noun, singular"),
    ("NNS", "Noun, plural"),
    ("NNP", "Proper noun, singular"),
    ("NNPS", "Proper noun, plural"),
    ("IN", "Preposition/subord. conj."),
    ("JJ", "Adjective"),
    ("JJR", "Adjective, comparative"),
    ("JJS", "Adjective, superlative"),
    ("RB", "Adverb"),
    ("RBR", "Adverb, comparative"),
    ("RBS", "Adverb, superlative"),
];

pub fn pos_tag_meaning(tag: &str) -> Option<&'static str> {
    POS_TAGS
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(tag))
        .map(|(_, meaning)| *meaning)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(pos_tag_meaning("DET"), Some("Determiner (a, an, the)"));
        assert_eq!(pos_tag_meaning("vbz"), Some("Verb, 3rd sing. present"));
        assert_eq!(pos_tag_meaning("ZZZ"), None);
    }
}
