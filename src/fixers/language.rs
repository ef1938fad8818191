//! # 语言检测
//!
//! 按常用停用词计分，得分最高的语言胜出；平分时取列表中靠前者。
//!
//! ## 依赖关系
//! - 实现 `fixers::LanguageDetector`

use super::LanguageDetector;
use crate::models::Document;

use std::collections::HashSet;

const STOP_WORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "you", "that", "is", "it", "to", "of", "what", "this", "have", "are", "was", "not"]),
    ("da", &["og", "det", "er", "jeg", "du", "ikke", "at", "en", "til", "har", "hvad", "med", "han", "vi"]),
    ("de", &["und", "der", "die", "das", "ist", "nicht", "ich", "du", "sie", "wir", "ein", "was", "mit", "auf"]),
    ("es", &["que", "el", "la", "los", "por", "qué", "es", "una", "no", "con", "para", "pero", "está", "yo"]),
    ("fr", &["le", "la", "les", "et", "est", "vous", "je", "pas", "que", "une", "nous", "pour", "c'est", "qui"]),
    ("it", &["che", "il", "non", "di", "è", "sono", "per", "una", "questo", "gli", "cosa", "ho", "mi", "lo"]),
    ("nl", &["de", "het", "een", "en", "is", "niet", "ik", "je", "dat", "wat", "van", "we", "zijn", "hij"]),
    ("pt", &["que", "não", "de", "o", "é", "um", "uma", "você", "para", "com", "os", "eu", "isso", "está"]),
    ("sv", &["och", "det", "är", "jag", "inte", "att", "du", "en", "som", "har", "vad", "på", "med", "vi"]),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct StopWordDetector;

impl StopWordDetector {
    fn score(words: &[String], stop_words: &[&str]) -> usize {
        let set: HashSet<&str> = stop_words.iter().copied().collect();
        words.iter().filter(|w| set.contains(w.as_str())).count()
    }
}

impl LanguageDetector for StopWordDetector {
    fn detect(&self, document: &Document) -> Option<String> {
        let text = document.all_text().to_lowercase();
        let words: Vec<String> = text
            .split(|c: char| !(c.is_alphabetic() || c == '\''))
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        let mut best: Option<(&str, usize)> = None;
        for &(code, stop_words) in STOP_WORDS {
            let score = Self::score(&words, stop_words);
            if score > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((code, score));
            }
        }
        best.map(|(code, _)| code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;

    fn doc(text: &str) -> Document {
        Document::new(vec![Entry::timed(0.0, 1.0, text)])
    }

    #[test]
    fn test_detects_languages() {
        let detector = StopWordDetector;
        assert_eq!(
            detector.detect(&doc("What is that? I have the key and you are not here.")),
            Some("en".to_string())
        );
        assert_eq!(
            detector.detect(&doc("Ich weiß nicht, was das ist. Wir sind mit der Familie.")),
            Some("de".to_string())
        );
        assert_eq!(
            detector.detect(&doc("Je ne sais pas. C'est pour vous et nous.")),
            Some("fr".to_string())
        );
        assert_eq!(
            detector.detect(&doc("Jag vet inte vad det är, och du?")),
            Some("sv".to_string())
        );
    }

    #[test]
    fn test_no_signal() {
        assert_eq!(StopWordDetector.detect(&doc("12345 ...")), None);
        assert_eq!(StopWordDetector.detect(&Document::default()), None);
    }
}
