use biogram_stem::Classifier;

fn stem(raw: &str) -> Option<String> {
    Classifier::new().stem(raw)
}

#[test]
fn empty_string_drops() {
    assert_eq!(stem(""), None);
}

#[test]
fn symbols_drop() {
    assert_eq!(stem(":)"), None);
}

#[test]
fn period_drops() {
    assert_eq!(stem("."), None);
}

#[test]
fn ellipsis_drops() {
    assert_eq!(stem("..."), None);
}

#[test]
fn stopword_drops() {
    assert_eq!(stem("and"), None);
}

#[test]
fn stopword_check_is_case_insensitive() {
    assert_eq!(stem("And"), None);
}

#[test]
fn number_passes_through() {
    assert_eq!(stem("13"), Some("13".to_string()));
}

#[test]
fn decimal_number_passes_through() {
    assert_eq!(stem("1.3"), Some("1.3".to_string()));
}

#[test]
fn url_drops() {
    assert_eq!(stem("twitter.com"), None);
}

#[test]
fn http_url_drops() {
    assert_eq!(stem("http://example.org/foo"), None);
}

#[test]
fn accents_are_normalized_away() {
    assert_eq!(stem("\u{1e9b}"), Some("s".to_string()));
}

#[test]
fn casefolds() {
    assert_eq!(stem("FOO"), Some("foo".to_string()));
}

#[test]
fn casefolds_while_nixing_accents() {
    assert_eq!(stem("CAF\u{00C9}"), Some("cafe".to_string()));
}

#[test]
fn plain_word_survives() {
    assert_eq!(stem("word"), Some("word".to_string()));
}

#[test]
fn english_word_is_stemmed() {
    assert_eq!(stem("stemming"), Some("stem".to_string()));
}

#[test]
fn hashtag_is_never_stemmed() {
    assert_eq!(stem("#stemming"), Some("#stemming".to_string()));
}

#[test]
fn mention_is_never_stemmed() {
    assert_eq!(stem("@stemming"), Some("@stemming".to_string()));
}

#[test]
fn overlong_token_drops() {
    let long = "a".repeat(31);
    assert_eq!(stem(&long), None);
    let just_fits = "a".repeat(30);
    assert!(stem(&just_fits).is_some());
}

#[test]
fn non_latin_passes_through_unstemmed() {
    assert_eq!(stem("日本語"), Some("日本語".to_string()));
}
