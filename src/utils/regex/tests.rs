use super::*;

#[test]
fn ansi_escape_matches() {
    assert!(RegexPatterns::ansi_escape().is_match("\x1b[31m"));
    assert!(RegexPatterns::ansi_escape().is_match("\x1b[0m"));
    assert!(!RegexPatterns::ansi_escape().is_match("plain text"));
}

#[test]
fn buy_command_captures_quantity_and_name() {
    let caps = RegexPatterns::buy_command()
        .captures("buy 2 kopi o")
        .unwrap();
    assert_eq!(caps.get(1).map(|m| m.as_str()), Some("2"));
    assert_eq!(&caps[2], "kopi o");

    let caps = RegexPatterns::buy_command().captures("order 3x teh tarik").unwrap();
    assert_eq!(&caps[1], "3");
    assert_eq!(&caps[2], "teh tarik");
}

#[test]
fn buy_command_without_quantity() {
    let caps = RegexPatterns::buy_command().captures("buy kaya toast").unwrap();
    assert!(caps.get(1).is_none());
    assert_eq!(&caps[2], "kaya toast");
    assert!(!RegexPatterns::buy_command().is_match("i want to buy"));
}

#[test]
fn product_command_captures_name() {
    let caps = RegexPatterns::product_command().captures("product kopi c").unwrap();
    assert_eq!(&caps[1], "kopi c");
    assert!(!RegexPatterns::product_command().is_match("products"));
}

#[test]
fn price_sensitive_phrases() {
    for phrase in ["any discount?", "so expensive leh", "can less or not", "got cheaper one"] {
        assert!(
            RegexPatterns::price_sensitive().is_match(phrase),
            "{phrase} should match"
        );
    }
    assert!(!RegexPatterns::price_sensitive().is_match("how much is kopi"));
}
