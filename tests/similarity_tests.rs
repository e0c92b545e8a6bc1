use reliscope::similarity::{
    edit_distance, jaccard_similarity, lexical_similarity, overall_similarity, token_set,
};

#[test]
fn edit_distance_basic_cases() {
    assert_eq!(edit_distance("", ""), 0);
    assert_eq!(edit_distance("abc", ""), 3);
    assert_eq!(edit_distance("", "abc"), 3);
    assert_eq!(edit_distance("kitten", "sitting"), 3);
    assert_eq!(edit_distance("hello", "hello"), 0);
}

#[test]
fn identical_strings_score_one() {
    for s in ["", "hello", "The sky is blue.", "a b c 123"] {
        assert_eq!(lexical_similarity(s, s), 1.0);
        assert_eq!(jaccard_similarity(s, s), 1.0);
        assert_eq!(overall_similarity(s, s), 1.0);
    }
}

#[test]
fn metrics_are_symmetric() {
    let pairs = [
        ("hello world", "goodbye world"),
        ("", "something"),
        ("The sky is blue", "The sky is blue."),
        ("punct! only?", "punct only"),
    ];
    for (a, b) in pairs {
        assert_eq!(edit_distance(a, b), edit_distance(b, a));
        assert_eq!(lexical_similarity(a, b), lexical_similarity(b, a));
        assert_eq!(jaccard_similarity(a, b), jaccard_similarity(b, a));
        assert_eq!(overall_similarity(a, b), overall_similarity(b, a));
    }
}

#[test]
fn token_set_lowercases_and_drops_punctuation() {
    let tokens = token_set("Hello, World! It's 42.");
    assert!(tokens.contains("hello"));
    assert!(tokens.contains("world"));
    assert!(tokens.contains("it"));
    assert!(tokens.contains("s"));
    assert!(tokens.contains("42"));
    assert_eq!(tokens.len(), 5);
}

#[test]
fn jaccard_ignores_punctuation_differences() {
    assert_eq!(
        jaccard_similarity("The sky is blue", "The sky is blue."),
        1.0
    );
}

#[test]
fn jaccard_disjoint_token_sets_score_zero() {
    assert_eq!(jaccard_similarity("alpha bravo", "charlie delta"), 0.0);
}

#[test]
fn overall_blend_uses_fixed_weights() {
    // "ab" vs "ad": distance 1 over max len 2, shared token set is empty.
    let lex = 1.0 - 1.0 / 2.0;
    let expected = 0.4 * lex + 0.6 * 0.0;
    assert!((overall_similarity("ab", "ad") - expected).abs() < 1e-12);

    // Same tokens, different punctuation: jaccard 1.0 dominates.
    let a = "The sky is blue";
    let b = "The sky is blue.";
    let lex = 1.0 - 1.0 / 16.0;
    let expected = 0.4 * lex + 0.6 * 1.0;
    assert!((overall_similarity(a, b) - expected).abs() < 1e-12);
}

#[test]
fn scores_stay_in_unit_interval() {
    let samples = ["", "x", "hello world", "!!!", "a much longer response text"];
    for a in samples {
        for b in samples {
            let s = overall_similarity(a, b);
            assert!((0.0..=1.0).contains(&s), "{a:?} vs {b:?} gave {s}");
        }
    }
}
