use reliscope::matrix::SimilarityMatrix;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn empty_input_builds_empty_matrix() {
    let m = SimilarityMatrix::build(&[]);
    assert_eq!(m.len(), 0);
    assert!(m.is_empty());
    assert_eq!(m.average(), 1.0);
}

#[test]
fn single_response_builds_trivial_matrix() {
    let m = SimilarityMatrix::build(&strings(&["only one"]));
    assert_eq!(m.len(), 1);
    assert_eq!(m.score(0, 0), 1.0);
    assert_eq!(m.average(), 1.0);
    assert_eq!(m.mean_to_others(0), 1.0);
}

#[test]
fn matrix_is_square_symmetric_with_unit_diagonal() {
    let responses = strings(&[
        "the agent said hello",
        "the agent said goodbye",
        "something else entirely",
        "the agent said hello",
    ]);
    let m = SimilarityMatrix::build(&responses);
    assert_eq!(m.len(), responses.len());
    for i in 0..m.len() {
        assert_eq!(m.score(i, i), 1.0);
        assert_eq!(m.rows()[i].len(), responses.len());
        for j in 0..m.len() {
            assert_eq!(m.score(i, j), m.score(j, i));
            assert!((0.0..=1.0).contains(&m.score(i, j)));
        }
    }
}

#[test]
fn identical_responses_average_one() {
    let m = SimilarityMatrix::build(&strings(&["same", "same", "same"]));
    assert_eq!(m.average(), 1.0);
    for i in 0..3 {
        assert_eq!(m.mean_to_others(i), 1.0);
    }
}

#[test]
fn average_is_mean_over_unordered_pairs() {
    let responses = strings(&["aa", "ab", "zz"]);
    let m = SimilarityMatrix::build(&responses);
    let expected = (m.score(0, 1) + m.score(0, 2) + m.score(1, 2)) / 3.0;
    assert!((m.average() - expected).abs() < 1e-12);
}

#[test]
fn mean_to_others_excludes_the_diagonal() {
    let responses = strings(&["hello there", "hello there", "completely different words"]);
    let m = SimilarityMatrix::build(&responses);
    let expected = (m.score(2, 0) + m.score(2, 1)) / 2.0;
    assert!((m.mean_to_others(2) - expected).abs() < 1e-12);
    // The outlier's mean must be lower than the duplicates' means.
    assert!(m.mean_to_others(2) < m.mean_to_others(0));
}

#[test]
fn matrix_serializes_as_rows() {
    let m = SimilarityMatrix::build(&strings(&["a", "a"]));
    let v = serde_json::to_value(&m).unwrap();
    let rows = v.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].as_array().unwrap().len(), 2);
    assert_eq!(rows[0][0], 1.0);
}
