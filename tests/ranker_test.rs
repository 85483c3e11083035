use mem42::ranker::{rank, Embedded, RankError};

#[derive(Debug, Clone, PartialEq)]
struct Doc {
    id: &'static str,
    vector: Vec<f32>,
}

impl Embedded for Doc {
    fn id(&self) -> &str {
        self.id
    }

    fn embedding(&self) -> &[f32] {
        &self.vector
    }
}

fn doc(id: &'static str, vector: &[f32]) -> Doc {
    Doc {
        id,
        vector: vector.to_vec(),
    }
}

#[test]
fn ranks_worked_example() {
    let candidates = vec![
        doc("A", &[1.0, 0.0]),
        doc("B", &[0.0, 1.0]),
        doc("C", &[0.7071, 0.7071]),
    ];
    let ranked = rank(&[1.0, 0.0], candidates, 2).unwrap();

    let ids: Vec<_> = ranked.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, vec!["A", "C"]);
    assert!((ranked[0].similarity - 1.0).abs() < 1e-9);
    assert!((ranked[1].similarity - 0.70710678).abs() < 1e-4);
}

#[test]
fn mixed_dimensions_fail_fast() {
    let candidates = vec![doc("ok", &[1.0, 0.0]), doc("bad", &[1.0, 0.0, 0.0])];
    assert_eq!(
        rank(&[1.0, 0.0], candidates, 5).unwrap_err(),
        RankError::DimensionMismatch {
            id: "bad".into(),
            expected: 2,
            found: 3,
        }
    );
}

#[test]
fn opposite_vectors_rank_last() {
    let candidates = vec![
        doc("opposite", &[-1.0, 0.0]),
        doc("orthogonal", &[0.0, 1.0]),
        doc("same", &[2.0, 0.0]),
    ];
    let ranked = rank(&[1.0, 0.0], candidates, 3).unwrap();
    let ids: Vec<_> = ranked.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, vec!["same", "orthogonal", "opposite"]);
    assert!((ranked[2].similarity + 1.0).abs() < 1e-9);
}
