use super::random_complex;
use crate::search::{bfs, hamming_astar};
use ndarray::array;

#[test]
fn path_endpoints_and_steps_are_valid() {
    let mut complex = random_complex(&[2, 6], 7);
    let start = complex.seed(array![2.0, 2.0].view()).unwrap();
    let end = complex.seed(array![-2.0, -2.0].view()).unwrap();
    assert_ne!(start, end);

    let path = hamming_astar(&mut complex, start, end, 1)
        .unwrap()
        .expect("a line arrangement is connected");
    assert_eq!(path.first(), Some(&start));
    assert_eq!(path.last(), Some(&end));
    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        assert_eq!(
            complex.poly(a).key().hamming(complex.poly(b).key()),
            1,
            "path steps must cross exactly one unit boundary"
        );
        assert!(complex.neighbors(a).contains(&b));
    }
}

#[test]
fn trivial_path_for_coinciding_endpoints() {
    let mut complex = random_complex(&[2, 4], 5);
    let start = complex.seed(array![1.0, 0.0].view()).unwrap();
    let path = hamming_astar(&mut complex, start, start, 1).unwrap();
    assert_eq!(path, Some(vec![start]));
}

#[test]
fn astar_discovers_no_more_than_exhaustive_search() {
    let mut exhaustive = random_complex(&[2, 6], 19);
    let s = exhaustive.seed(array![1.5, -1.0].view()).unwrap();
    bfs(&mut exhaustive, s, usize::MAX, 1).unwrap();

    let mut targeted = random_complex(&[2, 6], 19);
    let start = targeted.seed(array![1.5, -1.0].view()).unwrap();
    let end = targeted.seed(array![-1.5, 1.0].view()).unwrap();
    hamming_astar(&mut targeted, start, end, 2).unwrap();
    assert!(targeted.len() <= exhaustive.len());
}
